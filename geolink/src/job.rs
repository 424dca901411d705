use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Well-known job setting keys consulted by the control layer.
pub mod settings {
    /// Delimited data-provider properties forwarded to the engine's catalog
    /// calls.
    pub const PROVIDER_PROPERTIES: &str = "data.provider.properties";
}

/// How a unit of distributed work is launched.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// In-process execution on the engine side, used for debugging.
    Local,
    /// Execution under the cluster resource manager. Selected automatically
    /// unless a caller switches to debug mode.
    #[default]
    DistributedCluster,
}

impl Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Local => write!(f, "local"),
            ExecutionMode::DistributedCluster => write!(f, "distributed-cluster"),
        }
    }
}

/// Description of the remote job used to configure a run.
///
/// Owned by the lifecycle controller and created only while a bridge is open;
/// `stop` clears it together with the bridge. Mutations happen through the
/// explicit setters below and are applied before `start`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobDescriptor {
    name: String,
    execution_mode: ExecutionMode,
    debug: bool,
    properties: HashMap<String, String>,
    jars: BTreeSet<String>,
    executor_cores: u32,
    executor_instances: u32,
}

impl JobDescriptor {
    /// Create a descriptor with the default distributed-cluster mode.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            execution_mode: ExecutionMode::DistributedCluster,
            debug: false,
            properties: HashMap::new(),
            jars: BTreeSet::new(),
            executor_cores: 1,
            executor_instances: 2,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    pub fn is_distributed(&self) -> bool {
        self.execution_mode == ExecutionMode::DistributedCluster
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Switch to local debug execution. Mutually exclusive with
    /// [`set_distributed`](Self::set_distributed); last write wins.
    pub fn set_debug(&mut self) {
        self.debug = true;
        self.execution_mode = ExecutionMode::Local;
    }

    /// Switch to distributed-cluster execution. Mutually exclusive with
    /// [`set_debug`](Self::set_debug); last write wins.
    pub fn set_distributed(&mut self) {
        self.debug = false;
        self.execution_mode = ExecutionMode::DistributedCluster;
    }

    /// Set a single job property.
    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Look a job property up.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Look a job property up, falling back to a default.
    pub fn setting_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.setting(key).unwrap_or(default)
    }

    /// Merge remote-runtime-reported configuration defaults into the
    /// descriptor. Later calls overwrite earlier keys on conflict.
    pub fn add_properties(&mut self, defaults: HashMap<String, String>) {
        self.properties.extend(defaults);
    }

    pub fn properties(&self) -> &HashMap<String, String> {
        &self.properties
    }

    /// Record dependency jars the engine must ship to executors.
    pub fn add_jars<I, S>(&mut self, jars: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jars.extend(jars.into_iter().map(Into::into));
    }

    pub fn jars(&self) -> &BTreeSet<String> {
        &self.jars
    }

    pub fn executor_cores(&self) -> u32 {
        self.executor_cores
    }

    pub fn executor_instances(&self) -> u32 {
        self.executor_instances
    }

    pub fn set_executor_cores(&mut self, cores: u32) {
        self.executor_cores = cores;
    }

    pub fn set_executor_instances(&mut self, instances: u32) {
        self.executor_instances = instances;
    }
}
