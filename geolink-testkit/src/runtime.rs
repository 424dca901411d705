use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use geolink::engine::remote_api;
use geolink::{BridgeEndpoint, RemoteRef, RemoteRuntime, RemoteRuntimeConnector, RemoteValue};
use parking_lot::Mutex;

/// One recorded bridge call.
#[derive(Clone, Debug)]
pub struct CallRecord {
    /// Remote class of the target (static calls and constructors) or of the
    /// invoked object.
    pub remote_class: String,
    pub method: String,
    pub args: Vec<RemoteValue>,
}

/// In-memory stand-in for the remote engine runtime.
///
/// Replies with engine-shaped defaults so a controller can run a full
/// lifecycle against it out of the box; individual entry points can be
/// overridden with scripted replies or failures. Every call is recorded.
pub struct MockRemoteRuntime {
    calls: Mutex<Vec<CallRecord>>,
    replies: Mutex<HashMap<(String, String), RemoteValue>>,
    failures: Mutex<HashMap<(String, String), String>>,
    shutdowns: Mutex<usize>,
    next_object: Mutex<u64>,
    configuration_defaults: Mutex<HashMap<String, String>>,
    dependency_jars: Mutex<Vec<String>>,
    images: Mutex<Vec<String>>,
    resource_report: Mutex<(i64, u32, u32)>,
}

impl Default for MockRemoteRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteRuntime {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            shutdowns: Mutex::new(0),
            next_object: Mutex::new(1),
            configuration_defaults: Mutex::new(HashMap::new()),
            dependency_jars: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
            resource_report: Mutex::new((10_000, 2, 4)),
        }
    }

    /// Script a reply for a `(remote class, method)` pair.
    pub fn respond_with(&self, remote_class: &str, method: &str, reply: RemoteValue) {
        self.replies
            .lock()
            .insert((remote_class.to_string(), method.to_string()), reply);
    }

    /// Script a failure for a `(remote class, method)` pair.
    pub fn fail_on(&self, remote_class: &str, method: &str, message: &str) {
        self.failures.lock().insert(
            (remote_class.to_string(), method.to_string()),
            message.to_string(),
        );
    }

    /// Clear a previously scripted failure.
    pub fn clear_failure(&self, remote_class: &str, method: &str) {
        self.failures
            .lock()
            .remove(&(remote_class.to_string(), method.to_string()));
    }

    /// Configuration defaults handed back by the engine's data catalog.
    pub fn set_configuration_defaults(&self, defaults: HashMap<String, String>) {
        *self.configuration_defaults.lock() = defaults;
    }

    /// Dependency jars reported by the engine.
    pub fn set_dependency_jars(&self, jars: Vec<String>) {
        *self.dependency_jars.lock() = jars;
    }

    /// Image names reported by the engine's data catalog.
    pub fn set_images(&self, images: Vec<String>) {
        *self.images.lock() = images;
    }

    /// Per-executor resources reported by the cluster resource manager.
    pub fn set_resource_report(&self, memory_kb: i64, cores: u32, instances: u32) {
        *self.resource_report.lock() = (memory_kb, cores, instances);
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls for a `(remote class, method)` pair.
    pub fn call_count(&self, remote_class: &str, method: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.remote_class == remote_class && c.method == method)
            .count()
    }

    /// Number of shutdown calls received.
    pub fn shutdown_count(&self) -> usize {
        *self.shutdowns.lock()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, remote_class: &str, method: &str, args: &[RemoteValue]) {
        self.calls.lock().push(CallRecord {
            remote_class: remote_class.to_string(),
            method: method.to_string(),
            args: args.to_vec(),
        });
    }

    fn check_failure(&self, remote_class: &str, method: &str) -> anyhow::Result<()> {
        if let Some(message) = self
            .failures
            .lock()
            .get(&(remote_class.to_string(), method.to_string()))
        {
            anyhow::bail!("{message}");
        }
        Ok(())
    }

    fn scripted_reply(&self, remote_class: &str, method: &str) -> Option<RemoteValue> {
        self.replies
            .lock()
            .get(&(remote_class.to_string(), method.to_string()))
            .cloned()
    }

    fn fresh_ref(&self, remote_class: &str) -> RemoteRef {
        let mut next = self.next_object.lock();
        let id = *next;
        *next += 1;
        RemoteRef::new(format!("obj-{id}"), remote_class)
    }

    fn string_map_value(entries: &HashMap<String, String>) -> RemoteValue {
        RemoteValue::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), RemoteValue::Str(v.clone())))
                .collect(),
        )
    }

    fn string_list_value(items: &[String]) -> RemoteValue {
        RemoteValue::List(items.iter().map(|s| RemoteValue::Str(s.clone())).collect())
    }

    fn default_reply(&self, remote_class: &str, method: &str) -> RemoteValue {
        match (remote_class, method) {
            (remote_api::DATA_CATALOG, "configurationDefaults") => {
                Self::string_map_value(&self.configuration_defaults.lock())
            }
            (remote_api::DEPENDENCY_RESOLVER, "collectDependencies") => {
                Self::string_list_value(&self.dependency_jars.lock())
            }
            (remote_api::RESOURCE_REPORTER, "reportExecutorResources") => {
                let (memory_kb, cores, instances) = *self.resource_report.lock();
                let mut entries = HashMap::new();
                entries.insert("executor.memory-kb".to_string(), RemoteValue::Int(memory_kb));
                entries.insert("executor.cores".to_string(), RemoteValue::Int(i64::from(cores)));
                entries.insert(
                    "executor.instances".to_string(),
                    RemoteValue::Int(i64::from(instances)),
                );
                RemoteValue::Map(entries)
            }
            (remote_api::DATA_CATALOG, "listImages") => {
                Self::string_list_value(&self.images.lock())
            }
            (remote_api::DATA_CATALOG, "loadImage") => {
                RemoteValue::Ref(self.fresh_ref("engine.raster.RasterOperation"))
            }
            (remote_api::IMAGE_INGESTER, "create") => {
                RemoteValue::Ref(self.fresh_ref(remote_api::IMAGE_INGESTER))
            }
            (remote_api::POINTS_BUILDER, "fromCoordinates") => {
                RemoteValue::Ref(self.fresh_ref("engine.vector.VectorOperation"))
            }
            (_, "createCheckpointDirectory") => {
                RemoteValue::Str("/tmp/geolink-checkpoint".to_string())
            }
            (_, "setup") | (_, "execute") | (_, "teardown") => RemoteValue::Bool(true),
            _ => RemoteValue::Null,
        }
    }

    fn reply(&self, remote_class: &str, method: &str) -> RemoteValue {
        self.scripted_reply(remote_class, method)
            .unwrap_or_else(|| self.default_reply(remote_class, method))
    }
}

#[async_trait]
impl RemoteRuntime for MockRemoteRuntime {
    async fn create_object(
        &self,
        remote_class: &str,
        args: Vec<RemoteValue>,
    ) -> anyhow::Result<RemoteRef> {
        self.record(remote_class, "<constructor>", &args);
        self.check_failure(remote_class, "<constructor>")?;
        Ok(self.fresh_ref(remote_class))
    }

    async fn invoke(
        &self,
        target: &RemoteRef,
        method: &str,
        args: Vec<RemoteValue>,
    ) -> anyhow::Result<RemoteValue> {
        self.record(&target.remote_class, method, &args);
        self.check_failure(&target.remote_class, method)?;
        Ok(self.reply(&target.remote_class, method))
    }

    async fn invoke_static(
        &self,
        remote_class: &str,
        method: &str,
        args: Vec<RemoteValue>,
    ) -> anyhow::Result<RemoteValue> {
        self.record(remote_class, method, &args);
        self.check_failure(remote_class, method)?;
        Ok(self.reply(remote_class, method))
    }

    async fn shutdown(&self) -> anyhow::Result<()> {
        *self.shutdowns.lock() += 1;
        Ok(())
    }
}

/// Connector double returning a shared [`MockRemoteRuntime`].
///
/// Counts connection attempts and can be scripted to fail the next N of
/// them, for exercising clean-retry behavior.
pub struct MockConnector {
    runtime: Arc<MockRemoteRuntime>,
    connects: Mutex<usize>,
    failures_remaining: Mutex<usize>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        Self::with_runtime(Arc::new(MockRemoteRuntime::new()))
    }

    pub fn with_runtime(runtime: Arc<MockRemoteRuntime>) -> Self {
        Self {
            runtime,
            connects: Mutex::new(0),
            failures_remaining: Mutex::new(0),
        }
    }

    /// The shared runtime handed out on successful connects.
    pub fn runtime(&self) -> Arc<MockRemoteRuntime> {
        Arc::clone(&self.runtime)
    }

    /// Number of connection attempts, successful or not.
    pub fn connect_count(&self) -> usize {
        *self.connects.lock()
    }

    pub fn assert_connect_count_eq(&self, expected: usize) {
        let actual = self.connect_count();
        assert_eq!(
            actual, expected,
            "Expected {expected} connects, got {actual}"
        );
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        *self.failures_remaining.lock() = n;
    }
}

#[async_trait]
impl RemoteRuntimeConnector for MockConnector {
    async fn connect(
        &self,
        _endpoint: &BridgeEndpoint,
    ) -> anyhow::Result<Arc<dyn RemoteRuntime>> {
        *self.connects.lock() += 1;

        let mut failures = self.failures_remaining.lock();
        if *failures > 0 {
            *failures -= 1;
            anyhow::bail!("connection refused");
        }

        Ok(self.runtime() as Arc<dyn RemoteRuntime>)
    }
}
