use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bridge::BridgeEndpoint;

/// Cluster configuration keys consulted by the resource negotiator.
pub mod keys {
    /// Per-executor memory overhead, in the same memory units the cluster
    /// reports executor memory in.
    pub const EXECUTOR_MEMORY_OVERHEAD: &str = "cluster.executor.memory-overhead";
    /// Whether the cluster manager sizes the executor pool itself.
    pub const DYNAMIC_ALLOCATION_ENABLED: &str = "cluster.dynamic-allocation.enabled";
}

/// Read-only key/value lookup over existing cluster configuration.
///
/// Lookups are infallible; a missing or unparsable value yields the supplied
/// default, matching how the underlying cluster API behaves.
pub trait ClusterConfigSource: Send + Sync {
    fn get_int(&self, key: &str, default: i64) -> i64;
    fn get_bool(&self, key: &str, default: bool) -> bool;
    fn get_str(&self, key: &str, default: &str) -> String;
}

/// In-memory configuration source.
#[derive(Clone, Debug, Default)]
pub struct InMemoryClusterConfig {
    values: HashMap<String, String>,
}

impl InMemoryClusterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key/value entry.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ClusterConfigSource for InMemoryClusterConfig {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_str(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Configuration for an [`EngineController`](crate::controller::EngineController).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Application name recorded on the job descriptor.
    pub app_name: String,
    /// Where to reach (or whether to locally launch) the remote runtime.
    pub endpoint: BridgeEndpoint,
    /// When set, operations that need a configured controller initialize it
    /// transparently. Starting a session is never implicit either way.
    pub lazy_initialize: bool,
}

impl ControllerConfig {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            endpoint: BridgeEndpoint::local(),
            lazy_initialize: true,
        }
    }

    /// Set the bridge endpoint.
    pub fn with_endpoint(mut self, endpoint: BridgeEndpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Enable or disable lazy initialization.
    pub fn with_lazy_initialize(mut self, lazy: bool) -> Self {
        self.lazy_initialize = lazy;
        self
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::new("geolink")
    }
}
