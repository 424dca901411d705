//! Cluster launch-parameter negotiation.
//!
//! When a session starts in distributed-cluster mode, the controller hands
//! the job descriptor and the cluster-reported per-executor memory to a
//! [`ResourceNegotiator`], which derives the launch parameters passed to the
//! cluster scheduler. The overhead accounting reproduces the deployed
//! behavior exactly: the configured overhead competes with 10% of reported
//! memory, the winner is floored at 384 units, and the result is charged
//! twice (once for the coordinating driver, once for the application-master
//! process). The double charge applies in this client-gateway mode only.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{keys, ClusterConfigSource};
use crate::job::JobDescriptor;

/// Default and minimum per-executor memory overhead, in the cluster's
/// reported memory units.
pub const DEFAULT_MEMORY_OVERHEAD: i64 = 384;

/// Fraction of reported executor memory that competes with the configured
/// overhead.
pub const OVERHEAD_FRACTION: f64 = 0.10;

/// Master mode forced whenever the session runs in distributed-cluster mode.
/// The override is unconditional; any previously configured master string is
/// ignored.
pub const DISTRIBUTED_CLIENT_MASTER: &str = "cluster-client";

/// Launch parameters handed to the cluster scheduler.
///
/// Transient: recomputed on every `start`, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterLaunchParameters {
    /// Per-executor memory after the double overhead charge, in kilobytes.
    pub executor_memory_kb: i64,
    /// The same value rendered in the cluster API's human-scale form.
    pub executor_memory: String,
    /// Cores per executor, copied verbatim from the descriptor.
    pub executor_cores: u32,
    /// Executor count, copied from the descriptor. `None` when dynamic
    /// allocation is enabled and the cluster manager decides.
    pub executor_instances: Option<u32>,
    /// Always [`DISTRIBUTED_CLIENT_MASTER`].
    pub master_mode: String,
}

/// Derives cluster launch parameters from a descriptor and cluster-reported
/// values.
pub trait ResourceNegotiator: Send + Sync {
    /// Compute launch parameters for a distributed-cluster session.
    ///
    /// Only invoked when the descriptor's execution mode is
    /// distributed-cluster and no externally created execution context was
    /// adopted.
    fn compute_launch_parameters(
        &self,
        descriptor: &JobDescriptor,
        reported_executor_memory_kb: i64,
    ) -> ClusterLaunchParameters;
}

/// Standard negotiator backed by a [`ClusterConfigSource`].
pub struct ClusterResourceNegotiator {
    config: Arc<dyn ClusterConfigSource>,
}

impl std::fmt::Debug for ClusterResourceNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterResourceNegotiator").finish_non_exhaustive()
    }
}

impl ClusterResourceNegotiator {
    pub fn new(config: Arc<dyn ClusterConfigSource>) -> Self {
        Self { config }
    }
}

impl ResourceNegotiator for ClusterResourceNegotiator {
    fn compute_launch_parameters(
        &self,
        descriptor: &JobDescriptor,
        reported_executor_memory_kb: i64,
    ) -> ClusterLaunchParameters {
        let mem = reported_executor_memory_kb as f64;

        // The 10% candidate is computed in floating point and the total is
        // truncated once, after the double charge.
        let mut overhead = self
            .config
            .get_int(keys::EXECUTOR_MEMORY_OVERHEAD, DEFAULT_MEMORY_OVERHEAD)
            as f64;
        if mem * OVERHEAD_FRACTION > overhead {
            overhead = mem * OVERHEAD_FRACTION;
        }
        if overhead < DEFAULT_MEMORY_OVERHEAD as f64 {
            overhead = DEFAULT_MEMORY_OVERHEAD as f64;
        }

        // Charged once for the driver and once for the application-master
        // process, in this deployment mode only.
        let executor_memory_kb = (mem - overhead * 2.0) as i64;

        let dynamic_allocation = self
            .config
            .get_bool(keys::DYNAMIC_ALLOCATION_ENABLED, false);
        let executor_instances = if dynamic_allocation {
            None
        } else {
            Some(descriptor.executor_instances())
        };

        tracing::debug!(
            reported_kb = reported_executor_memory_kb,
            overhead = overhead as i64,
            executor_memory_kb,
            dynamic_allocation,
            "negotiated cluster launch parameters"
        );

        ClusterLaunchParameters {
            executor_memory_kb,
            executor_memory: kb_to_human(executor_memory_kb, "m"),
            executor_cores: descriptor.executor_cores(),
            executor_instances,
            master_mode: DISTRIBUTED_CLIENT_MASTER.to_string(),
        }
    }
}

/// Render a kilobyte count in the cluster API's human-scale unit form,
/// dividing by 1024 until the value drops below 1024 or `max_unit` is
/// reached. Treated as an exact pass-through of the cluster API's own
/// presentation.
pub fn kb_to_human(kb: i64, max_unit: &str) -> String {
    const UNITS: [&str; 5] = ["k", "m", "g", "t", "p"];

    let max = UNITS.iter().position(|u| *u == max_unit);
    let mut value = kb;
    let mut unit = 0;
    while value >= 1024 && max.map_or(true, |m| unit < m) {
        value /= 1024;
        unit += 1;
    }
    format!("{}{}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InMemoryClusterConfig;

    fn negotiator(config: InMemoryClusterConfig) -> ClusterResourceNegotiator {
        ClusterResourceNegotiator::new(Arc::new(config))
    }

    #[test]
    fn ten_percent_wins_over_configured_overhead() {
        let params = negotiator(InMemoryClusterConfig::new())
            .compute_launch_parameters(&JobDescriptor::new("job"), 10_000);

        // overhead = max(384, 1000) = 1000, charged twice
        assert_eq!(params.executor_memory_kb, 8_000);
    }

    #[test]
    fn configured_overhead_wins_when_ten_percent_is_small() {
        let params = negotiator(InMemoryClusterConfig::new())
            .compute_launch_parameters(&JobDescriptor::new("job"), 3_000);

        // overhead = max(384, 300) = 384, charged twice
        assert_eq!(params.executor_memory_kb, 2_232);
    }

    #[test]
    fn overhead_is_floored_even_when_configured_lower() {
        let config =
            InMemoryClusterConfig::new().with_value(keys::EXECUTOR_MEMORY_OVERHEAD, "100");
        let params = negotiator(config)
            .compute_launch_parameters(&JobDescriptor::new("job"), 3_000);

        // configured 100 loses to the 384 floor
        assert_eq!(params.executor_memory_kb, 2_232);
    }

    #[test]
    fn large_configured_overhead_is_honored() {
        let config =
            InMemoryClusterConfig::new().with_value(keys::EXECUTOR_MEMORY_OVERHEAD, "2000");
        let params = negotiator(config)
            .compute_launch_parameters(&JobDescriptor::new("job"), 10_000);

        assert_eq!(params.executor_memory_kb, 6_000);
    }

    #[test]
    fn dynamic_allocation_omits_instances() {
        let config = InMemoryClusterConfig::new()
            .with_value(keys::DYNAMIC_ALLOCATION_ENABLED, "true");
        let mut descriptor = JobDescriptor::new("job");
        descriptor.set_executor_instances(12);

        let params = negotiator(config).compute_launch_parameters(&descriptor, 10_000);
        assert_eq!(params.executor_instances, None);
    }

    #[test]
    fn cores_and_instances_copied_from_descriptor() {
        let mut descriptor = JobDescriptor::new("job");
        descriptor.set_executor_cores(4);
        descriptor.set_executor_instances(8);

        let params =
            negotiator(InMemoryClusterConfig::new()).compute_launch_parameters(&descriptor, 10_000);
        assert_eq!(params.executor_cores, 4);
        assert_eq!(params.executor_instances, Some(8));
    }

    #[test]
    fn master_mode_is_always_forced() {
        let params = negotiator(InMemoryClusterConfig::new())
            .compute_launch_parameters(&JobDescriptor::new("job"), 10_000);
        assert_eq!(params.master_mode, DISTRIBUTED_CLIENT_MASTER);
    }

    #[test]
    fn kb_to_human_scales_to_max_unit() {
        assert_eq!(kb_to_human(512, "m"), "512k");
        assert_eq!(kb_to_human(8_000, "m"), "7m");
        assert_eq!(kb_to_human(4_194_304, "m"), "4096m");
        assert_eq!(kb_to_human(4_194_304, "g"), "4g");
    }
}
