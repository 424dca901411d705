use std::sync::Arc;

use async_trait::async_trait;
use geolink::{
    BridgeHandle, ClusterLaunchParameters, InMemoryClusterConfig, JobDescriptor,
    OperationBinding, OperationCatalog, OperationFactory, OperationRegistry, OperationWrapper,
    RasterOp, ResourceNegotiator, VectorOp, ClusterResourceNegotiator,
};
use parking_lot::Mutex;

/// Kind of wrapper a [`TestOperationFactory`] produces.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TestOperationKind {
    Raster,
    Vector,
}

/// Operation factory double producing plain wrappers.
#[derive(Clone, Copy, Debug)]
pub struct TestOperationFactory {
    kind: TestOperationKind,
}

impl TestOperationFactory {
    pub fn raster() -> Self {
        Self {
            kind: TestOperationKind::Raster,
        }
    }

    pub fn vector() -> Self {
        Self {
            kind: TestOperationKind::Vector,
        }
    }
}

impl OperationFactory for TestOperationFactory {
    fn bind(&self, binding: OperationBinding) -> OperationWrapper {
        match self.kind {
            TestOperationKind::Raster => OperationWrapper::Raster(RasterOp::new(
                binding.remote,
                binding.bridge,
                binding.context,
                binding.descriptor,
            )),
            TestOperationKind::Vector => OperationWrapper::Vector(VectorOp::new(
                binding.remote,
                binding.bridge,
                binding.context,
                binding.descriptor,
            )),
        }
    }
}

/// Catalog double that registers a fixed operation set and counts
/// populations. Can be scripted to fail, for exercising teardown-on-error.
pub struct MockCatalog {
    operations: Vec<String>,
    populations: Mutex<usize>,
    fail: Mutex<bool>,
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::with_operations(["slope", "aspect"])
    }

    pub fn with_operations<I, S>(operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operations: operations.into_iter().map(Into::into).collect(),
            populations: Mutex::new(0),
            fail: Mutex::new(false),
        }
    }

    /// Make subsequent populations fail.
    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn populate_count(&self) -> usize {
        *self.populations.lock()
    }

    pub fn assert_populate_count_eq(&self, expected: usize) {
        let actual = self.populate_count();
        assert_eq!(
            actual, expected,
            "Expected {expected} populations, got {actual}"
        );
    }
}

#[async_trait]
impl OperationCatalog for MockCatalog {
    async fn populate(
        &self,
        _bridge: &BridgeHandle,
        registry: &mut OperationRegistry,
    ) -> anyhow::Result<()> {
        *self.populations.lock() += 1;

        if *self.fail.lock() {
            anyhow::bail!("catalog population failed");
        }

        for name in &self.operations {
            registry.register(name.clone(), Arc::new(TestOperationFactory::raster()));
        }
        Ok(())
    }
}

/// Negotiator wrapper that counts invocations before delegating.
pub struct RecordingNegotiator {
    inner: Arc<dyn ResourceNegotiator>,
    calls: Mutex<usize>,
}

impl RecordingNegotiator {
    pub fn new(inner: Arc<dyn ResourceNegotiator>) -> Self {
        Self {
            inner,
            calls: Mutex::new(0),
        }
    }

    /// A recording wrapper around the standard negotiator with empty cluster
    /// configuration.
    pub fn standard() -> Self {
        Self::new(Arc::new(ClusterResourceNegotiator::new(Arc::new(
            InMemoryClusterConfig::new(),
        ))))
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }

    pub fn assert_call_count_eq(&self, expected: usize) {
        let actual = self.call_count();
        assert_eq!(
            actual, expected,
            "Expected {expected} negotiations, got {actual}"
        );
    }
}

impl ResourceNegotiator for RecordingNegotiator {
    fn compute_launch_parameters(
        &self,
        descriptor: &JobDescriptor,
        reported_executor_memory_kb: i64,
    ) -> ClusterLaunchParameters {
        *self.calls.lock() += 1;
        self.inner
            .compute_launch_parameters(descriptor, reported_executor_memory_kb)
    }
}
