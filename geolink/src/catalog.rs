//! Remote-operation catalog boundary.
//!
//! The catalog is an external collaborator: given a live bridge it discovers
//! the engine's callable operation surface and registers a factory per
//! operation name. The core invokes [`OperationCatalog::populate`] once per
//! successful initialization and otherwise treats the registry contents as
//! opaque.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bridge::{BridgeHandle, RemoteRef};
use crate::context::ExecutionContext;
use crate::job::JobDescriptor;
use crate::ops::OperationWrapper;

/// Everything a result-wrapper factory needs to produce a caller-facing
/// object. The core never inspects what the factory does with it.
#[derive(Clone, Debug)]
pub struct OperationBinding {
    pub remote: RemoteRef,
    pub bridge: BridgeHandle,
    pub context: ExecutionContext,
    pub descriptor: JobDescriptor,
}

/// Factory for one named remote operation.
pub trait OperationFactory: Send + Sync {
    /// Wrap a remote result object for the caller.
    fn bind(&self, binding: OperationBinding) -> OperationWrapper;
}

/// Name-keyed registry of remote-operation factories.
///
/// Populated once during initialization and cleared on `stop`. Registering a
/// name twice replaces the earlier factory.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    entries: HashMap<String, Arc<dyn OperationFactory>>,
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.entries.len())
            .finish()
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, factory: Arc<dyn OperationFactory>) {
        let name = name.into();
        if self.entries.insert(name.clone(), factory).is_some() {
            tracing::debug!(operation = %name, "replaced operation factory");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn OperationFactory>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered operation names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Discovers the engine's remote operation surface and registers factories
/// for it.
#[async_trait]
pub trait OperationCatalog: Send + Sync {
    /// Populate the registry from the live bridge.
    ///
    /// Called once per successful controller initialization. Errors are
    /// surfaced to the initialization caller verbatim.
    async fn populate(
        &self,
        bridge: &BridgeHandle,
        registry: &mut OperationRegistry,
    ) -> anyhow::Result<()>;
}
