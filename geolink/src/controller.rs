//! Lifecycle orchestration for the engine control layer.
//!
//! [`EngineController`] owns the bridge, the job descriptor, and the live
//! execution context, and enforces the ordering between them: the descriptor
//! never outlives the bridge, the context never outlives the descriptor, and
//! `stop` releases whatever subset is live and returns the controller to its
//! initial, reusable state.
//!
//! State machine:
//!
//! ```text
//! Uninitialized -> Connected -> Configured -> Running -> (stop) -> Uninitialized
//! ```
//!
//! Operations that need a configured controller re-enter initialization
//! transparently when lazy initialization is enabled; starting a session is
//! never implicit.

use std::fmt::Display;
use std::sync::Arc;

use crate::bridge::{BridgeConnection, BridgeHandle, BridgeId, RemoteRuntimeConnector};
use crate::catalog::{OperationCatalog, OperationRegistry};
use crate::config::{ClusterConfigSource, ControllerConfig};
use crate::context::ExecutionContext;
use crate::engine::EngineClient;
use crate::error::{Error, Result};
use crate::job::{settings, JobDescriptor};
use crate::ops::{RasterOp, VectorOp};
use crate::resources::{ClusterResourceNegotiator, ResourceNegotiator};

/// Observable lifecycle state, derived from which components are live.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControllerState {
    Uninitialized,
    Connected,
    Configured,
    Running,
}

impl Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerState::Uninitialized => write!(f, "uninitialized"),
            ControllerState::Connected => write!(f, "connected"),
            ControllerState::Configured => write!(f, "configured"),
            ControllerState::Running => write!(f, "running"),
        }
    }
}

/// Drives a remote engine across the process boundary.
///
/// One controller instance owns one bridge. Methods that mutate lifecycle
/// state take `&mut self`; callers sharing a controller across threads must
/// serialize those themselves. The only internally synchronized section is
/// bridge creation inside [`BridgeConnection`].
pub struct EngineController {
    config: ControllerConfig,
    bridge: BridgeConnection,
    catalog: Arc<dyn OperationCatalog>,
    negotiator: Arc<dyn ResourceNegotiator>,
    handle: Option<BridgeHandle>,
    descriptor: Option<JobDescriptor>,
    context: Option<ExecutionContext>,
    registry: OperationRegistry,
}

impl std::fmt::Debug for EngineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineController")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("operations", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl EngineController {
    pub fn new(
        config: ControllerConfig,
        connector: Arc<dyn RemoteRuntimeConnector>,
        catalog: Arc<dyn OperationCatalog>,
        negotiator: Arc<dyn ResourceNegotiator>,
    ) -> Self {
        Self {
            config,
            bridge: BridgeConnection::new(connector),
            catalog,
            negotiator,
            handle: None,
            descriptor: None,
            context: None,
            registry: OperationRegistry::new(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        if self.context.is_some() {
            ControllerState::Running
        } else if self.descriptor.is_some() {
            ControllerState::Configured
        } else if self.handle.is_some() {
            ControllerState::Connected
        } else {
            ControllerState::Uninitialized
        }
    }

    /// Identity of the open bridge, if any.
    pub fn bridge_id(&self) -> Option<BridgeId> {
        self.handle.as_ref().map(BridgeHandle::id)
    }

    /// Handle to the open bridge, if any. Needed to build
    /// [`OperationBinding`](crate::catalog::OperationBinding)s for the
    /// registered operation factories.
    pub fn bridge_handle(&self) -> Option<&BridgeHandle> {
        self.handle.as_ref()
    }

    pub fn descriptor(&self) -> Option<&JobDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn descriptor_mut(&mut self) -> Option<&mut JobDescriptor> {
        self.descriptor.as_mut()
    }

    pub fn execution_context(&self) -> Option<&ExecutionContext> {
        self.context.as_ref()
    }

    /// The remote operations registered by the catalog collaborator.
    pub fn operations(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Open the bridge (at most once), create the job descriptor, and
    /// populate the remote-operation catalog.
    ///
    /// Idempotent with respect to the bridge: repeated calls without an
    /// intervening [`stop`](Self::stop) reuse the existing connection. Any
    /// failure triggers a full teardown before the error is surfaced, so the
    /// controller is always reusable afterwards.
    pub async fn initialize(&mut self) -> Result<()> {
        if let Err(error) = self.try_initialize().await {
            tracing::warn!(%error, "initialization failed, tearing down");
            self.stop().await;
            return Err(error);
        }
        Ok(())
    }

    async fn try_initialize(&mut self) -> Result<()> {
        let handle = self.bridge.ensure_open(&self.config.endpoint).await?;
        self.handle = Some(handle.clone());

        if self.descriptor.is_none() {
            tracing::info!(name = %self.config.app_name, "creating job descriptor");
            self.descriptor = Some(JobDescriptor::new(&self.config.app_name));
        }

        self.catalog
            .populate(&handle, &mut self.registry)
            .await
            .map_err(Error::CatalogPopulation)?;
        tracing::debug!(operations = self.registry.len(), "operation catalog populated");
        #[cfg(feature = "metrics")]
        crate::metrics::record_catalog_populated();

        Ok(())
    }

    /// Start an execution session.
    ///
    /// With `existing` supplied, the context is adopted as-is and resource
    /// negotiation is skipped entirely; the distributed launch parameters
    /// are assumed already applied by whoever created it. Otherwise the
    /// controller merges engine-reported configuration defaults and
    /// dependency jars into the descriptor, negotiates launch parameters
    /// when in distributed-cluster mode, and creates the remote session and
    /// its checkpoint directory.
    ///
    /// Failures are surfaced without teardown; the caller may inspect state
    /// and retry or stop.
    pub async fn start(&mut self, existing: Option<ExecutionContext>) -> Result<()> {
        if self.state() == ControllerState::Running {
            return Err(Error::InvalidStateTransition {
                operation: "start",
                state: ControllerState::Running,
            });
        }
        self.ensure_configured("start").await?;

        if let Some(context) = existing {
            tracing::info!(session_id = %context.id(), "adopting externally created execution context");
            self.context = Some(context);
            return Ok(());
        }

        let engine = self.engine_client("start")?;
        let negotiator = Arc::clone(&self.negotiator);

        let defaults = engine.configuration_defaults().await?;
        let jars = engine.dependency_jars().await?;

        let descriptor = match self.descriptor.as_mut() {
            Some(descriptor) => descriptor,
            None => {
                return Err(Error::InvalidStateTransition {
                    operation: "start",
                    state: ControllerState::Uninitialized,
                })
            }
        };
        descriptor.add_properties(defaults);
        descriptor.add_jars(jars);

        let params = if descriptor.is_distributed() {
            let report = engine
                .cluster_resource_report()
                .await
                .map_err(Error::ResourceQueryFailed)?;
            descriptor.set_executor_cores(report.executor_cores);
            descriptor.set_executor_instances(report.executor_instances);
            Some(negotiator.compute_launch_parameters(descriptor, report.executor_memory_kb))
        } else {
            None
        };

        let descriptor = descriptor.clone();
        let session = engine.create_session(&descriptor, params.as_ref()).await?;
        let checkpoint_dir = engine.create_checkpoint_dir(&session).await?;
        let context = ExecutionContext::new(session, checkpoint_dir);

        tracing::info!(
            session_id = %context.id(),
            mode = %descriptor.execution_mode(),
            checkpoint_dir = %context.checkpoint_dir(),
            "execution session started"
        );
        #[cfg(feature = "metrics")]
        crate::metrics::record_session_started(&descriptor.execution_mode().to_string());

        self.context = Some(context);
        Ok(())
    }

    /// Release the execution context, the bridge, and the descriptor, in
    /// that order.
    ///
    /// Safe from any state, any number of times, including from within a
    /// failure handler during initialization. Remote teardown failures are
    /// logged and swallowed.
    pub async fn stop(&mut self) {
        if let Some(context) = self.context.take() {
            if let Some(handle) = self.handle.clone() {
                let engine = EngineClient::new(handle);
                if let Err(error) = engine.stop_session(context.session()).await {
                    tracing::warn!(session_id = %context.id(), %error, "remote session stop failed");
                }
            }
            tracing::info!(session_id = %context.id(), "execution session stopped");
        }

        self.bridge.close().await;
        self.handle = None;
        self.descriptor = None;
        self.registry.clear();
        tracing::debug!("controller reset to uninitialized");
    }

    /// Switch the job descriptor to local debug mode, initializing first if
    /// needed.
    pub async fn use_debug(&mut self) -> Result<()> {
        self.ensure_configured("use_debug").await?;
        if let Some(descriptor) = self.descriptor.as_mut() {
            descriptor.set_debug();
        }
        Ok(())
    }

    /// Switch the job descriptor to distributed-cluster mode, initializing
    /// first if needed.
    pub async fn use_distributed(&mut self) -> Result<()> {
        self.ensure_configured("use_distributed").await?;
        if let Some(descriptor) = self.descriptor.as_mut() {
            descriptor.set_distributed();
        }
        Ok(())
    }

    /// Names of images available through the engine's data catalog.
    pub async fn list_images(&mut self) -> Result<Vec<String>> {
        self.ensure_configured("list_images").await?;
        let engine = self.engine_client("list_images")?;
        let provider_properties = self.provider_properties();
        engine.list_images(&provider_properties).await
    }

    /// Load an existing image and wrap it for the caller.
    ///
    /// Requires a running session; starting one is never implicit.
    pub async fn load_image(&mut self, name: &str) -> Result<RasterOp> {
        self.ensure_configured("load_image").await?;
        let (engine, context, descriptor) = self.running_parts("load_image")?;

        let provider_properties = self.provider_properties();
        let remote = engine
            .load_image(name, &provider_properties, context.session())
            .await?;
        tracing::debug!(image = name, remote = %remote, "image loaded");
        Ok(RasterOp::new(remote, engine.bridge().clone(), context, descriptor))
    }

    /// Ingest an image file into the engine.
    ///
    /// Returns `Ok(None)` when the engine reports the ingest sequence
    /// failed. Requires a running session.
    pub async fn ingest_image(
        &mut self,
        path: &str,
        zoom: Option<u32>,
        categorical: Option<bool>,
    ) -> Result<Option<RasterOp>> {
        self.ensure_configured("ingest_image").await?;
        let (engine, context, descriptor) = self.running_parts("ingest_image")?;

        let ingested = engine
            .ingest_image(path, zoom, categorical, &descriptor, context.session())
            .await?;
        Ok(ingested.map(|remote| {
            tracing::debug!(path, remote = %remote, "image ingested");
            RasterOp::new(remote, engine.bridge().clone(), context, descriptor)
        }))
    }

    /// Build a point dataset from interleaved x/y coordinates.
    ///
    /// Requires a running session.
    pub async fn create_points(&mut self, coords: &[f64]) -> Result<VectorOp> {
        self.ensure_configured("create_points").await?;
        let (engine, context, descriptor) = self.running_parts("create_points")?;

        let remote = engine.create_points(coords, context.session()).await?;
        Ok(VectorOp::new(remote, engine.bridge().clone(), context, descriptor))
    }

    /// Re-enter initialization when the controller is not configured yet.
    async fn ensure_configured(&mut self, operation: &'static str) -> Result<()> {
        match self.state() {
            ControllerState::Uninitialized => {
                if self.config.lazy_initialize {
                    tracing::debug!(operation, "lazily initializing controller");
                    self.initialize().await
                } else {
                    Err(Error::InvalidStateTransition {
                        operation,
                        state: ControllerState::Uninitialized,
                    })
                }
            }
            ControllerState::Connected => self.initialize().await,
            ControllerState::Configured | ControllerState::Running => Ok(()),
        }
    }

    fn engine_client(&self, operation: &'static str) -> Result<EngineClient> {
        self.handle
            .clone()
            .map(EngineClient::new)
            .ok_or(Error::InvalidStateTransition {
                operation,
                state: self.state(),
            })
    }

    fn running_parts(
        &self,
        operation: &'static str,
    ) -> Result<(EngineClient, ExecutionContext, JobDescriptor)> {
        match (&self.handle, &self.context, &self.descriptor) {
            (Some(handle), Some(context), Some(descriptor)) => Ok((
                EngineClient::new(handle.clone()),
                context.clone(),
                descriptor.clone(),
            )),
            _ => Err(Error::InvalidStateTransition {
                operation,
                state: self.state(),
            }),
        }
    }

    fn provider_properties(&self) -> String {
        self.descriptor
            .as_ref()
            .map(|d| d.setting_or(settings::PROVIDER_PROPERTIES, "").to_string())
            .unwrap_or_default()
    }
}

/// Builder for constructing an [`EngineController`] with explicit
/// dependencies.
///
/// The builder validates that the required collaborators are provided. A
/// negotiator is optional; without one the standard
/// [`ClusterResourceNegotiator`] is built over the supplied cluster
/// configuration source.
pub struct EngineControllerBuilder {
    config: ControllerConfig,
    connector: Option<Arc<dyn RemoteRuntimeConnector>>,
    catalog: Option<Arc<dyn OperationCatalog>>,
    cluster_config: Option<Arc<dyn ClusterConfigSource>>,
    negotiator: Option<Arc<dyn ResourceNegotiator>>,
}

impl std::fmt::Debug for EngineControllerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineControllerBuilder")
            .field("config", &self.config)
            .field("connector_set", &self.connector.is_some())
            .field("catalog_set", &self.catalog.is_some())
            .field("cluster_config_set", &self.cluster_config.is_some())
            .field("negotiator_set", &self.negotiator.is_some())
            .finish()
    }
}

impl EngineControllerBuilder {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            connector: None,
            catalog: None,
            cluster_config: None,
            negotiator: None,
        }
    }

    /// Set the bridge connector.
    pub fn with_connector(mut self, connector: Arc<dyn RemoteRuntimeConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Set the remote-operation catalog.
    pub fn with_catalog(mut self, catalog: Arc<dyn OperationCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the cluster configuration source.
    pub fn with_cluster_config(mut self, cluster_config: Arc<dyn ClusterConfigSource>) -> Self {
        self.cluster_config = Some(cluster_config);
        self
    }

    /// Override the resource negotiator.
    pub fn with_negotiator(mut self, negotiator: Arc<dyn ResourceNegotiator>) -> Self {
        self.negotiator = Some(negotiator);
        self
    }

    /// Build the controller with all configured dependencies.
    ///
    /// # Errors
    ///
    /// Returns an error if a required dependency is missing.
    pub fn build(self) -> anyhow::Result<EngineController> {
        let connector = self
            .connector
            .ok_or_else(|| anyhow::anyhow!("connector dependency missing"))?;
        let catalog = self
            .catalog
            .ok_or_else(|| anyhow::anyhow!("catalog dependency missing"))?;
        let negotiator = match self.negotiator {
            Some(negotiator) => negotiator,
            None => {
                let cluster_config = self.cluster_config.ok_or_else(|| {
                    anyhow::anyhow!("cluster_config dependency missing (or provide a negotiator)")
                })?;
                Arc::new(ClusterResourceNegotiator::new(cluster_config))
            }
        };

        Ok(EngineController::new(self.config, connector, catalog, negotiator))
    }
}
