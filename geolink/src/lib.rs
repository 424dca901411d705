//! GeoLink - Client control layer for a remote raster/vector processing engine.
//!
//! A foundational crate for driving a cluster-hosted distributed processing
//! engine from a separate process: it owns the cross-process bridge, builds
//! the remote job description, negotiates cluster launch resources, and
//! orchestrates the initialize/start/stop lifecycle.
//!
//! # Core Concepts
//!
//! - **Bridge**: The single cross-process link to the remote runtime. The
//!   [`RemoteRuntime`] and [`RemoteRuntimeConnector`] traits abstract the
//!   transport; [`BridgeConnection`] guarantees at most one link per
//!   controller and makes opening idempotent.
//!
//! - **Job Descriptor**: The [`JobDescriptor`] describes how a unit of
//!   distributed work launches (name, execution mode, properties, jars).
//!   Distributed-cluster mode is the default; debug mode is an explicit
//!   switch.
//!
//! - **Resource Negotiation**: The [`ResourceNegotiator`] trait and
//!   [`ClusterResourceNegotiator`] implementation derive executor memory,
//!   cores, and instance counts from cluster-reported values, including the
//!   double overhead charge applied in client-gateway deployments.
//!
//! - **Lifecycle**: The [`EngineController`] ties the pieces together,
//!   enforcing ordering and idempotency across initialize/start/stop and
//!   guaranteeing cleanup on partial failure.
//!
//! - **Operation Catalog**: The [`OperationCatalog`] collaborator discovers
//!   the engine's remote operation surface once per initialization and
//!   registers factories in an [`OperationRegistry`].
//!
//! # Feature Flags
//!
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use geolink::*;
//! use std::sync::Arc;
//!
//! let mut controller = EngineControllerBuilder::new(ControllerConfig::new("analysis"))
//!     .with_connector(connector)
//!     .with_catalog(catalog)
//!     .with_cluster_config(cluster_config)
//!     .build()?;
//!
//! controller.initialize().await?;
//! controller.start(None).await?;
//! let elevation = controller.load_image("elevation-conus").await?;
//! controller.stop().await;
//! ```

/// Cross-process bridge to the remote engine runtime.
///
/// The `bridge` module defines the transport abstraction and connection
/// ownership:
/// - [`RemoteRuntime`] - the remote object space (create/invoke/shutdown)
/// - [`RemoteRuntimeConnector`] - connection setup
/// - [`BridgeConnection`] - the idempotent, mutex-guarded open slot
/// - [`BridgeHandle`], [`BridgeId`] - identity of one established link
/// - [`RemoteRef`], [`RemoteValue`], [`BridgeEndpoint`]
pub mod bridge;

/// Remote-operation catalog boundary.
///
/// The `catalog` module defines the [`OperationCatalog`] collaborator trait,
/// the name-keyed [`OperationRegistry`], and the [`OperationFactory`] /
/// [`OperationBinding`] pair used to produce caller-facing wrappers.
pub mod catalog;

/// Cluster and controller configuration.
///
/// The `config` module provides the read-only [`ClusterConfigSource`]
/// lookup consulted by the resource negotiator, an in-memory
/// implementation, and [`ControllerConfig`].
pub mod config;

/// Execution session types.
///
/// The `context` module defines [`ExecutionContext`] (the live remote
/// session handle plus its checkpoint directory) and [`SessionId`].
pub mod context;

/// Lifecycle orchestration.
///
/// The `controller` module provides [`EngineController`], its
/// [`ControllerState`] machine, and [`EngineControllerBuilder`].
pub mod controller;

/// Typed facade over the bridge for the engine's entry points.
///
/// The `engine` module translates the control layer's needs (configuration
/// defaults, resource queries, session creation, image and point
/// operations) onto raw bridge calls.
pub mod engine;

/// Typed error kinds for the control layer.
pub mod error;

/// Job descriptor types.
///
/// The `job` module defines [`JobDescriptor`] and [`ExecutionMode`].
pub mod job;

/// Caller-facing result wrappers ([`RasterOp`], [`VectorOp`]).
pub mod ops;

/// Cluster launch-parameter negotiation.
///
/// The `resources` module defines [`ClusterLaunchParameters`], the
/// [`ResourceNegotiator`] trait, and the standard
/// [`ClusterResourceNegotiator`].
pub mod resources;

#[cfg(feature = "metrics")]
/// Prometheus metrics instrumentation.
///
/// The `metrics` module provides counters for bridge, session, and
/// operation events when the `metrics` feature is enabled.
pub mod metrics;

/// Tracing span helpers for lifecycle and operation events.
pub mod telemetry;

pub use bridge::*;
pub use catalog::*;
pub use config::*;
pub use context::*;
pub use controller::*;
pub use engine::*;
pub use error::*;
pub use job::*;
pub use ops::*;
pub use resources::*;
