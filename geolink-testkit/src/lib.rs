//! Test doubles for the geolink control layer.
//!
//! Provides an in-memory remote runtime with scripted replies and call
//! recording, a mock connector and operation catalog, and a recording
//! resource negotiator for call-count assertions.

pub mod mock;
pub mod runtime;

pub use mock::{MockCatalog, RecordingNegotiator, TestOperationFactory, TestOperationKind};
pub use runtime::{CallRecord, MockConnector, MockRemoteRuntime};
