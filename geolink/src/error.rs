use thiserror::Error;

use crate::controller::ControllerState;

/// Errors surfaced by the control layer.
///
/// Collaborator traits ([`RemoteRuntimeConnector`](crate::bridge::RemoteRuntimeConnector),
/// [`OperationCatalog`](crate::catalog::OperationCatalog)) report failures as
/// `anyhow::Error`; the core maps them into these kinds at each boundary so
/// callers can match on what actually went wrong.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection setup for the cross-process bridge failed. The bridge is
    /// left closed; a later `ensure_open` starts from scratch.
    #[error("bridge unavailable: {0}")]
    BridgeUnavailable(anyhow::Error),

    /// The cluster could not report executor memory or related configuration.
    /// The negotiator never substitutes a guessed default.
    #[error("cluster resource query failed: {0}")]
    ResourceQueryFailed(anyhow::Error),

    /// An operation was called in a state it cannot run from, and lazy
    /// re-initialization was disabled or insufficient (starting a session is
    /// never implicit).
    #[error("cannot {operation} while {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: ControllerState,
    },

    /// The remote-operation catalog collaborator failed during population.
    /// The underlying error is surfaced verbatim.
    #[error("remote catalog population failed: {0}")]
    CatalogPopulation(anyhow::Error),

    /// A remote invocation against the engine failed after the bridge was
    /// established.
    #[error("remote call {method} on {target} failed: {source}")]
    RemoteCall {
        target: String,
        method: String,
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
