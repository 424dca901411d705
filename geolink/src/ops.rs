//! Caller-facing result wrappers.
//!
//! These are intentionally thin: a remote object handle plus the bridge,
//! session, and descriptor it was produced under. Their operation methods
//! are generated by the catalog collaborator and live outside the core.

use crate::bridge::{BridgeHandle, RemoteRef};
use crate::context::ExecutionContext;
use crate::job::JobDescriptor;

/// A raster dataset living in the remote engine.
#[derive(Clone, Debug)]
pub struct RasterOp {
    remote: RemoteRef,
    bridge: BridgeHandle,
    context: ExecutionContext,
    descriptor: JobDescriptor,
}

impl RasterOp {
    pub fn new(
        remote: RemoteRef,
        bridge: BridgeHandle,
        context: ExecutionContext,
        descriptor: JobDescriptor,
    ) -> Self {
        Self {
            remote,
            bridge,
            context,
            descriptor,
        }
    }

    pub fn remote(&self) -> &RemoteRef {
        &self.remote
    }

    pub fn bridge(&self) -> &BridgeHandle {
        &self.bridge
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }
}

/// A vector dataset living in the remote engine.
#[derive(Clone, Debug)]
pub struct VectorOp {
    remote: RemoteRef,
    bridge: BridgeHandle,
    context: ExecutionContext,
    descriptor: JobDescriptor,
}

impl VectorOp {
    pub fn new(
        remote: RemoteRef,
        bridge: BridgeHandle,
        context: ExecutionContext,
        descriptor: JobDescriptor,
    ) -> Self {
        Self {
            remote,
            bridge,
            context,
            descriptor,
        }
    }

    pub fn remote(&self) -> &RemoteRef {
        &self.remote
    }

    pub fn bridge(&self) -> &BridgeHandle {
        &self.bridge
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }
}

/// Wrapper produced by an operation factory.
#[derive(Clone, Debug)]
pub enum OperationWrapper {
    Raster(RasterOp),
    Vector(VectorOp),
}
