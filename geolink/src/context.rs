use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bridge::RemoteRef;

/// Identity of one execution session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The live remote execution session.
///
/// Created by `start`, destroyed by `stop`; at most one is active per
/// controller. A context may also be created externally and adopted via
/// `start(Some(context))`, in which case its launch parameters are assumed
/// already applied.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionContext {
    id: SessionId,
    session: RemoteRef,
    checkpoint_dir: String,
    started_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(session: RemoteRef, checkpoint_dir: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            session,
            checkpoint_dir: checkpoint_dir.into(),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Handle to the remote session object.
    pub fn session(&self) -> &RemoteRef {
        &self.session
    }

    /// Checkpoint directory tied to this session's lifetime.
    pub fn checkpoint_dir(&self) -> &str {
        &self.checkpoint_dir
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
