//! Cross-process bridge to the remote engine runtime.
//!
//! The bridge exposes the remote object space through two traits:
//! [`RemoteRuntime`] ("create object / call method on a remote handle") and
//! [`RemoteRuntimeConnector`] (connection setup). The transport behind them is
//! replaceable; nothing in this crate assumes a particular wire protocol.
//!
//! [`BridgeConnection`] owns the single link per controller. `ensure_open` is
//! idempotent and guarded by one mutex so that exactly one concurrent caller
//! performs connection setup while the rest observe the already-open handle.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Reference to an object living in the remote runtime.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RemoteRef {
    /// Identifier assigned by the remote object space.
    pub target_id: String,
    /// Remote type name, as reported by the engine.
    pub remote_class: String,
}

impl RemoteRef {
    pub fn new(target_id: impl Into<String>, remote_class: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            remote_class: remote_class.into(),
        }
    }
}

impl Display for RemoteRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.remote_class, self.target_id)
    }
}

/// Value crossing the bridge in either direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RemoteValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    List(Vec<RemoteValue>),
    Map(HashMap<String, RemoteValue>),
    Ref(RemoteRef),
}

impl RemoteValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RemoteValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RemoteValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RemoteValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[RemoteValue]> {
        match self {
            RemoteValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, RemoteValue>> {
        match self {
            RemoteValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_ref_value(&self) -> Option<&RemoteRef> {
        match self {
            RemoteValue::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Interpret a `Map` value as string-to-string entries, skipping
    /// non-string values.
    pub fn into_string_map(self) -> HashMap<String, String> {
        match self {
            RemoteValue::Map(entries) => entries
                .into_iter()
                .filter_map(|(k, v)| match v {
                    RemoteValue::Str(s) => Some((k, s)),
                    _ => None,
                })
                .collect(),
            _ => HashMap::new(),
        }
    }
}

impl From<&str> for RemoteValue {
    fn from(value: &str) -> Self {
        RemoteValue::Str(value.to_string())
    }
}

impl From<String> for RemoteValue {
    fn from(value: String) -> Self {
        RemoteValue::Str(value)
    }
}

impl From<i64> for RemoteValue {
    fn from(value: i64) -> Self {
        RemoteValue::Int(value)
    }
}

impl From<f64> for RemoteValue {
    fn from(value: f64) -> Self {
        RemoteValue::Double(value)
    }
}

impl From<bool> for RemoteValue {
    fn from(value: bool) -> Self {
        RemoteValue::Bool(value)
    }
}

impl From<RemoteRef> for RemoteValue {
    fn from(value: RemoteRef) -> Self {
        RemoteValue::Ref(value)
    }
}

/// Where to reach the remote runtime.
///
/// Host and port are the only externally supplied connection parameters.
/// When both are absent the connector starts a local runtime itself.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct BridgeEndpoint {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl BridgeEndpoint {
    /// Endpoint for a locally launched runtime.
    pub fn local() -> Self {
        Self::default()
    }

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
        }
    }
}

impl Display for BridgeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => write!(f, "{host}:{port}"),
            (Some(host), None) => write!(f, "{host}"),
            _ => write!(f, "local"),
        }
    }
}

/// The remote object space exposed by a live bridge.
///
/// Implementors translate these calls onto the underlying RPC/IPC transport.
/// Calls are synchronous from the caller's perspective and carry no internal
/// timeout or retry; cancellation is the caller's responsibility.
#[async_trait]
pub trait RemoteRuntime: Send + Sync {
    /// Construct an object in the remote runtime.
    async fn create_object(
        &self,
        remote_class: &str,
        args: Vec<RemoteValue>,
    ) -> anyhow::Result<RemoteRef>;

    /// Invoke a method on a remote object.
    async fn invoke(
        &self,
        target: &RemoteRef,
        method: &str,
        args: Vec<RemoteValue>,
    ) -> anyhow::Result<RemoteValue>;

    /// Invoke a static entry point on a remote type.
    async fn invoke_static(
        &self,
        remote_class: &str,
        method: &str,
        args: Vec<RemoteValue>,
    ) -> anyhow::Result<RemoteValue>;

    /// Tear the remote runtime down.
    async fn shutdown(&self) -> anyhow::Result<()>;
}

/// Connection setup for the bridge.
///
/// Implementors either dial an already-running runtime at the endpoint or
/// launch one locally when the endpoint is empty.
#[async_trait]
pub trait RemoteRuntimeConnector: Send + Sync {
    async fn connect(&self, endpoint: &BridgeEndpoint) -> anyhow::Result<Arc<dyn RemoteRuntime>>;
}

/// Identity of one established bridge.
///
/// A fresh id is minted per successful connection, so a bridge opened after a
/// `close` is distinguishable from any prior one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BridgeId(pub Uuid);

impl BridgeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BridgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for BridgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to an open bridge: the remote object space plus identity metadata.
///
/// Cheap to clone; all clones refer to the same underlying link.
#[derive(Clone)]
pub struct BridgeHandle {
    id: BridgeId,
    runtime: Arc<dyn RemoteRuntime>,
    connected_at: DateTime<Utc>,
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("id", &self.id)
            .field("connected_at", &self.connected_at)
            .finish_non_exhaustive()
    }
}

impl BridgeHandle {
    pub fn new(runtime: Arc<dyn RemoteRuntime>) -> Self {
        Self {
            id: BridgeId::new(),
            runtime,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> BridgeId {
        self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn runtime(&self) -> Arc<dyn RemoteRuntime> {
        Arc::clone(&self.runtime)
    }

    /// Construct a remote object, mapping transport failures to
    /// [`Error::RemoteCall`].
    pub async fn create_object(
        &self,
        remote_class: &str,
        args: Vec<RemoteValue>,
    ) -> Result<RemoteRef> {
        self.runtime
            .create_object(remote_class, args)
            .await
            .map_err(|source| Error::RemoteCall {
                target: remote_class.to_string(),
                method: "<constructor>".to_string(),
                source,
            })
    }

    /// Invoke a method on a remote object, mapping transport failures to
    /// [`Error::RemoteCall`].
    pub async fn invoke(
        &self,
        target: &RemoteRef,
        method: &str,
        args: Vec<RemoteValue>,
    ) -> Result<RemoteValue> {
        self.runtime
            .invoke(target, method, args)
            .await
            .map_err(|source| Error::RemoteCall {
                target: target.to_string(),
                method: method.to_string(),
                source,
            })
    }

    /// Invoke a static entry point, mapping transport failures to
    /// [`Error::RemoteCall`].
    pub async fn invoke_static(
        &self,
        remote_class: &str,
        method: &str,
        args: Vec<RemoteValue>,
    ) -> Result<RemoteValue> {
        self.runtime
            .invoke_static(remote_class, method, args)
            .await
            .map_err(|source| Error::RemoteCall {
                target: remote_class.to_string(),
                method: method.to_string(),
                source,
            })
    }
}

/// Owns the single cross-process link for a controller.
///
/// The open slot is behind one `tokio::sync::Mutex`; that lock is the only
/// synchronization in the control layer, since connection setup is the only
/// contended section. Retry policy belongs to the caller.
pub struct BridgeConnection {
    connector: Arc<dyn RemoteRuntimeConnector>,
    slot: Mutex<Option<BridgeHandle>>,
}

impl std::fmt::Debug for BridgeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.slot.try_lock() {
            Ok(slot) => {
                if slot.is_some() {
                    "open"
                } else {
                    "closed"
                }
            }
            Err(_) => "<locked>",
        };
        f.debug_struct("BridgeConnection")
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

impl BridgeConnection {
    pub fn new(connector: Arc<dyn RemoteRuntimeConnector>) -> Self {
        Self {
            connector,
            slot: Mutex::new(None),
        }
    }

    /// Open the bridge if it is not open yet and return its handle.
    ///
    /// Idempotent: if the bridge is already open the existing handle is
    /// returned unchanged. Under concurrent callers exactly one performs the
    /// connection setup; the others block on the lock and then observe the
    /// open state. On setup failure the slot stays unset so a later call can
    /// retry cleanly.
    pub async fn ensure_open(&self, endpoint: &BridgeEndpoint) -> Result<BridgeHandle> {
        let mut slot = self.slot.lock().await;

        if let Some(handle) = slot.as_ref() {
            tracing::debug!(bridge_id = %handle.id(), "bridge already open");
            return Ok(handle.clone());
        }

        tracing::info!(endpoint = %endpoint, "opening bridge");
        let runtime = self
            .connector
            .connect(endpoint)
            .await
            .map_err(Error::BridgeUnavailable)?;

        let handle = BridgeHandle::new(runtime);
        tracing::info!(bridge_id = %handle.id(), endpoint = %endpoint, "bridge open");
        #[cfg(feature = "metrics")]
        crate::metrics::record_bridge_opened(&endpoint.to_string());

        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Whether a bridge is currently open.
    pub async fn is_open(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Handle to the open bridge, if any.
    pub async fn handle(&self) -> Option<BridgeHandle> {
        self.slot.lock().await.clone()
    }

    /// Close the bridge, shutting the remote runtime down.
    ///
    /// Idempotent: closing an already-closed bridge is a no-op. Shutdown
    /// failures are logged and swallowed so teardown paths never raise.
    pub async fn close(&self) {
        let taken = self.slot.lock().await.take();
        if let Some(handle) = taken {
            tracing::info!(bridge_id = %handle.id(), "closing bridge");
            if let Err(error) = handle.runtime().shutdown().await {
                tracing::warn!(bridge_id = %handle.id(), %error, "remote runtime shutdown failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubRuntime;

    #[async_trait]
    impl RemoteRuntime for StubRuntime {
        async fn create_object(
            &self,
            remote_class: &str,
            _args: Vec<RemoteValue>,
        ) -> anyhow::Result<RemoteRef> {
            Ok(RemoteRef::new("obj-1", remote_class))
        }

        async fn invoke(
            &self,
            _target: &RemoteRef,
            _method: &str,
            _args: Vec<RemoteValue>,
        ) -> anyhow::Result<RemoteValue> {
            Ok(RemoteValue::Null)
        }

        async fn invoke_static(
            &self,
            _remote_class: &str,
            _method: &str,
            _args: Vec<RemoteValue>,
        ) -> anyhow::Result<RemoteValue> {
            Ok(RemoteValue::Null)
        }

        async fn shutdown(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct CountingConnector {
        connects: AtomicUsize,
        fail: bool,
    }

    impl CountingConnector {
        fn new(fail: bool) -> Self {
            Self {
                connects: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl RemoteRuntimeConnector for CountingConnector {
        async fn connect(
            &self,
            _endpoint: &BridgeEndpoint,
        ) -> anyhow::Result<Arc<dyn RemoteRuntime>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("refused");
            }
            Ok(Arc::new(StubRuntime))
        }
    }

    #[tokio::test]
    async fn ensure_open_is_idempotent() {
        let connector = Arc::new(CountingConnector::new(false));
        let bridge = BridgeConnection::new(connector.clone());

        let first = bridge.ensure_open(&BridgeEndpoint::local()).await.unwrap();
        let second = bridge.ensure_open(&BridgeEndpoint::local()).await.unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_connect_leaves_slot_unset() {
        let connector = Arc::new(CountingConnector::new(true));
        let bridge = BridgeConnection::new(connector.clone());

        let result = bridge.ensure_open(&BridgeEndpoint::local()).await;
        assert!(matches!(result, Err(Error::BridgeUnavailable(_))));
        assert!(!bridge.is_open().await);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let connector = Arc::new(CountingConnector::new(false));
        let bridge = BridgeConnection::new(connector);

        bridge.close().await;
        bridge.ensure_open(&BridgeEndpoint::local()).await.unwrap();
        bridge.close().await;
        bridge.close().await;
        assert!(!bridge.is_open().await);
    }

    #[tokio::test]
    async fn reopen_after_close_mints_fresh_id() {
        let connector = Arc::new(CountingConnector::new(false));
        let bridge = BridgeConnection::new(connector.clone());

        let first = bridge.ensure_open(&BridgeEndpoint::local()).await.unwrap();
        bridge.close().await;
        let second = bridge.ensure_open(&BridgeEndpoint::local()).await.unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn endpoint_display() {
        assert_eq!(BridgeEndpoint::local().to_string(), "local");
        assert_eq!(BridgeEndpoint::new("engine-host", 7654).to_string(), "engine-host:7654");
    }

    #[test]
    fn string_map_conversion_skips_non_strings() {
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), RemoteValue::Str("1".to_string()));
        entries.insert("b".to_string(), RemoteValue::Int(2));

        let converted = RemoteValue::Map(entries).into_string_map();
        assert_eq!(converted.len(), 1);
        assert_eq!(converted.get("a").map(String::as_str), Some("1"));
    }
}
