//! Bridge connection tests under shared, concurrent use.

use std::sync::Arc;

use geolink::{BridgeConnection, BridgeEndpoint};
use geolink_testkit::MockConnector;

#[tokio::test]
async fn concurrent_ensure_open_performs_one_connection_setup() {
    let connector = Arc::new(MockConnector::new());
    let bridge = Arc::new(BridgeConnection::new(connector.clone()));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let bridge = Arc::clone(&bridge);
        tasks.push(tokio::spawn(async move {
            bridge.ensure_open(&BridgeEndpoint::local()).await.unwrap().id()
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }

    // every caller observed the same bridge, set up exactly once
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    connector.assert_connect_count_eq(1);
}

#[tokio::test]
async fn failed_setup_does_not_poison_the_lock() {
    let connector = Arc::new(MockConnector::new());
    let bridge = BridgeConnection::new(connector.clone());

    connector.fail_next_connects(2);
    assert!(bridge.ensure_open(&BridgeEndpoint::local()).await.is_err());
    assert!(bridge.ensure_open(&BridgeEndpoint::local()).await.is_err());
    assert!(!bridge.is_open().await);

    // third attempt succeeds cleanly
    let handle = bridge.ensure_open(&BridgeEndpoint::local()).await.unwrap();
    assert!(bridge.is_open().await);
    assert_eq!(bridge.handle().await.unwrap().id(), handle.id());
    connector.assert_connect_count_eq(3);
}

#[tokio::test]
async fn close_shuts_the_remote_runtime_down_once() {
    let connector = Arc::new(MockConnector::new());
    let bridge = BridgeConnection::new(connector.clone());

    bridge.ensure_open(&BridgeEndpoint::local()).await.unwrap();
    bridge.close().await;
    bridge.close().await;

    assert_eq!(connector.runtime().shutdown_count(), 1);
}
