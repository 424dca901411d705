//! Lifecycle integration tests for the geolink controller.
//!
//! Tests bridge idempotency, teardown-on-failure, lazy re-entry,
//! context adoption, and the state requirements of the high-level
//! operations.

use std::sync::Arc;

use geolink::{
    ControllerConfig, ControllerState, EngineController, EngineControllerBuilder, Error,
    ExecutionContext, RemoteRef,
};
use geolink_testkit::{MockCatalog, MockConnector, RecordingNegotiator};

struct Harness {
    controller: EngineController,
    connector: Arc<MockConnector>,
    catalog: Arc<MockCatalog>,
    negotiator: Arc<RecordingNegotiator>,
}

fn harness_with_config(config: ControllerConfig) -> Harness {
    let connector = Arc::new(MockConnector::new());
    let catalog = Arc::new(MockCatalog::new());
    let negotiator = Arc::new(RecordingNegotiator::standard());

    let controller = EngineControllerBuilder::new(config)
        .with_connector(connector.clone())
        .with_catalog(catalog.clone())
        .with_negotiator(negotiator.clone())
        .build()
        .expect("builder should succeed");

    Harness {
        controller,
        connector,
        catalog,
        negotiator,
    }
}

fn harness() -> Harness {
    harness_with_config(ControllerConfig::new("lifecycle-test"))
}

fn external_context() -> ExecutionContext {
    ExecutionContext::new(
        RemoteRef::new("obj-external", "engine.job.ExecutionSession"),
        "/tmp/external-checkpoint",
    )
}

#[tokio::test]
async fn repeated_initialize_creates_one_bridge() {
    let mut h = harness();

    h.controller.initialize().await.unwrap();
    let first = h.controller.bridge_id().unwrap();

    h.controller.initialize().await.unwrap();
    h.controller.initialize().await.unwrap();
    let last = h.controller.bridge_id().unwrap();

    assert_eq!(first, last);
    h.connector.assert_connect_count_eq(1);
    // the catalog runs once per successful initialize
    h.catalog.assert_populate_count_eq(3);
}

#[tokio::test]
async fn stop_then_initialize_yields_fresh_bridge() {
    let mut h = harness();

    h.controller.initialize().await.unwrap();
    let first = h.controller.bridge_id().unwrap();

    h.controller.stop().await;
    h.controller.initialize().await.unwrap();
    let second = h.controller.bridge_id().unwrap();

    assert_ne!(first, second);
    h.connector.assert_connect_count_eq(2);
}

#[tokio::test]
async fn stop_is_safe_from_any_state() {
    let mut h = harness();

    // before any initialize
    h.controller.stop().await;
    h.controller.stop().await;
    assert_eq!(h.controller.state(), ControllerState::Uninitialized);

    h.controller.initialize().await.unwrap();
    h.controller.stop().await;
    h.controller.stop().await;
    assert_eq!(h.controller.state(), ControllerState::Uninitialized);

    h.controller.initialize().await.unwrap();
    h.controller.start(None).await.unwrap();
    h.controller.stop().await;
    h.controller.stop().await;
    assert_eq!(h.controller.state(), ControllerState::Uninitialized);
}

#[tokio::test]
async fn failed_catalog_population_tears_down_and_is_retryable() {
    let h = harness();
    let mut controller = h.controller;

    h.catalog.set_fail(true);
    let error = controller.initialize().await.unwrap_err();
    assert!(matches!(error, Error::CatalogPopulation(_)));

    // full teardown: no leaked bridge, controller reusable
    assert_eq!(controller.state(), ControllerState::Uninitialized);
    assert!(controller.bridge_id().is_none());
    assert_eq!(h.connector.runtime().shutdown_count(), 1);

    h.catalog.set_fail(false);
    controller.initialize().await.unwrap();
    assert_eq!(controller.state(), ControllerState::Configured);
    h.connector.assert_connect_count_eq(2);
}

#[tokio::test]
async fn failed_connect_surfaces_bridge_unavailable_and_is_retryable() {
    let h = harness();
    let mut controller = h.controller;

    h.connector.fail_next_connects(1);
    let error = controller.initialize().await.unwrap_err();
    assert!(matches!(error, Error::BridgeUnavailable(_)));
    assert_eq!(controller.state(), ControllerState::Uninitialized);

    controller.initialize().await.unwrap();
    assert_eq!(controller.state(), ControllerState::Configured);
}

#[tokio::test]
async fn supplied_context_is_adopted_without_negotiation() {
    let h = harness();
    let mut controller = h.controller;

    controller.initialize().await.unwrap();
    controller.start(Some(external_context())).await.unwrap();

    assert_eq!(controller.state(), ControllerState::Running);
    h.negotiator.assert_call_count_eq(0);
    assert_eq!(
        controller.execution_context().unwrap().checkpoint_dir(),
        "/tmp/external-checkpoint"
    );
}

#[tokio::test]
async fn distributed_start_negotiates_once() {
    let h = harness();
    let mut controller = h.controller;

    controller.initialize().await.unwrap();
    controller.start(None).await.unwrap();

    assert_eq!(controller.state(), ControllerState::Running);
    h.negotiator.assert_call_count_eq(1);
    assert_eq!(
        controller.execution_context().unwrap().checkpoint_dir(),
        "/tmp/geolink-checkpoint"
    );
}

#[tokio::test]
async fn debug_mode_start_skips_negotiation() {
    let h = harness();
    let mut controller = h.controller;

    controller.use_debug().await.unwrap();
    controller.start(None).await.unwrap();

    assert_eq!(controller.state(), ControllerState::Running);
    h.negotiator.assert_call_count_eq(0);
}

#[tokio::test]
async fn start_while_running_is_rejected() {
    let h = harness();
    let mut controller = h.controller;

    controller.initialize().await.unwrap();
    controller.start(None).await.unwrap();

    let error = controller.start(None).await.unwrap_err();
    assert!(matches!(
        error,
        Error::InvalidStateTransition {
            operation: "start",
            ..
        }
    ));
}

#[tokio::test]
async fn operations_lazily_initialize_the_controller() {
    let h = harness();
    let mut controller = h.controller;

    h.connector.runtime().set_images(vec![
        "elevation-conus".to_string(),
        "landcover-conus".to_string(),
    ]);

    // no explicit initialize
    let images = controller.list_images().await.unwrap();
    assert_eq!(images, vec!["elevation-conus", "landcover-conus"]);
    assert_eq!(controller.state(), ControllerState::Configured);
    h.connector.assert_connect_count_eq(1);
}

#[tokio::test]
async fn lazy_disabled_requires_explicit_initialize() {
    let config = ControllerConfig::new("strict").with_lazy_initialize(false);
    let h = harness_with_config(config);
    let mut controller = h.controller;

    let error = controller.start(None).await.unwrap_err();
    assert!(matches!(error, Error::InvalidStateTransition { .. }));

    let error = controller.list_images().await.unwrap_err();
    assert!(matches!(error, Error::InvalidStateTransition { .. }));

    controller.initialize().await.unwrap();
    controller.start(None).await.unwrap();
    assert_eq!(controller.state(), ControllerState::Running);
}

#[tokio::test]
async fn load_image_requires_a_running_session() {
    let h = harness();
    let mut controller = h.controller;

    controller.initialize().await.unwrap();
    let error = controller.load_image("elevation-conus").await.unwrap_err();
    assert!(matches!(
        error,
        Error::InvalidStateTransition {
            operation: "load_image",
            state: ControllerState::Configured,
        }
    ));

    // starting is never implicit; after an explicit start it works
    controller.start(None).await.unwrap();
    let raster = controller.load_image("elevation-conus").await.unwrap();
    assert_eq!(raster.remote().remote_class, "engine.raster.RasterOperation");
}

#[tokio::test]
async fn ingest_image_surfaces_engine_reported_failure_as_none() {
    let h = harness();
    let mut controller = h.controller;

    controller.initialize().await.unwrap();
    controller.start(None).await.unwrap();

    let ingested = controller
        .ingest_image("/data/scene.tif", Some(10), None)
        .await
        .unwrap();
    assert!(ingested.is_some());

    h.connector.runtime().respond_with(
        geolink::engine::remote_api::IMAGE_INGESTER,
        "execute",
        geolink::RemoteValue::Bool(false),
    );
    let failed = controller
        .ingest_image("/data/broken.tif", None, Some(true))
        .await
        .unwrap();
    assert!(failed.is_none());
}

#[tokio::test]
async fn create_points_returns_a_vector_wrapper() {
    let h = harness();
    let mut controller = h.controller;

    controller.initialize().await.unwrap();
    controller.start(None).await.unwrap();

    let points = controller
        .create_points(&[-112.5, 42.1, -110.3, 43.8])
        .await
        .unwrap();
    assert_eq!(points.remote().remote_class, "engine.vector.VectorOperation");
}

#[tokio::test]
async fn stop_releases_session_then_bridge_then_descriptor() {
    let h = harness();
    let mut controller = h.controller;

    controller.initialize().await.unwrap();
    controller.start(None).await.unwrap();
    assert!(!controller.operations().is_empty());

    controller.stop().await;

    let runtime = h.connector.runtime();
    assert_eq!(runtime.call_count("engine.job.ExecutionSession", "stop"), 1);
    assert_eq!(runtime.shutdown_count(), 1);
    assert_eq!(controller.state(), ControllerState::Uninitialized);
    assert!(controller.descriptor().is_none());
    assert!(controller.operations().is_empty());
}

#[tokio::test]
async fn start_merges_engine_configuration_defaults_and_jars() {
    let h = harness();
    let mut controller = h.controller;

    let runtime = h.connector.runtime();
    runtime.set_configuration_defaults(
        [("provider.cache".to_string(), "enabled".to_string())]
            .into_iter()
            .collect(),
    );
    runtime.set_dependency_jars(vec!["engine-core.jar".to_string()]);

    controller.initialize().await.unwrap();
    controller.start(None).await.unwrap();

    let descriptor = controller.descriptor().unwrap();
    assert_eq!(descriptor.setting("provider.cache"), Some("enabled"));
    assert!(descriptor.jars().contains("engine-core.jar"));
}

#[tokio::test]
async fn registered_factories_bind_result_wrappers() {
    let h = harness();
    let mut controller = h.controller;

    controller.initialize().await.unwrap();
    controller.start(None).await.unwrap();

    let factory = controller.operations().get("slope").unwrap();
    let binding = geolink::OperationBinding {
        remote: RemoteRef::new("obj-slope", "engine.raster.RasterOperation"),
        bridge: controller.bridge_handle().unwrap().clone(),
        context: controller.execution_context().unwrap().clone(),
        descriptor: controller.descriptor().unwrap().clone(),
    };

    match factory.bind(binding) {
        geolink::OperationWrapper::Raster(raster) => {
            assert_eq!(raster.remote().target_id, "obj-slope");
        }
        geolink::OperationWrapper::Vector(_) => panic!("expected a raster wrapper"),
    }
}

#[tokio::test]
async fn builder_rejects_missing_dependencies() {
    let result = EngineControllerBuilder::new(ControllerConfig::new("incomplete"))
        .with_catalog(Arc::new(MockCatalog::new()))
        .build();
    assert!(result.is_err());

    let result = EngineControllerBuilder::new(ControllerConfig::new("incomplete"))
        .with_connector(Arc::new(MockConnector::new()))
        .with_catalog(Arc::new(MockCatalog::new()))
        .build();
    // no negotiator and no cluster config to build one from
    assert!(result.is_err());
}
