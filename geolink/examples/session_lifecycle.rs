//! Full controller lifecycle example against in-memory test doubles.
//!
//! This example demonstrates how to wire an EngineController with
//! geolink-testkit's mock connector and catalog, run a distributed session,
//! and inspect the negotiated launch parameters.

use std::sync::Arc;

use geolink::engine::remote_api;
use geolink::{ControllerConfig, EngineControllerBuilder, InMemoryClusterConfig, RemoteValue};
use geolink_testkit::{MockCatalog, MockConnector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== GeoLink Session Lifecycle Example ===\n");
    println!("This example demonstrates:");
    println!("- Bridge setup through a mock connector");
    println!("- Operation catalog population");
    println!("- Distributed resource negotiation");
    println!("- Image and point operations\n");

    // Create the collaborators
    let connector = Arc::new(MockConnector::new());
    let catalog = Arc::new(MockCatalog::with_operations(["slope", "aspect", "add"]));
    let cluster_config = Arc::new(InMemoryClusterConfig::new());

    // Seed the mock engine
    let runtime = connector.runtime();
    runtime.set_resource_report(10_000, 2, 4);
    runtime.set_images(vec![
        "elevation-conus".to_string(),
        "landcover-conus".to_string(),
    ]);

    // Build the controller
    let mut controller = EngineControllerBuilder::new(ControllerConfig::new("example-session"))
        .with_connector(connector.clone())
        .with_catalog(catalog)
        .with_cluster_config(cluster_config)
        .build()?;

    println!("1. Initializing (bridge + descriptor + catalog)...");
    controller.initialize().await?;
    println!("   State: {}", controller.state());
    println!("   Bridge: {}", controller.bridge_id().unwrap());
    println!("   Operations: {:?}", controller.operations().names());

    println!("\n2. Starting a distributed session...");
    controller.start(None).await?;
    let context = controller.execution_context().unwrap();
    println!("   Session: {}", context.id());
    println!("   Checkpoint dir: {}", context.checkpoint_dir());

    // Show what the negotiator handed to the cluster scheduler
    let params = runtime
        .calls()
        .into_iter()
        .find(|c| c.remote_class == remote_api::EXECUTION_SESSION && c.method == "<constructor>")
        .and_then(|c| c.args.get(1).cloned());
    if let Some(RemoteValue::Map(entries)) = params {
        println!("\n3. Negotiated launch parameters:");
        let mut keys: Vec<_> = entries.keys().collect();
        keys.sort();
        for key in keys {
            println!("   {key} = {:?}", entries[key]);
        }
    }

    println!("\n4. Listing and loading images...");
    for image in controller.list_images().await? {
        println!("   available: {image}");
    }
    let elevation = controller.load_image("elevation-conus").await?;
    println!("   loaded: {}", elevation.remote());

    println!("\n5. Building a point dataset...");
    let points = controller
        .create_points(&[-112.5, 42.1, -110.3, 43.8])
        .await?;
    println!("   created: {}", points.remote());

    println!("\n6. Stopping (session -> bridge -> descriptor)...");
    controller.stop().await;
    println!("   State: {}", controller.state());

    println!("\n=== Example Complete ===");
    println!("\nKey takeaways:");
    println!("- initialize() is idempotent; one bridge per controller");
    println!("- start(None) negotiates resources only in distributed mode");
    println!("- start(Some(context)) adopts an external session verbatim");
    println!("- stop() is always safe, from any state");

    Ok(())
}
