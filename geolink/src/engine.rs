//! Typed facade over the bridge for the remote engine's entry points.
//!
//! Everything the lifecycle controller asks of the engine goes through here:
//! configuration defaults, dependency reporting, the cluster resource query,
//! session and checkpoint creation, and the image/point operations. Each
//! method is a thin translation onto [`BridgeHandle`] calls; the engine's
//! own algorithms stay on the other side of the bridge.

use std::collections::HashMap;

use crate::bridge::{BridgeHandle, RemoteRef, RemoteValue};
use crate::error::{Error, Result};
use crate::job::JobDescriptor;
use crate::resources::ClusterLaunchParameters;

/// Remote type names of the engine entry points the control layer uses.
pub mod remote_api {
    pub const DATA_CATALOG: &str = "engine.data.DataCatalog";
    pub const DEPENDENCY_RESOLVER: &str = "engine.deploy.DependencyResolver";
    pub const RESOURCE_REPORTER: &str = "engine.cluster.ResourceReporter";
    pub const EXECUTION_SESSION: &str = "engine.job.ExecutionSession";
    pub const IMAGE_INGESTER: &str = "engine.ingest.ImageIngester";
    pub const POINTS_BUILDER: &str = "engine.vector.PointsBuilder";
}

/// Per-executor resources reported by the cluster resource manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterResourceReport {
    pub executor_memory_kb: i64,
    pub executor_cores: u32,
    pub executor_instances: u32,
}

/// Client for the engine entry points reachable over a live bridge.
#[derive(Clone, Debug)]
pub struct EngineClient {
    bridge: BridgeHandle,
}

impl EngineClient {
    pub fn new(bridge: BridgeHandle) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &BridgeHandle {
        &self.bridge
    }

    /// Configuration defaults reported by the engine's data providers,
    /// merged into the job descriptor before a session starts.
    pub async fn configuration_defaults(&self) -> Result<HashMap<String, String>> {
        let reply = self
            .bridge
            .invoke_static(remote_api::DATA_CATALOG, "configurationDefaults", vec![])
            .await?;
        Ok(reply.into_string_map())
    }

    /// Dependency jars the engine needs shipped to executors.
    pub async fn dependency_jars(&self) -> Result<Vec<String>> {
        let reply = self
            .bridge
            .invoke_static(remote_api::DEPENDENCY_RESOLVER, "collectDependencies", vec![])
            .await?;
        Ok(string_list(&reply))
    }

    /// Query the cluster resource manager for per-executor resources.
    ///
    /// Returns `anyhow::Result` at the collaborator seam; the controller maps
    /// failures to [`Error::ResourceQueryFailed`](crate::Error::ResourceQueryFailed).
    pub async fn cluster_resource_report(&self) -> anyhow::Result<ClusterResourceReport> {
        let reply = self
            .bridge
            .runtime()
            .invoke_static(remote_api::RESOURCE_REPORTER, "reportExecutorResources", vec![])
            .await?;

        let entries = reply
            .as_map()
            .ok_or_else(|| anyhow::anyhow!("resource report was not a map"))?;
        let memory_kb = entries
            .get("executor.memory-kb")
            .and_then(RemoteValue::as_i64)
            .ok_or_else(|| anyhow::anyhow!("resource report missing executor memory"))?;
        let cores = entries
            .get("executor.cores")
            .and_then(RemoteValue::as_i64)
            .ok_or_else(|| anyhow::anyhow!("resource report missing executor cores"))?;
        let instances = entries
            .get("executor.instances")
            .and_then(RemoteValue::as_i64)
            .ok_or_else(|| anyhow::anyhow!("resource report missing executor instances"))?;

        Ok(ClusterResourceReport {
            executor_memory_kb: memory_kb,
            executor_cores: cores as u32,
            executor_instances: instances as u32,
        })
    }

    /// Create the remote execution session from the descriptor and, for
    /// distributed runs, the negotiated launch parameters.
    pub async fn create_session(
        &self,
        descriptor: &JobDescriptor,
        params: Option<&ClusterLaunchParameters>,
    ) -> Result<RemoteRef> {
        let mut args = vec![descriptor_value(descriptor)];
        if let Some(params) = params {
            args.push(params_value(params));
        }
        self.bridge
            .create_object(remote_api::EXECUTION_SESSION, args)
            .await
    }

    /// Create the checkpoint directory tied to a session.
    pub async fn create_checkpoint_dir(&self, session: &RemoteRef) -> Result<String> {
        let reply = self
            .bridge
            .invoke(session, "createCheckpointDirectory", vec![])
            .await?;
        reply
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::RemoteCall {
                target: session.to_string(),
                method: "createCheckpointDirectory".to_string(),
                source: anyhow::anyhow!("reply was not a string"),
            })
    }

    /// Stop a remote session.
    pub async fn stop_session(&self, session: &RemoteRef) -> Result<()> {
        self.bridge.invoke(session, "stop", vec![]).await?;
        Ok(())
    }

    /// Names of images available under the given provider properties.
    pub async fn list_images(&self, provider_properties: &str) -> Result<Vec<String>> {
        let reply = self
            .bridge
            .invoke_static(
                remote_api::DATA_CATALOG,
                "listImages",
                vec![provider_properties.into()],
            )
            .await?;
        Ok(string_list(&reply))
    }

    /// Resolve an image through the engine's catalog and attach it to the
    /// live session.
    pub async fn load_image(
        &self,
        name: &str,
        provider_properties: &str,
        session: &RemoteRef,
    ) -> Result<RemoteRef> {
        let reply = self
            .bridge
            .invoke_static(
                remote_api::DATA_CATALOG,
                "loadImage",
                vec![name.into(), provider_properties.into()],
            )
            .await?;
        let image = expect_ref(reply, remote_api::DATA_CATALOG, "loadImage")?;
        self.attach_session(&image, session).await?;
        Ok(image)
    }

    /// Ingest an image file into the engine.
    ///
    /// The remote constructor is overloaded on the optional zoom and
    /// categorical arguments; present values are forwarded in that order.
    /// Returns `Ok(None)` when the engine reports a failed
    /// setup/execute/teardown sequence.
    pub async fn ingest_image(
        &self,
        path: &str,
        zoom: Option<u32>,
        categorical: Option<bool>,
        descriptor: &JobDescriptor,
        session: &RemoteRef,
    ) -> Result<Option<RemoteRef>> {
        let mut args = vec![RemoteValue::from(path)];
        if let Some(zoom) = zoom {
            args.push(RemoteValue::Int(i64::from(zoom)));
        }
        if let Some(categorical) = categorical {
            args.push(RemoteValue::Bool(categorical));
        }

        let reply = self
            .bridge
            .invoke_static(remote_api::IMAGE_INGESTER, "create", args)
            .await?;
        let ingest = expect_ref(reply, remote_api::IMAGE_INGESTER, "create")?;

        let properties = properties_value(descriptor);
        for (method, args) in [
            ("setup", vec![properties.clone()]),
            ("execute", vec![RemoteValue::Ref(session.clone())]),
            ("teardown", vec![properties]),
        ] {
            let ok = self
                .bridge
                .invoke(&ingest, method, args)
                .await?
                .as_bool()
                .unwrap_or(false);
            if !ok {
                tracing::warn!(path, method, "image ingest step reported failure");
                return Ok(None);
            }
        }

        self.attach_session(&ingest, session).await?;
        Ok(Some(ingest))
    }

    /// Build a point dataset from interleaved x/y coordinates.
    pub async fn create_points(&self, coords: &[f64], session: &RemoteRef) -> Result<RemoteRef> {
        let doubles = coords.iter().copied().map(RemoteValue::Double).collect();
        let reply = self
            .bridge
            .invoke_static(
                remote_api::POINTS_BUILDER,
                "fromCoordinates",
                vec![RemoteValue::List(doubles)],
            )
            .await?;
        let points = expect_ref(reply, remote_api::POINTS_BUILDER, "fromCoordinates")?;
        self.attach_session(&points, session).await?;
        Ok(points)
    }

    async fn attach_session(&self, target: &RemoteRef, session: &RemoteRef) -> Result<()> {
        self.bridge
            .invoke(target, "attachSession", vec![RemoteValue::Ref(session.clone())])
            .await?;
        Ok(())
    }
}

fn expect_ref(value: RemoteValue, target: &str, method: &str) -> Result<RemoteRef> {
    match value {
        RemoteValue::Ref(r) => Ok(r),
        other => Err(Error::RemoteCall {
            target: target.to_string(),
            method: method.to_string(),
            source: anyhow::anyhow!("expected a remote reference, got {other:?}"),
        }),
    }
}

fn string_list(value: &RemoteValue) -> Vec<String> {
    value
        .as_list()
        .unwrap_or(&[])
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn properties_value(descriptor: &JobDescriptor) -> RemoteValue {
    RemoteValue::Map(
        descriptor
            .properties()
            .iter()
            .map(|(k, v)| (k.clone(), RemoteValue::Str(v.clone())))
            .collect(),
    )
}

fn descriptor_value(descriptor: &JobDescriptor) -> RemoteValue {
    let mut entries = HashMap::new();
    entries.insert("name".to_string(), RemoteValue::from(descriptor.name()));
    entries.insert(
        "mode".to_string(),
        RemoteValue::from(descriptor.execution_mode().to_string()),
    );
    entries.insert("debug".to_string(), RemoteValue::Bool(descriptor.is_debug()));
    entries.insert("properties".to_string(), properties_value(descriptor));
    entries.insert(
        "jars".to_string(),
        RemoteValue::List(
            descriptor
                .jars()
                .iter()
                .map(|j| RemoteValue::Str(j.clone()))
                .collect(),
        ),
    );
    RemoteValue::Map(entries)
}

fn params_value(params: &ClusterLaunchParameters) -> RemoteValue {
    let mut entries = HashMap::new();
    entries.insert("master".to_string(), RemoteValue::from(params.master_mode.as_str()));
    entries.insert(
        "executor.memory".to_string(),
        RemoteValue::from(params.executor_memory.as_str()),
    );
    entries.insert(
        "executor.cores".to_string(),
        RemoteValue::Int(i64::from(params.executor_cores)),
    );
    // Left out entirely under dynamic allocation; the cluster manager decides.
    if let Some(instances) = params.executor_instances {
        entries.insert(
            "executor.instances".to_string(),
            RemoteValue::Int(i64::from(instances)),
        );
    }
    RemoteValue::Map(entries)
}
