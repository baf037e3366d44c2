//! CUDA core probe.
//!
//! Runs a short-lived helper container with the GPU devices and CUDA libraries
//! bound in, and parses what it prints into the device name and capability
//! metrics. The probe is best effort: every failure is logged and reported as
//! "no information", never propagated into the detection cycle.

pub mod output;
pub mod version;

pub use output::{CudaCoreInfo, ProbeParseError, ProbeSchema, parse_probe_output};
pub use version::{ImageVersion, resolve_tag};

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::container::{ContainerRuntime, ErrorClass, RunSpec, RuntimeError};
use crate::detect::CliAssets;

/// Probe image and container settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    pub agent_image: String,
    pub probe_image: String,
    pub default_tag: String,
    pub build_context: PathBuf,
    pub dockerfile: String,
    pub container_name: String,
    pub schema: ProbeSchema,
}

impl ProbeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            agent_image: config.agent_image.clone(),
            probe_image: config.probe_image.clone(),
            default_tag: config.probe_default_tag.clone(),
            build_context: config.probe_build_context.clone(),
            dockerfile: config.probe_dockerfile.clone(),
            container_name: config.probe_container_name.clone(),
            schema: config.probe_schema,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("failed to parse probe output: {0}")]
    Parse(#[from] ProbeParseError),
}

impl ProbeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProbeError::Runtime(e) => e.class(),
            ProbeError::Parse(_) => ErrorClass::Degrade,
        }
    }
}

pub struct CudaCoreProbe {
    runtime: Arc<dyn ContainerRuntime>,
    settings: ProbeSettings,
    /// Serializes image builds so a tag is never built twice at once
    build_lock: Mutex<()>,
}

impl CudaCoreProbe {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, settings: ProbeSettings) -> Self {
        Self {
            runtime,
            settings,
            build_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Run the probe with the given assets
    ///
    /// Returns `None` on any failure.
    pub async fn run(&self, assets: &CliAssets) -> Option<CudaCoreInfo> {
        match self.try_run(assets).await {
            Ok(info) => {
                info!(
                    name = %info.name,
                    resources = ?info.resources,
                    "probed CUDA capabilities"
                );
                Some(info)
            }
            Err(e) => {
                match e.class() {
                    ErrorClass::Unexpected => error!(error = %e, "unable to infer CUDA cores"),
                    ErrorClass::Retryable | ErrorClass::Degrade => {
                        warn!(error = %e, "unable to infer CUDA cores")
                    }
                }
                debug!(libraries = ?assets.libraries, "probe libraries");
                None
            }
        }
    }

    /// Resolve, build if needed, run and parse, propagating every failure
    pub async fn try_run(&self, assets: &CliAssets) -> Result<CudaCoreInfo, ProbeError> {
        let tag = self.resolve_tag().await;
        let image = format!("{}:{}", self.settings.probe_image, tag);

        self.ensure_image(&image).await?;

        let spec = RunSpec {
            image,
            name: self.settings.container_name.clone(),
            devices: assets.devices.clone(),
            volumes: assets.volumes.clone(),
        };
        let stdout = self.run_container(&spec).await?;

        Ok(parse_probe_output(&stdout, self.settings.schema)?)
    }

    /// Pick the probe image tag from the agent's tag and the last built probe tag
    ///
    /// A runtime error while listing counts as a missing tag.
    pub async fn resolve_tag(&self) -> String {
        let running = self.runtime.running_images().await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to list running containers");
            Vec::new()
        });
        let agent_tag = version::tag_for_repository(&running, &self.settings.agent_image);

        let probes = self
            .runtime
            .list_images(&self.settings.probe_image)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to list probe images");
                Vec::new()
            });
        let probe_tag = version::highest_tag(&probes, &self.settings.probe_image);

        let tag = resolve_tag(agent_tag, probe_tag, &self.settings.default_tag);
        debug!(agent_tag = ?agent_tag, probe_tag = ?probe_tag, %tag, "resolved probe image tag");
        tag
    }

    /// Build `image` unless it is already in the local image cache
    async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError> {
        let _guard = self.build_lock.lock().await;

        if !self.runtime.list_images(image).await?.is_empty() {
            debug!(%image, "probe image present");
            return Ok(());
        }

        info!(%image, "building CUDA core probe image");
        self.runtime
            .build_image(&self.settings.build_context, &self.settings.dockerfile, image)
            .await
    }

    /// Run the probe container, clearing a stale container of the same name once
    async fn run_container(&self, spec: &RunSpec) -> Result<String, RuntimeError> {
        match self.runtime.run_container(spec).await {
            Err(RuntimeError::NameConflict(_)) => {
                info!(container = %spec.name, "removing stale probe container");
                self.runtime.remove_container(&spec.name).await?;
                self.runtime.run_container(spec).await
            }
            result => result,
        }
    }
}
