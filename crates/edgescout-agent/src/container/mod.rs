//! Container runtime capability used by the CUDA core probe.

pub mod docker;
pub mod error;

pub use docker::DockerCli;
pub use error::{ErrorClass, RuntimeError};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

use crate::detect::VolumeBinding;

/// Minimum engine major version that understands `--gpus`
const GPUS_FLAG_MIN_ENGINE: u64 = 19;
/// Minimum API version (major, minor) that understands `--gpus`
const GPUS_FLAG_MIN_API: (u64, u64) = (1, 40);

/// An ephemeral container run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub image: String,
    pub name: String,
    /// `path:path:rwm` device bindings
    pub devices: Vec<String>,
    pub volumes: BTreeMap<String, VolumeBinding>,
}

/// Container engine server and API versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersion {
    pub engine: String,
    pub api: String,
}

impl EngineVersion {
    /// Whether the engine supports requesting GPUs with `--gpus`
    ///
    /// Requires engine 19 or newer and API 1.40 or newer. Unparsable versions
    /// are treated as unsupported.
    pub fn supports_gpus_flag(&self) -> bool {
        let engine_major = self
            .engine
            .split('.')
            .next()
            .and_then(|major| major.trim().parse::<u64>().ok());

        let mut api = self.api.trim().split('.');
        let api_version = match (
            api.next().and_then(|v| v.parse::<u64>().ok()),
            api.next().and_then(|v| v.parse::<u64>().ok()),
        ) {
            (Some(major), Some(minor)) => Some((major, minor)),
            _ => None,
        };

        match (engine_major, api_version) {
            (Some(major), Some(api)) => major >= GPUS_FLAG_MIN_ENGINE && api >= GPUS_FLAG_MIN_API,
            _ => false,
        }
    }
}

/// Operations the agent needs from the local container runtime
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Image references (`repository:tag`) of the running containers
    async fn running_images(&self) -> Result<Vec<String>, RuntimeError>;

    /// Local image references (`repository:tag`) matching `reference`
    ///
    /// `reference` is either a repository or a full `repository:tag`.
    async fn list_images(&self, reference: &str) -> Result<Vec<String>, RuntimeError>;

    async fn build_image(&self, context: &Path, dockerfile: &str, tag: &str) -> Result<(), RuntimeError>;

    /// Run a container to completion and return its stdout
    ///
    /// The container is removed once it exits.
    async fn run_container(&self, spec: &RunSpec) -> Result<String, RuntimeError>;

    /// Force-remove a container by name
    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;

    async fn engine_version(&self) -> Result<EngineVersion, RuntimeError>;
}

/// Split an image reference into repository and tag
///
/// The tag separator is the last colon after the last slash, so registry
/// ports (`registry:5000/repo`) are not mistaken for tags.
pub fn split_reference(reference: &str) -> (&str, Option<&str>) {
    let name_start = reference.rfind('/').map_or(0, |i| i + 1);
    match reference[name_start..].rfind(':') {
        Some(i) => {
            let split = name_start + i;
            (&reference[..split], Some(&reference[split + 1..]))
        }
        None => (reference, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(engine: &str, api: &str) -> EngineVersion {
        EngineVersion {
            engine: engine.to_string(),
            api: api.to_string(),
        }
    }

    #[test]
    fn gpus_flag_support() {
        assert!(version("24.0.7", "1.43").supports_gpus_flag());
        assert!(version("19.03.1", "1.40").supports_gpus_flag());
        assert!(!version("18.09.0", "1.39").supports_gpus_flag());
        assert!(!version("19.03.1", "1.39").supports_gpus_flag());
        assert!(!version("unknown", "1.43").supports_gpus_flag());
    }

    #[test]
    fn reference_splitting() {
        assert_eq!(split_reference("edgescout/agent:1.2.0"), ("edgescout/agent", Some("1.2.0")));
        assert_eq!(split_reference("edgescout/agent"), ("edgescout/agent", None));
        assert_eq!(
            split_reference("registry:5000/edgescout/agent:1.2.0"),
            ("registry:5000/edgescout/agent", Some("1.2.0"))
        );
        assert_eq!(
            split_reference("registry:5000/edgescout/agent"),
            ("registry:5000/edgescout/agent", None)
        );
    }
}
