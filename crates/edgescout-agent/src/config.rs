use edgescout_common::config::deserialize_duration;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::probe::ProbeSchema;

/// Optional configuration file read from the working directory
pub const CONFIG_FILE: &str = "edgescout.toml";

/// Orchestrator the agent is deployed under
///
/// The CUDA core probe only runs when the agent can start sibling containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orchestrator {
    Docker,
    Kubernetes,
}

/// Agent configuration loaded from `edgescout.toml` and environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the inventory API
    /// Default: http://agent/api
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Directory holding the container daemon configuration (daemon.json)
    #[serde(default = "default_runtime_config_dir")]
    pub runtime_config_dir: PathBuf,

    /// Directory of CSV manifests for the Nvidia container runtime
    #[serde(default = "default_host_files_dir")]
    pub host_files_dir: PathBuf,

    #[serde(default = "default_dev_dir")]
    pub dev_dir: PathBuf,

    /// Parent of the `<machine>-linux-gnu` library directory
    #[serde(default = "default_lib_root")]
    pub lib_root: PathBuf,

    #[serde(default = "default_etc_dir")]
    pub etc_dir: PathBuf,

    /// CUDA installation root, always mounted into the probe container
    #[serde(default = "default_cuda_root")]
    pub cuda_root: PathBuf,

    /// Machine architecture override (detected with `uname -m` if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,

    /// Default: docker
    #[serde(default = "default_orchestrator")]
    pub orchestrator: Orchestrator,

    /// Identifier the peripheral is published and deduplicated under
    /// Default: GPU
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Image repository of the agent itself, used to find its version tag
    #[serde(default = "default_agent_image")]
    pub agent_image: String,

    /// Image repository of the CUDA core probe
    #[serde(default = "default_probe_image")]
    pub probe_image: String,

    /// Probe tag used whenever version resolution fails
    /// Default: 0.0.1
    #[serde(default = "default_probe_default_tag")]
    pub probe_default_tag: String,

    #[serde(default = "default_probe_build_context")]
    pub probe_build_context: PathBuf,

    #[serde(default = "default_probe_dockerfile")]
    pub probe_dockerfile: String,

    #[serde(default = "default_probe_container_name")]
    pub probe_container_name: String,

    /// Layout of the probe's stdout (v1, v2)
    /// Default: v2
    #[serde(default)]
    pub probe_schema: ProbeSchema,

    /// Upper bound for a single probe container run
    /// Default: 120 seconds
    #[serde(
        default = "default_probe_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub probe_timeout: Duration,

    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,

    /// Delay between detection cycles
    /// Default: 90 seconds
    #[serde(
        default = "default_poll_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub poll_interval: Duration,

    /// Delay between health checks while waiting for the inventory API
    /// Default: 10 seconds
    #[serde(
        default = "default_bootstrap_retry",
        deserialize_with = "deserialize_duration"
    )]
    pub bootstrap_retry: Duration,

    /// Total timeout for a single inventory API request
    /// Default: 30 seconds
    #[serde(
        default = "default_http_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub http_timeout: Duration,

    /// Log level
    /// Default: info
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_api_base_url() -> String {
    "http://agent/api".to_string()
}

fn default_runtime_config_dir() -> PathBuf {
    PathBuf::from("/etcfs/docker/")
}

fn default_host_files_dir() -> PathBuf {
    PathBuf::from("/etcfs/nvidia-container-runtime/host-files-for-container.d/")
}

fn default_dev_dir() -> PathBuf {
    PathBuf::from("/dev")
}

fn default_lib_root() -> PathBuf {
    PathBuf::from("/usr/lib")
}

fn default_etc_dir() -> PathBuf {
    PathBuf::from("/etc")
}

fn default_cuda_root() -> PathBuf {
    PathBuf::from("/usr/local/cuda")
}

fn default_orchestrator() -> Orchestrator {
    Orchestrator::Docker
}

fn default_identifier() -> String {
    "GPU".to_string()
}

fn default_agent_image() -> String {
    "edgescout/agent".to_string()
}

fn default_probe_image() -> String {
    "edgescout/cuda-core-probe".to_string()
}

fn default_probe_default_tag() -> String {
    "0.0.1".to_string()
}

fn default_probe_build_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_probe_dockerfile() -> String {
    "Dockerfile.gpu".to_string()
}

fn default_probe_container_name() -> String {
    "get-cuda-cores".to_string()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(90)
}

fn default_bootstrap_retry() -> Duration {
    Duration::from_secs(10)
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from `edgescout.toml` (if present) and environment variables
    ///
    /// Environment variables take precedence over the file.
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(CONFIG_FILE))
                .merge(Env::raw().map(|k| {
                    // Map environment variable names to struct field names
                    match k.as_str() {
                        "API_BASE_URL" => "api_base_url".into(),
                        "RUNTIME_CONFIG_DIR" => "runtime_config_dir".into(),
                        "HOST_FILES_DIR" => "host_files_dir".into(),
                        "DEV_DIR" => "dev_dir".into(),
                        "LIB_ROOT" => "lib_root".into(),
                        "ETC_DIR" => "etc_dir".into(),
                        "CUDA_ROOT" => "cuda_root".into(),
                        "MACHINE_ARCH" => "machine".into(),
                        "ORCHESTRATOR" => "orchestrator".into(),
                        "PERIPHERAL_IDENTIFIER" => "identifier".into(),
                        "AGENT_IMAGE" => "agent_image".into(),
                        "PROBE_IMAGE" => "probe_image".into(),
                        "PROBE_DEFAULT_TAG" => "probe_default_tag".into(),
                        "PROBE_BUILD_CONTEXT" => "probe_build_context".into(),
                        "PROBE_DOCKERFILE" => "probe_dockerfile".into(),
                        "PROBE_CONTAINER_NAME" => "probe_container_name".into(),
                        "PROBE_SCHEMA" => "probe_schema".into(),
                        "PROBE_TIMEOUT" => "probe_timeout".into(),
                        "DOCKER_BIN" => "docker_bin".into(),
                        "POLL_INTERVAL" => "poll_interval".into(),
                        "BOOTSTRAP_RETRY" => "bootstrap_retry".into(),
                        "HTTP_TIMEOUT" => "http_timeout".into(),
                        "LOG_LEVEL" => "log_level".into(),
                        _ => k.into(),
                    }
                })),
        )
    }

    /// Extract configuration from an already assembled figment
    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    /// Inventory endpoint for peripheral documents
    pub fn peripheral_url(&self) -> String {
        format!("{}/peripheral", self.api_base_url.trim_end_matches('/'))
    }

    /// Inventory endpoint polled until the API is up
    pub fn healthcheck_url(&self) -> String {
        format!("{}/healthcheck", self.api_base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Config {
        Config::from_figment(Figment::new().merge(Toml::string(toml))).unwrap()
    }

    #[test]
    fn defaults_apply_to_empty_input() {
        let config = from_toml("");

        assert_eq!(config.identifier, "GPU");
        assert_eq!(config.orchestrator, Orchestrator::Docker);
        assert_eq!(config.poll_interval, Duration::from_secs(90));
        assert_eq!(config.probe_timeout, Duration::from_secs(120));
        assert_eq!(config.probe_default_tag, "0.0.1");
        assert_eq!(config.probe_schema, ProbeSchema::V2);
        assert_eq!(config.dev_dir, PathBuf::from("/dev"));
        assert!(config.machine.is_none());
    }

    #[test]
    fn durations_accept_units_and_seconds() {
        let config = from_toml(
            r#"
            poll_interval = "2m"
            bootstrap_retry = 3
            probe_timeout = "1m 30s"
            "#,
        );

        assert_eq!(config.poll_interval, Duration::from_secs(120));
        assert_eq!(config.bootstrap_retry, Duration::from_secs(3));
        assert_eq!(config.probe_timeout, Duration::from_secs(90));
    }

    #[test]
    fn orchestrator_and_schema_are_lowercase() {
        let config = from_toml(
            r#"
            orchestrator = "kubernetes"
            probe_schema = "v1"
            machine = "aarch64"
            "#,
        );

        assert_eq!(config.orchestrator, Orchestrator::Kubernetes);
        assert_eq!(config.probe_schema, ProbeSchema::V1);
        assert_eq!(config.machine.as_deref(), Some("aarch64"));
    }

    #[test]
    fn endpoint_urls_tolerate_trailing_slash() {
        let config = from_toml(r#"api_base_url = "http://inventory:5080/api/""#);

        assert_eq!(config.peripheral_url(), "http://inventory:5080/api/peripheral");
        assert_eq!(config.healthcheck_url(), "http://inventory:5080/api/healthcheck");
    }
}
