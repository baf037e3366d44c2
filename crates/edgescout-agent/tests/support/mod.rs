//! Shared fakes and host fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use edgescout_agent::config::Config;
use edgescout_agent::container::{ContainerRuntime, EngineVersion, RunSpec, RuntimeError, split_reference};
use edgescout_agent::inventory::{DedupStatus, InventoryClient, InventoryError};
use edgescout_common::types::PeripheralRecord;
use figment::Figment;
use figment::providers::{Format, Toml};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

pub const PROBE_REPO: &str = "edgescout/cuda-core-probe";
pub const AGENT_REPO: &str = "edgescout/agent";

/// Probe stdout in the ten data line layout
pub const PROBE_STDOUT: &str = "Detected 1 CUDA Capable device(s)\n\
    Device name: TitanX\n\
    CUDA Driver Version: 11.4\n\
    CUDA Capability: 6.1\n\
    Total global memory: 12 GB\n\
    Multiprocessors: 8\n\
    CUDA Cores: 128\n\
    Max threads per multiprocessor: 2048\n\
    GPU Max Clock rate: 1531 MHz\n\
    Memory Clock rate: 5005 Mhz\n\
    Total amount of memory: 16 GB\n";

/// Recorded container runtime operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RunningImages,
    ListImages(String),
    Build(String),
    Run(RunSpec),
    Remove(String),
    EngineVersion,
}

/// In-memory [`ContainerRuntime`] with scripted run results
pub struct FakeRuntime {
    running: Vec<String>,
    images: Mutex<Vec<String>>,
    runs: Mutex<VecDeque<Result<String, RuntimeError>>>,
    build_fails: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            running: Vec::new(),
            images: Mutex::new(Vec::new()),
            runs: Mutex::new(VecDeque::new()),
            build_fails: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_running(mut self, images: &[&str]) -> Self {
        self.running = images.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_images(self, images: &[&str]) -> Self {
        self.images
            .lock()
            .unwrap()
            .extend(images.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_failing_build(mut self) -> Self {
        self.build_fails = true;
        self
    }

    /// Queue the result of the next `run_container`; once empty, runs print [`PROBE_STDOUT`]
    pub fn push_run(&self, result: Result<String, RuntimeError>) {
        self.runs.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn builds(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Build(tag) => Some(tag),
                _ => None,
            })
            .collect()
    }

    pub fn runs(&self) -> Vec<RunSpec> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Run(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub fn removals(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Remove(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn running_images(&self) -> Result<Vec<String>, RuntimeError> {
        self.record(Call::RunningImages);
        Ok(self.running.clone())
    }

    async fn list_images(&self, reference: &str) -> Result<Vec<String>, RuntimeError> {
        self.record(Call::ListImages(reference.to_string()));

        let (repository, tag) = split_reference(reference);
        Ok(self
            .images
            .lock()
            .unwrap()
            .iter()
            .filter(|image| match tag {
                Some(_) => image.as_str() == reference,
                None => split_reference(image).0 == repository,
            })
            .cloned()
            .collect())
    }

    async fn build_image(&self, _context: &Path, _dockerfile: &str, tag: &str) -> Result<(), RuntimeError> {
        self.record(Call::Build(tag.to_string()));
        tokio::task::yield_now().await;

        if self.build_fails {
            return Err(RuntimeError::CommandFailed {
                operation: "docker build",
                code: Some(1),
                stderr: "failed to solve".to_string(),
            });
        }

        self.images.lock().unwrap().push(tag.to_string());
        Ok(())
    }

    async fn run_container(&self, spec: &RunSpec) -> Result<String, RuntimeError> {
        self.record(Call::Run(spec.clone()));
        self.runs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PROBE_STDOUT.to_string()))
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(Call::Remove(name.to_string()));
        Ok(())
    }

    async fn engine_version(&self) -> Result<EngineVersion, RuntimeError> {
        self.record(Call::EngineVersion);
        Ok(EngineVersion {
            engine: "24.0.7".to_string(),
            api: "1.43".to_string(),
        })
    }
}

/// In-memory [`InventoryClient`]
pub struct FakeInventory {
    /// `None` makes every query fail
    status: Option<DedupStatus>,
    queries: Mutex<Vec<String>>,
    published: Mutex<Vec<PeripheralRecord>>,
}

impl FakeInventory {
    pub fn new(status: Option<DedupStatus>) -> Self {
        Self {
            status,
            queries: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<PeripheralRecord> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl InventoryClient for FakeInventory {
    async fn query(&self, identifier: &str) -> Result<DedupStatus, InventoryError> {
        self.queries.lock().unwrap().push(identifier.to_string());
        self.status.ok_or_else(|| InventoryError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "agent not ready".to_string(),
        })
    }

    async fn publish(&self, record: &PeripheralRecord) -> Result<Value, InventoryError> {
        self.published.lock().unwrap().push(record.clone());
        Ok(json!({"status": 201, "resource-id": "nuvlabox-peripheral/gpu-1"}))
    }
}

/// Temporary host filesystem laid out like the agent's mounts
pub struct Host {
    root: TempDir,
}

impl Host {
    pub fn new() -> Self {
        let host = Self {
            root: TempDir::new().unwrap(),
        };
        fs::create_dir_all(host.dev_dir()).unwrap();
        host
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    pub fn dev_dir(&self) -> PathBuf {
        self.path("dev")
    }

    pub fn lib_dir(&self, machine: &str) -> PathBuf {
        self.path("usr/lib").join(format!("{machine}-linux-gnu"))
    }

    pub fn device(&self, name: &str) -> String {
        self.dev_dir().join(name).to_string_lossy().into_owned()
    }

    pub fn add_device(&self, name: &str) -> &Self {
        fs::write(self.dev_dir().join(name), "").unwrap();
        self
    }

    pub fn install_libcuda(&self, machine: &str) -> &Self {
        let lib_dir = self.lib_dir(machine);
        fs::create_dir_all(&lib_dir).unwrap();
        fs::write(lib_dir.join("libcuda.so"), "").unwrap();
        self
    }

    pub fn write_daemon_config(&self, contents: &str) -> &Self {
        let dir = self.path("etcfs/docker");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("daemon.json"), contents).unwrap();
        self
    }

    pub fn write_host_file(&self, name: &str, contents: &str) -> &Self {
        let dir = self.path("etcfs/host-files");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), contents).unwrap();
        self
    }

    /// Agent configuration pointing every host path into this fixture
    ///
    /// `extra` is appended as TOML.
    pub fn config(&self, machine: &str, extra: &str) -> Config {
        let toml = format!(
            r#"
            runtime_config_dir = "{runtime}"
            host_files_dir = "{host_files}"
            dev_dir = "{dev}"
            lib_root = "{lib_root}"
            etc_dir = "{etc}"
            cuda_root = "{cuda}"
            machine = "{machine}"
            {extra}
            "#,
            runtime = self.path("etcfs/docker").display(),
            host_files = self.path("etcfs/host-files").display(),
            dev = self.dev_dir().display(),
            lib_root = self.path("usr/lib").display(),
            etc = self.path("etc").display(),
            cuda = self.path("usr/local/cuda").display(),
        );

        Config::from_figment(Figment::new().merge(Toml::string(&toml))).unwrap()
    }
}
