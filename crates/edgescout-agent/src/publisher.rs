//! Detection cycle: detect, probe, de-duplicate and publish.

use edgescout_common::types::{PeripheralRecord, RuntimeAssets};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Config, Orchestrator};
use crate::container::ContainerRuntime;
use crate::detect::{
    CliAssets, Detection, HostLayout, build_cli_assets, probe_devices, scan_runtime_config,
};
use crate::inventory::{DedupStatus, InventoryClient};
use crate::probe::{CudaCoreProbe, ProbeSettings};

/// How a single cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The inventory already lists the identifier
    AlreadyPublished,
    /// The record was accepted; carries the API acknowledgement
    Published(Value),
    /// The de-duplication query failed, nothing was sent
    QueryFailed,
    PublishFailed,
}

pub struct PeripheralPublisher {
    layout: HostLayout,
    runtime_config_dir: PathBuf,
    host_files_dir: PathBuf,
    identifier: String,
    orchestrator: Orchestrator,
    poll_interval: Duration,
    runtime: Arc<dyn ContainerRuntime>,
    probe: CudaCoreProbe,
    inventory: Arc<dyn InventoryClient>,
}

impl PeripheralPublisher {
    pub fn new(
        config: &Config,
        layout: HostLayout,
        runtime: Arc<dyn ContainerRuntime>,
        inventory: Arc<dyn InventoryClient>,
    ) -> Self {
        Self {
            layout,
            runtime_config_dir: config.runtime_config_dir.clone(),
            host_files_dir: config.host_files_dir.clone(),
            identifier: config.identifier.clone(),
            orchestrator: config.orchestrator,
            poll_interval: config.poll_interval,
            probe: CudaCoreProbe::new(runtime.clone(), ProbeSettings::from_config(config)),
            runtime,
            inventory,
        }
    }

    pub fn layout(&self) -> &HostLayout {
        &self.layout
    }

    /// Run one detection pass
    ///
    /// Unreadable detection sources are logged and treated as absent. The
    /// filesystem work runs on the blocking pool.
    pub async fn detect(&self) -> Detection {
        let runtime_config_dir = self.runtime_config_dir.clone();
        let host_files_dir = self.host_files_dir.clone();
        let layout = self.layout.clone();

        let task = tokio::task::spawn_blocking(move || {
            detect_blocking(&runtime_config_dir, &host_files_dir, &layout)
        });
        match task.await {
            Ok(detection) => detection,
            Err(e) => {
                warn!(error = %e, "detection task failed");
                Detection::NoGpu
            }
        }
    }

    /// Build the peripheral record for the current state of the host
    pub async fn flow(&self) -> PeripheralRecord {
        match self.detect().await {
            Detection::Runtime(assets) => {
                info!(
                    devices = assets.devices.len(),
                    libraries = assets.libraries.len(),
                    "nvidia runtime is configured"
                );
                let record = PeripheralRecord::available(&self.identifier, assets.clone());
                if self.orchestrator != Orchestrator::Docker {
                    return self.merge_probe(record, None).await;
                }

                self.log_gpus_support().await;
                let cli = self.cli_assets(assets.devices).await;
                self.merge_probe(record, cli.as_ref()).await
            }
            Detection::Devices(devices) => {
                info!(devices = ?devices, "GPU usable without a declared nvidia runtime");

                let cli = self.cli_assets(devices.clone()).await;
                let assets = RuntimeAssets {
                    devices,
                    libraries: cli.as_ref().map(|cli| cli.libraries.clone()).unwrap_or_default(),
                    runtime_path: None,
                };

                let record = PeripheralRecord::available(&self.identifier, assets);
                self.merge_probe(record, cli.as_ref()).await
            }
            Detection::NoGpu => {
                info!("no viable GPU available");
                PeripheralRecord::unavailable(&self.identifier)
            }
        }
    }

    /// Device bindings and mounts for `candidates`, from a single `/dev` listing
    async fn cli_assets(&self, candidates: Vec<String>) -> Option<CliAssets> {
        let layout = self.layout.clone();
        let task = tokio::task::spawn_blocking(move || build_cli_assets(&layout, &candidates));

        match task.await {
            Ok(Ok(cli)) => Some(cli),
            Ok(Err(e)) => {
                warn!(error = %e, "failed to resolve CUDA device bindings and mounts");
                None
            }
            Err(e) => {
                warn!(error = %e, "asset resolution task failed");
                None
            }
        }
    }

    async fn log_gpus_support(&self) {
        match self.runtime.engine_version().await {
            Ok(version) if version.supports_gpus_flag() => info!(
                engine = %version.engine,
                api = %version.api,
                "--gpus is available in the container engine"
            ),
            Ok(version) => info!(
                engine = %version.engine,
                api = %version.api,
                "--gpus is not available in the container engine, GPU is usable through the runtime"
            ),
            Err(e) => warn!(error = %e, "failed to query container engine version"),
        }
    }

    /// Fill in name and resources from the CUDA core probe
    async fn merge_probe(
        &self,
        record: PeripheralRecord,
        cli: Option<&CliAssets>,
    ) -> PeripheralRecord {
        if self.orchestrator != Orchestrator::Docker {
            debug!(orchestrator = ?self.orchestrator, "skipping CUDA core probe");
            return record.with_probe(None, None);
        }

        let info = match cli {
            Some(cli) => self.probe.run(cli).await,
            None => None,
        };

        match info {
            Some(info) => record.with_probe(Some(info.name), Some(info.resources)),
            None => record.with_probe(None, None),
        }
    }

    /// Detect, then publish unless the inventory already has the identifier
    pub async fn run_cycle(&self) -> CycleOutcome {
        let record = self.flow().await;
        debug!(record = ?record, "detection finished");

        match self.inventory.query(&record.identifier).await {
            Ok(DedupStatus::Published) => {
                info!(identifier = %record.identifier, "GPU has already been published");
                return CycleOutcome::AlreadyPublished;
            }
            Ok(DedupStatus::NotPublished) => {
                info!(identifier = %record.identifier, "GPU not published yet");
            }
            Err(e) => {
                warn!(error = %e, "failed to query inventory, skipping publish this cycle");
                return CycleOutcome::QueryFailed;
            }
        }

        match self.inventory.publish(&record).await {
            Ok(ack) => {
                info!(
                    identifier = %record.identifier,
                    available = record.available,
                    ack = %ack,
                    "published GPU peripheral"
                );
                CycleOutcome::Published(ack)
            }
            Err(e) => {
                warn!(error = %e, "failed to publish GPU peripheral");
                CycleOutcome::PublishFailed
            }
        }
    }

    /// Run cycles every `poll_interval` until `shutdown` resolves
    ///
    /// Shutdown is only observed between cycles.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let outcome = self.run_cycle().await;
            debug!(?outcome, next_in_secs = self.poll_interval.as_secs(), "cycle complete");

            tokio::select! {
                _ = &mut shutdown => {
                    info!("stopping detection loop");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

/// Runtime configuration first, then the device scan
fn detect_blocking(
    runtime_config_dir: &Path,
    host_files_dir: &Path,
    layout: &HostLayout,
) -> Detection {
    match scan_runtime_config(runtime_config_dir, host_files_dir) {
        Ok(Some(assets)) => return Detection::Runtime(assets),
        Ok(None) => {}
        Err(e) => info!(error = %e, "ignoring unreadable runtime configuration"),
    }

    match probe_devices(layout) {
        Ok(Some(devices)) => Detection::Devices(devices),
        Ok(None) => Detection::NoGpu,
        Err(e) => {
            info!(error = %e, "failed to scan for nvidia devices");
            Detection::NoGpu
        }
    }
}
