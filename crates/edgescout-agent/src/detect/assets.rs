use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::detect::host::{list_dir, path_string};
use crate::detect::{DetectError, HostLayout};

/// Device cgroup permissions granted to every bound device
const DEVICE_PERMISSIONS: &str = "rwm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MountMode {
    #[serde(rename = "ro")]
    ReadOnly,
}

impl MountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MountMode::ReadOnly => "ro",
        }
    }
}

/// Target and mode of a bind mount, keyed by host path in [`CliAssets::volumes`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeBinding {
    pub bind: String,
    pub mode: MountMode,
}

impl VolumeBinding {
    fn read_only(path: &str) -> Self {
        Self {
            bind: path.to_string(),
            mode: MountMode::ReadOnly,
        }
    }
}

/// Everything a container needs to reach the GPU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CliAssets {
    /// `path:path:rwm` device bindings
    pub devices: Vec<String>,
    /// Host path to bind target, all read-only
    pub volumes: BTreeMap<String, VolumeBinding>,
    /// Every mounted library-bearing path, in mount order
    pub libraries: Vec<String>,
}

impl CliAssets {
    fn mount(&mut self, path: String) {
        self.volumes
            .insert(path.clone(), VolumeBinding::read_only(&path));
        self.libraries.push(path);
    }
}

/// Build device bindings and library mounts for a GPU container
///
/// `/dev` is listed again here and candidates that are no longer present are
/// dropped, so a device that vanished since detection is never bound.
///
/// On aarch64 (Jetson-class boards) CUDA depends on many files in the
/// architecture library directory and `/etc`, so both are mounted whole.
/// Elsewhere only `libcuda.so` is mounted. The CUDA root is always mounted.
pub fn build_cli_assets(layout: &HostLayout, candidates: &[String]) -> Result<CliAssets, DetectError> {
    let present: HashSet<String> = list_dir(&layout.dev_dir)?
        .unwrap_or_default()
        .into_iter()
        .map(|name| path_string(&layout.dev_dir.join(name)))
        .collect();

    let mut assets = CliAssets::default();

    for device in candidates {
        if present.contains(device) {
            assets
                .devices
                .push(format!("{0}:{0}:{1}", device, DEVICE_PERMISSIONS));
        } else {
            warn!(%device, "device disappeared since detection, not binding it");
        }
    }

    if layout.is_aarch64() {
        assets.mount(path_string(&layout.lib_dir()));
        assets.mount(path_string(&layout.etc_dir));
    } else {
        assets.mount(path_string(&layout.libcuda()));
    }
    assets.mount(path_string(&layout.cuda_root));

    debug!(
        machine = %layout.machine,
        devices = assets.devices.len(),
        volumes = assets.volumes.len(),
        "built container assets"
    );
    Ok(assets)
}
