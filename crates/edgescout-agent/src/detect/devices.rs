use std::path::Path;
use tracing::{debug, info, warn};

use crate::detect::host::{LIBCUDA, list_dir, path_string};
use crate::detect::{DetectError, HostLayout};

const NVIDIA_DEVICE_PREFIX: &str = "nv";

/// Full paths of the `nv*` nodes in `dev_dir`, sorted
///
/// A missing directory yields no devices.
pub fn nvidia_devices(dev_dir: &Path) -> Result<Vec<String>, DetectError> {
    let names = list_dir(dev_dir)?.unwrap_or_default();

    Ok(names
        .into_iter()
        .filter(|name| name.starts_with(NVIDIA_DEVICE_PREFIX))
        .map(|name| path_string(&dev_dir.join(name)))
        .collect())
}

/// Whether `libcuda.so` is present in the architecture library directory
pub fn cuda_installed(layout: &HostLayout) -> bool {
    let lib_dir = layout.lib_dir();

    match list_dir(&lib_dir) {
        Ok(Some(names)) => names.iter().any(|name| name == LIBCUDA),
        Ok(None) => {
            debug!(path = %lib_dir.display(), "architecture library directory not found");
            false
        }
        Err(e) => {
            warn!(error = %e, "failed to list architecture library directory");
            false
        }
    }
}

/// Fallback detection tier for hosts without a declared Nvidia runtime
///
/// Returns the Nvidia device nodes only if at least one exists and CUDA is
/// installed; otherwise `Ok(None)`.
pub fn probe_devices(layout: &HostLayout) -> Result<Option<Vec<String>>, DetectError> {
    let devices = nvidia_devices(&layout.dev_dir)?;
    if devices.is_empty() {
        info!(path = %layout.dev_dir.display(), "no nvidia device nodes found");
        return Ok(None);
    }

    if !cuda_installed(layout) {
        info!(
            machine = %layout.machine,
            devices = devices.len(),
            "nvidia device nodes present but libcuda.so is not installed"
        );
        return Ok(None);
    }

    debug!(devices = ?devices, "found nvidia devices with CUDA installed");
    Ok(Some(devices))
}
