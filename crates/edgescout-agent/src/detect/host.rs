use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

use crate::config::Config;
use crate::detect::DetectError;

/// Architecture whose CUDA runtime is spread across the whole library directory
pub const AARCH64: &str = "aarch64";

/// CUDA user-space driver library looked up in the architecture library directory
pub const LIBCUDA: &str = "libcuda.so";

/// Host filesystem view used by detection and asset building
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    pub dev_dir: PathBuf,
    pub lib_root: PathBuf,
    pub etc_dir: PathBuf,
    pub cuda_root: PathBuf,
    /// `uname -m` machine field, e.g. `x86_64` or `aarch64`
    pub machine: String,
}

impl HostLayout {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dev_dir: config.dev_dir.clone(),
            lib_root: config.lib_root.clone(),
            etc_dir: config.etc_dir.clone(),
            cuda_root: config.cuda_root.clone(),
            machine: config.machine.clone().unwrap_or_else(detect_machine),
        }
    }

    /// Multiarch library directory, e.g. `/usr/lib/aarch64-linux-gnu`
    pub fn lib_dir(&self) -> PathBuf {
        self.lib_root.join(format!("{}-linux-gnu", self.machine))
    }

    pub fn libcuda(&self) -> PathBuf {
        self.lib_dir().join(LIBCUDA)
    }

    pub fn is_aarch64(&self) -> bool {
        self.machine == AARCH64
    }
}

/// Read the machine architecture from `uname -m`
///
/// Falls back to the architecture this binary was compiled for.
pub fn detect_machine() -> String {
    let fallback = std::env::consts::ARCH;

    match Command::new("uname").arg("-m").output() {
        Ok(output) if output.status.success() => {
            let machine = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if machine.is_empty() {
                warn!(fallback, "uname returned an empty machine field");
                fallback.to_string()
            } else {
                debug!(%machine, "detected machine architecture");
                machine
            }
        }
        Ok(output) => {
            warn!(status = ?output.status.code(), fallback, "uname -m failed");
            fallback.to_string()
        }
        Err(e) => {
            warn!(error = %e, fallback, "failed to execute uname");
            fallback.to_string()
        }
    }
}

/// List the entry names of a directory, sorted
///
/// Returns `Ok(None)` when the directory does not exist.
pub(crate) fn list_dir(dir: &Path) -> Result<Option<Vec<String>>, DetectError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DetectError::io(dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DetectError::io(dir, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    Ok(Some(names))
}

/// Render a path for device bindings and the inventory document
pub(crate) fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
