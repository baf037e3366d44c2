use edgescout_common::types::RuntimeAssets;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::detect::host::list_dir;
use crate::detect::{DetectError, read_host_files};

/// Container daemon configuration file name
pub const DAEMON_CONFIG_FILE: &str = "daemon.json";

/// Look for an Nvidia runtime declared in the container daemon configuration
///
/// The first entry of `runtime_dir` (in name order) whose name contains
/// `daemon.json` is parsed. When it declares `runtimes.nvidia`, the host-files
/// manifests are read from `host_files_dir` and tagged with the runtime path.
///
/// A missing directory, file or key is `Ok(None)`; an unreadable or malformed
/// file is an error for the caller to log.
pub fn scan_runtime_config(
    runtime_dir: &Path,
    host_files_dir: &Path,
) -> Result<Option<RuntimeAssets>, DetectError> {
    let Some(names) = list_dir(runtime_dir)? else {
        info!(path = %runtime_dir.display(), "container daemon config directory not found");
        return Ok(None);
    };

    let Some(name) = names.iter().find(|name| name.contains(DAEMON_CONFIG_FILE)) else {
        info!(path = %runtime_dir.display(), "no daemon.json in container daemon config directory");
        return Ok(None);
    };

    let path = runtime_dir.join(name);
    let contents = std::fs::read_to_string(&path).map_err(|e| DetectError::io(&path, e))?;
    let config: Value = serde_json::from_str(&contents).map_err(|source| DetectError::Json {
        path: path.clone(),
        source,
    })?;

    let Some(nvidia) = config.get("runtimes").and_then(|runtimes| runtimes.get("nvidia")) else {
        info!(path = %path.display(), "nvidia runtime not declared in daemon config");
        return Ok(None);
    };

    let runtime_path = nvidia
        .get("path")
        .and_then(Value::as_str)
        .map(str::to_string);
    debug!(path = %path.display(), runtime = ?runtime_path, "found nvidia runtime");

    let Some(assets) = read_host_files(host_files_dir)? else {
        info!(
            path = %host_files_dir.display(),
            "nvidia runtime declared but host-files manifests are missing"
        );
        return Ok(None);
    };

    Ok(Some(RuntimeAssets {
        runtime_path,
        ..assets
    }))
}
