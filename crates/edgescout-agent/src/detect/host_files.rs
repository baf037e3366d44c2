use edgescout_common::types::RuntimeAssets;
use std::path::Path;
use tracing::{debug, trace};

use crate::detect::DetectError;
use crate::detect::host::list_dir;

const LIB_TAG: &str = "lib";
const DEV_TAG: &str = "dev";

/// Read the Nvidia runtime host-files manifests in `dir`
///
/// Every regular file is parsed as headerless CSV. Rows tagged `lib` or `dev`
/// contribute their trimmed second column; any other row is skipped, since the
/// manifests also carry symlink and directory entries. Returns `Ok(None)` if
/// the directory is missing or holds no files.
pub fn read_host_files(dir: &Path) -> Result<Option<RuntimeAssets>, DetectError> {
    let Some(names) = list_dir(dir)? else {
        debug!(path = %dir.display(), "host-files directory not found");
        return Ok(None);
    };

    let files: Vec<_> = names
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .collect();

    if files.is_empty() {
        debug!(path = %dir.display(), "host-files directory is empty");
        return Ok(None);
    }

    let mut assets = RuntimeAssets::default();
    for path in &files {
        read_manifest(path, &mut assets)?;
    }

    debug!(
        files = files.len(),
        devices = assets.devices.len(),
        libraries = assets.libraries.len(),
        "read host-files manifests"
    );
    Ok(Some(assets))
}

fn read_manifest(path: &Path, assets: &mut RuntimeAssets) -> Result<(), DetectError> {
    let csv_error = |source| DetectError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let (Some(tag), Some(value)) = (record.get(0), record.get(1)) else {
            trace!(path = %path.display(), "skipping short manifest row");
            continue;
        };

        match tag {
            LIB_TAG => assets.libraries.push(value.trim().to_string()),
            DEV_TAG => assets.devices.push(value.trim().to_string()),
            _ => {}
        }
    }

    Ok(())
}
