//! GPU detection and container asset resolution.
//!
//! Detection runs in two tiers. The container daemon's configuration is
//! checked first for a declared Nvidia runtime, whose host-files manifests
//! list the devices and libraries a container needs. Without a declared
//! runtime, `/dev` is scanned for Nvidia nodes and the architecture library
//! directory for `libcuda.so`.

pub mod assets;
pub mod devices;
pub mod error;
pub mod host;
pub mod host_files;
pub mod runtime_config;

pub use assets::{CliAssets, MountMode, VolumeBinding, build_cli_assets};
pub use devices::{cuda_installed, nvidia_devices, probe_devices};
pub use error::DetectError;
pub use host::HostLayout;
pub use host_files::read_host_files;
pub use runtime_config::{DAEMON_CONFIG_FILE, scan_runtime_config};

/// Outcome of a single detection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// Declared Nvidia runtime with its host-files manifest
    Runtime(edgescout_common::types::RuntimeAssets),
    /// Nvidia device nodes plus an installed `libcuda.so`, without a declared runtime
    Devices(Vec<String>),
    NoGpu,
}
