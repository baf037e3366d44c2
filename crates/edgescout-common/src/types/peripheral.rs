use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Name reported when the probe could not identify the device
pub const GENERIC_GPU_NAME: &str = "Graphics Processing Unit";

const VENDOR: &str = "Nvidia";
const INTERFACE: &str = "gpu";
const CLASS: &str = "gpu";

/// Peripheral document sent to the inventory API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeripheralRecord {
    pub identifier: String,
    pub available: bool,
    pub name: String,
    pub vendor: String,
    pub classes: BTreeSet<String>,
    pub interface: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_assets: Option<RuntimeAssets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ResourceUnit>>,
}

/// Devices and libraries a container needs to reach the GPU
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeAssets {
    pub devices: Vec<String>,
    pub libraries: Vec<String>,
    /// Path of the Nvidia runtime binary declared in the daemon config
    #[serde(rename = "path", default, skip_serializing_if = "Option::is_none")]
    pub runtime_path: Option<String>,
}

/// A single capability metric, e.g. `{unit: "GB", capacity: "16"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUnit {
    pub unit: String,
    /// Kept as text so units embedded in the probe output survive unchanged
    pub capacity: String,
}

impl ResourceUnit {
    pub fn new(unit: impl Into<String>, capacity: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            capacity: capacity.into(),
        }
    }
}

impl PeripheralRecord {
    fn base(identifier: &str, available: bool) -> Self {
        Self {
            identifier: identifier.to_string(),
            available,
            name: GENERIC_GPU_NAME.to_string(),
            vendor: VENDOR.to_string(),
            classes: BTreeSet::from([CLASS.to_string()]),
            interface: INTERFACE.to_string(),
            additional_assets: None,
            resources: None,
        }
    }

    /// Record for a GPU that containers can use
    pub fn available(identifier: &str, assets: RuntimeAssets) -> Self {
        Self {
            additional_assets: Some(assets),
            ..Self::base(identifier, true)
        }
    }

    /// Record stating that no usable GPU was found
    ///
    /// Never carries assets or resources.
    pub fn unavailable(identifier: &str) -> Self {
        Self::base(identifier, false)
    }

    /// Merge the probe result into an available record
    ///
    /// A failed probe keeps the generic name and leaves `resources` unset.
    pub fn with_probe(mut self, name: Option<String>, resources: Option<Vec<ResourceUnit>>) -> Self {
        if !self.available {
            return self;
        }
        self.name = name.unwrap_or_else(|| GENERIC_GPU_NAME.to_string());
        self.resources = resources;
        self
    }
}
