pub mod peripheral;

pub use peripheral::{PeripheralRecord, ResourceUnit, RuntimeAssets};
