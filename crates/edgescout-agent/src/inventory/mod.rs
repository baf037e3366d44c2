//! Inventory API access: de-duplication queries and peripheral publishing.

pub mod client;
pub mod errors;
pub mod middleware;

pub use client::HttpInventoryClient;
pub use errors::InventoryError;

use async_trait::async_trait;
use edgescout_common::types::PeripheralRecord;
use serde_json::Value;

/// Whether a peripheral with a given identifier is already in the inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStatus {
    /// Already published, skip
    Published,
    NotPublished,
}

impl DedupStatus {
    /// Interpret a query response
    ///
    /// Only a successful response whose body is a non-empty JSON list counts
    /// as published. Error statuses, other JSON values and undecodable bodies
    /// all mean "not published".
    pub fn from_response(success: bool, body: &[u8]) -> Self {
        if !success {
            return DedupStatus::NotPublished;
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Array(items)) if !items.is_empty() => DedupStatus::Published,
            _ => DedupStatus::NotPublished,
        }
    }
}

#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Look up peripherals whose identifier matches `identifier`
    async fn query(&self, identifier: &str) -> Result<DedupStatus, InventoryError>;

    /// Register a peripheral, returning the API's acknowledgement
    async fn publish(&self, record: &PeripheralRecord) -> Result<Value, InventoryError>;
}
