//! Error types for the inventory API client.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("inventory request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),

    #[error("inventory API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to read inventory response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("inventory response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}
