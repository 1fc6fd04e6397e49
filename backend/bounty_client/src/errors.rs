//! Application-wide error types.

use thiserror::Error;

use crate::amount::InvalidAmount;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported node: {0}")]
    Unsupported(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] InvalidAmount),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

pub type Result<T> = std::result::Result<T, ClientError>;
