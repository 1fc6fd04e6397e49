//! Application configuration loaded from environment variables.

use crate::errors::{ClientError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Substrate JSON-RPC HTTP endpoint (e.g. https://paseo-rpc.dwellir.com)
    pub rpc_url: String,
    /// Number of decimal places between one token and one Planck
    pub token_decimals: u8,
    /// Display symbol of the native token
    pub token_symbol: String,
    /// How often (in seconds) to poll the chain for bounty changes
    pub poll_interval_secs: u64,
    /// HTTP client timeout for a single RPC request
    pub rpc_timeout_secs: u64,
    /// Retries for read-only RPC calls before giving up
    pub rpc_max_retries: u32,
    /// Maximum number of storage keys fetched per `state_getKeysPaged` request
    pub keys_page_size: u32,
    /// Number of recent bounty updates kept in memory
    pub update_history: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` wraps this
    /// with the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let token_decimals: u8 = var("TOKEN_DECIMALS", "10")
            .parse()
            .map_err(|_| ClientError::Config("Invalid TOKEN_DECIMALS".to_string()))?;
        // u128 holds at most 38 full decimal digits.
        if token_decimals > 38 {
            return Err(ClientError::Config(
                "TOKEN_DECIMALS must be at most 38".to_string(),
            ));
        }

        let poll_interval_secs: u64 = var("POLL_INTERVAL_SECS", "6")
            .parse()
            .map_err(|_| ClientError::Config("Invalid POLL_INTERVAL_SECS".to_string()))?;
        if poll_interval_secs == 0 {
            return Err(ClientError::Config(
                "POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let keys_page_size: u32 = var("KEYS_PAGE_SIZE", "100")
            .parse()
            .map_err(|_| ClientError::Config("Invalid KEYS_PAGE_SIZE".to_string()))?;
        if keys_page_size == 0 {
            return Err(ClientError::Config(
                "KEYS_PAGE_SIZE must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            rpc_url: var("RPC_URL", "https://paseo-rpc.dwellir.com"),
            token_decimals,
            token_symbol: var("TOKEN_SYMBOL", "DOT"),
            poll_interval_secs,
            rpc_timeout_secs: var("RPC_TIMEOUT_SECS", "30")
                .parse()
                .map_err(|_| ClientError::Config("Invalid RPC_TIMEOUT_SECS".to_string()))?,
            rpc_max_retries: var("RPC_MAX_RETRIES", "5")
                .parse()
                .map_err(|_| ClientError::Config("Invalid RPC_MAX_RETRIES".to_string()))?,
            keys_page_size,
            update_history: var("UPDATE_HISTORY", "50")
                .parse()
                .map_err(|_| ClientError::Config("Invalid UPDATE_HISTORY".to_string()))?,
        })
    }
}
