//! Substrate JSON-RPC client: reads `Bounties` pallet storage and submits
//! signed extrinsics.
//!
//! ## Resilience
//!
//! * Read calls go through [`RpcClient::call_with_backoff`]: exponential
//!   back-off on transport errors, HTTP 429 / 5xx and soft RPC errors, up to
//!   [`MAX_BACKOFF_SECS`] seconds between attempts and `max_retries` retries.
//! * Extrinsic submission is a single attempt. Resubmitting a signed
//!   extrinsic after an ambiguous failure is the caller's decision.
//!
//! ## Storage layout
//!
//! `Bounties::Bounties` and `Bounties::BountyDescriptions` are `Twox64Concat`
//! maps keyed by `u32`, so every key is
//! `twox128("Bounties") ++ twox128(item) ++ twox64(id_le) ++ id_le`.
//! The bounty id is recovered from the last four bytes.

use std::time::Duration;

use codec::Decode;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sp_crypto_hashing::{twox_128, twox_64};
use tracing::{debug, warn};

use crate::amount::Planck;
use crate::config::Config;
use crate::errors::{ClientError, Result};
use crate::events::{BountyDescription, BountySnapshot, BountyStatus, OnChainBounty};

const MAX_BACKOFF_SECS: u64 = 60;
const INITIAL_BACKOFF_SECS: u64 = 2;

/// `twox128("Bounties") ++ twox128("Bounties")`
pub const BOUNTIES_PREFIX: &str =
    "0xa37f719efab16103103a0c8c2c784ce1a37f719efab16103103a0c8c2c784ce1";

/// `twox128("Bounties") ++ twox128("BountyCount")`
pub const BOUNTY_COUNT_KEY: &str =
    "0xa37f719efab16103103a0c8c2c784ce1e37921d32604f381943d4150ed81c7eb";

/// RPC methods this client relies on; checked once at startup.
pub const REQUIRED_METHODS: &[&str] = &[
    "author_submitExtrinsic",
    "state_getKeysPaged",
    "state_getStorage",
    "state_queryStorageAt",
];

/// AccountId32 + four u128 balances + status discriminant.
const MIN_BOUNTY_LEN: usize = 32 + 16 * 4 + 1;

// ─────────────────────────────────────────────────────────
// JSON-RPC response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Value,
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcMethods {
    methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StorageChangeSet {
    pub block: String,
    pub changes: Vec<(String, Option<String>)>,
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

pub struct RpcClient {
    client: Client,
    url: String,
    max_retries: u32,
    page_size: u32,
}

impl RpcClient {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            url: config.rpc_url.clone(),
            max_retries: config.rpc_max_retries,
            page_size: config.keys_page_size,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one JSON-RPC request.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: RpcResponse = response.json().await?;
        into_result(body)
    }

    /// [`call`](Self::call) with exponential back-off on transient failures.
    pub async fn call_with_backoff<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T> {
        let mut backoff = INITIAL_BACKOFF_SECS;
        let mut attempt = 0;

        loop {
            match self.call(method, params.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{method} failed (attempt {attempt}/{}, retrying in {backoff}s): {e}",
                        self.max_retries
                    );
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fail fast if the node does not expose every method in
    /// [`REQUIRED_METHODS`].
    pub async fn ensure_supported(&self) -> Result<()> {
        let available: RpcMethods = self.call_with_backoff("rpc_methods", json!([])).await?;
        let missing = missing_methods(&available.methods);
        if !missing.is_empty() {
            return Err(ClientError::Unsupported(format!(
                "{} does not expose {}",
                self.url,
                missing.join(", ")
            )));
        }
        debug!("{} exposes all required RPC methods", self.url);
        Ok(())
    }

    /// `Bounties::BountyCount`: number of bounties ever proposed.
    pub async fn bounty_count(&self) -> Result<u32> {
        let raw: Option<String> = self
            .call_with_backoff("state_getStorage", json!([BOUNTY_COUNT_KEY]))
            .await?;
        match raw {
            Some(value) => decode_u32(&value),
            None => Ok(0),
        }
    }

    /// Every key under the `Bounties::Bounties` map.
    pub async fn bounty_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut start_key: Option<String> = None;

        loop {
            let page: Vec<String> = self
                .call_with_backoff(
                    "state_getKeysPaged",
                    json!([BOUNTIES_PREFIX, self.page_size, start_key]),
                )
                .await?;

            let done = page.len() < self.page_size as usize;
            start_key = page.last().cloned();
            keys.extend(page);

            if done || start_key.is_none() {
                break;
            }
        }

        Ok(keys)
    }

    /// Read and decode every bounty currently in storage.
    pub async fn fetch_bounties(&self) -> Result<BountySnapshot> {
        let keys = self.bounty_keys().await?;
        let mut snapshot = BountySnapshot::new();

        for chunk in keys.chunks(self.page_size as usize) {
            let sets: Vec<StorageChangeSet> = self
                .call_with_backoff("state_queryStorageAt", json!([chunk]))
                .await?;
            snapshot.extend(decode_change_sets(&sets)?);
        }

        debug!("Fetched {} bounties from {}", snapshot.len(), self.url);
        Ok(snapshot)
    }

    /// A single bounty, or `None` if the id is not (or no longer) in storage.
    pub async fn fetch_bounty(&self, id: u32) -> Result<Option<OnChainBounty>> {
        let raw: Option<String> = self
            .call_with_backoff("state_getStorage", json!([bounty_key(id)]))
            .await?;
        raw.map(|value| decode_bounty(id, &value)).transpose()
    }

    /// `Bounties::BountyDescriptions` for `id`, split into title and
    /// description.
    pub async fn bounty_description(&self, id: u32) -> Result<Option<BountyDescription>> {
        let raw: Option<String> = self
            .call_with_backoff("state_getStorage", json!([bounty_description_key(id)]))
            .await?;
        raw.map(|value| decode_description(&value)).transpose()
    }

    /// Submit a signed extrinsic and return its hash. Not retried.
    pub async fn submit_extrinsic(&self, extrinsic_hex: &str) -> Result<String> {
        self.call("author_submitExtrinsic", json!([extrinsic_hex]))
            .await
    }
}

fn into_result<T: DeserializeOwned>(body: RpcResponse) -> Result<T> {
    if let Some(err) = body.error {
        let message = match err.data {
            Some(Value::String(data)) => format!("{}: {data}", err.message),
            _ => err.message,
        };
        return Err(ClientError::Rpc {
            code: err.code,
            message,
        });
    }
    Ok(serde_json::from_value(body.result)?)
}

/// Invalid request, unknown method and invalid params are permanent;
/// everything else on the wire may succeed on a later attempt.
fn is_retryable(err: &ClientError) -> bool {
    match err {
        ClientError::Http(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.is_request()
                || e.status().is_some_and(|s| {
                    s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                })
        }
        ClientError::Rpc { code, .. } => !matches!(code, -32600 | -32601 | -32602),
        _ => false,
    }
}

fn missing_methods(available: &[String]) -> Vec<&'static str> {
    REQUIRED_METHODS
        .iter()
        .copied()
        .filter(|m| !available.iter().any(|a| a == m))
        .collect()
}

// ─────────────────────────────────────────────────────────
// Storage decoding
// ─────────────────────────────────────────────────────────

fn decode_hex(raw: &str) -> Result<Vec<u8>> {
    hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|e| ClientError::Decode(format!("invalid hex: {e}")))
}

fn map_key(pallet: &str, item: &str, id: u32) -> String {
    let id = id.to_le_bytes();
    let mut key = Vec::with_capacity(16 + 16 + 8 + 4);
    key.extend_from_slice(&twox_128(pallet.as_bytes()));
    key.extend_from_slice(&twox_128(item.as_bytes()));
    key.extend_from_slice(&twox_64(&id));
    key.extend_from_slice(&id);
    format!("0x{}", hex::encode(key))
}

/// Storage key of `Bounties::Bounties[id]`.
pub fn bounty_key(id: u32) -> String {
    map_key("Bounties", "Bounties", id)
}

/// Storage key of `Bounties::BountyDescriptions[id]`.
pub fn bounty_description_key(id: u32) -> String {
    map_key("Bounties", "BountyDescriptions", id)
}

/// Recover the bounty id from a full `Bounties::Bounties` storage key.
pub fn bounty_id_from_key(key: &str) -> Option<u32> {
    let bytes = hex::decode(key.strip_prefix("0x")?).ok()?;
    let prefix = hex::decode(BOUNTIES_PREFIX.strip_prefix("0x")?).ok()?;
    if bytes.len() != prefix.len() + 8 + 4 || !bytes.starts_with(&prefix) {
        return None;
    }
    let id: [u8; 4] = bytes[bytes.len() - 4..].try_into().ok()?;
    Some(u32::from_le_bytes(id))
}

pub fn decode_u32(value_hex: &str) -> Result<u32> {
    let bytes = decode_hex(value_hex)?;
    let raw: [u8; 4] = bytes
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| ClientError::Decode(format!("expected 4 bytes, got {}", bytes.len())))?;
    Ok(u32::from_le_bytes(raw))
}

/// Decode a SCALE-encoded `Bounty` record. Only the status discriminant is
/// read; variant payloads (curator, beneficiary, ...) are ignored.
pub fn decode_bounty(id: u32, value_hex: &str) -> Result<OnChainBounty> {
    let bytes = decode_hex(value_hex)?;
    if bytes.len() < MIN_BOUNTY_LEN {
        return Err(ClientError::Decode(format!(
            "bounty {id}: record too short ({} bytes)",
            bytes.len()
        )));
    }

    let balance = |offset: usize| {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&bytes[offset..offset + 16]);
        Planck(u128::from_le_bytes(buf))
    };

    let status = BountyStatus::from_index(bytes[96]).ok_or_else(|| {
        ClientError::Decode(format!("bounty {id}: unknown status {}", bytes[96]))
    })?;

    Ok(OnChainBounty {
        id,
        proposer: format!("0x{}", hex::encode(&bytes[..32])),
        value: balance(32),
        fee: balance(48),
        curator_deposit: balance(64),
        bond: balance(80),
        status,
    })
}

/// Decode a SCALE `BoundedVec<u8>` description. Invalid UTF-8 is replaced
/// rather than rejected.
pub fn decode_description(value_hex: &str) -> Result<BountyDescription> {
    let bytes = decode_hex(value_hex)?;
    let raw = Vec::<u8>::decode(&mut &bytes[..])
        .map_err(|e| ClientError::Decode(format!("bounty description: {e}")))?;
    Ok(BountyDescription::parse(&String::from_utf8_lossy(&raw)))
}

/// Turn `state_queryStorageAt` results into a snapshot. Keys whose value is
/// `null` were removed and are skipped.
pub fn decode_change_sets(sets: &[StorageChangeSet]) -> Result<BountySnapshot> {
    let mut snapshot = BountySnapshot::new();
    for set in sets {
        for (key, value) in &set.changes {
            let id = bounty_id_from_key(key)
                .ok_or_else(|| ClientError::Decode(format!("not a bounty key: {key}")))?;
            if let Some(value) = value {
                snapshot.insert(id, decode_bounty(id, value)?);
            }
        }
    }
    Ok(snapshot)
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
