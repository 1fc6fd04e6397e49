//! # Chain submission
//!
//! Bounty extrinsics go to the chain through one pinned interface,
//! [`ChainSubmitter`]. The wallet's signing capability is passed through it
//! untouched.
//!
//! ```text
//! BountyCall + signer
//!      │
//!      ▼
//! ChainSubmitter::submit()
//!      │
//!      ├─ RpcSubmitter:  signer.sign(call) ─► author_submitExtrinsic
//!      └─ MockSubmitter: queued results (tests, dry runs)
//!      │
//!      ▼
//! SubmissionReceipt { tx_hash, block_hash } | SubmitError
//! ```
//!
//! Submitters perform a single attempt. A retry is a new submission and a
//! new ledger record.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::amount::Planck;
use crate::errors::ClientError;
use crate::ledger::TransactionKind;
use crate::rpc::RpcClient;

/// A `Bounties` pallet call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum BountyCall {
    ProposeBounty { value: Planck, description: String },
    ApproveBounty { bounty_id: u32 },
    ClaimBounty { bounty_id: u32 },
    AwardBounty { bounty_id: u32, beneficiary: String },
}

impl BountyCall {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::ProposeBounty { .. } => TransactionKind::CreateBounty,
            Self::ApproveBounty { .. } => TransactionKind::ApproveBounty,
            Self::ClaimBounty { .. } => TransactionKind::ClaimBounty,
            Self::AwardBounty { .. } => TransactionKind::AwardBounty,
        }
    }

    /// Pallet call name as it appears in runtime metadata.
    pub fn call_name(&self) -> &'static str {
        match self {
            Self::ProposeBounty { .. } => "propose_bounty",
            Self::ApproveBounty { .. } => "approve_bounty",
            Self::ClaimBounty { .. } => "claim_bounty",
            Self::AwardBounty { .. } => "award_bounty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub tx_hash: String,
    /// Inclusion block, when the submitter tracks it.
    pub block_hash: Option<String>,
}

/// Why a submission did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The wallet refused or failed to sign.
    #[error("{0}")]
    Signing(String),

    /// The node rejected the extrinsic (bad nonce, fees, dispatch checks).
    #[error("{0}")]
    Rejected(String),

    #[error("network error: {0}")]
    Network(String),
}

impl From<ClientError> for SubmitError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rpc { code, message } => {
                SubmitError::Rejected(format!("{message} (code {code})"))
            }
            other => SubmitError::Network(other.to_string()),
        }
    }
}

/// The opaque signing capability handed out by a wallet connection.
#[async_trait]
pub trait ExtrinsicSigner: Send + Sync {
    /// SS58 address of the signing account.
    fn address(&self) -> &str;

    /// Build and sign an extrinsic for `call`, returning it as 0x-prefixed hex.
    async fn sign(&self, call: &BountyCall) -> Result<String, SubmitError>;
}

/// The single submission interface the rest of the crate depends on.
#[async_trait]
pub trait ChainSubmitter: Send + Sync {
    /// Signing capability this submitter accepts.
    type Signer: ?Sized + Send + Sync;

    /// Account the signer acts for, when the submitter can tell.
    fn signer_address(&self, _signer: &Self::Signer) -> Option<String> {
        None
    }

    async fn submit(
        &self,
        call: &BountyCall,
        signer: &Self::Signer,
    ) -> Result<SubmissionReceipt, SubmitError>;
}

/// Submits through `author_submitExtrinsic`.
///
/// The plain HTTP method returns as soon as the extrinsic enters the pool,
/// so `block_hash` is always `None`.
pub struct RpcSubmitter {
    rpc: Arc<RpcClient>,
}

impl RpcSubmitter {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl ChainSubmitter for RpcSubmitter {
    type Signer = dyn ExtrinsicSigner;

    fn signer_address(&self, signer: &Self::Signer) -> Option<String> {
        Some(signer.address().to_string())
    }

    async fn submit(
        &self,
        call: &BountyCall,
        signer: &Self::Signer,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let extrinsic = signer.sign(call).await?;
        let tx_hash = self.rpc.submit_extrinsic(&extrinsic).await?;
        Ok(SubmissionReceipt {
            tx_hash,
            block_hash: None,
        })
    }
}

/// Replays pre-loaded results in FIFO order and records every call it saw.
/// Runs dry when the queue is empty.
pub struct MockSubmitter {
    responses: Mutex<VecDeque<Result<SubmissionReceipt, SubmitError>>>,
    calls: Mutex<Vec<BountyCall>>,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_response(&self, response: Result<SubmissionReceipt, SubmitError>) {
        self.responses.lock().push_back(response);
    }

    pub fn calls(&self) -> Vec<BountyCall> {
        self.calls.lock().clone()
    }
}

impl Default for MockSubmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainSubmitter for MockSubmitter {
    type Signer = ();

    async fn submit(
        &self,
        call: &BountyCall,
        _signer: &(),
    ) -> Result<SubmissionReceipt, SubmitError> {
        self.calls.lock().push(call.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SubmitError::Network("no mock response".to_string())))
    }
}
