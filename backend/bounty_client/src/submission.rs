//! Submission glue between user input, the chain and the ledger.
//!
//! Every action follows the same path: validate input, build the call,
//! record it as pending, submit, settle the record. Input problems are
//! returned as errors before anything is recorded. Chain failures are never
//! returned as errors: they settle the record as `Error` and produce an
//! error [`Notice`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::amount::{format_with_symbol, to_planck};
use crate::chain::{BountyCall, ChainSubmitter};
use crate::config::Config;
use crate::errors::{ClientError, Result};
use crate::events::BountyDescription;
use crate::ledger::{
    Metadata, StatusUpdate, TransactionId, TransactionKind, TransactionLedger, TransactionStatus,
};

/// Shown when a failure carries no message of its own.
pub const FALLBACK_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Form input for a new bounty proposal.
#[derive(Debug, Clone, Default)]
pub struct BountyProposal {
    pub title: String,
    pub description: String,
    /// Token amount as typed, e.g. `"12.5"`.
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A user-facing notification about the outcome of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: String,
}

impl Notice {
    fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Result of an action that reached the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub tx_id: TransactionId,
    pub status: TransactionStatus,
    pub notice: Notice,
}

pub struct BountyService<C: ChainSubmitter> {
    submitter: Arc<C>,
    ledger: Arc<TransactionLedger>,
    decimals: u8,
    symbol: String,
}

impl<C: ChainSubmitter> BountyService<C> {
    pub fn new(submitter: Arc<C>, ledger: Arc<TransactionLedger>, config: &Config) -> Self {
        Self::with_token(
            submitter,
            ledger,
            config.token_decimals,
            config.token_symbol.clone(),
        )
    }

    pub fn with_token(
        submitter: Arc<C>,
        ledger: Arc<TransactionLedger>,
        decimals: u8,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            submitter,
            ledger,
            decimals,
            symbol: symbol.into(),
        }
    }

    pub fn ledger(&self) -> &Arc<TransactionLedger> {
        &self.ledger
    }

    /// `Bounties::propose_bounty` with the on-chain description
    /// `"<title>: <description>"`.
    pub async fn propose_bounty(
        &self,
        signer: &C::Signer,
        proposal: &BountyProposal,
    ) -> Result<Submitted> {
        let title = required(&proposal.title, "title")?;
        let description = required(&proposal.description, "description")?;
        let value = to_planck(&proposal.value, self.decimals)?;

        let metadata = Metadata::from([
            ("title".to_string(), title.to_string()),
            (
                "value".to_string(),
                format_with_symbol(value, self.decimals, &self.symbol),
            ),
            ("planck".to_string(), value.to_string()),
        ]);
        let call = BountyCall::ProposeBounty {
            value,
            description: BountyDescription {
                title: title.to_string(),
                description: description.to_string(),
            }
            .to_string(),
        };

        let success = Notice::success(
            "Bounty created successfully!",
            format!("Your bounty \"{title}\" has been proposed."),
        );
        Ok(self
            .execute(signer, call, metadata, success, "Failed to create bounty")
            .await)
    }

    /// `Bounties::approve_bounty`. On most networks this needs a governance
    /// origin, so a plain account is expected to be rejected by the chain.
    pub async fn approve_bounty(&self, signer: &C::Signer, bounty_id: u32) -> Result<Submitted> {
        let success = Notice::success(
            "Approval submitted",
            format!("Approval for bounty #{bounty_id} has been submitted."),
        );
        Ok(self
            .execute(
                signer,
                BountyCall::ApproveBounty { bounty_id },
                bounty_metadata(bounty_id),
                success,
                "Failed to approve bounty",
            )
            .await)
    }

    pub async fn claim_bounty(&self, signer: &C::Signer, bounty_id: u32) -> Result<Submitted> {
        let success = Notice::success(
            "Bounty claimed!",
            "You have successfully claimed this bounty",
        );
        Ok(self
            .execute(
                signer,
                BountyCall::ClaimBounty { bounty_id },
                bounty_metadata(bounty_id),
                success,
                "Failed to claim bounty",
            )
            .await)
    }

    pub async fn award_bounty(
        &self,
        signer: &C::Signer,
        bounty_id: u32,
        beneficiary: &str,
    ) -> Result<Submitted> {
        let beneficiary = required(beneficiary, "beneficiary")?;

        let mut metadata = bounty_metadata(bounty_id);
        metadata.insert("beneficiary".to_string(), beneficiary.to_string());
        let success = Notice::success(
            "Bounty awarded",
            format!("Bounty #{bounty_id} has been awarded to {beneficiary}."),
        );
        Ok(self
            .execute(
                signer,
                BountyCall::AwardBounty {
                    bounty_id,
                    beneficiary: beneficiary.to_string(),
                },
                metadata,
                success,
                "Failed to award bounty",
            )
            .await)
    }

    async fn execute(
        &self,
        signer: &C::Signer,
        call: BountyCall,
        mut metadata: Metadata,
        success: Notice,
        failure_title: &str,
    ) -> Submitted {
        if let Some(address) = self.submitter.signer_address(signer) {
            metadata.insert("signer".to_string(), address);
        }
        let kind: TransactionKind = call.kind();
        let tx_id = self.ledger.add(kind, metadata);

        match self.submitter.submit(&call, signer).await {
            Ok(receipt) => {
                info!(
                    "{} submitted as {tx_id}: {}",
                    call.call_name(),
                    receipt.tx_hash
                );
                self.ledger.update(
                    tx_id,
                    StatusUpdate::success(receipt.tx_hash).with_block(receipt.block_hash),
                );
                Submitted {
                    tx_id,
                    status: TransactionStatus::Success,
                    notice: success,
                }
            }
            Err(e) => {
                let reason = failure_message(&e.to_string());
                error!("{} failed for {tx_id}: {reason}", call.call_name());
                self.ledger.update(tx_id, StatusUpdate::error(reason.clone()));
                Submitted {
                    tx_id,
                    status: TransactionStatus::Error,
                    notice: Notice::error(failure_title, reason),
                }
            }
        }
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientError::MissingField(field));
    }
    Ok(trimmed)
}

fn bounty_metadata(bounty_id: u32) -> Metadata {
    Metadata::from([("bounty_id".to_string(), bounty_id.to_string())])
}

fn failure_message(message: &str) -> String {
    if message.trim().is_empty() {
        FALLBACK_ERROR_MESSAGE.to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::InvalidAmount;
    use crate::chain::{MockSubmitter, SubmissionReceipt, SubmitError};

    fn service() -> (Arc<MockSubmitter>, BountyService<MockSubmitter>) {
        let mock = Arc::new(MockSubmitter::new());
        let service = BountyService::with_token(
            Arc::clone(&mock),
            Arc::new(TransactionLedger::new()),
            10,
            "DOT",
        );
        (mock, service)
    }

    fn proposal(value: &str) -> BountyProposal {
        BountyProposal {
            title: "Runtime audit".to_string(),
            description: "Review the staking pallet".to_string(),
            value: value.to_string(),
        }
    }

    fn receipt(hash: &str) -> std::result::Result<SubmissionReceipt, SubmitError> {
        Ok(SubmissionReceipt {
            tx_hash: hash.to_string(),
            block_hash: Some("0xblock".to_string()),
        })
    }

    #[tokio::test]
    async fn invalid_amount_never_reaches_ledger_or_chain() {
        let (mock, service) = service();
        for value in ["0", "-1", "abc", ""] {
            let err = service.propose_bounty(&(), &proposal(value)).await.unwrap_err();
            assert!(matches!(err, ClientError::InvalidAmount(_)), "{value}: {err}");
        }
        assert!(service.ledger().is_empty());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn blank_fields_are_rejected_first() {
        let (mock, service) = service();
        let mut input = proposal("1");
        input.title = "   ".to_string();
        assert!(matches!(
            service.propose_bounty(&(), &input).await,
            Err(ClientError::MissingField("title"))
        ));
        assert!(matches!(
            service.award_bounty(&(), 1, "").await,
            Err(ClientError::MissingField("beneficiary"))
        ));
        assert!(service.ledger().is_empty());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn proposal_sends_exact_planck_and_joined_description() {
        let (mock, service) = service();
        mock.push_response(receipt("0xabc"));

        let submitted = service.propose_bounty(&(), &proposal("0.1")).await.unwrap();
        assert_eq!(submitted.status, TransactionStatus::Success);
        assert_eq!(submitted.notice.level, NoticeLevel::Success);
        assert_eq!(
            submitted.notice.description,
            "Your bounty \"Runtime audit\" has been proposed."
        );

        assert_eq!(
            mock.calls(),
            vec![BountyCall::ProposeBounty {
                value: crate::amount::Planck(1_000_000_000),
                description: "Runtime audit: Review the staking pallet".to_string(),
            }]
        );

        let record = service.ledger().get(submitted.tx_id).unwrap();
        assert_eq!(record.kind, TransactionKind::CreateBounty);
        assert_eq!(record.result_hash.as_deref(), Some("0xabc"));
        assert_eq!(record.block_reference.as_deref(), Some("0xblock"));
        assert_eq!(record.metadata["value"], "0.1 DOT");
        assert_eq!(record.metadata["planck"], "1000000000");
    }

    #[tokio::test]
    async fn chain_failure_settles_as_error_notice() {
        let (mock, service) = service();
        mock.push_response(Err(SubmitError::Rejected(
            "Bounties.InsufficientProposersBalance".to_string(),
        )));

        let submitted = service.claim_bounty(&(), 9).await.unwrap();
        assert_eq!(submitted.status, TransactionStatus::Error);
        assert_eq!(submitted.notice.level, NoticeLevel::Error);
        assert_eq!(submitted.notice.title, "Failed to claim bounty");
        assert_eq!(
            submitted.notice.description,
            "Bounties.InsufficientProposersBalance"
        );

        let record = service.ledger().get(submitted.tx_id).unwrap();
        assert_eq!(record.status, TransactionStatus::Error);
        assert_eq!(
            record.failure_reason.as_deref(),
            Some("Bounties.InsufficientProposersBalance")
        );
        assert!(service.ledger().list_pending().is_empty());
    }

    #[tokio::test]
    async fn empty_failure_message_uses_fallback() {
        let (mock, service) = service();
        mock.push_response(Err(SubmitError::Signing(String::new())));

        let submitted = service.approve_bounty(&(), 2).await.unwrap();
        assert_eq!(submitted.notice.description, FALLBACK_ERROR_MESSAGE);
        assert_eq!(
            service.ledger().get(submitted.tx_id).unwrap().failure_reason.as_deref(),
            Some(FALLBACK_ERROR_MESSAGE)
        );
    }

    #[tokio::test]
    async fn award_records_beneficiary() {
        let (mock, service) = service();
        mock.push_response(receipt("0x77"));
        let beneficiary = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

        let submitted = service.award_bounty(&(), 3, beneficiary).await.unwrap();
        let record = service.ledger().get(submitted.tx_id).unwrap();
        assert_eq!(record.kind, TransactionKind::AwardBounty);
        assert_eq!(record.metadata["beneficiary"], beneficiary);
        assert_eq!(record.metadata["bounty_id"], "3");
    }

    #[test]
    fn invalid_amount_is_reported_as_such() {
        let err: ClientError = InvalidAmount::NotPositive.into();
        assert_eq!(err.to_string(), "Invalid amount: amount must be greater than 0");
    }
}
