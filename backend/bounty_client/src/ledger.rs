//! # Transaction Ledger
//!
//! In-memory record of every bounty extrinsic the user submitted during this
//! process. It is a display aid, not a source of truth: the chain is.
//!
//! ## Status as a Finite-State Machine
//!
//! ```text
//! Pending ──► Success
//!    └──────► Error
//! ```
//!
//! A record is created `Pending` before the network call resolves and moves
//! at most once, to a terminal state. Any other requested transition is
//! ignored. Retries are new records.
//!
//! ## Sharing
//!
//! The ledger is internally locked and meant to be shared as
//! `Arc<TransactionLedger>`. Each mutation runs to completion under the write
//! lock; observers are called after that lock is released and receive a copy
//! of the affected record. Mutations and their notifications are serialized
//! together, so observers see changes in the order they were applied.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::{ReentrantMutex, RwLock};
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::notify::{Observers, SubscriptionId};

/// Free-form display data attached at creation (title, amount, ...).
pub type Metadata = BTreeMap<String, String>;

/// Process-unique record identifier, rendered as `tx_<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx_{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("tx_")
            .and_then(|n| n.parse().ok())
            .map(TransactionId)
            .ok_or_else(|| format!("invalid transaction id: {s}"))
    }
}

impl Serialize for TransactionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The bounty extrinsic a record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    CreateBounty,
    ApproveBounty,
    ClaimBounty,
    AwardBounty,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateBounty => "create_bounty",
            Self::ApproveBounty => "approve_bounty",
            Self::ClaimBounty => "claim_bounty",
            Self::AwardBounty => "award_bounty",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Error,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Success) | (Self::Pending, Self::Error)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub submitted_at: DateTime<Utc>,
    /// Extrinsic hash; only set on success.
    pub result_hash: Option<String>,
    /// Block the extrinsic landed in, when the submitter reports one; only set on success.
    pub block_reference: Option<String>,
    /// Only set on error.
    pub failure_reason: Option<String>,
    pub metadata: Metadata,
}

/// A requested status change. Fields that do not belong to the target
/// status are dropped when the update is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: TransactionStatus,
    pub result_hash: Option<String>,
    pub block_reference: Option<String>,
    pub failure_reason: Option<String>,
}

impl StatusUpdate {
    pub fn success(result_hash: impl Into<String>) -> Self {
        Self {
            status: TransactionStatus::Success,
            result_hash: Some(result_hash.into()),
            block_reference: None,
            failure_reason: None,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: TransactionStatus::Error,
            result_hash: None,
            block_reference: None,
            failure_reason: Some(reason.into()),
        }
    }

    pub fn with_block(mut self, block_reference: Option<String>) -> Self {
        self.block_reference = block_reference;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// No record with that id; nothing changed.
    UnknownId,
    /// The record is not allowed to move to the requested status.
    Rejected {
        from: TransactionStatus,
        to: TransactionStatus,
    },
}

/// Change notification delivered to ledger observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChange {
    Added(TransactionRecord),
    Updated(TransactionRecord),
    Cleared,
}

#[derive(Default)]
struct LedgerState {
    next_id: u64,
    records: BTreeMap<TransactionId, TransactionRecord>,
}

#[derive(Default)]
pub struct TransactionLedger {
    state: RwLock<LedgerState>,
    /// Held from a mutation until its observers have run. Reentrant so an
    /// observer may itself mutate the ledger.
    delivery: ReentrantMutex<()>,
    observers: Observers<LedgerChange>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new `Pending` operation and return its id.
    pub fn add(&self, kind: TransactionKind, metadata: Metadata) -> TransactionId {
        let _delivery = self.delivery.lock();
        let record = {
            let mut state = self.state.write();
            state.next_id += 1;
            let id = TransactionId(state.next_id);
            let record = TransactionRecord {
                id,
                kind,
                status: TransactionStatus::Pending,
                submitted_at: Utc::now(),
                result_hash: None,
                block_reference: None,
                failure_reason: None,
                metadata,
            };
            state.records.insert(id, record.clone());
            record
        };

        debug!("Ledger: added {} ({})", record.id, kind.as_str());
        let id = record.id;
        self.observers.notify(&LedgerChange::Added(record));
        id
    }

    /// Move a pending record to a terminal state. Unknown ids and
    /// transitions out of terminal states leave the ledger untouched.
    pub fn update(&self, id: TransactionId, update: StatusUpdate) -> UpdateOutcome {
        let _delivery = self.delivery.lock();
        let updated = {
            let mut state = self.state.write();
            let Some(record) = state.records.get_mut(&id) else {
                debug!("Ledger miss: update for unknown transaction {id} ignored");
                return UpdateOutcome::UnknownId;
            };

            if !record.status.can_transition_to(update.status) {
                warn!(
                    "Ledger: ignoring {:?} -> {:?} for {id}",
                    record.status, update.status
                );
                return UpdateOutcome::Rejected {
                    from: record.status,
                    to: update.status,
                };
            }

            record.status = update.status;
            match update.status {
                TransactionStatus::Success => {
                    record.result_hash = update.result_hash;
                    record.block_reference = update.block_reference;
                }
                TransactionStatus::Error => {
                    record.failure_reason = update.failure_reason;
                }
                TransactionStatus::Pending => {}
            }
            record.clone()
        };

        debug!("Ledger: {} is now {:?}", updated.id, updated.status);
        self.observers.notify(&LedgerChange::Updated(updated));
        UpdateOutcome::Applied
    }

    /// Drop every record. Ids keep counting up afterwards.
    pub fn clear(&self) {
        let _delivery = self.delivery.lock();
        self.state.write().records.clear();
        debug!("Ledger: cleared");
        self.observers.notify(&LedgerChange::Cleared);
    }

    /// Pending records, most recent first.
    pub fn list_pending(&self) -> Vec<TransactionRecord> {
        self.state
            .read()
            .records
            .values()
            .rev()
            .filter(|r| !r.status.is_terminal())
            .cloned()
            .collect()
    }

    /// All records, most recent first.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.recent(usize::MAX)
    }

    /// At most `limit` records, most recent first.
    pub fn recent(&self, limit: usize) -> Vec<TransactionRecord> {
        self.state
            .read()
            .records
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: TransactionId) -> Option<TransactionRecord> {
        self.state.read().records.get(&id).cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.state
            .read()
            .records
            .values()
            .filter(|r| !r.status.is_terminal())
            .count()
    }

    /// Record counts per status, for dashboard badges.
    pub fn status_counts(&self) -> HashMap<TransactionStatus, usize> {
        let mut counts = HashMap::new();
        for record in self.state.read().records.values() {
            *counts.entry(record.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Callbacks run after the state lock is released, so they may read or
    /// mutate the ledger. Other threads' mutations wait until every callback
    /// for the current change has returned.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LedgerChange) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}
