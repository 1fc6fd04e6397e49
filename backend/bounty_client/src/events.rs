//! Bounty types read from the `Bounties` pallet and the change notifications
//! derived from them.
//!
//! The chain stores one `Bounty` record per id; this module only models the
//! parts the dashboard shows. [`BountyNotifier`] fans change notifications
//! out to whoever subscribed, and keeps a short history for display.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::amount::Planck;
use crate::notify::{Observers, SubscriptionId};

/// Lifecycle status of an on-chain bounty, in the pallet's variant order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BountyStatus {
    /// Proposed, waiting for council approval.
    Proposed,
    /// Approved, waiting to be funded from the treasury.
    Approved,
    /// Funded, waiting for a curator.
    Funded,
    /// A curator was proposed and has not accepted yet.
    CuratorProposed,
    /// Curator accepted; work in progress.
    Active,
    /// Awarded to a beneficiary; claimable once the payout delay passes.
    PendingPayout,
    /// Approved together with a curator in one step.
    ApprovedWithCurator,
}

impl BountyStatus {
    /// Map the SCALE enum discriminant to a status.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Proposed),
            1 => Some(Self::Approved),
            2 => Some(Self::Funded),
            3 => Some(Self::CuratorProposed),
            4 => Some(Self::Active),
            5 => Some(Self::PendingPayout),
            6 => Some(Self::ApprovedWithCurator),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::Funded => "funded",
            Self::CuratorProposed => "curator_proposed",
            Self::Active => "active",
            Self::PendingPayout => "pending_payout",
            Self::ApprovedWithCurator => "approved_with_curator",
        }
    }

    /// Approved and not yet awarded.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Approved
                | Self::Funded
                | Self::CuratorProposed
                | Self::Active
                | Self::ApprovedWithCurator
        )
    }
}

/// A bounty as decoded from chain storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnChainBounty {
    pub id: u32,
    /// Proposer account id, 0x-prefixed hex.
    pub proposer: String,
    pub value: Planck,
    pub fee: Planck,
    pub curator_deposit: Planck,
    pub bond: Planck,
    pub status: BountyStatus,
}

/// Title and body of a bounty, stored on chain as `"<title>: <description>"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BountyDescription {
    pub title: String,
    pub description: String,
}

impl BountyDescription {
    /// Split at the first `": "`. Text without a separator is all title.
    pub fn parse(text: &str) -> Self {
        match text.split_once(": ") {
            Some((title, description)) => Self {
                title: title.trim().to_string(),
                description: description.trim().to_string(),
            },
            None => Self {
                title: text.trim().to_string(),
                description: String::new(),
            },
        }
    }
}

impl fmt::Display for BountyDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// All bounties currently in storage, keyed by id.
pub type BountySnapshot = BTreeMap<u32, OnChainBounty>;

/// Aggregate figures for the dashboard header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BountySummary {
    pub total: usize,
    pub proposed: usize,
    pub active: usize,
    pub pending_payout: usize,
    pub total_value: Planck,
}

pub fn summarize(snapshot: &BountySnapshot) -> BountySummary {
    let mut summary = BountySummary {
        total: snapshot.len(),
        ..BountySummary::default()
    };
    for bounty in snapshot.values() {
        match bounty.status {
            BountyStatus::Proposed => summary.proposed += 1,
            BountyStatus::PendingPayout => summary.pending_payout += 1,
            status if status.is_active() => summary.active += 1,
            _ => {}
        }
        summary.total_value = summary.total_value.saturating_add(bounty.value);
    }
    summary
}

/// What changed about a bounty between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BountyUpdateKind {
    /// A new bounty id appeared.
    BountyCreated,
    /// Left `Proposed` for an approved state.
    BountyApproved,
    /// Entered `PendingPayout`.
    BountyAwarded,
    /// Disappeared while in `PendingPayout`: the payout was claimed.
    BountyClaimed,
    /// Disappeared from any other state (rejected or closed).
    BountyClosed,
    /// Any other status change, e.g. a curator assignment.
    BountyUpdated,
}

impl BountyUpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BountyCreated => "bounty_created",
            Self::BountyApproved => "bounty_approved",
            Self::BountyAwarded => "bounty_awarded",
            Self::BountyClaimed => "bounty_claimed",
            Self::BountyClosed => "bounty_closed",
            Self::BountyUpdated => "bounty_updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BountyUpdate {
    pub kind: BountyUpdateKind,
    pub bounty_id: u32,
    /// Status after the change; `None` once the bounty left storage.
    pub status: Option<BountyStatus>,
    pub value: Option<Planck>,
    pub timestamp: DateTime<Utc>,
}

/// Fan-out point for live bounty changes.
pub struct BountyNotifier {
    observers: Observers<BountyUpdate>,
    history: Mutex<VecDeque<BountyUpdate>>,
    capacity: usize,
    connected: AtomicBool,
}

impl BountyNotifier {
    /// `capacity` bounds the retained update history.
    pub fn new(capacity: usize) -> Self {
        Self {
            observers: Observers::new(),
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            connected: AtomicBool::new(false),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&BountyUpdate) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn publish(&self, update: BountyUpdate) {
        {
            let mut history = self.history.lock();
            history.push_front(update.clone());
            history.truncate(self.capacity);
        }
        self.observers.notify(&update);
    }

    /// Retained updates, most recent first.
    pub fn recent_updates(&self) -> Vec<BountyUpdate> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn clear_updates(&self) {
        self.history.lock().clear();
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Whether the last poll of the chain succeeded.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
