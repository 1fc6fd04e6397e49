//! Long-running background task that polls bounty storage and publishes
//! the differences between consecutive snapshots to the [`BountyNotifier`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::Result;
use crate::events::{BountyNotifier, BountySnapshot, BountyStatus, BountyUpdate, BountyUpdateKind};
use crate::rpc::RpcClient;

/// Anything that can produce the current set of on-chain bounties.
#[async_trait]
pub trait BountySource: Send + Sync {
    async fn fetch_bounties(&self) -> Result<BountySnapshot>;
}

#[async_trait]
impl BountySource for RpcClient {
    async fn fetch_bounties(&self) -> Result<BountySnapshot> {
        RpcClient::fetch_bounties(self).await
    }
}

pub struct BountyWatcher<S: ?Sized> {
    source: Arc<S>,
    notifier: Arc<BountyNotifier>,
    poll_interval: Duration,
    snapshot: Option<BountySnapshot>,
}

impl<S: BountySource + ?Sized> BountyWatcher<S> {
    pub fn new(source: Arc<S>, notifier: Arc<BountyNotifier>, poll_interval: Duration) -> Self {
        Self {
            source,
            notifier,
            poll_interval,
            snapshot: None,
        }
    }

    /// Last successfully fetched snapshot.
    pub fn snapshot(&self) -> Option<&BountySnapshot> {
        self.snapshot.as_ref()
    }

    /// Poll until `cancel` fires. Poll errors are logged and the loop keeps
    /// going on the next tick.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Bounty watcher starting, polling every {:?}", self.poll_interval);

        loop {
            if let Err(e) = self.poll_once().await {
                error!("Bounty watcher poll error: {e}");
                self.notifier.set_connected(false);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        self.notifier.set_connected(false);
        info!("Bounty watcher stopped");
    }

    /// Perform a single poll iteration and return how many updates were
    /// published. The first successful poll only records a baseline.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let next = self.source.fetch_bounties().await?;
        self.notifier.set_connected(true);

        let updates = match &self.snapshot {
            None => {
                info!("Bounty baseline: {} bounties in storage", next.len());
                Vec::new()
            }
            Some(prev) => diff_snapshots(prev, &next, Utc::now()),
        };

        let published = updates.len();
        for update in updates {
            debug!("Bounty {} → {}", update.bounty_id, update.kind.as_str());
            self.notifier.publish(update);
        }

        self.snapshot = Some(next);
        Ok(published)
    }
}

/// Updates that turn `prev` into `next`: appearances first (by id), then
/// disappearances.
pub fn diff_snapshots(
    prev: &BountySnapshot,
    next: &BountySnapshot,
    now: DateTime<Utc>,
) -> Vec<BountyUpdate> {
    let mut updates = Vec::new();

    for (id, bounty) in next {
        let kind = match prev.get(id) {
            None => BountyUpdateKind::BountyCreated,
            Some(old) if old.status != bounty.status => transition_kind(old.status, bounty.status),
            Some(_) => continue,
        };
        updates.push(BountyUpdate {
            kind,
            bounty_id: *id,
            status: Some(bounty.status),
            value: Some(bounty.value),
            timestamp: now,
        });
    }

    for (id, old) in prev {
        if next.contains_key(id) {
            continue;
        }
        let kind = if old.status == BountyStatus::PendingPayout {
            BountyUpdateKind::BountyClaimed
        } else {
            BountyUpdateKind::BountyClosed
        };
        updates.push(BountyUpdate {
            kind,
            bounty_id: *id,
            status: None,
            value: Some(old.value),
            timestamp: now,
        });
    }

    updates
}

fn transition_kind(from: BountyStatus, to: BountyStatus) -> BountyUpdateKind {
    match (from, to) {
        (_, BountyStatus::PendingPayout) => BountyUpdateKind::BountyAwarded,
        (BountyStatus::Proposed, to) if to.is_active() => BountyUpdateKind::BountyApproved,
        _ => BountyUpdateKind::BountyUpdated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Planck;
    use crate::errors::ClientError;
    use crate::events::OnChainBounty;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct FakeSource {
        polls: Mutex<VecDeque<Result<BountySnapshot>>>,
        calls: Mutex<usize>,
    }

    impl FakeSource {
        fn new(polls: Vec<Result<BountySnapshot>>) -> Self {
            Self {
                polls: Mutex::new(polls.into()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl BountySource for FakeSource {
        async fn fetch_bounties(&self) -> Result<BountySnapshot> {
            *self.calls.lock() += 1;
            self.polls
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(BountySnapshot::new()))
        }
    }

    fn snapshot(entries: &[(u32, BountyStatus)]) -> BountySnapshot {
        entries
            .iter()
            .map(|&(id, status)| {
                (
                    id,
                    OnChainBounty {
                        id,
                        proposer: "0x00".to_string(),
                        value: Planck(u128::from(id) * 10),
                        fee: Planck::ZERO,
                        curator_deposit: Planck::ZERO,
                        bond: Planck::ZERO,
                        status,
                    },
                )
            })
            .collect()
    }

    fn kinds(updates: &[BountyUpdate]) -> Vec<(u32, BountyUpdateKind)> {
        updates.iter().map(|u| (u.bounty_id, u.kind)).collect()
    }

    #[test]
    fn diff_detects_every_kind_of_change() {
        use BountyStatus::*;
        let prev = snapshot(&[(1, Proposed), (2, Funded), (3, Active), (4, PendingPayout), (5, Proposed), (6, Active)]);
        let next = snapshot(&[(1, Approved), (2, CuratorProposed), (3, PendingPayout), (6, Active), (7, Proposed)]);

        let updates = diff_snapshots(&prev, &next, Utc::now());
        assert_eq!(
            kinds(&updates),
            vec![
                (1, BountyUpdateKind::BountyApproved),
                (2, BountyUpdateKind::BountyUpdated),
                (3, BountyUpdateKind::BountyAwarded),
                (7, BountyUpdateKind::BountyCreated),
                (4, BountyUpdateKind::BountyClaimed),
                (5, BountyUpdateKind::BountyClosed),
            ]
        );

        let claimed = updates.iter().find(|u| u.bounty_id == 4).unwrap();
        assert_eq!(claimed.status, None);
        assert_eq!(claimed.value, Some(Planck(40)));
    }

    #[test]
    fn identical_snapshots_produce_nothing() {
        let snap = snapshot(&[(1, BountyStatus::Active)]);
        assert!(diff_snapshots(&snap, &snap, Utc::now()).is_empty());
    }

    #[tokio::test]
    async fn first_poll_is_a_silent_baseline() {
        let source = Arc::new(FakeSource::new(vec![
            Ok(snapshot(&[(0, BountyStatus::Proposed)])),
            Ok(snapshot(&[(0, BountyStatus::Approved), (1, BountyStatus::Proposed)])),
        ]));
        let notifier = Arc::new(BountyNotifier::new(10));
        let mut watcher = BountyWatcher::new(source, Arc::clone(&notifier), Duration::from_secs(6));

        assert_eq!(watcher.poll_once().await.unwrap(), 0);
        assert!(notifier.is_connected());
        assert!(notifier.recent_updates().is_empty());

        assert_eq!(watcher.poll_once().await.unwrap(), 2);
        let recent = notifier.recent_updates();
        assert_eq!(recent[0].kind, BountyUpdateKind::BountyCreated);
        assert_eq!(recent[1].kind, BountyUpdateKind::BountyApproved);
        assert_eq!(watcher.snapshot().map(|s| s.len()), Some(2));
    }

    #[tokio::test]
    async fn failed_poll_keeps_previous_snapshot() {
        let source = Arc::new(FakeSource::new(vec![
            Ok(snapshot(&[(0, BountyStatus::Proposed)])),
            Err(ClientError::Decode("garbage".to_string())),
            Ok(snapshot(&[])),
        ]));
        let notifier = Arc::new(BountyNotifier::new(10));
        let mut watcher = BountyWatcher::new(source, Arc::clone(&notifier), Duration::from_secs(6));

        watcher.poll_once().await.unwrap();
        assert!(watcher.poll_once().await.is_err());
        assert_eq!(watcher.snapshot().map(|s| s.len()), Some(1));

        assert_eq!(watcher.poll_once().await.unwrap(), 1);
        assert_eq!(
            notifier.recent_updates()[0].kind,
            BountyUpdateKind::BountyClosed
        );
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let source = Arc::new(FakeSource::new(vec![]));
        let notifier = Arc::new(BountyNotifier::new(10));
        let watcher = BountyWatcher::new(
            Arc::clone(&source),
            Arc::clone(&notifier),
            Duration::from_secs(3600),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        watcher.run(cancel).await;

        assert_eq!(*source.calls.lock(), 1);
        assert!(!notifier.is_connected());
    }
}
