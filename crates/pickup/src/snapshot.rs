//! In-memory board view derived from the order cache.
//!
//! The snapshot is rebuilt from the cache and swapped in whole; readers hold an
//! `Arc` to whichever version was current when they asked.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use pickup_db::{OrderCache, OrderRecord};
use serde::Serialize;
use tracing::debug;

use crate::status::{DerivedStatus, ACTIVE_STATUS_CODES};

/// Uncollected active orders, by category, each list ascending by check number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub being_prepared: Vec<String>,
    pub ready_to_collect: Vec<String>,
}

impl Snapshot {
    /// Project cache records onto the board.
    ///
    /// Collected orders and orders with an untracked status are dropped.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = OrderRecord>,
    {
        let mut snapshot = Self::default();
        for record in records {
            if record.collected {
                continue;
            }
            match DerivedStatus::from_code(record.distribution_status) {
                Some(DerivedStatus::BeingPrepared) => snapshot.being_prepared.push(record.chk_num),
                Some(DerivedStatus::ReadyToCollect) => {
                    snapshot.ready_to_collect.push(record.chk_num)
                }
                None => {}
            }
        }
        snapshot.being_prepared.sort_by(|a, b| compare_chk_nums(a, b));
        snapshot.ready_to_collect.sort_by(|a, b| compare_chk_nums(a, b));
        snapshot
    }

    pub fn get(&self, status: DerivedStatus) -> &[String] {
        match status {
            DerivedStatus::BeingPrepared => &self.being_prepared,
            DerivedStatus::ReadyToCollect => &self.ready_to_collect,
        }
    }

    pub fn len(&self) -> usize {
        self.being_prepared.len() + self.ready_to_collect.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Natural order for check numbers.
///
/// All-digit check numbers come first, compared numerically (leading zeros
/// break ties); every other check number follows in plain string order.
pub fn compare_chk_nums(a: &str, b: &str) -> Ordering {
    chk_num_key(a).cmp(&chk_num_key(b))
}

fn chk_num_key(chk_num: &str) -> (u8, usize, &str, &str) {
    if !chk_num.is_empty() && chk_num.bytes().all(|c| c.is_ascii_digit()) {
        let digits = chk_num.trim_start_matches('0');
        (0, digits.len(), digits, chk_num)
    } else {
        (1, 0, chk_num, chk_num)
    }
}

/// Holder of the current snapshot.
///
/// Every publish carries the ticket handed out before its cache read, so a
/// slow rebuild can never overwrite the result of one that started later.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Published>,
    next_ticket: AtomicU64,
}

#[derive(Debug, Default)]
struct Published {
    ticket: u64,
    snapshot: Arc<Snapshot>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard.snapshot)
    }

    /// Reserve a ticket before reading the cache.
    pub fn ticket(&self) -> u64 {
        self.next_ticket.fetch_add(1, AtomicOrdering::SeqCst) + 1
    }

    /// Swap in `snapshot` unless a newer ticket was already published.
    ///
    /// Returns whether the snapshot was installed.
    pub fn publish(&self, ticket: u64, snapshot: Arc<Snapshot>) -> bool {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        if ticket <= guard.ticket {
            return false;
        }
        *guard = Published { ticket, snapshot };
        true
    }
}

/// Rebuilds the board view from the order cache.
#[derive(Clone)]
pub struct ViewProjector {
    cache: OrderCache,
    cell: Arc<SnapshotCell>,
}

impl ViewProjector {
    pub fn new(cache: OrderCache) -> Self {
        Self {
            cache,
            cell: Arc::new(SnapshotCell::new()),
        }
    }

    /// Compute a snapshot from the current cache contents without publishing it.
    pub async fn rebuild(&self) -> pickup_db::Result<Snapshot> {
        let records = self.cache.list_active(&ACTIVE_STATUS_CODES).await?;
        Ok(Snapshot::from_records(records))
    }

    /// Rebuild and publish. Returns the snapshot that is current afterwards.
    pub async fn refresh(&self) -> pickup_db::Result<Arc<Snapshot>> {
        let ticket = self.cell.ticket();
        let snapshot = Arc::new(self.rebuild().await?);
        if !self.cell.publish(ticket, Arc::clone(&snapshot)) {
            debug!(ticket, "Discarded snapshot superseded by a newer rebuild");
            return Ok(self.cell.load());
        }
        debug!(
            being_prepared = snapshot.being_prepared.len(),
            ready_to_collect = snapshot.ready_to_collect.len(),
            "Snapshot published"
        );
        Ok(snapshot)
    }

    /// The snapshot most recently published.
    pub fn current(&self) -> Arc<Snapshot> {
        self.cell.load()
    }
}
