//! In-memory ledger store
//!
//! The authoritative record of normalized entries, keyed by [`EntryId`] for
//! idempotent insertion, plus a secondary ordered index for the display
//! feed.
//!
//! All mutation goes through the reconciliation engine's single apply loop;
//! the store itself only guarantees that readers never observe an entry
//! mid-update (entries are replaced wholesale under the map's shard lock).
//! Entries are never deleted except by explicit wallet reset.

use crate::types::{EntryId, LedgerEntry, Rail, SortKey, StatusClass};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory entry store with an ordered display index
#[derive(Debug, Default)]
pub struct LedgerStore {
    /// Entries keyed by id
    entries: DashMap<EntryId, LedgerEntry>,

    /// Display order: sort key -> entry id
    order: RwLock<BTreeMap<SortKey, EntryId>>,
}

impl LedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether an entry exists
    pub fn contains(&self, id: &EntryId) -> bool {
        self.entries.contains_key(id)
    }

    /// Get an entry by id
    pub fn get(&self, id: &EntryId) -> Option<LedgerEntry> {
        self.entries.get(id).map(|e| e.clone())
    }

    /// Insert a new entry
    ///
    /// The caller (engine) guarantees the id is unseen.
    pub fn insert(&self, entry: LedgerEntry) {
        let key = entry.sort_key();
        let id = entry.id;
        self.entries.insert(id, entry);
        self.order.write().insert(key, id);
    }

    /// Replace an existing entry, reindexing if its sort key moved
    /// (e.g. a chain timestamp became known or was cleared by a reorg)
    pub fn update(&self, entry: LedgerEntry) {
        let id = entry.id;
        let new_key = entry.sort_key();

        let old_key = self.entries.get(&id).map(|e| e.sort_key());
        self.entries.insert(id, entry);

        if old_key != Some(new_key) {
            let mut order = self.order.write();
            if let Some(old) = old_key {
                order.remove(&old);
            }
            order.insert(new_key, id);
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Visit every entry (unordered); used by full balance recomputation
    pub fn for_each(&self, mut f: impl FnMut(&LedgerEntry)) {
        for entry in self.entries.iter() {
            f(&entry);
        }
    }

    /// Collect entries matching a predicate (unordered)
    pub fn collect_matching(&self, mut pred: impl FnMut(&LedgerEntry) -> bool) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| pred(e))
            .map(|e| e.clone())
            .collect()
    }

    /// Newest-first page of entries matching `pred`, starting strictly
    /// after `cursor` (exclusive), up to `limit`
    pub fn page_desc(
        &self,
        cursor: Option<&SortKey>,
        limit: usize,
        mut pred: impl FnMut(&LedgerEntry) -> bool,
    ) -> Vec<LedgerEntry> {
        use std::ops::Bound;

        let order = self.order.read();
        let range: Box<dyn Iterator<Item = (&SortKey, &EntryId)> + '_> = match cursor {
            Some(key) => Box::new(
                order
                    .range((Bound::Unbounded, Bound::Excluded(*key)))
                    .rev(),
            ),
            None => Box::new(order.iter().rev()),
        };

        let mut page = Vec::new();
        for (_, id) in range {
            if page.len() >= limit {
                break;
            }
            // Index and map are updated by a single writer; a missing entry
            // here would mean a reindex bug, so skip rather than panic.
            if let Some(entry) = self.entries.get(id) {
                if pred(&entry) {
                    page.push(entry.clone());
                }
            }
        }
        page
    }

    /// Aggregate counts for operator visibility
    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::default();
        self.for_each(|entry| {
            stats.total_entries += 1;
            match entry.rail() {
                Rail::OnChain => stats.on_chain += 1,
                Rail::Lightning => stats.lightning += 1,
            }
            match entry.status.class() {
                StatusClass::Unsettled => stats.unsettled += 1,
                StatusClass::Settled => stats.settled += 1,
                StatusClass::Failed => stats.failed += 1,
            }
        });
        stats
    }

    /// Wallet reset: drop every entry and the index
    ///
    /// The one sanctioned deletion path.
    pub fn reset(&self) {
        self.entries.clear();
        self.order.write().clear();
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Total entries
    pub total_entries: usize,
    /// On-chain entries
    pub on_chain: usize,
    /// Lightning entries
    pub lightning: usize,
    /// Pending or confirmed below threshold
    pub unsettled: usize,
    /// Settled entries
    pub settled: usize,
    /// Failed entries
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, EntryStatus, RailDetail, Txid};
    use chrono::{TimeZone, Utc};

    fn entry(n: u8, ts_secs: i64) -> LedgerEntry {
        let txid = Txid::from_bytes([n; 32]);
        LedgerEntry {
            id: EntryId::on_chain(&txid, 0),
            direction: Direction::Incoming,
            amount_sats: 1_000,
            counterparty_label: None,
            created_at: Utc.timestamp_opt(ts_secs, 0).unwrap(),
            chain_timestamp: None,
            status: EntryStatus::Pending,
            detail: RailDetail::OnChain {
                txid,
                vout: 0,
                confirmations: 0,
                block_ref: None,
            },
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = LedgerStore::new();
        let e = entry(1, 100);
        let id = e.id;

        store.insert(e.clone());
        assert!(store.contains(&id));
        assert_eq!(store.get(&id).unwrap(), e);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_page_desc_newest_first() {
        let store = LedgerStore::new();
        store.insert(entry(1, 100));
        store.insert(entry(2, 300));
        store.insert(entry(3, 200));

        let page = store.page_desc(None, 10, |_| true);
        let times: Vec<i64> = page.iter().map(|e| e.created_at.timestamp()).collect();
        assert_eq!(times, vec![300, 200, 100]);
    }

    #[test]
    fn test_page_desc_cursor_restartable() {
        let store = LedgerStore::new();
        for n in 1..=5 {
            store.insert(entry(n, n as i64 * 100));
        }

        let first = store.page_desc(None, 2, |_| true);
        assert_eq!(first.len(), 2);

        let cursor = first.last().unwrap().sort_key();
        let second = store.page_desc(Some(&cursor), 2, |_| true);
        assert_eq!(second.len(), 2);

        // No overlap between pages
        let first_ids: Vec<_> = first.iter().map(|e| e.id).collect();
        assert!(second.iter().all(|e| !first_ids.contains(&e.id)));

        let cursor = second.last().unwrap().sort_key();
        let third = store.page_desc(Some(&cursor), 2, |_| true);
        assert_eq!(third.len(), 1);
    }

    #[test]
    fn test_update_reindexes_on_timestamp_change() {
        let store = LedgerStore::new();
        let mut e = entry(1, 500);
        store.insert(e.clone());
        store.insert(entry(2, 300));

        // Entry 1 sorts newest while only the local timestamp is known
        let page = store.page_desc(None, 10, |_| true);
        assert_eq!(page[0].id, e.id);

        // Block time places it before entry 2
        e.chain_timestamp = Some(Utc.timestamp_opt(100, 0).unwrap());
        e.status = EntryStatus::Confirmed(1);
        store.update(e.clone());

        let page = store.page_desc(None, 10, |_| true);
        assert_eq!(page[1].id, e.id);
        assert_eq!(page.len(), 2, "reindex must not duplicate the entry");
        assert_eq!(store.get(&e.id).unwrap().status, EntryStatus::Confirmed(1));
    }

    #[test]
    fn test_stats_and_reset() {
        let store = LedgerStore::new();
        let mut settled = entry(1, 100);
        settled.status = EntryStatus::Settled;
        store.insert(settled);
        store.insert(entry(2, 200));

        let stats = store.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.on_chain, 2);
        assert_eq!(stats.settled, 1);
        assert_eq!(stats.unsettled, 1);

        store.reset();
        assert!(store.is_empty());
        assert!(store.page_desc(None, 10, |_| true).is_empty());
    }
}
