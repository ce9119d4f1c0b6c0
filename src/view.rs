//! Read API over the ledger
//!
//! Produces ordered, filterable, cursor-paginated transaction feeds and a
//! change-notification stream for the presentation layer. Pure projection:
//! nothing here alters entry identity or status.

use crate::store::LedgerStore;
use crate::types::{Direction, EntryId, EntryStatus, LedgerEntry, Rail, SortKey, StatusClass};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Change notification emitted after every committed mutation, in the same
/// relative order as the mutations that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerChange {
    /// A new entry appeared
    Added {
        /// Entry id
        id: EntryId,
    },
    /// An existing entry changed status
    StatusChanged {
        /// Entry id
        id: EntryId,
        /// Status before
        old: EntryStatus,
        /// Status after
        new: EntryStatus,
    },
    /// The wallet was reset; all entries are gone
    Reset,
}

/// Feed filter; `None` fields match everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    /// Restrict to one rail
    pub rail: Option<Rail>,
    /// Restrict to one direction
    pub direction: Option<Direction>,
    /// Restrict to one status class
    pub status: Option<StatusClass>,
}

impl EntryFilter {
    /// Check whether an entry passes the filter
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.rail.map_or(true, |r| entry.rail() == r)
            && self.direction.map_or(true, |d| entry.direction == d)
            && self.status.map_or(true, |s| entry.status.class() == s)
    }
}

/// Opaque pagination cursor; feed the `next` cursor of one page into the
/// following request to continue where it left off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(SortKey);

/// Pagination request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Resume point from a previous page, if any
    pub cursor: Option<Cursor>,
    /// Maximum entries to return (clamped to the configured cap;
    /// 0 means the cap)
    pub limit: usize,
}

/// One page of the feed, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Entries in display order
    pub entries: Vec<LedgerEntry>,
    /// Cursor for the next page; `None` once the feed is exhausted
    pub next: Option<Cursor>,
}

/// Read-side facade over the store plus the notification channel
#[derive(Debug, Clone)]
pub struct LedgerView {
    store: Arc<LedgerStore>,
    notifier: broadcast::Sender<LedgerChange>,
    max_page_size: usize,
}

impl LedgerView {
    /// Create a view
    pub fn new(
        store: Arc<LedgerStore>,
        notifier: broadcast::Sender<LedgerChange>,
        max_page_size: usize,
    ) -> Self {
        Self {
            store,
            notifier,
            max_page_size,
        }
    }

    /// Ordered, filtered page of the feed (newest first)
    ///
    /// Finite and restartable: each page carries the cursor the next call
    /// resumes from, and the final page carries `None`.
    pub fn list(&self, filter: EntryFilter, pagination: Pagination) -> Page {
        let limit = if pagination.limit == 0 {
            self.max_page_size
        } else {
            pagination.limit.min(self.max_page_size)
        };

        let cursor_key = pagination.cursor.map(|c| c.0);
        let entries = self
            .store
            .page_desc(cursor_key.as_ref(), limit, |entry| filter.matches(entry));

        // A full page may have more behind it; a short page is the end.
        let next = if entries.len() == limit {
            entries.last().map(|e| Cursor(e.sort_key()))
        } else {
            None
        };

        Page { entries, next }
    }

    /// Single entry lookup
    pub fn get(&self, id: &EntryId) -> Option<LedgerEntry> {
        self.store.get(id)
    }

    /// Stream of change notifications from this point on
    ///
    /// Subscribers that fall behind the configured buffer observe a lagged
    /// item from the underlying broadcast channel rather than blocking the
    /// writer.
    pub fn subscribe(&self) -> BroadcastStream<LedgerChange> {
        BroadcastStream::new(self.notifier.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryId, RailDetail, Txid};
    use chrono::{TimeZone, Utc};

    fn entry(n: u8, ts_secs: i64, direction: Direction, status: EntryStatus) -> LedgerEntry {
        let txid = Txid::from_bytes([n; 32]);
        LedgerEntry {
            id: EntryId::on_chain(&txid, 0),
            direction,
            amount_sats: 1_000,
            counterparty_label: None,
            created_at: Utc.timestamp_opt(ts_secs, 0).unwrap(),
            chain_timestamp: None,
            status,
            detail: RailDetail::OnChain {
                txid,
                vout: 0,
                confirmations: 0,
                block_ref: None,
            },
        }
    }

    fn view_with_entries(entries: Vec<LedgerEntry>) -> LedgerView {
        let store = Arc::new(LedgerStore::new());
        for e in entries {
            store.insert(e);
        }
        let (notifier, _) = broadcast::channel(16);
        LedgerView::new(store, notifier, 100)
    }

    #[test]
    fn test_list_ordered_newest_first() {
        let view = view_with_entries(vec![
            entry(1, 100, Direction::Incoming, EntryStatus::Pending),
            entry(2, 300, Direction::Incoming, EntryStatus::Pending),
            entry(3, 200, Direction::Incoming, EntryStatus::Pending),
        ]);

        let page = view.list(EntryFilter::default(), Pagination::default());
        let times: Vec<i64> = page.entries.iter().map(|e| e.created_at.timestamp()).collect();
        assert_eq!(times, vec![300, 200, 100]);
        assert!(page.next.is_none());
    }

    #[test]
    fn test_pagination_walks_whole_feed() {
        let entries: Vec<_> = (1..=7)
            .map(|n| entry(n, n as i64 * 10, Direction::Incoming, EntryStatus::Pending))
            .collect();
        let view = view_with_entries(entries);

        let mut seen = Vec::new();
        let mut pagination = Pagination {
            cursor: None,
            limit: 3,
        };
        loop {
            let page = view.list(EntryFilter::default(), pagination);
            seen.extend(page.entries.iter().map(|e| e.id));
            match page.next {
                Some(cursor) => pagination.cursor = Some(cursor),
                None => break,
            }
        }

        assert_eq!(seen.len(), 7);
        let mut deduped = seen.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), 7, "pages must not overlap");
    }

    #[test]
    fn test_filters() {
        let view = view_with_entries(vec![
            entry(1, 100, Direction::Incoming, EntryStatus::Settled),
            entry(2, 200, Direction::Outgoing, EntryStatus::Pending),
            entry(3, 300, Direction::Incoming, EntryStatus::Failed),
        ]);

        let incoming = view.list(
            EntryFilter {
                direction: Some(Direction::Incoming),
                ..Default::default()
            },
            Pagination::default(),
        );
        assert_eq!(incoming.entries.len(), 2);

        let settled = view.list(
            EntryFilter {
                status: Some(StatusClass::Settled),
                ..Default::default()
            },
            Pagination::default(),
        );
        assert_eq!(settled.entries.len(), 1);

        let lightning = view.list(
            EntryFilter {
                rail: Some(Rail::Lightning),
                ..Default::default()
            },
            Pagination::default(),
        );
        assert!(lightning.entries.is_empty());
    }

    #[test]
    fn test_limit_clamped() {
        let entries: Vec<_> = (1..=5)
            .map(|n| entry(n, n as i64, Direction::Incoming, EntryStatus::Pending))
            .collect();
        let store = Arc::new(LedgerStore::new());
        for e in entries {
            store.insert(e);
        }
        let (notifier, _) = broadcast::channel(16);
        let view = LedgerView::new(store, notifier, 2);

        let page = view.list(
            EntryFilter::default(),
            Pagination {
                cursor: None,
                limit: 50,
            },
        );
        assert_eq!(page.entries.len(), 2);
        assert!(page.next.is_some());
    }

    #[tokio::test]
    async fn test_subscribe_receives_in_order() {
        use tokio_stream::StreamExt;

        let store = Arc::new(LedgerStore::new());
        let (notifier, _) = broadcast::channel(16);
        let view = LedgerView::new(store, notifier.clone(), 100);

        let mut stream = view.subscribe();

        let id = EntryId::on_chain(&Txid::from_bytes([1; 32]), 0);
        notifier.send(LedgerChange::Added { id }).unwrap();
        notifier
            .send(LedgerChange::StatusChanged {
                id,
                old: EntryStatus::Pending,
                new: EntryStatus::Settled,
            })
            .unwrap();

        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            LedgerChange::Added { id }
        );
        assert!(matches!(
            stream.next().await.unwrap().unwrap(),
            LedgerChange::StatusChanged { .. }
        ));
    }
}
