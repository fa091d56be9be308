// Checkpoint Query Engine
//
// "What changed since T" and "what changed last" over the store's
// timestamp index. Rows are resolved to full document bodies as the
// caller pulls them; the index may lag writes, so a row whose document
// has since been removed, or whose body has moved past the range, is
// skipped.

use crate::document::{read_timestamp, Document};
use crate::error::ReplicationError;
use crate::store::{DocumentStore, IndexName, IndexQuery, IndexRow, StoreError, Timestamp};

/// Lazy, finite, single-pass stream of document bodies.
pub type DocumentStream<'a> = Box<dyn Iterator<Item = Result<Document, ReplicationError>> + Send + 'a>;

/// Factor by which `latest` widens its newest-first page when every row
/// it saw was stale.
const LATEST_PAGE_GROWTH: usize = 8;

pub struct CheckpointQuery<'a, S: ?Sized> {
    store: &'a S,
    index: &'a IndexName,
    timestamp_field: &'a str,
}

impl<'a, S: DocumentStore + ?Sized> CheckpointQuery<'a, S> {
    pub fn new(store: &'a S, index: &'a IndexName, timestamp_field: &'a str) -> Self {
        Self {
            store,
            index,
            timestamp_field,
        }
    }

    /// Documents whose index timestamp lies in `start <= ts < end`, oldest
    /// first. Adjacent ranges `[t0, t1)` and `[t1, t2)` never overlap.
    ///
    /// A document updated past `end` while the stream is being read is left
    /// to the range that covers its new timestamp.
    pub fn range(&self, start: Timestamp, end: Timestamp) -> Result<DocumentStream<'a>, ReplicationError> {
        if start >= end {
            return Ok(Box::new(std::iter::empty()));
        }

        let store = self.store;
        let field = self.timestamp_field;
        let query = IndexQuery::range(start, end);
        let rows = store
            .scan_index(self.index, &query)
            .map_err(ReplicationError::StoreUnavailable)?;

        Ok(Box::new(rows.filter_map(move |row| match row {
            // The bound is re-checked in case a store treats `end` inclusively.
            Ok(row) if !query.contains(row.timestamp) => None,
            Ok(row) => fetch_body(store, &row)
                .map(|body| body.filter(|body| !moved_past(body, field, end)))
                .transpose(),
            Err(err) => Some(Err(ReplicationError::StoreUnavailable(err))),
        })))
    }

    /// The most recently modified document, or `None` on an empty
    /// namespace.
    ///
    /// Asks the index for its newest row only. When that row is stale the
    /// page is widened and re-read until a live body turns up or the index
    /// runs out of rows.
    pub fn latest(&self) -> Result<Option<Document>, ReplicationError> {
        let mut limit = 1;
        loop {
            let query = IndexQuery::newest_first().with_limit(limit);
            let rows = self
                .store
                .scan_index(self.index, &query)
                .map_err(ReplicationError::StoreUnavailable)?;

            let mut seen = 0;
            for row in rows.take(limit) {
                let row = row.map_err(ReplicationError::StoreUnavailable)?;
                seen += 1;
                if let Some(document) = fetch_body(self.store, &row)? {
                    return Ok(Some(document));
                }
            }

            if seen < limit {
                return Ok(None);
            }
            limit = limit.saturating_mul(LATEST_PAGE_GROWTH);
        }
    }
}

fn fetch_body<S: DocumentStore + ?Sized>(store: &S, row: &IndexRow) -> Result<Option<Document>, ReplicationError> {
    match store.get(&row.key) {
        Ok(versioned) => Ok(Some(versioned.document)),
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(other) => Err(ReplicationError::StoreUnavailable(other)),
    }
}

fn moved_past(body: &Document, field: &str, end: Timestamp) -> bool {
    matches!(read_timestamp(body, field), Some(ts) if ts >= end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::store::testing::OfflineStore;
    use crate::store::{Cas, IndexRows, ScanOrder, Versioned};
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::with_defaults("default");
        for (id, ts) in [("a", 10), ("b", 20), ("c", 30), ("d", 40)] {
            store.create(id, &doc(json!({"_id": id, "_ts": ts}))).unwrap();
        }
        store
    }

    fn ids(stream: DocumentStream<'_>) -> Vec<String> {
        stream
            .map(|d| d.unwrap()["_id"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn range_excludes_upper_bound() {
        let store = seeded();
        let index = IndexName::default();
        let query = CheckpointQuery::new(&store, &index, "_ts");

        assert_eq!(ids(query.range(Timestamp(10), Timestamp(30)).unwrap()), ["a", "b"]);
        assert_eq!(ids(query.range(Timestamp(11), Timestamp(41)).unwrap()), ["b", "c", "d"]);
    }

    #[test]
    fn adjacent_ranges_partition_changes() {
        let store = seeded();
        let index = IndexName::default();
        let query = CheckpointQuery::new(&store, &index, "_ts");

        let mut joined = ids(query.range(Timestamp(0), Timestamp(20)).unwrap());
        joined.extend(ids(query.range(Timestamp(20), Timestamp(100)).unwrap()));

        assert_eq!(joined, ["a", "b", "c", "d"]);
    }

    #[test]
    fn empty_and_inverted_ranges_yield_nothing() {
        let store = seeded();
        let index = IndexName::default();
        let query = CheckpointQuery::new(&store, &index, "_ts");

        assert!(ids(query.range(Timestamp(50), Timestamp(60)).unwrap()).is_empty());
        assert!(ids(query.range(Timestamp(30), Timestamp(30)).unwrap()).is_empty());
        assert!(ids(query.range(Timestamp(40), Timestamp(10)).unwrap()).is_empty());
    }

    #[test]
    fn range_yields_bodies_at_read_time() {
        let store = seeded();
        let index = IndexName::default();
        let query = CheckpointQuery::new(&store, &index, "_ts");

        let mut stream = query.range(Timestamp(0), Timestamp(100)).unwrap();
        let first = stream.next().unwrap().unwrap();
        assert_eq!(first["_id"], json!("a"));

        // Removed after the scan started: its stale row is skipped.
        store.delete("b").unwrap();
        let rest: Vec<_> = stream.map(|d| d.unwrap()["_id"].clone()).collect();
        assert_eq!(rest, [json!("c"), json!("d")]);
    }

    #[test]
    fn latest_on_empty_namespace_is_none() {
        let store = MemoryStore::with_defaults("default");
        let index = IndexName::default();
        assert_eq!(CheckpointQuery::new(&store, &index, "_ts").latest().unwrap(), None);
    }

    #[test]
    fn latest_returns_newest_document() {
        let store = seeded();
        let index = IndexName::default();
        let latest = CheckpointQuery::new(&store, &index, "_ts").latest().unwrap().unwrap();
        assert_eq!(latest["_id"], json!("d"));
    }

    /// Index that still lists removed documents and records the limit of
    /// every scan it serves.
    struct LaggingIndex {
        inner: MemoryStore,
        stale: Vec<IndexRow>,
        limits: Mutex<Vec<Option<usize>>>,
    }

    impl LaggingIndex {
        fn new(inner: MemoryStore, stale: &[(&str, u64)]) -> Self {
            let stale = stale
                .iter()
                .map(|(key, ts)| IndexRow {
                    timestamp: Timestamp(*ts),
                    key: key.to_string(),
                })
                .collect();
            Self {
                inner,
                stale,
                limits: Mutex::new(Vec::new()),
            }
        }

        fn limits(&self) -> Vec<Option<usize>> {
            self.limits.lock().clone()
        }
    }

    impl DocumentStore for LaggingIndex {
        fn get(&self, key: &str) -> Result<Versioned, StoreError> {
            self.inner.get(key)
        }
        fn create(&self, key: &str, document: &Document) -> Result<Cas, StoreError> {
            self.inner.create(key, document)
        }
        fn replace(&self, key: &str, document: &Document, cas: Cas) -> Result<Cas, StoreError> {
            self.inner.replace(key, document, cas)
        }
        fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.inner.delete(key)
        }
        fn scan_index(&self, index: &IndexName, query: &IndexQuery) -> Result<IndexRows<'_>, StoreError> {
            self.limits.lock().push(query.limit);

            // Stale rows sit past every live timestamp and ignore the bounds.
            let live: Vec<IndexRow> = self.inner.scan_index(index, query)?.collect::<Result<_, _>>()?;
            let rows: Vec<IndexRow> = match query.order {
                ScanOrder::Descending => self.stale.iter().cloned().chain(live).collect(),
                ScanOrder::Ascending => live.into_iter().chain(self.stale.iter().cloned()).collect(),
            };
            let limit = query.limit.unwrap_or(usize::MAX);
            Ok(Box::new(rows.into_iter().take(limit).map(Ok)))
        }
        fn close(&self) -> Result<(), StoreError> {
            self.inner.close()
        }
    }

    #[test]
    fn latest_asks_the_index_for_one_row() {
        let store = LaggingIndex::new(seeded(), &[]);
        let index = IndexName::default();
        let latest = CheckpointQuery::new(&store, &index, "_ts").latest().unwrap().unwrap();

        assert_eq!(latest["_id"], json!("d"));
        assert_eq!(store.limits(), [Some(1)]);
    }

    #[test]
    fn latest_skips_stale_index_rows() {
        let store = LaggingIndex::new(seeded(), &[("gone", 99)]);
        let index = IndexName::default();
        let latest = CheckpointQuery::new(&store, &index, "_ts").latest().unwrap().unwrap();

        assert_eq!(latest["_id"], json!("d"));
        assert_eq!(store.limits(), [Some(1), Some(LATEST_PAGE_GROWTH)]);
    }

    #[test]
    fn latest_widens_until_the_index_runs_out() {
        let stale: Vec<(String, u64)> = (0..10).map(|i| (format!("gone-{i}"), 100 - i)).collect();
        let stale: Vec<(&str, u64)> = stale.iter().map(|(key, ts)| (key.as_str(), *ts)).collect();
        let store = LaggingIndex::new(MemoryStore::with_defaults("default"), &stale);
        let index = IndexName::default();

        assert_eq!(CheckpointQuery::new(&store, &index, "_ts").latest().unwrap(), None);
        assert_eq!(store.limits(), [Some(1), Some(8), Some(64)]);
    }

    #[test]
    fn range_filters_rows_outside_bounds() {
        let store = LaggingIndex::new(seeded(), &[("gone", 99)]);
        let index = IndexName::default();
        let query = CheckpointQuery::new(&store, &index, "_ts");
        assert_eq!(ids(query.range(Timestamp(0), Timestamp(99)).unwrap()), ["a", "b", "c", "d"]);
    }

    #[test]
    fn range_leaves_documents_moved_past_end_to_a_later_range() {
        let store = seeded();
        let index = IndexName::default();
        let query = CheckpointQuery::new(&store, &index, "_ts");

        let mut stream = query.range(Timestamp(0), Timestamp(50)).unwrap();
        assert_eq!(stream.next().unwrap().unwrap()["_id"], json!("a"));

        // Updated after the scan started: now belongs to [50, ..).
        let current = store.get("c").unwrap();
        store
            .replace("c", &doc(json!({"_id": "c", "_ts": 60})), current.cas)
            .unwrap();

        assert_eq!(ids(stream), ["b", "d"]);
        assert_eq!(ids(query.range(Timestamp(50), Timestamp(100)).unwrap()), ["c"]);
    }

    #[test]
    fn outage_surfaces_as_store_unavailable() {
        let index = IndexName::default();
        let query = CheckpointQuery::new(&OfflineStore, &index, "_ts");

        assert!(matches!(query.latest(), Err(ReplicationError::StoreUnavailable(_))));
        assert!(matches!(
            query.range(Timestamp(0), Timestamp(1)),
            Err(ReplicationError::StoreUnavailable(_))
        ));
    }
}
