// In-Memory Document Store
//
// Process-local `DocumentStore` used for dry runs and tests. Emulates the
// parts of a remote key-value store the replication core depends on:
// per-mutation CAS tokens, create-only inserts and a timestamp view
// over one namespace, kept in step with every write.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::config::{ConnectorConfig, Endpoint};
use crate::document::{read_timestamp, Document, DEFAULT_TIMESTAMP_FIELD};
use crate::store::{
    Cas, DocumentStore, IndexName, IndexQuery, IndexRow, IndexRows, ScanOrder, StoreConnector,
    StoreError, Timestamp, Versioned,
};

#[derive(Debug)]
struct Entry {
    document: Document,
    cas: Cas,
    timestamp: Option<Timestamp>,
}

#[derive(Debug, Default)]
struct State {
    documents: HashMap<String, Entry>,
    by_timestamp: BTreeSet<(Timestamp, String)>,
    last_cas: u64,
}

impl State {
    fn put(&mut self, key: &str, document: &Document, timestamp_field: &str) -> Cas {
        self.last_cas += 1;
        let cas = Cas(self.last_cas);
        let timestamp = read_timestamp(document, timestamp_field);

        let previous = self.documents.insert(
            key.to_string(),
            Entry {
                document: document.clone(),
                cas,
                timestamp,
            },
        );
        if let Some(old) = previous.and_then(|entry| entry.timestamp) {
            self.by_timestamp.remove(&(old, key.to_string()));
        }
        if let Some(timestamp) = timestamp {
            self.by_timestamp.insert((timestamp, key.to_string()));
        }

        cas
    }

    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.documents.remove(key)?;
        if let Some(timestamp) = entry.timestamp {
            self.by_timestamp.remove(&(timestamp, key.to_string()));
        }
        Some(entry)
    }
}

/// One namespace of an in-process key-value store.
#[derive(Debug)]
pub struct MemoryStore {
    namespace: String,
    index: IndexName,
    timestamp_field: String,
    state: RwLock<State>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new(namespace: impl Into<String>, index: IndexName, timestamp_field: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            index,
            timestamp_field: timestamp_field.into(),
            state: RwLock::new(State::default()),
            closed: AtomicBool::new(false),
        }
    }

    /// Store with the default index name and timestamp field.
    pub fn with_defaults(namespace: impl Into<String>) -> Self {
        Self::new(namespace, IndexName::default(), DEFAULT_TIMESTAMP_FIELD)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn len(&self) -> usize {
        self.state.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Versioned, StoreError> {
        self.ensure_open()?;
        let state = self.state.read();
        state
            .documents
            .get(key)
            .map(|entry| Versioned {
                document: entry.document.clone(),
                cas: entry.cas,
            })
            .ok_or_else(|| StoreError::NotFound { key: key.to_string() })
    }

    fn create(&self, key: &str, document: &Document) -> Result<Cas, StoreError> {
        self.ensure_open()?;
        let mut state = self.state.write();
        if state.documents.contains_key(key) {
            return Err(StoreError::KeyExists { key: key.to_string() });
        }
        Ok(state.put(key, document, &self.timestamp_field))
    }

    fn replace(&self, key: &str, document: &Document, cas: Cas) -> Result<Cas, StoreError> {
        self.ensure_open()?;
        let mut state = self.state.write();
        let current = state.documents.get(key).map(|entry| entry.cas);
        match current {
            None => Err(StoreError::NotFound { key: key.to_string() }),
            Some(current) if current != cas => Err(StoreError::CasMismatch { key: key.to_string() }),
            Some(_) => Ok(state.put(key, document, &self.timestamp_field)),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.state
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { key: key.to_string() })
    }

    fn scan_index(&self, index: &IndexName, query: &IndexQuery) -> Result<IndexRows<'_>, StoreError> {
        self.ensure_open()?;
        if index != &self.index {
            return Err(StoreError::UnknownIndex {
                index: index.to_string(),
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        let state = self.state.read();
        let matching = state
            .by_timestamp
            .iter()
            .filter(|(timestamp, _)| query.contains(*timestamp))
            .map(|(timestamp, key)| IndexRow {
                timestamp: *timestamp,
                key: key.clone(),
            });

        // Rows are snapshotted so no lock is held while the caller iterates.
        let rows: Vec<IndexRow> = match query.order {
            ScanOrder::Ascending => matching.take(limit).collect(),
            ScanOrder::Descending => matching.rev().take(limit).collect(),
        };

        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Opens a fresh `MemoryStore` per connection.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    index: IndexName,
    timestamp_field: String,
}

impl MemoryConnector {
    pub fn new(config: &ConnectorConfig) -> Self {
        Self {
            index: config.index.clone(),
            timestamp_field: config.timestamp_field.clone(),
        }
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new(&ConnectorConfig::default())
    }
}

impl StoreConnector for MemoryConnector {
    type Store = MemoryStore;

    fn connect(&self, endpoint: &Endpoint) -> Result<MemoryStore, StoreError> {
        Ok(MemoryStore::new(
            endpoint.namespace.clone(),
            self.index.clone(),
            self.timestamp_field.clone(),
        ))
    }
}
