// Test stores that wrap `MemoryStore` to inject conflicts, interleavings
// and outages.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Barrier;

use super::{Cas, DocumentStore, IndexName, IndexQuery, IndexRows, StoreError, Versioned};
use crate::adapters::memory::MemoryStore;
use crate::document::Document;

/// Fails the first `conflicts` replace calls with `CasMismatch`.
pub(crate) struct ConflictingStore {
    pub inner: MemoryStore,
    conflicts: AtomicU32,
    pub replace_calls: AtomicU32,
}

impl ConflictingStore {
    pub fn new(inner: MemoryStore, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts: AtomicU32::new(conflicts),
            replace_calls: AtomicU32::new(0),
        }
    }
}

impl DocumentStore for ConflictingStore {
    fn get(&self, key: &str) -> Result<Versioned, StoreError> {
        self.inner.get(key)
    }

    fn create(&self, key: &str, document: &Document) -> Result<Cas, StoreError> {
        self.inner.create(key, document)
    }

    fn replace(&self, key: &str, document: &Document, cas: Cas) -> Result<Cas, StoreError> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::CasMismatch { key: key.to_string() });
        }
        self.inner.replace(key, document, cas)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key)
    }

    fn scan_index(&self, index: &IndexName, query: &IndexQuery) -> Result<IndexRows<'_>, StoreError> {
        self.inner.scan_index(index, query)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.close()
    }
}

/// Holds the first `gated` reads at a barrier so concurrent callers all
/// observe the same version token.
pub(crate) struct GatedStore {
    pub inner: MemoryStore,
    gated: usize,
    reads: AtomicUsize,
    barrier: Barrier,
}

impl GatedStore {
    pub fn new(inner: MemoryStore, gated: usize) -> Self {
        Self {
            inner,
            gated,
            reads: AtomicUsize::new(0),
            barrier: Barrier::new(gated),
        }
    }
}

impl DocumentStore for GatedStore {
    fn get(&self, key: &str) -> Result<Versioned, StoreError> {
        let read = self.inner.get(key);
        if self.reads.fetch_add(1, Ordering::SeqCst) < self.gated {
            self.barrier.wait();
        }
        read
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
        self.inner.scan_index(index, query)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.close()
    }
}

/// Every call fails as if the connection dropped.
pub(crate) struct OfflineStore;

fn offline() -> StoreError {
    StoreError::Unavailable {
        reason: "connection refused".into(),
    }
}

impl DocumentStore for OfflineStore {
    fn get(&self, _key: &str) -> Result<Versioned, StoreError> {
        Err(offline())
    }

    fn create(&self, _key: &str, _document: &Document) -> Result<Cas, StoreError> {
        Err(offline())
    }

    fn replace(&self, _key: &str, _document: &Document, _cas: Cas) -> Result<Cas, StoreError> {
        Err(offline())
    }

    fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(offline())
    }

    fn scan_index(&self, _index: &IndexName, _query: &IndexQuery) -> Result<IndexRows<'_>, StoreError> {
        Err(offline())
    }

    fn flush(&self) -> Result<(), StoreError> {
        Err(offline())
    }

    fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
