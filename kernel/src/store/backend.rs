// Store Session Abstraction
//
// Interface of the target key-value store as seen by the replication
// core. The wire client, connection pooling and deadlines live behind
// these traits.

use super::{Cas, IndexName, IndexQuery, IndexRows, StoreError, Versioned};
use crate::config::Endpoint;
use crate::document::Document;

/// An established session against one namespace of the target store.
///
/// Properties required from implementations:
/// - Every successful mutation yields a fresh `Cas`
/// - `replace` fails with `CasMismatch` when the token is stale
/// - `create` fails with `KeyExists` rather than overwriting
/// - The timestamp index is maintained by the store itself
///
/// Sessions are shared by all callers, so every method takes `&self`.
pub trait DocumentStore: Send + Sync {
    /// Read a document and its current version token.
    fn get(&self, key: &str) -> Result<Versioned, StoreError>;

    /// Create a document. Fails with `KeyExists` if the key is present.
    fn create(&self, key: &str, document: &Document) -> Result<Cas, StoreError>;

    /// Replace a document only if its token still equals `cas`.
    fn replace(&self, key: &str, document: &Document, cas: Cas) -> Result<Cas, StoreError>;

    /// Delete a document. Fails with `NotFound` if the key is absent.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Scan the timestamp-ordered secondary index.
    fn scan_index(&self, index: &IndexName, query: &IndexQuery) -> Result<IndexRows<'_>, StoreError>;

    /// Durability barrier. Auto-committing stores keep the default.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Release the session. Later calls fail with `Closed`.
    fn close(&self) -> Result<(), StoreError>;
}

/// Opens store sessions. Called once per adapter instance.
pub trait StoreConnector {
    type Store: DocumentStore;

    fn connect(&self, endpoint: &Endpoint) -> Result<Self::Store, StoreError>;
}
