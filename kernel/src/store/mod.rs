// Target Store Model
//
// Vocabulary shared between the write engine, the checkpoint queries and
// concrete store implementations: version tokens, the timestamp index and
// the store's failure modes.

use serde::{Deserialize, Serialize};

use crate::document::Document;

mod backend;
#[cfg(test)]
pub(crate) mod testing;

pub use backend::{DocumentStore, StoreConnector};

/// Opaque version token returned on every read and required on every
/// conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cas(pub u64);

/// Modification timestamp as recorded by the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

/// A document body together with the token of the read that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub document: Document,
    pub cas: Cas,
}

/// Name of the timestamp-ordered secondary index inside a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexName {
    pub design_document: String,
    pub view: String,
}

impl Default for IndexName {
    fn default() -> Self {
        Self {
            design_document: "mongo_connect".into(),
            view: "by_timestamp".into(),
        }
    }
}

impl std::fmt::Display for IndexName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.design_document, self.view)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    Ascending,
    Descending,
}

/// Query over the timestamp index. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQuery {
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
    pub order: ScanOrder,
    pub limit: Option<usize>,
}

impl IndexQuery {
    /// Ascending scan over `start <= ts < end`.
    pub fn range(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            order: ScanOrder::Ascending,
            limit: None,
        }
    }

    /// Descending scan over the whole index.
    pub fn newest_first() -> Self {
        Self {
            start: None,
            end: None,
            order: ScanOrder::Descending,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.start.map_or(true, |start| timestamp >= start)
            && self.end.map_or(true, |end| timestamp < end)
    }
}

/// A single entry of the timestamp index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub timestamp: Timestamp,
    pub key: String,
}

/// Lazy, finite stream of index rows.
pub type IndexRows<'a> = Box<dyn Iterator<Item = Result<IndexRow, StoreError>> + Send + 'a>;

/// Failures reported by a store session.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("key '{key}' already exists")]
    KeyExists { key: String },

    #[error("key '{key}' not found")]
    NotFound { key: String },

    #[error("CAS mismatch on key '{key}'")]
    CasMismatch { key: String },

    #[error("index {index} is not defined")]
    UnknownIndex { index: String },

    #[error("connection failed: {reason}")]
    Unavailable { reason: String },

    #[error("store session is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_query_is_half_open() {
        let query = IndexQuery::range(Timestamp(10), Timestamp(20));

        assert!(query.contains(Timestamp(10)));
        assert!(query.contains(Timestamp(19)));
        assert!(!query.contains(Timestamp(20)));
        assert!(!query.contains(Timestamp(9)));
    }

    #[test]
    fn unbounded_query_contains_everything() {
        let query = IndexQuery::newest_first().with_limit(1);
        assert!(query.contains(Timestamp(0)));
        assert!(query.contains(Timestamp(u64::MAX)));
        assert_eq!(query.limit, Some(1));
    }

    #[test]
    fn index_name_display() {
        assert_eq!(IndexName::default().to_string(), "mongo_connect/by_timestamp");
    }
}
