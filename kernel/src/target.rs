// Replication Target Contract
//
// The capability set a change-log tailer needs from any target store.
// Each concrete store provides one implementation.

use crate::checkpoint::DocumentStream;
use crate::document::Document;
use crate::error::ReplicationError;
use crate::store::Timestamp;
use crate::update::UpdateSpec;

/// Trait implemented by every replication sink.
///
/// Implementations must be safe to call from several tailer threads at
/// once; every method blocks until its store round trips complete.
pub trait ReplicationTarget: Send + Sync {
    /// Create a document. Fails with `AlreadyExists` rather than
    /// overwriting.
    fn insert(&self, document: Document) -> Result<(), ReplicationError>;

    /// Apply a partial update (or full replacement) to the document
    /// addressed by `document`, returning the body that was written.
    fn update(&self, document: &Document, spec: &UpdateSpec) -> Result<Document, ReplicationError>;

    /// Delete the addressed document. Absent documents are not an error.
    fn remove(&self, document: &Document) -> Result<(), ReplicationError>;

    /// Documents modified in `start <= ts < end`, oldest first.
    fn range_query(&self, start: Timestamp, end: Timestamp) -> Result<DocumentStream<'_>, ReplicationError>;

    /// The most recently modified document, `None` on a cold start.
    fn latest(&self) -> Result<Option<Document>, ReplicationError>;

    /// Durability barrier.
    fn flush(&self) -> Result<(), ReplicationError>;

    /// Release the store session.
    fn shutdown(&self) -> Result<(), ReplicationError>;
}
