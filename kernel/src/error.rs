// Replication Errors
//
// The failure taxonomy surfaced to the change-log tailer. Store-level
// failures are folded into it here so every layer above the store can
// use `?`.

use crate::config::ConfigError;
use crate::document::{CodecError, Document};
use crate::store::StoreError;
use crate::update::ResolveError;

#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("document '{key}' already exists")]
    AlreadyExists { key: String },

    #[error("update of '{key}' gave up after {attempts} CAS conflicts")]
    ConflictExceeded {
        key: String,
        attempts: u32,
        /// Body seen by the last conflicting attempt.
        last_seen: Option<Box<Document>>,
    },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] CodecError),

    #[error("document '{key}' does not exist")]
    DocumentMissing { key: String },

    #[error("update does not apply: {0}")]
    UpdateDoesNotApply(#[source] ResolveError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<StoreError> for ReplicationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::KeyExists { key } => ReplicationError::AlreadyExists { key },
            StoreError::NotFound { key } => ReplicationError::DocumentMissing { key },
            other => ReplicationError::StoreUnavailable(other),
        }
    }
}

impl From<ResolveError> for ReplicationError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Identifier(codec) => ReplicationError::InvalidIdentifier(codec),
            other => ReplicationError::UpdateDoesNotApply(other),
        }
    }
}
