// Change Events
//
// Document-level mutations as emitted by the change-log tailer, and their
// dispatch onto a replication target.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ReplicationError;
use crate::target::ReplicationTarget;
use crate::update::UpdateSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ChangeEvent {
    #[serde(alias = "i")]
    Insert { doc: Document },

    #[serde(alias = "u")]
    Update { doc: Document, spec: UpdateSpec },

    #[serde(alias = "d")]
    Remove { doc: Document },
}

/// What applying an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Inserted,
    Updated(Document),
    Removed,
}

impl ChangeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Insert { .. } => "insert",
            ChangeEvent::Update { .. } => "update",
            ChangeEvent::Remove { .. } => "remove",
        }
    }

    /// Apply this event to `target`.
    pub fn apply<T: ReplicationTarget + ?Sized>(self, target: &T) -> Result<Applied, ReplicationError> {
        match self {
            ChangeEvent::Insert { doc } => target.insert(doc).map(|()| Applied::Inserted),
            ChangeEvent::Update { doc, spec } => target.update(&doc, &spec).map(Applied::Updated),
            ChangeEvent::Remove { doc } => target.remove(&doc).map(|()| Applied::Removed),
        }
    }
}
