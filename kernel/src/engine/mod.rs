// Optimistic Write Engine
//
// Applies inserts, resolved updates and deletes against a store session.
// An update runs READ -> RESOLVE -> CAS_WRITE and goes back to READ when
// the version token no longer matches, for at most `max_attempts` rounds.
// Concurrent writers to one document serialize through the token only.

use serde_json::Value;

use crate::document::{canonicalize, document_key, Document};
use crate::error::ReplicationError;
use crate::store::{DocumentStore, StoreError};
use crate::update::{resolve, UpdateSpec};

/// Result of a successful update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// The body that was written.
    pub document: Document,
    /// CAS rounds used, including the successful one.
    pub attempts: u32,
}

impl UpdateOutcome {
    pub fn conflicts(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Deleted,
    AlreadyAbsent,
}

pub struct WriteEngine<'a, S: ?Sized> {
    store: &'a S,
    id_field: &'a str,
    timestamp_field: &'a str,
    max_attempts: u32,
}

impl<'a, S: DocumentStore + ?Sized> WriteEngine<'a, S> {
    pub fn new(store: &'a S, id_field: &'a str, timestamp_field: &'a str, max_attempts: u32) -> Self {
        Self {
            store,
            id_field,
            timestamp_field,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Create the document under its canonical key. Never overwrites.
    pub fn insert(&self, mut document: Document) -> Result<String, ReplicationError> {
        let key = canonicalize(&mut document, self.id_field)?;
        self.store.create(&key, &document)?;
        Ok(key)
    }

    /// Apply `spec` to the document addressed by `reference`.
    ///
    /// If `reference` carries a modification timestamp, the written body
    /// is stamped with it so the checkpoint index observes the change.
    pub fn update(&self, reference: &Document, spec: &UpdateSpec) -> Result<UpdateOutcome, ReplicationError> {
        let key = document_key(reference, self.id_field)?;
        let stamp = reference.get(self.timestamp_field);
        let mut last_seen = None;

        for attempt in 1..=self.max_attempts {
            let current = self.store.get(&key)?;

            let mut updated = resolve(&current.document, spec, self.id_field)?;
            updated.insert(self.id_field.to_string(), Value::String(key.clone()));
            if let Some(stamp) = stamp {
                updated.insert(self.timestamp_field.to_string(), stamp.clone());
            }

            match self.store.replace(&key, &updated, current.cas) {
                Ok(_) => {
                    return Ok(UpdateOutcome {
                        document: updated,
                        attempts: attempt,
                    })
                }
                Err(StoreError::CasMismatch { .. }) => last_seen = Some(current.document),
                Err(other) => return Err(other.into()),
            }
        }

        Err(ReplicationError::ConflictExceeded {
            key,
            attempts: self.max_attempts,
            last_seen: last_seen.map(Box::new),
        })
    }

    /// Delete the document addressed by `reference`. Deleting an absent
    /// key succeeds so redelivered deletes are harmless.
    pub fn remove(&self, reference: &Document) -> Result<Removal, ReplicationError> {
        let key = document_key(reference, self.id_field)?;
        match self.store.delete(&key) {
            Ok(()) => Ok(Removal::Deleted),
            Err(StoreError::NotFound { .. }) => Ok(Removal::AlreadyAbsent),
            Err(other) => Err(other.into()),
        }
    }

    pub fn flush(&self) -> Result<(), ReplicationError> {
        self.store.flush().map_err(ReplicationError::StoreUnavailable)
    }
}
