// Adapter Facade
//
// The surface the change-log tailer drives. Holds the one store session
// for the adapter's lifetime, composes the write engine and checkpoint
// queries over it, and reports one tracing event per operation outcome.

use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointQuery, DocumentStream};
use crate::config::ConnectorConfig;
use crate::document::{document_key, Document};
use crate::engine::{Removal, WriteEngine};
use crate::error::ReplicationError;
use crate::store::{DocumentStore, StoreConnector, Timestamp};
use crate::target::ReplicationTarget;
use crate::update::UpdateSpec;

/// Key-value store sink for document change events.
pub struct Replicator<S> {
    store: S,
    namespace: String,
    config: ConnectorConfig,
}

impl<S: DocumentStore> Replicator<S> {
    /// Open a session on `endpoint` (`host`, `host:port` or
    /// `host:port/namespace`) using default settings otherwise.
    pub fn connect<C>(connector: &C, endpoint: &str, namespace: &str, unique_key: &str) -> Result<Self, ReplicationError>
    where
        C: StoreConnector<Store = S>,
    {
        let config = ConnectorConfig {
            endpoint: endpoint.to_string(),
            namespace: namespace.to_string(),
            unique_key: unique_key.to_string(),
            ..ConnectorConfig::default()
        };
        Self::from_config(connector, config)
    }

    pub fn from_config<C>(connector: &C, config: ConnectorConfig) -> Result<Self, ReplicationError>
    where
        C: StoreConnector<Store = S>,
    {
        config.validate()?;
        let endpoint = config.endpoint()?;
        let store = connector
            .connect(&endpoint)
            .map_err(ReplicationError::StoreUnavailable)?;

        info!(%endpoint, unique_key = %config.unique_key, "store session established");
        Ok(Self {
            store,
            namespace: endpoint.namespace,
            config,
        })
    }

    /// Wrap an already established session.
    pub fn with_store(store: S, namespace: impl Into<String>, config: ConnectorConfig) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            config,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn writer(&self) -> WriteEngine<'_, S> {
        WriteEngine::new(
            &self.store,
            &self.config.unique_key,
            &self.config.timestamp_field,
            self.config.max_cas_retries,
        )
    }

    fn checkpoints(&self) -> CheckpointQuery<'_, S> {
        CheckpointQuery::new(&self.store, &self.config.index, &self.config.timestamp_field)
    }

    fn key_of(&self, document: &Document) -> String {
        document_key(document, &self.config.unique_key).unwrap_or_else(|_| "<invalid>".into())
    }
}

impl<S: DocumentStore> ReplicationTarget for Replicator<S> {
    fn insert(&self, document: Document) -> Result<(), ReplicationError> {
        let key = self.key_of(&document);
        match self.writer().insert(document) {
            Ok(_) => {
                debug!(namespace = %self.namespace, %key, "document inserted");
                Ok(())
            }
            Err(err) => {
                warn!(namespace = %self.namespace, %key, error = %err, "insert failed");
                Err(err)
            }
        }
    }

    fn update(&self, document: &Document, spec: &UpdateSpec) -> Result<Document, ReplicationError> {
        let key = self.key_of(document);
        match self.writer().update(document, spec) {
            Ok(outcome) if outcome.conflicts() > 0 => {
                info!(
                    namespace = %self.namespace,
                    %key,
                    attempts = outcome.attempts,
                    conflicts = outcome.conflicts(),
                    "document updated after CAS conflicts"
                );
                Ok(outcome.document)
            }
            Ok(outcome) => {
                debug!(namespace = %self.namespace, %key, replace = !spec.is_patch(), "document updated");
                Ok(outcome.document)
            }
            Err(err) => {
                warn!(namespace = %self.namespace, %key, error = %err, "update failed");
                Err(err)
            }
        }
    }

    fn remove(&self, document: &Document) -> Result<(), ReplicationError> {
        let key = self.key_of(document);
        match self.writer().remove(document) {
            Ok(removal) => {
                debug!(
                    namespace = %self.namespace,
                    %key,
                    already_absent = removal == Removal::AlreadyAbsent,
                    "document removed"
                );
                Ok(())
            }
            Err(err) => {
                warn!(namespace = %self.namespace, %key, error = %err, "remove failed");
                Err(err)
            }
        }
    }

    fn range_query(&self, start: Timestamp, end: Timestamp) -> Result<DocumentStream<'_>, ReplicationError> {
        match self.checkpoints().range(start, end) {
            Ok(stream) => {
                debug!(namespace = %self.namespace, start = start.0, end = end.0, "range query opened");
                Ok(stream)
            }
            Err(err) => {
                warn!(namespace = %self.namespace, start = start.0, end = end.0, error = %err, "range query failed");
                Err(err)
            }
        }
    }

    fn latest(&self) -> Result<Option<Document>, ReplicationError> {
        match self.checkpoints().latest() {
            Ok(latest) => {
                debug!(namespace = %self.namespace, found = latest.is_some(), "latest document queried");
                Ok(latest)
            }
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "latest document query failed");
                Err(err)
            }
        }
    }

    fn flush(&self) -> Result<(), ReplicationError> {
        match self.writer().flush() {
            Ok(()) => {
                debug!(namespace = %self.namespace, "flushed");
                Ok(())
            }
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "flush failed");
                Err(err)
            }
        }
    }

    fn shutdown(&self) -> Result<(), ReplicationError> {
        match self.store.close() {
            Ok(()) => {
                info!(namespace = %self.namespace, "store session closed");
                Ok(())
            }
            Err(err) => {
                warn!(namespace = %self.namespace, error = %err, "shutdown failed");
                Err(ReplicationError::StoreUnavailable(err))
            }
        }
    }
}
