// Docsink Kernel
//
// Replication core for a change-data-capture sink: applies document
// change events to a key-value target store and answers the checkpoint
// queries a change-log tailer needs to resume.

pub mod adapters;
pub mod checkpoint;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod event;
pub mod replicator;
pub mod store;
pub mod target;
pub mod update;
