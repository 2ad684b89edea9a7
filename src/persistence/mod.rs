//! Persistence layer: file-backed JSON documents with scoped locking.
//!
//! Each artifact (guild registry, K/D history, activity history) is an
//! independent [`Document`] read and mutated through [`DocumentStore`].
//! All mutation goes through [`DocumentStore::modify`]; there is no
//! cross-document transaction.

pub mod atomic;
pub mod document_store;
pub mod lock;
pub mod models;

pub use document_store::DocumentStore;
pub use lock::{FileLock, LockBackend, LockMode, ProcessLock, ScopedLock};
pub use models::{Document, GuildRegistry};
