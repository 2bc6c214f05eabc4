//! In-memory record store backend for plugin registration.
//!
//! This crate provides an in-memory implementation of the `RecordStore` trait
//! from `plugreg-storage`, using a papaya lock-free HashMap for concurrent
//! access. It mirrors the platform's lookup and reference constraints closely
//! enough to exercise the registration engine end to end, and journals every
//! call so tests can assert on call order.
//!
//! # Example
//!
//! ```ignore
//! use plugreg_db_memory::InMemoryStore;
//! use plugreg_storage::{Query, RecordKind, RecordStore};
//!
//! let store = InMemoryStore::new();
//! store.seed_message_for("Update", "account");
//!
//! let messages = store.retrieve(&Query::new(RecordKind::SdkMessage)).await?;
//! ```

pub mod journal;
mod record_impl;
pub mod store;

pub use plugreg_storage::{RecordStore, StoreError};

pub use journal::{StoreCall, StoreOp};
pub use store::{InMemoryStore, StoreKey, StoreOptions, StoredRecord};

/// Type alias for a shareable in-memory store.
pub type SharedMemoryStore = std::sync::Arc<InMemoryStore>;

/// Creates a new in-memory store behind an `Arc`.
pub fn create_memory_store() -> SharedMemoryStore {
    std::sync::Arc::new(InMemoryStore::new())
}
