//! # plugreg-storage
//!
//! Remote record store abstraction for plugin registration.
//!
//! This crate defines the trait and types every store backend implements. It
//! does not contain any implementations; the in-memory backend lives in
//! `plugreg-db-memory` and the Web API client in `plugreg-cli`.
//!
//! ## Overview
//!
//! The main trait is [`RecordStore`], which defines:
//! - filtered retrieval by natural key (`retrieve`, `retrieve_one`, `query_children`)
//! - create / update / delete of typed records
//! - association of records to a solution

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StoreError};
pub use traits::RecordStore;
pub use types::{Attributes, Condition, LookupField, Query, Record, RecordId, RecordKind};

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn RecordStore>;
