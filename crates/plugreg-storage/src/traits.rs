//! Store traits for the remote record store abstraction.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{Attributes, Query, Record, RecordId, RecordKind};

/// Generic typed CRUD against the platform's record catalog.
///
/// Every call is a single remote round-trip; callers await them one at a time.
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use plugreg_storage::{Query, RecordKind, RecordStore};
///
/// async fn find_assembly(store: &dyn RecordStore, name: &str) -> Result<Option<Record>, StoreError> {
///     store
///         .retrieve_one(&Query::new(RecordKind::PluginAssembly).with_eq("name", name))
///         .await
/// }
/// ```
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Retrieves every record of `query.kind` matching all conditions.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues or invalid queries,
    /// never for an empty result.
    async fn retrieve(&self, query: &Query) -> Result<Vec<Record>, StoreError>;

    /// Creates a record and returns its new id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Rejected` if the platform refuses the payload.
    async fn create(&self, kind: RecordKind, attributes: &Attributes)
    -> Result<RecordId, StoreError>;

    /// Overwrites the given attributes of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record does not exist.
    async fn update(
        &self,
        kind: RecordKind,
        id: RecordId,
        attributes: &Attributes,
    ) -> Result<(), StoreError>;

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record does not exist, or
    /// `StoreError::Rejected` if dependent records still reference it.
    async fn delete(&self, kind: RecordKind, id: RecordId) -> Result<(), StoreError>;

    /// Adds a record to a solution (deployable unit). Adding a record that is
    /// already part of the solution succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidRecord` if the kind cannot be a solution
    /// component, `StoreError::NotFound` if the record does not exist, or
    /// `StoreError::Rejected` (404) if the solution does not exist.
    async fn add_solution_component(
        &self,
        solution: &str,
        kind: RecordKind,
        id: RecordId,
    ) -> Result<(), StoreError>;

    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;

    /// Retrieves the single record matching a natural-key query.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Ambiguous` if more than one record matches.
    async fn retrieve_one(&self, query: &Query) -> Result<Option<Record>, StoreError> {
        let mut records = self.retrieve(query).await?;
        match records.len() {
            0 => Ok(None),
            1 => Ok(records.pop()),
            count => Err(StoreError::ambiguous(query.to_string(), count)),
        }
    }

    /// Retrieves all records of `kind` whose lookup `parent_attribute` points
    /// at `parent`.
    async fn query_children(
        &self,
        kind: RecordKind,
        parent_attribute: &str,
        parent: RecordId,
    ) -> Result<Vec<Record>, StoreError> {
        self.retrieve(&Query::new(kind).with_lookup(parent_attribute, parent))
            .await
    }
}
