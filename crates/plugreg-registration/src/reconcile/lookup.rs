//! Per-run cache of platform lookups: message, message filter and user ids.

use std::collections::HashMap;

use plugreg_storage::{Query, RecordId, RecordKind, RecordStore, StoreError};

use crate::error::{RegistrationError, RemoteOperation, Result};

#[derive(Debug, Default)]
pub struct LookupCache {
    messages: HashMap<String, RecordId>,
    filters: HashMap<(RecordId, String), RecordId>,
    users: HashMap<String, RecordId>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the SDK message named `name`.
    pub async fn message_id(&mut self, store: &dyn RecordStore, name: &str) -> Result<RecordId> {
        let cache_key = name.to_ascii_lowercase();
        if let Some(id) = self.messages.get(&cache_key) {
            return Ok(*id);
        }
        let query = Query::new(RecordKind::SdkMessage)
            .with_eq("name", name)
            .select(["name"]);
        let id = resolve(store, &query, name).await?;
        self.messages.insert(cache_key, id);
        Ok(id)
    }

    /// Id of the filter binding `message` to `entity`.
    pub async fn filter_id(
        &mut self,
        store: &dyn RecordStore,
        message: RecordId,
        message_name: &str,
        entity: &str,
    ) -> Result<RecordId> {
        let cache_key = (message, entity.to_ascii_lowercase());
        if let Some(id) = self.filters.get(&cache_key) {
            return Ok(*id);
        }
        let query = Query::new(RecordKind::SdkMessageFilter)
            .with_lookup("sdkmessageid", message)
            .with_eq("primaryobjecttypecode", entity)
            .select(["primaryobjecttypecode"]);
        let id = resolve(store, &query, &format!("{message_name}/{entity}")).await?;
        self.filters.insert(cache_key, id);
        Ok(id)
    }

    /// Id of the system user with the given full name.
    pub async fn user_id(&mut self, store: &dyn RecordStore, fullname: &str) -> Result<RecordId> {
        let cache_key = fullname.to_ascii_lowercase();
        if let Some(id) = self.users.get(&cache_key) {
            return Ok(*id);
        }
        let query = Query::new(RecordKind::SystemUser)
            .with_eq("fullname", fullname)
            .select(["fullname"]);
        let id = resolve(store, &query, fullname).await?;
        self.users.insert(cache_key, id);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len() + self.filters.len() + self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn resolve(store: &dyn RecordStore, query: &Query, key: &str) -> Result<RecordId> {
    let lookup_error =
        |source: StoreError| RegistrationError::remote(query.kind, key, RemoteOperation::Lookup, source);
    match store.retrieve_one(query).await.map_err(lookup_error)? {
        Some(record) => {
            tracing::debug!(kind = %query.kind, key = %key, id = %record.id, "Resolved lookup");
            Ok(record.id)
        }
        None => Err(RegistrationError::lookup_missing(query.kind, key)),
    }
}
