//! Implementation of the RecordStore trait for InMemoryStore.

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;

use plugreg_storage::{
    Attributes, Query, Record, RecordId, RecordKind, RecordStore, StoreError,
};

use crate::journal::{StoreCall, StoreOp};
use crate::store::{InMemoryStore, StoredRecord, make_store_key};

/// Applies a column projection; the primary id attribute is always kept.
fn project(record: &Record, columns: Option<&[String]>) -> Record {
    let Some(columns) = columns else {
        return record.clone();
    };
    let primary = record.kind.primary_id();
    let attributes: Attributes = record
        .attributes
        .iter()
        .filter(|(name, _)| name.as_str() == primary || columns.iter().any(|c| c == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    Record::new(record.kind, record.id, attributes)
}

/// Reads an explicit id from the payload's primary id attribute.
fn requested_id(kind: RecordKind, attributes: &Attributes) -> Result<Option<RecordId>, StoreError> {
    match attributes.get(kind.primary_id()) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s.parse().map(Some).map_err(|_| {
            StoreError::invalid_record(format!("{}: not a record id: {s}", kind.primary_id()))
        }),
        Some(other) => Err(StoreError::invalid_record(format!(
            "{}: not a record id: {other}",
            kind.primary_id()
        ))),
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn retrieve(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        self.check_failure(StoreOp::Retrieve, query.kind).await?;
        self.record_call(StoreCall::Retrieve { kind: query.kind })
            .await;

        let mut records: Vec<Record> = {
            let guard = self.data.pin();
            let mut matched: Vec<&StoredRecord> = guard
                .values()
                .filter(|s| s.record.kind == query.kind && query.matches(&s.record.attributes))
                .collect();
            matched.sort_by_key(|s| s.seq);
            matched
                .into_iter()
                .map(|s| project(&s.record, query.columns.as_deref()))
                .collect()
        };

        if let Some(top) = query.top {
            records.truncate(top as usize);
        }
        tracing::debug!(query = %query, matched = records.len(), "Retrieved records");
        Ok(records)
    }

    async fn create(
        &self,
        kind: RecordKind,
        attributes: &Attributes,
    ) -> Result<RecordId, StoreError> {
        self.check_failure(StoreOp::Create, kind).await?;
        self.check_lookups(kind, attributes)?;

        let id = requested_id(kind, attributes)?.unwrap_or_default();
        let key = make_store_key(kind, id);
        let now = OffsetDateTime::now_utc();

        let mut stored_attributes = attributes.clone();
        stored_attributes.insert(kind.primary_id().to_string(), Value::String(id.to_string()));

        // Use block scope to ensure guard is dropped before await
        {
            let guard = self.data.pin();
            if guard.get(&key).is_some() {
                return Err(StoreError::rejected(
                    409,
                    format!("{kind}/{id} already exists"),
                ));
            }
            guard.insert(
                key,
                StoredRecord {
                    record: Record::new(kind, id, stored_attributes),
                    seq: self.next_seq(),
                    created_on: now,
                    modified_on: now,
                },
            );
        }

        self.record_call(StoreCall::Create { kind, id }).await;
        Ok(id)
    }

    async fn update(
        &self,
        kind: RecordKind,
        id: RecordId,
        attributes: &Attributes,
    ) -> Result<(), StoreError> {
        self.check_failure(StoreOp::Update, kind).await?;
        self.check_lookups(kind, attributes)?;
        let key = make_store_key(kind, id);

        {
            let guard = self.data.pin();
            let existing = guard
                .get(&key)
                .ok_or_else(|| StoreError::not_found(kind, id.to_string()))?;

            let mut updated = existing.clone();
            for (name, value) in attributes {
                if name == kind.primary_id() {
                    continue;
                }
                updated.record.attributes.insert(name.clone(), value.clone());
            }
            updated.modified_on = OffsetDateTime::now_utc();
            guard.insert(key, updated);
        }

        self.record_call(StoreCall::Update { kind, id }).await;
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, id: RecordId) -> Result<(), StoreError> {
        self.check_failure(StoreOp::Delete, kind).await?;
        let key = make_store_key(kind, id);

        {
            let guard = self.data.pin();
            if guard.get(&key).is_none() {
                return Err(StoreError::not_found(kind, id.to_string()));
            }
        }
        self.check_references(kind, id)?;
        self.data.pin().remove(&key);

        // Removing a record drops its solution membership.
        for members in self.solutions.write().await.values_mut() {
            members.remove(&(kind, id));
        }

        self.record_call(StoreCall::Delete { kind, id }).await;
        Ok(())
    }

    async fn add_solution_component(
        &self,
        solution: &str,
        kind: RecordKind,
        id: RecordId,
    ) -> Result<(), StoreError> {
        self.check_failure(StoreOp::AddSolutionComponent, kind)
            .await?;
        if kind.solution_component_type().is_none() {
            return Err(StoreError::invalid_record(format!(
                "{kind} cannot be a solution component"
            )));
        }
        if self.get(kind, id).is_none() {
            return Err(StoreError::not_found(kind, id.to_string()));
        }

        {
            let mut solutions = self.solutions.write().await;
            let members = solutions.get_mut(solution).ok_or_else(|| StoreError::Rejected {
                status: 404,
                message: format!("solution '{solution}' does not exist"),
            })?;
            members.insert((kind, id));
        }

        self.record_call(StoreCall::AddSolutionComponent {
            solution: solution.to_string(),
            kind,
            id,
        })
        .await;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
