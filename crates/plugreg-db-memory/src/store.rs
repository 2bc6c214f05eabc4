use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use papaya::HashMap as PapayaHashMap;
use plugreg_storage::{Attributes, Record, RecordId, RecordKind, StoreError};
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::journal::{StoreCall, StoreOp};

pub type StoreKey = String; // Format: "logicalname/id"

pub(crate) fn make_store_key(kind: RecordKind, id: RecordId) -> StoreKey {
    format!("{kind}/{id}")
}

/// A record plus the bookkeeping the in-memory backend keeps for it.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub record: Record,
    /// Insertion sequence; retrieval returns records in this order.
    pub seq: u64,
    pub created_on: OffsetDateTime,
    pub modified_on: OffsetDateTime,
}

/// Options controlling how strictly the backend mimics the platform.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Reject creates whose lookups point at missing records.
    pub enforce_lookups: bool,
    /// Reject deletes of records still referenced by other records.
    pub enforce_references: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            enforce_lookups: true,
            enforce_references: true,
        }
    }
}

/// In-memory record store backed by a papaya lock-free HashMap.
///
/// This backend provides:
/// - Full retrieve/create/update/delete semantics with case-insensitive filters
/// - Lookup and referential checks resembling the platform's constraints
/// - Solution membership tracking
/// - A journal of every call, for asserting call order in tests
/// - Failure injection for a given operation and record kind
#[derive(Debug)]
pub struct InMemoryStore {
    pub(crate) data: Arc<PapayaHashMap<StoreKey, StoredRecord>>,
    pub(crate) solutions: Arc<RwLock<HashMap<String, HashSet<(RecordKind, RecordId)>>>>,
    pub(crate) journal: Arc<RwLock<Vec<StoreCall>>>,
    pub(crate) failure: Arc<RwLock<Option<(StoreOp, RecordKind)>>>,
    seq: AtomicU64,
    pub(crate) options: StoreOptions,
}

impl InMemoryStore {
    /// Creates a new in-memory store with default options.
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    /// Creates a new in-memory store with the given options.
    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            solutions: Arc::new(RwLock::new(HashMap::new())),
            journal: Arc::new(RwLock::new(Vec::new())),
            failure: Arc::new(RwLock::new(None)),
            seq: AtomicU64::new(1),
            options,
        }
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Inserts a record directly, bypassing the journal and all checks.
    pub fn seed(&self, kind: RecordKind, attributes: Attributes) -> RecordId {
        let id = RecordId::new();
        let now = OffsetDateTime::now_utc();
        let stored = StoredRecord {
            record: Record::new(kind, id, attributes),
            seq: self.next_seq(),
            created_on: now,
            modified_on: now,
        };
        self.data.pin().insert(make_store_key(kind, id), stored);
        id
    }

    /// Seeds an SDK message.
    pub fn seed_message(&self, name: &str) -> RecordId {
        self.seed(RecordKind::SdkMessage, object(json!({ "name": name })))
    }

    /// Seeds a message filter binding `message` to an entity.
    pub fn seed_message_filter(&self, message: RecordId, entity: &str) -> RecordId {
        self.seed(
            RecordKind::SdkMessageFilter,
            object(json!({
                "sdkmessageid": message.to_string(),
                "primaryobjecttypecode": entity,
            })),
        )
    }

    /// Seeds a message together with its filter for one entity.
    pub fn seed_message_for(&self, name: &str, entity: &str) -> (RecordId, RecordId) {
        let message = self.find_seeded_message(name).unwrap_or_else(|| self.seed_message(name));
        let filter = self.seed_message_filter(message, entity);
        (message, filter)
    }

    /// Seeds a system user.
    pub fn seed_user(&self, fullname: &str) -> RecordId {
        self.seed(RecordKind::SystemUser, object(json!({ "fullname": fullname })))
    }

    /// Registers a solution so components can be added to it.
    pub async fn seed_solution(&self, unique_name: &str) {
        self.solutions
            .write()
            .await
            .entry(unique_name.to_string())
            .or_default();
    }

    fn find_seeded_message(&self, name: &str) -> Option<RecordId> {
        let guard = self.data.pin();
        guard
            .values()
            .find(|s| {
                s.record.kind == RecordKind::SdkMessage
                    && s.record
                        .get_str("name")
                        .is_some_and(|n| n.eq_ignore_ascii_case(name))
            })
            .map(|s| s.record.id)
    }

    /// Makes every subsequent call of `op` on `kind` fail.
    pub async fn fail_on(&self, op: StoreOp, kind: RecordKind) {
        *self.failure.write().await = Some((op, kind));
    }

    pub(crate) async fn check_failure(&self, op: StoreOp, kind: RecordKind) -> Result<(), StoreError> {
        if *self.failure.read().await == Some((op, kind)) {
            return Err(StoreError::rejected(
                500,
                format!("injected failure for {op:?} on {kind}"),
            ));
        }
        Ok(())
    }

    pub(crate) async fn record_call(&self, call: StoreCall) {
        tracing::trace!(call = %call, "In-memory store call");
        self.journal.write().await.push(call);
    }

    /// Every call made so far, in issue order.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.journal.read().await.clone()
    }

    /// Calls that mutated state, in issue order.
    pub async fn writes(&self) -> Vec<StoreCall> {
        self.journal
            .read()
            .await
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    pub async fn clear_journal(&self) {
        self.journal.write().await.clear();
    }

    /// Snapshot of all records of a kind, in insertion order.
    pub fn records(&self, kind: RecordKind) -> Vec<Record> {
        let guard = self.data.pin();
        let mut stored: Vec<&StoredRecord> =
            guard.values().filter(|s| s.record.kind == kind).collect();
        stored.sort_by_key(|s| s.seq);
        stored.into_iter().map(|s| s.record.clone()).collect()
    }

    pub fn count(&self, kind: RecordKind) -> usize {
        let guard = self.data.pin();
        guard.values().filter(|s| s.record.kind == kind).count()
    }

    pub fn get(&self, kind: RecordKind, id: RecordId) -> Option<Record> {
        let guard = self.data.pin();
        guard
            .get(&make_store_key(kind, id))
            .map(|s| s.record.clone())
    }

    /// Members of a solution.
    pub async fn solution_components(&self, unique_name: &str) -> Vec<(RecordKind, RecordId)> {
        let guard = self.solutions.read().await;
        let mut members: Vec<(RecordKind, RecordId)> = guard
            .get(unique_name)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        members.sort_by_key(|(kind, id)| (kind.logical_name(), *id));
        members
    }

    /// Verifies every lookup in `attributes` points at an existing record.
    pub(crate) fn check_lookups(
        &self,
        kind: RecordKind,
        attributes: &Attributes,
    ) -> Result<(), StoreError> {
        if !self.options.enforce_lookups {
            return Ok(());
        }
        let guard = self.data.pin();
        for lookup in kind.lookups() {
            let Some(value) = attributes.get(lookup.attribute) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let target: RecordId = value
                .as_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    StoreError::invalid_record(format!(
                        "{kind}.{} is not a record id: {value}",
                        lookup.attribute
                    ))
                })?;
            if guard.get(&make_store_key(lookup.target, target)).is_none() {
                return Err(StoreError::rejected(
                    400,
                    format!(
                        "{kind}.{} references missing {}/{target}",
                        lookup.attribute, lookup.target
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Verifies no record still references `id`.
    pub(crate) fn check_references(&self, kind: RecordKind, id: RecordId) -> Result<(), StoreError> {
        if !self.options.enforce_references {
            return Ok(());
        }
        let id_value = Value::String(id.to_string());
        let guard = self.data.pin();
        for stored in guard.values() {
            let referencing = stored.record.kind;
            let references = referencing
                .lookups()
                .iter()
                .filter(|l| l.target == kind)
                .any(|l| stored.record.attributes.get(l.attribute) == Some(&id_value));
            if references {
                return Err(StoreError::rejected(
                    409,
                    format!(
                        "{kind}/{id} is still referenced by {referencing}/{}",
                        stored.record.id
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn object(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_and_snapshot_order() {
        let store = InMemoryStore::new();
        let update = store.seed_message("Update");
        let create = store.seed_message("Create");

        let messages = store.records(RecordKind::SdkMessage);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, update);
        assert_eq!(messages[1].id, create);
        assert_eq!(store.count(RecordKind::SdkMessage), 2);
    }

    #[test]
    fn test_seed_message_for_reuses_message() {
        let store = InMemoryStore::new();
        let (m1, f1) = store.seed_message_for("Update", "account");
        let (m2, f2) = store.seed_message_for("update", "contact");
        assert_eq!(m1, m2);
        assert_ne!(f1, f2);
        assert_eq!(store.count(RecordKind::SdkMessageFilter), 2);
    }

    #[test]
    fn test_check_lookups_rejects_missing_parent() {
        let store = InMemoryStore::new();
        let attributes = object(json!({ "pluginassemblyid": RecordId::new().to_string() }));
        let err = store
            .check_lookups(RecordKind::PluginType, &attributes)
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 400, .. }));
    }

    #[test]
    fn test_check_references_blocks_parent_delete() {
        let store = InMemoryStore::new();
        let message = store.seed_message("Update");
        store.seed_message_filter(message, "account");
        let err = store
            .check_references(RecordKind::SdkMessage, message)
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 409, .. }));
    }
}
