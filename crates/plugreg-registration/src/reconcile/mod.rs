//! Resolve-or-create reconciliation of the Assembly → Type → Step → Image tree.
//!
//! Each level looks its record up by natural key under the parent handle,
//! then creates or overwrites it, adds it to the target solution (when one is
//! given) and reports progress. Calls are awaited one at a time.

mod assembly;
mod image;
mod lookup;
mod plugin_type;
mod step;

use plugreg_storage::{Attributes, Query, Record, RecordId, RecordKind, RecordStore};

use crate::error::{RegistrationError, RemoteOperation, Result};
use crate::handles::Upserted;
use crate::progress::{ProgressReporter, RegistrationEvent, SkipReason};
use crate::summary::RunSummary;

pub use lookup::LookupCache;
pub(crate) use step::{ResolvedStepKey, resolve_step_key};

pub struct Reconciler<'a> {
    store: &'a dyn RecordStore,
    reporter: &'a dyn ProgressReporter,
    solution: Option<&'a str>,
    lookups: LookupCache,
    summary: RunSummary,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn RecordStore, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            store,
            reporter,
            solution: None,
            lookups: LookupCache::new(),
            summary: RunSummary::default(),
        }
    }

    /// Adds every upserted record to `solution`; `None` skips association.
    pub fn with_solution(mut self, solution: Option<&'a str>) -> Self {
        self.solution = solution.filter(|s| !s.trim().is_empty());
        self
    }

    /// Reuses lookups already resolved while planning.
    pub fn with_lookups(mut self, lookups: LookupCache) -> Self {
        self.lookups = lookups;
        self
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn into_summary(self) -> RunSummary {
        self.summary
    }

    pub(crate) fn skipped(&self, kind: RecordKind, key: &str, reason: SkipReason) {
        self.reporter.report(&RegistrationEvent::Skipped {
            kind,
            key: key.to_string(),
            reason,
        });
    }

    /// Natural-key lookup of an existing record.
    async fn find_existing(&self, query: &Query, key: &str) -> Result<Option<Record>> {
        self.store
            .retrieve_one(query)
            .await
            .map_err(|e| RegistrationError::remote(query.kind, key, RemoteOperation::Query, e))
    }

    /// Creates the record or overwrites the existing one, then associates it.
    async fn apply(
        &mut self,
        kind: RecordKind,
        existing: Option<RecordId>,
        mut attributes: Attributes,
        requested_id: Option<RecordId>,
        key: &str,
    ) -> Result<Upserted<RecordId>> {
        let upserted = match existing {
            Some(id) => {
                self.store
                    .update(kind, id, &attributes)
                    .await
                    .map_err(|e| RegistrationError::remote(kind, key, RemoteOperation::Update, e))?;
                Upserted::Updated(id)
            }
            None => {
                if let Some(id) = requested_id {
                    attributes.insert(kind.primary_id().to_string(), id.to_string().into());
                }
                let id = self
                    .store
                    .create(kind, &attributes)
                    .await
                    .map_err(|e| RegistrationError::remote(kind, key, RemoteOperation::Create, e))?;
                Upserted::Created(id)
            }
        };

        let id = *upserted.handle();
        self.summary.record_upsert(kind, upserted.outcome());
        self.reporter.report(&RegistrationEvent::Upserted {
            kind,
            id,
            key: key.to_string(),
            outcome: upserted.outcome(),
        });

        self.associate(kind, id, key).await?;
        Ok(upserted)
    }

    async fn associate(&mut self, kind: RecordKind, id: RecordId, key: &str) -> Result<()> {
        let Some(solution) = self.solution else {
            return Ok(());
        };
        self.store
            .add_solution_component(solution, kind, id)
            .await
            .map_err(|e| RegistrationError::remote(kind, key, RemoteOperation::Associate, e))?;
        self.summary.associations += 1;
        self.reporter.report(&RegistrationEvent::Associated {
            kind,
            id,
            solution: solution.to_string(),
        });
        Ok(())
    }

    /// Deletes one record planned for removal.
    pub(crate) async fn delete(&mut self, kind: RecordKind, id: RecordId, key: &str) -> Result<()> {
        self.store
            .delete(kind, id)
            .await
            .map_err(|e| RegistrationError::remote(kind, key, RemoteOperation::Delete, e))?;
        self.summary.record_delete(kind);
        self.reporter.report(&RegistrationEvent::Deleted {
            kind,
            id,
            key: key.to_string(),
        });
        Ok(())
    }
}

/// Optional text attribute; `None` clears the remote value.
fn text(value: Option<&str>) -> serde_json::Value {
    value
        .map(|v| serde_json::Value::String(v.to_string()))
        .unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::AssemblyInfo;
    use crate::progress::CollectingReporter;
    use plugreg_core::mapping;
    use plugreg_db_memory::InMemoryStore;

    const TREE: &str = r#"{
        "Name": "Contoso.Plugins",
        "PluginTypes": [{
            "Name": "AccountPlugin",
            "Steps": [{
                "Name": "AccountPlugin: Update of account",
                "MessageName": "Update",
                "PrimaryEntityName": "account",
                "Stage": "PostOperation",
                "Mode": "Sync",
                "Rank": 1,
                "Images": [{"ImageType": "PostImage", "EntityAlias": "PostImage"}]
            }]
        }]
    }"#;

    fn info() -> AssemblyInfo {
        AssemblyInfo {
            name: "Contoso.Plugins".into(),
            version: "1.0.0.0".into(),
            culture: None,
            public_key_token: None,
            path: "Contoso.Plugins.dll".into(),
            content: b"MZ".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_child_handles_point_at_their_parent() {
        let store = InMemoryStore::new();
        store.seed_message_for("Update", "account");
        let reporter = CollectingReporter::new();
        let desired = mapping::parse_str(TREE).unwrap();
        let plugin_type = &desired.types()[0];
        let step = &plugin_type.steps()[0];
        let image = &step.images()[0];

        let mut reconciler = Reconciler::new(&store, &reporter);
        let assembly = reconciler.upsert_assembly(&desired, &info()).await.unwrap();
        let type_ref = reconciler
            .upsert_type(assembly.handle(), plugin_type, false)
            .await
            .unwrap();
        let step_ref = reconciler
            .upsert_step(type_ref.handle(), step)
            .await
            .unwrap();
        let image_ref = reconciler
            .upsert_image(step_ref.handle(), image)
            .await
            .unwrap();

        assert!(assembly.is_created());
        assert!(type_ref.is_created());
        assert!(step_ref.is_created());
        assert!(image_ref.is_created());
        assert_eq!(type_ref.handle().assembly_id(), assembly.handle().id());
        assert_eq!(step_ref.handle().plugin_type_id(), type_ref.handle().id());
        assert_eq!(image_ref.handle().step_id(), step_ref.handle().id());
        assert_eq!(reconciler.summary().total_writes(), 4);
    }

    #[tokio::test]
    async fn test_second_pass_updates_the_same_records() {
        let store = InMemoryStore::new();
        store.seed_message_for("Update", "account");
        let reporter = CollectingReporter::new();
        let desired = mapping::parse_str(TREE).unwrap();
        let plugin_type = &desired.types()[0];

        let mut first = Reconciler::new(&store, &reporter);
        let assembly = first
            .upsert_assembly(&desired, &info())
            .await
            .unwrap()
            .into_handle();
        let created = first
            .upsert_type(&assembly, plugin_type, false)
            .await
            .unwrap();

        let mut second = Reconciler::new(&store, &reporter);
        let again = second.upsert_assembly(&desired, &info()).await.unwrap();
        assert!(!again.is_created());
        assert_eq!(again.handle().id(), assembly.id());
        let updated = second
            .upsert_type(again.handle(), plugin_type, false)
            .await
            .unwrap();
        assert!(!updated.is_created());
        assert_eq!(updated.handle().id(), created.handle().id());
        assert_eq!(store.count(RecordKind::PluginType), 1);
    }
}
