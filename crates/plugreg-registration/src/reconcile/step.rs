use plugreg_core::{ExecutionMode, StepDef};
use plugreg_storage::{Attributes, Query, Record, RecordId, RecordKind, RecordStore};
use serde_json::{Value, json};

use super::{LookupCache, Reconciler, text};
use crate::error::Result;
use crate::handles::{PluginTypeRef, StepRef, Upserted};

/// Remote identity of a step: the ids its natural key resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ResolvedStepKey {
    pub message: RecordId,
    pub filter: Option<RecordId>,
    pub stage: i64,
    pub mode: i64,
}

impl ResolvedStepKey {
    /// Key of a remote step record; `None` if it lacks a message or stage.
    pub(crate) fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            message: record.get_id("sdkmessageid")?,
            filter: record.get_id("sdkmessagefilterid"),
            stage: record.get_i64("stage")?,
            mode: record.get_i64("mode").unwrap_or(0),
        })
    }
}

/// Resolves the message and filter ids of a desired step.
pub(crate) async fn resolve_step_key(
    store: &dyn RecordStore,
    lookups: &mut LookupCache,
    step: &StepDef,
) -> Result<ResolvedStepKey> {
    let message = lookups.message_id(store, &step.message_name).await?;
    let filter = lookups
        .filter_id(store, message, &step.message_name, &step.primary_entity_name)
        .await?;
    Ok(ResolvedStepKey {
        message,
        filter: Some(filter),
        stage: step.stage.code().into(),
        mode: step.mode.code().into(),
    })
}

impl Reconciler<'_> {
    /// Resolves the step by (type, message, filter, stage, mode) and creates
    /// or updates it.
    pub async fn upsert_step(
        &mut self,
        plugin_type: &PluginTypeRef,
        desired: &StepDef,
    ) -> Result<Upserted<StepRef>> {
        let key = desired.key().to_string();
        let resolved = resolve_step_key(self.store, &mut self.lookups, desired).await?;

        let mut query = Query::new(RecordKind::Step)
            .with_lookup("plugintypeid", plugin_type.id())
            .with_lookup("sdkmessageid", resolved.message)
            .with_eq("stage", resolved.stage)
            .with_eq("mode", resolved.mode)
            .select(["name", "stage", "mode"]);
        if let Some(filter) = resolved.filter {
            query = query.with_lookup("sdkmessagefilterid", filter);
        }
        let existing = self.find_existing(&query, &key).await?;

        let impersonating_user = match desired.impersonating_user_fullname.as_deref() {
            Some(fullname) => Some(self.lookups.user_id(self.store, fullname).await?),
            None => None,
        };

        let attributes = step_attributes(plugin_type, desired, &resolved, impersonating_user);
        let upserted = self
            .apply(
                RecordKind::Step,
                existing.map(|r| r.id),
                attributes,
                desired.id.map(RecordId::from_uuid),
                &key,
            )
            .await?;
        Ok(upserted.map(|id| StepRef::new(id, plugin_type, &desired.message_name)))
    }
}

fn step_attributes(
    plugin_type: &PluginTypeRef,
    desired: &StepDef,
    resolved: &ResolvedStepKey,
    impersonating_user: Option<RecordId>,
) -> Attributes {
    let is_async = desired.mode == ExecutionMode::Asynchronous;
    let filtering = desired
        .filtering_attributes
        .as_ref()
        .and_then(|set| set.to_platform_string());

    let mut attributes = Attributes::new();
    attributes.insert("name".into(), json!(desired.name));
    attributes.insert("plugintypeid".into(), json!(plugin_type.id().to_string()));
    attributes.insert("sdkmessageid".into(), json!(resolved.message.to_string()));
    attributes.insert(
        "sdkmessagefilterid".into(),
        resolved
            .filter
            .map(|id| Value::String(id.to_string()))
            .unwrap_or(Value::Null),
    );
    attributes.insert("stage".into(), json!(resolved.stage));
    attributes.insert("mode".into(), json!(resolved.mode));
    attributes.insert("rank".into(), json!(desired.rank));
    attributes.insert("filteringattributes".into(), text(filtering.as_deref()));
    attributes.insert(
        "configuration".into(),
        text(desired.custom_configuration.as_deref()),
    );
    attributes.insert("description".into(), text(desired.description.as_deref()));
    attributes.insert(
        "supporteddeployment".into(),
        json!(desired.supported_deployment().code()),
    );
    attributes.insert(
        "asyncautodelete".into(),
        json!(is_async && desired.async_auto_delete()),
    );
    attributes.insert(
        "impersonatinguserid".into(),
        impersonating_user
            .map(|id| Value::String(id.to_string()))
            .unwrap_or(Value::Null),
    );
    attributes
}
