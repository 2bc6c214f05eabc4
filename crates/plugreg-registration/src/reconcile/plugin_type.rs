use plugreg_core::PluginTypeDef;
use plugreg_storage::{Attributes, Query, RecordId, RecordKind};
use serde_json::json;

use super::{Reconciler, text};
use crate::error::Result;
use crate::handles::{AssemblyRef, PluginTypeRef, Upserted};

impl Reconciler<'_> {
    /// Resolves the type by (assembly, type name) and creates or updates it.
    pub async fn upsert_type(
        &mut self,
        assembly: &AssemblyRef,
        desired: &PluginTypeDef,
        is_workflow_activity: bool,
    ) -> Result<Upserted<PluginTypeRef>> {
        let key = desired.type_name();
        let query = Query::new(RecordKind::PluginType)
            .with_lookup("pluginassemblyid", assembly.id())
            .with_eq("typename", key)
            .select(["typename"]);
        let existing = self.find_existing(&query, key).await?;

        let upserted = self
            .apply(
                RecordKind::PluginType,
                existing.map(|r| r.id),
                type_attributes(assembly, desired, is_workflow_activity),
                desired.id.map(RecordId::from_uuid),
                key,
            )
            .await?;
        Ok(upserted.map(|id| PluginTypeRef::new(id, assembly, key, is_workflow_activity)))
    }
}

fn type_attributes(
    assembly: &AssemblyRef,
    desired: &PluginTypeDef,
    is_workflow_activity: bool,
) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("pluginassemblyid".into(), json!(assembly.id().to_string()));
    attributes.insert("typename".into(), json!(desired.type_name()));
    attributes.insert("name".into(), json!(desired.name));
    attributes.insert("friendlyname".into(), json!(desired.friendly_name()));
    attributes.insert("description".into(), text(desired.description.as_deref()));
    attributes.insert("isworkflowactivity".into(), json!(is_workflow_activity));
    if is_workflow_activity {
        let group = desired
            .workflow_activity_group_name
            .clone()
            .unwrap_or_else(|| format!("{} ({})", assembly.name(), assembly.version()));
        attributes.insert("workflowactivitygroupname".into(), json!(group));
    }
    attributes
}
