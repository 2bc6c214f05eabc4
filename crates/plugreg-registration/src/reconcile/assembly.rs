use plugreg_core::PluginAssemblyDef;
use plugreg_storage::{Attributes, Query, RecordId, RecordKind};
use serde_json::json;

use super::{Reconciler, text};
use crate::error::Result;
use crate::handles::{AssemblyRef, Upserted};
use crate::introspect::AssemblyInfo;

impl Reconciler<'_> {
    /// Resolves the assembly by name and creates or updates it from the
    /// introspected binary.
    pub async fn upsert_assembly(
        &mut self,
        desired: &PluginAssemblyDef,
        info: &AssemblyInfo,
    ) -> Result<Upserted<AssemblyRef>> {
        let key = info.name.as_str();
        let query = Query::new(RecordKind::PluginAssembly)
            .with_eq("name", key)
            .select(["name", "version"]);
        let existing = self.find_existing(&query, key).await?;

        if let Some(record) = &existing {
            tracing::debug!(
                assembly = %key,
                id = %record.id,
                remote_version = record.get_str("version").unwrap_or("-"),
                version = %info.version,
                "Plugin assembly exists, updating"
            );
        }

        let upserted = self
            .apply(
                RecordKind::PluginAssembly,
                existing.map(|r| r.id),
                assembly_attributes(desired, info),
                desired.id.map(RecordId::from_uuid),
                key,
            )
            .await?;
        Ok(upserted.map(|id| AssemblyRef::new(id, &info.name, &info.version)))
    }
}

fn assembly_attributes(desired: &PluginAssemblyDef, info: &AssemblyInfo) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("name".into(), json!(info.name));
    attributes.insert("version".into(), json!(info.version));
    attributes.insert(
        "culture".into(),
        json!(info.culture.as_deref().unwrap_or("neutral")),
    );
    attributes.insert("publickeytoken".into(), text(info.public_key_token.as_deref()));
    attributes.insert("content".into(), json!(info.content_base64()));
    attributes.insert("isolationmode".into(), json!(desired.isolation_mode().code()));
    attributes.insert("sourcetype".into(), json!(desired.source_type().code()));
    attributes.insert("description".into(), text(desired.description.as_deref()));
    attributes
}
