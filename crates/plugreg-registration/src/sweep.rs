//! Deletion pass: remote components under the assembly that the mapping no
//! longer declares.
//!
//! Planning only reads. The resulting plan lists deletions deepest-first
//! (images, then their step, then a removed type) so executing it in order
//! respects the platform's referential constraints.

use std::collections::{HashMap, HashSet};

use plugreg_core::{ImageKey, ImageType, PluginAssemblyDef, PluginTypeDef, StepDef};
use plugreg_storage::{Query, Record, RecordId, RecordKind, RecordStore};
use serde::Serialize;

use crate::error::{RegistrationError, RemoteOperation, Result};
use crate::reconcile::{LookupCache, ResolvedStepKey, resolve_step_key};

/// One remote record scheduled for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDeletion {
    pub kind: RecordKind,
    pub id: RecordId,
    /// Natural key, for reporting.
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeletionPlan {
    deletions: Vec<PlannedDeletion>,
}

impl DeletionPlan {
    pub fn iter(&self) -> impl Iterator<Item = &PlannedDeletion> {
        self.deletions.iter()
    }

    pub fn len(&self) -> usize {
        self.deletions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
    }

    pub fn count(&self, kind: RecordKind) -> usize {
        self.deletions.iter().filter(|d| d.kind == kind).count()
    }

    fn push(&mut self, kind: RecordKind, id: RecordId, key: impl Into<String>) {
        self.deletions.push(PlannedDeletion {
            kind,
            id,
            key: key.into(),
        });
    }
}

struct Sweep<'a> {
    store: &'a dyn RecordStore,
    lookups: &'a mut LookupCache,
    plan: DeletionPlan,
}

/// Computes what the deletion pass removes for `assembly_name`.
///
/// The plan is empty when the mapping carries no type detail or the assembly
/// is not registered yet. Steps and images of workflow-activity types, and of
/// types whose mapping omits `Steps`, are never swept.
pub async fn plan_deletions(
    store: &dyn RecordStore,
    lookups: &mut LookupCache,
    assembly_name: &str,
    desired: &PluginAssemblyDef,
    is_workflow_assembly: bool,
) -> Result<DeletionPlan> {
    if !desired.has_type_detail() {
        return Ok(DeletionPlan::default());
    }

    let query = Query::new(RecordKind::PluginAssembly)
        .with_eq("name", assembly_name)
        .select(["name"]);
    let Some(assembly) = store
        .retrieve_one(&query)
        .await
        .map_err(|e| query_error(RecordKind::PluginAssembly, assembly_name, e))?
    else {
        tracing::debug!(assembly = %assembly_name, "Assembly not registered, nothing to sweep");
        return Ok(DeletionPlan::default());
    };

    let mut sweep = Sweep {
        store,
        lookups,
        plan: DeletionPlan::default(),
    };

    let remote_types = sweep
        .children(RecordKind::PluginType, "pluginassemblyid", assembly.id, assembly_name)
        .await?;
    for remote_type in &remote_types {
        let type_name = remote_type.get_str("typename").unwrap_or_default();
        let is_workflow =
            is_workflow_assembly || remote_type.get_bool("isworkflowactivity") == Some(true);
        let declared = desired.find_type(type_name);

        match declared {
            None => {
                if !is_workflow {
                    sweep.remove_all_steps(remote_type, type_name).await?;
                }
                sweep.plan.push(RecordKind::PluginType, remote_type.id, type_name);
            }
            Some(_) if is_workflow => {}
            Some(declared) if !declared.has_step_detail() => {}
            Some(declared) => sweep.sweep_steps(remote_type, declared).await?,
        }
    }

    tracing::info!(
        assembly = %assembly_name,
        types = sweep.plan.count(RecordKind::PluginType),
        steps = sweep.plan.count(RecordKind::Step),
        images = sweep.plan.count(RecordKind::StepImage),
        "Deletion plan computed"
    );
    Ok(sweep.plan)
}

impl Sweep<'_> {
    async fn children(
        &self,
        kind: RecordKind,
        parent_attribute: &str,
        parent: RecordId,
        parent_key: &str,
    ) -> Result<Vec<Record>> {
        self.store
            .query_children(kind, parent_attribute, parent)
            .await
            .map_err(|e| query_error(kind, parent_key, e))
    }

    /// Removes every step of a type that is itself being removed.
    async fn remove_all_steps(&mut self, remote_type: &Record, type_name: &str) -> Result<()> {
        let steps = self
            .children(RecordKind::Step, "plugintypeid", remote_type.id, type_name)
            .await?;
        for step in &steps {
            self.remove_step(step).await?;
        }
        Ok(())
    }

    async fn remove_step(&mut self, step: &Record) -> Result<()> {
        let step_name = step.get_str("name").unwrap_or_default().to_string();
        let images = self
            .children(
                RecordKind::StepImage,
                "sdkmessageprocessingstepid",
                step.id,
                &step_name,
            )
            .await?;
        for image in &images {
            self.plan
                .push(RecordKind::StepImage, image.id, remote_image_label(image));
        }
        self.plan.push(RecordKind::Step, step.id, step_name);
        Ok(())
    }

    async fn sweep_steps(&mut self, remote_type: &Record, declared: &PluginTypeDef) -> Result<()> {
        let mut wanted: HashMap<ResolvedStepKey, &StepDef> = HashMap::new();
        for step in declared.steps() {
            let key = resolve_step_key(self.store, &mut *self.lookups, step).await?;
            wanted.insert(key, step);
        }

        let remote_steps = self
            .children(
                RecordKind::Step,
                "plugintypeid",
                remote_type.id,
                declared.type_name(),
            )
            .await?;
        for remote_step in &remote_steps {
            let matched = ResolvedStepKey::from_record(remote_step).and_then(|k| wanted.get(&k));
            match matched {
                None => self.remove_step(remote_step).await?,
                Some(step) if step.images.is_some() => {
                    self.sweep_images(remote_step, step).await?;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    async fn sweep_images(&mut self, remote_step: &Record, declared: &StepDef) -> Result<()> {
        let wanted: HashSet<ImageKey> = declared.images().iter().map(|i| i.key()).collect();
        let key = declared.key().to_string();
        let images = self
            .children(
                RecordKind::StepImage,
                "sdkmessageprocessingstepid",
                remote_step.id,
                &key,
            )
            .await?;
        for image in &images {
            let remote_key = image
                .get_i64("imagetype")
                .and_then(ImageType::from_code)
                .zip(image.get_str("entityalias"))
                .map(|(image_type, alias)| ImageKey::new(image_type, alias));
            if !remote_key.is_some_and(|k| wanted.contains(&k)) {
                self.plan
                    .push(RecordKind::StepImage, image.id, remote_image_label(image));
            }
        }
        Ok(())
    }
}

fn remote_image_label(image: &Record) -> String {
    image
        .get_str("entityalias")
        .or_else(|| image.get_str("name"))
        .unwrap_or_default()
        .to_string()
}

fn query_error(
    kind: RecordKind,
    key: &str,
    source: plugreg_storage::StoreError,
) -> RegistrationError {
    RegistrationError::remote(kind, key, RemoteOperation::Query, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugreg_core::mapping;
    use plugreg_db_memory::InMemoryStore;
    use serde_json::json;

    fn object(value: serde_json::Value) -> plugreg_storage::Attributes {
        value.as_object().cloned().unwrap()
    }

    struct Remote {
        store: InMemoryStore,
        assembly: RecordId,
        message: RecordId,
        filter: RecordId,
    }

    fn remote() -> Remote {
        let store = InMemoryStore::new();
        let (message, filter) = store.seed_message_for("Update", "account");
        let assembly = store.seed(
            RecordKind::PluginAssembly,
            object(json!({"name": "Contoso.Plugins"})),
        );
        Remote {
            store,
            assembly,
            message,
            filter,
        }
    }

    impl Remote {
        fn plugin_type(&self, name: &str, workflow: bool) -> RecordId {
            self.store.seed(
                RecordKind::PluginType,
                object(json!({
                    "typename": name,
                    "pluginassemblyid": self.assembly.to_string(),
                    "isworkflowactivity": workflow,
                })),
            )
        }

        fn step(&self, plugin_type: RecordId, stage: i64) -> RecordId {
            self.store.seed(
                RecordKind::Step,
                object(json!({
                    "name": format!("step {stage}"),
                    "plugintypeid": plugin_type.to_string(),
                    "sdkmessageid": self.message.to_string(),
                    "sdkmessagefilterid": self.filter.to_string(),
                    "stage": stage,
                    "mode": 0,
                })),
            )
        }

        fn image(&self, step: RecordId, image_type: i64, alias: &str) -> RecordId {
            self.store.seed(
                RecordKind::StepImage,
                object(json!({
                    "sdkmessageprocessingstepid": step.to_string(),
                    "imagetype": image_type,
                    "entityalias": alias,
                })),
            )
        }
    }

    const MAPPING: &str = r#"{
        "Name": "Contoso.Plugins",
        "PluginTypes": [{
            "Name": "AccountPlugin",
            "Steps": [{
                "Name": "Update of account",
                "MessageName": "Update",
                "PrimaryEntityName": "account",
                "Stage": "PostOperation",
                "Mode": "Sync",
                "Rank": 1,
                "Images": [{"ImageType": "PostImage", "EntityAlias": "PostImage"}]
            }]
        }]
    }"#;

    async fn plan(remote: &Remote, json: &str, workflow: bool) -> DeletionPlan {
        let desired = mapping::parse_str(json).unwrap();
        plan_deletions(
            &remote.store,
            &mut LookupCache::new(),
            "Contoso.Plugins",
            &desired,
            workflow,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_removed_type_goes_with_its_subtree_deepest_first() {
        let remote = remote();
        let kept = remote.plugin_type("AccountPlugin", false);
        remote.step(kept, 40);
        let gone = remote.plugin_type("LegacyPlugin", false);
        let gone_step = remote.step(gone, 20);
        let gone_image = remote.image(gone_step, 0, "PreImage");

        let plan = plan(&remote, MAPPING, false).await;
        let order: Vec<(RecordKind, RecordId)> = plan.iter().map(|d| (d.kind, d.id)).collect();
        assert_eq!(
            order,
            vec![
                (RecordKind::StepImage, gone_image),
                (RecordKind::Step, gone_step),
                (RecordKind::PluginType, gone),
            ]
        );
        assert!(remote.store.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_undeclared_step_and_image_are_planned() {
        let remote = remote();
        let plugin_type = remote.plugin_type("AccountPlugin", false);
        let kept = remote.step(plugin_type, 40);
        remote.image(kept, 1, "PostImage");
        let stray_image = remote.image(kept, 0, "PreImage");
        let stray_step = remote.step(plugin_type, 20);

        let plan = plan(&remote, MAPPING, false).await;
        let ids: Vec<RecordId> = plan.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![stray_image, stray_step]);
    }

    #[tokio::test]
    async fn test_workflow_types_keep_steps() {
        let remote = remote();
        let plugin_type = remote.plugin_type("AccountPlugin", true);
        remote.step(plugin_type, 20);

        assert!(plan(&remote, MAPPING, false).await.is_empty());
        assert!(plan(&remote, MAPPING, true).await.is_empty());
    }

    #[tokio::test]
    async fn test_omitted_steps_are_not_swept() {
        let remote = remote();
        let plugin_type = remote.plugin_type("AccountPlugin", false);
        remote.step(plugin_type, 20);

        let json = r#"{"Name": "Contoso.Plugins", "PluginTypes": [{"Name": "AccountPlugin"}]}"#;
        assert!(plan(&remote, json, false).await.is_empty());

        let json = r#"{"Name": "Contoso.Plugins", "PluginTypes": [{"Name": "AccountPlugin", "Steps": []}]}"#;
        assert_eq!(plan(&remote, json, false).await.count(RecordKind::Step), 1);
    }

    #[tokio::test]
    async fn test_unregistered_assembly_plans_nothing() {
        let store = InMemoryStore::new();
        let desired = mapping::parse_str(MAPPING).unwrap();
        let plan = plan_deletions(&store, &mut LookupCache::new(), "Contoso.Plugins", &desired, false)
            .await
            .unwrap();
        assert!(plan.is_empty());
    }
}
