//! Top-level registration run.
//!
//! A run validates local preconditions, builds the full plan (introspection,
//! mapping, split binaries, deletion sweep) and only then writes: every
//! deletion first, then the upsert walk Assembly → Type → Step → Image. The
//! first failing call aborts the run.

use std::sync::Arc;

use plugreg_core::{PluginAssemblyDef, PluginTypeDef};
use plugreg_storage::{DynStore, RecordKind};

use crate::error::{RegistrationError, Result};
use crate::handles::{AssemblyRef, PluginTypeRef};
use crate::introspect::{AssemblyIntrospector, FileIntrospector};
use crate::loader::load_desired;
use crate::options::{RegistrationMode, RegistrationOptions};
use crate::plan::{RegistrationPlan, UpsertPlan};
use crate::progress::{ProgressReporter, RegistrationEvent, SkipReason, TracingReporter};
use crate::reconcile::{LookupCache, Reconciler};
use crate::split::locate_split_assemblies;
use crate::summary::RunSummary;
use crate::sweep::{DeletionPlan, plan_deletions};

pub struct Registrar {
    store: DynStore,
    introspector: Arc<dyn AssemblyIntrospector>,
    reporter: Arc<dyn ProgressReporter>,
}

impl Registrar {
    pub fn new(store: DynStore) -> Self {
        Self {
            store,
            introspector: Arc::new(FileIntrospector),
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_introspector(mut self, introspector: Arc<dyn AssemblyIntrospector>) -> Self {
        self.introspector = introspector;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn store(&self) -> &DynStore {
        &self.store
    }

    /// Builds the plan. Reads the remote side only in delsert mode.
    pub async fn plan(&self, options: &RegistrationOptions) -> Result<RegistrationPlan> {
        options.validate()?;

        let desired = load_desired(
            self.introspector.as_ref(),
            &options.assembly_path,
            options.mapping_path.as_deref(),
            options.use_split_assembly,
        )?;

        let upserts = match (&options.project_file_path, options.use_split_assembly) {
            (Some(project_file), true) => {
                let assemblies = locate_split_assemblies(
                    self.introspector.as_ref(),
                    &desired.assembly,
                    project_file,
                    desired.tree.types(),
                )?;
                UpsertPlan::split(assemblies, desired.tree.types())
            }
            (None, true) => {
                return Err(RegistrationError::precondition(
                    "split assembly registration requires a project file path",
                ));
            }
            (_, false) => UpsertPlan::shared(desired.assembly.clone(), desired.tree.types()),
        };

        let mut lookups = LookupCache::new();
        let deletions = match options.mode {
            RegistrationMode::Delsert => {
                plan_deletions(
                    self.store.as_ref(),
                    &mut lookups,
                    &desired.assembly.name,
                    &desired.tree,
                    options.is_workflow_activity_assembly,
                )
                .await?
            }
            RegistrationMode::Upsert => DeletionPlan::default(),
        };

        tracing::info!(
            backend = self.store.backend_name(),
            mode = %options.mode,
            assembly = %desired.assembly.name,
            deletions = deletions.len(),
            units = upserts.units().len(),
            plugin_types = upserts.type_count(),
            steps = upserts.step_count(),
            images = upserts.image_count(),
            "Planned registration"
        );
        self.reporter.report(&RegistrationEvent::Planned {
            deletions: deletions.len(),
            units: upserts.units().len(),
        });

        Ok(RegistrationPlan {
            mode: options.mode,
            desired: desired.tree,
            is_workflow_activity_assembly: options.is_workflow_activity_assembly,
            use_split_assembly: options.use_split_assembly,
            solution_name: options.solution().map(str::to_string),
            deletions,
            upserts,
            lookups,
        })
    }

    /// Executes a plan: deletions, then upserts.
    pub async fn execute(&self, plan: RegistrationPlan) -> Result<RunSummary> {
        let RegistrationPlan {
            desired,
            is_workflow_activity_assembly,
            use_split_assembly,
            solution_name,
            deletions,
            upserts,
            lookups,
            ..
        } = plan;

        let mut reconciler = Reconciler::new(self.store.as_ref(), self.reporter.as_ref())
            .with_solution(solution_name.as_deref())
            .with_lookups(lookups);

        for deletion in deletions.iter() {
            reconciler
                .delete(deletion.kind, deletion.id, &deletion.key)
                .await?;
        }

        // A requested record id can only name one of the split assemblies.
        let assembly_def = if use_split_assembly {
            PluginAssemblyDef {
                id: None,
                ..desired.clone()
            }
        } else {
            desired.clone()
        };

        for unit in upserts.units() {
            let assembly = reconciler
                .upsert_assembly(&assembly_def, &unit.assembly)
                .await?
                .into_handle();

            if !desired.has_type_detail() {
                reconciler.skipped(
                    RecordKind::PluginAssembly,
                    assembly.name(),
                    SkipReason::NoTypeDetail,
                );
                continue;
            }

            for plugin_type in &unit.types {
                register_type(
                    &mut reconciler,
                    &assembly,
                    plugin_type,
                    is_workflow_activity_assembly,
                )
                .await?;
            }
        }

        let summary = reconciler.into_summary();
        tracing::info!(
            writes = summary.total_writes(),
            associations = summary.associations,
            "Registration complete"
        );
        Ok(summary)
    }

    pub async fn run(&self, options: &RegistrationOptions) -> Result<RunSummary> {
        let plan = self.plan(options).await?;
        self.execute(plan).await
    }
}

async fn register_type(
    reconciler: &mut Reconciler<'_>,
    assembly: &AssemblyRef,
    desired: &PluginTypeDef,
    is_workflow_activity: bool,
) -> Result<PluginTypeRef> {
    let plugin_type = reconciler
        .upsert_type(assembly, desired, is_workflow_activity)
        .await?
        .into_handle();

    if !plugin_type.accepts_steps() {
        if !desired.steps().is_empty() {
            reconciler.skipped(
                RecordKind::PluginType,
                plugin_type.type_name(),
                SkipReason::WorkflowActivity,
            );
        }
        return Ok(plugin_type);
    }
    if !desired.has_step_detail() {
        reconciler.skipped(
            RecordKind::PluginType,
            plugin_type.type_name(),
            SkipReason::NoStepDetail,
        );
        return Ok(plugin_type);
    }

    for step in desired.steps() {
        let step_ref = reconciler
            .upsert_step(&plugin_type, step)
            .await?
            .into_handle();
        for image in step.images() {
            reconciler.upsert_image(&step_ref, image).await?;
        }
    }
    Ok(plugin_type)
}
