//! Two-phase registration plan: deletions first, then upserts.

use plugreg_core::{PluginAssemblyDef, PluginTypeDef};
use serde::Serialize;

use crate::introspect::AssemblyInfo;
use crate::options::RegistrationMode;
use crate::reconcile::LookupCache;
use crate::sweep::DeletionPlan;

/// One assembly record and the types registered under it.
#[derive(Debug, Clone, Serialize)]
pub struct UpsertUnit {
    pub assembly: AssemblyInfo,
    pub types: Vec<PluginTypeDef>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct UpsertPlan {
    units: Vec<UpsertUnit>,
}

impl UpsertPlan {
    /// One shared assembly owning every declared type.
    pub fn shared(assembly: AssemblyInfo, types: &[PluginTypeDef]) -> Self {
        Self {
            units: vec![UpsertUnit {
                assembly,
                types: types.to_vec(),
            }],
        }
    }

    /// One assembly per type, in declared order.
    pub fn split(assemblies: Vec<AssemblyInfo>, types: &[PluginTypeDef]) -> Self {
        Self {
            units: assemblies
                .into_iter()
                .zip(types.iter().cloned())
                .map(|(assembly, plugin_type)| UpsertUnit {
                    assembly,
                    types: vec![plugin_type],
                })
                .collect(),
        }
    }

    pub fn units(&self) -> &[UpsertUnit] {
        &self.units
    }

    pub fn type_count(&self) -> usize {
        self.units.iter().map(|u| u.types.len()).sum()
    }

    pub fn step_count(&self) -> usize {
        self.units
            .iter()
            .flat_map(|u| &u.types)
            .map(|t| t.steps().len())
            .sum()
    }

    pub fn image_count(&self) -> usize {
        self.units
            .iter()
            .flat_map(|u| &u.types)
            .flat_map(|t| t.steps())
            .map(|s| s.images().len())
            .sum()
    }
}

/// Everything a run will do, computed before the first write.
#[derive(Debug, Serialize)]
pub struct RegistrationPlan {
    pub mode: RegistrationMode,
    pub desired: PluginAssemblyDef,
    pub is_workflow_activity_assembly: bool,
    pub use_split_assembly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_name: Option<String>,
    pub deletions: DeletionPlan,
    pub upserts: UpsertPlan,
    #[serde(skip)]
    pub(crate) lookups: LookupCache,
}

impl RegistrationPlan {
    /// True when executing the plan issues no delete.
    pub fn is_upsert_only(&self) -> bool {
        self.deletions.is_empty()
    }
}
