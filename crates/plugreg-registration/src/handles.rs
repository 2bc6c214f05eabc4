//! Resolved-parent handles.
//!
//! Each child upsert takes the handle its parent upsert returned, so a child
//! can never be written before its parent's id is known. Handles are only
//! constructed by the reconciler.

use plugreg_storage::RecordId;
use serde::Serialize;

/// Outcome of a resolve-or-create operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upserted<H> {
    Created(H),
    Updated(H),
}

impl<H> Upserted<H> {
    pub fn handle(&self) -> &H {
        match self {
            Self::Created(h) | Self::Updated(h) => h,
        }
    }

    pub fn into_handle(self) -> H {
        match self {
            Self::Created(h) | Self::Updated(h) => h,
        }
    }

    pub fn map<T>(self, f: impl FnOnce(H) -> T) -> Upserted<T> {
        match self {
            Self::Created(h) => Upserted::Created(f(h)),
            Self::Updated(h) => Upserted::Updated(f(h)),
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Created(_) => Outcome::Created,
            Self::Updated(_) => Outcome::Updated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRef {
    id: RecordId,
    name: String,
    version: String,
}

impl AssemblyRef {
    pub(crate) fn new(id: RecordId, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginTypeRef {
    id: RecordId,
    assembly: RecordId,
    type_name: String,
    is_workflow_activity: bool,
}

impl PluginTypeRef {
    pub(crate) fn new(
        id: RecordId,
        assembly: &AssemblyRef,
        type_name: impl Into<String>,
        is_workflow_activity: bool,
    ) -> Self {
        Self {
            id,
            assembly: assembly.id(),
            type_name: type_name.into(),
            is_workflow_activity,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn assembly_id(&self) -> RecordId {
        self.assembly
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Workflow activities never own steps.
    pub fn accepts_steps(&self) -> bool {
        !self.is_workflow_activity
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRef {
    id: RecordId,
    plugin_type: RecordId,
    message_name: String,
}

impl StepRef {
    pub(crate) fn new(id: RecordId, plugin_type: &PluginTypeRef, message_name: impl Into<String>) -> Self {
        Self {
            id,
            plugin_type: plugin_type.id(),
            message_name: message_name.into(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn plugin_type_id(&self) -> RecordId {
        self.plugin_type
    }

    /// Message the step subscribes to; images default their property from it.
    pub fn message_name(&self) -> &str {
        &self.message_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    id: RecordId,
    step: RecordId,
}

impl ImageRef {
    pub(crate) fn new(id: RecordId, step: &StepRef) -> Self {
        Self { id, step: step.id() }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn step_id(&self) -> RecordId {
        self.step
    }
}
