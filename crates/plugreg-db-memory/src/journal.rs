//! Call journal recorded by the in-memory store.

use std::fmt;

use plugreg_storage::{RecordId, RecordKind};

/// Store operation kinds, used for journaling and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Retrieve,
    Create,
    Update,
    Delete,
    AddSolutionComponent,
}

/// One call made against the store, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Retrieve {
        kind: RecordKind,
    },
    Create {
        kind: RecordKind,
        id: RecordId,
    },
    Update {
        kind: RecordKind,
        id: RecordId,
    },
    Delete {
        kind: RecordKind,
        id: RecordId,
    },
    AddSolutionComponent {
        solution: String,
        kind: RecordKind,
        id: RecordId,
    },
}

impl StoreCall {
    pub fn op(&self) -> StoreOp {
        match self {
            Self::Retrieve { .. } => StoreOp::Retrieve,
            Self::Create { .. } => StoreOp::Create,
            Self::Update { .. } => StoreOp::Update,
            Self::Delete { .. } => StoreOp::Delete,
            Self::AddSolutionComponent { .. } => StoreOp::AddSolutionComponent,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Retrieve { kind }
            | Self::Create { kind, .. }
            | Self::Update { kind, .. }
            | Self::Delete { kind, .. }
            | Self::AddSolutionComponent { kind, .. } => *kind,
        }
    }

    /// Record id the call wrote to, if it was a write.
    pub fn id(&self) -> Option<RecordId> {
        match self {
            Self::Retrieve { .. } => None,
            Self::Create { id, .. }
            | Self::Update { id, .. }
            | Self::Delete { id, .. }
            | Self::AddSolutionComponent { id, .. } => Some(*id),
        }
    }

    /// True for calls that mutate remote state.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Retrieve { .. })
    }
}

impl fmt::Display for StoreCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrieve { kind } => write!(f, "retrieve {kind}"),
            Self::Create { kind, id } => write!(f, "create {kind}/{id}"),
            Self::Update { kind, id } => write!(f, "update {kind}/{id}"),
            Self::Delete { kind, id } => write!(f, "delete {kind}/{id}"),
            Self::AddSolutionComponent { solution, kind, id } => {
                write!(f, "add {kind}/{id} to {solution}")
            }
        }
    }
}
