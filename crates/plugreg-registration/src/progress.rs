//! Progress events emitted while a registration run walks the tree.
//!
//! Reporting is observability only: a reporter cannot fail the run.

use std::sync::Mutex;

use plugreg_storage::{RecordId, RecordKind};

use crate::handles::Outcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationEvent {
    /// The plan has been computed; no write has been issued yet.
    Planned { deletions: usize, units: usize },
    Deleted {
        kind: RecordKind,
        id: RecordId,
        key: String,
    },
    Upserted {
        kind: RecordKind,
        id: RecordId,
        key: String,
        outcome: Outcome,
    },
    Associated {
        kind: RecordKind,
        id: RecordId,
        solution: String,
    },
    /// A subtree was deliberately left untouched.
    Skipped {
        kind: RecordKind,
        key: String,
        reason: SkipReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The mapping carries no type detail.
    NoTypeDetail,
    /// The mapping omits `Steps` for the type.
    NoStepDetail,
    /// Workflow-activity types never own steps.
    WorkflowActivity,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoTypeDetail => "no type detail in mapping",
            Self::NoStepDetail => "no step detail in mapping",
            Self::WorkflowActivity => "workflow activity",
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &RegistrationEvent);
}

/// Default reporter: every event becomes a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: &RegistrationEvent) {
        match event {
            RegistrationEvent::Planned { deletions, units } => {
                tracing::info!(deletions, units, "Registration plan ready");
            }
            RegistrationEvent::Deleted { kind, id, key } => {
                tracing::info!(kind = %kind, id = %id, key = %key, "Deleted component not in mapping");
            }
            RegistrationEvent::Upserted {
                kind,
                id,
                key,
                outcome,
            } => {
                tracing::info!(kind = %kind, id = %id, key = %key, outcome = ?outcome, "Upserted component");
            }
            RegistrationEvent::Associated { kind, id, solution } => {
                tracing::debug!(kind = %kind, id = %id, solution = %solution, "Added to solution");
            }
            RegistrationEvent::Skipped { kind, key, reason } => {
                tracing::info!(kind = %kind, key = %key, reason = reason.as_str(), "Skipped");
            }
        }
    }
}

/// Reporter that keeps every event, for assertions and summaries.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<RegistrationEvent>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RegistrationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressReporter for CollectingReporter {
    fn report(&self, event: &RegistrationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
