use plugreg_storage::RecordKind;
use serde::Serialize;

use crate::handles::Outcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Counts of what a run wrote, per entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub assemblies: EntityCounts,
    pub plugin_types: EntityCounts,
    pub steps: EntityCounts,
    pub images: EntityCounts,
    pub associations: usize,
}

impl RunSummary {
    pub fn counts(&self, kind: RecordKind) -> Option<&EntityCounts> {
        match kind {
            RecordKind::PluginAssembly => Some(&self.assemblies),
            RecordKind::PluginType => Some(&self.plugin_types),
            RecordKind::Step => Some(&self.steps),
            RecordKind::StepImage => Some(&self.images),
            _ => None,
        }
    }

    fn counts_mut(&mut self, kind: RecordKind) -> Option<&mut EntityCounts> {
        match kind {
            RecordKind::PluginAssembly => Some(&mut self.assemblies),
            RecordKind::PluginType => Some(&mut self.plugin_types),
            RecordKind::Step => Some(&mut self.steps),
            RecordKind::StepImage => Some(&mut self.images),
            _ => None,
        }
    }

    pub(crate) fn record_upsert(&mut self, kind: RecordKind, outcome: Outcome) {
        if let Some(counts) = self.counts_mut(kind) {
            match outcome {
                Outcome::Created => counts.created += 1,
                Outcome::Updated => counts.updated += 1,
            }
        }
    }

    pub(crate) fn record_delete(&mut self, kind: RecordKind) {
        if let Some(counts) = self.counts_mut(kind) {
            counts.deleted += 1;
        }
    }

    /// Rows in tree order, labelled for display.
    pub fn rows(&self) -> [(&'static str, &EntityCounts); 4] {
        [
            ("Assembly", &self.assemblies),
            ("Type", &self.plugin_types),
            ("Step", &self.steps),
            ("Image", &self.images),
        ]
    }

    pub fn total_writes(&self) -> usize {
        self.rows().iter().map(|(_, c)| c.total()).sum::<usize>() + self.associations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut summary = RunSummary::default();
        summary.record_upsert(RecordKind::PluginAssembly, Outcome::Updated);
        summary.record_upsert(RecordKind::Step, Outcome::Created);
        summary.record_upsert(RecordKind::Step, Outcome::Created);
        summary.record_delete(RecordKind::StepImage);
        summary.record_upsert(RecordKind::SdkMessage, Outcome::Created);

        assert_eq!(summary.assemblies.updated, 1);
        assert_eq!(summary.steps.created, 2);
        assert_eq!(summary.counts(RecordKind::StepImage).unwrap().deleted, 1);
        assert!(summary.counts(RecordKind::SdkMessage).is_none());
        assert_eq!(summary.total_writes(), 4);
    }
}
