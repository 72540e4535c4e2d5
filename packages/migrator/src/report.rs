//! Per-record outcomes and the phase/run reports they fold into.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::entity::EntityType;
use crate::run::MigrationStatus;

/// Why a record was left out of the destination.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("missing {entity} mapping for source id {old_id}")]
    MissingReference { entity: EntityType, old_id: i64 },
    #[error("inactive on the source")]
    Inactive,
    #[error("unsupported legacy type {0}")]
    LegacyType(String),
    #[error("already migrated")]
    AlreadyMigrated,
}

impl SkipReason {
    pub fn missing(entity: EntityType, old_id: i64) -> Self {
        Self::MissingReference { entity, old_id }
    }
}

/// Result of migrating one source record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Created(i64),
    Updated(i64),
    Skipped(SkipReason),
    Failed(String),
}

impl RecordOutcome {
    /// Destination id when the record landed, either freshly or by update.
    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Created(id) | Self::Updated(id) => Some(*id),
            Self::Skipped(_) | Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub index: i32,
    pub name: String,
    pub created: i64,
    pub updated: i64,
    pub skipped: i64,
    pub failed: i64,
    /// Flow UUIDs excluded by policy (inactive or unsupported legacy type).
    pub skipped_flows: Vec<Uuid>,
    /// Channel UUIDs dropped because they were inactive on the source.
    pub removed_channels: Vec<Uuid>,
}

impl PhaseReport {
    pub fn new(index: i32, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            skipped_flows: Vec::new(),
            removed_channels: Vec::new(),
        }
    }

    /// Fold one record outcome into the counters.
    pub fn absorb(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Created(_) => self.created += 1,
            RecordOutcome::Updated(_) => self.updated += 1,
            RecordOutcome::Skipped(_) => self.skipped += 1,
            RecordOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn processed(&self) -> i64 {
        self.created + self.updated + self.skipped + self.failed
    }
}

/// Aggregated end-of-run summary handed back to the host and written to the
/// run log.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: MigrationStatus,
    pub started_on: DateTime<Utc>,
    pub finished_on: Option<DateTime<Utc>>,
    pub phases: Vec<PhaseReport>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: MigrationStatus::Processing,
            started_on: Utc::now(),
            finished_on: None,
            phases: Vec::new(),
            error: None,
        }
    }

    pub fn push(&mut self, phase: PhaseReport) {
        self.phases.push(phase);
    }

    pub fn finish(&mut self, status: MigrationStatus) {
        self.status = status;
        self.finished_on = Some(Utc::now());
    }

    pub fn skipped_flows(&self) -> Vec<Uuid> {
        self.phases
            .iter()
            .flat_map(|p| p.skipped_flows.iter().copied())
            .collect()
    }

    pub fn removed_channels(&self) -> Vec<Uuid> {
        self.phases
            .iter()
            .flat_map(|p| p.removed_channels.iter().copied())
            .collect()
    }

    pub fn created_total(&self) -> i64 {
        self.phases.iter().map(|p| p.created).sum()
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_tallies_each_outcome() {
        let mut report = PhaseReport::new(3, "contacts");
        report.absorb(&RecordOutcome::Created(10));
        report.absorb(&RecordOutcome::Created(11));
        report.absorb(&RecordOutcome::Updated(10));
        report.absorb(&RecordOutcome::Skipped(SkipReason::missing(
            EntityType::Contact,
            44,
        )));
        report.absorb(&RecordOutcome::Failed("boom".to_string()));

        assert_eq!(report.created, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.processed(), 5);
    }

    #[test]
    fn run_report_collects_operator_lists() {
        let mut run = RunReport::new(Uuid::new_v4());

        let mut channels = PhaseReport::new(1, "channels");
        let dead_channel = Uuid::new_v4();
        channels.removed_channels.push(dead_channel);
        run.push(channels);

        let mut flows = PhaseReport::new(12, "flows");
        let ussd_flow = Uuid::new_v4();
        flows.skipped_flows.push(ussd_flow);
        run.push(flows);

        assert_eq!(run.removed_channels(), vec![dead_channel]);
        assert_eq!(run.skipped_flows(), vec![ussd_flow]);
        assert!(run.phase("channels").is_some());
        assert!(run.phase("links").is_none());
    }

    #[test]
    fn skip_reason_display() {
        let reason = SkipReason::missing(EntityType::Channel, 7);
        assert_eq!(reason.to_string(), "missing channel mapping for source id 7");
    }
}
