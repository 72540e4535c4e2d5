//! The migration phases, in execution order.
//!
//! One module per phase. Every phase reads its slice of the legacy org,
//! translates references through the identity ledger and writes the result
//! into the warehouse, folding per-record outcomes into a [`PhaseReport`].

pub mod broadcasts;
pub mod campaigns;
pub mod channel_events;
pub mod channel_logs;
pub mod channels;
pub mod collections;
pub mod contact_fields;
pub mod contacts;
mod flow_history;
pub mod flow_labels;
pub mod flows;
pub mod groups;
pub mod labels;
pub mod links;
pub mod messages;
pub mod organization;
pub mod resthooks;
pub mod schedules;
pub mod triggers;
pub mod webhook_events;

use anyhow::Result;
use async_trait::async_trait;

use crate::engine::PhaseContext;
use crate::report::PhaseReport;

#[async_trait]
pub trait PhaseMigrator: Send + Sync {
    /// Position in the schedule, also the value `start_from` checkpoints
    /// compare against.
    fn index(&self) -> i32;
    fn name(&self) -> &'static str;
    /// Indexes of earlier phases whose ledger entries this phase resolves
    /// through.
    fn depends_on(&self) -> &'static [i32] {
        &[]
    }
    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport>;
}

/// Every phase in dependency order: an entity is migrated only after
/// everything it references.
pub fn phase_schedule() -> Vec<Box<dyn PhaseMigrator>> {
    vec![
        Box::new(organization::OrganizationPhase),
        Box::new(channels::ChannelPhase),
        Box::new(contact_fields::ContactFieldPhase),
        Box::new(contacts::ContactPhase),
        Box::new(groups::GroupPhase),
        Box::new(channel_events::ChannelEventPhase),
        Box::new(schedules::SchedulePhase),
        Box::new(broadcasts::BroadcastPhase),
        Box::new(labels::LabelPhase),
        Box::new(messages::MessagePhase),
        Box::new(channel_logs::ChannelLogPhase),
        Box::new(flow_labels::FlowLabelPhase),
        Box::new(flows::FlowPhase),
        Box::new(resthooks::ResthookPhase),
        Box::new(webhook_events::WebhookEventPhase),
        Box::new(campaigns::CampaignPhase),
        Box::new(triggers::TriggerPhase),
        Box::new(links::LinkPhase),
        Box::new(collections::CollectionPhase),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_indexes_are_contiguous() {
        let schedule = phase_schedule();
        assert_eq!(schedule.len(), 19);
        for (position, phase) in schedule.iter().enumerate() {
            assert_eq!(phase.index(), position as i32, "{} out of place", phase.name());
        }
    }

    #[test]
    fn dependencies_only_point_backwards() {
        for phase in phase_schedule() {
            for dep in phase.depends_on() {
                assert!(
                    *dep < phase.index(),
                    "{} cannot depend on later phase {dep}",
                    phase.name()
                );
            }
        }
    }
}
