//! Phase 16: triggers.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome, SkipReason};
use crate::warehouse::NewTrigger;

pub struct TriggerPhase;

#[async_trait]
impl PhaseMigrator for TriggerPhase {
    fn index(&self) -> i32 {
        16
    }

    fn name(&self) -> &'static str {
        "triggers"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[1, 6, 12]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        ctx.warehouse.release_triggers(dest).await?;

        for trigger in ctx.source.triggers(ctx.source_org()).await? {
            // A trigger without a runnable flow does nothing downstream.
            let Some(flow_id) = ctx.resolve_opt(EntityType::Flow, trigger.flow_id).await? else {
                report.absorb(&RecordOutcome::Skipped(SkipReason::missing(
                    EntityType::Flow,
                    trigger.flow_id.unwrap_or_default(),
                )));
                continue;
            };
            let channel_id = ctx
                .resolve_opt(EntityType::Channel, trigger.channel_id)
                .await?;
            let schedule_id = ctx
                .resolve_opt(EntityType::Schedule, trigger.schedule_id)
                .await?;

            let new_trigger = ctx
                .warehouse
                .create_trigger(
                    dest,
                    &NewTrigger {
                        trigger_type: trigger.trigger_type.clone(),
                        keyword: trigger.keyword.clone(),
                        referrer_id: trigger.referrer_id.clone(),
                        match_type: trigger.match_type.clone(),
                        flow_id,
                        channel_id,
                        schedule_id,
                        embedded_data: trigger.embedded_data.clone(),
                        created_on: trigger.created_on,
                        modified_on: trigger.modified_on,
                    },
                )
                .await?;
            ctx.record(EntityType::Trigger, trigger.id, new_trigger).await?;
            report.absorb(&RecordOutcome::Created(new_trigger));

            for row in ctx.source.trigger_contacts(trigger.id).await? {
                if let Some(contact) = ctx.resolve(EntityType::Contact, row.contact_id).await? {
                    ctx.warehouse.add_trigger_contact(new_trigger, contact).await?;
                }
            }
            for row in ctx.source.trigger_groups(trigger.id).await? {
                if let Some(group) = ctx.resolve(EntityType::ContactGroup, row.group_id).await? {
                    ctx.warehouse.add_trigger_group(new_trigger, group).await?;
                }
            }
        }

        Ok(report)
    }
}
