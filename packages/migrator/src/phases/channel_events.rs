//! Phase 5: channel events (missed calls, referrals and the like).

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome, SkipReason};
use crate::warehouse::NewChannelEvent;

pub struct ChannelEventPhase;

#[async_trait]
impl PhaseMigrator for ChannelEventPhase {
    fn index(&self) -> i32 {
        5
    }

    fn name(&self) -> &'static str {
        "channel events"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[1, 3]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        if ctx.window().is_open() {
            ctx.warehouse.clear_channel_events(dest).await?;
        }

        for event in ctx
            .source
            .channel_events(ctx.source_org(), ctx.window())
            .await?
        {
            let Some(contact) = ctx.resolve(EntityType::Contact, event.contact_id).await? else {
                report.absorb(&RecordOutcome::Skipped(SkipReason::missing(
                    EntityType::Contact,
                    event.contact_id,
                )));
                continue;
            };
            let Some(channel) = ctx.resolve(EntityType::Channel, event.channel_id).await? else {
                report.absorb(&RecordOutcome::Skipped(SkipReason::missing(
                    EntityType::Channel,
                    event.channel_id,
                )));
                continue;
            };
            let contact_urn_id = ctx
                .resolve_opt(EntityType::ContactUrn, event.contact_urn_id)
                .await?;

            let created = ctx
                .warehouse
                .create_channel_event(
                    dest,
                    &NewChannelEvent {
                        event_type: event.event_type.clone(),
                        contact_id: contact,
                        contact_urn_id,
                        channel_id: channel,
                        extra: event.extra.clone(),
                        occurred_on: event.occurred_on,
                        created_on: event.created_on,
                    },
                )
                .await?;
            report.absorb(&RecordOutcome::Created(created));
        }

        Ok(report)
    }
}
