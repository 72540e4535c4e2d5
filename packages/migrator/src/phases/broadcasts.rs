//! Phase 7: broadcasts and their recipient sets.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome};
use crate::warehouse::NewBroadcast;

pub struct BroadcastPhase;

#[async_trait]
impl PhaseMigrator for BroadcastPhase {
    fn index(&self) -> i32 {
        7
    }

    fn name(&self) -> &'static str {
        "broadcasts"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[3, 4, 6]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        ctx.warehouse.deactivate_broadcasts(dest).await?;

        for broadcast in ctx.source.broadcasts(ctx.source_org()).await? {
            let channel_id = ctx
                .resolve_opt(EntityType::Channel, broadcast.channel_id)
                .await?;
            let schedule_id = ctx
                .resolve_opt(EntityType::Schedule, broadcast.schedule_id)
                .await?;
            let parent_id = ctx
                .resolve_opt(EntityType::Broadcast, broadcast.parent_id)
                .await?;

            let new_broadcast = ctx
                .warehouse
                .create_broadcast(
                    dest,
                    &NewBroadcast {
                        channel_id,
                        schedule_id,
                        parent_id,
                        status: destination_status(&broadcast.status).to_string(),
                        translations: broadcast.translations.clone(),
                        base_language: broadcast
                            .base_language
                            .clone()
                            .unwrap_or_else(|| "base".to_string()),
                        is_active: broadcast.is_active,
                        media: broadcast.media.clone(),
                        send_all: broadcast.send_all,
                        metadata: broadcast.metadata.clone(),
                        created_on: broadcast.created_on,
                        modified_on: broadcast.modified_on,
                    },
                )
                .await?;
            ctx.record(EntityType::Broadcast, broadcast.id, new_broadcast).await?;
            report.absorb(&RecordOutcome::Created(new_broadcast));

            for row in ctx.source.broadcast_contacts(broadcast.id).await? {
                if let Some(contact) = ctx.resolve(EntityType::Contact, row.contact_id).await? {
                    ctx.warehouse
                        .add_broadcast_contact(new_broadcast, contact)
                        .await?;
                }
            }
            for row in ctx.source.broadcast_groups(broadcast.id).await? {
                if let Some(group) = ctx.resolve(EntityType::ContactGroup, row.group_id).await? {
                    ctx.warehouse.add_broadcast_group(new_broadcast, group).await?;
                }
            }
            for row in ctx.source.broadcast_urns(broadcast.id).await? {
                if let Some(urn) = ctx.resolve(EntityType::ContactUrn, row.urn_id).await? {
                    ctx.warehouse.add_broadcast_urn(new_broadcast, urn).await?;
                }
            }
        }

        Ok(report)
    }
}

/// Queued sends will never go out from the old deployment; they land as sent
/// so nothing re-fires.
fn destination_status(status: &str) -> &str {
    match status {
        "Q" => "S",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_broadcasts_arrive_as_sent() {
        assert_eq!(destination_status("Q"), "S");
        assert_eq!(destination_status("S"), "S");
        assert_eq!(destination_status("F"), "F");
    }
}
