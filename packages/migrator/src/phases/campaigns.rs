//! Phase 15: campaigns, their events and pending fires.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome, SkipReason};
use crate::source::CampaignRow;
use crate::warehouse::{NewCampaign, NewCampaignEvent, NewEventFire};

pub struct CampaignPhase;

#[async_trait]
impl PhaseMigrator for CampaignPhase {
    fn index(&self) -> i32 {
        15
    }

    fn name(&self) -> &'static str {
        "campaigns"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[2, 3, 4, 12]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        for campaign in ctx.source.campaigns(ctx.source_org()).await? {
            let Some(group) = ctx
                .resolve(EntityType::ContactGroup, campaign.group_id)
                .await?
            else {
                report.absorb(&RecordOutcome::Skipped(SkipReason::missing(
                    EntityType::ContactGroup,
                    campaign.group_id,
                )));
                continue;
            };

            let outcome = match ctx.warehouse.find_campaign(dest, campaign.uuid).await? {
                Some(existing) => {
                    ctx.warehouse
                        .update_campaign(dest, existing, &campaign.name, group)
                        .await?;
                    RecordOutcome::Updated(existing)
                }
                None => {
                    let created = ctx
                        .warehouse
                        .create_campaign(
                            dest,
                            &NewCampaign {
                                uuid: campaign.uuid,
                                name: campaign.name.clone(),
                                group_id: group,
                                created_on: campaign.created_on,
                                modified_on: campaign.modified_on,
                            },
                        )
                        .await?;
                    RecordOutcome::Created(created)
                }
            };
            let Some(new_campaign) = outcome.id() else {
                report.absorb(&outcome);
                continue;
            };
            ctx.record(EntityType::Campaign, campaign.id, new_campaign).await?;
            report.absorb(&outcome);

            self.copy_events(ctx, &mut report, &campaign, new_campaign).await?;
        }

        Ok(report)
    }
}

impl CampaignPhase {
    async fn copy_events(
        &self,
        ctx: &PhaseContext<'_>,
        report: &mut PhaseReport,
        campaign: &CampaignRow,
        new_campaign: i64,
    ) -> Result<()> {
        for event in ctx.source.campaign_events(campaign.id).await? {
            // Events schedule off a contact field and fire a flow; both must
            // have made it across.
            let Some(relative_to) = ctx
                .resolve(EntityType::ContactField, event.relative_to_id)
                .await?
            else {
                report.absorb(&RecordOutcome::Skipped(SkipReason::missing(
                    EntityType::ContactField,
                    event.relative_to_id,
                )));
                continue;
            };
            let Some(flow) = ctx.resolve(EntityType::Flow, event.flow_id).await? else {
                report.absorb(&RecordOutcome::Skipped(SkipReason::missing(
                    EntityType::Flow,
                    event.flow_id,
                )));
                continue;
            };

            let outcome = match ctx
                .warehouse
                .find_campaign_event(new_campaign, event.uuid)
                .await?
            {
                Some(existing) => RecordOutcome::Updated(existing),
                None => {
                    let created = ctx
                        .warehouse
                        .create_campaign_event(
                            new_campaign,
                            &NewCampaignEvent {
                                uuid: event.uuid,
                                event_type: event.event_type.clone(),
                                relative_to_id: relative_to,
                                offset: event.offset,
                                unit: event.unit.clone(),
                                flow_id: flow,
                                message: event.message.clone(),
                                delivery_hour: event.delivery_hour,
                                embedded_data: event.embedded_data.clone(),
                                created_on: event.created_on,
                                modified_on: event.modified_on,
                            },
                        )
                        .await?;
                    RecordOutcome::Created(created)
                }
            };
            let Some(new_event) = outcome.id() else {
                report.absorb(&outcome);
                continue;
            };
            ctx.record(EntityType::CampaignEvent, event.id, new_event).await?;
            report.absorb(&outcome);

            for fire in ctx.source.event_fires(event.id).await? {
                let Some(contact) = ctx.resolve(EntityType::Contact, fire.contact_id).await?
                else {
                    continue;
                };
                ctx.warehouse
                    .create_event_fire(
                        new_event,
                        &NewEventFire {
                            contact_id: contact,
                            scheduled: fire.scheduled,
                            fired: fire.fired,
                        },
                    )
                    .await?;
            }
        }
        Ok(())
    }
}
