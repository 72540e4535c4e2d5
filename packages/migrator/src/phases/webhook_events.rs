//! Phase 14: webhook events and their call results.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome, SkipReason};
use crate::warehouse::{NewWebhookEvent, NewWebhookResult};

pub struct WebhookEventPhase;

#[async_trait]
impl PhaseMigrator for WebhookEventPhase {
    fn index(&self) -> i32 {
        14
    }

    fn name(&self) -> &'static str {
        "webhook events"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[13]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        ctx.warehouse.release_webhook_events(dest).await?;

        for event in ctx.source.webhook_events(ctx.source_org()).await? {
            // The destination schema requires a resthook; orphaned events are
            // not worth carrying.
            let resthook_id = match ctx
                .resolve_opt(EntityType::Resthook, event.resthook_id)
                .await?
            {
                Some(resthook) => resthook,
                None => {
                    report.absorb(&RecordOutcome::Skipped(SkipReason::missing(
                        EntityType::Resthook,
                        event.resthook_id.unwrap_or_default(),
                    )));
                    continue;
                }
            };

            let new_event = ctx
                .warehouse
                .create_webhook_event(
                    dest,
                    &NewWebhookEvent {
                        resthook_id,
                        data: event.data.clone(),
                        action: event.action.clone(),
                        created_on: event.created_on,
                    },
                )
                .await?;
            ctx.record(EntityType::WebhookEvent, event.id, new_event).await?;
            report.absorb(&RecordOutcome::Created(new_event));

            for result in ctx.source.webhook_results(event.id).await? {
                let contact_id = ctx
                    .resolve_opt(EntityType::Contact, result.contact_id)
                    .await?;
                ctx.warehouse
                    .create_webhook_result(
                        new_event,
                        &NewWebhookResult {
                            contact_id,
                            url: result.url.clone(),
                            request: result.request.clone(),
                            status_code: result.status_code,
                            body: result.body.clone(),
                            request_time: result.request_time,
                            created_on: result.created_on,
                        },
                    )
                    .await?;
            }
        }

        Ok(report)
    }
}
