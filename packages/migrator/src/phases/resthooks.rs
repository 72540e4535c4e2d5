//! Phase 13: resthooks and their subscribers.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome};
use crate::warehouse::{NewResthook, NewSubscriber};

pub struct ResthookPhase;

#[async_trait]
impl PhaseMigrator for ResthookPhase {
    fn index(&self) -> i32 {
        13
    }

    fn name(&self) -> &'static str {
        "resthooks"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[0]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        ctx.warehouse.release_resthooks(dest).await?;

        for resthook in ctx.source.resthooks(ctx.source_org()).await? {
            let new_resthook = ctx
                .warehouse
                .create_resthook(
                    dest,
                    &NewResthook {
                        slug: resthook.slug.clone(),
                        created_on: resthook.created_on,
                        modified_on: resthook.modified_on,
                    },
                )
                .await?;
            ctx.record(EntityType::Resthook, resthook.id, new_resthook).await?;
            report.absorb(&RecordOutcome::Created(new_resthook));

            for subscriber in ctx.source.resthook_subscribers(resthook.id).await? {
                ctx.warehouse
                    .create_resthook_subscriber(
                        new_resthook,
                        &NewSubscriber {
                            target_url: subscriber.target_url.clone(),
                            created_on: subscriber.created_on,
                            modified_on: subscriber.modified_on,
                        },
                    )
                    .await?;
            }
        }

        Ok(report)
    }
}
