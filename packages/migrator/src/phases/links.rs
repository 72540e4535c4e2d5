//! Phase 17: trackable links and their click history.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome};
use crate::warehouse::{NewLink, NewLinkContact};

pub struct LinkPhase;

#[async_trait]
impl PhaseMigrator for LinkPhase {
    fn index(&self) -> i32 {
        17
    }

    fn name(&self) -> &'static str {
        "links"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[3]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        ctx.warehouse.delete_links(dest).await?;

        for link in ctx.source.links(ctx.source_org()).await? {
            let new_link = ctx
                .warehouse
                .create_link(
                    dest,
                    &NewLink {
                        uuid: link.uuid,
                        name: link.name.clone(),
                        destination: link.destination.clone(),
                        clicks_count: link.clicks_count,
                        created_on: link.created_on,
                        modified_on: link.modified_on,
                    },
                )
                .await?;
            ctx.record(EntityType::Link, link.id, new_link).await?;
            report.absorb(&RecordOutcome::Created(new_link));

            for click in ctx.source.link_contacts(link.id).await? {
                let Some(contact) = ctx.resolve(EntityType::Contact, click.contact_id).await?
                else {
                    continue;
                };
                ctx.warehouse
                    .create_link_contact(
                        new_link,
                        &NewLinkContact {
                            contact_id: contact,
                            created_on: click.created_on,
                            modified_on: click.modified_on,
                        },
                    )
                    .await?;
            }
        }

        Ok(report)
    }
}
