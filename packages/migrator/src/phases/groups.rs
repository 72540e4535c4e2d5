//! Phase 4: contact groups and static memberships.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome};
use crate::warehouse::NewGroup;

pub struct GroupPhase;

#[async_trait]
impl PhaseMigrator for GroupPhase {
    fn index(&self) -> i32 {
        4
    }

    fn name(&self) -> &'static str {
        "groups"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[3]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        if ctx.window().is_open() {
            ctx.warehouse.release_groups(dest).await?;
        }

        for group in ctx.source.groups(ctx.source_org(), ctx.window()).await? {
            let upserted = ctx
                .warehouse
                .upsert_group(
                    dest,
                    &NewGroup {
                        uuid: group.uuid,
                        name: group.name.clone(),
                        query: group.query.clone(),
                    },
                )
                .await?;
            ctx.record(EntityType::ContactGroup, group.id, upserted.id).await?;
            report.absorb(&RecordOutcome::from(upserted));

            // Dynamic groups rebuild membership from their query downstream.
            if group.is_dynamic() {
                continue;
            }
            for member in ctx.source.group_members(group.id).await? {
                let Some(contact) = ctx.resolve(EntityType::Contact, member.contact_id).await?
                else {
                    continue;
                };
                ctx.warehouse.add_group_member(upserted.id, contact).await?;
            }
        }

        Ok(report)
    }
}
