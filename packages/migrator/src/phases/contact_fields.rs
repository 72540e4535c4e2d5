//! Phase 2: custom contact fields.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome};
use crate::warehouse::NewContactField;

pub struct ContactFieldPhase;

#[async_trait]
impl PhaseMigrator for ContactFieldPhase {
    fn index(&self) -> i32 {
        2
    }

    fn name(&self) -> &'static str {
        "contact fields"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[0]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        for field in ctx
            .source
            .contact_fields(ctx.source_org(), ctx.window())
            .await?
        {
            let outcome = match ctx.warehouse.find_contact_field(dest, field.uuid).await? {
                Some(existing) => {
                    ctx.warehouse
                        .update_contact_field(dest, existing, &field.key, &field.label)
                        .await?;
                    RecordOutcome::Updated(existing)
                }
                None => {
                    let created = ctx
                        .warehouse
                        .create_contact_field(
                            dest,
                            &NewContactField {
                                uuid: field.uuid,
                                key: field.key.clone(),
                                label: field.label.clone(),
                                value_type: field.value_type.clone(),
                                show_in_table: field.show_in_table.unwrap_or(false),
                            },
                        )
                        .await?;
                    RecordOutcome::Created(created)
                }
            };
            if let Some(new_field) = outcome.id() {
                ctx.record(EntityType::ContactField, field.id, new_field).await?;
            }
            report.absorb(&outcome);
        }

        Ok(report)
    }
}
