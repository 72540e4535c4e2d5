//! Phase 11: flow labels.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome};
use crate::warehouse::NewFlowLabel;

pub struct FlowLabelPhase;

#[async_trait]
impl PhaseMigrator for FlowLabelPhase {
    fn index(&self) -> i32 {
        11
    }

    fn name(&self) -> &'static str {
        "flow labels"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[0]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        // Parents sort before children in the source read, so resolving the
        // parent by the time a child arrives is safe.
        for label in ctx.source.flow_labels(ctx.source_org()).await? {
            let parent_id = ctx
                .resolve_opt(EntityType::FlowLabel, label.parent_id)
                .await?;
            let outcome = match ctx.warehouse.find_flow_label(dest, label.uuid).await? {
                Some(existing) => {
                    ctx.warehouse
                        .update_flow_label(dest, existing, &label.name, parent_id)
                        .await?;
                    RecordOutcome::Updated(existing)
                }
                None => {
                    let created = ctx
                        .warehouse
                        .create_flow_label(
                            dest,
                            &NewFlowLabel {
                                uuid: label.uuid,
                                name: label.name.clone(),
                                parent_id,
                            },
                        )
                        .await?;
                    RecordOutcome::Created(created)
                }
            };
            if let Some(new_label) = outcome.id() {
                ctx.record(EntityType::FlowLabel, label.id, new_label).await?;
            }
            report.absorb(&outcome);
        }

        Ok(report)
    }
}
