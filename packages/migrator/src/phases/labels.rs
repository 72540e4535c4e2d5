//! Phase 8: message label folders and labels.

use anyhow::Result;
use async_trait::async_trait;

use super::PhaseMigrator;
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome};
use crate::warehouse::NewLabel;

pub struct LabelPhase;

#[async_trait]
impl PhaseMigrator for LabelPhase {
    fn index(&self) -> i32 {
        8
    }

    fn name(&self) -> &'static str {
        "labels"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[0]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let dest = ctx.dest_org();

        // Folders first so labels can hang off them.
        for folder in ctx.source.label_folders(ctx.source_org()).await? {
            let upserted = ctx.warehouse.upsert_label_folder(dest, &folder.name).await?;
            ctx.record(EntityType::Label, folder.id, upserted.id).await?;
            report.absorb(&RecordOutcome::from(upserted));
        }

        for label in ctx.source.labels(ctx.source_org()).await? {
            let folder_id = ctx.resolve_opt(EntityType::Label, label.folder_id).await?;
            let upserted = ctx
                .warehouse
                .upsert_label(
                    dest,
                    &NewLabel {
                        uuid: label.uuid,
                        name: label.name.clone(),
                        folder_id,
                    },
                )
                .await?;
            ctx.record(EntityType::Label, label.id, upserted.id).await?;
            report.absorb(&RecordOutcome::from(upserted));
        }

        Ok(report)
    }
}
