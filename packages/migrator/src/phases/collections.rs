//! Phase 18: gift-card and lookup collections on the document server.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parse::models::SchemaUpdate;
use serde_json::Value;

use super::PhaseMigrator;
use crate::collections::{
    collection_class_name, data_fields, enqueue_import, format_cell, gift_card_schema,
    header_for, CollectionKind, CollectionStore, ImportJob,
};
use crate::engine::PhaseContext;
use crate::report::{PhaseReport, RecordOutcome};
use crate::source::paging::{page_plan, PAGE_SIZE};

/// Org config keys listing each kind's collections.
const KINDS: [(CollectionKind, &str); 2] = [
    (CollectionKind::GiftCard, "GIFTCARDS"),
    (CollectionKind::Lookup, "LOOKUPS"),
];

pub struct CollectionPhase;

#[async_trait]
impl PhaseMigrator for CollectionPhase {
    fn index(&self) -> i32 {
        18
    }

    fn name(&self) -> &'static str {
        "collections"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[0]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());

        let (Some(source_store), Some(dest_store)) =
            (&ctx.source_collections, &ctx.dest_collections)
        else {
            ctx.log
                .info("document servers not configured, collections skipped");
            return Ok(report);
        };
        let (Some(source_server), Some(dest_server)) = (
            ctx.options.source_server_name.as_deref(),
            ctx.options.dest_server_name.as_deref(),
        ) else {
            ctx.log
                .info("document server names not configured, collections skipped");
            return Ok(report);
        };

        let slug = ctx
            .org
            .slug
            .clone()
            .unwrap_or_else(|| slug::slugify(&ctx.org.name));
        let config = ctx.org.config_json();

        for (kind, key) in KINDS {
            let collections: Vec<String> = config
                .get(key)
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            for collection in collections {
                // A failed collection never sinks the run; the others still
                // sync.
                match self
                    .sync_collection(
                        ctx,
                        kind,
                        &collection,
                        source_store,
                        dest_store,
                        source_server,
                        dest_server,
                        &slug,
                    )
                    .await
                {
                    Ok(queued) => report.absorb(&RecordOutcome::Created(queued as i64)),
                    Err(err) => {
                        ctx.log
                            .error(format!("collection {collection} failed to sync: {err:#}"));
                        report.absorb(&RecordOutcome::Failed(format!("{err:#}")));
                    }
                }
            }
        }

        Ok(report)
    }
}

impl CollectionPhase {
    /// Export the source class and queue its rows for import into the
    /// destination class, resetting the destination first. Returns the number
    /// of rows queued.
    #[allow(clippy::too_many_arguments)]
    async fn sync_collection(
        &self,
        ctx: &PhaseContext<'_>,
        kind: CollectionKind,
        collection: &str,
        source_store: &Arc<dyn CollectionStore>,
        dest_store: &Arc<dyn CollectionStore>,
        source_server: &str,
        dest_server: &str,
        slug: &str,
    ) -> Result<usize> {
        let source_class =
            collection_class_name(source_server, slug, ctx.source_org(), kind, collection);
        let dest_class =
            collection_class_name(dest_server, slug, ctx.dest_org(), kind, collection);

        let Some(schema) = source_store.schema(&source_class).await? else {
            ctx.log.warn(format!(
                "collection {collection} has no class {source_class} on the source, skipped"
            ));
            return Ok(0);
        };

        let fields = data_fields(&schema);
        let headers: Vec<String> = fields
            .iter()
            .map(|(name, field_type)| header_for(name, field_type))
            .collect();

        let day_first = ctx.org.is_day_first();
        let total = source_store.count(&source_class).await?;
        let mut rows: Vec<Vec<Value>> = Vec::with_capacity(total as usize);
        for skip in page_plan(total, PAGE_SIZE) {
            for object in source_store.rows(&source_class, PAGE_SIZE, skip).await? {
                rows.push(
                    fields
                        .iter()
                        .map(|(name, _)| format_cell(object.get(name), day_first))
                        .collect(),
                );
            }
        }

        self.reset_destination(kind, dest_store, &dest_class).await?;

        let queued = rows.len();
        enqueue_import(
            dest_store.clone(),
            ctx.notifier.clone(),
            ImportJob {
                org: ctx.dest_org(),
                collection: collection.to_string(),
                class_name: dest_class.clone(),
                headers,
                rows,
                day_first,
            },
        );
        ctx.log.info(format!(
            "queued {queued} rows of collection {collection} into {dest_class}"
        ));
        Ok(queued)
    }

    /// Clear the destination class so the import starts from nothing.
    /// Lookups drop their old columns and let the import rebuild them from
    /// headers; gift cards always get the fixed code/order shape.
    async fn reset_destination(
        &self,
        kind: CollectionKind,
        dest_store: &Arc<dyn CollectionStore>,
        dest_class: &str,
    ) -> Result<()> {
        let existing = dest_store.schema(dest_class).await?;
        match kind {
            CollectionKind::Lookup => match existing {
                Some(schema) => {
                    dest_store.purge(dest_class).await?;
                    let mut deletion = SchemaUpdate::new(dest_class);
                    for (name, _) in data_fields(&schema) {
                        deletion = deletion.without_field(&name);
                    }
                    if !deletion.is_empty() {
                        dest_store.update_schema(&deletion).await?;
                    }
                }
                None => {
                    dest_store
                        .create_schema(&SchemaUpdate::new(dest_class))
                        .await?;
                }
            },
            CollectionKind::GiftCard => match existing {
                Some(_) => {
                    dest_store.purge(dest_class).await?;
                    dest_store
                        .update_schema(&gift_card_schema(dest_class))
                        .await?;
                }
                None => {
                    dest_store
                        .create_schema(&gift_card_schema(dest_class))
                        .await?;
                }
            },
        }
        Ok(())
    }
}
