//! Phase 12: flows, their revisions, graph nodes, images, starts and runs.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{flow_history, PhaseMigrator};
use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{PhaseReport, RecordOutcome, SkipReason};
use crate::source::FlowRow;
use crate::warehouse::{
    FlowUpdate, NewActionSet, NewCategoryCount, NewFlow, NewFlowImage, NewFlowRevision,
    NewFlowStart, NewRuleSet,
};

/// Legacy USSD flows have no equivalent downstream.
const USSD_TYPE: &str = "U";

pub struct FlowPhase;

#[async_trait]
impl PhaseMigrator for FlowPhase {
    fn index(&self) -> i32 {
        12
    }

    fn name(&self) -> &'static str {
        "flows"
    }

    fn depends_on(&self) -> &'static [i32] {
        &[2, 3, 4, 11]
    }

    async fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.index(), self.name());
        let flows = ctx.source.flows(ctx.source_org()).await?;

        for flow in &flows {
            if flow.flow_type == USSD_TYPE {
                report.skipped_flows.push(flow.uuid);
                report.absorb(&RecordOutcome::Skipped(SkipReason::LegacyType(
                    "USSD".to_string(),
                )));
                continue;
            }
            if !flow.is_active {
                report.skipped_flows.push(flow.uuid);
                report.absorb(&RecordOutcome::Skipped(SkipReason::Inactive));
                continue;
            }
            let outcome = self.migrate_flow(ctx, &mut report, flow).await?;
            report.absorb(&outcome);
        }

        // Flow-to-flow links need every flow mapped first.
        for flow in &flows {
            let Some(new_flow) = ctx.resolve(EntityType::Flow, flow.id).await? else {
                continue;
            };
            let mut depends_on = Vec::new();
            for dep in ctx.source.flow_flow_dependencies(flow.id).await? {
                if let Some(to_flow) = ctx.resolve(EntityType::Flow, dep.to_flow_id).await? {
                    depends_on.push(to_flow);
                }
            }
            if !depends_on.is_empty() {
                ctx.warehouse
                    .link_flow_dependencies(new_flow, &depends_on)
                    .await?;
            }
        }

        Ok(report)
    }
}

impl FlowPhase {
    async fn migrate_flow(
        &self,
        ctx: &PhaseContext<'_>,
        report: &mut PhaseReport,
        flow: &FlowRow,
    ) -> Result<RecordOutcome> {
        let dest = ctx.dest_org();
        let flow_type = destination_type(&flow.flow_type).to_string();
        // Single-message flows are system flows downstream.
        let is_system = flow.flow_type == "M";
        let metadata = translate_metadata(flow.metadata_json());

        let outcome = match ctx.warehouse.find_flow(dest, flow.uuid).await? {
            Some(existing) => {
                ctx.warehouse
                    .update_flow(
                        dest,
                        existing,
                        &FlowUpdate {
                            name: flow.name.clone(),
                            flow_type,
                            is_system,
                            is_archived: flow.is_archived,
                            expires_after_minutes: flow.expires_after_minutes,
                            metadata,
                            saved_on: flow.saved_on,
                            modified_on: flow.modified_on,
                        },
                    )
                    .await?;
                RecordOutcome::Updated(existing)
            }
            None => {
                let created = ctx
                    .warehouse
                    .create_flow(
                        dest,
                        &NewFlow {
                            uuid: flow.uuid,
                            name: flow.name.clone(),
                            flow_type,
                            is_system,
                            is_archived: flow.is_archived,
                            expires_after_minutes: flow.expires_after_minutes,
                            base_language: flow.base_language.clone(),
                            ignore_triggers: flow.ignore_triggers,
                            metadata,
                            saved_on: flow.saved_on,
                            created_on: flow.created_on,
                            modified_on: flow.modified_on,
                        },
                    )
                    .await?;
                RecordOutcome::Created(created)
            }
        };
        let Some(new_flow) = outcome.id() else {
            return Ok(outcome);
        };
        ctx.record(EntityType::Flow, flow.id, new_flow).await?;

        self.copy_dependencies(ctx, flow, new_flow).await?;
        self.copy_nodes(ctx, flow, new_flow).await?;
        self.migrate_revisions(ctx, flow, new_flow, is_system).await?;
        self.copy_images(ctx, flow, new_flow).await?;
        self.copy_starts(ctx, flow, new_flow).await?;

        for run in ctx.source.flow_runs(flow.id, ctx.window()).await? {
            let outcome = flow_history::migrate_run(ctx, new_flow, &run).await?;
            report.absorb(&outcome);
        }

        Ok(outcome)
    }

    async fn copy_dependencies(
        &self,
        ctx: &PhaseContext<'_>,
        flow: &FlowRow,
        new_flow: i64,
    ) -> Result<()> {
        let mut fields = Vec::new();
        for dep in ctx.source.flow_field_dependencies(flow.id).await? {
            if let Some(field) = ctx
                .resolve(EntityType::ContactField, dep.contact_field_id)
                .await?
            {
                fields.push(field);
            }
        }
        let mut groups = Vec::new();
        for dep in ctx.source.flow_group_dependencies(flow.id).await? {
            if let Some(group) = ctx.resolve(EntityType::ContactGroup, dep.group_id).await? {
                groups.push(group);
            }
        }
        ctx.warehouse
            .set_flow_dependencies(new_flow, &fields, &groups)
            .await?;

        for link in ctx.source.flow_label_links(flow.id).await? {
            if let Some(label) = ctx.resolve(EntityType::FlowLabel, link.label_id).await? {
                ctx.warehouse.add_flow_label(new_flow, label).await?;
            }
        }
        Ok(())
    }

    /// Category counts and the legacy graph nodes copy across verbatim; the
    /// destination keeps them for reporting on pre-migration results.
    async fn copy_nodes(
        &self,
        ctx: &PhaseContext<'_>,
        flow: &FlowRow,
        new_flow: i64,
    ) -> Result<()> {
        let counts: Vec<NewCategoryCount> = ctx
            .source
            .flow_category_counts(flow.id)
            .await?
            .into_iter()
            .map(|row| NewCategoryCount {
                node_uuid: row.node_uuid,
                result_key: row.result_key,
                result_name: row.result_name,
                category_name: row.category_name,
                count: row.count,
            })
            .collect();
        ctx.warehouse.replace_category_counts(new_flow, &counts).await?;

        let action_sets: Vec<NewActionSet> = ctx
            .source
            .flow_action_sets(flow.id)
            .await?
            .into_iter()
            .map(|row| NewActionSet {
                uuid: row.uuid,
                destination: row.destination,
                destination_type: row.destination_type,
                exit_uuid: row.exit_uuid,
                actions: row.actions,
                x: row.x,
                y: row.y,
                created_on: row.created_on,
                modified_on: row.modified_on,
            })
            .collect();
        ctx.warehouse.replace_action_sets(new_flow, &action_sets).await?;

        let rule_sets: Vec<NewRuleSet> = ctx
            .source
            .flow_rule_sets(flow.id)
            .await?
            .into_iter()
            .map(|row| NewRuleSet {
                uuid: row.uuid,
                label: row.label,
                operand: row.operand,
                webhook_url: row.webhook_url,
                webhook_action: row.webhook_action,
                rules: row.rules,
                finished_key: row.finished_key,
                value_type: row.value_type,
                ruleset_type: row.ruleset_type,
                response_type: row.response_type,
                config: row.config,
                x: row.x,
                y: row.y,
                created_on: row.created_on,
                modified_on: row.modified_on,
            })
            .collect();
        ctx.warehouse.replace_rule_sets(new_flow, &rule_sets).await?;
        Ok(())
    }

    async fn migrate_revisions(
        &self,
        ctx: &PhaseContext<'_>,
        flow: &FlowRow,
        new_flow: i64,
        is_system: bool,
    ) -> Result<()> {
        ctx.warehouse.delete_revisions(new_flow).await?;

        let revisions = ctx.source.flow_revisions(flow.id).await?;
        if revisions.is_empty() {
            // Nothing to upgrade; seed an empty definition so the editor can
            // open the flow.
            ctx.warehouse
                .create_revision(
                    new_flow,
                    &NewFlowRevision {
                        definition: default_definition(flow, &ctx.options.flow_spec_version),
                        spec_version: ctx.options.flow_spec_version.clone(),
                        revision: 1,
                    },
                )
                .await?;
            return Ok(());
        }

        let last = revisions.len() - 1;
        for (i, revision) in revisions.iter().enumerate() {
            let parsed: Value = match serde_json::from_str(&revision.definition) {
                Ok(parsed) => parsed,
                Err(err) => {
                    ctx.log.warn(format!(
                        "flow {} revision {} holds invalid JSON, skipped: {err}",
                        flow.uuid, revision.revision
                    ));
                    continue;
                }
            };
            let envelope = json!({ "version": revision.spec_version, "flows": [parsed] });
            match ctx.warehouse.upgrade_flow_definition(ctx.dest_org(), &envelope).await {
                Ok(upgraded) => {
                    let mut definition = match upgraded.get("flows").and_then(|f| f.get(0)) {
                        Some(first) => first.clone(),
                        None => upgraded,
                    };
                    // The upgrade can rename or re-identify; pin ours back on.
                    definition["uuid"] = json!(flow.uuid);
                    definition["name"] = json!(flow.name);
                    definition["revision"] = json!(revision.revision);
                    ctx.warehouse
                        .create_revision(
                            new_flow,
                            &NewFlowRevision {
                                definition,
                                spec_version: ctx.options.flow_spec_version.clone(),
                                revision: revision.revision,
                            },
                        )
                        .await?;
                }
                Err(err) => {
                    // Keep the legacy definition rather than lose the
                    // revision history.
                    ctx.warehouse
                        .create_revision(
                            new_flow,
                            &NewFlowRevision {
                                definition: parsed,
                                spec_version: revision.spec_version.clone(),
                                revision: revision.revision,
                            },
                        )
                        .await?;
                    if i == last && !is_system {
                        ctx.log.warn(format!(
                            "flow {} current revision was not upgraded: {err:#}",
                            flow.uuid
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    async fn copy_images(
        &self,
        ctx: &PhaseContext<'_>,
        flow: &FlowRow,
        new_flow: i64,
    ) -> Result<()> {
        ctx.warehouse.delete_flow_images(new_flow).await?;
        for image in ctx.source.flow_images(flow.id).await? {
            let Some(contact) = ctx.resolve(EntityType::Contact, image.contact_id).await? else {
                continue;
            };
            let path = self.rehost_image(ctx, &image.path).await;
            let path_thumbnail = match &image.path_thumbnail {
                Some(thumbnail) => Some(self.rehost_image(ctx, thumbnail).await),
                None => None,
            };
            ctx.warehouse
                .create_flow_image(
                    ctx.dest_org(),
                    new_flow,
                    &NewFlowImage {
                        uuid: image.uuid,
                        contact_id: contact,
                        name: image.name.clone(),
                        path,
                        path_thumbnail,
                        exif: image.exif.clone(),
                        is_active: image.is_active,
                        created_on: image.created_on,
                        modified_on: image.modified_on,
                    },
                )
                .await?;
        }
        Ok(())
    }

    /// Image paths are usually relative to the legacy media host. A failed
    /// rehost keeps the original path.
    async fn rehost_image(&self, ctx: &PhaseContext<'_>, path: &str) -> String {
        let url = if path.starts_with("http") {
            path.to_string()
        } else {
            format!(
                "{}/media/{}",
                ctx.options.source_media_url.trim_end_matches('/'),
                path
            )
        };
        match ctx.media.import(&url).await {
            Ok(hosted) => hosted,
            Err(err) => {
                ctx.log
                    .warn(format!("could not rehost flow image {url}: {err:#}"));
                path.to_string()
            }
        }
    }

    async fn copy_starts(
        &self,
        ctx: &PhaseContext<'_>,
        flow: &FlowRow,
        new_flow: i64,
    ) -> Result<()> {
        // Runs reference starts, so both are cleared before either lands.
        ctx.warehouse.release_flow_runs(new_flow).await?;
        ctx.warehouse.release_flow_starts(new_flow).await?;

        for start in ctx.source.flow_starts(flow.id).await? {
            let new_start = ctx
                .warehouse
                .create_flow_start(
                    new_flow,
                    &NewFlowStart {
                        uuid: start.uuid,
                        restart_participants: start.restart_participants,
                        include_active: start.include_active,
                        status: start.status.clone(),
                        extra: start.extra.clone(),
                        contact_count: start.contact_count,
                        is_active: start.is_active,
                        created_on: start.created_on,
                        modified_on: start.modified_on,
                    },
                )
                .await?;
            ctx.record(EntityType::FlowStart, start.id, new_start).await?;

            for row in ctx.source.flow_start_contacts(start.id).await? {
                if let Some(contact) = ctx.resolve(EntityType::Contact, row.contact_id).await? {
                    ctx.warehouse.add_start_contact(new_start, contact).await?;
                }
            }
            for row in ctx.source.flow_start_groups(start.id).await? {
                if let Some(group) = ctx.resolve(EntityType::ContactGroup, row.group_id).await? {
                    ctx.warehouse.add_start_group(new_start, group).await?;
                }
            }
        }
        Ok(())
    }
}

fn destination_type(flow_type: &str) -> &str {
    match flow_type {
        // Message flows and single-message flows both become messaging.
        "F" | "M" => "M",
        other => other,
    }
}

fn goflow_type(flow_type: &str) -> &'static str {
    match flow_type {
        "V" => "voice",
        "S" => "messaging_offline",
        _ => "messaging",
    }
}

/// Reshape legacy flow metadata for the destination editor: dependencies
/// flatten from per-kind lists into one typed list, and the keys the editor
/// expects always exist.
fn translate_metadata(metadata: Value) -> Value {
    let mut map = match metadata {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    if let Some(Value::Object(by_kind)) = map.remove("dependencies") {
        let mut flattened = Vec::new();
        for (kind, deps) in by_kind {
            let singular = kind.strip_suffix('s').unwrap_or(&kind).to_string();
            if let Value::Array(deps) = deps {
                for mut dep in deps {
                    if let Some(entry) = dep.as_object_mut() {
                        entry.insert("type".to_string(), json!(singular));
                    }
                    flattened.push(dep);
                }
            }
        }
        map.insert("dependencies".to_string(), Value::Array(flattened));
    }
    map.entry("results").or_insert_with(|| json!([]));
    map.entry("waiting_exit_uuids").or_insert_with(|| json!([]));
    Value::Object(map)
}

/// Minimal valid definition for flows with no stored revisions.
fn default_definition(flow: &FlowRow, spec_version: &str) -> Value {
    json!({
        "name": flow.name,
        "uuid": flow.uuid,
        "spec_version": spec_version,
        "language": flow.base_language.clone().unwrap_or_else(|| "base".to_string()),
        "type": goflow_type(&flow.flow_type),
        "nodes": [],
        "_ui": {},
        "revision": 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_flow_types_collapse_to_messaging() {
        assert_eq!(destination_type("F"), "M");
        assert_eq!(destination_type("M"), "M");
        assert_eq!(destination_type("V"), "V");
        assert_eq!(destination_type("S"), "S");
    }

    #[test]
    fn dependencies_flatten_with_type_tags() {
        let metadata = json!({
            "dependencies": {
                "fields": [{ "key": "age" }],
                "groups": [{ "uuid": "g1", "name": "Farmers" }],
            },
            "results": [{ "key": "color" }],
        });

        let translated = translate_metadata(metadata);
        assert_eq!(
            translated["dependencies"],
            json!([
                { "key": "age", "type": "field" },
                { "uuid": "g1", "name": "Farmers", "type": "group" },
            ])
        );
        // Existing results stay; the missing editor key is filled in.
        assert_eq!(translated["results"], json!([{ "key": "color" }]));
        assert_eq!(translated["waiting_exit_uuids"], json!([]));
    }

    #[test]
    fn null_metadata_becomes_an_editor_ready_object() {
        let translated = translate_metadata(Value::Null);
        assert_eq!(translated["results"], json!([]));
        assert_eq!(translated["waiting_exit_uuids"], json!([]));
        assert!(translated.get("dependencies").is_none());
    }
}
