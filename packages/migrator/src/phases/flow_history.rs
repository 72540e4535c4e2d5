//! Rebuilding flow runs from the legacy step-level history.
//!
//! The legacy schema kept one row per visited step; the destination wants a
//! single run row carrying its path and session events as JSON.

use anyhow::Result;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::engine::PhaseContext;
use crate::entity::EntityType;
use crate::report::{RecordOutcome, SkipReason};
use crate::source::{FlowRunRow, FlowStepRow};
use crate::warehouse::NewFlowRun;

pub(super) async fn migrate_run(
    ctx: &PhaseContext<'_>,
    new_flow: i64,
    run: &FlowRunRow,
) -> Result<RecordOutcome> {
    let Some(contact) = ctx.resolve(EntityType::Contact, run.contact_id).await? else {
        return Ok(RecordOutcome::Skipped(SkipReason::missing(
            EntityType::Contact,
            run.contact_id,
        )));
    };
    let start_id = ctx.resolve_opt(EntityType::FlowStart, run.start_id).await?;
    let parent_id = ctx.resolve_opt(EntityType::FlowRun, run.parent_id).await?;

    let steps = ctx.source.run_steps(run.id).await?;
    let new_run = ctx
        .warehouse
        .create_flow_run(
            ctx.dest_org(),
            new_flow,
            &NewFlowRun {
                uuid: run.uuid,
                contact_id: contact,
                start_id,
                parent_id,
                responded: run.responded,
                results: parse_or_empty(run.results.as_deref()),
                path: refresh_path(parse_or_empty_list(run.path.as_deref())),
                events: rebuild_events(&steps),
                status: run_status(run.exit_type.as_deref(), run.is_active).to_string(),
                exit_type: run.exit_type.clone(),
                is_active: run.is_active,
                created_on: run.created_on,
                modified_on: run.modified_on,
                exited_on: run.exited_on,
                expires_on: run.expires_on,
                timeout_on: run.timeout_on,
                submitted_by_id: run.submitted_by_id,
            },
        )
        .await?;
    ctx.record(EntityType::FlowRun, run.id, new_run).await?;
    Ok(RecordOutcome::Created(new_run))
}

fn parse_or_empty(raw: Option<&str>) -> Value {
    raw.and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_else(|| json!({}))
}

fn parse_or_empty_list(raw: Option<&str>) -> Value {
    raw.and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_else(|| json!([]))
}

/// Path steps get fresh UUIDs; the originals collide with steps already held
/// by the destination session store.
fn refresh_path(mut path: Value) -> Value {
    if let Some(steps) = path.as_array_mut() {
        for step in steps {
            if let Some(step) = step.as_object_mut() {
                step.insert("uuid".to_string(), json!(Uuid::new_v4()));
            }
        }
    }
    path
}

/// Derive the destination run status. Active runs stay active; exited runs
/// map by their legacy exit code, with unknown codes treated as completed.
fn run_status(exit_type: Option<&str>, is_active: bool) -> &'static str {
    if is_active {
        return "A";
    }
    match exit_type {
        None | Some("") => "I",
        Some("C") => "C",
        Some("I") => "I",
        Some("E") => "E",
        Some(_) => "C",
    }
}

/// Rebuild session events from the step rows. Only steps that exchanged a
/// message produce an event.
fn rebuild_events(steps: &[FlowStepRow]) -> Value {
    let mut events = Vec::new();
    for step in steps {
        let Some(direction) = step.msg_direction.as_deref() else {
            continue;
        };
        let mut msg = Map::new();
        if let Some(uuid) = step.msg_uuid {
            msg.insert("uuid".to_string(), json!(uuid));
        }
        msg.insert(
            "text".to_string(),
            json!(step.msg_text.clone().unwrap_or_default()),
        );
        if let (Some(scheme), Some(path)) = (step.urn_scheme.as_deref(), step.urn_path.as_deref())
        {
            let scheme = if scheme == "ws" { "ext" } else { scheme };
            msg.insert("urn".to_string(), json!(format!("{scheme}:{path}")));
        }
        if let Some(channel_uuid) = step.channel_uuid {
            msg.insert(
                "channel".to_string(),
                json!({
                    "uuid": channel_uuid,
                    "name": step.channel_name.clone().unwrap_or_default(),
                }),
            );
        }
        let event_type = if direction == "O" {
            "msg_created"
        } else {
            "msg_received"
        };
        events.push(json!({
            "type": event_type,
            "created_on": step.arrived_on,
            "step_uuid": step.step_uuid,
            "msg": msg,
        }));
    }
    Value::Array(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn status_mapping_covers_exit_codes() {
        assert_eq!(run_status(Some("C"), true), "A");
        assert_eq!(run_status(None, false), "I");
        assert_eq!(run_status(Some(""), false), "I");
        assert_eq!(run_status(Some("C"), false), "C");
        assert_eq!(run_status(Some("I"), false), "I");
        assert_eq!(run_status(Some("E"), false), "E");
        assert_eq!(run_status(Some("X"), false), "C");
    }

    #[test]
    fn path_steps_get_fresh_uuids() {
        let original = Uuid::new_v4();
        let path = json!([{ "uuid": original, "node_uuid": "n1" }]);

        let refreshed = refresh_path(path);
        let step = &refreshed[0];
        assert_ne!(step["uuid"], json!(original));
        assert_eq!(step["node_uuid"], json!("n1"));
    }

    fn step(direction: Option<&str>) -> FlowStepRow {
        FlowStepRow {
            step_uuid: Uuid::new_v4(),
            arrived_on: Utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap(),
            msg_uuid: Some(Uuid::new_v4()),
            msg_text: Some("hello".to_string()),
            msg_direction: direction.map(str::to_string),
            urn_scheme: Some("ws".to_string()),
            urn_path: Some("abc".to_string()),
            channel_uuid: Some(Uuid::new_v4()),
            channel_name: Some("Chat".to_string()),
        }
    }

    #[test]
    fn events_rebuild_from_message_steps() {
        let steps = vec![step(Some("O")), step(Some("I")), step(None)];

        let events = rebuild_events(&steps);
        let events = events.as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], json!("msg_created"));
        assert_eq!(events[1]["type"], json!("msg_received"));
        // Websocket URNs arrive rewritten onto the external scheme.
        assert_eq!(events[0]["msg"]["urn"], json!("ext:abc"));
        assert_eq!(events[0]["msg"]["channel"]["name"], json!("Chat"));
    }
}
