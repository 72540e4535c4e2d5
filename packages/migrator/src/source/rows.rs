//! Typed rows for every source query.
//!
//! One struct per query, decoded straight from the legacy schema. Columns
//! holding serialized JSON stay `String` and are parsed where used; legacy
//! hstore translation columns are converted in SQL (`hstore_to_json`) and
//! decoded as `serde_json::Value`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct OrgRow {
    pub id: i64,
    pub name: String,
    pub slug: Option<String>,
    pub plan: Option<String>,
    pub plan_start: Option<DateTime<Utc>>,
    pub stripe_customer: Option<String>,
    pub language: Option<String>,
    pub timezone: String,
    pub date_format: String,
    /// Serialized JSON blob; SMTP keys and collection lists live inside.
    pub config: Option<String>,
    pub is_anon: bool,
    pub surveyor_password: Option<String>,
    pub parent_id: Option<i64>,
    pub primary_language_id: Option<i64>,
}

impl OrgRow {
    pub fn config_json(&self) -> Value {
        self.config
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    /// Day-first date format flag ('D'); month-first otherwise.
    pub fn is_day_first(&self) -> bool {
        self.date_format == "D"
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CreditGrantRow {
    pub id: i64,
    pub price: Option<i32>,
    pub credits: i32,
    pub expires_on: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CreditEventRow {
    pub id: i64,
    pub used: i32,
    pub is_squashed: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct LanguageRow {
    pub id: i64,
    pub name: String,
    pub iso_code: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChannelRow {
    pub id: i64,
    pub uuid: Uuid,
    pub channel_type: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
    pub config: Option<String>,
    pub role: String,
    pub schemes: Option<Vec<String>>,
    pub claim_code: Option<String>,
    pub secret: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub device: Option<String>,
    pub os: Option<String>,
    pub alert_email: Option<String>,
    pub bod: Option<String>,
    pub is_active: bool,
}

impl ChannelRow {
    pub fn config_json(&self) -> Value {
        self.config
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_else(|| Value::Object(Default::default()))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SyncEventRow {
    pub id: i64,
    pub power_source: String,
    pub power_status: String,
    pub power_level: i32,
    pub network_type: String,
    pub lifetime: Option<i32>,
    pub pending_message_count: i32,
    pub retry_message_count: i32,
    pub incoming_command_count: i32,
    pub outgoing_command_count: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChannelLogRow {
    pub id: i64,
    pub msg_id: Option<i64>,
    pub description: String,
    pub is_error: bool,
    pub url: Option<String>,
    pub method: Option<String>,
    pub request: Option<String>,
    pub response: Option<String>,
    pub response_status: Option<i32>,
    pub request_time: Option<i32>,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ContactFieldRow {
    pub id: i64,
    pub uuid: Uuid,
    pub key: String,
    pub label: String,
    pub value_type: String,
    pub show_in_table: Option<bool>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ContactRow {
    pub id: i64,
    pub uuid: Uuid,
    pub name: Option<String>,
    pub language: Option<String>,
    pub is_blocked: bool,
    pub is_stopped: bool,
    pub is_active: bool,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ContactValueRow {
    pub id: i64,
    pub contact_field_id: i64,
    pub string_value: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ContactUrnRow {
    pub id: i64,
    pub identity: String,
    pub auth: Option<String>,
    pub channel_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct GroupRow {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub query: Option<String>,
}

impl GroupRow {
    /// Dynamic groups compute membership from their query; members are never
    /// copied into them.
    pub fn is_dynamic(&self) -> bool {
        self.query.is_some()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct GroupMemberRow {
    pub contact_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChannelEventRow {
    pub id: i64,
    pub event_type: String,
    pub contact_id: i64,
    pub contact_urn_id: Option<i64>,
    pub channel_id: i64,
    pub extra: Option<String>,
    pub occurred_on: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ScheduleRow {
    pub id: i64,
    pub repeat_period: Option<String>,
    pub repeat_days: Option<i32>,
    pub repeat_hour_of_day: Option<i32>,
    pub repeat_minute_of_hour: Option<i32>,
    pub repeat_day_of_month: Option<i32>,
    pub next_fire: Option<DateTime<Utc>>,
    pub last_fire: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BroadcastRow {
    pub id: i64,
    pub channel_id: Option<i64>,
    pub schedule_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub status: String,
    /// Language -> text map, converted from hstore in SQL.
    pub translations: Value,
    pub base_language: Option<String>,
    pub is_active: bool,
    pub media: Option<Value>,
    pub send_all: bool,
    pub metadata: Option<String>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct BroadcastContactRow {
    pub contact_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct BroadcastGroupRow {
    pub group_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct BroadcastUrnRow {
    pub urn_id: i64,
}

/// Shared by folder rows (`label_type = 'F'`) and label rows (`'L'`).
#[derive(Debug, Clone, FromRow)]
pub struct LabelRow {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub folder_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MsgRow {
    pub id: i64,
    pub uuid: Option<Uuid>,
    pub channel_id: Option<i64>,
    pub contact_id: i64,
    pub contact_urn_id: Option<i64>,
    pub broadcast_id: Option<i64>,
    pub response_to_id: Option<i64>,
    pub topup_id: Option<i64>,
    pub text: String,
    pub high_priority: Option<bool>,
    pub created_on: DateTime<Utc>,
    pub modified_on: Option<DateTime<Utc>>,
    pub sent_on: Option<DateTime<Utc>>,
    pub queued_on: Option<DateTime<Utc>>,
    pub direction: String,
    pub status: String,
    pub visibility: String,
    pub msg_type: Option<String>,
    pub msg_count: i32,
    pub error_count: i32,
    pub next_attempt: Option<DateTime<Utc>>,
    pub external_id: Option<String>,
    pub attachments: Option<Vec<String>>,
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FlowLabelRow {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FlowRow {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub flow_type: String,
    pub is_active: bool,
    pub is_archived: bool,
    pub expires_after_minutes: i32,
    pub base_language: Option<String>,
    pub entry_uuid: Option<Uuid>,
    pub entry_type: Option<String>,
    pub ignore_triggers: bool,
    pub metadata: Option<String>,
    pub saved_on: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

impl FlowRow {
    pub fn metadata_json(&self) -> Value {
        self.metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_else(|| Value::Object(Default::default()))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FlowLabelLinkRow {
    pub label_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct FlowRevisionRow {
    pub id: i64,
    pub definition: String,
    pub spec_version: String,
    pub revision: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct FlowCategoryCountRow {
    pub id: i64,
    pub node_uuid: Uuid,
    pub result_key: String,
    pub result_name: String,
    pub category_name: String,
    pub count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ActionSetRow {
    pub id: i64,
    pub uuid: Uuid,
    pub destination: Option<Uuid>,
    pub destination_type: Option<String>,
    pub exit_uuid: Option<Uuid>,
    pub actions: String,
    pub x: i32,
    pub y: i32,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RuleSetRow {
    pub id: i64,
    pub uuid: Uuid,
    pub label: Option<String>,
    pub operand: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_action: Option<String>,
    pub rules: String,
    pub finished_key: Option<String>,
    pub value_type: String,
    pub ruleset_type: Option<String>,
    pub response_type: String,
    pub config: String,
    pub x: i32,
    pub y: i32,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FieldDependencyRow {
    pub contact_field_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct GroupDependencyRow {
    pub group_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct FlowDependencyRow {
    pub to_flow_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct FlowImageRow {
    pub id: i64,
    pub uuid: Uuid,
    pub contact_id: i64,
    pub name: String,
    pub path: String,
    pub path_thumbnail: Option<String>,
    pub exif: Option<String>,
    pub is_active: bool,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FlowStartRow {
    pub id: i64,
    pub uuid: Uuid,
    pub restart_participants: bool,
    pub include_active: bool,
    pub status: String,
    pub extra: Option<String>,
    pub contact_count: i32,
    pub is_active: bool,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct StartContactRow {
    pub contact_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct StartGroupRow {
    pub group_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct FlowRunRow {
    pub id: i64,
    pub uuid: Uuid,
    pub contact_id: i64,
    pub start_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub responded: bool,
    pub results: Option<String>,
    pub path: Option<String>,
    pub exit_type: Option<String>,
    pub is_active: bool,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
    pub exited_on: Option<DateTime<Utc>>,
    pub expires_on: Option<DateTime<Utc>>,
    pub timeout_on: Option<DateTime<Utc>>,
    pub submitted_by_id: Option<i64>,
}

/// One visited step of a run joined to the message exchanged there, for
/// rebuilding run events.
#[derive(Debug, Clone, FromRow)]
pub struct FlowStepRow {
    pub step_uuid: Uuid,
    pub arrived_on: DateTime<Utc>,
    pub msg_uuid: Option<Uuid>,
    pub msg_text: Option<String>,
    pub msg_direction: Option<String>,
    pub urn_scheme: Option<String>,
    pub urn_path: Option<String>,
    pub channel_uuid: Option<Uuid>,
    pub channel_name: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ResthookRow {
    pub id: i64,
    pub slug: String,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ResthookSubscriberRow {
    pub id: i64,
    pub target_url: String,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct WebhookEventRow {
    pub id: i64,
    pub resthook_id: Option<i64>,
    pub data: Option<String>,
    pub action: String,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct WebhookResultRow {
    pub id: i64,
    pub contact_id: Option<i64>,
    pub url: Option<String>,
    pub request: Option<String>,
    pub status_code: i32,
    pub body: Option<String>,
    pub request_time: Option<i32>,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CampaignRow {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub group_id: i64,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CampaignEventRow {
    pub id: i64,
    pub uuid: Uuid,
    pub event_type: String,
    pub relative_to_id: i64,
    pub offset: i32,
    pub unit: String,
    pub flow_id: i64,
    /// Language -> text map, converted from hstore in SQL.
    pub message: Option<Value>,
    pub delivery_hour: i32,
    pub embedded_data: Option<String>,
    pub is_active: bool,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct EventFireRow {
    pub id: i64,
    pub contact_id: i64,
    pub scheduled: DateTime<Utc>,
    pub fired: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TriggerRow {
    pub id: i64,
    pub trigger_type: String,
    pub keyword: Option<String>,
    pub referrer_id: Option<String>,
    pub match_type: Option<String>,
    pub flow_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub schedule_id: Option<i64>,
    pub embedded_data: Option<String>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TriggerContactRow {
    pub contact_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct TriggerGroupRow {
    pub group_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct LinkRow {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub destination: String,
    pub clicks_count: i32,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LinkContactRow {
    pub id: i64,
    pub contact_id: i64,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_config_parses_or_defaults() {
        let mut org = OrgRow {
            id: 1,
            name: "Acme".to_string(),
            slug: Some("acme".to_string()),
            plan: None,
            plan_start: None,
            stripe_customer: None,
            language: None,
            timezone: "UTC".to_string(),
            date_format: "D".to_string(),
            config: Some(r#"{"SMTP_FROM_EMAIL": "no-reply@acme.org"}"#.to_string()),
            is_anon: false,
            surveyor_password: None,
            parent_id: None,
            primary_language_id: None,
        };
        assert_eq!(
            org.config_json()["SMTP_FROM_EMAIL"],
            Value::String("no-reply@acme.org".to_string())
        );
        assert!(org.is_day_first());

        org.config = Some("not json".to_string());
        assert_eq!(org.config_json(), Value::Object(Default::default()));

        org.config = None;
        assert_eq!(org.config_json(), Value::Object(Default::default()));
    }

    #[test]
    fn group_with_query_is_dynamic() {
        let group = GroupRow {
            id: 5,
            uuid: Uuid::new_v4(),
            name: "Reporters".to_string(),
            query: Some("age > 18".to_string()),
        };
        assert!(group.is_dynamic());
    }
}
