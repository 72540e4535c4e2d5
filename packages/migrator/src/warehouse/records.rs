//! Insert/update payloads accepted by the destination warehouse.
//!
//! One struct per write, already translated: legacy type codes mapped, hstore
//! blobs decoded to JSON, references resolved to destination ids. The
//! warehouse binds these as-is and owns nothing but SQL.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

// ==== organization ====

#[derive(Debug, Clone)]
pub struct OrgProfile {
    pub plan: Option<String>,
    pub plan_start: Option<DateTime<Utc>>,
    pub stripe_customer: Option<String>,
    pub language: Option<String>,
    pub date_format: String,
    /// Source config blob with the SMTP keys already popped out.
    pub config: Value,
    pub is_anon: bool,
    pub surveyor_password: Option<String>,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub from_email: Option<String>,
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub port: Option<i32>,
    pub encryption: Option<String>,
}

impl SmtpConfig {
    pub fn is_empty(&self) -> bool {
        self.from_email.is_none()
            && self.host.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.port.is_none()
            && self.encryption.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewCreditGrant {
    pub price: Option<i32>,
    pub credits: i32,
    pub expires_on: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCreditEvent {
    pub used: i32,
    pub is_squashed: bool,
}

#[derive(Debug, Clone)]
pub struct NewLanguage {
    pub name: String,
    pub iso_code: String,
}

// ==== channels ====

#[derive(Debug, Clone)]
pub struct NewChannel {
    pub uuid: Uuid,
    pub channel_type: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub country: Option<String>,
    pub config: Value,
    pub role: String,
    pub schemes: Vec<String>,
    pub claim_code: Option<String>,
    pub secret: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub device: Option<String>,
    pub os: Option<String>,
    pub alert_email: Option<String>,
    pub bod: Option<String>,
    pub tps: i32,
}

/// Outcome of a create that can lose to a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateResult {
    Created(i64),
    Conflict,
}

#[derive(Debug, Clone)]
pub struct NewSyncEvent {
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

#[derive(Debug, Clone)]
pub struct NewChannelLog {
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

// ==== contacts ====

#[derive(Debug, Clone)]
pub struct NewContactField {
    pub uuid: Uuid,
    pub key: String,
    pub label: String,
    pub value_type: String,
    pub show_in_table: bool,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub uuid: Uuid,
    pub name: Option<String>,
    pub language: Option<String>,
    pub is_blocked: bool,
    pub is_stopped: bool,
    pub is_active: bool,
}

/// The narrow field set rewritten on contacts that already exist downstream.
#[derive(Debug, Clone)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub is_blocked: bool,
    pub is_stopped: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewUrn {
    /// Full identity, `scheme:path`, scheme already rewritten.
    pub identity: String,
    pub channel_id: Option<i64>,
    pub auth: Option<String>,
}

impl NewUrn {
    pub fn scheme(&self) -> &str {
        self.identity.split_once(':').map(|(s, _)| s).unwrap_or("")
    }

    pub fn path(&self) -> &str {
        self.identity
            .split_once(':')
            .map(|(_, p)| p)
            .unwrap_or(&self.identity)
    }
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub uuid: Uuid,
    pub name: String,
    pub query: Option<String>,
}

/// Result of a find-or-create, keeping whether the row is new.
#[derive(Debug, Clone, Copy)]
pub struct Upserted {
    pub id: i64,
    pub created: bool,
}

impl From<Upserted> for crate::report::RecordOutcome {
    fn from(upserted: Upserted) -> Self {
        if upserted.created {
            Self::Created(upserted.id)
        } else {
            Self::Updated(upserted.id)
        }
    }
}

// ==== channel events ====

#[derive(Debug, Clone)]
pub struct NewChannelEvent {
    pub event_type: String,
    pub contact_id: i64,
    pub contact_urn_id: Option<i64>,
    pub channel_id: i64,
    pub extra: Option<String>,
    pub occurred_on: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
}

// ==== schedules ====

#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub repeat_period: String,
    /// Day-letter set out of `MTWRFSU`, weekly schedules only.
    pub repeat_days_of_week: Option<String>,
    pub repeat_hour_of_day: Option<i32>,
    pub repeat_minute_of_hour: i32,
    pub repeat_day_of_month: Option<i32>,
    pub next_fire: Option<DateTime<Utc>>,
    pub last_fire: Option<DateTime<Utc>>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

// ==== broadcasts ====

#[derive(Debug, Clone)]
pub struct NewBroadcast {
    pub channel_id: Option<i64>,
    pub schedule_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub status: String,
    pub translations: Value,
    pub base_language: String,
    pub is_active: bool,
    pub media: Option<Value>,
    pub send_all: bool,
    pub metadata: Option<String>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

// ==== labels ====

#[derive(Debug, Clone)]
pub struct NewLabel {
    pub uuid: Uuid,
    pub name: String,
    pub folder_id: Option<i64>,
}

// ==== messages ====

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub uuid: Option<Uuid>,
    pub channel_id: Option<i64>,
    pub contact_id: i64,
    pub contact_urn_id: Option<i64>,
    pub broadcast_id: Option<i64>,
    pub response_to_id: Option<i64>,
    pub topup_id: Option<i64>,
    pub text: String,
    pub high_priority: bool,
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

// ==== flows ====

#[derive(Debug, Clone)]
pub struct NewFlowLabel {
    pub uuid: Uuid,
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewFlow {
    pub uuid: Uuid,
    pub name: String,
    pub flow_type: String,
    pub is_system: bool,
    pub is_archived: bool,
    pub expires_after_minutes: i32,
    pub base_language: Option<String>,
    pub ignore_triggers: bool,
    pub metadata: Value,
    pub saved_on: DateTime<Utc>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FlowUpdate {
    pub name: String,
    pub flow_type: String,
    pub is_system: bool,
    pub is_archived: bool,
    pub expires_after_minutes: i32,
    pub metadata: Value,
    pub saved_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategoryCount {
    pub node_uuid: Uuid,
    pub result_key: String,
    pub result_name: String,
    pub category_name: String,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct NewActionSet {
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

#[derive(Debug, Clone)]
pub struct NewRuleSet {
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

#[derive(Debug, Clone)]
pub struct NewFlowRevision {
    pub definition: Value,
    pub spec_version: String,
    pub revision: i32,
}

#[derive(Debug, Clone)]
pub struct NewFlowImage {
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

#[derive(Debug, Clone)]
pub struct NewFlowStart {
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

#[derive(Debug, Clone)]
pub struct NewFlowRun {
    pub uuid: Uuid,
    pub contact_id: i64,
    pub start_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub responded: bool,
    pub results: Value,
    /// Path steps, already re-identified with fresh step UUIDs.
    pub path: Value,
    /// Session events rebuilt from the granular step rows.
    pub events: Value,
    pub status: String,
    pub exit_type: Option<String>,
    pub is_active: bool,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
    pub exited_on: Option<DateTime<Utc>>,
    pub expires_on: Option<DateTime<Utc>>,
    pub timeout_on: Option<DateTime<Utc>>,
    pub submitted_by_id: Option<i64>,
}

// ==== resthooks / webhooks ====

#[derive(Debug, Clone)]
pub struct NewResthook {
    pub slug: String,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub target_url: String,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub resthook_id: i64,
    pub data: Option<String>,
    pub action: String,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWebhookResult {
    pub contact_id: Option<i64>,
    pub url: Option<String>,
    pub request: Option<String>,
    pub status_code: i32,
    pub body: Option<String>,
    pub request_time: Option<i32>,
    pub created_on: DateTime<Utc>,
}

// ==== campaigns ====

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub uuid: Uuid,
    pub name: String,
    pub group_id: i64,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCampaignEvent {
    pub uuid: Uuid,
    pub event_type: String,
    pub relative_to_id: i64,
    pub offset: i32,
    pub unit: String,
    pub flow_id: i64,
    pub message: Option<Value>,
    pub delivery_hour: i32,
    pub embedded_data: Option<String>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEventFire {
    pub contact_id: i64,
    pub scheduled: DateTime<Utc>,
    pub fired: Option<DateTime<Utc>>,
}

// ==== triggers ====

#[derive(Debug, Clone)]
pub struct NewTrigger {
    pub trigger_type: String,
    pub keyword: Option<String>,
    pub referrer_id: Option<String>,
    pub match_type: Option<String>,
    pub flow_id: i64,
    pub channel_id: Option<i64>,
    pub schedule_id: Option<i64>,
    pub embedded_data: Option<String>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

// ==== links ====

#[derive(Debug, Clone)]
pub struct NewLink {
    pub uuid: Uuid,
    pub name: String,
    pub destination: String,
    pub clicks_count: i32,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLinkContact {
    pub contact_id: i64,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urn_splits_identity_once() {
        let urn = NewUrn {
            identity: "tel:+255700000001".to_string(),
            channel_id: None,
            auth: None,
        };
        assert_eq!(urn.scheme(), "tel");
        assert_eq!(urn.path(), "+255700000001");

        let odd = NewUrn {
            identity: "ext:user:42".to_string(),
            channel_id: None,
            auth: None,
        };
        assert_eq!(odd.scheme(), "ext");
        assert_eq!(odd.path(), "user:42");
    }

    #[test]
    fn smtp_config_empty_only_without_any_key() {
        let empty = SmtpConfig {
            from_email: None,
            host: None,
            username: None,
            password: None,
            port: None,
            encryption: None,
        };
        assert!(empty.is_empty());

        let partial = SmtpConfig {
            host: Some("smtp.example.org".to_string()),
            ..empty
        };
        assert!(!partial.is_empty());
    }
}
