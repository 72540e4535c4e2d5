//! Entity categories tracked by the identity ledger.

use serde::{Deserialize, Serialize};

/// Closed set of entity categories a migration can associate. Adding a
/// category means adding a variant here and to the `migration_entity_type`
/// Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "migration_entity_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Organization,
    CreditGrant,
    Language,
    Channel,
    ContactField,
    Contact,
    ContactUrn,
    ContactGroup,
    Schedule,
    Broadcast,
    Label,
    Message,
    FlowLabel,
    Flow,
    FlowRun,
    FlowStart,
    Campaign,
    CampaignEvent,
    Trigger,
    Link,
    Resthook,
    WebhookEvent,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::CreditGrant => "credit_grant",
            Self::Language => "language",
            Self::Channel => "channel",
            Self::ContactField => "contact_field",
            Self::Contact => "contact",
            Self::ContactUrn => "contact_urn",
            Self::ContactGroup => "contact_group",
            Self::Schedule => "schedule",
            Self::Broadcast => "broadcast",
            Self::Label => "label",
            Self::Message => "message",
            Self::FlowLabel => "flow_label",
            Self::Flow => "flow",
            Self::FlowRun => "flow_run",
            Self::FlowStart => "flow_start",
            Self::Campaign => "campaign",
            Self::CampaignEvent => "campaign_event",
            Self::Trigger => "trigger",
            Self::Link => "link",
            Self::Resthook => "resthook",
            Self::WebhookEvent => "webhook_event",
        }
    }

    /// Whether destination lookups for this category are scoped to the
    /// destination org. Organizations are the scope themselves, and flow
    /// starts live outside org-filtered queries on the destination.
    pub fn org_scoped(&self) -> bool {
        !matches!(self, Self::Organization | Self::FlowStart)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
