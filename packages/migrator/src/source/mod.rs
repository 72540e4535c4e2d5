//! Read-only access to the legacy database.
//!
//! One method per source query, each returning typed rows. List methods page
//! through results 1000 rows at a time in stable id order; windowed methods
//! additionally bound rows by creation time for incremental follow-up runs.

pub mod paging;
pub mod pg;
pub mod rows;

use anyhow::Result;
use async_trait::async_trait;

use crate::run::SourceWindow;
pub use rows::*;

#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn org(&self, org: i64) -> Result<Option<OrgRow>>;

    async fn credit_grants(&self, org: i64) -> Result<Vec<CreditGrantRow>>;
    async fn credit_events(&self, grant: i64) -> Result<Vec<CreditEventRow>>;
    async fn languages(&self, org: i64) -> Result<Vec<LanguageRow>>;

    async fn channels(&self, org: i64, window: SourceWindow) -> Result<Vec<ChannelRow>>;
    async fn sync_events(&self, channel: i64) -> Result<Vec<SyncEventRow>>;
    async fn channel_logs(&self, channel: i64) -> Result<Vec<ChannelLogRow>>;

    async fn contact_fields(&self, org: i64, window: SourceWindow)
        -> Result<Vec<ContactFieldRow>>;
    async fn contacts(&self, org: i64, window: SourceWindow) -> Result<Vec<ContactRow>>;
    async fn contact_values(&self, org: i64, contact: i64) -> Result<Vec<ContactValueRow>>;
    async fn contact_urns(&self, org: i64, contact: i64) -> Result<Vec<ContactUrnRow>>;

    async fn groups(&self, org: i64, window: SourceWindow) -> Result<Vec<GroupRow>>;
    async fn group_members(&self, group: i64) -> Result<Vec<GroupMemberRow>>;

    async fn channel_events(&self, org: i64, window: SourceWindow)
        -> Result<Vec<ChannelEventRow>>;

    async fn trigger_schedules(&self, org: i64, window: SourceWindow)
        -> Result<Vec<ScheduleRow>>;
    async fn broadcast_schedules(&self, org: i64, window: SourceWindow)
        -> Result<Vec<ScheduleRow>>;

    async fn broadcasts(&self, org: i64) -> Result<Vec<BroadcastRow>>;
    async fn broadcast_contacts(&self, broadcast: i64) -> Result<Vec<BroadcastContactRow>>;
    async fn broadcast_groups(&self, broadcast: i64) -> Result<Vec<BroadcastGroupRow>>;
    async fn broadcast_urns(&self, broadcast: i64) -> Result<Vec<BroadcastUrnRow>>;

    async fn label_folders(&self, org: i64) -> Result<Vec<LabelRow>>;
    async fn labels(&self, org: i64) -> Result<Vec<LabelRow>>;

    async fn messages(&self, org: i64, window: SourceWindow) -> Result<Vec<MsgRow>>;

    async fn flow_labels(&self, org: i64) -> Result<Vec<FlowLabelRow>>;
    async fn flows(&self, org: i64) -> Result<Vec<FlowRow>>;
    async fn flow_label_links(&self, flow: i64) -> Result<Vec<FlowLabelLinkRow>>;
    async fn flow_revisions(&self, flow: i64) -> Result<Vec<FlowRevisionRow>>;
    async fn flow_category_counts(&self, flow: i64) -> Result<Vec<FlowCategoryCountRow>>;
    async fn flow_action_sets(&self, flow: i64) -> Result<Vec<ActionSetRow>>;
    async fn flow_rule_sets(&self, flow: i64) -> Result<Vec<RuleSetRow>>;
    async fn flow_field_dependencies(&self, flow: i64) -> Result<Vec<FieldDependencyRow>>;
    async fn flow_group_dependencies(&self, flow: i64) -> Result<Vec<GroupDependencyRow>>;
    async fn flow_flow_dependencies(&self, flow: i64) -> Result<Vec<FlowDependencyRow>>;
    async fn flow_images(&self, flow: i64) -> Result<Vec<FlowImageRow>>;
    async fn flow_starts(&self, flow: i64) -> Result<Vec<FlowStartRow>>;
    async fn flow_start_contacts(&self, start: i64) -> Result<Vec<StartContactRow>>;
    async fn flow_start_groups(&self, start: i64) -> Result<Vec<StartGroupRow>>;
    async fn flow_runs(&self, flow: i64, window: SourceWindow) -> Result<Vec<FlowRunRow>>;
    async fn run_steps(&self, run: i64) -> Result<Vec<FlowStepRow>>;

    async fn resthooks(&self, org: i64) -> Result<Vec<ResthookRow>>;
    async fn resthook_subscribers(&self, resthook: i64)
        -> Result<Vec<ResthookSubscriberRow>>;

    async fn webhook_events(&self, org: i64) -> Result<Vec<WebhookEventRow>>;
    async fn webhook_results(&self, event: i64) -> Result<Vec<WebhookResultRow>>;

    async fn campaigns(&self, org: i64) -> Result<Vec<CampaignRow>>;
    async fn campaign_events(&self, campaign: i64) -> Result<Vec<CampaignEventRow>>;
    async fn event_fires(&self, event: i64) -> Result<Vec<EventFireRow>>;

    async fn triggers(&self, org: i64) -> Result<Vec<TriggerRow>>;
    async fn trigger_contacts(&self, trigger: i64) -> Result<Vec<TriggerContactRow>>;
    async fn trigger_groups(&self, trigger: i64) -> Result<Vec<TriggerGroupRow>>;

    async fn links(&self, org: i64) -> Result<Vec<LinkRow>>;
    async fn link_contacts(&self, link: i64) -> Result<Vec<LinkContactRow>>;
}
