// MockSourceReader - canned legacy data for engine and phase tests.
//
// One store per reader method: org-level lists are plain vectors, per-parent
// lists are maps keyed by the parent's source id. Every call is logged by
// method name so checkpoint tests can assert which readers ran. Windows are
// ignored; windowed tests seed just the slice they expect.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::run::SourceWindow;
use crate::source::rows::*;
use crate::source::SourceReader;

fn child<T: Clone>(map: &HashMap<i64, Vec<T>>, key: i64) -> Vec<T> {
    map.get(&key).cloned().unwrap_or_default()
}

#[derive(Default)]
pub struct MockSourceReader {
    org: Option<OrgRow>,
    credit_grants: Vec<CreditGrantRow>,
    credit_events: HashMap<i64, Vec<CreditEventRow>>,
    languages: Vec<LanguageRow>,
    channels: Vec<ChannelRow>,
    sync_events: HashMap<i64, Vec<SyncEventRow>>,
    channel_logs: HashMap<i64, Vec<ChannelLogRow>>,
    contact_fields: Vec<ContactFieldRow>,
    contacts: Vec<ContactRow>,
    contact_values: HashMap<i64, Vec<ContactValueRow>>,
    contact_urns: HashMap<i64, Vec<ContactUrnRow>>,
    groups: Vec<GroupRow>,
    group_members: HashMap<i64, Vec<GroupMemberRow>>,
    channel_events: Vec<ChannelEventRow>,
    trigger_schedules: Vec<ScheduleRow>,
    broadcast_schedules: Vec<ScheduleRow>,
    broadcasts: Vec<BroadcastRow>,
    broadcast_contacts: HashMap<i64, Vec<BroadcastContactRow>>,
    broadcast_groups: HashMap<i64, Vec<BroadcastGroupRow>>,
    broadcast_urns: HashMap<i64, Vec<BroadcastUrnRow>>,
    label_folders: Vec<LabelRow>,
    labels: Vec<LabelRow>,
    messages: Vec<MsgRow>,
    flow_labels: Vec<FlowLabelRow>,
    flows: Vec<FlowRow>,
    flow_label_links: HashMap<i64, Vec<FlowLabelLinkRow>>,
    flow_revisions: HashMap<i64, Vec<FlowRevisionRow>>,
    flow_category_counts: HashMap<i64, Vec<FlowCategoryCountRow>>,
    flow_action_sets: HashMap<i64, Vec<ActionSetRow>>,
    flow_rule_sets: HashMap<i64, Vec<RuleSetRow>>,
    flow_field_dependencies: HashMap<i64, Vec<FieldDependencyRow>>,
    flow_group_dependencies: HashMap<i64, Vec<GroupDependencyRow>>,
    flow_flow_dependencies: HashMap<i64, Vec<FlowDependencyRow>>,
    flow_images: HashMap<i64, Vec<FlowImageRow>>,
    flow_starts: HashMap<i64, Vec<FlowStartRow>>,
    flow_start_contacts: HashMap<i64, Vec<StartContactRow>>,
    flow_start_groups: HashMap<i64, Vec<StartGroupRow>>,
    flow_runs: HashMap<i64, Vec<FlowRunRow>>,
    run_steps: HashMap<i64, Vec<FlowStepRow>>,
    resthooks: Vec<ResthookRow>,
    resthook_subscribers: HashMap<i64, Vec<ResthookSubscriberRow>>,
    webhook_events: Vec<WebhookEventRow>,
    webhook_results: HashMap<i64, Vec<WebhookResultRow>>,
    campaigns: Vec<CampaignRow>,
    campaign_events: HashMap<i64, Vec<CampaignEventRow>>,
    event_fires: HashMap<i64, Vec<EventFireRow>>,
    triggers: Vec<TriggerRow>,
    trigger_contacts: HashMap<i64, Vec<TriggerContactRow>>,
    trigger_groups: HashMap<i64, Vec<TriggerGroupRow>>,
    links: Vec<LinkRow>,
    link_contacts: HashMap<i64, Vec<LinkContactRow>>,
    calls: Arc<Mutex<Vec<String>>>,
    fail_once_on: Mutex<Option<String>>,
}

impl MockSourceReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_org(mut self, org: OrgRow) -> Self {
        self.org = Some(org);
        self
    }

    pub fn with_credit_grants(mut self, rows: Vec<CreditGrantRow>) -> Self {
        self.credit_grants = rows;
        self
    }

    pub fn with_credit_events(mut self, grant: i64, rows: Vec<CreditEventRow>) -> Self {
        self.credit_events.insert(grant, rows);
        self
    }

    pub fn with_languages(mut self, rows: Vec<LanguageRow>) -> Self {
        self.languages = rows;
        self
    }

    pub fn with_channels(mut self, rows: Vec<ChannelRow>) -> Self {
        self.channels = rows;
        self
    }

    pub fn with_sync_events(mut self, channel: i64, rows: Vec<SyncEventRow>) -> Self {
        self.sync_events.insert(channel, rows);
        self
    }

    pub fn with_channel_logs(mut self, channel: i64, rows: Vec<ChannelLogRow>) -> Self {
        self.channel_logs.insert(channel, rows);
        self
    }

    pub fn with_contact_fields(mut self, rows: Vec<ContactFieldRow>) -> Self {
        self.contact_fields = rows;
        self
    }

    pub fn with_contacts(mut self, rows: Vec<ContactRow>) -> Self {
        self.contacts = rows;
        self
    }

    pub fn with_contact_values(mut self, contact: i64, rows: Vec<ContactValueRow>) -> Self {
        self.contact_values.insert(contact, rows);
        self
    }

    pub fn with_contact_urns(mut self, contact: i64, rows: Vec<ContactUrnRow>) -> Self {
        self.contact_urns.insert(contact, rows);
        self
    }

    pub fn with_groups(mut self, rows: Vec<GroupRow>) -> Self {
        self.groups = rows;
        self
    }

    /// Add group membership from contact ids
    pub fn with_group_members(mut self, group: i64, contacts: Vec<i64>) -> Self {
        self.group_members.insert(
            group,
            contacts
                .into_iter()
                .map(|contact_id| GroupMemberRow { contact_id })
                .collect(),
        );
        self
    }

    pub fn with_channel_events(mut self, rows: Vec<ChannelEventRow>) -> Self {
        self.channel_events = rows;
        self
    }

    pub fn with_trigger_schedules(mut self, rows: Vec<ScheduleRow>) -> Self {
        self.trigger_schedules = rows;
        self
    }

    pub fn with_broadcast_schedules(mut self, rows: Vec<ScheduleRow>) -> Self {
        self.broadcast_schedules = rows;
        self
    }

    pub fn with_broadcasts(mut self, rows: Vec<BroadcastRow>) -> Self {
        self.broadcasts = rows;
        self
    }

    pub fn with_broadcast_contacts(mut self, broadcast: i64, contacts: Vec<i64>) -> Self {
        self.broadcast_contacts.insert(
            broadcast,
            contacts
                .into_iter()
                .map(|contact_id| BroadcastContactRow { contact_id })
                .collect(),
        );
        self
    }

    pub fn with_broadcast_groups(mut self, broadcast: i64, groups: Vec<i64>) -> Self {
        self.broadcast_groups.insert(
            broadcast,
            groups
                .into_iter()
                .map(|group_id| BroadcastGroupRow { group_id })
                .collect(),
        );
        self
    }

    pub fn with_broadcast_urns(mut self, broadcast: i64, urns: Vec<i64>) -> Self {
        self.broadcast_urns.insert(
            broadcast,
            urns.into_iter().map(|urn_id| BroadcastUrnRow { urn_id }).collect(),
        );
        self
    }

    pub fn with_label_folders(mut self, rows: Vec<LabelRow>) -> Self {
        self.label_folders = rows;
        self
    }

    pub fn with_labels(mut self, rows: Vec<LabelRow>) -> Self {
        self.labels = rows;
        self
    }

    pub fn with_messages(mut self, rows: Vec<MsgRow>) -> Self {
        self.messages = rows;
        self
    }

    pub fn with_flow_labels(mut self, rows: Vec<FlowLabelRow>) -> Self {
        self.flow_labels = rows;
        self
    }

    pub fn with_flows(mut self, rows: Vec<FlowRow>) -> Self {
        self.flows = rows;
        self
    }

    pub fn with_flow_label_links(mut self, flow: i64, labels: Vec<i64>) -> Self {
        self.flow_label_links.insert(
            flow,
            labels
                .into_iter()
                .map(|label_id| FlowLabelLinkRow { label_id })
                .collect(),
        );
        self
    }

    pub fn with_flow_revisions(mut self, flow: i64, rows: Vec<FlowRevisionRow>) -> Self {
        self.flow_revisions.insert(flow, rows);
        self
    }

    pub fn with_flow_category_counts(mut self, flow: i64, rows: Vec<FlowCategoryCountRow>) -> Self {
        self.flow_category_counts.insert(flow, rows);
        self
    }

    pub fn with_flow_action_sets(mut self, flow: i64, rows: Vec<ActionSetRow>) -> Self {
        self.flow_action_sets.insert(flow, rows);
        self
    }

    pub fn with_flow_rule_sets(mut self, flow: i64, rows: Vec<RuleSetRow>) -> Self {
        self.flow_rule_sets.insert(flow, rows);
        self
    }

    pub fn with_flow_field_dependencies(mut self, flow: i64, fields: Vec<i64>) -> Self {
        self.flow_field_dependencies.insert(
            flow,
            fields
                .into_iter()
                .map(|contact_field_id| FieldDependencyRow { contact_field_id })
                .collect(),
        );
        self
    }

    pub fn with_flow_group_dependencies(mut self, flow: i64, groups: Vec<i64>) -> Self {
        self.flow_group_dependencies.insert(
            flow,
            groups
                .into_iter()
                .map(|group_id| GroupDependencyRow { group_id })
                .collect(),
        );
        self
    }

    pub fn with_flow_flow_dependencies(mut self, flow: i64, flows: Vec<i64>) -> Self {
        self.flow_flow_dependencies.insert(
            flow,
            flows
                .into_iter()
                .map(|to_flow_id| FlowDependencyRow { to_flow_id })
                .collect(),
        );
        self
    }

    pub fn with_flow_images(mut self, flow: i64, rows: Vec<FlowImageRow>) -> Self {
        self.flow_images.insert(flow, rows);
        self
    }

    pub fn with_flow_starts(mut self, flow: i64, rows: Vec<FlowStartRow>) -> Self {
        self.flow_starts.insert(flow, rows);
        self
    }

    pub fn with_flow_start_contacts(mut self, start: i64, contacts: Vec<i64>) -> Self {
        self.flow_start_contacts.insert(
            start,
            contacts
                .into_iter()
                .map(|contact_id| StartContactRow { contact_id })
                .collect(),
        );
        self
    }

    pub fn with_flow_start_groups(mut self, start: i64, groups: Vec<i64>) -> Self {
        self.flow_start_groups.insert(
            start,
            groups
                .into_iter()
                .map(|group_id| StartGroupRow { group_id })
                .collect(),
        );
        self
    }

    pub fn with_flow_runs(mut self, flow: i64, rows: Vec<FlowRunRow>) -> Self {
        self.flow_runs.insert(flow, rows);
        self
    }

    pub fn with_run_steps(mut self, run: i64, rows: Vec<FlowStepRow>) -> Self {
        self.run_steps.insert(run, rows);
        self
    }

    pub fn with_resthooks(mut self, rows: Vec<ResthookRow>) -> Self {
        self.resthooks = rows;
        self
    }

    pub fn with_resthook_subscribers(
        mut self,
        resthook: i64,
        rows: Vec<ResthookSubscriberRow>,
    ) -> Self {
        self.resthook_subscribers.insert(resthook, rows);
        self
    }

    pub fn with_webhook_events(mut self, rows: Vec<WebhookEventRow>) -> Self {
        self.webhook_events = rows;
        self
    }

    pub fn with_webhook_results(mut self, event: i64, rows: Vec<WebhookResultRow>) -> Self {
        self.webhook_results.insert(event, rows);
        self
    }

    pub fn with_campaigns(mut self, rows: Vec<CampaignRow>) -> Self {
        self.campaigns = rows;
        self
    }

    pub fn with_campaign_events(mut self, campaign: i64, rows: Vec<CampaignEventRow>) -> Self {
        self.campaign_events.insert(campaign, rows);
        self
    }

    pub fn with_event_fires(mut self, event: i64, rows: Vec<EventFireRow>) -> Self {
        self.event_fires.insert(event, rows);
        self
    }

    pub fn with_triggers(mut self, rows: Vec<TriggerRow>) -> Self {
        self.triggers = rows;
        self
    }

    pub fn with_trigger_contacts(mut self, trigger: i64, contacts: Vec<i64>) -> Self {
        self.trigger_contacts.insert(
            trigger,
            contacts
                .into_iter()
                .map(|contact_id| TriggerContactRow { contact_id })
                .collect(),
        );
        self
    }

    pub fn with_trigger_groups(mut self, trigger: i64, groups: Vec<i64>) -> Self {
        self.trigger_groups.insert(
            trigger,
            groups
                .into_iter()
                .map(|group_id| TriggerGroupRow { group_id })
                .collect(),
        );
        self
    }

    pub fn with_links(mut self, rows: Vec<LinkRow>) -> Self {
        self.links = rows;
        self
    }

    pub fn with_link_contacts(mut self, link: i64, rows: Vec<LinkContactRow>) -> Self {
        self.link_contacts.insert(link, rows);
        self
    }

    /// The next call to the named reader method fails; later calls succeed.
    pub fn with_failure_once(self, method: &str) -> Self {
        *self.fail_once_on.lock().unwrap() = Some(method.to_string());
        self
    }

    /// Get all reader methods that were called, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Check if a reader method was called
    pub fn was_called(&self, method: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|m| m == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| *m == method).count()
    }

    fn track(&self, method: &str) -> Result<()> {
        self.calls.lock().unwrap().push(method.to_string());
        let mut fail = self.fail_once_on.lock().unwrap();
        if fail.as_deref() == Some(method) {
            *fail = None;
            bail!("injected {method} failure");
        }
        Ok(())
    }
}

#[async_trait]
impl SourceReader for MockSourceReader {
    async fn org(&self, _org: i64) -> Result<Option<OrgRow>> {
        self.track("org")?;
        Ok(self.org.clone())
    }

    async fn credit_grants(&self, _org: i64) -> Result<Vec<CreditGrantRow>> {
        self.track("credit_grants")?;
        Ok(self.credit_grants.clone())
    }

    async fn credit_events(&self, grant: i64) -> Result<Vec<CreditEventRow>> {
        self.track("credit_events")?;
        Ok(child(&self.credit_events, grant))
    }

    async fn languages(&self, _org: i64) -> Result<Vec<LanguageRow>> {
        self.track("languages")?;
        Ok(self.languages.clone())
    }

    async fn channels(&self, _org: i64, _window: SourceWindow) -> Result<Vec<ChannelRow>> {
        self.track("channels")?;
        Ok(self.channels.clone())
    }

    async fn sync_events(&self, channel: i64) -> Result<Vec<SyncEventRow>> {
        self.track("sync_events")?;
        Ok(child(&self.sync_events, channel))
    }

    async fn channel_logs(&self, channel: i64) -> Result<Vec<ChannelLogRow>> {
        self.track("channel_logs")?;
        Ok(child(&self.channel_logs, channel))
    }

    async fn contact_fields(
        &self,
        _org: i64,
        _window: SourceWindow,
    ) -> Result<Vec<ContactFieldRow>> {
        self.track("contact_fields")?;
        Ok(self.contact_fields.clone())
    }

    async fn contacts(&self, _org: i64, _window: SourceWindow) -> Result<Vec<ContactRow>> {
        self.track("contacts")?;
        Ok(self.contacts.clone())
    }

    async fn contact_values(&self, _org: i64, contact: i64) -> Result<Vec<ContactValueRow>> {
        self.track("contact_values")?;
        Ok(child(&self.contact_values, contact))
    }

    async fn contact_urns(&self, _org: i64, contact: i64) -> Result<Vec<ContactUrnRow>> {
        self.track("contact_urns")?;
        Ok(child(&self.contact_urns, contact))
    }

    async fn groups(&self, _org: i64, _window: SourceWindow) -> Result<Vec<GroupRow>> {
        self.track("groups")?;
        Ok(self.groups.clone())
    }

    async fn group_members(&self, group: i64) -> Result<Vec<GroupMemberRow>> {
        self.track("group_members")?;
        Ok(child(&self.group_members, group))
    }

    async fn channel_events(
        &self,
        _org: i64,
        _window: SourceWindow,
    ) -> Result<Vec<ChannelEventRow>> {
        self.track("channel_events")?;
        Ok(self.channel_events.clone())
    }

    async fn trigger_schedules(
        &self,
        _org: i64,
        _window: SourceWindow,
    ) -> Result<Vec<ScheduleRow>> {
        self.track("trigger_schedules")?;
        Ok(self.trigger_schedules.clone())
    }

    async fn broadcast_schedules(
        &self,
        _org: i64,
        _window: SourceWindow,
    ) -> Result<Vec<ScheduleRow>> {
        self.track("broadcast_schedules")?;
        Ok(self.broadcast_schedules.clone())
    }

    async fn broadcasts(&self, _org: i64) -> Result<Vec<BroadcastRow>> {
        self.track("broadcasts")?;
        Ok(self.broadcasts.clone())
    }

    async fn broadcast_contacts(&self, broadcast: i64) -> Result<Vec<BroadcastContactRow>> {
        self.track("broadcast_contacts")?;
        Ok(child(&self.broadcast_contacts, broadcast))
    }

    async fn broadcast_groups(&self, broadcast: i64) -> Result<Vec<BroadcastGroupRow>> {
        self.track("broadcast_groups")?;
        Ok(child(&self.broadcast_groups, broadcast))
    }

    async fn broadcast_urns(&self, broadcast: i64) -> Result<Vec<BroadcastUrnRow>> {
        self.track("broadcast_urns")?;
        Ok(child(&self.broadcast_urns, broadcast))
    }

    async fn label_folders(&self, _org: i64) -> Result<Vec<LabelRow>> {
        self.track("label_folders")?;
        Ok(self.label_folders.clone())
    }

    async fn labels(&self, _org: i64) -> Result<Vec<LabelRow>> {
        self.track("labels")?;
        Ok(self.labels.clone())
    }

    async fn messages(&self, _org: i64, _window: SourceWindow) -> Result<Vec<MsgRow>> {
        self.track("messages")?;
        Ok(self.messages.clone())
    }

    async fn flow_labels(&self, _org: i64) -> Result<Vec<FlowLabelRow>> {
        self.track("flow_labels")?;
        Ok(self.flow_labels.clone())
    }

    async fn flows(&self, _org: i64) -> Result<Vec<FlowRow>> {
        self.track("flows")?;
        Ok(self.flows.clone())
    }

    async fn flow_label_links(&self, flow: i64) -> Result<Vec<FlowLabelLinkRow>> {
        self.track("flow_label_links")?;
        Ok(child(&self.flow_label_links, flow))
    }

    async fn flow_revisions(&self, flow: i64) -> Result<Vec<FlowRevisionRow>> {
        self.track("flow_revisions")?;
        Ok(child(&self.flow_revisions, flow))
    }

    async fn flow_category_counts(&self, flow: i64) -> Result<Vec<FlowCategoryCountRow>> {
        self.track("flow_category_counts")?;
        Ok(child(&self.flow_category_counts, flow))
    }

    async fn flow_action_sets(&self, flow: i64) -> Result<Vec<ActionSetRow>> {
        self.track("flow_action_sets")?;
        Ok(child(&self.flow_action_sets, flow))
    }

    async fn flow_rule_sets(&self, flow: i64) -> Result<Vec<RuleSetRow>> {
        self.track("flow_rule_sets")?;
        Ok(child(&self.flow_rule_sets, flow))
    }

    async fn flow_field_dependencies(&self, flow: i64) -> Result<Vec<FieldDependencyRow>> {
        self.track("flow_field_dependencies")?;
        Ok(child(&self.flow_field_dependencies, flow))
    }

    async fn flow_group_dependencies(&self, flow: i64) -> Result<Vec<GroupDependencyRow>> {
        self.track("flow_group_dependencies")?;
        Ok(child(&self.flow_group_dependencies, flow))
    }

    async fn flow_flow_dependencies(&self, flow: i64) -> Result<Vec<FlowDependencyRow>> {
        self.track("flow_flow_dependencies")?;
        Ok(child(&self.flow_flow_dependencies, flow))
    }

    async fn flow_images(&self, flow: i64) -> Result<Vec<FlowImageRow>> {
        self.track("flow_images")?;
        Ok(child(&self.flow_images, flow))
    }

    async fn flow_starts(&self, flow: i64) -> Result<Vec<FlowStartRow>> {
        self.track("flow_starts")?;
        Ok(child(&self.flow_starts, flow))
    }

    async fn flow_start_contacts(&self, start: i64) -> Result<Vec<StartContactRow>> {
        self.track("flow_start_contacts")?;
        Ok(child(&self.flow_start_contacts, start))
    }

    async fn flow_start_groups(&self, start: i64) -> Result<Vec<StartGroupRow>> {
        self.track("flow_start_groups")?;
        Ok(child(&self.flow_start_groups, start))
    }

    async fn flow_runs(&self, flow: i64, _window: SourceWindow) -> Result<Vec<FlowRunRow>> {
        self.track("flow_runs")?;
        Ok(child(&self.flow_runs, flow))
    }

    async fn run_steps(&self, run: i64) -> Result<Vec<FlowStepRow>> {
        self.track("run_steps")?;
        Ok(child(&self.run_steps, run))
    }

    async fn resthooks(&self, _org: i64) -> Result<Vec<ResthookRow>> {
        self.track("resthooks")?;
        Ok(self.resthooks.clone())
    }

    async fn resthook_subscribers(&self, resthook: i64) -> Result<Vec<ResthookSubscriberRow>> {
        self.track("resthook_subscribers")?;
        Ok(child(&self.resthook_subscribers, resthook))
    }

    async fn webhook_events(&self, _org: i64) -> Result<Vec<WebhookEventRow>> {
        self.track("webhook_events")?;
        Ok(self.webhook_events.clone())
    }

    async fn webhook_results(&self, event: i64) -> Result<Vec<WebhookResultRow>> {
        self.track("webhook_results")?;
        Ok(child(&self.webhook_results, event))
    }

    async fn campaigns(&self, _org: i64) -> Result<Vec<CampaignRow>> {
        self.track("campaigns")?;
        Ok(self.campaigns.clone())
    }

    async fn campaign_events(&self, campaign: i64) -> Result<Vec<CampaignEventRow>> {
        self.track("campaign_events")?;
        Ok(child(&self.campaign_events, campaign))
    }

    async fn event_fires(&self, event: i64) -> Result<Vec<EventFireRow>> {
        self.track("event_fires")?;
        Ok(child(&self.event_fires, event))
    }

    async fn triggers(&self, _org: i64) -> Result<Vec<TriggerRow>> {
        self.track("triggers")?;
        Ok(self.triggers.clone())
    }

    async fn trigger_contacts(&self, trigger: i64) -> Result<Vec<TriggerContactRow>> {
        self.track("trigger_contacts")?;
        Ok(child(&self.trigger_contacts, trigger))
    }

    async fn trigger_groups(&self, trigger: i64) -> Result<Vec<TriggerGroupRow>> {
        self.track("trigger_groups")?;
        Ok(child(&self.trigger_groups, trigger))
    }

    async fn links(&self, _org: i64) -> Result<Vec<LinkRow>> {
        self.track("links")?;
        Ok(self.links.clone())
    }

    async fn link_contacts(&self, link: i64) -> Result<Vec<LinkContactRow>> {
        self.track("link_contacts")?;
        Ok(child(&self.link_contacts, link))
    }
}
