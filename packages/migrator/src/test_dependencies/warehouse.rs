// MockWarehouse - in-memory destination for engine and phase tests.
//
// Hands out sequential ids from 1000, remembers every id under its entity
// category for the `exists` gate, captures each write payload for assertions,
// and keeps uuid/name registries so find-by-uuid paths see rows created
// earlier, including rows created by a previous run over the same mock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::entity::EntityType;
use crate::warehouse::{records::*, Warehouse};

#[derive(Default)]
pub struct MockWarehouse {
    next_id: AtomicI64,
    existing: Mutex<HashSet<(EntityType, i64)>>,
    missing: Mutex<HashSet<(EntityType, i64)>>,
    ops: Mutex<Vec<String>>,

    contact_fields_by_uuid: Mutex<HashMap<Uuid, i64>>,
    contacts_by_uuid: Mutex<HashMap<Uuid, i64>>,
    urns_by_identity: Mutex<HashMap<String, i64>>,
    groups_by_uuid: Mutex<HashMap<Uuid, i64>>,
    folders_by_name: Mutex<HashMap<String, i64>>,
    labels_by_name: Mutex<HashMap<String, i64>>,
    flow_labels_by_uuid: Mutex<HashMap<Uuid, i64>>,
    flows_by_uuid: Mutex<HashMap<Uuid, i64>>,
    campaigns_by_uuid: Mutex<HashMap<Uuid, i64>>,
    campaign_events_by_uuid: Mutex<HashMap<(i64, Uuid), i64>>,
    conflicting_channels: Mutex<HashSet<(String, String)>>,
    upgrade_fails: bool,

    org_updates: Mutex<Vec<OrgProfile>>,
    smtp_configs: Mutex<Vec<SmtpConfig>>,
    primary_language: Mutex<Vec<Option<i64>>>,
    credit_grants: Mutex<Vec<NewCreditGrant>>,
    credit_events: Mutex<Vec<(i64, NewCreditEvent)>>,
    languages: Mutex<Vec<NewLanguage>>,
    channels: Mutex<Vec<NewChannel>>,
    count_clears: Mutex<Vec<(Option<String>, String)>>,
    sync_events: Mutex<Vec<(i64, NewSyncEvent)>>,
    channel_logs: Mutex<Vec<(i64, NewChannelLog)>>,
    contact_fields: Mutex<Vec<NewContactField>>,
    contact_field_updates: Mutex<Vec<(i64, String, String)>>,
    contacts: Mutex<Vec<NewContact>>,
    contact_updates: Mutex<Vec<(i64, ContactUpdate)>>,
    contact_timestamps: Mutex<Vec<(i64, DateTime<Utc>, DateTime<Utc>)>>,
    field_values: Mutex<Vec<(i64, i64, String)>>,
    urns: Mutex<Vec<(i64, NewUrn)>>,
    groups: Mutex<Vec<NewGroup>>,
    group_members: Mutex<Vec<(i64, i64)>>,
    channel_events: Mutex<Vec<NewChannelEvent>>,
    schedules: Mutex<Vec<NewSchedule>>,
    broadcasts: Mutex<Vec<NewBroadcast>>,
    broadcast_contacts: Mutex<Vec<(i64, i64)>>,
    broadcast_groups: Mutex<Vec<(i64, i64)>>,
    broadcast_urns: Mutex<Vec<(i64, i64)>>,
    folders: Mutex<Vec<String>>,
    labels: Mutex<Vec<NewLabel>>,
    messages: Mutex<Vec<NewMessage>>,
    flow_labels: Mutex<Vec<NewFlowLabel>>,
    flow_label_updates: Mutex<Vec<(i64, String, Option<i64>)>>,
    flows: Mutex<Vec<NewFlow>>,
    flow_updates: Mutex<Vec<(i64, FlowUpdate)>>,
    flow_dependencies: Mutex<Vec<(i64, Vec<i64>, Vec<i64>)>>,
    flow_flow_links: Mutex<Vec<(i64, Vec<i64>)>>,
    flow_label_links: Mutex<Vec<(i64, i64)>>,
    category_counts: Mutex<Vec<(i64, Vec<NewCategoryCount>)>>,
    action_sets: Mutex<Vec<(i64, Vec<NewActionSet>)>>,
    rule_sets: Mutex<Vec<(i64, Vec<NewRuleSet>)>>,
    revisions: Mutex<Vec<(i64, NewFlowRevision)>>,
    upgrades: Mutex<Vec<Value>>,
    flow_images: Mutex<Vec<(i64, NewFlowImage)>>,
    flow_starts: Mutex<Vec<(i64, NewFlowStart)>>,
    start_contacts: Mutex<Vec<(i64, i64)>>,
    start_groups: Mutex<Vec<(i64, i64)>>,
    flow_runs: Mutex<Vec<(i64, NewFlowRun)>>,
    resthooks: Mutex<Vec<NewResthook>>,
    subscribers: Mutex<Vec<(i64, NewSubscriber)>>,
    webhook_events: Mutex<Vec<NewWebhookEvent>>,
    webhook_results: Mutex<Vec<(i64, NewWebhookResult)>>,
    campaigns: Mutex<Vec<NewCampaign>>,
    campaign_updates: Mutex<Vec<(i64, String, i64)>>,
    campaign_events: Mutex<Vec<(i64, NewCampaignEvent)>>,
    event_fires: Mutex<Vec<(i64, NewEventFire)>>,
    triggers: Mutex<Vec<NewTrigger>>,
    trigger_contacts: Mutex<Vec<(i64, i64)>>,
    trigger_groups: Mutex<Vec<(i64, i64)>>,
    links: Mutex<Vec<NewLink>>,
    link_contacts: Mutex<Vec<(i64, NewLinkContact)>>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        // Destination ids start well above the source ids tests use, so a
        // source id leaking through a mapping is visible in assertions.
        Self {
            next_id: AtomicI64::new(1_000),
            ..Self::default()
        }
    }

    fn next(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn allocate(&self, entity: EntityType) -> i64 {
        let id = self.next();
        self.existing.lock().unwrap().insert((entity, id));
        id
    }

    fn op(&self, name: &str) {
        self.ops.lock().unwrap().push(name.to_string());
    }

    // ---- builders ----

    /// Mark a destination row as present for the `exists` gate.
    pub fn with_existing(self, entity: EntityType, id: i64) -> Self {
        self.existing.lock().unwrap().insert((entity, id));
        self
    }

    /// Force the `exists` gate to report a row as gone even if created here.
    pub fn with_missing(self, entity: EntityType, id: i64) -> Self {
        self.missing.lock().unwrap().insert((entity, id));
        self
    }

    pub fn with_existing_contact(self, uuid: Uuid, id: i64) -> Self {
        self.contacts_by_uuid.lock().unwrap().insert(uuid, id);
        self.with_existing(EntityType::Contact, id)
    }

    pub fn with_existing_contact_field(self, uuid: Uuid, id: i64) -> Self {
        self.contact_fields_by_uuid.lock().unwrap().insert(uuid, id);
        self.with_existing(EntityType::ContactField, id)
    }

    pub fn with_existing_group(self, uuid: Uuid, id: i64) -> Self {
        self.groups_by_uuid.lock().unwrap().insert(uuid, id);
        self.with_existing(EntityType::ContactGroup, id)
    }

    pub fn with_existing_folder(self, name: &str, id: i64) -> Self {
        self.folders_by_name.lock().unwrap().insert(name.to_string(), id);
        self.with_existing(EntityType::Label, id)
    }

    pub fn with_existing_label(self, name: &str, id: i64) -> Self {
        self.labels_by_name.lock().unwrap().insert(name.to_string(), id);
        self.with_existing(EntityType::Label, id)
    }

    pub fn with_existing_flow_label(self, uuid: Uuid, id: i64) -> Self {
        self.flow_labels_by_uuid.lock().unwrap().insert(uuid, id);
        self.with_existing(EntityType::FlowLabel, id)
    }

    pub fn with_existing_flow(self, uuid: Uuid, id: i64) -> Self {
        self.flows_by_uuid.lock().unwrap().insert(uuid, id);
        self.with_existing(EntityType::Flow, id)
    }

    pub fn with_existing_campaign(self, uuid: Uuid, id: i64) -> Self {
        self.campaigns_by_uuid.lock().unwrap().insert(uuid, id);
        self.with_existing(EntityType::Campaign, id)
    }

    pub fn with_existing_campaign_event(self, campaign: i64, uuid: Uuid, id: i64) -> Self {
        self.campaign_events_by_uuid
            .lock()
            .unwrap()
            .insert((campaign, uuid), id);
        self.with_existing(EntityType::CampaignEvent, id)
    }

    /// An active channel elsewhere already claims this address/type pair.
    pub fn with_conflicting_channel(self, address: &str, channel_type: &str) -> Self {
        self.conflicting_channels
            .lock()
            .unwrap()
            .insert((address.to_string(), channel_type.to_string()));
        self
    }

    /// Definition upgrades fail; revisions fall back to the raw definition.
    pub fn with_upgrade_failure(mut self) -> Self {
        self.upgrade_fails = true;
        self
    }

    // ---- accessors ----

    /// Preparation operations that ran, in order
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    /// Check if a preparation operation ran
    pub fn was_prepared(&self, op: &str) -> bool {
        self.ops.lock().unwrap().iter().any(|o| o == op)
    }

    pub fn prepare_count(&self, op: &str) -> usize {
        self.ops.lock().unwrap().iter().filter(|o| *o == op).count()
    }

    pub fn org_updates(&self) -> Vec<OrgProfile> {
        self.org_updates.lock().unwrap().clone()
    }

    pub fn smtp_configs(&self) -> Vec<SmtpConfig> {
        self.smtp_configs.lock().unwrap().clone()
    }

    /// Primary-language history: `None` for clears, `Some(id)` for sets.
    pub fn primary_language_changes(&self) -> Vec<Option<i64>> {
        self.primary_language.lock().unwrap().clone()
    }

    pub fn created_credit_grants(&self) -> Vec<NewCreditGrant> {
        self.credit_grants.lock().unwrap().clone()
    }

    pub fn created_credit_events(&self) -> Vec<(i64, NewCreditEvent)> {
        self.credit_events.lock().unwrap().clone()
    }

    pub fn created_languages(&self) -> Vec<NewLanguage> {
        self.languages.lock().unwrap().clone()
    }

    pub fn created_channels(&self) -> Vec<NewChannel> {
        self.channels.lock().unwrap().clone()
    }

    pub fn cleared_channel_counts(&self) -> Vec<(Option<String>, String)> {
        self.count_clears.lock().unwrap().clone()
    }

    pub fn created_sync_events(&self) -> Vec<(i64, NewSyncEvent)> {
        self.sync_events.lock().unwrap().clone()
    }

    pub fn created_channel_logs(&self) -> Vec<(i64, NewChannelLog)> {
        self.channel_logs.lock().unwrap().clone()
    }

    pub fn created_contact_fields(&self) -> Vec<NewContactField> {
        self.contact_fields.lock().unwrap().clone()
    }

    pub fn contact_field_updates(&self) -> Vec<(i64, String, String)> {
        self.contact_field_updates.lock().unwrap().clone()
    }

    pub fn created_contacts(&self) -> Vec<NewContact> {
        self.contacts.lock().unwrap().clone()
    }

    pub fn contact_updates(&self) -> Vec<(i64, ContactUpdate)> {
        self.contact_updates.lock().unwrap().clone()
    }

    pub fn contact_timestamps(&self) -> Vec<(i64, DateTime<Utc>, DateTime<Utc>)> {
        self.contact_timestamps.lock().unwrap().clone()
    }

    /// `(contact, field, value)` triples written through `set_contact_field`.
    pub fn field_values(&self) -> Vec<(i64, i64, String)> {
        self.field_values.lock().unwrap().clone()
    }

    pub fn upserted_urns(&self) -> Vec<(i64, NewUrn)> {
        self.urns.lock().unwrap().clone()
    }

    pub fn upserted_groups(&self) -> Vec<NewGroup> {
        self.groups.lock().unwrap().clone()
    }

    pub fn group_members(&self) -> Vec<(i64, i64)> {
        self.group_members.lock().unwrap().clone()
    }

    pub fn created_channel_events(&self) -> Vec<NewChannelEvent> {
        self.channel_events.lock().unwrap().clone()
    }

    pub fn created_schedules(&self) -> Vec<NewSchedule> {
        self.schedules.lock().unwrap().clone()
    }

    pub fn created_broadcasts(&self) -> Vec<NewBroadcast> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub fn broadcast_contacts(&self) -> Vec<(i64, i64)> {
        self.broadcast_contacts.lock().unwrap().clone()
    }

    pub fn broadcast_groups(&self) -> Vec<(i64, i64)> {
        self.broadcast_groups.lock().unwrap().clone()
    }

    pub fn broadcast_urns(&self) -> Vec<(i64, i64)> {
        self.broadcast_urns.lock().unwrap().clone()
    }

    pub fn upserted_folders(&self) -> Vec<String> {
        self.folders.lock().unwrap().clone()
    }

    pub fn upserted_labels(&self) -> Vec<NewLabel> {
        self.labels.lock().unwrap().clone()
    }

    pub fn created_messages(&self) -> Vec<NewMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn created_flow_labels(&self) -> Vec<NewFlowLabel> {
        self.flow_labels.lock().unwrap().clone()
    }

    pub fn flow_label_updates(&self) -> Vec<(i64, String, Option<i64>)> {
        self.flow_label_updates.lock().unwrap().clone()
    }

    pub fn created_flows(&self) -> Vec<NewFlow> {
        self.flows.lock().unwrap().clone()
    }

    pub fn flow_updates(&self) -> Vec<(i64, FlowUpdate)> {
        self.flow_updates.lock().unwrap().clone()
    }

    /// `(flow, field ids, group ids)` from `set_flow_dependencies`.
    pub fn flow_dependency_sets(&self) -> Vec<(i64, Vec<i64>, Vec<i64>)> {
        self.flow_dependencies.lock().unwrap().clone()
    }

    pub fn linked_flow_dependencies(&self) -> Vec<(i64, Vec<i64>)> {
        self.flow_flow_links.lock().unwrap().clone()
    }

    pub fn flow_label_links(&self) -> Vec<(i64, i64)> {
        self.flow_label_links.lock().unwrap().clone()
    }

    pub fn replaced_category_counts(&self) -> Vec<(i64, Vec<NewCategoryCount>)> {
        self.category_counts.lock().unwrap().clone()
    }

    pub fn replaced_action_sets(&self) -> Vec<(i64, Vec<NewActionSet>)> {
        self.action_sets.lock().unwrap().clone()
    }

    pub fn replaced_rule_sets(&self) -> Vec<(i64, Vec<NewRuleSet>)> {
        self.rule_sets.lock().unwrap().clone()
    }

    pub fn created_revisions(&self) -> Vec<(i64, NewFlowRevision)> {
        self.revisions.lock().unwrap().clone()
    }

    /// Envelopes handed to the definition upgrade, in order.
    pub fn upgraded_definitions(&self) -> Vec<Value> {
        self.upgrades.lock().unwrap().clone()
    }

    pub fn created_flow_images(&self) -> Vec<(i64, NewFlowImage)> {
        self.flow_images.lock().unwrap().clone()
    }

    pub fn created_flow_starts(&self) -> Vec<(i64, NewFlowStart)> {
        self.flow_starts.lock().unwrap().clone()
    }

    pub fn start_contacts(&self) -> Vec<(i64, i64)> {
        self.start_contacts.lock().unwrap().clone()
    }

    pub fn start_groups(&self) -> Vec<(i64, i64)> {
        self.start_groups.lock().unwrap().clone()
    }

    pub fn created_flow_runs(&self) -> Vec<(i64, NewFlowRun)> {
        self.flow_runs.lock().unwrap().clone()
    }

    pub fn created_resthooks(&self) -> Vec<NewResthook> {
        self.resthooks.lock().unwrap().clone()
    }

    pub fn created_subscribers(&self) -> Vec<(i64, NewSubscriber)> {
        self.subscribers.lock().unwrap().clone()
    }

    pub fn created_webhook_events(&self) -> Vec<NewWebhookEvent> {
        self.webhook_events.lock().unwrap().clone()
    }

    pub fn created_webhook_results(&self) -> Vec<(i64, NewWebhookResult)> {
        self.webhook_results.lock().unwrap().clone()
    }

    pub fn created_campaigns(&self) -> Vec<NewCampaign> {
        self.campaigns.lock().unwrap().clone()
    }

    /// `(campaign, name, group)` from `update_campaign`.
    pub fn campaign_updates(&self) -> Vec<(i64, String, i64)> {
        self.campaign_updates.lock().unwrap().clone()
    }

    pub fn created_campaign_events(&self) -> Vec<(i64, NewCampaignEvent)> {
        self.campaign_events.lock().unwrap().clone()
    }

    pub fn created_event_fires(&self) -> Vec<(i64, NewEventFire)> {
        self.event_fires.lock().unwrap().clone()
    }

    pub fn created_triggers(&self) -> Vec<NewTrigger> {
        self.triggers.lock().unwrap().clone()
    }

    pub fn trigger_contacts(&self) -> Vec<(i64, i64)> {
        self.trigger_contacts.lock().unwrap().clone()
    }

    pub fn trigger_groups(&self) -> Vec<(i64, i64)> {
        self.trigger_groups.lock().unwrap().clone()
    }

    pub fn created_links(&self) -> Vec<NewLink> {
        self.links.lock().unwrap().clone()
    }

    pub fn created_link_contacts(&self) -> Vec<(i64, NewLinkContact)> {
        self.link_contacts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn exists(&self, entity: EntityType, _org: i64, id: i64) -> Result<bool> {
        if self.missing.lock().unwrap().contains(&(entity, id)) {
            return Ok(false);
        }
        Ok(self.existing.lock().unwrap().contains(&(entity, id)))
    }

    // ==== organization ====

    async fn update_org(&self, _org: i64, profile: &OrgProfile) -> Result<()> {
        self.org_updates.lock().unwrap().push(profile.clone());
        Ok(())
    }

    async fn configure_smtp(&self, _org: i64, smtp: &SmtpConfig) -> Result<()> {
        self.smtp_configs.lock().unwrap().push(smtp.clone());
        Ok(())
    }

    async fn set_primary_language(&self, _org: i64, language: i64) -> Result<()> {
        self.primary_language.lock().unwrap().push(Some(language));
        Ok(())
    }

    async fn clear_primary_language(&self, _org: i64) -> Result<()> {
        self.primary_language.lock().unwrap().push(None);
        Ok(())
    }

    async fn deactivate_credit_grants(&self, _org: i64) -> Result<()> {
        self.op("deactivate_credit_grants");
        Ok(())
    }

    async fn create_credit_grant(&self, _org: i64, grant: &NewCreditGrant) -> Result<i64> {
        self.credit_grants.lock().unwrap().push(grant.clone());
        Ok(self.allocate(EntityType::CreditGrant))
    }

    async fn create_credit_event(&self, grant: i64, event: &NewCreditEvent) -> Result<i64> {
        self.credit_events.lock().unwrap().push((grant, event.clone()));
        Ok(self.next())
    }

    async fn delete_languages(&self, _org: i64) -> Result<()> {
        self.op("delete_languages");
        Ok(())
    }

    async fn create_language(&self, _org: i64, language: &NewLanguage) -> Result<i64> {
        self.languages.lock().unwrap().push(language.clone());
        Ok(self.allocate(EntityType::Language))
    }

    // ==== channels ====

    async fn neutralize_channels(&self, _org: i64) -> Result<()> {
        self.op("neutralize_channels");
        Ok(())
    }

    async fn create_channel(&self, _org: i64, channel: &NewChannel) -> Result<CreateResult> {
        if let Some(address) = &channel.address {
            let clash = self
                .conflicting_channels
                .lock()
                .unwrap()
                .contains(&(address.clone(), channel.channel_type.clone()));
            if clash {
                return Ok(CreateResult::Conflict);
            }
        }
        self.channels.lock().unwrap().push(channel.clone());
        Ok(CreateResult::Created(self.allocate(EntityType::Channel)))
    }

    async fn clear_channel_counts(
        &self,
        _org: i64,
        address: Option<&str>,
        channel_type: &str,
    ) -> Result<()> {
        self.count_clears
            .lock()
            .unwrap()
            .push((address.map(str::to_string), channel_type.to_string()));
        Ok(())
    }

    async fn create_sync_event(&self, channel: i64, event: &NewSyncEvent) -> Result<i64> {
        self.sync_events.lock().unwrap().push((channel, event.clone()));
        Ok(self.next())
    }

    async fn create_channel_log(&self, channel: i64, log: &NewChannelLog) -> Result<i64> {
        self.channel_logs.lock().unwrap().push((channel, log.clone()));
        Ok(self.next())
    }

    // ==== contact fields ====

    async fn find_contact_field(&self, _org: i64, uuid: Uuid) -> Result<Option<i64>> {
        Ok(self.contact_fields_by_uuid.lock().unwrap().get(&uuid).copied())
    }

    async fn create_contact_field(&self, _org: i64, field: &NewContactField) -> Result<i64> {
        self.contact_fields.lock().unwrap().push(field.clone());
        let id = self.allocate(EntityType::ContactField);
        self.contact_fields_by_uuid.lock().unwrap().insert(field.uuid, id);
        Ok(id)
    }

    async fn update_contact_field(
        &self,
        _org: i64,
        field: i64,
        key: &str,
        label: &str,
    ) -> Result<()> {
        self.contact_field_updates
            .lock()
            .unwrap()
            .push((field, key.to_string(), label.to_string()));
        Ok(())
    }

    // ==== contacts ====

    async fn find_contact(&self, _org: i64, uuid: Uuid) -> Result<Option<i64>> {
        Ok(self.contacts_by_uuid.lock().unwrap().get(&uuid).copied())
    }

    async fn create_contact(&self, _org: i64, contact: &NewContact) -> Result<i64> {
        self.contacts.lock().unwrap().push(contact.clone());
        let id = self.allocate(EntityType::Contact);
        self.contacts_by_uuid.lock().unwrap().insert(contact.uuid, id);
        Ok(id)
    }

    async fn update_contact(
        &self,
        _org: i64,
        contact: i64,
        update: &ContactUpdate,
    ) -> Result<()> {
        self.contact_updates.lock().unwrap().push((contact, update.clone()));
        Ok(())
    }

    async fn set_contact_timestamps(
        &self,
        _org: i64,
        contact: i64,
        created_on: DateTime<Utc>,
        modified_on: DateTime<Utc>,
    ) -> Result<()> {
        self.contact_timestamps
            .lock()
            .unwrap()
            .push((contact, created_on, modified_on));
        Ok(())
    }

    async fn set_contact_field(
        &self,
        _org: i64,
        contact: i64,
        field: i64,
        value: &str,
    ) -> Result<()> {
        self.field_values
            .lock()
            .unwrap()
            .push((contact, field, value.to_string()));
        Ok(())
    }

    async fn upsert_urn(&self, _org: i64, contact: i64, urn: &NewUrn) -> Result<i64> {
        self.urns.lock().unwrap().push((contact, urn.clone()));
        let existing = self.urns_by_identity.lock().unwrap().get(&urn.identity).copied();
        if let Some(id) = existing {
            return Ok(id);
        }
        let id = self.allocate(EntityType::ContactUrn);
        self.urns_by_identity.lock().unwrap().insert(urn.identity.clone(), id);
        Ok(id)
    }

    // ==== groups ====

    async fn release_groups(&self, _org: i64) -> Result<()> {
        self.op("release_groups");
        Ok(())
    }

    async fn upsert_group(&self, _org: i64, group: &NewGroup) -> Result<Upserted> {
        self.groups.lock().unwrap().push(group.clone());
        let existing = self.groups_by_uuid.lock().unwrap().get(&group.uuid).copied();
        match existing {
            Some(id) => Ok(Upserted { id, created: false }),
            None => {
                let id = self.allocate(EntityType::ContactGroup);
                self.groups_by_uuid.lock().unwrap().insert(group.uuid, id);
                Ok(Upserted { id, created: true })
            }
        }
    }

    async fn add_group_member(&self, group: i64, contact: i64) -> Result<()> {
        self.group_members.lock().unwrap().push((group, contact));
        Ok(())
    }

    // ==== channel events ====

    async fn clear_channel_events(&self, _org: i64) -> Result<()> {
        self.op("clear_channel_events");
        Ok(())
    }

    async fn create_channel_event(&self, _org: i64, event: &NewChannelEvent) -> Result<i64> {
        self.channel_events.lock().unwrap().push(event.clone());
        Ok(self.next())
    }

    // ==== schedules ====

    async fn deactivate_schedules(&self, _org: i64) -> Result<()> {
        self.op("deactivate_schedules");
        Ok(())
    }

    async fn create_schedule(&self, _org: i64, schedule: &NewSchedule) -> Result<i64> {
        self.schedules.lock().unwrap().push(schedule.clone());
        Ok(self.allocate(EntityType::Schedule))
    }

    // ==== broadcasts ====

    async fn deactivate_broadcasts(&self, _org: i64) -> Result<()> {
        self.op("deactivate_broadcasts");
        Ok(())
    }

    async fn create_broadcast(&self, _org: i64, broadcast: &NewBroadcast) -> Result<i64> {
        self.broadcasts.lock().unwrap().push(broadcast.clone());
        Ok(self.allocate(EntityType::Broadcast))
    }

    async fn add_broadcast_contact(&self, broadcast: i64, contact: i64) -> Result<()> {
        self.broadcast_contacts.lock().unwrap().push((broadcast, contact));
        Ok(())
    }

    async fn add_broadcast_group(&self, broadcast: i64, group: i64) -> Result<()> {
        self.broadcast_groups.lock().unwrap().push((broadcast, group));
        Ok(())
    }

    async fn add_broadcast_urn(&self, broadcast: i64, urn: i64) -> Result<()> {
        self.broadcast_urns.lock().unwrap().push((broadcast, urn));
        Ok(())
    }

    // ==== labels ====

    async fn upsert_label_folder(&self, _org: i64, name: &str) -> Result<Upserted> {
        self.folders.lock().unwrap().push(name.to_string());
        let existing = self.folders_by_name.lock().unwrap().get(name).copied();
        match existing {
            Some(id) => Ok(Upserted { id, created: false }),
            None => {
                let id = self.allocate(EntityType::Label);
                self.folders_by_name.lock().unwrap().insert(name.to_string(), id);
                Ok(Upserted { id, created: true })
            }
        }
    }

    async fn upsert_label(&self, _org: i64, label: &NewLabel) -> Result<Upserted> {
        self.labels.lock().unwrap().push(label.clone());
        let existing = self.labels_by_name.lock().unwrap().get(&label.name).copied();
        match existing {
            Some(id) => Ok(Upserted { id, created: false }),
            None => {
                let id = self.allocate(EntityType::Label);
                self.labels_by_name.lock().unwrap().insert(label.name.clone(), id);
                Ok(Upserted { id, created: true })
            }
        }
    }

    // ==== messages ====

    async fn release_messages(&self, _org: i64) -> Result<()> {
        self.op("release_messages");
        Ok(())
    }

    async fn bulk_create_messages(
        &self,
        _org: i64,
        messages: &[NewMessage],
    ) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(messages.len());
        for message in messages {
            self.messages.lock().unwrap().push(message.clone());
            ids.push(self.allocate(EntityType::Message));
        }
        Ok(ids)
    }

    // ==== flow labels ====

    async fn find_flow_label(&self, _org: i64, uuid: Uuid) -> Result<Option<i64>> {
        Ok(self.flow_labels_by_uuid.lock().unwrap().get(&uuid).copied())
    }

    async fn create_flow_label(&self, _org: i64, label: &NewFlowLabel) -> Result<i64> {
        self.flow_labels.lock().unwrap().push(label.clone());
        let id = self.allocate(EntityType::FlowLabel);
        self.flow_labels_by_uuid.lock().unwrap().insert(label.uuid, id);
        Ok(id)
    }

    async fn update_flow_label(
        &self,
        _org: i64,
        label: i64,
        name: &str,
        parent: Option<i64>,
    ) -> Result<()> {
        self.flow_label_updates
            .lock()
            .unwrap()
            .push((label, name.to_string(), parent));
        Ok(())
    }

    // ==== flows ====

    async fn find_flow(&self, _org: i64, uuid: Uuid) -> Result<Option<i64>> {
        Ok(self.flows_by_uuid.lock().unwrap().get(&uuid).copied())
    }

    async fn create_flow(&self, _org: i64, flow: &NewFlow) -> Result<i64> {
        self.flows.lock().unwrap().push(flow.clone());
        let id = self.allocate(EntityType::Flow);
        self.flows_by_uuid.lock().unwrap().insert(flow.uuid, id);
        Ok(id)
    }

    async fn update_flow(&self, _org: i64, flow: i64, update: &FlowUpdate) -> Result<()> {
        self.flow_updates.lock().unwrap().push((flow, update.clone()));
        Ok(())
    }

    async fn set_flow_dependencies(
        &self,
        flow: i64,
        fields: &[i64],
        groups: &[i64],
    ) -> Result<()> {
        self.flow_dependencies
            .lock()
            .unwrap()
            .push((flow, fields.to_vec(), groups.to_vec()));
        Ok(())
    }

    async fn link_flow_dependencies(&self, flow: i64, flows: &[i64]) -> Result<()> {
        self.flow_flow_links.lock().unwrap().push((flow, flows.to_vec()));
        Ok(())
    }

    async fn add_flow_label(&self, flow: i64, label: i64) -> Result<()> {
        self.flow_label_links.lock().unwrap().push((flow, label));
        Ok(())
    }

    async fn replace_category_counts(
        &self,
        flow: i64,
        counts: &[NewCategoryCount],
    ) -> Result<()> {
        self.category_counts.lock().unwrap().push((flow, counts.to_vec()));
        Ok(())
    }

    async fn replace_action_sets(&self, flow: i64, sets: &[NewActionSet]) -> Result<()> {
        self.action_sets.lock().unwrap().push((flow, sets.to_vec()));
        Ok(())
    }

    async fn replace_rule_sets(&self, flow: i64, sets: &[NewRuleSet]) -> Result<()> {
        self.rule_sets.lock().unwrap().push((flow, sets.to_vec()));
        Ok(())
    }

    async fn delete_revisions(&self, _flow: i64) -> Result<()> {
        self.op("delete_revisions");
        Ok(())
    }

    async fn create_revision(&self, flow: i64, revision: &NewFlowRevision) -> Result<i64> {
        self.revisions.lock().unwrap().push((flow, revision.clone()));
        Ok(self.next())
    }

    async fn upgrade_flow_definition(&self, _org: i64, definition: &Value) -> Result<Value> {
        self.upgrades.lock().unwrap().push(definition.clone());
        if self.upgrade_fails {
            bail!("injected definition-upgrade failure");
        }
        Ok(definition.clone())
    }

    async fn delete_flow_images(&self, _flow: i64) -> Result<()> {
        self.op("delete_flow_images");
        Ok(())
    }

    async fn create_flow_image(
        &self,
        _org: i64,
        flow: i64,
        image: &NewFlowImage,
    ) -> Result<i64> {
        self.flow_images.lock().unwrap().push((flow, image.clone()));
        Ok(self.next())
    }

    async fn release_flow_starts(&self, _flow: i64) -> Result<()> {
        self.op("release_flow_starts");
        Ok(())
    }

    async fn create_flow_start(&self, flow: i64, start: &NewFlowStart) -> Result<i64> {
        self.flow_starts.lock().unwrap().push((flow, start.clone()));
        Ok(self.allocate(EntityType::FlowStart))
    }

    async fn add_start_contact(&self, start: i64, contact: i64) -> Result<()> {
        self.start_contacts.lock().unwrap().push((start, contact));
        Ok(())
    }

    async fn add_start_group(&self, start: i64, group: i64) -> Result<()> {
        self.start_groups.lock().unwrap().push((start, group));
        Ok(())
    }

    async fn release_flow_runs(&self, _flow: i64) -> Result<()> {
        self.op("release_flow_runs");
        Ok(())
    }

    async fn create_flow_run(&self, _org: i64, flow: i64, run: &NewFlowRun) -> Result<i64> {
        self.flow_runs.lock().unwrap().push((flow, run.clone()));
        Ok(self.allocate(EntityType::FlowRun))
    }

    // ==== resthooks / webhooks ====

    async fn release_resthooks(&self, _org: i64) -> Result<()> {
        self.op("release_resthooks");
        Ok(())
    }

    async fn create_resthook(&self, _org: i64, resthook: &NewResthook) -> Result<i64> {
        self.resthooks.lock().unwrap().push(resthook.clone());
        Ok(self.allocate(EntityType::Resthook))
    }

    async fn create_resthook_subscriber(
        &self,
        resthook: i64,
        subscriber: &NewSubscriber,
    ) -> Result<i64> {
        self.subscribers.lock().unwrap().push((resthook, subscriber.clone()));
        Ok(self.next())
    }

    async fn release_webhook_events(&self, _org: i64) -> Result<()> {
        self.op("release_webhook_events");
        Ok(())
    }

    async fn create_webhook_event(&self, _org: i64, event: &NewWebhookEvent) -> Result<i64> {
        self.webhook_events.lock().unwrap().push(event.clone());
        Ok(self.allocate(EntityType::WebhookEvent))
    }

    async fn create_webhook_result(
        &self,
        event: i64,
        result: &NewWebhookResult,
    ) -> Result<i64> {
        self.webhook_results.lock().unwrap().push((event, result.clone()));
        Ok(self.next())
    }

    // ==== campaigns ====

    async fn find_campaign(&self, _org: i64, uuid: Uuid) -> Result<Option<i64>> {
        Ok(self.campaigns_by_uuid.lock().unwrap().get(&uuid).copied())
    }

    async fn create_campaign(&self, _org: i64, campaign: &NewCampaign) -> Result<i64> {
        self.campaigns.lock().unwrap().push(campaign.clone());
        let id = self.allocate(EntityType::Campaign);
        self.campaigns_by_uuid.lock().unwrap().insert(campaign.uuid, id);
        Ok(id)
    }

    async fn update_campaign(
        &self,
        _org: i64,
        campaign: i64,
        name: &str,
        group: i64,
    ) -> Result<()> {
        self.campaign_updates
            .lock()
            .unwrap()
            .push((campaign, name.to_string(), group));
        Ok(())
    }

    async fn find_campaign_event(&self, campaign: i64, uuid: Uuid) -> Result<Option<i64>> {
        Ok(self
            .campaign_events_by_uuid
            .lock()
            .unwrap()
            .get(&(campaign, uuid))
            .copied())
    }

    async fn create_campaign_event(
        &self,
        campaign: i64,
        event: &NewCampaignEvent,
    ) -> Result<i64> {
        self.campaign_events.lock().unwrap().push((campaign, event.clone()));
        let id = self.allocate(EntityType::CampaignEvent);
        self.campaign_events_by_uuid
            .lock()
            .unwrap()
            .insert((campaign, event.uuid), id);
        Ok(id)
    }

    async fn create_event_fire(&self, event: i64, fire: &NewEventFire) -> Result<i64> {
        self.event_fires.lock().unwrap().push((event, fire.clone()));
        Ok(self.next())
    }

    // ==== triggers ====

    async fn release_triggers(&self, _org: i64) -> Result<()> {
        self.op("release_triggers");
        Ok(())
    }

    async fn create_trigger(&self, _org: i64, trigger: &NewTrigger) -> Result<i64> {
        self.triggers.lock().unwrap().push(trigger.clone());
        Ok(self.allocate(EntityType::Trigger))
    }

    async fn add_trigger_contact(&self, trigger: i64, contact: i64) -> Result<()> {
        self.trigger_contacts.lock().unwrap().push((trigger, contact));
        Ok(())
    }

    async fn add_trigger_group(&self, trigger: i64, group: i64) -> Result<()> {
        self.trigger_groups.lock().unwrap().push((trigger, group));
        Ok(())
    }

    // ==== links ====

    async fn delete_links(&self, _org: i64) -> Result<()> {
        self.op("delete_links");
        Ok(())
    }

    async fn create_link(&self, _org: i64, link: &NewLink) -> Result<i64> {
        self.links.lock().unwrap().push(link.clone());
        Ok(self.allocate(EntityType::Link))
    }

    async fn create_link_contact(&self, link: i64, contact: &NewLinkContact) -> Result<i64> {
        self.link_contacts.lock().unwrap().push((link, contact.clone()));
        Ok(self.next())
    }
}
