//! Destination-side persistence.
//!
//! The [`Warehouse`] trait is the only door the phases have into the new
//! deployment: per-entity creates and upserts returning fresh ids, the
//! preparation operations that neutralize pre-existing state, the existence
//! check backing identity resolution, and the flow definition-upgrade hook.

pub mod records;

pub use records::*;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::entity::EntityType;

/// Rows per INSERT statement when bulk-writing messages; keeps the bind count
/// well under the Postgres protocol limit.
const MESSAGE_INSERT_CHUNK: usize = 500;

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Whether the mapped destination record still exists. Scoped to the
    /// destination org except for organizations and flow starts.
    async fn exists(&self, entity: EntityType, org: i64, id: i64) -> Result<bool>;

    // ==== organization ====

    async fn update_org(&self, org: i64, profile: &OrgProfile) -> Result<()>;
    async fn configure_smtp(&self, org: i64, smtp: &SmtpConfig) -> Result<()>;
    async fn set_primary_language(&self, org: i64, language: i64) -> Result<()>;
    async fn clear_primary_language(&self, org: i64) -> Result<()>;
    async fn deactivate_credit_grants(&self, org: i64) -> Result<()>;
    async fn create_credit_grant(&self, org: i64, grant: &NewCreditGrant) -> Result<i64>;
    async fn create_credit_event(&self, grant: i64, event: &NewCreditEvent) -> Result<i64>;
    async fn delete_languages(&self, org: i64) -> Result<()>;
    async fn create_language(&self, org: i64, language: &NewLanguage) -> Result<i64>;

    // ==== channels ====

    /// Deactivate every active destination channel, randomizing its UUID,
    /// dropping its secret and detaching its parent, and deactivate the
    /// triggers pointing at them.
    async fn neutralize_channels(&self, org: i64) -> Result<()>;
    /// Create a channel unless an active channel elsewhere already claims the
    /// same address and type.
    async fn create_channel(&self, org: i64, channel: &NewChannel) -> Result<CreateResult>;
    /// Drop accumulated daily counters for any destination channel matching
    /// the address/type; they are rebuilt, never copied.
    async fn clear_channel_counts(
        &self,
        org: i64,
        address: Option<&str>,
        channel_type: &str,
    ) -> Result<()>;
    async fn create_sync_event(&self, channel: i64, event: &NewSyncEvent) -> Result<i64>;
    async fn create_channel_log(&self, channel: i64, log: &NewChannelLog) -> Result<i64>;

    // ==== contact fields ====

    async fn find_contact_field(&self, org: i64, uuid: Uuid) -> Result<Option<i64>>;
    async fn create_contact_field(&self, org: i64, field: &NewContactField) -> Result<i64>;
    async fn update_contact_field(
        &self,
        org: i64,
        field: i64,
        key: &str,
        label: &str,
    ) -> Result<()>;

    // ==== contacts ====

    async fn find_contact(&self, org: i64, uuid: Uuid) -> Result<Option<i64>>;
    async fn create_contact(&self, org: i64, contact: &NewContact) -> Result<i64>;
    async fn update_contact(&self, org: i64, contact: i64, update: &ContactUpdate)
        -> Result<()>;
    async fn set_contact_timestamps(
        &self,
        org: i64,
        contact: i64,
        created_on: DateTime<Utc>,
        modified_on: DateTime<Utc>,
    ) -> Result<()>;
    async fn set_contact_field(
        &self,
        org: i64,
        contact: i64,
        field: i64,
        value: &str,
    ) -> Result<()>;
    async fn upsert_urn(&self, org: i64, contact: i64, urn: &NewUrn) -> Result<i64>;

    // ==== groups ====

    /// Deactivate existing user groups, randomizing their UUIDs so re-created
    /// groups never match them.
    async fn release_groups(&self, org: i64) -> Result<()>;
    async fn upsert_group(&self, org: i64, group: &NewGroup) -> Result<Upserted>;
    async fn add_group_member(&self, group: i64, contact: i64) -> Result<()>;

    // ==== channel events ====

    async fn clear_channel_events(&self, org: i64) -> Result<()>;
    async fn create_channel_event(&self, org: i64, event: &NewChannelEvent) -> Result<i64>;

    // ==== schedules ====

    async fn deactivate_schedules(&self, org: i64) -> Result<()>;
    async fn create_schedule(&self, org: i64, schedule: &NewSchedule) -> Result<i64>;

    // ==== broadcasts ====

    async fn deactivate_broadcasts(&self, org: i64) -> Result<()>;
    async fn create_broadcast(&self, org: i64, broadcast: &NewBroadcast) -> Result<i64>;
    async fn add_broadcast_contact(&self, broadcast: i64, contact: i64) -> Result<()>;
    async fn add_broadcast_group(&self, broadcast: i64, group: i64) -> Result<()>;
    async fn add_broadcast_urn(&self, broadcast: i64, urn: i64) -> Result<()>;

    // ==== labels ====

    async fn upsert_label_folder(&self, org: i64, name: &str) -> Result<Upserted>;
    async fn upsert_label(&self, org: i64, label: &NewLabel) -> Result<Upserted>;

    // ==== messages ====

    async fn release_messages(&self, org: i64) -> Result<()>;
    /// Insert a buffered batch; returned ids correspond positionally to the
    /// input slice.
    async fn bulk_create_messages(&self, org: i64, messages: &[NewMessage])
        -> Result<Vec<i64>>;

    // ==== flow labels ====

    async fn find_flow_label(&self, org: i64, uuid: Uuid) -> Result<Option<i64>>;
    async fn create_flow_label(&self, org: i64, label: &NewFlowLabel) -> Result<i64>;
    async fn update_flow_label(
        &self,
        org: i64,
        label: i64,
        name: &str,
        parent: Option<i64>,
    ) -> Result<()>;

    // ==== flows ====

    async fn find_flow(&self, org: i64, uuid: Uuid) -> Result<Option<i64>>;
    async fn create_flow(&self, org: i64, flow: &NewFlow) -> Result<i64>;
    async fn update_flow(&self, org: i64, flow: i64, update: &FlowUpdate) -> Result<()>;
    /// Replace the flow's contact-field and group dependency links.
    async fn set_flow_dependencies(
        &self,
        flow: i64,
        fields: &[i64],
        groups: &[i64],
    ) -> Result<()>;
    /// Add flow-to-flow dependency links, keeping existing ones.
    async fn link_flow_dependencies(&self, flow: i64, flows: &[i64]) -> Result<()>;
    async fn add_flow_label(&self, flow: i64, label: i64) -> Result<()>;
    async fn replace_category_counts(
        &self,
        flow: i64,
        counts: &[NewCategoryCount],
    ) -> Result<()>;
    async fn replace_action_sets(&self, flow: i64, sets: &[NewActionSet]) -> Result<()>;
    async fn replace_rule_sets(&self, flow: i64, sets: &[NewRuleSet]) -> Result<()>;
    async fn delete_revisions(&self, flow: i64) -> Result<()>;
    async fn create_revision(&self, flow: i64, revision: &NewFlowRevision) -> Result<i64>;
    /// Run a legacy definition export through the destination engine's
    /// definition migration, returning the upgraded export.
    async fn upgrade_flow_definition(&self, org: i64, definition: &Value) -> Result<Value>;
    async fn delete_flow_images(&self, flow: i64) -> Result<()>;
    async fn create_flow_image(&self, org: i64, flow: i64, image: &NewFlowImage)
        -> Result<i64>;
    async fn release_flow_starts(&self, flow: i64) -> Result<()>;
    async fn create_flow_start(&self, flow: i64, start: &NewFlowStart) -> Result<i64>;
    async fn add_start_contact(&self, start: i64, contact: i64) -> Result<()>;
    async fn add_start_group(&self, start: i64, group: i64) -> Result<()>;
    async fn release_flow_runs(&self, flow: i64) -> Result<()>;
    async fn create_flow_run(&self, org: i64, flow: i64, run: &NewFlowRun) -> Result<i64>;

    // ==== resthooks / webhooks ====

    async fn release_resthooks(&self, org: i64) -> Result<()>;
    async fn create_resthook(&self, org: i64, resthook: &NewResthook) -> Result<i64>;
    async fn create_resthook_subscriber(
        &self,
        resthook: i64,
        subscriber: &NewSubscriber,
    ) -> Result<i64>;
    async fn release_webhook_events(&self, org: i64) -> Result<()>;
    async fn create_webhook_event(&self, org: i64, event: &NewWebhookEvent) -> Result<i64>;
    async fn create_webhook_result(&self, event: i64, result: &NewWebhookResult)
        -> Result<i64>;

    // ==== campaigns ====

    async fn find_campaign(&self, org: i64, uuid: Uuid) -> Result<Option<i64>>;
    async fn create_campaign(&self, org: i64, campaign: &NewCampaign) -> Result<i64>;
    /// Rewrite name and group, forcing the campaign active and un-archived.
    async fn update_campaign(&self, org: i64, campaign: i64, name: &str, group: i64)
        -> Result<()>;
    async fn find_campaign_event(&self, campaign: i64, uuid: Uuid) -> Result<Option<i64>>;
    async fn create_campaign_event(
        &self,
        campaign: i64,
        event: &NewCampaignEvent,
    ) -> Result<i64>;
    async fn create_event_fire(&self, event: i64, fire: &NewEventFire) -> Result<i64>;

    // ==== triggers ====

    async fn release_triggers(&self, org: i64) -> Result<()>;
    async fn create_trigger(&self, org: i64, trigger: &NewTrigger) -> Result<i64>;
    async fn add_trigger_contact(&self, trigger: i64, contact: i64) -> Result<()>;
    async fn add_trigger_group(&self, trigger: i64, group: i64) -> Result<()>;

    // ==== links ====

    async fn delete_links(&self, org: i64) -> Result<()>;
    async fn create_link(&self, org: i64, link: &NewLink) -> Result<i64>;
    async fn create_link_contact(&self, link: i64, contact: &NewLinkContact) -> Result<i64>;
}

struct FlowUpgrader {
    client: reqwest::Client,
    url: String,
}

/// Warehouse over the destination Postgres, plus an optional HTTP hook into
/// the destination engine for definition upgrades.
pub struct PgWarehouse {
    pool: PgPool,
    flow_upgrader: Option<FlowUpgrader>,
}

impl PgWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            flow_upgrader: None,
        }
    }

    pub fn with_flow_upgrader(mut self, url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build definition-upgrade client")?;
        self.flow_upgrader = Some(FlowUpgrader {
            client,
            url: url.into(),
        });
        Ok(self)
    }

    fn entity_table(entity: EntityType) -> &'static str {
        match entity {
            EntityType::Organization => "orgs_org",
            EntityType::CreditGrant => "orgs_topup",
            EntityType::Language => "orgs_language",
            EntityType::Channel => "channels_channel",
            EntityType::ContactField => "contacts_contactfield",
            EntityType::Contact => "contacts_contact",
            EntityType::ContactUrn => "contacts_contacturn",
            EntityType::ContactGroup => "contacts_contactgroup",
            EntityType::Schedule => "schedules_schedule",
            EntityType::Broadcast => "msgs_broadcast",
            EntityType::Label => "msgs_label",
            EntityType::Message => "msgs_msg",
            EntityType::FlowLabel => "flows_flowlabel",
            EntityType::Flow => "flows_flow",
            EntityType::FlowRun => "flows_flowrun",
            EntityType::FlowStart => "flows_flowstart",
            EntityType::Campaign => "campaigns_campaign",
            EntityType::CampaignEvent => "campaigns_campaignevent",
            EntityType::Trigger => "triggers_trigger",
            EntityType::Link => "links_link",
            EntityType::Resthook => "api_resthook",
            EntityType::WebhookEvent => "api_webhookevent",
        }
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn exists(&self, entity: EntityType, org: i64, id: i64) -> Result<bool> {
        let found: bool = match entity {
            EntityType::Organization | EntityType::FlowStart => {
                let sql = format!(
                    "SELECT EXISTS(SELECT 1 FROM public.{} WHERE id = $1)",
                    Self::entity_table(entity)
                );
                sqlx::query_scalar(&sql).bind(id).fetch_one(&self.pool).await?
            }
            // Campaign events carry no org column; scope through the campaign.
            EntityType::CampaignEvent => {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM public.campaigns_campaignevent e \
                     INNER JOIN public.campaigns_campaign c ON c.id = e.campaign_id \
                     WHERE e.id = $1 AND c.org_id = $2)",
                )
                .bind(id)
                .bind(org)
                .fetch_one(&self.pool)
                .await?
            }
            scoped => {
                let sql = format!(
                    "SELECT EXISTS(SELECT 1 FROM public.{} WHERE id = $1 AND org_id = $2)",
                    Self::entity_table(scoped)
                );
                sqlx::query_scalar(&sql)
                    .bind(id)
                    .bind(org)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(found)
    }

    async fn update_org(&self, org: i64, profile: &OrgProfile) -> Result<()> {
        sqlx::query(
            "UPDATE public.orgs_org \
             SET plan = $2, plan_start = $3, stripe_customer = $4, language = $5, \
                 date_format = $6, config = $7, is_anon = $8, surveyor_password = $9, \
                 parent_id = $10, modified_on = now() \
             WHERE id = $1",
        )
        .bind(org)
        .bind(&profile.plan)
        .bind(profile.plan_start)
        .bind(&profile.stripe_customer)
        .bind(&profile.language)
        .bind(&profile.date_format)
        .bind(&profile.config)
        .bind(profile.is_anon)
        .bind(&profile.surveyor_password)
        .bind(profile.parent_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn configure_smtp(&self, org: i64, smtp: &SmtpConfig) -> Result<()> {
        sqlx::query(
            "UPDATE public.orgs_org \
             SET smtp_from_email = $2, smtp_host = $3, smtp_username = $4, \
                 smtp_password = $5, smtp_port = $6, smtp_encryption = $7, \
                 modified_on = now() \
             WHERE id = $1",
        )
        .bind(org)
        .bind(&smtp.from_email)
        .bind(&smtp.host)
        .bind(&smtp.username)
        .bind(&smtp.password)
        .bind(smtp.port)
        .bind(&smtp.encryption)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_primary_language(&self, org: i64, language: i64) -> Result<()> {
        sqlx::query("UPDATE public.orgs_org SET primary_language_id = $2 WHERE id = $1")
            .bind(org)
            .bind(language)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_primary_language(&self, org: i64) -> Result<()> {
        sqlx::query("UPDATE public.orgs_org SET primary_language_id = NULL WHERE id = $1")
            .bind(org)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn deactivate_credit_grants(&self, org: i64) -> Result<()> {
        sqlx::query(
            "UPDATE public.orgs_topup SET is_active = false, modified_on = now() \
             WHERE org_id = $1",
        )
        .bind(org)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_credit_grant(&self, org: i64, grant: &NewCreditGrant) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.orgs_topup \
                 (org_id, price, credits, expires_on, is_active, created_on, modified_on) \
             VALUES ($1, $2, $3, $4, true, $5, $6) \
             RETURNING id",
        )
        .bind(org)
        .bind(grant.price)
        .bind(grant.credits)
        .bind(grant.expires_on)
        .bind(grant.created_on)
        .bind(grant.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_credit_event(&self, grant: i64, event: &NewCreditEvent) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.orgs_topupcredits (topup_id, used, is_squashed) \
             VALUES ($1, $2, $3) \
             RETURNING id",
        )
        .bind(grant)
        .bind(event.used)
        .bind(event.is_squashed)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn delete_languages(&self, org: i64) -> Result<()> {
        sqlx::query("DELETE FROM public.orgs_language WHERE org_id = $1")
            .bind(org)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_language(&self, org: i64, language: &NewLanguage) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.orgs_language (org_id, name, iso_code, created_on, modified_on) \
             VALUES ($1, $2, $3, now(), now()) \
             RETURNING id",
        )
        .bind(org)
        .bind(&language.name)
        .bind(&language.iso_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn neutralize_channels(&self, org: i64) -> Result<()> {
        // Triggers first, while their channels are still flagged active.
        sqlx::query(
            "UPDATE public.triggers_trigger SET is_active = false, modified_on = now() \
             WHERE org_id = $1 AND channel_id IN \
                 (SELECT id FROM public.channels_channel WHERE org_id = $1 AND is_active = true)",
        )
        .bind(org)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "UPDATE public.channels_channel \
             SET is_active = false, uuid = gen_random_uuid(), secret = NULL, \
                 parent_id = NULL, modified_on = now() \
             WHERE org_id = $1 AND is_active = true",
        )
        .bind(org)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_channel(&self, org: i64, channel: &NewChannel) -> Result<CreateResult> {
        if let Some(address) = &channel.address {
            let clash: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM public.channels_channel \
                 WHERE address = $1 AND channel_type = $2 AND is_active = true)",
            )
            .bind(address)
            .bind(&channel.channel_type)
            .fetch_one(&self.pool)
            .await?;
            if clash {
                return Ok(CreateResult::Conflict);
            }
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.channels_channel \
                 (org_id, uuid, channel_type, name, address, country, config, role, \
                  schemes, claim_code, secret, last_seen, device, os, alert_email, bod, \
                  tps, is_active, created_on, modified_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                     $16, $17, true, now(), now()) \
             RETURNING id",
        )
        .bind(org)
        .bind(channel.uuid)
        .bind(&channel.channel_type)
        .bind(&channel.name)
        .bind(&channel.address)
        .bind(&channel.country)
        .bind(&channel.config)
        .bind(&channel.role)
        .bind(&channel.schemes)
        .bind(&channel.claim_code)
        .bind(&channel.secret)
        .bind(channel.last_seen)
        .bind(&channel.device)
        .bind(&channel.os)
        .bind(&channel.alert_email)
        .bind(&channel.bod)
        .bind(channel.tps)
        .fetch_one(&self.pool)
        .await?;
        Ok(CreateResult::Created(id))
    }

    async fn clear_channel_counts(
        &self,
        org: i64,
        address: Option<&str>,
        channel_type: &str,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM public.channels_channelcount \
             WHERE channel_id IN \
                 (SELECT id FROM public.channels_channel \
                  WHERE org_id = $1 AND channel_type = $2 AND address IS NOT DISTINCT FROM $3)",
        )
        .bind(org)
        .bind(channel_type)
        .bind(address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_sync_event(&self, channel: i64, event: &NewSyncEvent) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.channels_syncevent \
                 (channel_id, power_source, power_status, power_level, network_type, \
                  lifetime, pending_message_count, retry_message_count, \
                  incoming_command_count, outgoing_command_count, created_on, modified_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now(), now()) \
             RETURNING id",
        )
        .bind(channel)
        .bind(&event.power_source)
        .bind(&event.power_status)
        .bind(event.power_level)
        .bind(&event.network_type)
        .bind(event.lifetime)
        .bind(event.pending_message_count)
        .bind(event.retry_message_count)
        .bind(event.incoming_command_count)
        .bind(event.outgoing_command_count)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_channel_log(&self, channel: i64, log: &NewChannelLog) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.channels_channellog \
                 (channel_id, msg_id, description, is_error, url, method, request, \
                  response, response_status, request_time, created_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id",
        )
        .bind(channel)
        .bind(log.msg_id)
        .bind(&log.description)
        .bind(log.is_error)
        .bind(&log.url)
        .bind(&log.method)
        .bind(&log.request)
        .bind(&log.response)
        .bind(log.response_status)
        .bind(log.request_time)
        .bind(log.created_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_contact_field(&self, org: i64, uuid: Uuid) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM public.contacts_contactfield WHERE org_id = $1 AND uuid = $2",
        )
        .bind(org)
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_contact_field(&self, org: i64, field: &NewContactField) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.contacts_contactfield \
                 (org_id, uuid, key, label, value_type, show_in_table, is_active, \
                  created_on, modified_on) \
             VALUES ($1, $2, $3, $4, $5, $6, true, now(), now()) \
             RETURNING id",
        )
        .bind(org)
        .bind(field.uuid)
        .bind(&field.key)
        .bind(&field.label)
        .bind(&field.value_type)
        .bind(field.show_in_table)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_contact_field(
        &self,
        org: i64,
        field: i64,
        key: &str,
        label: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE public.contacts_contactfield \
             SET key = $3, label = $4, is_active = true, modified_on = now() \
             WHERE org_id = $1 AND id = $2",
        )
        .bind(org)
        .bind(field)
        .bind(key)
        .bind(label)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_contact(&self, org: i64, uuid: Uuid) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM public.contacts_contact WHERE org_id = $1 AND uuid = $2",
        )
        .bind(org)
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_contact(&self, org: i64, contact: &NewContact) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.contacts_contact \
                 (org_id, uuid, name, language, is_blocked, is_stopped, is_active, \
                  created_on, modified_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now()) \
             RETURNING id",
        )
        .bind(org)
        .bind(contact.uuid)
        .bind(&contact.name)
        .bind(&contact.language)
        .bind(contact.is_blocked)
        .bind(contact.is_stopped)
        .bind(contact.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_contact(
        &self,
        org: i64,
        contact: i64,
        update: &ContactUpdate,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE public.contacts_contact \
             SET name = $3, is_blocked = $4, is_stopped = $5, is_active = $6 \
             WHERE org_id = $1 AND id = $2",
        )
        .bind(org)
        .bind(contact)
        .bind(&update.name)
        .bind(update.is_blocked)
        .bind(update.is_stopped)
        .bind(update.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_contact_timestamps(
        &self,
        org: i64,
        contact: i64,
        created_on: DateTime<Utc>,
        modified_on: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE public.contacts_contact SET created_on = $3, modified_on = $4 \
             WHERE org_id = $1 AND id = $2",
        )
        .bind(org)
        .bind(contact)
        .bind(created_on)
        .bind(modified_on)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_contact_field(
        &self,
        org: i64,
        contact: i64,
        field: i64,
        value: &str,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM public.values_value \
             WHERE org_id = $1 AND contact_id = $2 AND contact_field_id = $3",
        )
        .bind(org)
        .bind(contact)
        .bind(field)
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "INSERT INTO public.values_value \
                 (org_id, contact_id, contact_field_id, string_value, created_on, modified_on) \
             VALUES ($1, $2, $3, $4, now(), now())",
        )
        .bind(org)
        .bind(contact)
        .bind(field)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_urn(&self, org: i64, contact: i64, urn: &NewUrn) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.contacts_contacturn \
                 (org_id, contact_id, identity, scheme, path, auth, channel_id, priority) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 50) \
             ON CONFLICT (org_id, identity) \
             DO UPDATE SET contact_id = EXCLUDED.contact_id, auth = EXCLUDED.auth, \
                           channel_id = EXCLUDED.channel_id \
             RETURNING id",
        )
        .bind(org)
        .bind(contact)
        .bind(&urn.identity)
        .bind(urn.scheme())
        .bind(urn.path())
        .bind(&urn.auth)
        .bind(urn.channel_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn release_groups(&self, org: i64) -> Result<()> {
        sqlx::query(
            "UPDATE public.contacts_contactgroup \
             SET is_active = false, uuid = gen_random_uuid(), modified_on = now() \
             WHERE org_id = $1 AND group_type = 'U'",
        )
        .bind(org)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_group(&self, org: i64, group: &NewGroup) -> Result<Upserted> {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM public.contacts_contactgroup WHERE org_id = $1 AND uuid = $2",
        )
        .bind(org)
        .bind(group.uuid)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE public.contacts_contactgroup \
                     SET name = $2, query = $3, is_active = true, modified_on = now() \
                     WHERE id = $1",
                )
                .bind(id)
                .bind(&group.name)
                .bind(&group.query)
                .execute(&self.pool)
                .await?;
                Ok(Upserted { id, created: false })
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO public.contacts_contactgroup \
                         (org_id, uuid, name, query, group_type, is_active, created_on, \
                          modified_on) \
                     VALUES ($1, $2, $3, $4, 'U', true, now(), now()) \
                     RETURNING id",
                )
                .bind(org)
                .bind(group.uuid)
                .bind(&group.name)
                .bind(&group.query)
                .fetch_one(&self.pool)
                .await?;
                Ok(Upserted { id, created: true })
            }
        }
    }

    async fn add_group_member(&self, group: i64, contact: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO public.contacts_contactgroup_contacts (contactgroup_id, contact_id) \
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(group)
        .bind(contact)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_channel_events(&self, org: i64) -> Result<()> {
        sqlx::query("DELETE FROM public.channels_channelevent WHERE org_id = $1")
            .bind(org)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_channel_event(&self, org: i64, event: &NewChannelEvent) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.channels_channelevent \
                 (org_id, event_type, contact_id, contact_urn_id, channel_id, extra, \
                  occurred_on, created_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(org)
        .bind(&event.event_type)
        .bind(event.contact_id)
        .bind(event.contact_urn_id)
        .bind(event.channel_id)
        .bind(&event.extra)
        .bind(event.occurred_on)
        .bind(event.created_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn deactivate_schedules(&self, org: i64) -> Result<()> {
        sqlx::query(
            "UPDATE public.schedules_schedule SET is_active = false, modified_on = now() \
             WHERE org_id = $1",
        )
        .bind(org)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_schedule(&self, org: i64, schedule: &NewSchedule) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.schedules_schedule \
                 (org_id, repeat_period, repeat_days_of_week, repeat_hour_of_day, \
                  repeat_minute_of_hour, repeat_day_of_month, next_fire, last_fire, \
                  is_active, created_on, modified_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, $9, $10) \
             RETURNING id",
        )
        .bind(org)
        .bind(&schedule.repeat_period)
        .bind(&schedule.repeat_days_of_week)
        .bind(schedule.repeat_hour_of_day)
        .bind(schedule.repeat_minute_of_hour)
        .bind(schedule.repeat_day_of_month)
        .bind(schedule.next_fire)
        .bind(schedule.last_fire)
        .bind(schedule.created_on)
        .bind(schedule.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn deactivate_broadcasts(&self, org: i64) -> Result<()> {
        sqlx::query(
            "UPDATE public.msgs_broadcast SET is_active = false, modified_on = now() \
             WHERE org_id = $1",
        )
        .bind(org)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_broadcast(&self, org: i64, broadcast: &NewBroadcast) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.msgs_broadcast \
                 (org_id, channel_id, schedule_id, parent_id, status, translations, \
                  base_language, is_active, media, send_all, metadata, created_on, \
                  modified_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING id",
        )
        .bind(org)
        .bind(broadcast.channel_id)
        .bind(broadcast.schedule_id)
        .bind(broadcast.parent_id)
        .bind(&broadcast.status)
        .bind(&broadcast.translations)
        .bind(&broadcast.base_language)
        .bind(broadcast.is_active)
        .bind(&broadcast.media)
        .bind(broadcast.send_all)
        .bind(&broadcast.metadata)
        .bind(broadcast.created_on)
        .bind(broadcast.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn add_broadcast_contact(&self, broadcast: i64, contact: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO public.msgs_broadcast_contacts (broadcast_id, contact_id) \
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(broadcast)
        .bind(contact)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_broadcast_group(&self, broadcast: i64, group: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO public.msgs_broadcast_groups (broadcast_id, contactgroup_id) \
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(broadcast)
        .bind(group)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_broadcast_urn(&self, broadcast: i64, urn: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO public.msgs_broadcast_urns (broadcast_id, contacturn_id) \
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(broadcast)
        .bind(urn)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_label_folder(&self, org: i64, name: &str) -> Result<Upserted> {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM public.msgs_label \
             WHERE org_id = $1 AND name = $2 AND label_type = 'F'",
        )
        .bind(org)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(id) => Ok(Upserted { id, created: false }),
            None => {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO public.msgs_label \
                         (org_id, uuid, name, label_type, is_active, created_on, modified_on) \
                     VALUES ($1, gen_random_uuid(), $2, 'F', true, now(), now()) \
                     RETURNING id",
                )
                .bind(org)
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
                Ok(Upserted { id, created: true })
            }
        }
    }

    async fn upsert_label(&self, org: i64, label: &NewLabel) -> Result<Upserted> {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM public.msgs_label \
             WHERE org_id = $1 AND name = $2 AND label_type = 'L'",
        )
        .bind(org)
        .bind(&label.name)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(id) => {
                // Take over the source UUID so later find-by-uuid paths match.
                sqlx::query(
                    "UPDATE public.msgs_label \
                     SET uuid = $2, folder_id = $3, is_active = true, modified_on = now() \
                     WHERE id = $1",
                )
                .bind(id)
                .bind(label.uuid)
                .bind(label.folder_id)
                .execute(&self.pool)
                .await?;
                Ok(Upserted { id, created: false })
            }
            None => {
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO public.msgs_label \
                         (org_id, uuid, name, label_type, folder_id, is_active, created_on, \
                          modified_on) \
                     VALUES ($1, $2, $3, 'L', $4, true, now(), now()) \
                     RETURNING id",
                )
                .bind(org)
                .bind(label.uuid)
                .bind(&label.name)
                .bind(label.folder_id)
                .fetch_one(&self.pool)
                .await?;
                Ok(Upserted { id, created: true })
            }
        }
    }

    async fn release_messages(&self, org: i64) -> Result<()> {
        sqlx::query("DELETE FROM public.msgs_msg WHERE org_id = $1")
            .bind(org)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn bulk_create_messages(
        &self,
        org: i64,
        messages: &[NewMessage],
    ) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(messages.len());
        for chunk in messages.chunks(MESSAGE_INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO public.msgs_msg \
                     (org_id, uuid, channel_id, contact_id, contact_urn_id, broadcast_id, \
                      response_to_id, topup_id, text, high_priority, created_on, \
                      modified_on, sent_on, queued_on, direction, status, visibility, \
                      msg_type, msg_count, error_count, next_attempt, external_id, \
                      attachments, metadata) ",
            );
            builder.push_values(chunk, |mut b, m| {
                b.push_bind(org)
                    .push_bind(m.uuid)
                    .push_bind(m.channel_id)
                    .push_bind(m.contact_id)
                    .push_bind(m.contact_urn_id)
                    .push_bind(m.broadcast_id)
                    .push_bind(m.response_to_id)
                    .push_bind(m.topup_id)
                    .push_bind(&m.text)
                    .push_bind(m.high_priority)
                    .push_bind(m.created_on)
                    .push_bind(m.modified_on)
                    .push_bind(m.sent_on)
                    .push_bind(m.queued_on)
                    .push_bind(&m.direction)
                    .push_bind(&m.status)
                    .push_bind(&m.visibility)
                    .push_bind(&m.msg_type)
                    .push_bind(m.msg_count)
                    .push_bind(m.error_count)
                    .push_bind(m.next_attempt)
                    .push_bind(&m.external_id)
                    .push_bind(&m.attachments)
                    .push_bind(&m.metadata);
            });
            builder.push(" RETURNING id");

            let chunk_ids: Vec<i64> =
                builder.build_query_scalar().fetch_all(&self.pool).await?;
            ids.extend(chunk_ids);
        }
        Ok(ids)
    }

    async fn find_flow_label(&self, org: i64, uuid: Uuid) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM public.flows_flowlabel WHERE org_id = $1 AND uuid = $2",
        )
        .bind(org)
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_flow_label(&self, org: i64, label: &NewFlowLabel) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.flows_flowlabel (org_id, uuid, name, parent_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(org)
        .bind(label.uuid)
        .bind(&label.name)
        .bind(label.parent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_flow_label(
        &self,
        org: i64,
        label: i64,
        name: &str,
        parent: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE public.flows_flowlabel SET name = $3, parent_id = $4 \
             WHERE org_id = $1 AND id = $2",
        )
        .bind(org)
        .bind(label)
        .bind(name)
        .bind(parent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_flow(&self, org: i64, uuid: Uuid) -> Result<Option<i64>> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM public.flows_flow WHERE org_id = $1 AND uuid = $2")
                .bind(org)
                .bind(uuid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id)
    }

    async fn create_flow(&self, org: i64, flow: &NewFlow) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.flows_flow \
                 (org_id, uuid, name, flow_type, is_system, is_archived, is_active, \
                  expires_after_minutes, base_language, ignore_triggers, metadata, \
                  saved_on, created_on, modified_on) \
             VALUES ($1, $2, $3, $4, $5, $6, true, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING id",
        )
        .bind(org)
        .bind(flow.uuid)
        .bind(&flow.name)
        .bind(&flow.flow_type)
        .bind(flow.is_system)
        .bind(flow.is_archived)
        .bind(flow.expires_after_minutes)
        .bind(&flow.base_language)
        .bind(flow.ignore_triggers)
        .bind(&flow.metadata)
        .bind(flow.saved_on)
        .bind(flow.created_on)
        .bind(flow.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_flow(&self, org: i64, flow: i64, update: &FlowUpdate) -> Result<()> {
        sqlx::query(
            "UPDATE public.flows_flow \
             SET name = $3, flow_type = $4, is_system = $5, is_archived = $6, \
                 is_active = true, expires_after_minutes = $7, metadata = $8, \
                 saved_on = $9, modified_on = $10 \
             WHERE org_id = $1 AND id = $2",
        )
        .bind(org)
        .bind(flow)
        .bind(&update.name)
        .bind(&update.flow_type)
        .bind(update.is_system)
        .bind(update.is_archived)
        .bind(update.expires_after_minutes)
        .bind(&update.metadata)
        .bind(update.saved_on)
        .bind(update.modified_on)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_flow_dependencies(
        &self,
        flow: i64,
        fields: &[i64],
        groups: &[i64],
    ) -> Result<()> {
        sqlx::query("DELETE FROM public.flows_flow_field_dependencies WHERE flow_id = $1")
            .bind(flow)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM public.flows_flow_group_dependencies WHERE flow_id = $1")
            .bind(flow)
            .execute(&self.pool)
            .await?;

        if !fields.is_empty() {
            sqlx::query(
                "INSERT INTO public.flows_flow_field_dependencies (flow_id, contactfield_id) \
                 SELECT $1, unnest($2::bigint[])",
            )
            .bind(flow)
            .bind(fields)
            .execute(&self.pool)
            .await?;
        }
        if !groups.is_empty() {
            sqlx::query(
                "INSERT INTO public.flows_flow_group_dependencies (flow_id, contactgroup_id) \
                 SELECT $1, unnest($2::bigint[])",
            )
            .bind(flow)
            .bind(groups)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn link_flow_dependencies(&self, flow: i64, flows: &[i64]) -> Result<()> {
        if flows.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO public.flows_flow_flow_dependencies (from_flow_id, to_flow_id) \
             SELECT $1, unnest($2::bigint[]) \
             ON CONFLICT DO NOTHING",
        )
        .bind(flow)
        .bind(flows)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_flow_label(&self, flow: i64, label: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO public.flows_flow_labels (flow_id, flowlabel_id) \
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(flow)
        .bind(label)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_category_counts(
        &self,
        flow: i64,
        counts: &[NewCategoryCount],
    ) -> Result<()> {
        sqlx::query("DELETE FROM public.flows_flowcategorycount WHERE flow_id = $1")
            .bind(flow)
            .execute(&self.pool)
            .await?;

        for count in counts {
            sqlx::query(
                "INSERT INTO public.flows_flowcategorycount \
                     (flow_id, node_uuid, result_key, result_name, category_name, count, \
                      is_squashed) \
                 VALUES ($1, $2, $3, $4, $5, $6, true)",
            )
            .bind(flow)
            .bind(count.node_uuid)
            .bind(&count.result_key)
            .bind(&count.result_name)
            .bind(&count.category_name)
            .bind(count.count)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn replace_action_sets(&self, flow: i64, sets: &[NewActionSet]) -> Result<()> {
        sqlx::query("DELETE FROM public.flows_actionset WHERE flow_id = $1")
            .bind(flow)
            .execute(&self.pool)
            .await?;

        for set in sets {
            sqlx::query(
                "INSERT INTO public.flows_actionset \
                     (flow_id, uuid, destination, destination_type, exit_uuid, actions, \
                      x, y, created_on, modified_on) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(flow)
            .bind(set.uuid)
            .bind(set.destination)
            .bind(&set.destination_type)
            .bind(set.exit_uuid)
            .bind(&set.actions)
            .bind(set.x)
            .bind(set.y)
            .bind(set.created_on)
            .bind(set.modified_on)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn replace_rule_sets(&self, flow: i64, sets: &[NewRuleSet]) -> Result<()> {
        sqlx::query("DELETE FROM public.flows_ruleset WHERE flow_id = $1")
            .bind(flow)
            .execute(&self.pool)
            .await?;

        for set in sets {
            sqlx::query(
                "INSERT INTO public.flows_ruleset \
                     (flow_id, uuid, label, operand, webhook_url, webhook_action, rules, \
                      finished_key, value_type, ruleset_type, response_type, config, x, y, \
                      created_on, modified_on) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, \
                         $15, $16)",
            )
            .bind(flow)
            .bind(set.uuid)
            .bind(&set.label)
            .bind(&set.operand)
            .bind(&set.webhook_url)
            .bind(&set.webhook_action)
            .bind(&set.rules)
            .bind(&set.finished_key)
            .bind(&set.value_type)
            .bind(&set.ruleset_type)
            .bind(&set.response_type)
            .bind(&set.config)
            .bind(set.x)
            .bind(set.y)
            .bind(set.created_on)
            .bind(set.modified_on)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn delete_revisions(&self, flow: i64) -> Result<()> {
        sqlx::query("DELETE FROM public.flows_flowrevision WHERE flow_id = $1")
            .bind(flow)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_revision(&self, flow: i64, revision: &NewFlowRevision) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.flows_flowrevision \
                 (flow_id, definition, spec_version, revision, created_on, modified_on) \
             VALUES ($1, $2, $3, $4, now(), now()) \
             RETURNING id",
        )
        .bind(flow)
        .bind(&revision.definition)
        .bind(&revision.spec_version)
        .bind(revision.revision)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn upgrade_flow_definition(&self, _org: i64, definition: &Value) -> Result<Value> {
        let Some(upgrader) = &self.flow_upgrader else {
            bail!("no definition-upgrade endpoint configured");
        };

        let response = upgrader
            .client
            .post(&upgrader.url)
            .json(definition)
            .send()
            .await
            .context("definition-upgrade request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("definition upgrade returned status {status}");
        }
        response
            .json()
            .await
            .context("definition-upgrade response was not JSON")
    }

    async fn delete_flow_images(&self, flow: i64) -> Result<()> {
        sqlx::query("DELETE FROM public.flows_flowimage WHERE flow_id = $1")
            .bind(flow)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_flow_image(
        &self,
        org: i64,
        flow: i64,
        image: &NewFlowImage,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.flows_flowimage \
                 (org_id, flow_id, uuid, contact_id, name, path, path_thumbnail, exif, \
                  is_active, created_on, modified_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id",
        )
        .bind(org)
        .bind(flow)
        .bind(image.uuid)
        .bind(image.contact_id)
        .bind(&image.name)
        .bind(&image.path)
        .bind(&image.path_thumbnail)
        .bind(&image.exif)
        .bind(image.is_active)
        .bind(image.created_on)
        .bind(image.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn release_flow_starts(&self, flow: i64) -> Result<()> {
        sqlx::query(
            "DELETE FROM public.flows_flowstart_contacts WHERE flowstart_id IN \
                 (SELECT id FROM public.flows_flowstart WHERE flow_id = $1)",
        )
        .bind(flow)
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "DELETE FROM public.flows_flowstart_groups WHERE flowstart_id IN \
                 (SELECT id FROM public.flows_flowstart WHERE flow_id = $1)",
        )
        .bind(flow)
        .execute(&self.pool)
        .await?;
        sqlx::query("DELETE FROM public.flows_flowstart WHERE flow_id = $1")
            .bind(flow)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_flow_start(&self, flow: i64, start: &NewFlowStart) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.flows_flowstart \
                 (flow_id, uuid, restart_participants, include_active, status, extra, \
                  contact_count, is_active, created_on, modified_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING id",
        )
        .bind(flow)
        .bind(start.uuid)
        .bind(start.restart_participants)
        .bind(start.include_active)
        .bind(&start.status)
        .bind(&start.extra)
        .bind(start.contact_count)
        .bind(start.is_active)
        .bind(start.created_on)
        .bind(start.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn add_start_contact(&self, start: i64, contact: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO public.flows_flowstart_contacts (flowstart_id, contact_id) \
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(start)
        .bind(contact)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_start_group(&self, start: i64, group: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO public.flows_flowstart_groups (flowstart_id, contactgroup_id) \
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(start)
        .bind(group)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_flow_runs(&self, flow: i64) -> Result<()> {
        sqlx::query("DELETE FROM public.flows_flowrun WHERE flow_id = $1")
            .bind(flow)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_flow_run(&self, org: i64, flow: i64, run: &NewFlowRun) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.flows_flowrun \
                 (org_id, flow_id, uuid, contact_id, start_id, parent_id, responded, \
                  results, path, events, status, exit_type, is_active, created_on, \
                  modified_on, exited_on, expires_on, timeout_on, submitted_by_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                     $16, $17, $18, $19) \
             RETURNING id",
        )
        .bind(org)
        .bind(flow)
        .bind(run.uuid)
        .bind(run.contact_id)
        .bind(run.start_id)
        .bind(run.parent_id)
        .bind(run.responded)
        .bind(&run.results)
        .bind(&run.path)
        .bind(&run.events)
        .bind(&run.status)
        .bind(&run.exit_type)
        .bind(run.is_active)
        .bind(run.created_on)
        .bind(run.modified_on)
        .bind(run.exited_on)
        .bind(run.expires_on)
        .bind(run.timeout_on)
        .bind(run.submitted_by_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn release_resthooks(&self, org: i64) -> Result<()> {
        sqlx::query(
            "UPDATE public.api_resthooksubscriber SET is_active = false, modified_on = now() \
             WHERE resthook_id IN (SELECT id FROM public.api_resthook WHERE org_id = $1)",
        )
        .bind(org)
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "UPDATE public.api_resthook SET is_active = false, modified_on = now() \
             WHERE org_id = $1",
        )
        .bind(org)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_resthook(&self, org: i64, resthook: &NewResthook) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.api_resthook (org_id, slug, is_active, created_on, modified_on) \
             VALUES ($1, $2, true, $3, $4) \
             RETURNING id",
        )
        .bind(org)
        .bind(&resthook.slug)
        .bind(resthook.created_on)
        .bind(resthook.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_resthook_subscriber(
        &self,
        resthook: i64,
        subscriber: &NewSubscriber,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.api_resthooksubscriber \
                 (resthook_id, target_url, is_active, created_on, modified_on) \
             VALUES ($1, $2, true, $3, $4) \
             RETURNING id",
        )
        .bind(resthook)
        .bind(&subscriber.target_url)
        .bind(subscriber.created_on)
        .bind(subscriber.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn release_webhook_events(&self, org: i64) -> Result<()> {
        sqlx::query(
            "DELETE FROM public.api_webhookresult WHERE event_id IN \
                 (SELECT id FROM public.api_webhookevent WHERE org_id = $1)",
        )
        .bind(org)
        .execute(&self.pool)
        .await?;
        sqlx::query("DELETE FROM public.api_webhookevent WHERE org_id = $1")
            .bind(org)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_webhook_event(&self, org: i64, event: &NewWebhookEvent) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.api_webhookevent (org_id, resthook_id, data, action, created_on) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(org)
        .bind(event.resthook_id)
        .bind(&event.data)
        .bind(&event.action)
        .bind(event.created_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_webhook_result(
        &self,
        event: i64,
        result: &NewWebhookResult,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.api_webhookresult \
                 (event_id, contact_id, url, request, status_code, body, request_time, \
                  created_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(event)
        .bind(result.contact_id)
        .bind(&result.url)
        .bind(&result.request)
        .bind(result.status_code)
        .bind(&result.body)
        .bind(result.request_time)
        .bind(result.created_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_campaign(&self, org: i64, uuid: Uuid) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM public.campaigns_campaign WHERE org_id = $1 AND uuid = $2",
        )
        .bind(org)
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_campaign(&self, org: i64, campaign: &NewCampaign) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.campaigns_campaign \
                 (org_id, uuid, name, group_id, is_active, is_archived, created_on, \
                  modified_on) \
             VALUES ($1, $2, $3, $4, true, false, $5, $6) \
             RETURNING id",
        )
        .bind(org)
        .bind(campaign.uuid)
        .bind(&campaign.name)
        .bind(campaign.group_id)
        .bind(campaign.created_on)
        .bind(campaign.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_campaign(
        &self,
        org: i64,
        campaign: i64,
        name: &str,
        group: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE public.campaigns_campaign \
             SET name = $3, group_id = $4, is_active = true, is_archived = false, \
                 modified_on = now() \
             WHERE org_id = $1 AND id = $2",
        )
        .bind(org)
        .bind(campaign)
        .bind(name)
        .bind(group)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_campaign_event(&self, campaign: i64, uuid: Uuid) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM public.campaigns_campaignevent \
             WHERE campaign_id = $1 AND uuid = $2",
        )
        .bind(campaign)
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_campaign_event(
        &self,
        campaign: i64,
        event: &NewCampaignEvent,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.campaigns_campaignevent \
                 (campaign_id, uuid, event_type, relative_to_id, \"offset\", unit, \
                  flow_id, message, delivery_hour, embedded_data, is_active, created_on, \
                  modified_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, true, $11, $12) \
             RETURNING id",
        )
        .bind(campaign)
        .bind(event.uuid)
        .bind(&event.event_type)
        .bind(event.relative_to_id)
        .bind(event.offset)
        .bind(&event.unit)
        .bind(event.flow_id)
        .bind(&event.message)
        .bind(event.delivery_hour)
        .bind(&event.embedded_data)
        .bind(event.created_on)
        .bind(event.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_event_fire(&self, event: i64, fire: &NewEventFire) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.campaigns_eventfire (event_id, contact_id, scheduled, fired) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(event)
        .bind(fire.contact_id)
        .bind(fire.scheduled)
        .bind(fire.fired)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn release_triggers(&self, org: i64) -> Result<()> {
        sqlx::query(
            "UPDATE public.triggers_trigger SET is_active = false, modified_on = now() \
             WHERE org_id = $1 AND is_active = true",
        )
        .bind(org)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_trigger(&self, org: i64, trigger: &NewTrigger) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.triggers_trigger \
                 (org_id, trigger_type, keyword, referrer_id, match_type, flow_id, \
                  channel_id, schedule_id, embedded_data, is_active, is_archived, \
                  created_on, modified_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, true, false, $10, $11) \
             RETURNING id",
        )
        .bind(org)
        .bind(&trigger.trigger_type)
        .bind(&trigger.keyword)
        .bind(&trigger.referrer_id)
        .bind(&trigger.match_type)
        .bind(trigger.flow_id)
        .bind(trigger.channel_id)
        .bind(trigger.schedule_id)
        .bind(&trigger.embedded_data)
        .bind(trigger.created_on)
        .bind(trigger.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn add_trigger_contact(&self, trigger: i64, contact: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO public.triggers_trigger_contacts (trigger_id, contact_id) \
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(trigger)
        .bind(contact)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_trigger_group(&self, trigger: i64, group: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO public.triggers_trigger_groups (trigger_id, contactgroup_id) \
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(trigger)
        .bind(group)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_links(&self, org: i64) -> Result<()> {
        sqlx::query(
            "DELETE FROM public.links_linkcontacts WHERE link_id IN \
                 (SELECT id FROM public.links_link WHERE org_id = $1)",
        )
        .bind(org)
        .execute(&self.pool)
        .await?;
        sqlx::query("DELETE FROM public.links_link WHERE org_id = $1")
            .bind(org)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_link(&self, org: i64, link: &NewLink) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.links_link \
                 (org_id, uuid, name, destination, clicks_count, is_active, created_on, \
                  modified_on) \
             VALUES ($1, $2, $3, $4, $5, true, $6, $7) \
             RETURNING id",
        )
        .bind(org)
        .bind(link.uuid)
        .bind(&link.name)
        .bind(&link.destination)
        .bind(link.clicks_count)
        .bind(link.created_on)
        .bind(link.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn create_link_contact(&self, link: i64, contact: &NewLinkContact) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO public.links_linkcontacts (link_id, contact_id, created_on, modified_on) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(link)
        .bind(contact.contact_id)
        .bind(contact.created_on)
        .bind(contact.modified_on)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_map_to_their_tables() {
        assert_eq!(PgWarehouse::entity_table(EntityType::Organization), "orgs_org");
        assert_eq!(
            PgWarehouse::entity_table(EntityType::ContactUrn),
            "contacts_contacturn"
        );
        assert_eq!(PgWarehouse::entity_table(EntityType::FlowStart), "flows_flowstart");
        assert_eq!(PgWarehouse::entity_table(EntityType::Link), "links_link");
    }
}
