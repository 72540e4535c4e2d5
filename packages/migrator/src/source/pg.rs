//! Postgres implementation of the source reader.
//!
//! Every list query runs as `count + ceil(count / 1000)` page fetches with
//! stable ordering, so a huge org never holds an unbounded result set in
//! memory. All parameters are bound; the reader never writes.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::QueryAs;
use sqlx::{FromRow, PgPool, Postgres};

use super::paging::{page_plan, PAGE_SIZE};
use super::rows::*;
use super::SourceReader;
use crate::run::SourceWindow;

enum Bind {
    Int(i64),
    Time(DateTime<Utc>),
}

impl Bind {
    fn apply_to<'q, T>(
        &self,
        query: QueryAs<'q, Postgres, T, PgArguments>,
    ) -> QueryAs<'q, Postgres, T, PgArguments> {
        match self {
            Bind::Int(value) => query.bind(*value),
            Bind::Time(value) => query.bind(*value),
        }
    }
}

/// One parameterized source query, assembled condition by condition so page
/// and count statements share the same WHERE clause and bind order.
struct SourceQuery {
    columns: &'static str,
    from: &'static str,
    order_by: &'static str,
    conditions: Vec<String>,
    binds: Vec<Bind>,
}

impl SourceQuery {
    fn new(columns: &'static str, from: &'static str, order_by: &'static str) -> Self {
        Self {
            columns,
            from,
            order_by,
            conditions: Vec::new(),
            binds: Vec::new(),
        }
    }

    /// Literal condition with no bound parameter.
    fn filter(mut self, condition: &str) -> Self {
        self.conditions.push(condition.to_string());
        self
    }

    fn filter_id(mut self, column: &str, value: i64) -> Self {
        let n = self.binds.len() + 1;
        self.conditions.push(format!("{column} = ${n}"));
        self.binds.push(Bind::Int(value));
        self
    }

    fn window(mut self, column: &str, window: SourceWindow) -> Self {
        if let Some(start) = window.start {
            let n = self.binds.len() + 1;
            self.conditions.push(format!("{column} >= ${n}"));
            self.binds.push(Bind::Time(start));
        }
        if let Some(end) = window.end {
            let n = self.binds.len() + 1;
            self.conditions.push(format!("{column} <= ${n}"));
            self.binds.push(Bind::Time(end));
        }
        self
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    fn count_sql(&self) -> String {
        format!(
            "SELECT count(*) AS count FROM {}{}",
            self.from,
            self.where_clause()
        )
    }

    fn page_sql(&self, limit: i64, offset: i64) -> String {
        format!(
            "SELECT {} FROM {}{} ORDER BY {} LIMIT {} OFFSET {}",
            self.columns,
            self.from,
            self.where_clause(),
            self.order_by,
            limit,
            offset
        )
    }
}

#[derive(FromRow)]
struct CountRow {
    count: i64,
}

pub struct PgSourceReader {
    pool: PgPool,
}

impl PgSourceReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn total(&self, query: &SourceQuery) -> Result<i64> {
        let sql = query.count_sql();
        let mut q = sqlx::query_as::<_, CountRow>(&sql);
        for bind in &query.binds {
            q = bind.apply_to(q);
        }
        Ok(q.fetch_one(&self.pool).await?.count)
    }

    async fn fetch_all<T>(&self, query: SourceQuery) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let total = self.total(&query).await?;
        let mut rows = Vec::with_capacity(total.max(0) as usize);
        for offset in page_plan(total, PAGE_SIZE) {
            let sql = query.page_sql(PAGE_SIZE, offset);
            let mut q = sqlx::query_as::<_, T>(&sql);
            for bind in &query.binds {
                q = bind.apply_to(q);
            }
            rows.extend(q.fetch_all(&self.pool).await?);
        }
        Ok(rows)
    }

    async fn fetch_optional<T>(&self, query: SourceQuery) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = query.page_sql(1, 0);
        let mut q = sqlx::query_as::<_, T>(&sql);
        for bind in &query.binds {
            q = bind.apply_to(q);
        }
        q.fetch_optional(&self.pool).await.map_err(Into::into)
    }
}

#[async_trait]
impl SourceReader for PgSourceReader {
    async fn org(&self, org: i64) -> Result<Option<OrgRow>> {
        self.fetch_optional(
            SourceQuery::new(
                "o.id, o.name, o.slug, o.plan, o.plan_start, o.stripe_customer, o.language, \
                 o.timezone, o.date_format, o.config, o.is_anon, o.surveyor_password, \
                 o.parent_id, o.primary_language_id",
                "public.orgs_org o",
                "o.id ASC",
            )
            .filter_id("o.id", org),
        )
        .await
    }

    async fn credit_grants(&self, org: i64) -> Result<Vec<CreditGrantRow>> {
        self.fetch_all(
            SourceQuery::new(
                "t.id, t.price, t.credits, t.expires_on, t.created_on, t.modified_on",
                "public.orgs_topup t",
                "t.id ASC",
            )
            .filter_id("t.org_id", org)
            .filter("t.is_active = true"),
        )
        .await
    }

    async fn credit_events(&self, grant: i64) -> Result<Vec<CreditEventRow>> {
        self.fetch_all(
            SourceQuery::new(
                "tc.id, tc.used, tc.is_squashed",
                "public.orgs_topupcredits tc",
                "tc.id ASC",
            )
            .filter_id("tc.topup_id", grant),
        )
        .await
    }

    async fn languages(&self, org: i64) -> Result<Vec<LanguageRow>> {
        self.fetch_all(
            SourceQuery::new(
                "l.id, l.name, l.iso_code",
                "public.orgs_language l",
                "l.id ASC",
            )
            .filter_id("l.org_id", org),
        )
        .await
    }

    async fn channels(&self, org: i64, window: SourceWindow) -> Result<Vec<ChannelRow>> {
        self.fetch_all(
            SourceQuery::new(
                "c.id, c.uuid::uuid AS uuid, c.channel_type, c.name, c.address, c.country, \
                 c.config, c.role, c.schemes, c.claim_code, c.secret, c.last_seen, c.device, \
                 c.os, c.alert_email, c.bod, c.is_active",
                "public.channels_channel c",
                "c.id ASC",
            )
            .filter_id("c.org_id", org)
            .window("c.created_on", window),
        )
        .await
    }

    async fn sync_events(&self, channel: i64) -> Result<Vec<SyncEventRow>> {
        self.fetch_all(
            SourceQuery::new(
                "s.id, s.power_source, s.power_status, s.power_level, s.network_type, \
                 s.lifetime, s.pending_message_count, s.retry_message_count, \
                 s.incoming_command_count, s.outgoing_command_count",
                "public.channels_syncevent s",
                "s.id ASC",
            )
            .filter_id("s.channel_id", channel),
        )
        .await
    }

    async fn channel_logs(&self, channel: i64) -> Result<Vec<ChannelLogRow>> {
        self.fetch_all(
            SourceQuery::new(
                "cl.id, cl.msg_id, cl.description, cl.is_error, cl.url, cl.method, \
                 cl.request, cl.response, cl.response_status, cl.request_time, cl.created_on",
                "public.channels_channellog cl",
                "cl.id ASC",
            )
            .filter_id("cl.channel_id", channel),
        )
        .await
    }

    async fn contact_fields(
        &self,
        org: i64,
        window: SourceWindow,
    ) -> Result<Vec<ContactFieldRow>> {
        self.fetch_all(
            SourceQuery::new(
                "f.id, f.uuid::uuid AS uuid, f.key, f.label, f.value_type, f.show_in_table",
                "public.contacts_contactfield f",
                "f.id ASC",
            )
            .filter_id("f.org_id", org)
            .filter("f.is_active = true")
            .window("f.created_on", window),
        )
        .await
    }

    async fn contacts(&self, org: i64, window: SourceWindow) -> Result<Vec<ContactRow>> {
        self.fetch_all(
            SourceQuery::new(
                "c.id, c.uuid::uuid AS uuid, c.name, c.language, c.is_blocked, c.is_stopped, \
                 c.is_active, c.created_on, c.modified_on",
                "public.contacts_contact c",
                "c.id ASC",
            )
            .filter_id("c.org_id", org)
            .filter("c.is_test = false")
            .window("c.created_on", window),
        )
        .await
    }

    async fn contact_values(&self, org: i64, contact: i64) -> Result<Vec<ContactValueRow>> {
        self.fetch_all(
            SourceQuery::new(
                "v.id, v.contact_field_id, v.string_value",
                "public.values_value v",
                "v.id ASC",
            )
            .filter_id("v.org_id", org)
            .filter_id("v.contact_id", contact)
            .filter("v.contact_field_id IS NOT NULL"),
        )
        .await
    }

    async fn contact_urns(&self, org: i64, contact: i64) -> Result<Vec<ContactUrnRow>> {
        self.fetch_all(
            SourceQuery::new(
                "u.id, u.identity, u.auth, u.channel_id",
                "public.contacts_contacturn u",
                "u.id ASC",
            )
            .filter_id("u.org_id", org)
            .filter_id("u.contact_id", contact),
        )
        .await
    }

    async fn groups(&self, org: i64, window: SourceWindow) -> Result<Vec<GroupRow>> {
        self.fetch_all(
            SourceQuery::new(
                "g.id, g.uuid::uuid AS uuid, g.name, g.query",
                "public.contacts_contactgroup g",
                "g.id ASC",
            )
            .filter_id("g.org_id", org)
            .filter("g.group_type = 'U'")
            .window("g.created_on", window),
        )
        .await
    }

    async fn group_members(&self, group: i64) -> Result<Vec<GroupMemberRow>> {
        self.fetch_all(
            SourceQuery::new(
                "m.contact_id",
                "public.contacts_contactgroup_contacts m",
                "m.id ASC",
            )
            .filter_id("m.contactgroup_id", group),
        )
        .await
    }

    async fn channel_events(
        &self,
        org: i64,
        window: SourceWindow,
    ) -> Result<Vec<ChannelEventRow>> {
        self.fetch_all(
            SourceQuery::new(
                "e.id, e.event_type, e.contact_id, e.contact_urn_id, e.channel_id, e.extra, \
                 e.occurred_on, e.created_on",
                "public.channels_channelevent e",
                "e.id ASC",
            )
            .filter_id("e.org_id", org)
            .window("e.created_on", window),
        )
        .await
    }

    async fn trigger_schedules(
        &self,
        org: i64,
        window: SourceWindow,
    ) -> Result<Vec<ScheduleRow>> {
        self.fetch_all(
            SourceQuery::new(
                "s.id, s.repeat_period, s.repeat_days, s.repeat_hour_of_day, \
                 s.repeat_minute_of_hour, s.repeat_day_of_month, s.next_fire, s.last_fire, \
                 s.created_on, s.modified_on",
                "public.schedules_schedule s INNER JOIN public.triggers_trigger t ON t.schedule_id = s.id",
                "s.id ASC",
            )
            .filter_id("t.org_id", org)
            .filter("t.schedule_id IS NOT NULL")
            .window("s.created_on", window),
        )
        .await
    }

    async fn broadcast_schedules(
        &self,
        org: i64,
        window: SourceWindow,
    ) -> Result<Vec<ScheduleRow>> {
        self.fetch_all(
            SourceQuery::new(
                "s.id, s.repeat_period, s.repeat_days, s.repeat_hour_of_day, \
                 s.repeat_minute_of_hour, s.repeat_day_of_month, s.next_fire, s.last_fire, \
                 s.created_on, s.modified_on",
                "public.schedules_schedule s INNER JOIN public.msgs_broadcast b ON b.schedule_id = s.id",
                "s.id ASC",
            )
            .filter_id("b.org_id", org)
            .filter("b.schedule_id IS NOT NULL")
            .window("s.created_on", window),
        )
        .await
    }

    async fn broadcasts(&self, org: i64) -> Result<Vec<BroadcastRow>> {
        self.fetch_all(
            SourceQuery::new(
                "b.id, b.channel_id, b.schedule_id, b.parent_id, b.status, \
                 COALESCE(hstore_to_json(b.text), '{}'::json) AS translations, \
                 b.base_language, b.is_active, hstore_to_json(b.media) AS media, \
                 b.send_all, b.metadata, b.created_on, b.modified_on",
                "public.msgs_broadcast b",
                "b.id ASC",
            )
            .filter_id("b.org_id", org),
        )
        .await
    }

    async fn broadcast_contacts(&self, broadcast: i64) -> Result<Vec<BroadcastContactRow>> {
        self.fetch_all(
            SourceQuery::new(
                "bc.contact_id",
                "public.msgs_broadcast_contacts bc",
                "bc.id ASC",
            )
            .filter_id("bc.broadcast_id", broadcast),
        )
        .await
    }

    async fn broadcast_groups(&self, broadcast: i64) -> Result<Vec<BroadcastGroupRow>> {
        self.fetch_all(
            SourceQuery::new(
                "bg.contactgroup_id AS group_id",
                "public.msgs_broadcast_groups bg",
                "bg.id ASC",
            )
            .filter_id("bg.broadcast_id", broadcast),
        )
        .await
    }

    async fn broadcast_urns(&self, broadcast: i64) -> Result<Vec<BroadcastUrnRow>> {
        self.fetch_all(
            SourceQuery::new(
                "bu.contacturn_id AS urn_id",
                "public.msgs_broadcast_urns bu",
                "bu.id ASC",
            )
            .filter_id("bu.broadcast_id", broadcast),
        )
        .await
    }

    async fn label_folders(&self, org: i64) -> Result<Vec<LabelRow>> {
        self.fetch_all(
            SourceQuery::new(
                "l.id, l.uuid::uuid AS uuid, l.name, l.folder_id",
                "public.msgs_label l",
                "l.id ASC",
            )
            .filter_id("l.org_id", org)
            .filter("l.label_type = 'F'"),
        )
        .await
    }

    async fn labels(&self, org: i64) -> Result<Vec<LabelRow>> {
        self.fetch_all(
            SourceQuery::new(
                "l.id, l.uuid::uuid AS uuid, l.name, l.folder_id",
                "public.msgs_label l",
                "l.id ASC",
            )
            .filter_id("l.org_id", org)
            .filter("l.label_type = 'L'"),
        )
        .await
    }

    async fn messages(&self, org: i64, window: SourceWindow) -> Result<Vec<MsgRow>> {
        self.fetch_all(
            SourceQuery::new(
                "m.id, m.uuid::uuid AS uuid, m.channel_id, m.contact_id, m.contact_urn_id, \
                 m.broadcast_id, m.response_to_id, m.topup_id, m.text, m.high_priority, \
                 m.created_on, m.modified_on, m.sent_on, m.queued_on, m.direction, m.status, \
                 m.visibility, m.msg_type, m.msg_count, m.error_count, m.next_attempt, \
                 m.external_id, m.attachments, m.metadata",
                "public.msgs_msg m",
                "m.id ASC",
            )
            .filter_id("m.org_id", org)
            .window("m.created_on", window),
        )
        .await
    }

    async fn flow_labels(&self, org: i64) -> Result<Vec<FlowLabelRow>> {
        self.fetch_all(
            SourceQuery::new(
                "fl.id, fl.uuid::uuid AS uuid, fl.name, fl.parent_id",
                "public.flows_flowlabel fl",
                "fl.id ASC",
            )
            .filter_id("fl.org_id", org),
        )
        .await
    }

    async fn flows(&self, org: i64) -> Result<Vec<FlowRow>> {
        self.fetch_all(
            SourceQuery::new(
                "f.id, f.uuid::uuid AS uuid, f.name, f.flow_type, f.is_active, f.is_archived, \
                 f.expires_after_minutes, f.base_language, f.entry_uuid::uuid AS entry_uuid, \
                 f.entry_type, f.ignore_triggers, f.metadata, f.saved_on, f.created_on, \
                 f.modified_on",
                "public.flows_flow f",
                "f.id ASC",
            )
            .filter_id("f.org_id", org),
        )
        .await
    }

    async fn flow_revisions(&self, flow: i64) -> Result<Vec<FlowRevisionRow>> {
        // Oldest first so revisions replay in the order they were authored.
        self.fetch_all(
            SourceQuery::new(
                "r.id, r.definition, r.spec_version, r.revision",
                "public.flows_flowrevision r",
                "r.revision ASC, r.id ASC",
            )
            .filter_id("r.flow_id", flow),
        )
        .await
    }

    async fn flow_category_counts(&self, flow: i64) -> Result<Vec<FlowCategoryCountRow>> {
        self.fetch_all(
            SourceQuery::new(
                "cc.id, cc.node_uuid::uuid AS node_uuid, cc.result_key, cc.result_name, \
                 cc.category_name, cc.count",
                "public.flows_flowcategorycount cc",
                "cc.id ASC",
            )
            .filter_id("cc.flow_id", flow),
        )
        .await
    }

    async fn flow_action_sets(&self, flow: i64) -> Result<Vec<ActionSetRow>> {
        self.fetch_all(
            SourceQuery::new(
                "a.id, a.uuid::uuid AS uuid, a.destination::uuid AS destination, \
                 a.destination_type, a.exit_uuid::uuid AS exit_uuid, a.actions, a.x, a.y, \
                 a.created_on, a.modified_on",
                "public.flows_actionset a",
                "a.id ASC",
            )
            .filter_id("a.flow_id", flow),
        )
        .await
    }

    async fn flow_rule_sets(&self, flow: i64) -> Result<Vec<RuleSetRow>> {
        self.fetch_all(
            SourceQuery::new(
                "r.id, r.uuid::uuid AS uuid, r.label, r.operand, r.webhook_url, \
                 r.webhook_action, r.rules, r.finished_key, r.value_type, r.ruleset_type, \
                 r.response_type, r.config, r.x, r.y, r.created_on, r.modified_on",
                "public.flows_ruleset r",
                "r.id ASC",
            )
            .filter_id("r.flow_id", flow),
        )
        .await
    }

    async fn flow_field_dependencies(&self, flow: i64) -> Result<Vec<FieldDependencyRow>> {
        self.fetch_all(
            SourceQuery::new(
                "d.contactfield_id AS contact_field_id",
                "public.flows_flow_field_dependencies d",
                "d.id ASC",
            )
            .filter_id("d.flow_id", flow),
        )
        .await
    }

    async fn flow_group_dependencies(&self, flow: i64) -> Result<Vec<GroupDependencyRow>> {
        self.fetch_all(
            SourceQuery::new(
                "d.contactgroup_id AS group_id",
                "public.flows_flow_group_dependencies d",
                "d.id ASC",
            )
            .filter_id("d.flow_id", flow),
        )
        .await
    }

    async fn flow_label_links(&self, flow: i64) -> Result<Vec<FlowLabelLinkRow>> {
        self.fetch_all(
            SourceQuery::new(
                "fl.flowlabel_id AS label_id",
                "public.flows_flow_labels fl",
                "fl.id ASC",
            )
            .filter_id("fl.flow_id", flow),
        )
        .await
    }

    async fn flow_flow_dependencies(&self, flow: i64) -> Result<Vec<FlowDependencyRow>> {
        self.fetch_all(
            SourceQuery::new(
                "d.to_flow_id",
                "public.flows_flow_flow_dependencies d",
                "d.id ASC",
            )
            .filter_id("d.from_flow_id", flow),
        )
        .await
    }

    async fn flow_images(&self, flow: i64) -> Result<Vec<FlowImageRow>> {
        self.fetch_all(
            SourceQuery::new(
                "i.id, i.uuid::uuid AS uuid, i.contact_id, i.name, i.path, i.path_thumbnail, \
                 i.exif, i.is_active, i.created_on, i.modified_on",
                "public.flows_flowimage i",
                "i.id ASC",
            )
            .filter_id("i.flow_id", flow),
        )
        .await
    }

    async fn flow_starts(&self, flow: i64) -> Result<Vec<FlowStartRow>> {
        self.fetch_all(
            SourceQuery::new(
                "fs.id, fs.uuid::uuid AS uuid, fs.restart_participants, fs.include_active, \
                 fs.status, fs.extra, fs.contact_count, fs.is_active, fs.created_on, \
                 fs.modified_on",
                "public.flows_flowstart fs",
                "fs.id ASC",
            )
            .filter_id("fs.flow_id", flow),
        )
        .await
    }

    async fn flow_start_contacts(&self, start: i64) -> Result<Vec<StartContactRow>> {
        self.fetch_all(
            SourceQuery::new(
                "sc.contact_id",
                "public.flows_flowstart_contacts sc",
                "sc.id ASC",
            )
            .filter_id("sc.flowstart_id", start),
        )
        .await
    }

    async fn flow_start_groups(&self, start: i64) -> Result<Vec<StartGroupRow>> {
        self.fetch_all(
            SourceQuery::new(
                "sg.contactgroup_id AS group_id",
                "public.flows_flowstart_groups sg",
                "sg.id ASC",
            )
            .filter_id("sg.flowstart_id", start),
        )
        .await
    }

    async fn flow_runs(&self, flow: i64, window: SourceWindow) -> Result<Vec<FlowRunRow>> {
        self.fetch_all(
            SourceQuery::new(
                "r.id, r.uuid::uuid AS uuid, r.contact_id, r.start_id, r.parent_id, \
                 r.responded, r.results, r.path, r.exit_type, r.is_active, r.created_on, \
                 r.modified_on, r.exited_on, r.expires_on, r.timeout_on, r.submitted_by_id",
                "public.flows_flowrun r",
                "r.id ASC",
            )
            .filter_id("r.flow_id", flow)
            .window("r.created_on", window),
        )
        .await
    }

    async fn run_steps(&self, run: i64) -> Result<Vec<FlowStepRow>> {
        self.fetch_all(
            SourceQuery::new(
                "st.step_uuid::uuid AS step_uuid, st.arrived_on, m.uuid::uuid AS msg_uuid, \
                 m.text AS msg_text, m.direction AS msg_direction, u.scheme AS urn_scheme, \
                 u.path AS urn_path, ch.uuid::uuid AS channel_uuid, ch.name AS channel_name",
                "public.flows_flowstep st \
                 INNER JOIN public.flows_flowstep_messages sm ON sm.flowstep_id = st.id \
                 INNER JOIN public.msgs_msg m ON m.id = sm.msg_id \
                 LEFT JOIN public.contacts_contacturn u ON u.id = m.contact_urn_id \
                 LEFT JOIN public.channels_channel ch ON ch.id = m.channel_id",
                "st.arrived_on ASC, st.id ASC",
            )
            .filter_id("st.run_id", run),
        )
        .await
    }

    async fn resthooks(&self, org: i64) -> Result<Vec<ResthookRow>> {
        self.fetch_all(
            SourceQuery::new(
                "rh.id, rh.slug, rh.created_on, rh.modified_on",
                "public.api_resthook rh",
                "rh.id ASC",
            )
            .filter_id("rh.org_id", org)
            .filter("rh.is_active = true"),
        )
        .await
    }

    async fn resthook_subscribers(
        &self,
        resthook: i64,
    ) -> Result<Vec<ResthookSubscriberRow>> {
        self.fetch_all(
            SourceQuery::new(
                "s.id, s.target_url, s.created_on, s.modified_on",
                "public.api_resthooksubscriber s",
                "s.id ASC",
            )
            .filter_id("s.resthook_id", resthook)
            .filter("s.is_active = true"),
        )
        .await
    }

    async fn webhook_events(&self, org: i64) -> Result<Vec<WebhookEventRow>> {
        self.fetch_all(
            SourceQuery::new(
                "e.id, e.resthook_id, e.data, e.action, e.created_on",
                "public.api_webhookevent e",
                "e.id ASC",
            )
            .filter_id("e.org_id", org),
        )
        .await
    }

    async fn webhook_results(&self, event: i64) -> Result<Vec<WebhookResultRow>> {
        self.fetch_all(
            SourceQuery::new(
                "r.id, r.contact_id, r.url, r.request, r.status_code, r.body, \
                 r.request_time, r.created_on",
                "public.api_webhookresult r",
                "r.id ASC",
            )
            .filter_id("r.event_id", event),
        )
        .await
    }

    async fn campaigns(&self, org: i64) -> Result<Vec<CampaignRow>> {
        self.fetch_all(
            SourceQuery::new(
                "c.id, c.uuid::uuid AS uuid, c.name, c.group_id, c.created_on, c.modified_on",
                "public.campaigns_campaign c",
                "c.id ASC",
            )
            .filter_id("c.org_id", org)
            .filter("c.is_active = true"),
        )
        .await
    }

    async fn campaign_events(&self, campaign: i64) -> Result<Vec<CampaignEventRow>> {
        self.fetch_all(
            SourceQuery::new(
                "e.id, e.uuid::uuid AS uuid, e.event_type, e.relative_to_id, e.\"offset\", \
                 e.unit, e.flow_id, hstore_to_json(e.message) AS message, e.delivery_hour, \
                 e.embedded_data, e.is_active, e.created_on, e.modified_on",
                "public.campaigns_campaignevent e",
                "e.id ASC",
            )
            .filter_id("e.campaign_id", campaign)
            .filter("e.is_active = true"),
        )
        .await
    }

    async fn event_fires(&self, event: i64) -> Result<Vec<EventFireRow>> {
        self.fetch_all(
            SourceQuery::new(
                "f.id, f.contact_id, f.scheduled, f.fired",
                "public.campaigns_eventfire f",
                "f.id ASC",
            )
            .filter_id("f.event_id", event),
        )
        .await
    }

    async fn triggers(&self, org: i64) -> Result<Vec<TriggerRow>> {
        self.fetch_all(
            SourceQuery::new(
                "t.id, t.trigger_type, t.keyword, t.referrer_id, t.match_type, t.flow_id, \
                 t.channel_id, t.schedule_id, t.embedded_data, t.created_on, t.modified_on",
                "public.triggers_trigger t",
                "t.id ASC",
            )
            .filter_id("t.org_id", org)
            .filter("t.is_active = true"),
        )
        .await
    }

    async fn trigger_contacts(&self, trigger: i64) -> Result<Vec<TriggerContactRow>> {
        self.fetch_all(
            SourceQuery::new(
                "tc.contact_id",
                "public.triggers_trigger_contacts tc",
                "tc.id ASC",
            )
            .filter_id("tc.trigger_id", trigger),
        )
        .await
    }

    async fn trigger_groups(&self, trigger: i64) -> Result<Vec<TriggerGroupRow>> {
        self.fetch_all(
            SourceQuery::new(
                "tg.contactgroup_id AS group_id",
                "public.triggers_trigger_groups tg",
                "tg.id ASC",
            )
            .filter_id("tg.trigger_id", trigger),
        )
        .await
    }

    async fn links(&self, org: i64) -> Result<Vec<LinkRow>> {
        self.fetch_all(
            SourceQuery::new(
                "l.id, l.uuid::uuid AS uuid, l.name, l.destination, l.clicks_count, \
                 l.created_on, l.modified_on",
                "public.links_link l",
                "l.id ASC",
            )
            .filter_id("l.org_id", org)
            .filter("l.is_active = true"),
        )
        .await
    }

    async fn link_contacts(&self, link: i64) -> Result<Vec<LinkContactRow>> {
        self.fetch_all(
            SourceQuery::new(
                "lc.id, lc.contact_id, lc.created_on, lc.modified_on",
                "public.links_linkcontacts lc",
                "lc.id ASC",
            )
            .filter_id("lc.link_id", link),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn query_without_conditions_has_no_where() {
        let query = SourceQuery::new("l.id", "public.links_link l", "l.id ASC");
        assert_eq!(
            query.count_sql(),
            "SELECT count(*) AS count FROM public.links_link l"
        );
        assert_eq!(
            query.page_sql(1000, 0),
            "SELECT l.id FROM public.links_link l ORDER BY l.id ASC LIMIT 1000 OFFSET 0"
        );
    }

    #[test]
    fn placeholders_number_in_bind_order() {
        let window = SourceWindow {
            start: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap()),
        };
        let query = SourceQuery::new("c.id", "public.contacts_contact c", "c.id ASC")
            .filter_id("c.org_id", 7)
            .filter("c.is_test = false")
            .window("c.created_on", window);

        let sql = query.page_sql(1000, 2000);
        assert!(sql.contains("c.org_id = $1"));
        assert!(sql.contains("c.is_test = false"));
        assert!(sql.contains("c.created_on >= $2"));
        assert!(sql.contains("c.created_on <= $3"));
        assert!(sql.ends_with("LIMIT 1000 OFFSET 2000"));
        assert_eq!(query.binds.len(), 3);
    }

    #[test]
    fn open_window_adds_nothing() {
        let query = SourceQuery::new("c.id", "public.contacts_contact c", "c.id ASC")
            .filter_id("c.org_id", 7)
            .window("c.created_on", SourceWindow::default());
        assert!(!query.page_sql(1000, 0).contains("created_on"));
        assert_eq!(query.binds.len(), 1);
    }
}
