//! Migration run model and status persistence.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "migration_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    #[default]
    Pending,
    Processing,
    Complete,
    Failed,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creation-time bounds applied to windowed source queries. Both ends open
/// means a full run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SourceWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl SourceWindow {
    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// One migration run. Built by the host, persisted in `migration_runs`.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct MigrationRun {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    /// Destination org receiving the copied state.
    pub org_id: i64,
    /// Org on the legacy deployment being copied.
    pub source_org_id: i64,

    #[builder(default)]
    pub status: MigrationStatus,

    /// First phase index to execute; phases below it are taken as done.
    /// Never advanced automatically.
    #[builder(default = 0)]
    pub start_from: i32,

    /// Parent run whose identity ledger this run extends.
    #[builder(default, setter(strip_option))]
    pub related_run: Option<Uuid>,

    #[builder(default, setter(strip_option))]
    pub start_date: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub end_date: Option<DateTime<Utc>>,

    #[builder(default = Utc::now())]
    pub created_on: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub modified_on: DateTime<Utc>,
}

impl MigrationRun {
    /// Ledger key shared by a run and its follow-ups.
    pub fn family(&self) -> Uuid {
        self.related_run.unwrap_or(self.id)
    }

    pub fn window(&self) -> SourceWindow {
        SourceWindow {
            start: self.start_date,
            end: self.end_date,
        }
    }

    /// A full run copies everything and resets destination state first;
    /// windowed follow-ups only add newer slices.
    pub fn is_full(&self) -> bool {
        self.window().is_open()
    }

    pub async fn create(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO migration_runs
                (id, org_id, source_org_id, status, start_from, related_run, start_date, end_date, created_on, modified_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.org_id)
        .bind(self.source_org_id)
        .bind(self.status)
        .bind(self.start_from)
        .bind(self.related_run)
        .bind(self.start_date)
        .bind(self.end_date)
        .bind(self.created_on)
        .bind(self.modified_on)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM migration_runs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn mark(id: Uuid, status: MigrationStatus, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE migration_runs
            SET status = $2, modified_on = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}

/// Status persistence seam so the orchestrator is testable without Postgres.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn mark(&self, run_id: Uuid, status: MigrationStatus) -> Result<()>;
}

pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn mark(&self, run_id: Uuid, status: MigrationStatus) -> Result<()> {
        MigrationRun::mark(run_id, status, &self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_falls_back_to_own_id() {
        let run = MigrationRun::builder().org_id(2_i64).source_org_id(9_i64).build();
        assert_eq!(run.family(), run.id);

        let parent = Uuid::new_v4();
        let child = MigrationRun::builder()
            .org_id(2_i64)
            .source_org_id(9_i64)
            .related_run(parent)
            .build();
        assert_eq!(child.family(), parent);
    }

    #[test]
    fn builder_defaults() {
        let run = MigrationRun::builder().org_id(2_i64).source_org_id(9_i64).build();
        assert_eq!(run.status, MigrationStatus::Pending);
        assert_eq!(run.start_from, 0);
        assert!(run.is_full());
    }

    #[test]
    fn windowed_run_is_not_full() {
        let run = MigrationRun::builder()
            .org_id(2_i64)
            .source_org_id(9_i64)
            .start_date(Utc::now())
            .build();
        assert!(!run.is_full());
        assert!(run.window().start.is_some());
        assert!(run.window().end.is_none());
    }
}
