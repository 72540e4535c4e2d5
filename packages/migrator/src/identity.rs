//! Identity ledger: source primary keys to destination primary keys.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entity::EntityType;

/// Append-only mapping store keyed by `(run family, entity type, old id)`.
///
/// The family is the run's `related_run` when set, so follow-up runs read and
/// extend the ledger of the run they continue.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Append a mapping. Existing rows are never touched; lookups take the
    /// newest row.
    async fn record(
        &self,
        family: Uuid,
        entity: EntityType,
        old_id: i64,
        new_id: i64,
    ) -> Result<()>;

    /// Newest mapping for the key, if any.
    async fn resolve(&self, family: Uuid, entity: EntityType, old_id: i64)
        -> Result<Option<i64>>;

    /// Drop every mapping for the family except organizations, which anchor
    /// any future re-run.
    async fn clear(&self, family: Uuid) -> Result<()>;
}

pub struct PgIdentityMap {
    pool: PgPool,
}

impl PgIdentityMap {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityMap {
    async fn record(
        &self,
        family: Uuid,
        entity: EntityType,
        old_id: i64,
        new_id: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO migration_associations (run_id, entity_type, old_id, new_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(family)
        .bind(entity)
        .bind(old_id)
        .bind(new_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn resolve(
        &self,
        family: Uuid,
        entity: EntityType,
        old_id: i64,
    ) -> Result<Option<i64>> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT new_id FROM migration_associations
            WHERE run_id = $1 AND entity_type = $2 AND old_id = $3
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(family)
        .bind(entity)
        .bind(old_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn clear(&self, family: Uuid) -> Result<()> {
        sqlx::query(
            "DELETE FROM migration_associations WHERE run_id = $1 AND entity_type <> $2",
        )
        .bind(family)
        .bind(EntityType::Organization)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
