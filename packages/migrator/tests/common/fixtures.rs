//! Legacy-schema fixtures for source reader tests.
//!
//! The reader only ever reads, so tests create the legacy tables they need
//! and seed them in bulk with `generate_series`. Tests share one database;
//! rows are isolated by org id.

use sqlx::PgPool;
use tokio::sync::OnceCell;

static LEGACY_TABLES: OnceCell<()> = OnceCell::const_new();

/// Create the legacy contact table on first use. Guarded so parallel tests
/// never race the DDL.
pub async fn ensure_legacy_contact_table(pool: &PgPool) {
    LEGACY_TABLES
        .get_or_init(|| async {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS public.contacts_contact (
                    id BIGINT PRIMARY KEY,
                    uuid VARCHAR(36) NOT NULL,
                    name VARCHAR(128),
                    language VARCHAR(3),
                    is_blocked BOOLEAN NOT NULL DEFAULT FALSE,
                    is_stopped BOOLEAN NOT NULL DEFAULT FALSE,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_on TIMESTAMPTZ NOT NULL,
                    modified_on TIMESTAMPTZ NOT NULL,
                    org_id BIGINT NOT NULL,
                    is_test BOOLEAN NOT NULL DEFAULT FALSE
                )
                "#,
            )
            .execute(pool)
            .await
            .expect("Failed to create contacts_contact");
        })
        .await;
}

/// Seed `count` contacts for the org with ids `base + 1 ..= base + count`,
/// created one minute apart starting at 2019-01-01 00:01 UTC.
pub async fn seed_contacts(pool: &PgPool, org: i64, base: i64, count: i64, is_test: bool) {
    sqlx::query(
        r#"
        INSERT INTO public.contacts_contact
            (id, uuid, name, language, is_blocked, is_stopped, is_active,
             created_on, modified_on, org_id, is_test)
        SELECT
            $1 + gs,
            gen_random_uuid()::text,
            'Contact ' || ($1 + gs),
            'eng',
            FALSE,
            FALSE,
            TRUE,
            TIMESTAMPTZ '2019-01-01 00:00:00+00' + (gs || ' minutes')::interval,
            TIMESTAMPTZ '2019-06-01 00:00:00+00',
            $2,
            $3
        FROM generate_series(1, $4) AS gs
        "#,
    )
    .bind(base)
    .bind(org)
    .bind(is_test)
    .bind(count)
    .execute(pool)
    .await
    .expect("Failed to seed contacts");
}
