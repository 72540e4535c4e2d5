//! Postgres-backed store tests over the shared test container.
//!
//! Covers the three stores that live on real connections:
//! - the identity ledger (append-only, newest row wins, org anchor survives)
//! - run persistence and status transitions
//! - the paged source reader against a seeded legacy schema

mod common;

use crate::common::{ensure_legacy_contact_table, seed_contacts, TestHarness};
use chrono::{TimeZone, Utc};
use migrator_core::identity::{IdentityStore, PgIdentityMap};
use migrator_core::run::{PgRunStore, RunStore};
use migrator_core::source::pg::PgSourceReader;
use migrator_core::source::SourceReader;
use migrator_core::{EntityType, MigrationRun, MigrationStatus, SourceWindow};
use test_context::test_context;
use uuid::Uuid;

// =============================================================================
// Identity ledger
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn identity_lookups_take_the_newest_row(ctx: &TestHarness) {
    let ledger = PgIdentityMap::new(ctx.db_pool.clone());
    let family = Uuid::new_v4();

    // Two appends for the same key; the second must win.
    ledger
        .record(family, EntityType::Contact, 1, 111)
        .await
        .expect("Failed to record mapping");
    ledger
        .record(family, EntityType::Contact, 1, 222)
        .await
        .expect("Failed to record mapping");

    let resolved = ledger
        .resolve(family, EntityType::Contact, 1)
        .await
        .expect("Failed to resolve mapping");
    assert_eq!(resolved, Some(222));

    // Other families and other entity types stay invisible.
    let other_family = ledger
        .resolve(Uuid::new_v4(), EntityType::Contact, 1)
        .await
        .expect("Failed to resolve mapping");
    assert_eq!(other_family, None);
    let other_entity = ledger
        .resolve(family, EntityType::Message, 1)
        .await
        .expect("Failed to resolve mapping");
    assert_eq!(other_entity, None);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn clear_spares_the_organization_anchor(ctx: &TestHarness) {
    let ledger = PgIdentityMap::new(ctx.db_pool.clone());
    let family = Uuid::new_v4();
    let other = Uuid::new_v4();

    ledger
        .record(family, EntityType::Organization, 9, 2)
        .await
        .expect("Failed to record mapping");
    ledger
        .record(family, EntityType::Contact, 1, 111)
        .await
        .expect("Failed to record mapping");
    ledger
        .record(family, EntityType::Channel, 50, 900)
        .await
        .expect("Failed to record mapping");
    ledger
        .record(other, EntityType::Contact, 1, 333)
        .await
        .expect("Failed to record mapping");

    ledger.clear(family).await.expect("Failed to clear ledger");

    // The org anchor survives so a future re-run still knows its target.
    let org = ledger
        .resolve(family, EntityType::Organization, 9)
        .await
        .expect("Failed to resolve mapping");
    assert_eq!(org, Some(2));
    let contact = ledger
        .resolve(family, EntityType::Contact, 1)
        .await
        .expect("Failed to resolve mapping");
    assert_eq!(contact, None);
    let channel = ledger
        .resolve(family, EntityType::Channel, 50)
        .await
        .expect("Failed to resolve mapping");
    assert_eq!(channel, None);

    // The other family's ledger is untouched.
    let unaffected = ledger
        .resolve(other, EntityType::Contact, 1)
        .await
        .expect("Failed to resolve mapping");
    assert_eq!(unaffected, Some(333));
}

// =============================================================================
// Run persistence
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn runs_round_trip_and_transition(ctx: &TestHarness) {
    let run = MigrationRun::builder()
        .org_id(2_i64)
        .source_org_id(9_i64)
        .build();
    let created = run.create(&ctx.db_pool).await.expect("Failed to create run");
    assert_eq!(created.status, MigrationStatus::Pending);

    let found = MigrationRun::find(run.id, &ctx.db_pool)
        .await
        .expect("Failed to find run")
        .expect("Run should exist");
    assert_eq!(found.org_id, 2);
    assert_eq!(found.source_org_id, 9);
    assert_eq!(found.start_from, 0);
    assert_eq!(found.related_run, None);

    // The engine drives transitions through the store seam.
    let store = PgRunStore::new(ctx.db_pool.clone());
    store
        .mark(run.id, MigrationStatus::Processing)
        .await
        .expect("Failed to mark run");
    store
        .mark(run.id, MigrationStatus::Complete)
        .await
        .expect("Failed to mark run");

    let found = MigrationRun::find(run.id, &ctx.db_pool)
        .await
        .expect("Failed to find run")
        .expect("Run should exist");
    assert_eq!(found.status, MigrationStatus::Complete);
    assert!(found.modified_on >= found.created_on);

    let missing = MigrationRun::find(Uuid::new_v4(), &ctx.db_pool)
        .await
        .expect("Failed to query run");
    assert!(missing.is_none());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn follow_up_runs_keep_their_parent(ctx: &TestHarness) {
    let parent = MigrationRun::builder()
        .org_id(2_i64)
        .source_org_id(9_i64)
        .build();
    parent.create(&ctx.db_pool).await.expect("Failed to create run");

    let child = MigrationRun::builder()
        .org_id(2_i64)
        .source_org_id(9_i64)
        .start_from(9)
        .related_run(parent.id)
        .start_date(Utc.with_ymd_and_hms(2019, 5, 1, 0, 0, 0).unwrap())
        .build();
    child.create(&ctx.db_pool).await.expect("Failed to create run");

    let found = MigrationRun::find(child.id, &ctx.db_pool)
        .await
        .expect("Failed to find run")
        .expect("Run should exist");
    assert_eq!(found.related_run, Some(parent.id));
    assert_eq!(found.family(), parent.id);
    assert_eq!(found.start_from, 9);
    assert!(!found.is_full());
}

// =============================================================================
// Source reader
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn source_reader_pages_through_large_orgs(ctx: &TestHarness) {
    ensure_legacy_contact_table(&ctx.db_pool).await;
    // 2500 rows forces three pages. Test rows and foreign orgs must not leak
    // into the result.
    let org = 9100;
    seed_contacts(&ctx.db_pool, org, 1_000_000, 2500, false).await;
    seed_contacts(&ctx.db_pool, org, 2_000_000, 5, true).await;
    seed_contacts(&ctx.db_pool, 9101, 3_000_000, 5, false).await;

    let reader = PgSourceReader::new(ctx.db_pool.clone());
    let contacts = reader
        .contacts(org, SourceWindow::default())
        .await
        .expect("Failed to read contacts");

    assert_eq!(contacts.len(), 2500);
    assert_eq!(contacts[0].id, 1_000_001);
    assert_eq!(contacts[2499].id, 1_002_500);
    // Stable id order across page boundaries.
    assert!(contacts.windows(2).all(|pair| pair[0].id < pair[1].id));
    assert!(contacts.iter().all(|c| c.is_active));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn source_reader_honors_the_window(ctx: &TestHarness) {
    ensure_legacy_contact_table(&ctx.db_pool).await;
    // 60 contacts created one minute apart from 2019-01-01 00:01.
    let org = 9200;
    seed_contacts(&ctx.db_pool, org, 4_000_000, 60, false).await;

    let reader = PgSourceReader::new(ctx.db_pool.clone());
    let window = SourceWindow {
        start: Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 31, 0).unwrap()),
        end: Some(Utc.with_ymd_and_hms(2019, 1, 1, 0, 45, 0).unwrap()),
    };
    let contacts = reader
        .contacts(org, window)
        .await
        .expect("Failed to read contacts");

    // Both bounds are inclusive: minutes 31 through 45.
    assert_eq!(contacts.len(), 15);
    assert_eq!(contacts.first().map(|c| c.id), Some(4_000_031));
    assert_eq!(contacts.last().map(|c| c.id), Some(4_000_045));
}
