//! End-to-end engine runs over the in-memory test doubles.
//!
//! Each scenario drives `MigrationEngine::begin` against a seeded
//! `MockSourceReader` and asserts on what landed in the `MockWarehouse`,
//! the identity ledger, and the run report:
//! - full and windowed runs
//! - checkpoint resume after a phase failure
//! - repeat runs updating instead of duplicating
//! - reference resolution (newest mapping wins, vanished rows skip)
//! - collection export/import onto the document store

use std::time::Duration;

use chrono::{TimeZone, Utc};
use migrator_core::source::{
    ChannelRow, ContactFieldRow, ContactRow, ContactUrnRow, ContactValueRow, GroupRow, MsgRow,
    OrgRow,
};
use migrator_core::test_dependencies::{
    MockCollectionStore, MockIdentityMap, MockSourceReader, MockWarehouse, TestDependencies,
};
use migrator_core::{EngineOptions, EntityType, MigrationRun, MigrationStatus};
use serde_json::{json, Map};
use uuid::Uuid;

const SOURCE_ORG: i64 = 9;
const DEST_ORG: i64 = 2;

fn test_options() -> EngineOptions {
    EngineOptions {
        log_dir: std::env::temp_dir().join(format!("engine-test-{}", Uuid::new_v4())),
        ..EngineOptions::default()
    }
}

fn acme() -> OrgRow {
    OrgRow {
        id: SOURCE_ORG,
        name: "Acme Health".to_string(),
        slug: Some("acme".to_string()),
        plan: Some("TRIAL".to_string()),
        plan_start: None,
        stripe_customer: None,
        language: Some("en-us".to_string()),
        timezone: "Africa/Kigali".to_string(),
        date_format: "D".to_string(),
        config: None,
        is_anon: false,
        surveyor_password: None,
        parent_id: None,
        primary_language_id: None,
    }
}

fn android_channel(id: i64) -> ChannelRow {
    ChannelRow {
        id,
        uuid: Uuid::new_v4(),
        channel_type: "A".to_string(),
        name: Some(format!("Nexus {id}")),
        address: Some(format!("+25078800{id:04}")),
        country: Some("RW".to_string()),
        config: None,
        role: "SR".to_string(),
        schemes: Some(vec!["tel".to_string()]),
        claim_code: None,
        secret: None,
        last_seen: None,
        device: None,
        os: None,
        alert_email: None,
        bod: None,
        is_active: true,
    }
}

fn contact(id: i64) -> ContactRow {
    ContactRow {
        id,
        uuid: Uuid::new_v4(),
        name: Some(format!("Contact {id}")),
        language: None,
        is_blocked: false,
        is_stopped: false,
        is_active: true,
        created_on: Utc.with_ymd_and_hms(2019, 3, 1, 8, 0, 0).unwrap(),
        modified_on: Utc.with_ymd_and_hms(2019, 6, 1, 8, 0, 0).unwrap(),
    }
}

fn incoming_msg(id: i64, contact_id: i64, channel_id: Option<i64>) -> MsgRow {
    MsgRow {
        id,
        uuid: Some(Uuid::new_v4()),
        channel_id,
        contact_id,
        contact_urn_id: None,
        broadcast_id: None,
        response_to_id: None,
        topup_id: None,
        text: format!("message {id}"),
        high_priority: None,
        created_on: Utc.with_ymd_and_hms(2019, 4, 2, 12, 0, 0).unwrap(),
        modified_on: None,
        sent_on: None,
        queued_on: None,
        direction: "I".to_string(),
        status: "H".to_string(),
        visibility: "V".to_string(),
        msg_type: Some("I".to_string()),
        msg_count: 1,
        error_count: 0,
        next_attempt: None,
        external_id: None,
        attachments: None,
        metadata: None,
    }
}

fn new_run() -> MigrationRun {
    MigrationRun::builder()
        .org_id(DEST_ORG)
        .source_org_id(SOURCE_ORG)
        .build()
}

// =============================================================================
// Full runs
// =============================================================================

#[tokio::test]
async fn full_run_copies_an_org_end_to_end() {
    // Arrange: an org with one channel, three contacts and two inbox messages.
    let channel = android_channel(50);
    let alice = contact(1);
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_channels(vec![channel.clone()])
        .with_contacts(vec![alice.clone(), contact(2), contact(3)])
        .with_messages(vec![incoming_msg(100, 1, Some(50)), incoming_msg(101, 2, None)]);
    let deps = TestDependencies::new().mock_source(source);
    let run = new_run();

    // Act
    let engine = deps.clone().into_engine(test_options());
    let report = engine.begin(&run).await.expect("run should report");

    // Assert: every phase ran and the counters line up.
    assert_eq!(report.status, MigrationStatus::Complete);
    assert!(report.error.is_none());
    assert_eq!(report.phases.len(), 19);
    assert_eq!(report.phase("channels").expect("channels phase").created, 1);
    assert_eq!(report.phase("contacts").expect("contacts phase").created, 3);
    assert_eq!(report.phase("messages").expect("messages phase").created, 2);
    // No document servers configured, so collections stay untouched.
    assert_eq!(report.phase("collections").expect("collections phase").created, 0);

    // The warehouse received the rows.
    assert_eq!(deps.warehouse.created_channels().len(), 1);
    assert_eq!(deps.warehouse.created_contacts().len(), 3);
    let messages = deps.warehouse.created_messages();
    assert_eq!(messages.len(), 2);

    // Foreign keys were rewritten through the ledger.
    let family = run.family();
    let new_channel = deps
        .identity
        .mapped(family, EntityType::Channel, 50)
        .expect("channel mapped");
    let new_contact = deps
        .identity
        .mapped(family, EntityType::Contact, 1)
        .expect("contact mapped");
    assert_eq!(messages[0].channel_id, Some(new_channel));
    assert_eq!(messages[0].contact_id, new_contact);
    assert_eq!(messages[1].channel_id, None);
    assert_eq!(deps.identity.mapping_count(EntityType::Contact), 3);
    assert_eq!(deps.identity.mapping_count(EntityType::Message), 2);

    // Inserts stamp now(); the source history must be written back.
    let stamps = deps.warehouse.contact_timestamps();
    assert_eq!(stamps.len(), 3);
    assert_eq!(stamps[0].1, alice.created_on);
    assert_eq!(stamps[0].2, alice.modified_on);

    // Status went processing then complete.
    assert_eq!(
        deps.runs.statuses(run.id),
        vec![MigrationStatus::Processing, MigrationStatus::Complete]
    );
}

#[tokio::test]
async fn contact_values_and_urns_travel_with_their_contact() {
    // Arrange: one contact carrying a field value, an orphan value and two
    // URNs, one of them on the retired websocket scheme.
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_channels(vec![android_channel(50)])
        .with_contact_fields(vec![ContactFieldRow {
            id: 10,
            uuid: Uuid::new_v4(),
            key: "favorite_color".to_string(),
            label: "Favorite Color".to_string(),
            value_type: "T".to_string(),
            show_in_table: Some(true),
        }])
        .with_contacts(vec![contact(1)])
        .with_contact_values(
            1,
            vec![
                ContactValueRow {
                    id: 500,
                    contact_field_id: 10,
                    string_value: Some("blue".to_string()),
                },
                // Field 99 was never exported; its value must be dropped.
                ContactValueRow {
                    id: 501,
                    contact_field_id: 99,
                    string_value: Some("orphan".to_string()),
                },
            ],
        )
        .with_contact_urns(
            1,
            vec![
                ContactUrnRow {
                    id: 70,
                    identity: "tel:+250788123123".to_string(),
                    auth: None,
                    channel_id: Some(50),
                },
                ContactUrnRow {
                    id: 71,
                    identity: "ws:abc-123".to_string(),
                    auth: None,
                    channel_id: None,
                },
            ],
        );
    let deps = TestDependencies::new().mock_source(source);
    let run = new_run();

    // Act
    let engine = deps.clone().into_engine(test_options());
    let report = engine.begin(&run).await.expect("run should report");
    assert_eq!(report.status, MigrationStatus::Complete);

    // Assert
    let family = run.family();
    let new_contact = deps
        .identity
        .mapped(family, EntityType::Contact, 1)
        .expect("contact mapped");
    let new_field = deps
        .identity
        .mapped(family, EntityType::ContactField, 10)
        .expect("field mapped");
    let new_channel = deps
        .identity
        .mapped(family, EntityType::Channel, 50)
        .expect("channel mapped");

    assert_eq!(
        deps.warehouse.field_values(),
        vec![(new_contact, new_field, "blue".to_string())]
    );

    let urns = deps.warehouse.upserted_urns();
    assert_eq!(urns.len(), 2);
    assert_eq!(urns[0].0, new_contact);
    assert_eq!(urns[0].1.identity, "tel:+250788123123");
    assert_eq!(urns[0].1.channel_id, Some(new_channel));
    // Websocket URNs come across on the external scheme.
    assert_eq!(urns[1].1.identity, "ext:abc-123");
    assert_eq!(urns[1].1.channel_id, None);
    assert_eq!(deps.identity.mapping_count(EntityType::ContactUrn), 2);
}

// =============================================================================
// Reference handling
// =============================================================================

#[tokio::test]
async fn messages_survive_dropped_channels_but_not_missing_contacts() {
    // Arrange: the only channel is inactive on the source, so it is removed
    // rather than copied. Contact 777 was never exported at all.
    let mut dead = android_channel(60);
    dead.is_active = false;
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_channels(vec![dead.clone()])
        .with_contacts(vec![contact(1)])
        .with_messages(vec![incoming_msg(100, 1, Some(60)), incoming_msg(101, 777, None)]);
    let deps = TestDependencies::new().mock_source(source);
    let run = new_run();

    // Act
    let engine = deps.clone().into_engine(test_options());
    let report = engine.begin(&run).await.expect("run should report");

    // Assert: the run still completes.
    assert_eq!(report.status, MigrationStatus::Complete);
    assert_eq!(report.phase("channels").expect("channels phase").skipped, 1);
    assert_eq!(report.removed_channels(), vec![dead.uuid]);
    assert!(deps.warehouse.created_channels().is_empty());

    // The message referencing the dropped channel lands without one; the
    // message whose contact is gone is skipped entirely.
    let phase = report.phase("messages").expect("messages phase");
    assert_eq!(phase.created, 1);
    assert_eq!(phase.skipped, 1);
    let messages = deps.warehouse.created_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].channel_id, None);
}

#[tokio::test]
async fn conflicting_channel_addresses_are_not_copied() {
    // Arrange: the destination already has this address claimed by another
    // org.
    let channel = android_channel(50);
    let address = channel.address.clone().expect("fixture address");
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_channels(vec![channel]);
    let warehouse = MockWarehouse::new().with_conflicting_channel(&address, "A");
    let deps = TestDependencies::new()
        .mock_source(source)
        .mock_warehouse(warehouse);
    let run = new_run();

    // Act
    let engine = deps.clone().into_engine(test_options());
    let report = engine.begin(&run).await.expect("run should report");

    // Assert: skipped, unmapped, nothing written.
    assert_eq!(report.status, MigrationStatus::Complete);
    assert_eq!(report.phase("channels").expect("channels phase").created, 0);
    assert_eq!(report.phase("channels").expect("channels phase").skipped, 1);
    assert!(deps.warehouse.created_channels().is_empty());
    assert_eq!(deps.identity.mapping_count(EntityType::Channel), 0);
}

#[tokio::test]
async fn resolution_prefers_the_newest_mapping() {
    // Arrange: contact 1 was migrated twice; the ledger holds both rows and
    // the newer destination row must win. Starting from the message phase
    // leaves the seeded ledger untouched.
    let run = MigrationRun::builder()
        .org_id(DEST_ORG)
        .source_org_id(SOURCE_ORG)
        .start_from(9)
        .build();
    let identity = MockIdentityMap::new()
        .with_mapping(run.id, EntityType::Contact, 1, 111)
        .with_mapping(run.id, EntityType::Contact, 1, 222);
    let warehouse = MockWarehouse::new()
        .with_existing(EntityType::Contact, 111)
        .with_existing(EntityType::Contact, 222);
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_messages(vec![incoming_msg(100, 1, None)]);
    let deps = TestDependencies::new()
        .mock_source(source)
        .mock_identity(identity)
        .mock_warehouse(warehouse);

    // Act
    let engine = deps.clone().into_engine(test_options());
    let report = engine.begin(&run).await.expect("run should report");

    // Assert: phases before the checkpoint never touched the source.
    assert_eq!(report.status, MigrationStatus::Complete);
    assert!(!deps.source.was_called("contacts"));
    assert!(!deps.source.was_called("channels"));

    let messages = deps.warehouse.created_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].contact_id, 222);
}

#[tokio::test]
async fn mappings_to_vanished_rows_do_not_resolve() {
    // Arrange: the ledger says contact 1 became 555, but that row is gone
    // from the destination.
    let run = MigrationRun::builder()
        .org_id(DEST_ORG)
        .source_org_id(SOURCE_ORG)
        .start_from(9)
        .build();
    let identity = MockIdentityMap::new().with_mapping(run.id, EntityType::Contact, 1, 555);
    let warehouse = MockWarehouse::new()
        .with_existing(EntityType::Contact, 555)
        .with_missing(EntityType::Contact, 555);
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_messages(vec![incoming_msg(100, 1, None)]);
    let deps = TestDependencies::new()
        .mock_source(source)
        .mock_identity(identity)
        .mock_warehouse(warehouse);

    // Act
    let engine = deps.clone().into_engine(test_options());
    let report = engine.begin(&run).await.expect("run should report");

    // Assert: a stale mapping reads as unmigrated.
    assert_eq!(report.status, MigrationStatus::Complete);
    assert_eq!(report.phase("messages").expect("messages phase").skipped, 1);
    assert!(deps.warehouse.created_messages().is_empty());
}

// =============================================================================
// Failure and resume
// =============================================================================

#[tokio::test]
async fn a_missing_source_org_fails_the_run() {
    // Arrange: the source has no org at all.
    let deps = TestDependencies::new();
    let run = new_run();

    // Act
    let engine = deps.clone().into_engine(test_options());
    let report = engine.begin(&run).await.expect("failed runs still report");

    // Assert
    assert_eq!(report.status, MigrationStatus::Failed);
    let error = report.error.expect("failure reason");
    assert!(
        error.contains("source org 9 does not exist"),
        "unexpected error: {error}"
    );
    assert!(report.phases.is_empty());
    assert_eq!(
        deps.runs.statuses(run.id),
        vec![MigrationStatus::Processing, MigrationStatus::Failed]
    );
}

#[tokio::test]
async fn a_first_phase_error_fails_the_run() {
    // Arrange: the credit grant query blows up mid-phase.
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_channels(vec![android_channel(50)])
        .with_failure_once("credit_grants");
    let deps = TestDependencies::new().mock_source(source);
    let run = new_run();

    // Act
    let engine = deps.clone().into_engine(test_options());
    let report = engine.begin(&run).await.expect("failed runs still report");

    // Assert: the run stops before any later phase runs.
    assert_eq!(report.status, MigrationStatus::Failed);
    let error = report.error.expect("failure reason");
    assert!(
        error.contains("phase 0 (organization) failed"),
        "unexpected error: {error}"
    );
    assert!(report.phases.is_empty());
    assert!(!deps.source.was_called("channels"));
    assert_eq!(deps.runs.last_status(run.id), Some(MigrationStatus::Failed));
}

#[tokio::test]
async fn failed_runs_resume_from_their_checkpoint() {
    // Arrange: the message query fails once, then works.
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_channels(vec![android_channel(50)])
        .with_contacts(vec![contact(1)])
        .with_messages(vec![incoming_msg(100, 1, Some(50))])
        .with_failure_once("messages");
    let deps = TestDependencies::new().mock_source(source);
    let engine = deps.clone().into_engine(test_options());

    // Act: first attempt dies in the message phase.
    let first = new_run();
    let report = engine.begin(&first).await.expect("failed runs still report");
    assert_eq!(report.status, MigrationStatus::Failed);
    let error = report.error.expect("failure reason");
    assert!(
        error.contains("phase 9 (messages) failed"),
        "unexpected error: {error}"
    );
    assert!(error.contains("injected messages failure"), "unexpected error: {error}");
    // The nine phases before the failure completed and reported.
    assert_eq!(report.phases.len(), 9);
    assert!(deps.warehouse.created_messages().is_empty());
    assert_eq!(deps.runs.last_status(first.id), Some(MigrationStatus::Failed));

    // Act: resume from the message phase, extending the first run's ledger.
    let resumed = MigrationRun::builder()
        .org_id(DEST_ORG)
        .source_org_id(SOURCE_ORG)
        .start_from(9)
        .related_run(first.id)
        .build();
    let report = engine.begin(&resumed).await.expect("resumed run should report");

    // Assert: only the remaining phases ran.
    assert_eq!(report.status, MigrationStatus::Complete);
    assert_eq!(report.phases.len(), 10);
    assert_eq!(report.phases[0].name, "messages");
    assert_eq!(deps.source.call_count("contacts"), 1);
    assert_eq!(deps.source.call_count("channels"), 1);
    assert_eq!(deps.source.call_count("messages"), 2);

    // The resumed run resolved contacts through the first run's ledger.
    let messages = deps.warehouse.created_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].contact_id,
        deps.identity
            .mapped(first.id, EntityType::Contact, 1)
            .expect("contact mapped by the first run")
    );
    assert_eq!(deps.runs.last_status(resumed.id), Some(MigrationStatus::Complete));
}

// =============================================================================
// Repeat and windowed runs
// =============================================================================

#[tokio::test]
async fn repeating_a_run_updates_instead_of_duplicating() {
    // Arrange: two contacts, one field and one static group with both
    // contacts in it.
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_contact_fields(vec![ContactFieldRow {
            id: 10,
            uuid: Uuid::new_v4(),
            key: "district".to_string(),
            label: "District".to_string(),
            value_type: "T".to_string(),
            show_in_table: None,
        }])
        .with_contacts(vec![contact(1), contact(2)])
        .with_groups(vec![GroupRow {
            id: 20,
            uuid: Uuid::new_v4(),
            name: "Farmers".to_string(),
            query: None,
        }])
        .with_group_members(20, vec![1, 2]);
    let deps = TestDependencies::new().mock_source(source);
    let engine = deps.clone().into_engine(test_options());
    let run = new_run();

    // Act: the same run, begun twice.
    let report = engine.begin(&run).await.expect("first pass should report");
    assert_eq!(report.status, MigrationStatus::Complete);
    assert_eq!(report.phase("contacts").expect("contacts phase").created, 2);
    assert_eq!(report.phase("groups").expect("groups phase").created, 1);

    let report = engine.begin(&run).await.expect("second pass should report");

    // Assert: the second pass matched everything by uuid and updated in
    // place.
    assert_eq!(report.status, MigrationStatus::Complete);
    let contacts = report.phase("contacts").expect("contacts phase");
    assert_eq!(contacts.created, 0);
    assert_eq!(contacts.updated, 2);
    let fields = report.phase("contact fields").expect("contact fields phase");
    assert_eq!(fields.created, 0);
    assert_eq!(fields.updated, 1);
    let groups = report.phase("groups").expect("groups phase");
    assert_eq!(groups.created, 0);
    assert_eq!(groups.updated, 1);

    assert_eq!(deps.warehouse.created_contacts().len(), 2);
    assert_eq!(deps.warehouse.contact_updates().len(), 2);
    assert_eq!(deps.warehouse.created_contact_fields().len(), 1);
    assert_eq!(deps.warehouse.contact_field_updates().len(), 1);
    assert_eq!(deps.warehouse.upserted_groups().len(), 1);

    // Memberships resolved to the same destination rows both times.
    let members = deps.warehouse.group_members();
    assert_eq!(members.len(), 4);
    assert_eq!(members[0], members[2]);
    assert_eq!(members[1], members[3]);
}

#[tokio::test]
async fn full_runs_reset_destination_state_and_windowed_runs_do_not() {
    // Arrange/Act: a full run first.
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_channels(vec![android_channel(50)])
        .with_contacts(vec![contact(1)]);
    let deps = TestDependencies::new().mock_source(source);
    let engine = deps.clone().into_engine(test_options());
    let report = engine.begin(&new_run()).await.expect("run should report");
    assert_eq!(report.status, MigrationStatus::Complete);

    // A full run clears what it is about to re-copy.
    assert!(deps.warehouse.was_prepared("neutralize_channels"));
    assert!(deps.warehouse.was_prepared("release_groups"));
    assert!(deps.warehouse.was_prepared("clear_channel_events"));
    assert!(deps.warehouse.was_prepared("deactivate_schedules"));

    // Act: the same shape of run, but windowed.
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_channels(vec![android_channel(50)])
        .with_contacts(vec![contact(1)]);
    let deps = TestDependencies::new().mock_source(source);
    let engine = deps.clone().into_engine(test_options());
    let windowed = MigrationRun::builder()
        .org_id(DEST_ORG)
        .source_org_id(SOURCE_ORG)
        .start_date(Utc.with_ymd_and_hms(2019, 5, 1, 0, 0, 0).unwrap())
        .build();
    let report = engine.begin(&windowed).await.expect("run should report");

    // Assert: a follow-up only adds on top.
    assert_eq!(report.status, MigrationStatus::Complete);
    assert!(!deps.warehouse.was_prepared("neutralize_channels"));
    assert!(!deps.warehouse.was_prepared("release_groups"));
    assert!(!deps.warehouse.was_prepared("clear_channel_events"));
    assert!(!deps.warehouse.was_prepared("deactivate_schedules"));
}

// =============================================================================
// Collections
// =============================================================================

#[tokio::test]
async fn gift_card_collections_replay_onto_the_destination() {
    // Arrange: the org lists one gift card collection; the source document
    // server holds its class with two rows.
    let mut org = acme();
    org.config = Some(r#"{"GIFTCARDS": ["Promo Cards"]}"#.to_string());
    let source_class = "legacy_acme_9_giftcards_promocards";
    let dest_class = "prod_acme_2_giftcards_promocards";

    let mut first = Map::new();
    first.insert("code".to_string(), json!("GC-100"));
    let mut second = Map::new();
    second.insert("code".to_string(), json!("GC-200"));
    let source_collections = MockCollectionStore::new()
        .with_class(source_class, &[("code", "String"), ("order", "Number")])
        .with_rows(source_class, vec![first, second]);

    let deps = TestDependencies::new()
        .mock_source(MockSourceReader::new().with_org(org))
        .mock_collections(source_collections, MockCollectionStore::new());
    let options = EngineOptions {
        source_server_name: Some("legacy".to_string()),
        dest_server_name: Some("prod".to_string()),
        ..test_options()
    };
    let run = new_run();

    // Act
    let engine = deps.clone().into_engine(options);
    let report = engine.begin(&run).await.expect("run should report");
    assert_eq!(report.status, MigrationStatus::Complete);
    assert_eq!(report.phase("collections").expect("collections phase").created, 1);

    // The import itself runs detached; wait for the notifier to hear how it
    // ended.
    for _ in 0..100 {
        if deps.notifier.was_notified("Promo Cards") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Assert
    let notifications = deps.notifier.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].org, DEST_ORG);
    assert!(notifications[0].ok, "import failed: {}", notifications[0].detail);
    assert!(notifications[0].detail.contains("2 rows"));

    let dest = deps.dest_collections.as_ref().expect("dest store");
    // The destination class did not exist, so it was created fresh rather
    // than purged.
    assert!(!dest.was_purged(dest_class));
    let schemas = dest.created_schemas();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].class_name, dest_class);
    assert!(schemas[0].fields.contains_key("code"));
    assert!(schemas[0].fields.contains_key("order"));

    let inserted = dest.inserted_rows(dest_class);
    assert_eq!(inserted.len(), 2);
    assert_eq!(inserted[0]["code"], json!("GC-100"));
    assert_eq!(inserted[0]["order"], json!(1));
    assert_eq!(inserted[1]["code"], json!("GC-200"));
    assert_eq!(inserted[1]["order"], json!(2));
}

// =============================================================================
// Reset
// =============================================================================

#[tokio::test]
async fn reset_keeps_only_the_organization_anchor() {
    // Arrange: a completed run with one contact in the ledger.
    let source = MockSourceReader::new()
        .with_org(acme())
        .with_contacts(vec![contact(1)]);
    let deps = TestDependencies::new().mock_source(source);
    let engine = deps.clone().into_engine(test_options());
    let run = new_run();
    let report = engine.begin(&run).await.expect("run should report");
    assert_eq!(report.status, MigrationStatus::Complete);
    assert!(deps
        .identity
        .mapped(run.family(), EntityType::Contact, 1)
        .is_some());

    // Act
    engine.reset(&run).await.expect("reset should succeed");

    // Assert: contact mappings are gone, the org anchor survives.
    assert!(deps
        .identity
        .mapped(run.family(), EntityType::Contact, 1)
        .is_none());
    assert_eq!(
        deps.identity
            .mapped(run.family(), EntityType::Organization, SOURCE_ORG),
        Some(DEST_ORG)
    );
}
