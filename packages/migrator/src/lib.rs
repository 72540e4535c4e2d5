// Cross-Environment Organization Migration Engine
//
// Copies the entire operational state of one organization from a legacy
// deployment ("1.0") into its successor ("2.0"). Primary-key spaces are
// disjoint; every cross-entity reference is translated through an append-only
// identity ledger. Phases execute in dependency order and a failed run can be
// resumed from any phase via the start_from checkpoint.

pub mod collections;
pub mod config;
pub mod engine;
pub mod entity;
pub mod identity;
pub mod media;
pub mod notify;
pub mod phases;
pub mod report;
pub mod run;
pub mod runlog;
pub mod source;
pub mod test_dependencies;
pub mod warehouse;

pub use config::Config;
pub use engine::{EngineOptions, MigrationEngine, PhaseContext};
pub use entity::EntityType;
pub use report::{PhaseReport, RecordOutcome, RunReport, SkipReason};
pub use run::{MigrationRun, MigrationStatus, RunStore, SourceWindow};
pub use test_dependencies::TestDependencies;

/// Schema migrations for the engine-owned tables (runs + associations).
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
