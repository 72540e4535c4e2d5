//! Run orchestration.
//!
//! [`MigrationEngine`] owns every dependency a run needs (the legacy reader,
//! the identity ledger, the destination warehouse, media and collection
//! stores) and drives the phase schedule over them. Phases receive the lot
//! through a [`PhaseContext`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use parse::{ParseClient, ParseOptions};

use crate::collections::{CollectionStore, ParseCollectionStore};
use crate::config::Config;
use crate::entity::EntityType;
use crate::identity::{IdentityStore, PgIdentityMap};
use crate::media::{HttpMediaStore, MediaStore, NoopMediaStore};
use crate::notify::{LogNotifier, Notifier};
use crate::phases::phase_schedule;
use crate::report::RunReport;
use crate::run::{MigrationRun, MigrationStatus, PgRunStore, RunStore, SourceWindow};
use crate::runlog::RunLog;
use crate::source::pg::PgSourceReader;
use crate::source::rows::OrgRow;
use crate::source::SourceReader;
use crate::warehouse::{PgWarehouse, Warehouse};

/// Tunables threaded through to the phases.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Directory receiving per-run log artifacts.
    pub log_dir: PathBuf,
    /// Public base URL of the legacy deployment, for resolving relative
    /// media paths.
    pub source_media_url: String,
    /// Throughput assigned to newly created channels.
    pub default_channel_tps: i32,
    /// Definition version flow revisions are upgraded to.
    pub flow_spec_version: String,
    /// Class-name prefixes of the two collection servers.
    pub source_server_name: Option<String>,
    pub dest_server_name: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("migration_logs"),
            source_media_url: String::new(),
            default_channel_tps: 10,
            flow_spec_version: "13.1.0".to_string(),
            source_server_name: None,
            dest_server_name: None,
        }
    }
}

pub struct MigrationEngine {
    source: Arc<dyn SourceReader>,
    identity: Arc<dyn IdentityStore>,
    warehouse: Arc<dyn Warehouse>,
    media: Arc<dyn MediaStore>,
    source_collections: Option<Arc<dyn CollectionStore>>,
    dest_collections: Option<Arc<dyn CollectionStore>>,
    notifier: Arc<dyn Notifier>,
    runs: Arc<dyn RunStore>,
    options: EngineOptions,
}

impl MigrationEngine {
    pub fn new(
        source: Arc<dyn SourceReader>,
        identity: Arc<dyn IdentityStore>,
        warehouse: Arc<dyn Warehouse>,
        media: Arc<dyn MediaStore>,
        notifier: Arc<dyn Notifier>,
        runs: Arc<dyn RunStore>,
        options: EngineOptions,
    ) -> Self {
        Self {
            source,
            identity,
            warehouse,
            media,
            source_collections: None,
            dest_collections: None,
            notifier,
            runs,
            options,
        }
    }

    pub fn with_collection_stores(
        mut self,
        source: Arc<dyn CollectionStore>,
        dest: Arc<dyn CollectionStore>,
    ) -> Self {
        self.source_collections = Some(source);
        self.dest_collections = Some(dest);
        self
    }

    /// Wire up the production engine: both databases, the engine-owned
    /// tables, media re-hosting and the optional collection servers.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let dest_pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("failed to connect to the destination database")?;
        crate::MIGRATOR
            .run(&dest_pool)
            .await
            .context("failed to apply engine migrations")?;

        let source_pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.source_database_url)
            .await
            .context("failed to connect to the source database")?;

        let warehouse = match &config.flow_upgrade_url {
            Some(url) => PgWarehouse::new(dest_pool.clone()).with_flow_upgrader(url)?,
            None => PgWarehouse::new(dest_pool.clone()),
        };

        let media: Arc<dyn MediaStore> = match (&config.media_upload_url, config.rehost_media) {
            (Some(endpoint), true) => Arc::new(HttpMediaStore::new(
                endpoint,
                config.media_upload_token.clone(),
            )?),
            _ => Arc::new(NoopMediaStore),
        };

        let mut engine = Self {
            source: Arc::new(PgSourceReader::new(source_pool)),
            identity: Arc::new(PgIdentityMap::new(dest_pool.clone())),
            warehouse: Arc::new(warehouse),
            media,
            source_collections: None,
            dest_collections: None,
            notifier: Arc::new(LogNotifier),
            runs: Arc::new(PgRunStore::new(dest_pool)),
            options: EngineOptions {
                log_dir: PathBuf::from(&config.log_dir),
                source_media_url: config.source_media_url.clone(),
                default_channel_tps: config.default_channel_tps,
                flow_spec_version: config.flow_spec_version.clone(),
                source_server_name: config.source_parse.as_ref().map(|p| p.server_name.clone()),
                dest_server_name: config.dest_parse.as_ref().map(|p| p.server_name.clone()),
            },
        };

        engine.source_collections = Self::collection_store(&config.source_parse)?;
        engine.dest_collections = Self::collection_store(&config.dest_parse)?;
        Ok(engine)
    }

    fn collection_store(
        server: &Option<crate::config::ParseServerConfig>,
    ) -> Result<Option<Arc<dyn CollectionStore>>> {
        let Some(server) = server else {
            return Ok(None);
        };
        let client = ParseClient::new(ParseOptions {
            server_url: server.server_url.clone(),
            app_id: server.app_id.clone(),
            master_key: server.master_key.clone(),
        })?;
        Ok(Some(Arc::new(ParseCollectionStore::new(client))))
    }

    /// Execute the run. Phases below `start_from` are skipped; the first
    /// phase error fails the run and leaves later phases untouched. The
    /// report is returned for Complete and Failed runs alike.
    pub async fn begin(&self, run: &MigrationRun) -> Result<RunReport> {
        let mut report = RunReport::new(run.id);
        self.runs.mark(run.id, MigrationStatus::Processing).await?;

        let log = RunLog::open(&self.options.log_dir, run.id)?;
        log.info(format!(
            "migrating source org {} into destination org {}",
            run.source_org_id, run.org_id
        ));
        if !run.is_full() {
            log.info(format!(
                "windowed run: {:?} .. {:?}",
                run.start_date, run.end_date
            ));
        }
        if run.start_from > 0 {
            log.info(format!("resuming from phase {}", run.start_from));
        }

        let org = match self.source.org(run.source_org_id).await {
            Ok(Some(org)) => org,
            Ok(None) => {
                let reason = format!("source org {} does not exist", run.source_org_id);
                return self.fail(run, report, &log, reason).await;
            }
            Err(err) => {
                let reason = format!("failed to read source org: {err:#}");
                return self.fail(run, report, &log, reason).await;
            }
        };

        let ctx = PhaseContext {
            run,
            org: &org,
            source: self.source.as_ref(),
            identity: self.identity.as_ref(),
            warehouse: self.warehouse.as_ref(),
            media: self.media.as_ref(),
            source_collections: self.source_collections.clone(),
            dest_collections: self.dest_collections.clone(),
            notifier: self.notifier.clone(),
            log: &log,
            options: &self.options,
        };

        for phase in phase_schedule() {
            if phase.index() < run.start_from {
                log.info(format!(
                    "phase {} ({}) already done, skipping",
                    phase.index(),
                    phase.name()
                ));
                continue;
            }

            log.info(format!("phase {} ({}) starting", phase.index(), phase.name()));
            match phase.run(&ctx).await {
                Ok(phase_report) => {
                    log.info(format!(
                        "phase {} ({}) done: {} created, {} updated, {} skipped, {} failed",
                        phase.index(),
                        phase.name(),
                        phase_report.created,
                        phase_report.updated,
                        phase_report.skipped,
                        phase_report.failed
                    ));
                    report.push(phase_report);
                }
                Err(err) => {
                    let reason = format!(
                        "phase {} ({}) failed: {err:#}",
                        phase.index(),
                        phase.name()
                    );
                    return self.fail(run, report, &log, reason).await;
                }
            }
        }

        for uuid in report.removed_channels() {
            log.warn(format!("channel {uuid} was inactive on the source and was not migrated"));
        }
        for uuid in report.skipped_flows() {
            log.warn(format!("flow {uuid} was not migrated"));
        }
        log.info(format!(
            "migration finished, {} records created",
            report.created_total()
        ));

        report.finish(MigrationStatus::Complete);
        self.runs.mark(run.id, MigrationStatus::Complete).await?;
        Ok(report)
    }

    async fn fail(
        &self,
        run: &MigrationRun,
        mut report: RunReport,
        log: &RunLog,
        reason: String,
    ) -> Result<RunReport> {
        log.error(&reason);
        report.error = Some(reason);
        report.finish(MigrationStatus::Failed);
        self.runs.mark(run.id, MigrationStatus::Failed).await?;
        Ok(report)
    }

    /// Drop the run family's ledger so the next run starts clean. The
    /// organization anchor mapping survives.
    pub async fn reset(&self, run: &MigrationRun) -> Result<()> {
        self.identity.clear(run.family()).await
    }
}

/// Everything a phase gets to work with.
pub struct PhaseContext<'a> {
    pub run: &'a MigrationRun,
    /// Source org row, pre-fetched by the engine.
    pub org: &'a OrgRow,
    pub source: &'a dyn SourceReader,
    pub identity: &'a dyn IdentityStore,
    pub warehouse: &'a dyn Warehouse,
    pub media: &'a dyn MediaStore,
    pub source_collections: Option<Arc<dyn CollectionStore>>,
    pub dest_collections: Option<Arc<dyn CollectionStore>>,
    pub notifier: Arc<dyn Notifier>,
    pub log: &'a RunLog,
    pub options: &'a EngineOptions,
}

impl PhaseContext<'_> {
    pub fn family(&self) -> Uuid {
        self.run.family()
    }

    pub fn window(&self) -> SourceWindow {
        self.run.window()
    }

    pub fn source_org(&self) -> i64 {
        self.run.source_org_id
    }

    pub fn dest_org(&self) -> i64 {
        self.run.org_id
    }

    /// Destination id recorded for a source record, if the ledger has one
    /// and the destination row still exists.
    pub async fn resolve(&self, entity: EntityType, old_id: i64) -> Result<Option<i64>> {
        let Some(new_id) = self.identity.resolve(self.family(), entity, old_id).await? else {
            return Ok(None);
        };
        if self.warehouse.exists(entity, self.dest_org(), new_id).await? {
            Ok(Some(new_id))
        } else {
            Ok(None)
        }
    }

    /// Resolve an optional source reference, mapping absent and unmapped to
    /// `None` alike.
    pub async fn resolve_opt(
        &self,
        entity: EntityType,
        old_id: Option<i64>,
    ) -> Result<Option<i64>> {
        match old_id {
            Some(old_id) => self.resolve(entity, old_id).await,
            None => Ok(None),
        }
    }

    pub async fn record(&self, entity: EntityType, old_id: i64, new_id: i64) -> Result<()> {
        self.identity
            .record(self.family(), entity, old_id, new_id)
            .await
    }
}
