use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Settings for one Parse-style collection server.
#[derive(Debug, Clone)]
pub struct ParseServerConfig {
    pub server_url: String,
    pub app_id: String,
    pub master_key: String,
    /// Prefix used when composing collection class names.
    pub server_name: String,
}

/// Engine configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Destination database; the engine-owned run/association tables live here.
    pub database_url: String,
    /// Legacy database, opened read-only.
    pub source_database_url: String,
    /// Directory receiving the per-run log artifacts.
    pub log_dir: String,
    /// Public base URL of the legacy deployment, for resolving relative media paths.
    pub source_media_url: String,
    /// When false, attachments and images keep their source URLs untouched.
    pub rehost_media: bool,
    /// Upload endpoint on the destination for re-hosted media.
    pub media_upload_url: Option<String>,
    pub media_upload_token: Option<String>,
    /// Throughput assigned to newly created channels.
    pub default_channel_tps: i32,
    /// Definition version current flows are upgraded to.
    pub flow_spec_version: String,
    /// Destination engine endpoint migrating legacy flow definitions; when
    /// unset, raw definitions are stored as-is.
    pub flow_upgrade_url: Option<String>,
    pub source_parse: Option<ParseServerConfig>,
    pub dest_parse: Option<ParseServerConfig>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            source_database_url: env::var("SOURCE_DATABASE_URL")
                .context("SOURCE_DATABASE_URL must be set")?,
            log_dir: env::var("MIGRATION_LOG_DIR")
                .unwrap_or_else(|_| "migration_logs".to_string()),
            source_media_url: env::var("SOURCE_MEDIA_URL").unwrap_or_default(),
            rehost_media: env::var("REHOST_MEDIA")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
            media_upload_url: env::var("MEDIA_UPLOAD_URL").ok(),
            media_upload_token: env::var("MEDIA_UPLOAD_TOKEN").ok(),
            default_channel_tps: env::var("DEFAULT_CHANNEL_TPS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("DEFAULT_CHANNEL_TPS must be a valid number")?,
            flow_spec_version: env::var("FLOW_SPEC_VERSION")
                .unwrap_or_else(|_| "13.1.0".to_string()),
            flow_upgrade_url: env::var("FLOW_UPGRADE_URL").ok(),
            source_parse: Self::parse_server("SOURCE_PARSE")?,
            dest_parse: Self::parse_server("DEST_PARSE")?,
        })
    }

    /// Read one Parse server block; absent entirely when the URL is unset.
    fn parse_server(prefix: &str) -> Result<Option<ParseServerConfig>> {
        let Ok(server_url) = env::var(format!("{prefix}_URL")) else {
            return Ok(None);
        };

        Ok(Some(ParseServerConfig {
            server_url,
            app_id: env::var(format!("{prefix}_APP_ID"))
                .with_context(|| format!("{prefix}_APP_ID must be set"))?,
            master_key: env::var(format!("{prefix}_MASTER_KEY"))
                .with_context(|| format!("{prefix}_MASTER_KEY must be set"))?,
            server_name: env::var(format!("{prefix}_SERVER_NAME"))
                .with_context(|| format!("{prefix}_SERVER_NAME must be set"))?,
        }))
    }
}
