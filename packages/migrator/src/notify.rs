//! Operator notifications for work that finishes out-of-band.

use async_trait::async_trait;
use tracing::{error, info};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Called when a collection import finishes, successfully or not.
    async fn collection_imported(&self, org: i64, collection: &str, ok: bool, detail: &str);
}

/// Notifier that only writes the structured log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn collection_imported(&self, org: i64, collection: &str, ok: bool, detail: &str) {
        if ok {
            info!(org, collection, detail, "collection import finished");
        } else {
            error!(org, collection, detail, "collection import failed");
        }
    }
}
