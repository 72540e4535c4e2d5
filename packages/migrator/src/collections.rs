//! Parse-style auxiliary collection sync.
//!
//! Orgs keep gift-card and lookup collections on a Parse-compatible document
//! server beside the relational database. Each collection lives in a class
//! whose name embeds the server, org and collection. Syncing reads the source
//! class into a header row plus data rows shaped like an import file, resets
//! the destination class, and replays the rows into it on a detached task so
//! the relational phases never wait on the document server.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use parse::models::{ClassSchema, SchemaUpdate};
use parse::ParseClient;
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tracing::error;

use crate::notify::Notifier;

/// Objects per batch request when replaying rows into the destination.
const IMPORT_BATCH_SIZE: usize = 50;

/// Parse's wire format for Date object `iso` values.
const PARSE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const DAY_FIRST_FORMAT: &str = "%d-%m-%Y %H:%M:%S";
const MONTH_FIRST_FORMAT: &str = "%m-%d-%Y %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    GiftCard,
    Lookup,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GiftCard => "giftcards",
            Self::Lookup => "lookups",
        }
    }
}

/// Class name for one collection:
/// `{server}_{org_slug}_{org_id}_{kind}_{collection_slug}`, with dashes
/// stripped afterwards so the name stays a valid Parse class identifier.
pub fn collection_class_name(
    server: &str,
    org_slug: &str,
    org_id: i64,
    kind: CollectionKind,
    collection: &str,
) -> String {
    format!(
        "{}_{}_{}_{}_{}",
        server,
        org_slug,
        org_id,
        kind.as_str(),
        slug::slugify(collection)
    )
    .replace('-', "")
}

/// Document-server access used by the collection sync, one per server.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn schema(&self, class: &str) -> Result<Option<ClassSchema>>;
    async fn count(&self, class: &str) -> Result<i64>;
    /// One page of objects ordered by the `order` field.
    async fn rows(&self, class: &str, limit: i64, skip: i64)
        -> Result<Vec<Map<String, Value>>>;
    /// Delete all objects of the class; false when the class does not exist.
    async fn purge(&self, class: &str) -> Result<bool>;
    async fn create_schema(&self, update: &SchemaUpdate) -> Result<()>;
    async fn update_schema(&self, update: &SchemaUpdate) -> Result<()>;
    async fn insert_rows(&self, class: &str, rows: Vec<Value>) -> Result<()>;
}

pub struct ParseCollectionStore {
    client: ParseClient,
}

impl ParseCollectionStore {
    pub fn new(client: ParseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CollectionStore for ParseCollectionStore {
    async fn schema(&self, class: &str) -> Result<Option<ClassSchema>> {
        Ok(self.client.get_schema(class).await?)
    }

    async fn count(&self, class: &str) -> Result<i64> {
        Ok(self.client.count(class).await?)
    }

    async fn rows(
        &self,
        class: &str,
        limit: i64,
        skip: i64,
    ) -> Result<Vec<Map<String, Value>>> {
        Ok(self.client.objects(class, "order", limit, skip).await?)
    }

    async fn purge(&self, class: &str) -> Result<bool> {
        Ok(self.client.purge(class).await?)
    }

    async fn create_schema(&self, update: &SchemaUpdate) -> Result<()> {
        self.client.create_schema(update).await?;
        Ok(())
    }

    async fn update_schema(&self, update: &SchemaUpdate) -> Result<()> {
        self.client.update_schema(update).await?;
        Ok(())
    }

    async fn insert_rows(&self, class: &str, rows: Vec<Value>) -> Result<()> {
        let total = rows.len();
        let results = self.client.create_objects(class, rows).await?;
        let failures = results.iter().filter(|r| r.error.is_some()).count();
        if failures > 0 {
            bail!("{failures} of {total} rows failed to insert into {class}");
        }
        Ok(())
    }
}

/// Fields Parse manages itself; never exported, imported or deleted.
pub fn is_system_field(name: &str) -> bool {
    matches!(name, "objectId" | "createdAt" | "updatedAt" | "ACL")
}

/// User fields of a class as `(name, type)`, in stable name order.
pub fn data_fields(schema: &ClassSchema) -> Vec<(String, String)> {
    schema
        .fields
        .iter()
        .filter(|(name, _)| !is_system_field(name))
        .map(|(name, field)| (name.clone(), field.field_type.clone()))
        .collect()
}

/// Header cell for a field; typed fields carry their type as a name prefix so
/// the import side can rebuild the schema from headers alone.
pub fn header_for(name: &str, field_type: &str) -> String {
    match field_type {
        "Date" => format!("date_{name}"),
        "Number" => format!("numeric_{name}"),
        _ => name.to_string(),
    }
}

/// Inverse of [`header_for`].
pub fn field_for_header(header: &str) -> (&str, &'static str) {
    if let Some(name) = header.strip_prefix("date_") {
        (name, "Date")
    } else if let Some(name) = header.strip_prefix("numeric_") {
        (name, "Number")
    } else {
        (header, "String")
    }
}

/// One exported cell. Parse Date objects become display strings in the org's
/// date order; everything else passes through.
pub fn format_cell(value: Option<&Value>, day_first: bool) -> Value {
    let Some(value) = value else {
        return Value::Null;
    };
    if let Some(iso) = value
        .as_object()
        .filter(|o| o.get("__type").and_then(Value::as_str) == Some("Date"))
        .and_then(|o| o.get("iso"))
        .and_then(Value::as_str)
    {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(iso) {
            let format = if day_first {
                DAY_FIRST_FORMAT
            } else {
                MONTH_FIRST_FORMAT
            };
            return Value::String(parsed.naive_utc().format(format).to_string());
        }
    }
    value.clone()
}

/// Inverse of [`format_cell`] for Date columns; non-dates pass through.
fn import_cell(cell: &Value, field_type: &str, day_first: bool) -> Value {
    if field_type != "Date" {
        return cell.clone();
    }
    let Some(text) = cell.as_str() else {
        return cell.clone();
    };
    let format = if day_first {
        DAY_FIRST_FORMAT
    } else {
        MONTH_FIRST_FORMAT
    };
    match NaiveDateTime::parse_from_str(text, format) {
        Ok(parsed) => json!({
            "__type": "Date",
            "iso": parsed.and_utc().format(PARSE_DATE_FORMAT).to_string(),
        }),
        Err(_) => cell.clone(),
    }
}

/// The gift-card class always gets the same shape: the code column plus the
/// import ordering column, indexed by code for redemption lookups.
pub fn gift_card_schema(class: &str) -> SchemaUpdate {
    SchemaUpdate::new(class)
        .with_field("code", "String")
        .with_field("order", "Number")
        .with_indexes(json!({ "code_index": { "code": 1 } }))
}

/// An export handed to the import task: headers plus matching row cells.
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub org: i64,
    pub collection: String,
    pub class_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub day_first: bool,
}

/// Replay an export into the destination class on a detached task. The run
/// does not wait for it; the notifier reports how it ended.
pub fn enqueue_import(
    store: Arc<dyn CollectionStore>,
    notifier: Arc<dyn Notifier>,
    job: ImportJob,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match run_import(store.as_ref(), &job).await {
            Ok(count) => {
                notifier
                    .collection_imported(
                        job.org,
                        &job.collection,
                        true,
                        &format!("imported {count} rows into {}", job.class_name),
                    )
                    .await;
            }
            Err(err) => {
                error!(
                    collection = %job.collection,
                    class = %job.class_name,
                    "collection import failed: {err:#}"
                );
                notifier
                    .collection_imported(job.org, &job.collection, false, &format!("{err:#}"))
                    .await;
            }
        }
    })
}

async fn run_import(store: &dyn CollectionStore, job: &ImportJob) -> Result<usize> {
    let mut update = SchemaUpdate::new(&job.class_name);
    for header in &job.headers {
        let (name, field_type) = field_for_header(header);
        update = update.with_field(name, field_type);
    }
    update = update.with_field("order", "Number");
    store.update_schema(&update).await?;

    let mut objects = Vec::with_capacity(job.rows.len());
    for (index, row) in job.rows.iter().enumerate() {
        let mut object = Map::new();
        for (header, cell) in job.headers.iter().zip(row) {
            let (name, field_type) = field_for_header(header);
            object.insert(
                name.to_string(),
                import_cell(cell, field_type, job.day_first),
            );
        }
        object.insert("order".to_string(), json!(index as i64 + 1));
        objects.push(Value::Object(object));
    }

    let total = objects.len();
    for batch in objects.chunks(IMPORT_BATCH_SIZE) {
        store.insert_rows(&job.class_name, batch.to_vec()).await?;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parse::models::FieldSchema;

    #[test]
    fn class_name_embeds_server_org_and_kind() {
        assert_eq!(
            collection_class_name("legacy", "acme-corp", 17, CollectionKind::Lookup, "Area Codes"),
            "legacy_acmecorp_17_lookups_areacodes"
        );
        assert_eq!(
            collection_class_name("prod", "acme", 3, CollectionKind::GiftCard, "Summer Promo"),
            "prod_acme_3_giftcards_summerpromo"
        );
    }

    #[test]
    fn headers_round_trip_through_prefixes() {
        assert_eq!(header_for("redeemed_on", "Date"), "date_redeemed_on");
        assert_eq!(header_for("points", "Number"), "numeric_points");
        assert_eq!(header_for("code", "String"), "code");

        assert_eq!(field_for_header("date_redeemed_on"), ("redeemed_on", "Date"));
        assert_eq!(field_for_header("numeric_points"), ("points", "Number"));
        assert_eq!(field_for_header("code"), ("code", "String"));
    }

    fn field(field_type: &str) -> FieldSchema {
        FieldSchema {
            field_type: field_type.to_string(),
            target_class: None,
            required: None,
            default_value: None,
        }
    }

    #[test]
    fn data_fields_skip_parse_internals() {
        let mut schema = ClassSchema {
            class_name: "x".to_string(),
            fields: Default::default(),
            indexes: None,
        };
        for name in ["objectId", "createdAt", "updatedAt", "ACL"] {
            schema.fields.insert(name.to_string(), field("String"));
        }
        schema.fields.insert("code".to_string(), field("String"));
        schema.fields.insert("expires".to_string(), field("Date"));

        assert_eq!(
            data_fields(&schema),
            vec![
                ("code".to_string(), "String".to_string()),
                ("expires".to_string(), "Date".to_string()),
            ]
        );
    }

    #[test]
    fn date_cells_round_trip_in_both_orders() {
        let date = json!({ "__type": "Date", "iso": "2019-07-04T16:30:00.000Z" });

        let day_first = format_cell(Some(&date), true);
        assert_eq!(day_first, json!("04-07-2019 16:30:00"));
        assert_eq!(import_cell(&day_first, "Date", true), date);

        let month_first = format_cell(Some(&date), false);
        assert_eq!(month_first, json!("07-04-2019 16:30:00"));
        assert_eq!(import_cell(&month_first, "Date", false), date);
    }

    #[test]
    fn non_date_cells_pass_through() {
        assert_eq!(format_cell(Some(&json!(42)), true), json!(42));
        assert_eq!(format_cell(None, true), Value::Null);
        assert_eq!(import_cell(&json!("ABC-123"), "String", true), json!("ABC-123"));
    }

    #[test]
    fn gift_card_schema_is_fixed() {
        let schema = gift_card_schema("prod_acme_3_giftcards_promo");
        assert_eq!(schema.fields["code"], json!({ "type": "String" }));
        assert_eq!(schema.fields["order"], json!({ "type": "Number" }));
        assert!(schema.indexes.is_some());
    }
}
