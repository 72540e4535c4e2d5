pub mod models;

use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::models::{BatchRequest, BatchResult, ClassSchema, ObjectsPage, SchemaUpdate};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid server url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Connection settings for one Parse server.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub server_url: String,
    pub app_id: String,
    pub master_key: String,
}

/// REST client for a Parse-style server, authenticated with the master key.
///
/// Covers the subset of the API needed to mirror collections between two
/// servers: schema reads and writes, class purging, counted/paged object
/// reads and batched object creation.
#[derive(Debug, Clone)]
pub struct ParseClient {
    base: Url,
    app_id: String,
    master_key: String,
    client: reqwest::Client,
}

impl ParseClient {
    pub fn new(options: ParseOptions) -> Result<Self, ParseError> {
        let base = Url::parse(options.server_url.trim_end_matches('/')).map_err(|e| {
            ParseError::InvalidUrl {
                url: options.server_url.clone(),
                message: e.to_string(),
            }
        })?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base,
            app_id: options.app_id,
            master_key: options.master_key,
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ParseError> {
        let url = self
            .base
            .join(&format!("{}/{}", self.base.path().trim_end_matches('/'), path))
            .map_err(|e| ParseError::InvalidUrl {
                url: format!("{}/{}", self.base, path),
                message: e.to_string(),
            })?;

        Ok(self
            .client
            .request(method, url)
            .header("X-Parse-Application-Id", &self.app_id)
            .header("X-Parse-Master-Key", &self.master_key))
    }

    /// Path of a class relative to the server mount, as batch requests expect.
    fn class_path(&self, class_name: &str) -> String {
        format!(
            "{}/classes/{}",
            self.base.path().trim_end_matches('/'),
            class_name
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ParseError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ParseError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Fetch a class schema; `None` when the class does not exist.
    pub async fn get_schema(&self, class_name: &str) -> Result<Option<ClassSchema>, ParseError> {
        let response = self
            .request(Method::GET, &format!("schemas/{class_name}"))?
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        Ok(Some(response.json::<ClassSchema>().await?))
    }

    pub async fn create_schema(&self, update: &SchemaUpdate) -> Result<ClassSchema, ParseError> {
        let response = self
            .request(Method::POST, &format!("schemas/{}", update.class_name))?
            .json(update)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<ClassSchema>().await?)
    }

    pub async fn update_schema(&self, update: &SchemaUpdate) -> Result<ClassSchema, ParseError> {
        let response = self
            .request(Method::PUT, &format!("schemas/{}", update.class_name))?
            .json(update)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<ClassSchema>().await?)
    }

    /// Delete every object in a class. Returns `false` when the class was
    /// already absent (404), which callers treat the same as an empty purge.
    pub async fn purge(&self, class_name: &str) -> Result<bool, ParseError> {
        let response = self
            .request(Method::DELETE, &format!("purge/{class_name}"))?
            .json(&json!({}))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::check(response).await?;
        Ok(true)
    }

    pub async fn count(&self, class_name: &str) -> Result<i64, ParseError> {
        let response = self
            .request(Method::GET, &format!("classes/{class_name}"))?
            .query(&[("count", "1"), ("limit", "0")])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let page = response.json::<ObjectsPage>().await?;
        Ok(page.count.unwrap_or(0))
    }

    /// Fetch one page of objects, ordered by the given key.
    pub async fn objects(
        &self,
        class_name: &str,
        order: &str,
        limit: i64,
        skip: i64,
    ) -> Result<Vec<Map<String, Value>>, ParseError> {
        let response = self
            .request(Method::GET, &format!("classes/{class_name}"))?
            .query(&[
                ("order", order.to_string()),
                ("limit", limit.to_string()),
                ("skip", skip.to_string()),
            ])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let page = response.json::<ObjectsPage>().await?;
        Ok(page.results)
    }

    /// Create objects through the batch endpoint, one sub-request per object.
    pub async fn create_objects(
        &self,
        class_name: &str,
        objects: Vec<Value>,
    ) -> Result<Vec<BatchResult>, ParseError> {
        let requests: Vec<BatchRequest> = objects
            .into_iter()
            .map(|body| BatchRequest {
                method: "POST".to_string(),
                path: self.class_path(class_name),
                body,
            })
            .collect();

        let response = self
            .request(Method::POST, "batch")?
            .json(&json!({ "requests": requests }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<Vec<BatchResult>>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ParseClient {
        ParseClient::new(ParseOptions {
            server_url: "http://collections.example.com/parse/".to_string(),
            app_id: "app".to_string(),
            master_key: "key".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn class_path_includes_server_mount() {
        assert_eq!(client().class_path("GiftCards"), "/parse/classes/GiftCards");
    }

    #[test]
    fn rejects_invalid_url() {
        let result = ParseClient::new(ParseOptions {
            server_url: "not a url".to_string(),
            app_id: "app".to_string(),
            master_key: "key".to_string(),
        });
        assert!(matches!(result, Err(ParseError::InvalidUrl { .. })));
    }

    #[test]
    fn schema_update_wire_shape() {
        let update = SchemaUpdate::new("Lookups")
            .with_field("order", "Number")
            .without_field("stale");
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["className"], "Lookups");
        assert_eq!(value["fields"]["order"]["type"], "Number");
        assert_eq!(value["fields"]["stale"]["__op"], "Delete");
    }
}
