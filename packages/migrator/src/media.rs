//! Attachment, logo and flow-image re-hosting.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart;
use serde::Deserialize;
use tracing::warn;

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Fetch the media behind `url` and store it on the destination,
    /// returning the new public URL.
    async fn import(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Downloads the source bytes and posts them to the destination upload
/// endpoint as a multipart form.
pub struct HttpMediaStore {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpMediaStore {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build media client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn import(&self, url: &str) -> Result<String> {
        let source = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch media from {url}"))?;
        let status = source.status();
        if !status.is_success() {
            bail!("media fetch from {url} returned status {status}");
        }
        let bytes = source.bytes().await?;

        let part = multipart::Part::bytes(bytes.to_vec()).file_name(file_name(url));
        let form = multipart::Form::new().part("file", part);
        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Token {token}"));
        }

        let response = request.send().await.context("media upload failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("media upload returned status {status}");
        }
        let uploaded: UploadResponse = response
            .json()
            .await
            .context("media upload response was not JSON")?;
        Ok(uploaded.url)
    }
}

/// Store used when re-hosting is disabled or unconfigured; source URLs pass
/// through untouched.
pub struct NoopMediaStore;

#[async_trait]
impl MediaStore for NoopMediaStore {
    async fn import(&self, url: &str) -> Result<String> {
        warn!(url, "media re-hosting disabled, keeping source url");
        Ok(url.to_string())
    }
}

fn file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or("upload.bin")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_takes_last_path_segment() {
        assert_eq!(
            file_name("https://cdn.example.org/media/photos/pic.jpg"),
            "pic.jpg"
        );
        assert_eq!(
            file_name("https://cdn.example.org/media/pic.jpg?Expires=123&sig=abc"),
            "pic.jpg"
        );
    }

    #[test]
    fn file_name_falls_back_when_url_has_no_path() {
        assert_eq!(file_name("https://cdn.example.org/"), "upload.bin");
    }

    #[tokio::test]
    async fn noop_store_returns_input() {
        let store = NoopMediaStore;
        let url = "https://legacy.example.org/media/a.pdf";
        assert_eq!(store.import(url).await.unwrap(), url);
    }
}
