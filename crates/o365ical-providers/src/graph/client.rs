//! Microsoft Graph API client.
//!
//! This module provides a low-level HTTP client for the Graph endpoints the
//! feed needs: the calendar view (paginated), attachment listing and
//! download, and the signed-in user's profile.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use o365ical_core::TimeWindow;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

use crate::auth::AccessTokenSource;
use crate::config::GraphConfig;
use crate::error::{ProviderError, ProviderResult, Service};

use super::model::{GraphAttachment, GraphEvent, Page, UserProfile};

/// Graph API client bound to one user's token source.
#[derive(Clone)]
pub struct GraphClient {
    http_client: reqwest::Client,
    base_url: String,
    page_size: usize,
    tokens: Arc<dyn AccessTokenSource>,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl GraphClient {
    /// Creates a new client.
    pub fn new(config: &GraphConfig, tokens: Arc<dyn AccessTokenSource>) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self::with_http_client(http_client, config, tokens))
    }

    /// Creates a client sharing an existing `reqwest` connection pool.
    pub fn with_http_client(
        http_client: reqwest::Client,
        config: &GraphConfig,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            tokens,
        }
    }

    /// Lists every event in `window`, following `@odata.nextLink` until the
    /// result set is exhausted.
    ///
    /// Recurring series come back expanded into instances. Any failing page
    /// fails the whole call.
    pub async fn calendar_view(&self, window: &TimeWindow) -> ProviderResult<Vec<GraphEvent>> {
        let url = Url::parse_with_params(
            &format!("{}/me/calendarview", self.base_url),
            &[
                ("startdatetime", window.start_param()),
                ("enddatetime", window.end_param()),
                ("$top", self.page_size.to_string()),
                ("$skip", "0".to_string()),
            ],
        )
        .map_err(|e| ProviderError::configuration(format!("invalid Graph base URL: {}", e)))?;

        let started = Instant::now();
        let events = self.fetch_all_pages(url.as_str()).await?;
        debug!(
            count = events.len(),
            start = %window.start_param(),
            end = %window.end_param(),
            duration_ms = started.elapsed().as_millis() as u64,
            "fetched calendar view"
        );
        Ok(events)
    }

    /// Fetches a collection starting at `first_url` and concatenates every page
    /// in order.
    pub async fn fetch_all_pages<T: DeserializeOwned>(
        &self,
        first_url: &str,
    ) -> ProviderResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first_url.to_string());
        let mut pages = 0usize;

        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            pages += 1;
            items.extend(page.value);
            next = page.next_link;
        }

        debug!(pages, items = items.len(), "collection exhausted");
        Ok(items)
    }

    /// Lists the attachment metadata of an event.
    pub async fn attachments(&self, event_id: &str) -> ProviderResult<Vec<GraphAttachment>> {
        let url = format!(
            "{}/me/events/{}/attachments?$select=id,name,contentType,size,isInline",
            self.base_url,
            urlencoding::encode(event_id)
        );
        self.fetch_all_pages(&url).await
    }

    /// Streams the raw bytes of an attachment to `dest`.
    ///
    /// Bytes land in a `.part` file first and are renamed into place once the
    /// body is complete, so readers never see a truncated file. Returns the
    /// number of bytes written.
    pub async fn download_attachment(
        &self,
        event_id: &str,
        attachment_id: &str,
        dest: &Path,
    ) -> ProviderResult<u64> {
        let url = format!(
            "{}/me/events/{}/attachments/{}/$value",
            self.base_url,
            urlencoding::encode(event_id),
            urlencoding::encode(attachment_id)
        );
        let mut response = self.get(&url).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ProviderError::io(format!("failed to create {}", parent.display())).with_source(e)
            })?;
        }

        let mut partial = dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = std::path::PathBuf::from(partial);

        let mut file = tokio::fs::File::create(&partial).await.map_err(|e| {
            ProviderError::io(format!("failed to create {}", partial.display())).with_source(e)
        })?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(ProviderError::from_transport)?
        {
            file.write_all(&chunk).await.map_err(|e| {
                ProviderError::io(format!("failed to write {}", partial.display())).with_source(e)
            })?;
            written += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| ProviderError::io("failed to flush attachment").with_source(e))?;
        drop(file);

        tokio::fs::rename(&partial, dest).await.map_err(|e| {
            ProviderError::io(format!("failed to move attachment to {}", dest.display()))
                .with_source(e)
        })?;

        debug!(bytes = written, path = %dest.display(), "attachment downloaded");
        Ok(written)
    }

    /// Fetches the signed-in user's profile.
    pub async fn me(&self) -> ProviderResult<UserProfile> {
        let url = format!("{}/me", self.base_url);
        self.get_json(&url).await
    }

    /// Performs an authenticated GET and decodes the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ProviderResult<T> {
        let response = self.get(url).await?;

        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e)).with_source(e)
        })?;

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
                .with_service(Service::Graph)
                .with_source(e)
        })
    }

    /// Performs an authenticated GET and checks the status.
    async fn get(&self, url: &str) -> ProviderResult<reqwest::Response> {
        let token = self.tokens.access_token().await?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), url = %url, "Graph request failed");
            return Err(ProviderError::from_status(status, &body).with_service(Service::Graph));
        }

        Ok(response)
    }
}
