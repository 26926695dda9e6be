//! HTTP client for the Immich API.
//!
//! All requests go through the retry state machine in [`retry`]; the API key
//! is attached as-is to every request and never inspected or stored anywhere
//! else.

pub mod retry;

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::calendar::window::SearchWindow;
use crate::config::{RetryConfig, SearchConfig};
use crate::error::RequestError;
use self::retry::Backoff;

/// Timestamp format the search endpoint expects; calendar-naive, no offset.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Reference to a remote asset: identifier and capture timestamp. The server
/// stays the owner of the asset itself.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetRef {
    pub id: String,
    #[serde(rename = "fileCreatedAt")]
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSummary {
    pub id: String,
    pub album_name: String,
}

/// Per-asset results of one bulk add call, folded into counts.
#[derive(Debug, Clone, Default)]
pub struct AddReport {
    pub added: usize,
    pub duplicates: usize,
    pub failures: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetadataSearchRequest {
    taken_after: String,
    taken_before: String,
    size: u32,
    page: u32,
    with_deleted: bool,
}

#[derive(Debug, Deserialize)]
struct MetadataSearchResponse {
    assets: AssetPage,
}

#[derive(Debug, Deserialize)]
struct AssetPage {
    items: Vec<AssetRef>,
}

#[derive(Debug, Deserialize)]
struct AlbumDetail {
    assets: Vec<AlbumAsset>,
}

#[derive(Debug, Deserialize)]
struct AlbumAsset {
    id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAlbumRequest<'a> {
    album_name: &'a str,
    asset_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AddAssetsRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BulkIdResult {
    id: String,
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Accepts either a full API endpoint or a bare server URL; a bare
/// `https://host` gets the standard `/api` path appended.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if let Ok(parsed) = Url::parse(trimmed) {
        if matches!(parsed.scheme(), "http" | "https")
            && parsed.host_str().is_some()
            && parsed.path().trim_end_matches('/').is_empty()
        {
            return format!("{trimmed}/api");
        }
    }
    trimmed.to_string()
}

pub struct ImmichClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    page_size: u32,
    retry: RetryConfig,
}

impl ImmichClient {
    pub fn new(base_url: &str, api_key: &str, search: &SearchConfig, retry: &RetryConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(search.timeout_secs))
            .build();

        Self {
            agent,
            base_url: normalize_base_url(base_url),
            api_key: api_key.to_string(),
            page_size: search.page_size,
            retry: retry.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lazily yields assets captured inside `window`, fetching pages on
    /// demand. Ids already seen in this window are dropped, guarding against
    /// server-side pagination drift. Restartable: call again for a fresh
    /// pass over the same window.
    pub fn search(&self, window: &SearchWindow) -> AssetSearch<'_> {
        AssetSearch {
            client: self,
            taken_after: window.start.format(TS_FORMAT).to_string(),
            taken_before: window.end.format(TS_FORMAT).to_string(),
            page: 1,
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            done: false,
        }
    }

    pub fn list_albums(&self) -> Result<Vec<AlbumSummary>, RequestError> {
        let url = format!("{}/albums", self.base_url);
        self.execute("list albums", || self.get(&url).call())
    }

    /// Current membership of one album, as a set of asset ids.
    pub fn album_asset_ids(&self, album_id: &str) -> Result<HashSet<String>, RequestError> {
        let url = format!("{}/albums/{}", self.base_url, album_id);
        let detail: AlbumDetail = self.execute("fetch album", || self.get(&url).call())?;
        Ok(detail.assets.into_iter().map(|a| a.id).collect())
    }

    pub fn create_album(&self, name: &str) -> Result<AlbumSummary, RequestError> {
        let url = format!("{}/albums", self.base_url);
        let request = CreateAlbumRequest { album_name: name, asset_ids: Vec::new() };
        tracing::info!(album = name, "creating album");
        self.execute("create album", || self.post(&url).send_json(&request))
    }

    /// Adds assets to an album. Safe to repeat: the server reports an
    /// existing member as `duplicate` rather than double-adding it.
    pub fn add_assets(&self, album_id: &str, ids: &[String]) -> Result<AddReport, RequestError> {
        if ids.is_empty() {
            return Ok(AddReport::default());
        }

        let url = format!("{}/albums/{}/assets", self.base_url, album_id);
        let request = AddAssetsRequest { ids };
        let results: Vec<BulkIdResult> =
            self.execute("add assets", || self.put(&url).send_json(&request))?;

        let mut report = AddReport::default();
        for result in results {
            if result.success {
                report.added += 1;
            } else if result.error.as_deref() == Some("duplicate") {
                report.duplicates += 1;
            } else {
                let reason = result.error.unwrap_or_else(|| "unknown".to_string());
                report.failures.push(format!("{}: {}", result.id, reason));
            }
        }
        Ok(report)
    }

    fn get(&self, url: &str) -> ureq::Request {
        self.agent
            .get(url)
            .set("x-api-key", &self.api_key)
            .set("Accept", "application/json")
    }

    fn post(&self, url: &str) -> ureq::Request {
        self.agent
            .post(url)
            .set("x-api-key", &self.api_key)
            .set("Accept", "application/json")
    }

    fn put(&self, url: &str) -> ureq::Request {
        self.agent
            .put(url)
            .set("x-api-key", &self.api_key)
            .set("Accept", "application/json")
    }

    /// Runs one logical request through the retry state machine and decodes
    /// the response. Sleeps between attempts; never retries auth rejections
    /// or other non-transient statuses.
    fn execute<T, F>(&self, operation: &'static str, send: F) -> Result<T, RequestError>
    where
        T: serde::de::DeserializeOwned,
        F: Fn() -> Result<ureq::Response, ureq::Error>,
    {
        let mut backoff = Backoff::new(&self.retry);
        loop {
            let err = match send() {
                Ok(response) => {
                    return response
                        .into_json()
                        .map_err(|e| RequestError::Decode(e.to_string()));
                }
                Err(e) => classify(e),
            };

            if !err.is_retriable() {
                return Err(err);
            }

            match backoff.next_delay() {
                Some(delay) => {
                    tracing::warn!(
                        operation,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying"
                    );
                    std::thread::sleep(delay);
                }
                None => {
                    return Err(RequestError::RetriesExhausted {
                        attempts: backoff.attempts(),
                        last: Box::new(err),
                    });
                }
            }
        }
    }
}

fn classify(err: ureq::Error) -> RequestError {
    match err {
        ureq::Error::Status(status @ (401 | 403), _) => RequestError::Unauthorized { status },
        ureq::Error::Status(status, response) => {
            let body: String = response
                .into_string()
                .unwrap_or_default()
                .trim()
                .chars()
                .take(200)
                .collect();
            RequestError::Status { status, body }
        }
        ureq::Error::Transport(transport) => RequestError::Transport(transport.to_string()),
    }
}

/// Lazy, paginated asset stream for one search window.
pub struct AssetSearch<'a> {
    client: &'a ImmichClient,
    taken_after: String,
    taken_before: String,
    page: u32,
    buffer: VecDeque<AssetRef>,
    seen: HashSet<String>,
    done: bool,
}

impl AssetSearch<'_> {
    fn fetch_page(&mut self) -> Result<(), RequestError> {
        let client = self.client;
        let url = format!("{}/search/metadata", client.base_url);
        let request = MetadataSearchRequest {
            taken_after: self.taken_after.clone(),
            taken_before: self.taken_before.clone(),
            size: client.page_size,
            page: self.page,
            with_deleted: false,
        };

        tracing::debug!(page = self.page, after = %self.taken_after, before = %self.taken_before, "searching assets");
        let response: MetadataSearchResponse =
            client.execute("search assets", || client.post(&url).send_json(&request))?;

        let items = response.assets.items;
        // The store signals the end with an empty or short page.
        if (items.len() as u32) < client.page_size {
            self.done = true;
        }
        self.page += 1;

        for asset in items {
            if self.seen.insert(asset.id.clone()) {
                self.buffer.push_back(asset);
            }
        }
        Ok(())
    }
}

impl Iterator for AssetSearch<'_> {
    type Item = Result<AssetRef, RequestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(asset) = self.buffer.pop_front() {
                return Some(Ok(asset));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
