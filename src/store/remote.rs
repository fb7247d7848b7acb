use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AppError;

/// A shared document store reached over the network
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Whether an endpoint is configured at all
    fn is_configured(&self) -> bool;

    /// Reads every document. `None` means the fetch failed, which is never
    /// the same as an empty store.
    async fn fetch_all(&self) -> Option<serde_json::Map<String, serde_json::Value>>;

    async fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), AppError>;
}

#[derive(Serialize)]
struct WriteBody<'a> {
    key: &'a str,
    value: &'a serde_json::Value,
}

/// Web-app endpoint in front of a spreadsheet. GET returns every document as
/// one JSON object; POST stores a single `{key, value}` pair.
pub struct SheetEndpoint {
    url: Option<Url>,
    client: Client,
}

impl SheetEndpoint {
    /// Only https URLs count as configured; anything else leaves the
    /// application local-only.
    pub fn new(url: Option<&str>, timeout: Duration) -> Result<Self, AppError> {
        let url = match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(raw) => match Url::parse(raw) {
                Ok(parsed) if parsed.scheme() == "https" => Some(parsed),
                Ok(_) => {
                    warn!(url = raw, "Remote endpoint is not https, running local-only");
                    None
                }
                Err(e) => {
                    warn!(url = raw, error = %e, "Remote endpoint URL is invalid, running local-only");
                    None
                }
            },
            None => None,
        };
        let client = Client::builder().timeout(timeout).build()?;
        Ok(SheetEndpoint { url, client })
    }
}

/// Error pages from the hosting service come back with a success status
fn looks_like_html(body: &str) -> bool {
    let head: String = body.trim_start().chars().take(15).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

pub(crate) fn parse_snapshot(body: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    if looks_like_html(body) {
        warn!("Remote endpoint answered with an HTML page");
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!("Remote endpoint answered with something other than an object");
            None
        }
        Err(e) => {
            warn!(error = %e, "Remote endpoint answered with invalid JSON");
            None
        }
    }
}

#[async_trait]
impl RemoteStore for SheetEndpoint {
    fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    async fn fetch_all(&self) -> Option<serde_json::Map<String, serde_json::Value>> {
        let url = self.url.as_ref()?;
        let stamp = chrono::Utc::now().timestamp_millis().to_string();

        let response = match self.client.get(url.clone()).query(&[("t", stamp)]).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Remote fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "Remote fetch returned an error status");
            return None;
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Could not read remote response");
                return None;
            }
        };
        let snapshot = parse_snapshot(&body)?;
        debug!(documents = snapshot.len(), "Fetched remote snapshot");
        Some(snapshot)
    }

    async fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), AppError> {
        let Some(url) = self.url.as_ref() else {
            return Ok(());
        };
        // plain text body keeps the hosting service from demanding a preflight
        let body = serde_json::to_string(&WriteBody { key, value })?;
        let response = self
            .client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Remote write of {} returned {}",
                key,
                response.status()
            )));
        }
        debug!(key, "Wrote document remotely");
        Ok(())
    }
}
