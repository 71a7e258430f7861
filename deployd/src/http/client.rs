//! HTTP client implementation

use std::time::Duration;

use ::http::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::errors::PlatformError;

/// JSON-over-HTTP client rooted at a base URL
pub struct HttpClient {
    client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, PlatformError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PlatformError::ConfigError(format!("invalid base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(PlatformError::ConfigError(format!(
                "invalid base URL {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a URL by appending percent-encoded path segments to the base
    pub fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Make a GET request and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, PlatformError> {
        let url = self.url_for(segments);
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, concat!("deployd/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP GET {} failed: {} - {}", url, status, body);
            return Err(PlatformError::ServerError(format!("{}: {}", status, body)));
        }

        let body = response.json().await?;
        Ok(body)
    }
}
