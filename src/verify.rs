//! HTTP verification against a deployed site
//!
//! `SiteClient` is bound to one site's base address for the lifetime of a
//! verification step. Status is always checked before content.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::Url;

use crate::common::{Error, Result};

/// Default request timeout when the caller does not configure one
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Short-lived HTTP client scoped to a deployed site
#[derive(Debug, Clone)]
pub struct SiteClient {
    http: reqwest::Client,
    base_url: Url,
}

/// A fully-read response from the site
#[derive(Debug, Clone)]
pub struct SiteResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl SiteClient {
    /// Create a client for `base_url` with the default timeout
    pub fn new(base_url: Url) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client for `base_url` with a request timeout
    pub fn with_timeout(base_url: Url, timeout: Duration) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(base_url.to_string()));
        }
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("webapp-smoke/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout);
        if is_loopback(&base_url) {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;
        Ok(Self { http, base_url })
    }

    /// Base address requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET `path` relative to the base address and read the body
    pub async fn get(&self, path: &str) -> Result<SiteResponse> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| Error::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))?;

        tracing::info!(url = %url, "GET");
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(url = %url, status, bytes = body.len(), "Response received");

        Ok(SiteResponse {
            url: url.to_string(),
            status,
            body,
        })
    }
}

/// Local sites are never reached through a proxy
fn is_loopback(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}

impl SiteResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail with `Error::HttpStatus` unless the status is 2xx
    pub fn ensure_success(&self) -> Result<&Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::HttpStatus {
                url: self.url.clone(),
                status: self.status,
            })
        }
    }

    /// Fail with `Error::ContentMismatch` unless the body contains `expected`
    pub fn assert_contains(&self, expected: &str) -> Result<()> {
        if self.body.contains(expected) {
            Ok(())
        } else {
            tracing::error!(url = %self.url, body = %self.body, "Expected content missing");
            Err(Error::ContentMismatch {
                url: self.url.clone(),
                expected: expected.to_string(),
            })
        }
    }
}
