use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderName, HeaderValue},
};
use tracing::{debug, info};
use url::Url;

use crate::error::{HttpError, StepError};

pub(crate) const USER_AGENT: &str = concat!("volley/", env!("CARGO_PKG_VERSION"));

/// Client-wide settings shared by every virtual user.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub request_timeout: Duration,
    pub max_connections: usize,
    /// Protocol-level headers sent with every request (`Accept`, `Content-Type`, ...).
    pub default_headers: Vec<(String, String)>,
}

/// Builds the shared reqwest client.
///
/// # Errors
///
/// Returns an error when a default header is invalid or the client cannot be built.
pub fn build_client(settings: &ClientSettings) -> Result<Client, HttpError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &settings.default_headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
            debug!("Rejected header name '{}': {}", name, err);
            HttpError::InvalidDefaultHeader { name: name.clone() }
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| {
            debug!("Rejected value for header '{}': {}", name, err);
            HttpError::InvalidDefaultHeader { name: name.clone() }
        })?;
        headers.insert(header_name, header_value);
    }

    Client::builder()
        .timeout(settings.request_timeout)
        .pool_max_idle_per_host(settings.max_connections)
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .map_err(|source| HttpError::BuildClientFailed { source })
}

/// Target base URL. Step paths are appended to its path; absolute step URLs
/// bypass it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl {
    url: Url,
}

impl BaseUrl {
    /// Parses and validates the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is malformed or not http(s).
    pub fn parse(input: &str) -> Result<Self, HttpError> {
        let url = Url::parse(input.trim()).map_err(|source| HttpError::InvalidBaseUrl {
            url: input.to_owned(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpError::UnsupportedScheme {
                url: input.to_owned(),
            });
        }
        Ok(Self { url })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Resolves a rendered step path.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidRequest`] when the result is not a valid URL.
    pub fn join(&self, path: &str) -> Result<Url, StepError> {
        let path = path.trim();
        let joined = if is_absolute(path) {
            path.to_owned()
        } else {
            let base = self.url.as_str().trim_end_matches('/');
            let relative = path.trim_start_matches('/');
            if relative.is_empty() {
                base.to_owned()
            } else if relative.starts_with('?') {
                format!("{}{}", base, relative)
            } else {
                format!("{}/{}", base, relative)
            }
        };
        Url::parse(&joined).map_err(|err| StepError::InvalidRequest {
            detail: format!("'{}': {}", joined, err),
        })
    }
}

fn is_absolute(path: &str) -> bool {
    let lower = path.get(..8).unwrap_or(path).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// One `GET base_url` before the run. Any HTTP status proves the target is
/// reachable; only transport failures abort setup.
///
/// # Errors
///
/// Returns [`HttpError::PreflightFailed`] when the request cannot complete.
pub async fn preflight(client: &Client, base: &BaseUrl) -> Result<u16, HttpError> {
    let failed = |source| HttpError::PreflightFailed {
        url: base.as_str().to_owned(),
        source,
    };
    let response = client.get(base.url().clone()).send().await.map_err(failed)?;
    let status = response.status().as_u16();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        chunk.map_err(failed)?;
    }
    info!("Preflight {} -> {}", base.as_str(), status);
    Ok(status)
}
