//! Outbound fetches of subscription URLs.

use std::time::Duration;

use crate::{Error, Result};

const TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;
const USER_AGENT: &str = concat!("subhub/", env!("CARGO_PKG_VERSION"));

/// HTTP client for subscription URLs.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    /// GET `url` and return the body as text.
    ///
    /// A URL that is not absolute `http(s)` is a [`Error::BadRequest`];
    /// transport failures and non-200 answers are [`Error::Upstream`].
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let parsed = parse_url(url)?;

        let resp = self.client.get(parsed).send().await.map_err(|e| {
            tracing::warn!(url, "Subscription fetch failed: {e}");
            upstream()
        })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            tracing::warn!(url, status = status.as_u16(), "Unexpected upstream status");
            return Err(upstream());
        }

        resp.text().await.map_err(|e| {
            tracing::warn!(url, "Reading subscription body failed: {e}");
            upstream()
        })
    }
}

fn upstream() -> Error {
    Error::Upstream("Failed to fetch subscription data".to_string())
}

fn parse_url(url: &str) -> Result<reqwest::Url> {
    let invalid = || Error::BadRequest("Invalid subscription URL".to_string());
    let parsed = reqwest::Url::parse(url).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(parsed)
}
