//! Shared GitHub REST plumbing for the GitHub event sources.
//!
//! Supports both github.com and GitHub Enterprise via a configurable base
//! URL.

use linkgate_bridge::{BridgeError, Result};
use ring::hmac;
use serde_json::Value;

/// Default GitHub API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Authenticated client for one repository.
#[derive(Clone)]
pub struct GitHubRepo {
    base_url: String,
    owner: String,
    repo: String,
    token: String,
    http: reqwest::Client,
}

impl GitHubRepo {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("linkgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
            http,
        }
    }

    /// Target a GitHub Enterprise instance (or a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `owner/repo`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// `{base}/repos/{owner}/{repo}{path}`.
    pub fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}{}", self.base_url, self.owner, self.repo, path)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        Ok(self.get_page(path, query).await?.body)
    }

    /// GET one page of a list endpoint, keeping its `rel="next"` link.
    pub async fn get_page(&self, path: &str, query: &[(&str, String)]) -> Result<Page> {
        let request = self
            .request(reqwest::Method::GET, &self.repo_url(path))
            .query(query);
        self.send(request).await
    }

    /// Follow a `next` link returned with an earlier page.
    pub async fn get_next(&self, url: &str) -> Result<Page> {
        self.send(self.request(reqwest::Method::GET, url)).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let request = self
            .request(reqwest::Method::POST, &self.repo_url(path))
            .json(body);
        Ok(self.send(request).await?.body)
    }

    /// Send a request and parse the JSON response, warning on a low rate
    /// limit. A `next` link outside this API base is dropped.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Page> {
        let response = request.send().await?;
        let status = response.status();

        if let Some(remaining) = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            && remaining < 10
        {
            tracing::warn!(remaining, "GitHub API rate limit is low");
        }

        let next = next_link(response.headers()).filter(|url| url.starts_with(&self.base_url));
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BridgeError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        let body = serde_json::from_str(&body).map_err(|e| BridgeError::MalformedResponse {
            reason: format!("GitHub API response is not JSON: {e}"),
        })?;
        Ok(Page { body, next })
    }
}

/// A parsed response plus the URL of the following page, if any.
#[derive(Debug, Clone)]
pub struct Page {
    pub body: Value,
    pub next: Option<String>,
}

impl std::fmt::Debug for GitHubRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubRepo")
            .field("base_url", &self.base_url)
            .field("repo", &self.full_name())
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Target of the `rel="next"` entry in a `Link` header.
fn next_link(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let link = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let (target, params) = entry.split_once(';')?;
        params
            .split(';')
            .any(|param| param.trim() == r#"rel="next""#)
            .then(|| {
                target
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            })
    })
}

/// Check an `X-Hub-Signature-256` header (`sha256=<hex>`) against the raw
/// request body.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Some(tag) = signature
        .strip_prefix("sha256=")
        .and_then(|digest| hex::decode(digest).ok())
    else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hmac::verify(&key, body, &tag).is_ok()
}

/// Compute the `X-Hub-Signature-256` value GitHub would send for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let tag = hmac::sign(&key, body);
    format!("sha256={}", hex::encode(tag.as_ref()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
