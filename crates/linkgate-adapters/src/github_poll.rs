//! GitHub pull delivery: poll a repository's issues.
//!
//! The checkpoint is `{ since, seen_ids }`. `since` is the newest
//! `updated_at` seen so far (RFC 3339). GitHub's `since` filter is
//! inclusive, so issues updated exactly at `since` come back on the next
//! poll; `seen_ids` lists the ones already emitted at that instant so they
//! are not emitted twice. Each poll follows the `Link: rel="next"` pages of
//! the listing, so an instant shared by more issues than fit on one page is
//! still drained.
//!
//! The first poll of a callback id makes no request: it records "now" as the
//! checkpoint and returns nothing, so subscribing does not replay history.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use linkgate_bridge::{
    BridgeError, EventSource, HandledEvent, InboundEvent, PollOutcome, PollRequest, PollState,
    Result,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::github::GitHubRepo;

const DEFAULT_PER_PAGE: u8 = 100;
/// Upper bound on pages read by one poll.
const MAX_PAGES: usize = 50;

#[derive(Debug, Clone, Deserialize)]
struct Issue {
    id: u64,
    number: u64,
    title: String,
    state: String,
    html_url: String,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    user: Option<User>,
    /// Present when the "issue" is actually a pull request.
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Clone)]
pub struct GitHubIssuePoller {
    id: String,
    repo: GitHubRepo,
    per_page: u8,
    include_pull_requests: bool,
}

impl GitHubIssuePoller {
    pub fn new(id: impl Into<String>, repo: GitHubRepo) -> Self {
        Self {
            id: id.into(),
            repo,
            per_page: DEFAULT_PER_PAGE,
            include_pull_requests: false,
        }
    }

    /// Page size, clamped to GitHub's 1..=100.
    pub fn with_per_page(mut self, per_page: u8) -> Self {
        self.per_page = per_page.clamp(1, 100);
        self
    }

    /// Also emit pull requests. GitHub lists them alongside issues; by
    /// default they only advance the cursor.
    pub fn with_pull_requests(mut self, include: bool) -> Self {
        self.include_pull_requests = include;
        self
    }
}

/// Parsed checkpoint.
struct Cursor {
    since: DateTime<Utc>,
    seen_ids: Vec<u64>,
}

impl Cursor {
    fn from_state(state: &PollState) -> Result<Option<Self>> {
        let Some(since) = state.get_str("since") else {
            return Ok(None);
        };
        let since = DateTime::parse_from_rfc3339(since)
            .map_err(|e| BridgeError::InvalidConfig {
                reason: format!("poll checkpoint has a bad `since`: {e}"),
            })?
            .with_timezone(&Utc);
        let seen_ids = state
            .get("seen_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default();
        Ok(Some(Self { since, seen_ids }))
    }

    fn into_state(self) -> PollState {
        PollState::new()
            .with("since", self.since.to_rfc3339_opts(SecondsFormat::Secs, true))
            .with("seen_ids", json!(self.seen_ids))
    }
}

#[async_trait]
impl EventSource for GitHubIssuePoller {
    fn id(&self) -> &str {
        &self.id
    }

    /// Pull-only: deliveries are not expected.
    async fn handle(&self, event: &InboundEvent) -> Result<Option<HandledEvent>> {
        tracing::debug!(source = %self.id, event_id = %event.event_id, "push delivery ignored by poller");
        Ok(None)
    }

    fn supports_poll(&self) -> bool {
        true
    }

    async fn poll(&self, req: &PollRequest) -> Result<PollOutcome> {
        let Some(cursor) = Cursor::from_state(&req.state)? else {
            let baseline = Cursor {
                since: Utc::now(),
                seen_ids: Vec::new(),
            };
            tracing::info!(
                source = %self.id,
                callback_id = %req.callback_id,
                since = %baseline.since,
                "issue poll baseline recorded"
            );
            return Ok(PollOutcome::new(Vec::new(), baseline.into_state()));
        };

        let mut page = self
            .repo
            .get_page(
                "/issues",
                &[
                    ("state", "all".to_string()),
                    ("sort", "updated".to_string()),
                    ("direction", "asc".to_string()),
                    (
                        "since",
                        cursor.since.to_rfc3339_opts(SecondsFormat::Secs, true),
                    ),
                    ("per_page", self.per_page.to_string()),
                ],
            )
            .await?;

        let mut next = Cursor {
            since: cursor.since,
            seen_ids: cursor.seen_ids.clone(),
        };
        let mut items = Vec::new();
        let mut pages = 1;

        // Read every page; issues sharing the cursor instant can fill
        // whole pages that were already emitted.
        loop {
            let issues: Vec<Issue> = serde_json::from_value(page.body).map_err(|e| {
                BridgeError::MalformedResponse {
                    reason: format!("issue list has an unexpected shape: {e}"),
                }
            })?;

            for issue in issues {
                if issue.updated_at < cursor.since
                    || (issue.updated_at == cursor.since && cursor.seen_ids.contains(&issue.id))
                {
                    continue;
                }

                if issue.updated_at > next.since {
                    next.since = issue.updated_at;
                    next.seen_ids.clear();
                }
                if issue.updated_at == next.since && !next.seen_ids.contains(&issue.id) {
                    next.seen_ids.push(issue.id);
                }

                if issue.pull_request.is_some() && !self.include_pull_requests {
                    continue;
                }
                items.push(issue_item(&issue));
            }

            let Some(url) = page.next else {
                break;
            };
            if pages >= MAX_PAGES {
                tracing::warn!(
                    source = %self.id,
                    callback_id = %req.callback_id,
                    pages,
                    "issue poll stopped at page limit"
                );
                break;
            }
            page = self.repo.get_next(&url).await?;
            pages += 1;
        }

        tracing::debug!(
            source = %self.id,
            callback_id = %req.callback_id,
            items = items.len(),
            pages,
            since = %next.since,
            "issues polled"
        );

        Ok(PollOutcome::new(items, next.into_state()))
    }
}

fn issue_item(issue: &Issue) -> Map<String, Value> {
    let mut item = Map::new();
    item.insert("id".to_string(), json!(issue.id));
    item.insert("number".to_string(), json!(issue.number));
    item.insert("title".to_string(), json!(issue.title));
    item.insert("state".to_string(), json!(issue.state));
    item.insert("url".to_string(), json!(issue.html_url));
    item.insert(
        "updated_at".to_string(),
        json!(issue.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    item.insert(
        "author".to_string(),
        json!(issue.user.as_ref().map(|u| u.login.as_str())),
    );
    item.insert("pull_request".to_string(), json!(issue.pull_request.is_some()));
    item
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
