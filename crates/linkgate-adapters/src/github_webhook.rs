//! GitHub push delivery (repository webhooks).
//!
//! `install` creates a repository webhook that posts JSON to the callback
//! URL. `handle` turns deliveries into results:
//!
//! | payload                         | result type            |
//! |---------------------------------|------------------------|
//! | `issue` + `action`              | `issue.<action>`       |
//! | `pull_request` + `action`       | `pull_request.<action>`|
//! | `ref` + `commits`               | `push`                 |
//! | `zen` (ping), branch deletion   | not actionable         |
//!
//! The event name travels in the `X-GitHub-Event` header, which is not part
//! of the inbound event, so the kind is recognised from the payload shape.

use async_trait::async_trait;
use linkgate_bridge::{
    BridgeError, EventSource, HandledEvent, InboundEvent, InstallContext, Result,
};
use serde_json::{Value, json};

use crate::github::GitHubRepo;

/// Events subscribed to when none are configured.
pub const DEFAULT_EVENTS: [&str; 3] = ["issues", "pull_request", "push"];

#[derive(Debug, Clone)]
pub struct GitHubWebhookSource {
    id: String,
    repo: GitHubRepo,
    secret: Option<String>,
    events: Vec<String>,
}

impl GitHubWebhookSource {
    pub fn new(id: impl Into<String>, repo: GitHubRepo) -> Self {
        Self {
            id: id.into(),
            repo,
            secret: None,
            events: DEFAULT_EVENTS.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// HMAC secret GitHub signs deliveries with.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into()).filter(|s| !s.is_empty());
        self
    }

    /// Events the hook subscribes to on install.
    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }
}

#[async_trait]
impl EventSource for GitHubWebhookSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports_install(&self) -> bool {
        true
    }

    async fn install(&self, ctx: &InstallContext) -> Result<Option<Value>> {
        let mut config = json!({
            "url": ctx.callback_url,
            "content_type": "json",
            "insecure_ssl": "0",
        });
        if let Some(secret) = &self.secret {
            config["secret"] = json!(secret);
        }
        let body = json!({
            "name": "web",
            "active": true,
            "events": self.events,
            "config": config,
        });

        let hook = self.repo.post("/hooks", &body).await?;
        let hook_id = hook
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| BridgeError::MalformedResponse {
                reason: "created webhook has no numeric id".to_string(),
            })?;

        tracing::info!(
            source = %self.id,
            callback_id = %ctx.callback_id,
            repo = %self.repo.full_name(),
            hook_id,
            "github webhook created"
        );

        Ok(Some(json!({
            "hookId": hook_id,
            "repository": self.repo.full_name(),
            "events": self.events,
        })))
    }

    async fn handle(&self, event: &InboundEvent) -> Result<Option<HandledEvent>> {
        let payload = event
            .payload
            .as_object()
            .ok_or_else(|| BridgeError::invalid_payload("GitHub delivery is not a JSON object"))?;

        if payload.contains_key("zen") {
            tracing::debug!(source = %self.id, event_id = %event.event_id, "ping delivery");
            return Ok(None);
        }

        let repository = str_at(&event.payload, &["repository", "full_name"]);

        if let Some(pr) = payload.get("pull_request") {
            let action = required_str(&event.payload, "action")?;
            return Ok(Some(
                HandledEvent::new(format!("pull_request.{action}"))
                    .with("number", pr.get("number").cloned().unwrap_or(Value::Null))
                    .with("title", str_at(pr, &["title"]))
                    .with("state", str_at(pr, &["state"]))
                    .with("merged", pr.get("merged").and_then(Value::as_bool).unwrap_or(false))
                    .with("url", str_at(pr, &["html_url"]))
                    .with("author", str_at(pr, &["user", "login"]))
                    .with("head", str_at(pr, &["head", "ref"]))
                    .with("base", str_at(pr, &["base", "ref"]))
                    .with("repository", repository),
            ));
        }

        if let Some(issue) = payload.get("issue") {
            let action = required_str(&event.payload, "action")?;
            return Ok(Some(
                HandledEvent::new(format!("issue.{action}"))
                    .with("number", issue.get("number").cloned().unwrap_or(Value::Null))
                    .with("title", str_at(issue, &["title"]))
                    .with("state", str_at(issue, &["state"]))
                    .with("url", str_at(issue, &["html_url"]))
                    .with("author", str_at(issue, &["user", "login"]))
                    .with("repository", repository),
            ));
        }

        if payload.contains_key("ref") && payload.contains_key("commits") {
            if payload.get("deleted").and_then(Value::as_bool) == Some(true) {
                return Ok(None);
            }
            let commits = payload
                .get("commits")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            return Ok(Some(
                HandledEvent::new("push")
                    .with("ref", str_at(&event.payload, &["ref"]))
                    .with("before", str_at(&event.payload, &["before"]))
                    .with("after", str_at(&event.payload, &["after"]))
                    .with("commits", commits)
                    .with("pusher", str_at(&event.payload, &["pusher", "name"]))
                    .with("compare", str_at(&event.payload, &["compare"]))
                    .with("repository", repository),
            ));
        }

        tracing::debug!(source = %self.id, event_id = %event.event_id, "unrecognised delivery ignored");
        Ok(None)
    }
}

/// String at a nested path, or an empty string.
fn str_at(value: &Value, path: &[&str]) -> String {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn required_str(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BridgeError::invalid_payload(format!("missing `{key}`")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use linkgate_auth_engine::ErrorKind;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source() -> GitHubWebhookSource {
        GitHubWebhookSource::new("github", GitHubRepo::new("octocat", "hello", "t"))
    }

    fn event(payload: Value) -> InboundEvent {
        InboundEvent {
            callback_id: "cb".to_string(),
            event_id: "delivery-1".to_string(),
            payload,
        }
    }

    #[tokio::test]
    async fn install_creates_repository_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octocat/hello/hooks"))
            .and(header("authorization", "Bearer t"))
            .and(body_partial_json(json!({
                "name": "web",
                "events": ["issues", "pull_request", "push"],
                "config": {
                    "url": "https://host/hooks/cb",
                    "content_type": "json",
                    "secret": "shh"
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42, "active": true})))
            .expect(1)
            .mount(&server)
            .await;

        let source = GitHubWebhookSource::new(
            "github",
            GitHubRepo::new("octocat", "hello", "t").with_base_url(server.uri()),
        )
        .with_secret("shh");

        let meta = source
            .install(&InstallContext {
                callback_url: "https://host/hooks/cb".to_string(),
                callback_id: "cb".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta["hookId"], 42);
        assert_eq!(meta["repository"], "octocat/hello");
    }

    #[tokio::test]
    async fn install_rejected_by_github_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/octocat/hello/hooks"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(json!({"message": "Hook already exists"})),
            )
            .mount(&server)
            .await;

        let source = GitHubWebhookSource::new(
            "github",
            GitHubRepo::new("octocat", "hello", "t").with_base_url(server.uri()),
        );
        let err = source
            .install(&InstallContext {
                callback_url: "https://host/hooks/cb".to_string(),
                callback_id: "cb".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::HttpStatus { status: 422, .. }));
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn issue_delivery_becomes_result() {
        let handled = source()
            .handle(&event(json!({
                "action": "opened",
                "issue": {
                    "number": 7,
                    "title": "Crash on start",
                    "state": "open",
                    "html_url": "https://github.com/octocat/hello/issues/7",
                    "user": {"login": "mona"}
                },
                "repository": {"full_name": "octocat/hello"}
            })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handled.kind, "issue.opened");
        assert_eq!(handled.result["number"], 7);
        assert_eq!(handled.result["author"], "mona");
        assert_eq!(handled.result["repository"], "octocat/hello");
    }

    #[tokio::test]
    async fn pull_request_delivery_becomes_result() {
        let handled = source()
            .handle(&event(json!({
                "action": "closed",
                "pull_request": {
                    "number": 3,
                    "title": "Fix crash",
                    "state": "closed",
                    "merged": true,
                    "head": {"ref": "fix"},
                    "base": {"ref": "main"},
                    "user": {"login": "mona"}
                }
            })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handled.kind, "pull_request.closed");
        assert_eq!(handled.result["merged"], true);
        assert_eq!(handled.result["head"], "fix");
    }

    #[tokio::test]
    async fn push_delivery_counts_commits() {
        let handled = source()
            .handle(&event(json!({
                "ref": "refs/heads/main",
                "before": "a",
                "after": "b",
                "commits": [{"id": "b"}, {"id": "c"}],
                "pusher": {"name": "mona"}
            })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handled.kind, "push");
        assert_eq!(handled.result["commits"], 2);
    }

    #[tokio::test]
    async fn ping_and_branch_deletion_are_not_actionable() {
        let source = source();
        let ping = source
            .handle(&event(json!({"zen": "Keep it logically awesome.", "hook_id": 1})))
            .await
            .unwrap();
        assert!(ping.is_none());

        let deleted = source
            .handle(&event(json!({
                "ref": "refs/heads/old",
                "deleted": true,
                "commits": []
            })))
            .await
            .unwrap();
        assert!(deleted.is_none());
    }

    #[tokio::test]
    async fn non_object_payload_is_shape_error() {
        let err = source().handle(&event(json!("oops"))).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidPayload { .. }));
        assert_eq!(err.kind(), ErrorKind::Shape);
    }
}
