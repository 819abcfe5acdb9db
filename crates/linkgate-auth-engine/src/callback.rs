//! Redirect handling: extracting the authorization code from the inbound
//! redirect URL, and a loopback listener that captures that URL for hosts
//! running on the user's machine.
//!
//! The listener uses a bare [`tokio::net::TcpListener`]; it only ever serves
//! a single GET request.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use crate::error::{AuthEngineError, Result};

/// The HTML page returned to the browser after the redirect is captured.
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Authorization Received</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            background: #f5f5f5;
            color: #333;
        }
        .card {
            text-align: center;
            padding: 3rem;
            background: white;
            border-radius: 12px;
            box-shadow: 0 2px 10px rgba(0,0,0,0.08);
        }
        h1 { color: #22c55e; margin-bottom: 0.5rem; }
        p { color: #666; }
    </style>
</head>
<body>
    <div class="card">
        <h1>Authorization Received</h1>
        <p>You can close this tab and return to linkgate.</p>
    </div>
</body>
</html>"#;

/// Extract the `code` query parameter from a redirect URL.
///
/// An `error` parameter in the redirect takes precedence and is reported as
/// [`AuthEngineError::AuthorizationDenied`].
///
/// # Errors
///
/// - [`AuthEngineError::UrlParse`] if `callback_url` is not a URL.
/// - [`AuthEngineError::AuthorizationDenied`] if the provider reported an error.
/// - [`AuthEngineError::MissingAuthorizationCode`] if there is no non-empty code.
pub fn extract_authorization_code(callback_url: &str) -> Result<String> {
    let url = Url::parse(callback_url)?;

    let mut code = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthEngineError::AuthorizationDenied { error, description });
    }

    code.filter(|c| !c.is_empty())
        .ok_or(AuthEngineError::MissingAuthorizationCode)
}

/// Return the `state` query parameter of a redirect URL, if any.
pub fn returned_state(callback_url: &str) -> Option<String> {
    let url = Url::parse(callback_url).ok()?;
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
}

/// A loopback listener that captures a single OAuth redirect.
pub struct CallbackServer;

impl CallbackServer {
    /// Listen on `127.0.0.1:{port}` for one redirect and return the full
    /// redirect URL, rebuilt against `redirect_uri`'s scheme and authority.
    ///
    /// # Errors
    ///
    /// - [`AuthEngineError::CallbackTimeout`] if `timeout_secs` elapse first.
    /// - [`AuthEngineError::Io`] if the listener cannot bind.
    /// - [`AuthEngineError::UrlParse`] if `redirect_uri` or the request path is
    ///   not usable as a URL.
    pub async fn capture(port: u16, redirect_uri: &str, timeout_secs: u64) -> Result<String> {
        let base = Url::parse(redirect_uri)?;
        let addr = format!("127.0.0.1:{port}");
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!(addr = %addr, "callback server listening for OAuth redirect");

        let timeout = tokio::time::Duration::from_secs(timeout_secs);
        match tokio::time::timeout(timeout, Self::accept_one(&listener, &base)).await {
            Ok(inner) => inner,
            Err(_) => Err(AuthEngineError::CallbackTimeout { timeout_secs }),
        }
    }

    /// Accept a single connection, answer it, and return the redirect URL.
    async fn accept_one(listener: &TcpListener, base: &Url) -> Result<String> {
        let (mut stream, peer) = listener.accept().await?;

        tracing::debug!(peer = %peer, "accepted callback connection");

        // OAuth redirects are small GET requests.
        let mut buf = [0u8; 4096];
        let n = stream.read(&mut buf).await?;
        let request = String::from_utf8_lossy(&buf[..n]);

        let target = Self::request_target(&request)?;
        let redirect = base.join(target)?;

        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            SUCCESS_HTML.len(),
            SUCCESS_HTML
        );
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await?;

        tracing::info!("callback received");

        Ok(redirect.to_string())
    }

    /// Return the request target of `GET /path?query HTTP/1.1`.
    fn request_target(request: &str) -> Result<&str> {
        let request_line = request
            .lines()
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| AuthEngineError::InvalidConfig {
                reason: "empty HTTP request on callback listener".to_string(),
            })?;

        let mut parts = request_line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(_method), Some(target)) if target.starts_with('/') => Ok(target),
            _ => Err(AuthEngineError::InvalidConfig {
                reason: format!("malformed HTTP request line: {request_line}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code() {
        let code = extract_authorization_code("https://host/cb?code=XYZ&state=abc123").unwrap();
        assert_eq!(code, "XYZ");
    }

    #[test]
    fn decodes_percent_encoding() {
        let code = extract_authorization_code("https://host/cb?code=abc%2Fdef%3D&state=s").unwrap();
        assert_eq!(code, "abc/def=");
    }

    #[test]
    fn missing_code_is_an_error() {
        let err = extract_authorization_code("https://host/cb?state=abc123").unwrap_err();
        assert!(matches!(err, AuthEngineError::MissingAuthorizationCode));

        let err = extract_authorization_code("https://host/cb?code=&state=abc123").unwrap_err();
        assert!(matches!(err, AuthEngineError::MissingAuthorizationCode));

        let err = extract_authorization_code("https://host/cb").unwrap_err();
        assert!(matches!(err, AuthEngineError::MissingAuthorizationCode));
    }

    #[test]
    fn error_param_takes_precedence() {
        let err = extract_authorization_code(
            "https://host/cb?error=access_denied&error_description=User+cancelled&state=s",
        )
        .unwrap_err();
        match err {
            AuthEngineError::AuthorizationDenied { error, description } => {
                assert_eq!(error, "access_denied");
                assert_eq!(description.as_deref(), Some("User cancelled"));
            }
            other => panic!("expected AuthorizationDenied, got {other:?}"),
        }
    }

    #[test]
    fn invalid_url_is_an_error() {
        let err = extract_authorization_code("not a url").unwrap_err();
        assert!(matches!(err, AuthEngineError::UrlParse(_)));
    }

    #[test]
    fn reads_returned_state() {
        assert_eq!(
            returned_state("https://host/cb?code=XYZ&state=abc123").as_deref(),
            Some("abc123")
        );
        assert_eq!(returned_state("https://host/cb?code=XYZ"), None);
    }

    #[test]
    fn request_target_parsing() {
        let target =
            CallbackServer::request_target("GET /callback?code=a&state=b HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(target, "/callback?code=a&state=b");

        assert!(CallbackServer::request_target("").is_err());
        assert!(CallbackServer::request_target("NOTHTTP").is_err());
    }

    #[tokio::test]
    async fn callback_server_captures_redirect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let base = Url::parse(&format!("http://127.0.0.1:{port}/callback")).unwrap();

        let client_task = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect(format!("127.0.0.1:{port}"))
                .await
                .unwrap();

            let request = format!(
                "GET /callback?code=test_code_42&state=test_state_99 HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nConnection: close\r\n\r\n"
            );
            stream.write_all(request.as_bytes()).await.unwrap();

            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await.unwrap();
            let response = String::from_utf8_lossy(&buf[..n]);
            assert!(response.contains("200 OK"));
            assert!(response.contains("Authorization Received"));
        });

        let redirect = CallbackServer::accept_one(&listener, &base).await.unwrap();
        client_task.await.unwrap();

        assert_eq!(
            redirect,
            format!("http://127.0.0.1:{port}/callback?code=test_code_42&state=test_state_99")
        );
        assert_eq!(extract_authorization_code(&redirect).unwrap(), "test_code_42");
    }

    #[tokio::test]
    async fn callback_server_timeout() {
        let result = CallbackServer::capture(0, "http://127.0.0.1/callback", 1).await;
        match result {
            Err(AuthEngineError::CallbackTimeout { timeout_secs }) => {
                assert_eq!(timeout_secs, 1);
            }
            Err(AuthEngineError::Io(_)) => {}
            other => panic!("expected timeout or io error, got: {other:?}"),
        }
    }
}
