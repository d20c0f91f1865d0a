//! Remote API seam and its HTTP implementation.
//!
//! The hosted backend exposes PostgREST-style endpoints per resource. Each
//! queued action maps to exactly one request:
//!
//! | operation | request |
//! |-----------|---------|
//! | create    | `POST   {base}/{resource}` |
//! | update    | `PATCH  {base}/{resource}?id=eq.{target}` |
//! | delete    | `DELETE {base}/{resource}?id=eq.{target}` |
//! | sign      | `POST   {base}/rpc/sign_{resource}` |
//!
//! Path segments and the `id` filter are percent-encoded, so an id can never
//! add filters of its own.

use crate::{ActionKind, ConnectivityProbe, DeliveryError, PendingAction};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Delivers queued actions to the remote system.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn deliver(&self, action: &PendingAction) -> Result<(), DeliveryError>;
}

/// Supplies the bearer token of the current session.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Token holder updated by whoever owns the session.
///
/// The server stores the most recent UI bearer token here; a fixed service
/// token can be used as fallback.
#[derive(Debug, Default)]
pub struct SessionToken {
    current: RwLock<Option<String>>,
    fallback: Option<String>,
}

impl SessionToken {
    pub fn new(fallback: Option<String>) -> Self {
        Self {
            current: RwLock::new(None),
            fallback,
        }
    }

    /// Replace the session token.
    pub fn set(&self, token: impl Into<String>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Forget the session token (sign-out).
    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl TokenProvider for SessionToken {
    fn token(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .or_else(|| self.fallback.clone())
    }
}

/// HTTP client for the hosted REST API.
#[derive(Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    tokens: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRemote")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpRemote {
    /// Create a client for `base_url` (e.g. `https://xyz.supabase.co/rest/v1`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, DeliveryError> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| DeliveryError::Transport(format!("invalid base url: {}", raw)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
            tokens,
        })
    }

    /// Method and URL for an action.
    pub fn endpoint(&self, action: &PendingAction) -> Result<(Method, Url), DeliveryError> {
        let resource = action.resource_type.as_str();
        let (method, segments, filter) = match action.operation {
            ActionKind::Create => (Method::POST, vec![resource.to_string()], false),
            ActionKind::Update => (Method::PATCH, vec![resource.to_string()], true),
            ActionKind::Delete => (Method::DELETE, vec![resource.to_string()], true),
            ActionKind::Sign => (
                Method::POST,
                vec!["rpc".to_string(), format!("sign_{}", resource)],
                false,
            ),
        };

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DeliveryError::Transport(format!("invalid base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(&segments);
        if filter {
            url.query_pairs_mut()
                .append_pair("id", &format!("eq.{}", action.target_id()));
        }

        Ok((method, url))
    }

    fn headers(&self, token: &str) -> Result<HeaderMap, DeliveryError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| DeliveryError::Unauthorized)?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|e| DeliveryError::Transport(format!("invalid api key header: {}", e)))?;
            headers.insert("apikey", value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn deliver(&self, action: &PendingAction) -> Result<(), DeliveryError> {
        let token = self.tokens.token().ok_or(DeliveryError::Unauthorized)?;
        let (method, url) = self.endpoint(action)?;

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .headers(self.headers(&token)?);
        if action.operation != ActionKind::Delete {
            request = request.json(&action.payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(id = %action.id, %method, %url, %status, "action delivered");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        tracing::warn!(id = %action.id, %method, %url, %status, "remote rejected action");

        Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpRemote {
    /// Any HTTP response counts as reachable; only transport failures do not.
    async fn probe(&self) -> bool {
        let mut request = self.client.head(self.base_url.clone());
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }
        request.send().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn remote(token: Option<&str>) -> HttpRemote {
        let tokens = Arc::new(SessionToken::new(token.map(String::from)));
        HttpRemote::new("https://api.example.test/rest/v1/", None, tokens).unwrap()
    }

    fn action(kind: ActionKind, payload: serde_json::Value) -> PendingAction {
        PendingAction::new("act-1", "cleaning_logs", kind, payload, 1000)
    }

    fn url_of(remote: &HttpRemote, action: &PendingAction) -> (Method, String) {
        let (method, url) = remote.endpoint(action).unwrap();
        (method, url.to_string())
    }

    #[test]
    fn endpoints() {
        let remote = remote(Some("t"));

        let (method, url) = url_of(&remote, &action(ActionKind::Create, json!({})));
        assert_eq!(method, Method::POST);
        assert_eq!(url, "https://api.example.test/rest/v1/cleaning_logs");

        let (method, url) = url_of(&remote, &action(ActionKind::Update, json!({"id": "log-7"})));
        assert_eq!(method, Method::PATCH);
        assert_eq!(url, "https://api.example.test/rest/v1/cleaning_logs?id=eq.log-7");

        let (method, url) = url_of(&remote, &action(ActionKind::Delete, json!({})));
        assert_eq!(method, Method::DELETE);
        assert_eq!(url, "https://api.example.test/rest/v1/cleaning_logs?id=eq.act-1");

        let (method, url) = url_of(&remote, &action(ActionKind::Sign, json!({})));
        assert_eq!(method, Method::POST);
        assert_eq!(url, "https://api.example.test/rest/v1/rpc/sign_cleaning_logs");
    }

    #[test]
    fn target_id_cannot_add_filters() {
        let remote = remote(Some("t"));

        for id in ["x&id=neq.x", "x#frag", "a b/c?d"] {
            let (_, url) = remote
                .endpoint(&action(ActionKind::Delete, json!({ "id": id })))
                .unwrap();
            let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
            assert_eq!(pairs, vec![("id".to_string(), format!("eq.{}", id))]);
            assert!(url.fragment().is_none());
            assert_eq!(url.path(), "/rest/v1/cleaning_logs");
        }
    }

    #[test]
    fn resource_is_a_single_path_segment() {
        let remote = remote(Some("t"));
        let mut sneaky = action(ActionKind::Create, json!({}));
        sneaky.resource_type = "../admin".to_string();

        let (_, url) = remote.endpoint(&sneaky).unwrap();
        assert_eq!(url.path_segments().unwrap().count(), 3);
        assert!(url.query().is_none());
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let tokens = Arc::new(SessionToken::default());
        assert!(matches!(
            HttpRemote::new("not a url", None, tokens.clone()),
            Err(DeliveryError::Transport(_))
        ));
        assert!(HttpRemote::new("mailto:ops@example.test", None, tokens).is_err());
    }

    /// Serve one HTTP exchange and hand back the raw request.
    async fn serve_once(status: &str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/rest/v1", listener.local_addr().unwrap());
        let status = status.to_string();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .and_then(|v| v.trim().parse::<usize>().ok())
                        })
                        .unwrap_or(0);
                    if raw.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });

        (base, handle)
    }

    fn remote_at(base: &str) -> HttpRemote {
        let tokens = Arc::new(SessionToken::new(Some("user-jwt".into())));
        HttpRemote::new(base, Some("anon-key".into()), tokens).unwrap()
    }

    #[tokio::test]
    async fn delivers_with_headers_and_body() {
        let (base, server) = serve_once("201 Created", String::new()).await;
        let remote = remote_at(&base);

        let result = remote
            .deliver(&action(ActionKind::Update, json!({"id": "log-7", "room": "204"})))
            .await;
        assert_eq!(result, Ok(()));

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("PATCH /rest/v1/cleaning_logs?id=eq.log-7 HTTP/1.1"));
        assert!(lower.contains("authorization: bearer user-jwt"));
        assert!(lower.contains("apikey: anon-key"));
        assert!(lower.contains("content-type: application/json"));
        assert!(request.contains(r#""room":"204""#));
    }

    #[tokio::test]
    async fn delete_sends_no_body() {
        let (base, server) = serve_once("204 No Content", String::new()).await;
        let remote = remote_at(&base);

        let result = remote.deliver(&action(ActionKind::Delete, json!({"id": "log-7"}))).await;
        assert_eq!(result, Ok(()));

        let request = server.await.unwrap();
        assert!(request.starts_with("DELETE /rest/v1/cleaning_logs?id=eq.log-7 HTTP/1.1"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn error_status_is_reported_with_truncated_body() {
        let body = "x".repeat(MAX_ERROR_BODY_CHARS + 100);
        let (base, server) = serve_once("500 Internal Server Error", body).await;
        let remote = remote_at(&base);

        let result = remote.deliver(&action(ActionKind::Create, json!({}))).await;
        server.await.unwrap();

        match result {
            Err(DeliveryError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), MAX_ERROR_BODY_CHARS);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn closed_port_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/rest/v1", listener.local_addr().unwrap());
        drop(listener);

        let remote = remote_at(&base);
        let result = remote.deliver(&action(ActionKind::Create, json!({}))).await;
        assert!(matches!(result, Err(DeliveryError::Transport(_))));
        assert!(!remote.probe().await);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let remote = remote(None);
        let result = remote.deliver(&action(ActionKind::Create, json!({}))).await;
        assert_eq!(result, Err(DeliveryError::Unauthorized));
    }

    #[test]
    fn session_token_overrides_fallback() {
        let tokens = SessionToken::new(Some("service".into()));
        assert_eq!(tokens.token().as_deref(), Some("service"));
        tokens.set("user-jwt");
        assert_eq!(tokens.token().as_deref(), Some("user-jwt"));
        tokens.clear();
        assert_eq!(tokens.token().as_deref(), Some("service"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let tokens = Arc::new(SessionToken::default());
        let remote = HttpRemote::new("https://x.test", Some("secret".into()), tokens).unwrap();
        let debug = format!("{:?}", remote);
        assert!(!debug.contains("secret"));
    }
}
