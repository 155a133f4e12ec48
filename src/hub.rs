//! WebDriver hub client: the production [`WebDriverExecutor`].
//!
//! Speaks plain WebDriver HTTP against whichever hub URL it is given. New
//! sessions are requested with both the W3C and the legacy JSONWire
//! capability envelopes so either dialect of hub accepts them.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::config::Credentials;
use crate::error::ScopeError;
use crate::parsers::text_logs::ParsedRequest;
use crate::replay::{StartedSession, WebDriverExecutor};

pub struct HubClient {
    client: reqwest::Client,
    /// Interior mutability so an in-flight replay can be repointed.
    hub_url: RwLock<Url>,
    credentials: Option<Credentials>,
}

impl HubClient {
    pub fn new(
        client: reqwest::Client,
        hub_url: Url,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            client,
            hub_url: RwLock::new(hub_url),
            credentials,
        }
    }

    pub fn hub_url(&self) -> Url {
        self.hub_url
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, ScopeError> {
        // Url::join would drop the hub's own path (/wd/hub), so append.
        let base = self.hub_url();
        let base = base.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}{path}"))
            .map_err(|e| ScopeError::Other(format!("bad hub endpoint {path}: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.access_key)),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<Value, ScopeError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ScopeError::CommandFailed {
                status: status.as_u16(),
                body,
            });
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|_| ScopeError::Other(format!(
            "hub returned non-JSON body: {body}"
        )))
    }
}

/// Session id from a new-session response, W3C (`value.sessionId`) or
/// JSONWire (top-level `sessionId`).
fn session_id_from(raw: &Value) -> Option<String> {
    raw.pointer("/value/sessionId")
        .or_else(|| raw.get("sessionId"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl WebDriverExecutor for HubClient {
    async fn start_session(&self, capabilities: &Value) -> Result<StartedSession, ScopeError> {
        let url = self.endpoint_url("/session")?;
        debug!(%url, "starting hub session");

        let body = json!({
            "capabilities": { "alwaysMatch": capabilities },
            "desiredCapabilities": capabilities,
        });
        let raw = self
            .send(self.request(Method::POST, url).json(&body))
            .await
            .map_err(|e| ScopeError::StartSession(e.to_string()))?;

        let session_id = session_id_from(&raw)
            .ok_or_else(|| ScopeError::StartSession(format!("no session id in {raw}")))?;
        Ok(StartedSession { session_id, raw })
    }

    async fn execute(
        &self,
        request: &ParsedRequest,
        session_id: &str,
    ) -> Result<Value, ScopeError> {
        let url = self.endpoint_url(&format!("/session/{session_id}{}", request.endpoint))?;
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| ScopeError::Other(format!("bad HTTP method {}", request.method)))?;
        debug!(%method, %url, "dispatching command");

        let mut builder = self.request(method.clone(), url);
        if method != Method::GET && method != Method::DELETE {
            builder = builder.json(&request.data);
        }
        self.send(builder).await
    }

    async fn stop_session(&self, session_id: &str) -> Result<(), ScopeError> {
        let url = self.endpoint_url(&format!("/session/{session_id}"))?;
        debug!(%url, "stopping hub session");
        self.send(self.request(Method::DELETE, url))
            .await
            .map_err(|e| ScopeError::StopSession(e.to_string()))?;
        Ok(())
    }

    fn set_hub_url(&self, url: Url) {
        debug!(%url, "hub repointed");
        *self.hub_url.write().unwrap_or_else(|e| e.into_inner()) = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_w3c() {
        let raw = json!({ "value": { "sessionId": "abc", "capabilities": {} } });
        assert_eq!(session_id_from(&raw).as_deref(), Some("abc"));
    }

    #[test]
    fn test_session_id_jsonwire() {
        let raw = json!({ "sessionId": "xyz", "status": 0 });
        assert_eq!(session_id_from(&raw).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_session_id_missing() {
        assert_eq!(session_id_from(&json!({ "value": null })), None);
    }

    #[test]
    fn test_endpoint_url_keeps_hub_path() {
        let client = HubClient::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:4444/wd/hub").unwrap(),
            None,
        );
        let url = client.endpoint_url("/session/abc/url").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:4444/wd/hub/session/abc/url");
    }

    #[test]
    fn test_set_hub_url_repoints_subsequent_endpoints() {
        let client = HubClient::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:4444/wd/hub").unwrap(),
            None,
        );
        client.set_hub_url(Url::parse("http://10.0.0.5:4444/wd/hub").unwrap());
        let url = client.endpoint_url("/session/abc/url").unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.5:4444/wd/hub/session/abc/url");
    }
}
