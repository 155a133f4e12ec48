//! REST client for the cloud provider's session and artifact endpoints.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Credentials;
use crate::error::ScopeError;

pub struct RemoteClient {
    client: reqwest::Client,
    api_url: String,
    credentials: Option<Credentials>,
}

impl RemoteClient {
    pub fn new(client: reqwest::Client, api_url: String, credentials: Option<Credentials>) -> Self {
        Self {
            client,
            api_url,
            credentials,
        }
    }

    /// Authenticated artifact download. A non-success response surfaces the
    /// server's own body text, which carries the useful diagnostics
    /// (auth errors, expired artifact links).
    pub async fn download(&self, url: &str) -> Result<String, ScopeError> {
        debug!(%url, "downloading artifact");
        let mut builder = self.client.get(url);
        if let Some(creds) = &self.credentials {
            builder = builder.basic_auth(&creds.username, Some(&creds.access_key));
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ScopeError::Download {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    /// Session metadata, including the artifact URLs the other fetches need.
    pub async fn get_session_details(&self, session_id: &str) -> Result<Value, ScopeError> {
        let url = format!("{}/automate/sessions/{session_id}", self.api_url);
        let body = self.download(&url).await?;
        serde_json::from_str(&body)
            .map_err(|_| ScopeError::Other(format!("session details were not JSON: {body}")))
    }

    /// Selenium hub log for a session. Artifact links are pre-signed, so no
    /// auth is sent; a missing or failing artifact degrades to a
    /// user-facing placeholder rather than an error.
    pub async fn get_selenium_logs(&self, selenium_logs_url: &str) -> String {
        if selenium_logs_url.is_empty() {
            return "No Selenium logs available for this session".to_string();
        }
        match self.fetch_unauthenticated(selenium_logs_url).await {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "selenium log fetch failed");
                "Failed to load Selenium logs".to_string()
            }
        }
    }

    /// HAR network log for a session, same degradation contract as
    /// [`get_selenium_logs`](Self::get_selenium_logs).
    pub async fn get_har_logs(&self, har_logs_url: &str) -> String {
        if har_logs_url.is_empty() {
            return "No network logs available for this session".to_string();
        }
        match self.fetch_unauthenticated(har_logs_url).await {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "network log fetch failed");
                "Failed to load network logs".to_string()
            }
        }
    }

    async fn fetch_unauthenticated(&self, url: &str) -> Result<String, ScopeError> {
        let response = self.client.get(url).send().await?;
        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            Err(ScopeError::Download {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}
