use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use url::Url;

use tracing::warn;

use crate::config::{Config, DEFAULT_HUB_URL, HTTP_TIMEOUT_SECS};
use crate::hub::HubClient;
use crate::log_capture::LogState;
use crate::remote::RemoteClient;
use crate::replay::SessionReplayEngine;

pub type SharedState = Arc<ScopeState>;

pub struct ScopeState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub logs: LogState,
    /// The active replay, if one is running. One replay at a time.
    pub replay: Mutex<Option<SessionReplayEngine>>,
    /// Hub commands target this URL; the UI can repoint it at any time.
    /// An active replay is repointed through its engine as well.
    pub hub_url: RwLock<Url>,
}

impl ScopeState {
    pub fn new(config: Config) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        let hub_url = Url::parse(&config.hub_url).unwrap_or_else(|err| {
            warn!(url = %config.hub_url, %err, "invalid hub URL, using default");
            Url::parse(DEFAULT_HUB_URL).expect("default hub url parses")
        });
        let hub_url = RwLock::new(hub_url);
        Self {
            config,
            http_client,
            logs: LogState::new(),
            replay: Mutex::new(None),
            hub_url,
        }
    }

    pub fn remote(&self) -> RemoteClient {
        RemoteClient::new(
            self.http_client.clone(),
            self.config.api_url.clone(),
            self.config.credentials.clone(),
        )
    }

    pub async fn hub_client(&self) -> HubClient {
        HubClient::new(
            self.http_client.clone(),
            self.hub_url.read().await.clone(),
            self.config.credentials.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CliArgs, DEFAULT_PORT};
    use clap::Parser;

    fn test_state() -> ScopeState {
        let args = CliArgs::parse_from(["sessionscope"]);
        ScopeState::new(Config::from_args(args))
    }

    #[test]
    fn test_defaults() {
        let state = test_state();
        assert_eq!(state.config.port, DEFAULT_PORT);
        assert!(state.config.credentials.is_none());
    }

    #[tokio::test]
    async fn test_no_replay_initially() {
        let state = test_state();
        assert!(state.replay.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_hub_url_can_be_repointed() {
        let state = test_state();
        let new_url = Url::parse("http://10.0.0.5:4444/wd/hub").unwrap();
        *state.hub_url.write().await = new_url.clone();
        assert_eq!(*state.hub_url.read().await, new_url);
    }
}
