use clap::Parser;
use std::time::Duration;

/// Sessionscope — diagnostics backend for cloud browser-automation sessions.
#[derive(Parser, Debug, Clone)]
#[command(name = "sessionscope")]
pub struct CliArgs {
    /// HTTP port the backend listens on
    #[arg(long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// WebDriver hub endpoint used for session replay
    #[arg(long = "hub-url", default_value = DEFAULT_HUB_URL)]
    pub hub_url: String,

    /// Base URL of the automation service REST API
    #[arg(long = "api-url", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// REST API username (basic auth for artifact downloads)
    #[arg(long = "username", env = "SESSIONSCOPE_USERNAME")]
    pub username: Option<String>,

    /// REST API access key (basic auth for artifact downloads)
    #[arg(long = "access-key", env = "SESSIONSCOPE_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub hub_url: String,
    pub api_url: String,
    pub credentials: Option<Credentials>,
}

/// Explicit credential value passed into the remote client; never read
/// from global state by the parsers or the replay engine.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub access_key: String,
}

pub const DEFAULT_PORT: u16 = 9411;
pub const DEFAULT_HUB_URL: &str = "http://127.0.0.1:4444/wd/hub";
pub const DEFAULT_API_URL: &str = "https://api.browserstack.com";

// Replay retry policy for findElement/findElements. The replayed session
// may run faster than the original human-driven one, so the target element
// can lag behind the command that needs it.
pub const FIND_ELEMENT_RETRY_TIMEOUT: Duration = Duration::from_secs(30);
pub const FIND_ELEMENT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

// HTTP client constants
pub const HTTP_TIMEOUT_SECS: u64 = 60;

// Diagnostic log buffer
pub const LOG_BUFFER_SIZE: usize = 500;

impl Config {
    pub fn from_args(args: CliArgs) -> Self {
        let credentials = match (args.username, args.access_key) {
            (Some(username), Some(access_key)) => Some(Credentials {
                username,
                access_key,
            }),
            _ => None,
        };

        Config {
            port: args.port,
            hub_url: args.hub_url,
            api_url: args.api_url,
            credentials,
        }
    }
}
