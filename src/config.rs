use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// Application configuration, read from `JOT_*` environment variables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Directory holding one `jot_<token>.txt` file per document
    #[serde(default = "default_dir")]
    pub dir: PathBuf,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// TLS certificate chain (PEM). TLS is enabled when both cert and key are set.
    pub cert_file: Option<PathBuf>,

    /// TLS private key (PEM)
    pub key_file: Option<PathBuf>,

    /// Base URL printed in welcome text, e.g. `https://jot.example.org`
    pub public_url: Option<String>,

    /// Seconds between heartbeat frames on an idle live stream, 1 to 60
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Buffered messages per session before fan-out starts dropping
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Watch the storage directory for edits made outside the server
    #[serde(default = "default_watch")]
    pub watch: bool,

    /// How long open streams get to unwind on shutdown
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            dotenvy::dotenv().ok();
        }

        match envy::prefixed("JOT_").from_env::<Config>() {
            Ok(config) => {
                info!("Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tls_enabled(&self) -> bool {
        self.cert_file.is_some() && self.key_file.is_some()
    }

    /// Base URL used when printing shareable links
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        let scheme = if self.tls_enabled() { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.clamp(1, MAX_HEARTBEAT_SECS))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            host: default_host(),
            port: default_port(),
            cert_file: None,
            key_file: None,
            public_url: None,
            heartbeat_secs: default_heartbeat_secs(),
            channel_capacity: default_channel_capacity(),
            watch: default_watch(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            environment: default_environment(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

const MAX_HEARTBEAT_SECS: u64 = 60;

// Default value functions
fn default_dir() -> PathBuf {
    PathBuf::from("jots")
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    7086
}

fn default_heartbeat_secs() -> u64 {
    15
}

fn default_channel_capacity() -> usize {
    10
}

fn default_watch() -> bool {
    true
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

fn default_environment() -> String {
    "development".to_string()
}
