//! Daemon configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/o365ical/config.toml` by default.
//!
//! Credential values (`client_id`, `client_secret`) support secret references:
//! - `pass::path/in/store`: resolved via `pass show`
//! - `env::VAR_NAME`: resolved from the environment
//! - plain text: used as-is

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use o365ical_core::TracingOutputFormat;
use o365ical_providers::{GraphConfig, OAuthCredentials};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};
use crate::secret;

/// Configuration for the o365ical daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Debug mode.
    pub debug: bool,

    /// HTTP listener settings.
    pub server: ServerSettings,

    /// Azure AD application settings.
    pub oauth: OAuthSettings,

    /// Microsoft Graph settings.
    pub graph: GraphSettings,

    /// Database and attachment locations.
    pub storage: StorageSettings,

    /// Background refresh settings.
    pub refresh: RefreshSettings,

    /// Log output settings.
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to listen on.
    pub listen: SocketAddr,

    /// Public base URL of the feed, e.g. `https://cal.example.com`.
    ///
    /// When unset, URLs are built from the request `Host` header.
    pub public_url: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 5000)),
            public_url: None,
        }
    }
}

/// Azure AD application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    /// Application (client) ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// Client secret (supports `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,

    /// Directory (tenant) ID.
    pub tenant: String,

    /// Redirect URI registered for the application, ending in `/token`.
    pub redirect_url: Option<String>,

    /// Scopes to request.
    pub scopes: Vec<String>,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            tenant: "common".to_string(),
            redirect_url: None,
            scopes: OAuthCredentials::DEFAULT_SCOPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl OAuthSettings {
    /// Resolves secret references and builds the provider credentials.
    pub fn to_credentials(&self) -> ServerResult<OAuthCredentials> {
        let client_id = required(self.client_id.as_deref(), "oauth.client_id")?;
        let client_secret = required(self.client_secret.as_deref(), "oauth.client_secret")?;
        let redirect_url = self
            .redirect_url
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ServerError::config("oauth.redirect_url is required"))?;

        let credentials = OAuthCredentials::new(client_id, client_secret, &self.tenant, redirect_url)
            .with_scopes(self.scopes.clone());
        credentials
            .validate()
            .map_err(|e| ServerError::config(format!("oauth: {}", e)))?;
        Ok(credentials)
    }
}

fn required(value: Option<&str>, key: &str) -> ServerResult<String> {
    let raw = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServerError::config(format!("{} is required", key)))?;
    secret::resolve(raw).map_err(|e| ServerError::config(format!("{}: {}", key, e)))
}

/// Microsoft Graph settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// API root.
    pub base_url: String,

    /// Events per calendar view page.
    pub page_size: usize,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        let defaults = GraphConfig::default();
        Self {
            base_url: defaults.base_url,
            page_size: defaults.page_size,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

impl GraphSettings {
    /// Converts to the provider configuration.
    pub fn to_graph_config(&self) -> GraphConfig {
        GraphConfig::default()
            .with_base_url(&self.base_url)
            .with_page_size(self.page_size)
            .with_timeout(self.timeout())
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Database and attachment locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database path.
    pub database: Option<PathBuf>,

    /// Directory for mirrored attachments.
    pub attachments_dir: Option<PathBuf>,
}

impl StorageSettings {
    /// Database path, defaulting to the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| Config::default_data_dir().join("o365ical.db"))
    }

    /// Attachment directory, defaulting to the data directory.
    pub fn attachments_path(&self) -> PathBuf {
        self.attachments_dir
            .clone()
            .unwrap_or_else(|| Config::default_data_dir().join("attachments"))
    }
}

/// Background refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    /// Seconds between two passes.
    pub tick_secs: u64,

    /// Hours after which a cached window is refetched.
    pub ttl_hours: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            tick_secs: 1,
            ttl_hours: 24,
        }
    }
}

impl RefreshSettings {
    /// Delay between passes.
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }

    /// Cache TTL.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 60 * 60)
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `pretty`, `compact` or `json`.
    pub format: Option<String>,
}

impl LoggingSettings {
    /// Parsed output format, `pretty` when unset.
    pub fn output_format(&self) -> ServerResult<TracingOutputFormat> {
        match self.format.as_deref() {
            None => Ok(TracingOutputFormat::Pretty),
            Some(value) => value
                .parse()
                .map_err(|e| ServerError::config(format!("logging.format: {}", e))),
        }
    }
}

impl Config {
    /// Loads configuration from the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> ServerResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ServerResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServerError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> ServerResult<Self> {
        toml::from_str(content)
            .map_err(|e| ServerError::config(format!("failed to parse config: {}", e)))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("o365ical")
    }

    /// Returns the default data directory path.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("o365ical")
    }
}
