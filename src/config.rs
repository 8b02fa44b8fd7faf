// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Covers the message service, its participant directory and the CLI client
use crate::paths;
use anyhow::{Context, Result};
use portal_chat_core::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub participants: Vec<ParticipantConfig>,
    #[serde(default)]
    pub client: ClientConfig,
}

// ─── ServerConfig ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    13100
}

// ─── StorageConfig ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding chat.db
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> String {
    "./data".to_string()
}

// ─── LoggingConfig ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write a daily rolling log file here in addition to stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    #[serde(default)]
    pub json: bool,
}

// ─── ParticipantConfig ──────────────────────────────────────────

/// One entry of the service's participant directory. The token is the
/// bearer credential that identifies this participant.
#[derive(Clone, Serialize, Deserialize)]
pub struct ParticipantConfig {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub token: String,
}

// Custom Debug impl to redact the bearer token
impl std::fmt::Debug for ParticipantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantConfig")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("role", &self.role)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

fn default_role() -> Role {
    Role::User
}

// ─── ClientConfig ───────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Where the persisted capability flag lives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
            state_dir: None,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("state_dir", &self.state_dir)
            .finish()
    }
}

impl ClientConfig {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(paths::client_state_dir)
    }
}

fn default_base_url() -> String {
    format!("http://{}:{}", default_host(), default_port())
}

fn default_timeout_secs() -> u64 {
    30
}

/// Expand tilde (~) to home directory in paths
/// Logs a warning if expansion fails and falls back to the original path
fn expand_tilde(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs
                .home_dir()
                .join(stripped)
                .to_string_lossy()
                .to_string();
        }
        tracing::warn!(
            path = %path,
            "Failed to expand tilde in path: could not determine home directory"
        );
    } else if path == "~" {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs.home_dir().to_string_lossy().to_string();
        }
        tracing::warn!("Failed to expand tilde: could not determine home directory");
    }
    path.to_string()
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. PORTAL_CHAT_CONFIG_PATH env var (if set)
    /// 2. ./config.toml (current directory - for development)
    /// 3. ~/.config/portal-chat/config.toml (XDG config dir)
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("PORTAL_CHAT_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from config.toml with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.storage.path = expand_tilde(&config.storage.path);
        if let Some(dir) = config.logging.directory.as_deref() {
            config.logging.directory = Some(expand_tilde(dir));
        }
        if let Some(dir) = config.client.state_dir.as_deref() {
            config.client.state_dir = Some(expand_tilde(dir));
        }

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("PORTAL_CHAT_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("PORTAL_CHAT_PORT") {
            self.server.port = val.parse().with_context(|| {
                format!("PORTAL_CHAT_PORT must be a valid port number, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("PORTAL_CHAT_DATA") {
            self.storage.path = val;
        }
        if let Ok(val) = std::env::var("PORTAL_CHAT_LOG_DIR") {
            self.logging.directory = Some(val);
        }
        if let Ok(val) = std::env::var("PORTAL_CHAT_URL") {
            self.client.base_url = val;
        }
        if let Ok(val) = std::env::var("PORTAL_CHAT_TOKEN") {
            self.client.token = Some(val);
            // Clear from environment to prevent exposure via /proc or ps
            std::env::remove_var("PORTAL_CHAT_TOKEN");
        }
        Ok(())
    }

    /// Reject participant directories that would make token lookups ambiguous.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        let mut tokens = HashSet::new();
        for participant in &self.participants {
            if participant.id.trim().is_empty() {
                anyhow::bail!("participants[].id must not be empty");
            }
            if participant.token.trim().is_empty() {
                anyhow::bail!("participants[].token must not be empty (id: {})", participant.id);
            }
            if !ids.insert(participant.id.as_str()) {
                anyhow::bail!("Duplicate participant id: {}", participant.id);
            }
            if !tokens.insert(participant.token.as_str()) {
                anyhow::bail!("Duplicate participant token (id: {})", participant.id);
            }
        }
        if self.client.timeout_secs == 0 {
            anyhow::bail!("client.timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Path of the SQLite database inside the storage directory
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.path).join("chat.db")
    }
}
