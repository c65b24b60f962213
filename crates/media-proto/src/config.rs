use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Where the media server lives and how long a single request may take.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Stream preparation polling budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Load the player even when preparation timed out; the server may still
    /// finish the transcode after we stop asking.
    #[serde(default)]
    pub handoff_on_timeout: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Resolve the master playlist ourselves and attach the chosen variant.
    #[default]
    Variant,
    /// Hand the master playlist straight to the media element.
    Native,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Base for `/hls/{stream_id}/playlist.m3u8`. Empty means "same as
    /// `client.base_url`".
    #[serde(default)]
    pub hls_base_url: String,
    #[serde(default)]
    pub engine: EngineKind,
    /// Explicit mpv binary; falls back to PATH lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mpv_binary: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            handoff_on_timeout: false,
        }
    }
}

impl PollingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            hls_base_url: String::new(),
            engine: EngineKind::default(),
            mpv_binary: None,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
            log_file: default_log_file(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    30
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_settings_file() -> PathBuf {
    platform::config_dir().join("settings.toml")
}

fn default_log_file() -> PathBuf {
    platform::data_dir().join("mediadeck.log")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Read `path`, writing the defaults there first when it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Playlist host, defaulting to the API host.
    pub fn hls_base_url(&self) -> &str {
        if self.player.hls_base_url.is_empty() {
            &self.client.base_url
        } else {
            &self.player.hls_base_url
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            polling: PollingConfig::default(),
            player: PlayerConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}
