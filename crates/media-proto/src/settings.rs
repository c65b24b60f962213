//! User preferences: a flat key/value table with defaults.
//!
//! Read once at startup; written only through [`PreferenceStore::save`] or
//! [`PreferenceStore::set`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings serialize: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unknown setting '{0}'")]
    UnknownKey(String),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_auto_play")]
    pub auto_play: bool,
    #[serde(default)]
    pub loop_playback: bool,
    /// Percent, 0..=100.
    #[serde(default = "default_volume")]
    pub default_volume: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_port: default_server_port(),
            auto_play: default_auto_play(),
            loop_playback: false,
            default_volume: default_volume(),
        }
    }
}

fn default_server_port() -> u16 {
    8080
}

fn default_auto_play() -> bool {
    true
}

fn default_volume() -> u8 {
    80
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    ServerPort,
    AutoPlay,
    LoopPlayback,
    DefaultVolume,
}

impl SettingKey {
    pub const ALL: [SettingKey; 4] = [
        SettingKey::ServerPort,
        SettingKey::AutoPlay,
        SettingKey::LoopPlayback,
        SettingKey::DefaultVolume,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ServerPort => "server_port",
            Self::AutoPlay => "auto_play",
            Self::LoopPlayback => "loop_playback",
            Self::DefaultVolume => "default_volume",
        }
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s.trim())
            .ok_or_else(|| SettingsError::UnknownKey(s.to_string()))
    }
}

impl Settings {
    pub fn value(&self, key: SettingKey) -> String {
        match key {
            SettingKey::ServerPort => self.server_port.to_string(),
            SettingKey::AutoPlay => self.auto_play.to_string(),
            SettingKey::LoopPlayback => self.loop_playback.to_string(),
            SettingKey::DefaultVolume => self.default_volume.to_string(),
        }
    }

    /// Parse `value` into the field named by `key`.
    pub fn apply(&mut self, key: SettingKey, value: &str) -> Result<(), SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.name(),
            value: value.to_string(),
        };
        let v = value.trim();
        match key {
            SettingKey::ServerPort => {
                self.server_port = v.parse().ok().filter(|p| *p > 0).ok_or_else(invalid)?
            }
            SettingKey::AutoPlay => self.auto_play = v.parse().map_err(|_| invalid())?,
            SettingKey::LoopPlayback => self.loop_playback = v.parse().map_err(|_| invalid())?,
            SettingKey::DefaultVolume => {
                let vol: u8 = v.parse().map_err(|_| invalid())?;
                if vol > 100 {
                    return Err(invalid());
                }
                self.default_volume = vol;
            }
        }
        Ok(())
    }
}

pub struct PreferenceStore {
    path: PathBuf,
    current: Settings,
}

impl PreferenceStore {
    /// Load from `path`.  A missing or unreadable file yields the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = Self::read(&path);
        Self { path, current }
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&mut self, settings: Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&settings)?;
        std::fs::write(&self.path, content)?;
        debug!("settings: saved to {}", self.path.display());
        self.current = settings;
        Ok(())
    }

    /// Update a single key by name and persist the whole table.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let key: SettingKey = key.parse()?;
        let mut next = self.current.clone();
        next.apply(key, value)?;
        self.save(next)
    }

    fn read(path: &Path) -> Settings {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Settings::default(),
        };
        match toml::from_str::<Settings>(&content) {
            Ok(s) => Settings {
                default_volume: s.default_volume.min(100),
                ..s
            },
            Err(e) => {
                warn!("settings: ignoring unreadable {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }
}
