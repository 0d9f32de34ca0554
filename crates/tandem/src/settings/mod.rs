//! Service configuration.
//!
//! Settings layer serde defaults, an optional TOML file, and
//! `TANDEM`-prefixed environment variables (`TANDEM__SERVER__BIND` style),
//! in that order.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::completion::CompletionConfig;
use crate::room::RoomServiceConfig;

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub completion: CompletionSettings,
    pub notify: NotifySettings,
    pub rooms: RoomsSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind the HTTP listener to.
    pub bind: String,
    /// Base URL clients reach the service at; used for invite links.
    pub public_base_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8477".to_string(),
            public_base_url: "http://localhost:8477".to_string(),
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file path; defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

impl DatabaseSettings {
    /// The effective database path.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join("tandem").join("tandem.db"))
                .unwrap_or_else(|| PathBuf::from("tandem.db"))
        })
    }
}

/// Completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub base_url: String,
    /// Falls back to the `ANTHROPIC_API_KEY` environment variable.
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        let defaults = CompletionConfig::default();
        Self {
            base_url: defaults.base_url,
            api_key: None,
            model: defaults.model,
            max_tokens: defaults.max_tokens,
        }
    }
}

impl CompletionSettings {
    /// Build the completion client config.
    pub fn to_config(&self) -> CompletionConfig {
        CompletionConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
        }
    }
}

/// How remote inserts reach subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
    /// In-process broadcast hub.
    Push,
    /// Timer-driven poll of the incremental fetch.
    Poll,
}

/// Message delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub mode: NotifyMode,
    /// Poll interval when `mode = "poll"`.
    pub poll_interval_ms: u64,
}

impl NotifySettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            mode: NotifyMode::Push,
            poll_interval_ms: 2000,
        }
    }
}

/// Room lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsSettings {
    /// Hours a partner-pending room survives before the sweep removes it.
    pub pending_ttl_hours: i64,
    /// Seconds between sweep runs.
    pub sweep_interval_secs: u64,
}

impl Default for RoomsSettings {
    fn default() -> Self {
        let defaults = RoomServiceConfig::default();
        Self {
            pending_ttl_hours: defaults.pending_ttl_hours,
            sweep_interval_secs: defaults.sweep_interval_secs,
        }
    }
}

impl Settings {
    /// Build the room service config.
    pub fn room_service_config(&self) -> RoomServiceConfig {
        RoomServiceConfig {
            public_base_url: self.server.public_base_url.clone(),
            pending_ttl_hours: self.rooms.pending_ttl_hours,
            sweep_interval_secs: self.rooms.sweep_interval_secs,
        }
    }
}

/// The default config file path.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tandem").join("config.toml"))
}

/// Load settings from the given file (or the default location when it
/// exists), then apply `TANDEM`-prefixed environment overrides.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(
            File::from(path.to_path_buf())
                .format(FileFormat::Toml)
                .required(true),
        );
    } else if let Some(default_path) = default_config_path() {
        builder = builder.add_source(
            File::from(default_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    }

    builder = builder.add_source(Environment::with_prefix("TANDEM").separator("__"));

    let mut settings: Settings = builder
        .build()
        .context("loading configuration")?
        .try_deserialize()
        .context("parsing configuration")?;

    if settings.completion.api_key.is_none() {
        settings.completion.api_key = std::env::var("ANTHROPIC_API_KEY").ok();
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.bind, "127.0.0.1:8477");
        assert_eq!(settings.notify.mode, NotifyMode::Push);
        assert_eq!(settings.notify.poll_interval_ms, 2000);
        assert_eq!(settings.rooms.pending_ttl_hours, 24);
        assert!(settings.completion.api_key.is_none());
    }

    #[test]
    fn test_toml_overlay() {
        let toml = r#"
            [server]
            bind = "0.0.0.0:9000"

            [notify]
            mode = "poll"
            poll_interval_ms = 500
        "#;
        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.server.bind, "0.0.0.0:9000");
        assert_eq!(settings.notify.mode, NotifyMode::Poll);
        assert_eq!(settings.notify.poll_interval(), Duration::from_millis(500));
        // Untouched sections keep their defaults.
        assert_eq!(settings.rooms.sweep_interval_secs, 3600);
    }

    #[test]
    fn test_database_path_fallback() {
        let settings = DatabaseSettings {
            path: Some(PathBuf::from("/tmp/custom.db")),
        };
        assert_eq!(settings.resolved_path(), PathBuf::from("/tmp/custom.db"));

        let default = DatabaseSettings::default();
        assert!(default.resolved_path().ends_with("tandem.db"));
    }
}
