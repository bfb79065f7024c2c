use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::ViewMode;

pub const DEFAULT_API_URL: &str = "http://18.222.143.225:8000";
pub const DEFAULT_AUTH_URL: &str = "https://api.ts.autoedge.ai/api/auth";
pub const DEFAULT_MAX_POINTS: usize = 500;

const DEFAULT_CHANNELS: [&str; 17] = [
    "aimp", "amud", "arnd", "asin1", "asin2", "adbr", "adfl", "bed1", "bed2", "bfo1", "bfo2",
    "bso1", "bso2", "bso3", "ced1", "cfo1", "cso1",
];

/// User configuration persisted between sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub auth_url: String,
    pub remembered_username: Option<String>,
    pub default_view: ViewMode,
    pub max_points: usize,
    pub channels: Vec<String>,
    /// Display name per channel; channels without an entry show their raw name.
    pub channel_aliases: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            auth_url: DEFAULT_AUTH_URL.to_owned(),
            remembered_username: None,
            default_view: ViewMode::List,
            max_points: DEFAULT_MAX_POINTS,
            channels: DEFAULT_CHANNELS.iter().map(|name| (*name).to_owned()).collect(),
            channel_aliases: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("edgescope").join("config.json"))
    }

    /// Reads the config at `path`, falling back to defaults when it is missing
    /// or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "no config file found, using defaults");
            return Self::default();
        }

        match Self::read(path) {
            Ok(config) => {
                info!(path = %path.display(), channels = config.channels.len(), "loaded config");
                config
            }
            Err(error) => {
                warn!(path = %path.display(), "ignoring unreadable config: {error:#}");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;

        info!(path = %path.display(), "saved config");
        Ok(())
    }

    pub fn alias<'a>(&'a self, channel: &'a str) -> &'a str {
        self.channel_aliases
            .get(channel)
            .map(String::as_str)
            .unwrap_or(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::load(&dir.path().join("absent.json"));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.max_points, 500);
        assert_eq!(config.channels.len(), 17);
    }

    #[test]
    fn save_then_load_through_nested_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("edgescope").join("config.json");

        let mut config = AppConfig {
            remembered_username: Some("operator.one".to_owned()),
            default_view: ViewMode::Graph,
            ..AppConfig::default()
        };
        config
            .channel_aliases
            .insert("t_ch0".to_owned(), "inlet_temp".to_owned());

        config.save(&path).expect("save");
        assert_eq!(AppConfig::load(&path), config);
    }

    #[test]
    fn partial_file_fills_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "api_url": "http://localhost:9000" }"#).expect("write");

        let config = AppConfig::load(&path);
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.max_points, DEFAULT_MAX_POINTS);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write");

        assert_eq!(AppConfig::load(&path), AppConfig::default());
    }

    #[test]
    fn alias_falls_back_to_channel_name() {
        let mut config = AppConfig::default();
        config
            .channel_aliases
            .insert("v_ch1".to_owned(), "bus_voltage".to_owned());
        assert_eq!(config.alias("v_ch1"), "bus_voltage");
        assert_eq!(config.alias("v_ch2"), "v_ch2");
    }
}
