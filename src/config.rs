use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::net::frame::DEFAULT_MAX_FRAME;
use crate::telemetry::logging::LogConfig;

pub const CONFIG_ENV: &str = "RUNNERS_CONFIG";
pub const GAME_ADDR_ENV: &str = "RUNNERS_GAME_ADDR";
pub const LOG_LEVEL_ENV: &str = "RUNNERS_LOG_LEVEL";
const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub game_bind_addr: String,
    pub max_frame: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            game_bind_addr: "0.0.0.0:2603".to_string(),
            max_frame: DEFAULT_MAX_FRAME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub default_zone: String,
    pub zones: Vec<String>,
    pub data_dir: PathBuf,
    pub tick_millis: u64,
    pub protocol_version: u8,
    pub logging: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            default_zone: "town".to_string(),
            zones: vec!["town".to_string()],
            data_dir: PathBuf::from("data"),
            tick_millis: 33,
            protocol_version: 0x2d,
            logging: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// `runners [config.yaml]`; falls back to `$RUNNERS_CONFIG`, then
    /// `config.yaml` in the working directory.
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let path = args
            .get(1)
            .map(PathBuf::from)
            .or_else(|| env_value(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Self::load(&path)?;
        config.apply_overrides(env_value(GAME_ADDR_ENV), env_value(LOG_LEVEL_ENV));
        Ok(config)
    }

    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // Logging is not up yet at this point.
                eprintln!(
                    "runners: config {} not found, using defaults",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(err) => return Err(format!("read {} failed: {}", path.display(), err)),
        };
        Self::parse(&content).map_err(|err| format!("parse {} failed: {}", path.display(), err))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yaml::from_str(content).map_err(|err| err.to_string())?;
        if config.zones.is_empty() {
            config.zones.push(config.default_zone.clone());
        }
        if config.tick_millis == 0 {
            return Err("tick_millis must be positive".to_string());
        }
        Ok(config)
    }

    fn apply_overrides(&mut self, game_addr: Option<String>, log_level: Option<String>) {
        if let Some(addr) = game_addr {
            self.network.game_bind_addr = addr;
        }
        if let Some(level) = log_level {
            self.logging.level = level;
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.network.game_bind_addr, "0.0.0.0:2603");
        assert_eq!(config.protocol_version, 0x2d);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "network:\n  game_bind_addr: 127.0.0.1:9000\nzones: [town, dungeon00]\nlogging:\n  level: debug\n  log_hashes: true\n",
        )
        .unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.network.game_bind_addr, "127.0.0.1:9000");
        assert_eq!(config.network.max_frame, DEFAULT_MAX_FRAME);
        assert_eq!(config.zones, vec!["town", "dungeon00"]);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.switches.log_hashes);
        assert!(!config.logging.switches.log_ids);
        assert_eq!(config.tick_millis, 33);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "tick_millis: [not, a, number]\n").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn zero_tick_is_rejected() {
        assert!(AppConfig::parse("tick_millis: 0\n").is_err());
    }

    #[test]
    fn empty_zone_list_falls_back_to_default_zone() {
        let config = AppConfig::parse("default_zone: hub\nzones: []\n").unwrap();
        assert_eq!(config.zones, vec!["hub"]);
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some("127.0.0.1:1".to_string()), Some("trace".to_string()));
        assert_eq!(config.network.game_bind_addr, "127.0.0.1:1");
        assert_eq!(config.logging.level, "trace");
    }
}
