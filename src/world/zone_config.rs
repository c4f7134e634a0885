use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::world::vector::Vector3;

#[derive(Debug, thiserror::Error)]
pub enum ZoneConfigError {
    #[error("no configuration for zone '{zone}'")]
    MissingConfiguration { zone: String },
    #[error("read {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path} failed: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortalConfig {
    pub name: String,
    pub target_zone: String,
    pub position: Vector3,
    #[serde(default = "default_portal_extent")]
    pub width: u16,
    #[serde(default = "default_portal_extent")]
    pub height: u16,
}

fn default_portal_extent() -> u16 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NpcConfig {
    pub name: String,
    #[serde(default)]
    pub level: u32,
    pub position: Vector3,
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZoneConfig {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub max_players: Option<usize>,
    #[serde(default)]
    pub spawn_point: Vector3,
    #[serde(default)]
    pub portals: Vec<PortalConfig>,
    #[serde(default)]
    pub npcs: Vec<NpcConfig>,
}

/// Walkability grid. Cells are opaque to the server core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PathMap {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub cells: Vec<u8>,
}

/// Source of zone data. Lookups are by lower-cased zone name.
pub trait WorldData: Send + Sync {
    fn zone_config(&self, zone: &str) -> Result<ZoneConfig, ZoneConfigError>;
    fn path_map(&self, zone: &str) -> Result<Option<PathMap>, ZoneConfigError>;
}

/// `<root>/zones/<name>.yaml` and `<root>/pathmaps/<name>.yaml`.
#[derive(Debug, Clone)]
pub struct FileWorldData {
    root: PathBuf,
}

impl FileWorldData {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn zone_path(&self, zone: &str) -> PathBuf {
        self.root
            .join("zones")
            .join(format!("{}.yaml", zone.to_ascii_lowercase()))
    }

    fn path_map_path(&self, zone: &str) -> PathBuf {
        self.root
            .join("pathmaps")
            .join(format!("{}.yaml", zone.to_ascii_lowercase()))
    }
}

impl WorldData for FileWorldData {
    fn zone_config(&self, zone: &str) -> Result<ZoneConfig, ZoneConfigError> {
        let path = self.zone_path(zone);
        let Some(content) = read_optional(&path)? else {
            return Err(ZoneConfigError::MissingConfiguration {
                zone: zone.to_string(),
            });
        };
        serde_yaml::from_str(&content).map_err(|source| ZoneConfigError::Yaml { path, source })
    }

    fn path_map(&self, zone: &str) -> Result<Option<PathMap>, ZoneConfigError> {
        let path = self.path_map_path(zone);
        let Some(content) = read_optional(&path)? else {
            return Ok(None);
        };
        serde_yaml::from_str(&content)
            .map(Some)
            .map_err(|source| ZoneConfigError::Yaml { path, source })
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ZoneConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ZoneConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
