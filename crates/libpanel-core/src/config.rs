//! Configuration for libpanel
//!
//! Storage location, listen address, search paging limits, and the folders
//! and dashboards seeded into the in-memory registries.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dashboard::InMemoryDashboards;
use crate::folder::{Folder, InMemoryFolders, GENERAL_FOLDER_ID};

/// System-wide configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibPanelConfig {
    /// SQLite settings
    pub database: DatabaseConfig,
    /// HTTP server settings
    pub server: ServerConfig,
    /// Library element listing limits
    pub search: SearchConfig,
    /// Folders known to the standalone server
    pub folders: Vec<FolderConfig>,
    /// Dashboards the standalone server accepts connections for
    pub dashboards: Vec<DashboardConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; in-memory when absent
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size when the query gives none
    pub default_per_page: usize,
    /// Upper bound on any requested page size
    pub max_per_page: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_per_page: 100,
            max_per_page: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderConfig {
    pub org_id: i64,
    pub id: i64,
    pub uid: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub org_id: i64,
    pub id: i64,
}

impl LibPanelConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config dir>/libpanel/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("libpanel").join("config.toml"))
    }

    /// Read and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.default_per_page == 0 || self.search.max_per_page == 0 {
            return Err(ConfigError::OutOfRange(
                "search page sizes must be positive".to_string(),
            ));
        }
        if self.search.default_per_page > self.search.max_per_page {
            return Err(ConfigError::OutOfRange(
                "default_per_page must not exceed max_per_page".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        let mut uids = HashSet::new();
        for folder in &self.folders {
            if folder.id == GENERAL_FOLDER_ID {
                return Err(ConfigError::InvalidFolder(format!(
                    "folder {:?} uses id 0, which is reserved for General",
                    folder.title
                )));
            }
            if !ids.insert((folder.org_id, folder.id)) {
                return Err(ConfigError::InvalidFolder(format!(
                    "duplicate folder id {} in org {}",
                    folder.id, folder.org_id
                )));
            }
            if !uids.insert((folder.org_id, folder.uid.as_str())) {
                return Err(ConfigError::InvalidFolder(format!(
                    "duplicate folder uid {:?} in org {}",
                    folder.uid, folder.org_id
                )));
            }
        }

        Ok(())
    }

    /// Folder registry seeded from `folders`.
    pub fn folder_registry(&self) -> InMemoryFolders {
        let registry = InMemoryFolders::new();
        for folder in &self.folders {
            registry.insert(
                folder.org_id,
                Folder {
                    id: folder.id,
                    uid: folder.uid.clone(),
                    title: folder.title.clone(),
                },
            );
        }
        registry
    }

    /// Dashboard registry seeded from `dashboards`.
    pub fn dashboard_registry(&self) -> InMemoryDashboards {
        let registry = InMemoryDashboards::new();
        for dashboard in &self.dashboards {
            registry.insert(dashboard.org_id, dashboard.id);
        }
        registry
    }
}

/// Configuration loading or validation error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid folder: {0}")]
    InvalidFolder(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::DashboardLookup;
    use crate::folder::FolderAccess;

    #[test]
    fn test_default_config() {
        let config = LibPanelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.addr, "127.0.0.1:8080");
        assert_eq!(config.search.default_per_page, 100);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = LibPanelConfig::from_toml(
            r#"
            [database]
            path = "/var/lib/libpanel/elements.db"

            [[folders]]
            org_id = 1
            id = 1
            uid = "scenario-folder"
            title = "ScenarioFolder"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.database.path,
            Some(PathBuf::from("/var/lib/libpanel/elements.db"))
        );
        assert_eq!(config.search.max_per_page, 1000);
        assert_eq!(config.folders.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = LibPanelConfig::default();
        config.server.addr = "0.0.0.0:3000".to_string();
        let parsed = LibPanelConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_json_serialization() {
        let config = LibPanelConfig::default();
        let json = config.to_json().unwrap();
        let parsed = LibPanelConfig::from_json(&json).unwrap();
        assert_eq!(parsed.search, config.search);
    }

    #[test]
    fn test_invalid_paging() {
        let mut config = LibPanelConfig::default();
        config.search.default_per_page = 0;
        assert!(matches!(config.validate(), Err(ConfigError::OutOfRange(_))));

        let mut config = LibPanelConfig::default();
        config.search.default_per_page = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reserved_and_duplicate_folders() {
        let folder = |id: i64, uid: &str| FolderConfig {
            org_id: 1,
            id,
            uid: uid.to_string(),
            title: uid.to_string(),
        };

        let mut config = LibPanelConfig::default();
        config.folders = vec![folder(0, "general")];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidFolder(_))));

        config.folders = vec![folder(1, "a"), folder(1, "b")];
        assert!(config.validate().is_err());

        config.folders = vec![folder(1, "a"), folder(2, "a")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_folder_registry() {
        let mut config = LibPanelConfig::default();
        config.folders.push(FolderConfig {
            org_id: 1,
            id: 3,
            uid: "ops".to_string(),
            title: "Ops".to_string(),
        });
        let registry = config.folder_registry();
        assert_eq!(registry.folder(1, 3).unwrap().title, "Ops");
        assert!(registry.folder(2, 3).is_none());
    }

    #[test]
    fn test_dashboard_registry() {
        let config = LibPanelConfig::from_toml(
            r#"
            [[dashboards]]
            org_id = 1
            id = 10

            [[dashboards]]
            org_id = 2
            id = 11
            "#,
        )
        .unwrap();
        let registry = config.dashboard_registry();
        assert!(registry.dashboard_exists(1, 10));
        assert!(registry.dashboard_exists(2, 11));
        assert!(!registry.dashboard_exists(1, 11));
    }

    #[test]
    fn test_load_missing_file() {
        let err = LibPanelConfig::load("/nonexistent/libpanel.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
