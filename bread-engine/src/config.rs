// SPDX-License-Identifier: GPL-3.0-only

use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use bread_types::RetentionConfig;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::layout::Layout;

pub const CONFIG_FILE: &str = "/etc/bread.json";

/// Persisted bread configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Block device backing `/`
    pub device: String,
    pub retention: RetentionConfig,
    /// Where the top-level subvolume is mounted, when not the default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<PathBuf>,
}

impl Config {
    pub fn new(device: impl Into<String>, retention: RetentionConfig) -> Self {
        Self {
            device: device.into(),
            retention,
            mount_point: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EngineError::ConfigMissing(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents).map_err(|source| EngineError::ConfigInvalid {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n")?;
        fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    pub fn layout(&self) -> Layout {
        self.mount_point
            .as_ref()
            .map(Layout::new)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_config_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load(&dir.path().join("bread.json")).expect_err("no config");

        assert!(matches!(err, EngineError::ConfigMissing(_)));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bread.json");
        let config = Config::new("/dev/vda3", RetentionConfig::new(24, 7, 4, 6));

        config.save(&path).expect("save config");
        let loaded = Config::load(&path).expect("load config");

        assert_eq!(loaded, config);
        assert_eq!(loaded.layout(), Layout::default());
        let mode = fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn reads_file_without_mount_point() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bread.json");
        fs::write(
            &path,
            r#"{"device": "/dev/sda2", "retention": {"hourly": 1, "daily": 2, "weekly": 3, "monthly": 4}}"#,
        )
        .expect("write config");

        let config = Config::load(&path).expect("load config");
        assert_eq!(config.retention, RetentionConfig::new(1, 2, 3, 4));
        assert_eq!(config.mount_point, None);
    }

    #[test]
    fn garbage_is_config_invalid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bread.json");
        fs::write(&path, "{not json").expect("write config");

        let err = Config::load(&path).expect_err("invalid config");
        assert!(matches!(err, EngineError::ConfigInvalid { .. }));
    }
}
