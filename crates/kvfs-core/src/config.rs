use std::path::{Path, PathBuf};

use kvfs_store::SyncMode;
use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};

/// Filesystem configuration, loaded from TOML.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Directory holding the durable log.
    pub data_dir: PathBuf,
    /// File name of the durable log inside `data_dir`.
    pub log_file: String,
    pub sync: SyncMode,
    /// Fail create/mkdir/rename with `EEXIST` when the parent already holds
    /// an entry of the same name.
    pub reject_duplicate_names: bool,
    /// Only the superuser may give a file away; an owner may change the
    /// group but must keep the uid.
    pub restrict_chown: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            log_file: "kvfs.log".to_string(),
            sync: SyncMode::EveryWrite,
            reject_duplicate_names: true,
            restrict_chown: true,
        }
    }
}

impl FsConfig {
    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> FsResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FsError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> FsResult<Self> {
        toml::from_str(text).map_err(|e| FsError::Config(e.to_string()))
    }

    /// Full path of the durable log.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = FsConfig::default();
        assert_eq!(c.log_path(), PathBuf::from("./kvfs.log"));
        assert_eq!(c.sync, SyncMode::EveryWrite);
        assert!(c.reject_duplicate_names);
        assert!(c.restrict_chown);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(FsConfig::from_toml_str("").unwrap(), FsConfig::default());
    }

    #[test]
    fn partial_toml_overrides() {
        let c = FsConfig::from_toml_str(
            r#"
            data_dir = "/var/lib/kvfs"
            sync = "os_default"
            restrict_chown = false
            "#,
        )
        .unwrap();
        assert_eq!(c.log_path(), PathBuf::from("/var/lib/kvfs/kvfs.log"));
        assert_eq!(c.sync, SyncMode::OsDefault);
        assert!(!c.restrict_chown);
        assert!(c.reject_duplicate_names);
    }

    #[test]
    fn bad_toml_is_config_error() {
        assert!(matches!(
            FsConfig::from_toml_str("sync = \"sometimes\""),
            Err(FsError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kvfs.toml");
        std::fs::write(&path, "log_file = \"tree.log\"\n").unwrap();
        let c = FsConfig::load(&path).unwrap();
        assert_eq!(c.log_file, "tree.log");
        assert!(FsConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
