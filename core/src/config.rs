use crate::error::{Result, VolumeError};
use crate::queries::{QueryConfig, QueryOverrides, SqlDialect};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default root for derived mountpoints
pub const DEFAULT_MOUNT_ROOT: &str = "/etc/docker/mounts";

/// Default SQLite data directory (relative to the working directory)
pub const DEFAULT_SQLITE_DIR: &str = "sqlite.db";

/// File name of the SQLite database inside its data directory
pub const SQLITE_FILE_NAME: &str = "db";

/// Volume database backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Ephemeral in-process maps (testing only)
    InMemory,
    /// Transactional SQLite database
    #[default]
    Sqlite,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory => write!(f, "in-memory"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "in-memory" => Ok(Self::InMemory),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(format!(
                "unsupported database: '{}' (supported: sqlite, in-memory)",
                s
            )),
        }
    }
}

/// Construction-time configuration of a volume database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend to construct
    #[serde(default)]
    pub backend: BackendKind,

    /// SQLite data directory; the database file is `<db_path>/db`
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Keep the SQLite database in memory instead of on disk
    #[serde(default)]
    pub in_memory_db: bool,

    /// Root directory under which default mountpoints are derived
    #[serde(default = "default_mount_root")]
    pub mount_root: PathBuf,

    /// SQL statement preset
    #[serde(default)]
    pub dialect: SqlDialect,

    /// Per-statement overrides applied on top of the preset
    #[serde(default)]
    pub queries: QueryOverrides,
}

fn default_mount_root() -> PathBuf {
    PathBuf::from(DEFAULT_MOUNT_ROOT)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            db_path: None,
            in_memory_db: false,
            mount_root: default_mount_root(),
            dialect: SqlDialect::Sqlite,
            queries: QueryOverrides::default(),
        }
    }
}

impl StoreConfig {
    /// Configuration for the transient backend
    pub fn in_memory() -> Self {
        Self {
            backend: BackendKind::InMemory,
            ..Self::default()
        }
    }

    /// Configuration for a SQLite database stored under `db_path`
    pub fn sqlite(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(db_path.into()),
            ..Self::default()
        }
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            VolumeError::InvalidArgument(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: StoreConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the selected backend cannot honour
    pub fn validate(&self) -> Result<()> {
        if !self.mount_root.is_absolute() {
            return Err(VolumeError::InvalidArgument(format!(
                "mount_root must be an absolute path, got '{}'",
                self.mount_root.display()
            )));
        }

        match self.backend {
            BackendKind::InMemory => {
                let mut unsupported = Vec::new();
                if self.db_path.is_some() {
                    unsupported.push("db_path");
                }
                if self.in_memory_db {
                    unsupported.push("in_memory_db");
                }
                if self.dialect != SqlDialect::Sqlite {
                    unsupported.push("dialect");
                }
                if !self.queries.is_empty() {
                    unsupported.push("queries");
                }
                if !unsupported.is_empty() {
                    return Err(VolumeError::InvalidArgument(format!(
                        "backend '{}' does not support: {}",
                        self.backend,
                        unsupported.join(", ")
                    )));
                }
            }
            // The linked engine only speaks the SQLite statement preset.
            BackendKind::Sqlite if self.dialect != SqlDialect::Sqlite => {
                return Err(VolumeError::InvalidArgument(format!(
                    "backend '{}' cannot run the '{}' statement preset",
                    self.backend, self.dialect
                )));
            }
            BackendKind::Sqlite => {}
        }

        Ok(())
    }

    /// SQLite database file derived from `db_path`
    pub fn sqlite_file(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_DIR))
            .join(SQLITE_FILE_NAME)
    }

    /// Effective statement bundle: dialect preset merged with overrides
    pub fn query_config(&self) -> QueryConfig {
        QueryConfig::resolve(self.dialect, &self.queries)
    }
}
