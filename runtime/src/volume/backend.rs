//! Backend selection.

use super::memory::InMemoryVolumeDatabase;
use super::sql::SqlVolumeDatabase;
use std::collections::HashMap;
use volmeta_core::error::Result;
use volmeta_core::volume::{MountReferences, Volume};
use volmeta_core::{BackendKind, StoreConfig, VolumeDatabase};

/// One of the supported volume database backends, chosen at construction.
#[derive(Debug)]
pub enum VolumeBackend {
    Transient(InMemoryVolumeDatabase),
    Relational(SqlVolumeDatabase),
}

impl VolumeBackend {
    /// Build the backend named by `config`. The result is not yet connected.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(backend = %config.backend, "Building volume database");

        let backend = match config.backend {
            BackendKind::InMemory => {
                Self::Transient(InMemoryVolumeDatabase::new(config.mount_root.clone()))
            }
            BackendKind::Sqlite => Self::Relational(SqlVolumeDatabase::from_config(config)),
        };
        Ok(backend)
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Transient(_) => BackendKind::InMemory,
            Self::Relational(_) => BackendKind::Sqlite,
        }
    }

    fn inner(&self) -> &dyn VolumeDatabase {
        match self {
            Self::Transient(db) => db,
            Self::Relational(db) => db,
        }
    }
}

impl VolumeDatabase for VolumeBackend {
    fn connect(&self) -> Result<()> {
        self.inner().connect()
    }

    fn disconnect(&self) -> Result<()> {
        self.inner().disconnect()
    }

    fn create(&self, name: &str, options: &HashMap<String, String>) -> Result<()> {
        self.inner().create(name, options)
    }

    fn list(&self) -> Result<Vec<Volume>> {
        self.inner().list()
    }

    fn get(&self, name: &str) -> Result<Volume> {
        self.inner().get(name)
    }

    fn path(&self, name: &str) -> Result<String> {
        self.inner().path(name)
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.inner().remove(name)
    }

    fn mount(&self, name: &str, requester: &str) -> Result<String> {
        self.inner().mount(name, requester)
    }

    fn unmount(&self, name: &str, requester: &str) -> Result<()> {
        self.inner().unmount(name, requester)
    }

    fn mount_references(&self, name: &str) -> Result<MountReferences> {
        self.inner().mount_references(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use volmeta_core::ErrorKind;

    #[test]
    fn test_from_config_selects_backend() {
        let transient = VolumeBackend::from_config(&StoreConfig::in_memory()).unwrap();
        assert_eq!(transient.kind(), BackendKind::InMemory);

        let relational = VolumeBackend::from_config(&StoreConfig::sqlite("/tmp/volmeta")).unwrap();
        assert_eq!(relational.kind(), BackendKind::Sqlite);
        assert!(matches!(relational, VolumeBackend::Relational(_)));
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = StoreConfig {
            db_path: Some(PathBuf::from("/tmp/volmeta")),
            ..StoreConfig::in_memory()
        };
        let err = VolumeBackend::from_config(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_delegates_to_inner() {
        let config = StoreConfig {
            in_memory_db: true,
            ..StoreConfig::default()
        };
        let db = VolumeBackend::from_config(&config).unwrap();
        assert_eq!(db.list().unwrap_err().kind(), ErrorKind::Unavailable);

        db.connect().unwrap();
        db.create("vol", &HashMap::new()).unwrap();
        assert_eq!(db.mount("vol", "a").unwrap(), "/etc/docker/mounts/vol");
        assert_eq!(db.path("vol").unwrap(), "/etc/docker/mounts/vol");
        db.disconnect().unwrap();
    }
}
