//! Volmeta Runtime - Volume database backends.
//!
//! This module provides the concrete `VolumeDatabase` implementations: an
//! ephemeral in-memory store for tests and a transactional SQLite store.

pub mod volume;

// Re-export common types
pub use volmeta_core::{
    BackendKind, ErrorKind, MountReferences, QueryConfig, QueryOverrides, Result, SqlDialect,
    StoreConfig, Volume, VolumeDatabase, VolumeError,
};
pub use volume::{InMemoryVolumeDatabase, SqlVolumeDatabase, SqliteTarget, VolumeBackend};

/// Volmeta Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Open the volume database described by `config` and connect it.
pub fn open(config: &StoreConfig) -> Result<VolumeBackend> {
    let db = VolumeBackend::from_config(config)?;
    db.connect()?;
    Ok(db)
}
