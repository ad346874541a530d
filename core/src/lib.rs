//! Volmeta Core - Volume Metadata Types and Abstractions
//!
//! This module provides the volume record, mount reference table, error
//! taxonomy, SQL statement bundles and the `VolumeDatabase` contract shared
//! by every volume database backend.

pub mod config;
pub mod database;
pub mod error;
pub mod queries;
pub mod volume;

// Re-export commonly used types
pub use config::{BackendKind, StoreConfig};
pub use database::VolumeDatabase;
pub use error::{ErrorKind, Result, VolumeError};
pub use queries::{QueryConfig, QueryOverrides, SqlDialect};
pub use volume::{default_mountpoint, validate_name, MountReferences, Volume};

/// Volmeta version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
