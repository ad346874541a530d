//! Volume database backends.
//!
//! Provides `InMemoryVolumeDatabase` for tests, `SqlVolumeDatabase` for
//! transactional persistence, and `VolumeBackend` to pick one from a
//! `StoreConfig`.

mod backend;
mod memory;
mod sql;

pub use backend::VolumeBackend;
pub use memory::InMemoryVolumeDatabase;
pub use sql::{SqlVolumeDatabase, SqliteTarget};
