//! The volume database contract.
//!
//! Every backend tracks named volumes and reference-counts mount requests
//! per requester id, and must present identical lifecycle semantics.

use crate::error::Result;
use crate::volume::{MountReferences, Volume};
use std::collections::HashMap;

/// A connection to something that keeps track of volumes and mounts.
///
/// All operations other than [`connect`](VolumeDatabase::connect) fail with
/// [`VolumeError::Unavailable`](crate::error::VolumeError::Unavailable) while
/// the database is not connected.
pub trait VolumeDatabase: Send + Sync {
    /// Acquire backend resources and create the schema if needed.
    ///
    /// Idempotent: connecting an already connected database re-runs schema
    /// creation and succeeds.
    fn connect(&self) -> Result<()>;

    /// Release backend resources. Fails if the database is not connected.
    fn disconnect(&self) -> Result<()>;

    /// Create an unmounted volume.
    ///
    /// `options` are accepted for the protocol layer but not persisted.
    fn create(&self, name: &str, options: &HashMap<String, String>) -> Result<()>;

    /// All known volumes, in no particular order.
    fn list(&self) -> Result<Vec<Volume>>;

    /// A single volume by name.
    fn get(&self, name: &str) -> Result<Volume>;

    /// Current mountpoint of a volume (empty when unmounted).
    fn path(&self, name: &str) -> Result<String> {
        Ok(self.get(name)?.mountpoint)
    }

    /// Delete a volume and its mount references.
    ///
    /// Fails with `Conflict` while any requester holds a reference.
    fn remove(&self, name: &str) -> Result<()>;

    /// Record a mount of `name` by `requester` and return the mountpoint.
    ///
    /// The first mount of an unmounted volume assigns its default mountpoint.
    fn mount(&self, name: &str, requester: &str) -> Result<String>;

    /// Release one mount of `name` held by `requester`.
    ///
    /// Fails with `Conflict` when `requester` holds no reference. When the
    /// requester's count drops to zero the volume's mountpoint is cleared,
    /// regardless of references still held by other requesters.
    fn unmount(&self, name: &str, requester: &str) -> Result<()>;

    /// Active mount counts per requester for `name`.
    fn mount_references(&self, name: &str) -> Result<MountReferences>;
}
