//! Ephemeral in-process volume database.
//!
//! Volumes and mount references live in two maps behind one mutex. Nothing is
//! persisted and there is no rollback: every operation validates first and
//! then applies its single mutation. Intended for tests only.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use volmeta_core::error::{Result, VolumeError};
use volmeta_core::volume::{default_mountpoint, validate_name, MountReferences, Volume};
use volmeta_core::VolumeDatabase;

const WARNING: &str = "
********************************************************************************
*                                                                              *
*                                WARNING!!!                                    *
*              DO NOT USE the in-memory volume database IN PRODUCTION!         *
*                                                                              *
*        It is completely ephemeral and should only be used for testing.       *
*        When the process stops, all volume metadata will be lost. Data        *
*        written to the volumes themselves is still available on the host.     *
*                                                                              *
********************************************************************************";

/// Volume database kept entirely in memory.
#[derive(Debug)]
pub struct InMemoryVolumeDatabase {
    /// Root under which default mountpoints are derived.
    mount_root: PathBuf,
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    connected: bool,
    volumes: HashMap<String, Volume>,
    mounts: HashMap<String, MountReferences>,
}

impl MemoryState {
    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(VolumeError::not_connected())
        }
    }

    fn volume_mut(&mut self, name: &str) -> Result<&mut Volume> {
        self.volumes
            .get_mut(name)
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))
    }
}

impl InMemoryVolumeDatabase {
    /// Create an empty, disconnected database.
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        tracing::warn!("{}", WARNING);
        Self {
            mount_root: mount_root.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn mount_root(&self) -> &std::path::Path {
        &self.mount_root
    }
}

impl VolumeDatabase for InMemoryVolumeDatabase {
    fn connect(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.connected = true;
        tracing::info!("Connected to in-memory volume database");
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_connected()?;
        state.connected = false;
        tracing::info!("Disconnected from in-memory volume database");
        Ok(())
    }

    fn create(&self, name: &str, options: &HashMap<String, String>) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_connected()?;
        validate_name(name)?;

        if state.volumes.contains_key(name) {
            return Err(VolumeError::AlreadyExists(name.to_string()));
        }

        tracing::debug!(volume = %name, options = ?options, "Creating volume");
        state.volumes.insert(name.to_string(), Volume::new(name));
        Ok(())
    }

    fn list(&self) -> Result<Vec<Volume>> {
        let state = self.state.lock();
        state.ensure_connected()?;
        Ok(state.volumes.values().cloned().collect())
    }

    fn get(&self, name: &str) -> Result<Volume> {
        let state = self.state.lock();
        state.ensure_connected()?;
        state
            .volumes
            .get(name)
            .cloned()
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_connected()?;

        if !state.volumes.contains_key(name) {
            return Err(VolumeError::NotFound(name.to_string()));
        }

        let active = state.mounts.get(name).map_or(0, MountReferences::total);
        if active > 0 {
            return Err(VolumeError::Conflict(format!(
                "volume '{}' cannot be removed as it still has {} active mount request(s)",
                name, active
            )));
        }

        state.volumes.remove(name);
        state.mounts.remove(name);
        tracing::info!(volume = %name, "Removed volume");
        Ok(())
    }

    fn mount(&self, name: &str, requester: &str) -> Result<String> {
        let mut state = self.state.lock();
        state.ensure_connected()?;

        let default = default_mountpoint(&self.mount_root, name);
        let volume = state.volume_mut(name)?;
        if !volume.is_mounted() {
            volume.mountpoint = default;
        }
        let mountpoint = volume.mountpoint.clone();

        let count = state
            .mounts
            .entry(name.to_string())
            .or_default()
            .acquire(requester);

        tracing::debug!(
            volume = %name,
            requester = %requester,
            count,
            mountpoint = %mountpoint,
            "Mounted volume"
        );
        Ok(mountpoint)
    }

    fn unmount(&self, name: &str, requester: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.ensure_connected()?;
        state.volume_mut(name)?;

        let remaining = state
            .mounts
            .get_mut(name)
            .and_then(|refs| refs.release(requester))
            .ok_or_else(|| {
                VolumeError::Conflict(format!(
                    "volume '{}' is not mounted by '{}'",
                    name, requester
                ))
            })?;

        if remaining == 0 {
            // Cleared even if other requesters still hold the volume.
            state.volume_mut(name)?.mountpoint.clear();
            if state.mounts.get(name).is_some_and(MountReferences::is_empty) {
                state.mounts.remove(name);
            }
        }

        tracing::debug!(
            volume = %name,
            requester = %requester,
            count = remaining,
            "Unmounted volume"
        );
        Ok(())
    }

    fn mount_references(&self, name: &str) -> Result<MountReferences> {
        let state = self.state.lock();
        state.ensure_connected()?;
        if !state.volumes.contains_key(name) {
            return Err(VolumeError::NotFound(name.to_string()));
        }
        Ok(state.mounts.get(name).cloned().unwrap_or_default())
    }
}
