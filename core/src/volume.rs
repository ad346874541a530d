//! Volume records and per-volume mount reference tables.
//!
//! A [`Volume`] is the persisted unit tracked by a volume database. Each
//! volume owns a [`MountReferences`] table counting how many outstanding
//! mount requests every requester holds against it.

use crate::error::{Result, VolumeError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A named volume as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume name (unique, immutable after creation).
    pub name: String,

    /// Host path the volume is attached to; empty while nobody mounts it.
    #[serde(default)]
    pub mountpoint: String,

    /// Opaque status passed through to the protocol layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

impl Volume {
    /// Create a volume record that is not mounted.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mountpoint: String::new(),
            status: None,
        }
    }

    /// Whether a mountpoint is currently assigned.
    pub fn is_mounted(&self) -> bool {
        !self.mountpoint.is_empty()
    }
}

/// Requester id → active mount count for a single volume.
///
/// A requester that is absent from the table holds zero references; entries
/// are removed as soon as their count reaches zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountReferences {
    counts: HashMap<String, u32>,
}

impl MountReferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active count held by `requester` (0 when absent).
    pub fn count(&self, requester: &str) -> u32 {
        self.counts.get(requester).copied().unwrap_or(0)
    }

    /// Whether `requester` holds at least one reference.
    pub fn contains(&self, requester: &str) -> bool {
        self.count(requester) > 0
    }

    /// Sum of all counts; a volume may only be removed when this is 0.
    pub fn total(&self) -> u64 {
        self.counts.values().map(|&c| u64::from(c)).sum()
    }

    /// Number of distinct requesters holding references.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Record one more mount by `requester`. Returns the new count.
    pub fn acquire(&mut self, requester: &str) -> u32 {
        let count = self.counts.entry(requester.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop one mount held by `requester`.
    ///
    /// Returns the remaining count, or `None` when the requester held no
    /// reference (the table is left untouched in that case).
    pub fn release(&mut self, requester: &str) -> Option<u32> {
        let count = self.counts.get_mut(requester)?;
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.counts.remove(requester);
        }
        Some(remaining)
    }

    /// Fold a stored `(requester, count)` row into the table.
    ///
    /// Rows with a zero count are ignored and repeated requesters are summed.
    pub fn accumulate(&mut self, requester: &str, count: u32) {
        if count == 0 {
            return;
        }
        *self.counts.entry(requester.to_string()).or_insert(0) += count;
    }

    /// Iterate over `(requester, count)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(id, &count)| (id.as_str(), count))
    }
}

/// Check that `name` can be used as a volume name.
///
/// Names become the last component of the default mountpoint, so anything
/// that would escape the mount root is rejected.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VolumeError::InvalidArgument(
            "volume name cannot be empty".to_string(),
        ));
    }
    if name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(VolumeError::InvalidArgument(format!(
            "volume name '{}' is not a valid path component",
            name.escape_debug()
        )));
    }
    Ok(())
}

/// Deterministic default mountpoint for `name` under `mount_root`.
pub fn default_mountpoint(mount_root: &Path, name: &str) -> String {
    mount_root.join(name).to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_new() {
        let vol = Volume::new("mydata");
        assert_eq!(vol.name, "mydata");
        assert_eq!(vol.mountpoint, "");
        assert!(vol.status.is_none());
        assert!(!vol.is_mounted());
    }

    #[test]
    fn test_volume_serialization() {
        let mut vol = Volume::new("mydata");
        vol.mountpoint = "/etc/docker/mounts/mydata".to_string();

        let json = serde_json::to_string(&vol).unwrap();
        assert!(!json.contains("status"));

        let parsed: Volume = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vol);
    }

    #[test]
    fn test_volume_default_mountpoint_field() {
        let vol: Volume = serde_json::from_str(r#"{"name":"test"}"#).unwrap();
        assert_eq!(vol.mountpoint, "");
    }

    #[test]
    fn test_references_acquire_release() {
        let mut refs = MountReferences::new();
        assert_eq!(refs.acquire("a"), 1);
        assert_eq!(refs.acquire("a"), 2);
        assert_eq!(refs.acquire("b"), 1);
        assert_eq!(refs.total(), 3);
        assert_eq!(refs.len(), 2);

        assert_eq!(refs.release("a"), Some(1));
        assert_eq!(refs.release("a"), Some(0));
        assert!(!refs.contains("a"));
        assert_eq!(refs.len(), 1);
        assert_eq!(refs.total(), 1);
    }

    #[test]
    fn test_references_release_unknown() {
        let mut refs = MountReferences::new();
        refs.acquire("a");
        assert_eq!(refs.release("b"), None);
        assert_eq!(refs.count("a"), 1);
    }

    #[test]
    fn test_references_accumulate() {
        let mut refs = MountReferences::new();
        refs.accumulate("a", 2);
        refs.accumulate("a", 3);
        refs.accumulate("b", 0);
        assert_eq!(refs.count("a"), 5);
        assert!(!refs.contains("b"));
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn test_references_empty() {
        let refs = MountReferences::new();
        assert!(refs.is_empty());
        assert_eq!(refs.total(), 0);
        assert_eq!(refs.count("nobody"), 0);
        assert_eq!(refs.iter().count(), 0);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("mydata").is_ok());
        assert!(validate_name("my-data_1.0").is_ok());

        for bad in ["", ".", "..", "a/b", "/abs", "nul\0byte"] {
            let err = validate_name(bad).unwrap_err();
            assert!(matches!(err, VolumeError::InvalidArgument(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_validate_name_empty_message() {
        let err = validate_name("").unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: volume name cannot be empty");
    }

    #[test]
    fn test_default_mountpoint() {
        let root = Path::new("/etc/docker/mounts");
        assert_eq!(default_mountpoint(root, "vol"), "/etc/docker/mounts/vol");
        assert_eq!(
            default_mountpoint(root, "vol"),
            default_mountpoint(root, "vol")
        );
    }
}
