//! Transactional relational volume database.
//!
//! Volumes and mount references are kept in two tables (`volumes`, `mounts`)
//! accessed exclusively through the statements of a [`QueryConfig`]. Every
//! mutation runs inside a single transaction that is rolled back on the first
//! failing statement, and the failure is returned unmodified.
//!
//! The connection handle is owned by the database instance and guarded by a
//! mutex held for the whole operation, so operations never interleave.

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use volmeta_core::error::{Result, VolumeError};
use volmeta_core::volume::{default_mountpoint, validate_name, MountReferences, Volume};
use volmeta_core::{QueryConfig, StoreConfig, VolumeDatabase};

/// How long a statement waits on a locked database file before failing.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    /// Database file on disk; parent directories are created on connect.
    File(PathBuf),
    /// Private in-memory database, discarded on disconnect.
    Memory,
}

impl SqliteTarget {
    fn open(&self) -> Result<Connection> {
        let conn = match self {
            Self::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        VolumeError::Unavailable(format!(
                            "failed to create directory {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
                Connection::open(path)
            }
            Self::Memory => Connection::open_in_memory(),
        }
        .map_err(|e| {
            VolumeError::Unavailable(format!("failed to open database {}: {}", self, e))
        })?;

        conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
            .map_err(VolumeError::internal)?;
        Ok(conn)
    }
}

impl std::fmt::Display for SqliteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => write!(f, ":memory:"),
        }
    }
}

/// Volume database backed by SQLite.
#[derive(Debug)]
pub struct SqlVolumeDatabase {
    target: SqliteTarget,
    queries: QueryConfig,
    /// Root under which default mountpoints are derived.
    mount_root: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl SqlVolumeDatabase {
    /// Create a disconnected database. `queries` must already be resolved.
    pub fn new(target: SqliteTarget, queries: QueryConfig, mount_root: impl Into<PathBuf>) -> Self {
        Self {
            target,
            queries,
            mount_root: mount_root.into(),
            conn: Mutex::new(None),
        }
    }

    /// Build from a store configuration, resolving query overrides once.
    pub fn from_config(config: &StoreConfig) -> Self {
        let target = if config.in_memory_db {
            SqliteTarget::Memory
        } else {
            SqliteTarget::File(config.sqlite_file())
        };
        Self::new(target, config.query_config(), config.mount_root.clone())
    }

    pub fn target(&self) -> &SqliteTarget {
        &self.target
    }

    pub fn queries(&self) -> &QueryConfig {
        &self.queries
    }

    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    pub fn is_connected(&self) -> bool {
        self.conn.lock().is_some()
    }
}

fn connection(slot: &mut Option<Connection>) -> Result<&mut Connection> {
    slot.as_mut().ok_or_else(VolumeError::not_connected)
}

fn create_schema(conn: &Connection, queries: &QueryConfig) -> Result<()> {
    for statement in [&queries.volumes_create_table, &queries.mounts_create_table] {
        tracing::debug!(sql = %statement, "Creating table");
        conn.execute_batch(statement).map_err(|e| {
            tracing::error!(error = %e, sql = %statement, "Schema creation failed");
            VolumeError::internal(e)
        })?;
    }
    Ok(())
}

/// Run `body` in a transaction: commit on success, roll back on error.
fn in_transaction<T>(
    conn: &mut Connection,
    operation: &'static str,
    body: impl FnOnce(&Transaction<'_>) -> Result<T>,
) -> Result<T> {
    let tx = conn.transaction().map_err(VolumeError::internal)?;
    match body(&tx) {
        Ok(value) => {
            tx.commit().map_err(VolumeError::internal)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                tracing::warn!(operation, error = %rollback_err, "Rollback failed");
            }
            Err(err)
        }
    }
}

/// Resolve a volume row by name into `(id, volume)`.
fn find_volume(conn: &Connection, queries: &QueryConfig, name: &str) -> Result<(i64, Volume)> {
    let mut stmt = conn
        .prepare(&queries.volumes_get_by_name)
        .map_err(VolumeError::internal)?;
    let row = stmt
        .query_row(params![name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .optional()
        .map_err(VolumeError::internal)?;

    let (id, stored_name, mountpoint) =
        row.ok_or_else(|| VolumeError::NotFound(name.to_string()))?;
    Ok((
        id,
        Volume {
            name: stored_name,
            mountpoint: mountpoint.unwrap_or_default(),
            status: None,
        },
    ))
}

/// Mount table of one volume as stored.
///
/// Non-positive counts are skipped and repeated requesters are summed into
/// `references`; `rows` keeps how many rows each requester occupies so a
/// write can collapse them back into one.
struct StoredMounts {
    references: MountReferences,
    rows: HashMap<String, usize>,
}

impl StoredMounts {
    fn load(conn: &Connection, queries: &QueryConfig, volume_id: i64) -> Result<Self> {
        let mut stmt = conn
            .prepare(&queries.mounts_list_by_volume)
            .map_err(VolumeError::internal)?;
        let rows = stmt
            .query_map(params![volume_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(VolumeError::internal)?;

        let mut stored = Self {
            references: MountReferences::new(),
            rows: HashMap::new(),
        };
        for row in rows {
            let (requester, count) = row.map_err(VolumeError::internal)?;
            *stored.rows.entry(requester.clone()).or_insert(0) += 1;
            if count <= 0 {
                continue;
            }
            let count = u32::try_from(count).map_err(VolumeError::internal)?;
            stored.references.accumulate(&requester, count);
        }
        Ok(stored)
    }

    fn rows(&self, requester: &str) -> usize {
        self.rows.get(requester).copied().unwrap_or(0)
    }
}

fn load_references(
    conn: &Connection,
    queries: &QueryConfig,
    volume_id: i64,
) -> Result<MountReferences> {
    Ok(StoredMounts::load(conn, queries, volume_id)?.references)
}

/// Persist `count` as the single row held by `requester`.
fn store_count(
    tx: &Transaction<'_>,
    queries: &QueryConfig,
    volume_id: i64,
    requester: &str,
    count: u32,
    stored_rows: usize,
) -> Result<()> {
    let statement = match stored_rows {
        0 => &queries.mounts_insert,
        1 => &queries.mounts_update_count,
        _ => {
            tracing::warn!(
                requester = %requester,
                rows = stored_rows,
                "Collapsing duplicate mount rows"
            );
            tx.execute(
                &queries.mounts_delete_by_volume_and_requester,
                params![volume_id, requester],
            )
            .map_err(VolumeError::internal)?;
            &queries.mounts_insert
        }
    };
    tx.execute(statement, params![count, volume_id, requester])
        .map_err(VolumeError::internal)?;
    Ok(())
}

impl VolumeDatabase for SqlVolumeDatabase {
    fn connect(&self) -> Result<()> {
        let mut guard = self.conn.lock();
        let fresh = guard.is_none();
        if fresh {
            tracing::info!(data_source = %self.target, "Opening database");
            *guard = Some(self.target.open()?);
        }

        if let Err(err) = create_schema(connection(&mut guard)?, &self.queries) {
            if fresh {
                *guard = None;
            }
            return Err(err);
        }

        tracing::info!(data_source = %self.target, "Connected to database");
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let mut guard = self.conn.lock();
        let conn = guard.take().ok_or_else(VolumeError::not_connected)?;
        tracing::info!(data_source = %self.target, "Closing database");
        conn.close().map_err(|(_, e)| VolumeError::internal(e))
    }

    fn create(&self, name: &str, options: &HashMap<String, String>) -> Result<()> {
        let mut guard = self.conn.lock();
        let conn = connection(&mut guard)?;
        validate_name(name)?;

        let queries = &self.queries;
        in_transaction(conn, "create", |tx| {
            match find_volume(tx, queries, name) {
                Ok(_) => return Err(VolumeError::AlreadyExists(name.to_string())),
                Err(VolumeError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
            tx.execute(&queries.volumes_insert, params![name])
                .map_err(VolumeError::internal)?;
            Ok(())
        })?;

        tracing::info!(volume = %name, options = ?options, "Created volume");
        Ok(())
    }

    fn list(&self) -> Result<Vec<Volume>> {
        let mut guard = self.conn.lock();
        let conn = connection(&mut guard)?;

        let mut stmt = conn
            .prepare(&self.queries.volumes_list)
            .map_err(VolumeError::internal)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Volume {
                    name: row.get(0)?,
                    mountpoint: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    status: None,
                })
            })
            .map_err(VolumeError::internal)?;

        let volumes = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(VolumeError::internal)?;
        Ok(volumes)
    }

    fn get(&self, name: &str) -> Result<Volume> {
        let mut guard = self.conn.lock();
        let conn = connection(&mut guard)?;
        let (_, volume) = find_volume(conn, &self.queries, name)?;
        Ok(volume)
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut guard = self.conn.lock();
        let conn = connection(&mut guard)?;
        let queries = &self.queries;

        let (volume_id, _) = find_volume(conn, queries, name)?;
        let active = load_references(conn, queries, volume_id)?.total();
        if active > 0 {
            return Err(VolumeError::Conflict(format!(
                "volume '{}' cannot be removed as it still has {} active mount request(s)",
                name, active
            )));
        }

        in_transaction(conn, "remove", |tx| {
            tx.execute(&queries.mounts_delete_by_volume, params![volume_id])
                .map_err(VolumeError::internal)?;
            tx.execute(&queries.volumes_delete_by_id, params![volume_id])
                .map_err(VolumeError::internal)?;
            Ok(())
        })?;

        tracing::info!(volume = %name, id = volume_id, "Removed volume");
        Ok(())
    }

    fn mount(&self, name: &str, requester: &str) -> Result<String> {
        let mut guard = self.conn.lock();
        let conn = connection(&mut guard)?;
        let queries = &self.queries;

        let (volume_id, volume) = find_volume(conn, queries, name)?;
        let stored = StoredMounts::load(conn, queries, volume_id)?;

        let assign = !volume.is_mounted();
        let mountpoint = if assign {
            default_mountpoint(&self.mount_root, name)
        } else {
            volume.mountpoint
        };
        let count = stored.references.count(requester) + 1;
        let stored_rows = stored.rows(requester);

        in_transaction(conn, "mount", |tx| {
            if assign {
                tx.execute(
                    &queries.volumes_update_mountpoint,
                    params![mountpoint, volume_id],
                )
                .map_err(VolumeError::internal)?;
            }

            store_count(tx, queries, volume_id, requester, count, stored_rows)
        })?;

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
        let mut guard = self.conn.lock();
        let conn = connection(&mut guard)?;
        let queries = &self.queries;

        let (volume_id, _) = find_volume(conn, queries, name)?;
        let stored = StoredMounts::load(conn, queries, volume_id)?;
        let count = stored.references.count(requester);
        let stored_rows = stored.rows(requester);
        if count == 0 {
            return Err(VolumeError::Conflict(format!(
                "volume '{}' is not mounted by '{}'",
                name, requester
            )));
        }

        in_transaction(conn, "unmount", |tx| {
            if count > 1 {
                store_count(tx, queries, volume_id, requester, count - 1, stored_rows)?;
            } else {
                tx.execute(
                    &queries.mounts_delete_by_volume_and_requester,
                    params![volume_id, requester],
                )
                .map_err(VolumeError::internal)?;
                // Cleared even if other requesters still hold the volume.
                tx.execute(&queries.volumes_update_mountpoint, params!["", volume_id])
                    .map_err(VolumeError::internal)?;
            }
            Ok(())
        })?;

        tracing::debug!(
            volume = %name,
            requester = %requester,
            count = count - 1,
            "Unmounted volume"
        );
        Ok(())
    }

    fn mount_references(&self, name: &str) -> Result<MountReferences> {
        let mut guard = self.conn.lock();
        let conn = connection(&mut guard)?;
        let (volume_id, _) = find_volume(conn, &self.queries, name)?;
        let references = load_references(conn, &self.queries, volume_id)?;
        tracing::debug!(volume = %name, total = references.total(), "Loaded mount references");
        Ok(references)
    }
}
