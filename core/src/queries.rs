//! Named SQL statement bundles for the relational volume database.
//!
//! One relational implementation serves several engines by swapping only the
//! statements whose syntax differs. A [`QueryOverrides`] value lists the
//! statements a deployment wants to replace; everything it leaves unset is
//! taken from the dialect preset.
//!
//! Parameter contract (positional `?` placeholders):
//!
//! | statement                  | parameters                           |
//! |----------------------------|--------------------------------------|
//! | `volumes_insert`           | name                                 |
//! | `volumes_get_by_name`      | name → (id, name, mountpoint)        |
//! | `volumes_update_mountpoint`| mountpoint, id                       |
//! | `volumes_delete_by_id`     | id                                   |
//! | `mounts_insert`            | count, volume_id, requester_id       |
//! | `mounts_list_by_volume`    | volume_id → (requester_id, count)    |
//! | `mounts_update_count`      | count, volume_id, requester_id       |
//! | `mounts_delete_by_volume`  | volume_id                            |
//! | `mounts_delete_by_volume_and_requester` | volume_id, requester_id |

use serde::{Deserialize, Serialize};

const SQLITE_VOLUMES_CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS volumes (
        id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        name VARCHAR(256) NOT NULL UNIQUE,
        mountpoint TEXT
    );";

const MYSQL_VOLUMES_CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS volumes (
        id INTEGER NOT NULL PRIMARY KEY AUTO_INCREMENT,
        name VARCHAR(256) NOT NULL UNIQUE,
        mountpoint TEXT
    )";

const VOLUMES_INSERT: &str = "INSERT INTO volumes(name) VALUES (?);";
const VOLUMES_LIST: &str = "SELECT name, mountpoint FROM volumes;";
const VOLUMES_GET_BY_NAME: &str =
    "SELECT id, name, mountpoint FROM volumes WHERE name = ? LIMIT 1;";
const VOLUMES_UPDATE_MOUNTPOINT: &str = "UPDATE volumes SET mountpoint = ? WHERE id = ?;";
const VOLUMES_DELETE_BY_ID: &str = "DELETE FROM volumes WHERE id = ?;";

const MOUNTS_CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS mounts (
        volume_id INTEGER NOT NULL,
        requester_id VARCHAR(256) NOT NULL,
        count INTEGER NOT NULL
    );";
const MOUNTS_INSERT: &str =
    "INSERT INTO mounts(count, volume_id, requester_id) VALUES (?, ?, ?);";
const MOUNTS_LIST_BY_VOLUME: &str = "SELECT requester_id, count FROM mounts WHERE volume_id = ?;";
const MOUNTS_UPDATE_COUNT: &str =
    "UPDATE mounts SET count = ? WHERE volume_id = ? AND requester_id = ?;";
const MOUNTS_DELETE_BY_VOLUME: &str = "DELETE FROM mounts WHERE volume_id = ?;";
const MOUNTS_DELETE_BY_VOLUME_AND_REQUESTER: &str =
    "DELETE FROM mounts WHERE volume_id = ? AND requester_id = ?;";

/// SQL dialect preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SqlDialect {
    /// Embedded SQLite (default).
    #[default]
    Sqlite,
    /// MySQL / MariaDB.
    Mysql,
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Mysql => write!(f, "mysql"),
        }
    }
}

impl std::str::FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::Mysql),
            _ => Err(format!("unknown SQL dialect: '{}' (supported: sqlite, mysql)", s)),
        }
    }
}

/// Fully resolved statement bundle used by the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    pub volumes_create_table: String,
    pub volumes_insert: String,
    pub volumes_list: String,
    pub volumes_get_by_name: String,
    pub volumes_update_mountpoint: String,
    pub volumes_delete_by_id: String,

    pub mounts_create_table: String,
    pub mounts_insert: String,
    pub mounts_list_by_volume: String,
    pub mounts_update_count: String,
    pub mounts_delete_by_volume: String,
    pub mounts_delete_by_volume_and_requester: String,
}

/// Partial statement bundle. Unset or empty fields fall back to the preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOverrides {
    pub volumes_create_table: Option<String>,
    pub volumes_insert: Option<String>,
    pub volumes_list: Option<String>,
    pub volumes_get_by_name: Option<String>,
    pub volumes_update_mountpoint: Option<String>,
    pub volumes_delete_by_id: Option<String>,

    pub mounts_create_table: Option<String>,
    pub mounts_insert: Option<String>,
    pub mounts_list_by_volume: Option<String>,
    pub mounts_update_count: Option<String>,
    pub mounts_delete_by_volume: Option<String>,
    pub mounts_delete_by_volume_and_requester: Option<String>,
}

impl QueryOverrides {
    /// True when no field carries a usable override.
    pub fn is_empty(&self) -> bool {
        [
            &self.volumes_create_table,
            &self.volumes_insert,
            &self.volumes_list,
            &self.volumes_get_by_name,
            &self.volumes_update_mountpoint,
            &self.volumes_delete_by_id,
            &self.mounts_create_table,
            &self.mounts_insert,
            &self.mounts_list_by_volume,
            &self.mounts_update_count,
            &self.mounts_delete_by_volume,
            &self.mounts_delete_by_volume_and_requester,
        ]
        .iter()
        .all(|value| value.as_deref().map_or(true, str::is_empty))
    }
}

/// Pick `value` unless it is absent or empty.
pub fn override_or_default(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

impl QueryConfig {
    /// Statement preset for SQLite.
    pub fn sqlite() -> Self {
        Self {
            volumes_create_table: SQLITE_VOLUMES_CREATE_TABLE.to_string(),
            volumes_insert: VOLUMES_INSERT.to_string(),
            volumes_list: VOLUMES_LIST.to_string(),
            volumes_get_by_name: VOLUMES_GET_BY_NAME.to_string(),
            volumes_update_mountpoint: VOLUMES_UPDATE_MOUNTPOINT.to_string(),
            volumes_delete_by_id: VOLUMES_DELETE_BY_ID.to_string(),

            mounts_create_table: MOUNTS_CREATE_TABLE.to_string(),
            mounts_insert: MOUNTS_INSERT.to_string(),
            mounts_list_by_volume: MOUNTS_LIST_BY_VOLUME.to_string(),
            mounts_update_count: MOUNTS_UPDATE_COUNT.to_string(),
            mounts_delete_by_volume: MOUNTS_DELETE_BY_VOLUME.to_string(),
            mounts_delete_by_volume_and_requester: MOUNTS_DELETE_BY_VOLUME_AND_REQUESTER
                .to_string(),
        }
    }

    /// Statement preset for MySQL. Only the auto-increment keyword differs.
    pub fn mysql() -> Self {
        Self {
            volumes_create_table: MYSQL_VOLUMES_CREATE_TABLE.to_string(),
            ..Self::sqlite()
        }
    }

    pub fn for_dialect(dialect: SqlDialect) -> Self {
        match dialect {
            SqlDialect::Sqlite => Self::sqlite(),
            SqlDialect::Mysql => Self::mysql(),
        }
    }

    /// Resolve `overrides` against `self`, field by field.
    pub fn merged(&self, overrides: &QueryOverrides) -> Self {
        let o = overrides;
        Self {
            volumes_create_table: override_or_default(
                o.volumes_create_table.as_deref(),
                &self.volumes_create_table,
            ),
            volumes_insert: override_or_default(o.volumes_insert.as_deref(), &self.volumes_insert),
            volumes_list: override_or_default(o.volumes_list.as_deref(), &self.volumes_list),
            volumes_get_by_name: override_or_default(
                o.volumes_get_by_name.as_deref(),
                &self.volumes_get_by_name,
            ),
            volumes_update_mountpoint: override_or_default(
                o.volumes_update_mountpoint.as_deref(),
                &self.volumes_update_mountpoint,
            ),
            volumes_delete_by_id: override_or_default(
                o.volumes_delete_by_id.as_deref(),
                &self.volumes_delete_by_id,
            ),

            mounts_create_table: override_or_default(
                o.mounts_create_table.as_deref(),
                &self.mounts_create_table,
            ),
            mounts_insert: override_or_default(o.mounts_insert.as_deref(), &self.mounts_insert),
            mounts_list_by_volume: override_or_default(
                o.mounts_list_by_volume.as_deref(),
                &self.mounts_list_by_volume,
            ),
            mounts_update_count: override_or_default(
                o.mounts_update_count.as_deref(),
                &self.mounts_update_count,
            ),
            mounts_delete_by_volume: override_or_default(
                o.mounts_delete_by_volume.as_deref(),
                &self.mounts_delete_by_volume,
            ),
            mounts_delete_by_volume_and_requester: override_or_default(
                o.mounts_delete_by_volume_and_requester.as_deref(),
                &self.mounts_delete_by_volume_and_requester,
            ),
        }
    }

    /// Effective bundle for a dialect with optional overrides applied.
    pub fn resolve(dialect: SqlDialect, overrides: &QueryOverrides) -> Self {
        Self::for_dialect(dialect).merged(overrides)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::sqlite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_overrides() -> QueryOverrides {
        QueryOverrides {
            volumes_create_table: Some("a".to_string()),
            volumes_insert: Some("b".to_string()),
            volumes_list: Some("c".to_string()),
            volumes_get_by_name: Some("d".to_string()),
            volumes_update_mountpoint: Some("e".to_string()),
            volumes_delete_by_id: Some("f".to_string()),
            mounts_create_table: Some("g".to_string()),
            mounts_insert: Some("h".to_string()),
            mounts_list_by_volume: Some("i".to_string()),
            mounts_update_count: Some("j".to_string()),
            mounts_delete_by_volume: Some("k".to_string()),
            mounts_delete_by_volume_and_requester: Some("l".to_string()),
        }
    }

    #[test]
    fn test_override_or_default() {
        assert_eq!(override_or_default(None, "x"), "x");
        assert_eq!(override_or_default(Some(""), "x"), "x");
        assert_eq!(override_or_default(Some("y"), "x"), "y");
    }

    #[test]
    fn test_empty_overrides_keep_defaults() {
        let resolved = QueryConfig::resolve(SqlDialect::Sqlite, &QueryOverrides::default());
        assert_eq!(resolved, QueryConfig::sqlite());
        assert!(QueryOverrides::default().is_empty());
    }

    #[test]
    fn test_blank_strings_count_as_unset() {
        let overrides = QueryOverrides {
            volumes_insert: Some(String::new()),
            ..Default::default()
        };
        assert!(overrides.is_empty());
        assert_eq!(QueryConfig::sqlite().merged(&overrides), QueryConfig::sqlite());
    }

    #[test]
    fn test_full_overrides_replace_everything() {
        let resolved = QueryConfig::sqlite().merged(&full_overrides());
        assert_eq!(resolved.volumes_create_table, "a");
        assert_eq!(resolved.volumes_delete_by_id, "f");
        assert_eq!(resolved.mounts_create_table, "g");
        assert_eq!(resolved.mounts_delete_by_volume_and_requester, "l");
        assert!(!full_overrides().is_empty());
    }

    #[test]
    fn test_partial_override() {
        let overrides = QueryOverrides {
            mounts_insert: Some("INSERT INTO other(count, volume_id, requester_id) VALUES (?, ?, ?)".to_string()),
            ..Default::default()
        };
        let resolved = QueryConfig::sqlite().merged(&overrides);
        assert!(resolved.mounts_insert.contains("other"));
        assert_eq!(resolved.volumes_insert, QueryConfig::sqlite().volumes_insert);
        assert_eq!(resolved.mounts_update_count, QueryConfig::sqlite().mounts_update_count);
    }

    #[test]
    fn test_mysql_only_changes_volume_table() {
        let sqlite = QueryConfig::sqlite();
        let mysql = QueryConfig::mysql();
        assert!(mysql.volumes_create_table.contains("AUTO_INCREMENT"));
        assert!(sqlite.volumes_create_table.contains("AUTOINCREMENT"));
        assert_eq!(
            QueryConfig {
                volumes_create_table: sqlite.volumes_create_table.clone(),
                ..mysql
            },
            sqlite
        );
    }

    #[test]
    fn test_dialect_parse_and_display() {
        assert_eq!("sqlite".parse::<SqlDialect>().unwrap(), SqlDialect::Sqlite);
        assert_eq!("mysql".parse::<SqlDialect>().unwrap(), SqlDialect::Mysql);
        assert!("postgres".parse::<SqlDialect>().is_err());
        assert_eq!(SqlDialect::Mysql.to_string(), "mysql");
    }

    #[test]
    fn test_overrides_deserialize_partial() {
        let json = r#"{"volumes_list":"SELECT name, mountpoint FROM vols;"}"#;
        let overrides: QueryOverrides = serde_json::from_str(json).unwrap();
        assert_eq!(
            overrides.volumes_list.as_deref(),
            Some("SELECT name, mountpoint FROM vols;")
        );
        assert!(overrides.mounts_insert.is_none());
    }

    #[test]
    fn test_upsert_statements_share_parameter_order() {
        let q = QueryConfig::sqlite();
        assert!(q.mounts_insert.starts_with("INSERT INTO mounts(count, volume_id, requester_id)"));
        assert!(q.mounts_update_count.starts_with("UPDATE mounts SET count = ? WHERE volume_id = ?"));
    }
}
