//! Repository for library element and connection rows

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::Value;

use super::schema::{Schema, DASHBOARD_CONNECTION, SCHEMA_VERSION};
use crate::element::LibraryElementKind;
use crate::error::{is_constraint_violation, LibraryElementError, PersistenceError, Result};
use crate::user::{SignedInUser, UserRef};

/// SQLite handle shared by the element store and connection tracker.
///
/// All access goes through one connection behind a mutex; writes run in
/// immediate transactions, reads in deferred ones.
pub struct Repository {
    conn: Mutex<Connection>,
}

impl Repository {
    /// Open (or create) a database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Initialize the database schema
    fn initialize(conn: &Connection) -> Result<()> {
        let current_version = Self::read_schema_version(conn).unwrap_or(0);

        if current_version == 0 {
            conn.execute_batch(Schema::create_tables())
                .map_err(|e| PersistenceError::Migration(format!("create tables: {}", e)))?;
            Self::write_schema_version(conn, SCHEMA_VERSION)?;
        } else if current_version < SCHEMA_VERSION {
            for version in current_version..SCHEMA_VERSION {
                if let Some(migration) = Schema::migration(version, version + 1) {
                    conn.execute_batch(migration).map_err(|e| {
                        PersistenceError::Migration(format!("{} -> {}: {}", version, version + 1, e))
                    })?;
                }
            }
            Self::write_schema_version(conn, SCHEMA_VERSION)?;
        } else if current_version > SCHEMA_VERSION {
            return Err(PersistenceError::Migration(format!(
                "database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            ))
            .into());
        }

        Ok(())
    }

    fn read_schema_version(conn: &Connection) -> Option<u32> {
        conn.query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .ok()
    }

    fn write_schema_version(conn: &Connection, version: u32) -> Result<()> {
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
        Ok(())
    }

    /// Schema version recorded in the database
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.lock()?;
        Ok(Self::read_schema_version(&conn).unwrap_or(0))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PersistenceError::LockPoisoned(e.to_string()).into())
    }

    /// Run `f` inside an immediate transaction. Any error rolls back.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Run `f` inside a deferred transaction so every query sees one snapshot.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

// ==================== Element rows ====================

/// A stored element joined with its users and live connection count.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ElementRecord {
    pub id: i64,
    pub org_id: i64,
    pub folder_id: i64,
    pub uid: String,
    pub name: String,
    pub kind: LibraryElementKind,
    pub type_name: String,
    pub description: String,
    pub model: Value,
    pub version: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub created_by: UserRef,
    pub updated_by: UserRef,
    pub connection_count: i64,
}

/// Column values written on insert or update.
#[derive(Debug, Clone)]
pub(crate) struct ElementFields<'a> {
    pub folder_id: i64,
    pub name: &'a str,
    pub kind: LibraryElementKind,
    pub type_name: &'a str,
    pub description: &'a str,
    pub model: &'a Value,
}

const SELECT_ELEMENT: &str = "
    SELECT le.id, le.org_id, le.folder_id, le.uid, le.name, le.kind, le.type, le.description,
           le.model, le.version, le.created, le.updated,
           le.created_by, COALESCE(cu.name, ''), COALESCE(cu.avatar_url, ''),
           le.updated_by, COALESCE(uu.name, ''), COALESCE(uu.avatar_url, ''),
           (SELECT COUNT(*) FROM library_element_connection lec WHERE lec.element_id = le.id)
    FROM library_element le
    LEFT JOIN library_element_user cu ON cu.id = le.created_by
    LEFT JOIN library_element_user uu ON uu.id = le.updated_by";

/// Raw column values before JSON and timestamp parsing.
struct RawElement {
    id: i64,
    org_id: i64,
    folder_id: i64,
    uid: String,
    name: String,
    kind: i64,
    type_name: String,
    description: String,
    model: String,
    version: i64,
    created: String,
    updated: String,
    created_by: UserRef,
    updated_by: UserRef,
    connection_count: i64,
}

impl RawElement {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            folder_id: row.get(2)?,
            uid: row.get(3)?,
            name: row.get(4)?,
            kind: row.get(5)?,
            type_name: row.get(6)?,
            description: row.get(7)?,
            model: row.get(8)?,
            version: row.get(9)?,
            created: row.get(10)?,
            updated: row.get(11)?,
            created_by: UserRef {
                id: row.get(12)?,
                name: row.get(13)?,
                avatar_url: row.get(14)?,
            },
            updated_by: UserRef {
                id: row.get(15)?,
                name: row.get(16)?,
                avatar_url: row.get(17)?,
            },
            connection_count: row.get(18)?,
        })
    }

    fn into_record(self) -> Result<ElementRecord> {
        let kind = LibraryElementKind::try_from(self.kind).map_err(PersistenceError::Serialization)?;
        let model: Value = serde_json::from_str(&self.model)?;
        Ok(ElementRecord {
            id: self.id,
            org_id: self.org_id,
            folder_id: self.folder_id,
            uid: self.uid,
            name: self.name,
            kind,
            type_name: self.type_name,
            description: self.description,
            model,
            version: self.version,
            created: parse_timestamp(&self.created)?,
            updated: parse_timestamp(&self.updated)?,
            created_by: self.created_by,
            updated_by: self.updated_by,
            connection_count: self.connection_count,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Serialization(format!("timestamp {:?}: {}", s, e)).into())
}

fn query_elements(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<ElementRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let raws = stmt
        .query_map(params, RawElement::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    raws.into_iter().map(RawElement::into_record).collect()
}

/// Record the requester so `createdBy` / `updatedBy` can be resolved later.
pub(crate) fn upsert_user(conn: &Connection, user: &SignedInUser) -> Result<()> {
    conn.execute(
        "INSERT INTO library_element_user (id, name, email, avatar_url) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, email = excluded.email,
                                       avatar_url = excluded.avatar_url",
        params![user.user_id, user.display_name(), user.email, user.avatar_url],
    )?;
    Ok(())
}

pub(crate) fn insert_element(
    conn: &Connection,
    org_id: i64,
    uid: &str,
    fields: &ElementFields<'_>,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let model_json = serde_json::to_string(fields.model)?;
    let now = now.to_rfc3339();
    conn.execute(
        "INSERT INTO library_element
            (org_id, folder_id, uid, name, kind, type, description, model, version,
             created, created_by, updated, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10, ?9, ?10)",
        params![
            org_id,
            fields.folder_id,
            uid,
            fields.name,
            fields.kind.code(),
            fields.type_name,
            fields.description,
            model_json,
            now,
            user_id,
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            LibraryElementError::AlreadyExists
        } else {
            e.into()
        }
    })?;
    Ok(())
}

pub(crate) fn find_element(conn: &Connection, org_id: i64, uid: &str) -> Result<Option<ElementRecord>> {
    let sql = format!("{} WHERE le.org_id = ?1 AND le.uid = ?2", SELECT_ELEMENT);
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_row(params![org_id, uid], RawElement::from_row)
        .optional()?;
    raw.map(RawElement::into_record).transpose()
}

/// Uids per `IN` list. SQLite builds older than 3.32 reject statements with
/// more than 999 variables.
const MAX_UIDS_PER_QUERY: usize = 500;

pub(crate) fn find_elements(conn: &Connection, org_id: i64, uids: &[String]) -> Result<Vec<ElementRecord>> {
    let mut records = Vec::new();
    for chunk in uids.chunks(MAX_UIDS_PER_QUERY) {
        let placeholders: Vec<String> = (0..chunk.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "{} WHERE le.org_id = ?1 AND le.uid IN ({})",
            SELECT_ELEMENT,
            placeholders.join(", ")
        );
        let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(chunk.len() + 1);
        values.push(org_id.into());
        values.extend(chunk.iter().map(|u| rusqlite::types::Value::from(u.clone())));
        records.extend(query_elements(conn, &sql, params_from_iter(values))?);
    }
    Ok(records)
}

/// Every element of an org, ordered by name.
pub(crate) fn list_elements(conn: &Connection, org_id: i64) -> Result<Vec<ElementRecord>> {
    let sql = format!(
        "{} WHERE le.org_id = ?1 ORDER BY le.name COLLATE NOCASE, le.id",
        SELECT_ELEMENT
    );
    query_elements(conn, &sql, params![org_id])
}

/// Elements of an org connected to a dashboard.
pub(crate) fn elements_for_dashboard(
    conn: &Connection,
    org_id: i64,
    dashboard_id: i64,
) -> Result<Vec<ElementRecord>> {
    let sql = format!(
        "{} INNER JOIN library_element_connection c ON c.element_id = le.id
         WHERE le.org_id = ?1 AND c.kind = ?2 AND c.connection_id = ?3",
        SELECT_ELEMENT
    );
    query_elements(conn, &sql, params![org_id, DASHBOARD_CONNECTION, dashboard_id])
}

/// Conditional update: only applies when the stored version equals
/// `expected_version`. Returns the number of rows changed.
pub(crate) fn update_element(
    conn: &Connection,
    element_id: i64,
    expected_version: i64,
    fields: &ElementFields<'_>,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<usize> {
    let model_json = serde_json::to_string(fields.model)?;
    conn.execute(
        "UPDATE library_element
         SET folder_id = ?1, name = ?2, kind = ?3, type = ?4, description = ?5, model = ?6,
             version = version + 1, updated = ?7, updated_by = ?8
         WHERE id = ?9 AND version = ?10",
        params![
            fields.folder_id,
            fields.name,
            fields.kind.code(),
            fields.type_name,
            fields.description,
            model_json,
            now.to_rfc3339(),
            user_id,
            element_id,
            expected_version,
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            LibraryElementError::AlreadyExists
        } else {
            e.into()
        }
    })
}

pub(crate) fn delete_element(conn: &Connection, element_id: i64) -> Result<usize> {
    Ok(conn.execute("DELETE FROM library_element WHERE id = ?1", params![element_id])?)
}

// ==================== Connection rows ====================

pub(crate) fn connection_count(conn: &Connection, element_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM library_element_connection WHERE element_id = ?1",
        params![element_id],
        |row| row.get(0),
    )?)
}

/// Insert a dashboard connection; an existing pair is left as is.
pub(crate) fn insert_connection(
    conn: &Connection,
    element_id: i64,
    dashboard_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO library_element_connection
            (element_id, kind, connection_id, created, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![element_id, DASHBOARD_CONNECTION, dashboard_id, now.to_rfc3339(), user_id],
    )?;
    Ok(())
}

pub(crate) fn delete_connection(conn: &Connection, element_id: i64, dashboard_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM library_element_connection
         WHERE element_id = ?1 AND kind = ?2 AND connection_id = ?3",
        params![element_id, DASHBOARD_CONNECTION, dashboard_id],
    )?)
}

/// `(element_id, uid)` of every element of `org_id` connected to a dashboard.
pub(crate) fn connected_elements(
    conn: &Connection,
    org_id: i64,
    dashboard_id: i64,
) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn.prepare(
        "SELECT le.id, le.uid FROM library_element le
         INNER JOIN library_element_connection c ON c.element_id = le.id
         WHERE le.org_id = ?1 AND c.kind = ?2 AND c.connection_id = ?3
         ORDER BY le.uid",
    )?;
    let rows = stmt
        .query_map(params![org_id, DASHBOARD_CONNECTION, dashboard_id], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn connected_dashboards(conn: &Connection, element_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT connection_id FROM library_element_connection
         WHERE element_id = ?1 AND kind = ?2 ORDER BY connection_id",
    )?;
    let ids = stmt
        .query_map(params![element_id, DASHBOARD_CONNECTION], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Drop every connection an org's elements hold to a dashboard.
pub(crate) fn delete_dashboard_connections(conn: &Connection, org_id: i64, dashboard_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM library_element_connection
         WHERE kind = ?1 AND connection_id = ?2
           AND element_id IN (SELECT id FROM library_element WHERE org_id = ?3)",
        params![DASHBOARD_CONNECTION, dashboard_id, org_id],
    )?)
}
