//! SQLite schema for library element storage

/// Schema version for migrations
pub const SCHEMA_VERSION: u32 = 1;

/// Connection kind for dashboard connections
pub const DASHBOARD_CONNECTION: i64 = 1;

/// SQLite schema definition
pub struct Schema;

impl Schema {
    /// Get the complete schema SQL
    pub fn create_tables() -> &'static str {
        r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Library elements. Meta (folder name, connection count, user names)
-- is derived at read time and has no column here.
CREATE TABLE IF NOT EXISTS library_element (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    org_id INTEGER NOT NULL,
    folder_id INTEGER NOT NULL,
    uid TEXT NOT NULL,
    name TEXT NOT NULL,
    kind INTEGER NOT NULL,
    type TEXT NOT NULL,
    description TEXT NOT NULL,
    model TEXT NOT NULL,
    version INTEGER NOT NULL,
    created TEXT NOT NULL,
    created_by INTEGER NOT NULL,
    updated TEXT NOT NULL,
    updated_by INTEGER NOT NULL,
    UNIQUE (org_id, uid),
    UNIQUE (org_id, folder_id, name, kind)
);

CREATE INDEX IF NOT EXISTS idx_library_element_org_name ON library_element(org_id, name);

-- Element <-> dashboard connections
CREATE TABLE IF NOT EXISTS library_element_connection (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    element_id INTEGER NOT NULL REFERENCES library_element(id) ON DELETE RESTRICT,
    kind INTEGER NOT NULL,
    connection_id INTEGER NOT NULL,
    created TEXT NOT NULL,
    created_by INTEGER NOT NULL,
    UNIQUE (element_id, kind, connection_id)
);

CREATE INDEX IF NOT EXISTS idx_library_element_connection_dashboard
    ON library_element_connection(kind, connection_id);

-- Users seen as requesters, for createdBy / updatedBy resolution
CREATE TABLE IF NOT EXISTS library_element_user (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    avatar_url TEXT NOT NULL
);
"#
    }

    /// Get migration SQL for a specific version
    pub fn migration(from_version: u32, to_version: u32) -> Option<&'static str> {
        match (from_version, to_version) {
            // (1, 2) => Some("ALTER TABLE ..."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_sql_valid() {
        let sql = Schema::create_tables();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS library_element ("));
        assert!(sql.contains("UNIQUE (org_id, folder_id, name, kind)"));
        assert!(sql.contains("UNIQUE (element_id, kind, connection_id)"));
    }

    #[test]
    fn test_schema_applies_to_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(Schema::create_tables()).unwrap();
        // Idempotent
        conn.execute_batch(Schema::create_tables()).unwrap();
    }

    #[test]
    fn test_no_migration_for_current_version() {
        assert!(Schema::migration(SCHEMA_VERSION, SCHEMA_VERSION + 1).is_none());
    }
}
