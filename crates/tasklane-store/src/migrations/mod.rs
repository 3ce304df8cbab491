//! Versioned schema migrations.
//!
//! SQL is embedded with [`include_str!`] and applied in version order. Applied
//! versions are recorded in `schema_version`, so running the migrator twice is
//! a no-op.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::{Result, StoreError};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Categories, tasks, shared tags, checklists and items",
    sql: include_str!("v001_schema.sql"),
}];

/// Apply every migration newer than the recorded schema version.
///
/// Returns how many migrations ran.
///
/// # Errors
///
/// Returns [`StoreError::Migration`] if any step fails. A failing migration
/// leaves no partial schema behind.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    ensure_version_table(conn)?;
    let current = current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version <= current {
            debug!(version = migration.version, "migration already applied");
            continue;
        }
        info!(
            version = migration.version,
            description = migration.description,
            "applying migration"
        );
        apply_migration(conn, migration)?;
        applied += 1;
    }

    if applied > 0 {
        info!(applied, "migrations complete");
    }
    Ok(applied)
}

/// Highest applied version, 0 on a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|e| migration_error(format!("failed to read schema_version: {e}")))
}

/// Latest version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal
// ─────────────────────────────────────────────────────────────────────────────

fn migration_error(message: String) -> StoreError {
    StoreError::Migration { message }
}

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
           version     INTEGER PRIMARY KEY,
           applied_at  TEXT    NOT NULL,
           description TEXT
         );",
    )
    .map_err(|e| migration_error(format!("failed to create schema_version: {e}")))
}

fn apply_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    let tx = conn.unchecked_transaction().map_err(|e| {
        migration_error(format!(
            "failed to begin transaction for v{}: {e}",
            migration.version
        ))
    })?;

    tx.execute_batch(migration.sql).map_err(|e| {
        migration_error(format!(
            "v{} ({}) failed: {e}",
            migration.version, migration.description
        ))
    })?;

    let _ = tx
        .execute(
            "INSERT INTO schema_version (version, applied_at, description)
             VALUES (?1, datetime('now'), ?2)",
            rusqlite::params![migration.version, migration.description],
        )
        .map_err(|e| migration_error(format!("failed to record v{}: {e}", migration.version)))?;

    tx.commit()
        .map_err(|e| migration_error(format!("failed to commit v{}: {e}", migration.version)))
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;

    fn open_memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect()
    }

    #[test]
    fn creates_all_tables() {
        let conn = open_memory();
        assert_eq!(run_migrations(&conn).unwrap(), 1);
        assert_eq!(
            table_names(&conn),
            vec![
                "categories",
                "checklist_items",
                "checklists",
                "schema_version",
                "tags",
                "task_tags",
                "tasks",
            ]
        );
        assert_eq!(current_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn second_run_is_noop() {
        let conn = open_memory();
        run_migrations(&conn).unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), 0);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn tag_description_is_unique() {
        let conn = open_memory();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO tags (id, description, color) VALUES ('tag-1', 'work', '#000000')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO tags (id, description, color) VALUES ('tag-2', 'work', '#ffffff')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn deleting_task_cascades_to_children() {
        let conn = open_memory();
        run_migrations(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO categories (id, description) VALUES ('cat-1', 'Home');
             INSERT INTO tasks (id, description, category_id, owner_id)
                 VALUES ('task-1', 'laundry', 'cat-1', 'user-1');
             INSERT INTO tags (id, description, color) VALUES ('tag-1', 'chores', '#102030');
             INSERT INTO task_tags (task_id, tag_id) VALUES ('task-1', 'tag-1');
             INSERT INTO checklists (id, task_id, description) VALUES ('chk-1', 'task-1', 'steps');
             INSERT INTO checklist_items (id, checklist_id, description)
                 VALUES ('item-1', 'chk-1', 'wash');
             DELETE FROM tasks WHERE id = 'task-1';",
        )
        .unwrap();

        for table in ["task_tags", "checklists", "checklist_items"] {
            let n: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
                .unwrap();
            assert_eq!(n, 0, "{table} should be empty");
        }
        let tags: i64 = conn
            .query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))
            .unwrap();
        assert_eq!(tags, 1);
    }

    #[test]
    fn task_requires_existing_category() {
        let conn = open_memory();
        run_migrations(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO tasks (id, description, category_id, owner_id)
             VALUES ('task-1', 'x', 'cat-missing', 'user-1')",
            [],
        );
        assert!(result.is_err());
    }
}
