//! Shared tag registry with reference-counted cleanup.
//!
//! Tags are looked up by their unique description and created on first use.
//! A tag stays alive only while at least one `task_tags` link points at it:
//! callers delete the link first, then call [`TagRegistry::release_tag`], which
//! deletes the tag as soon as its link count reaches zero.

use rusqlite::{Connection, OptionalExtension, params};
use tasklane_core::TagId;
use tracing::{debug, info};

use crate::errors::{TAG_CONFLICT, TaskError};
use crate::types::{Tag, TagColor, TagRelease, normalized_description};

/// Tag lookup, lazy creation, and garbage collection.
pub struct TagRegistry;

impl TagRegistry {
    /// Return the ID of the tag described by `description`, creating it with a
    /// random color if it does not exist yet.
    ///
    /// Idempotent per description. If a concurrent writer inserts the same
    /// description first, the unique-constraint violation is absorbed and the
    /// winner's ID is returned.
    pub fn ensure_tag(conn: &Connection, description: &str) -> Result<TagId, TaskError> {
        let description = normalized_description(description, "Tag")?;
        if let Some(id) = Self::find_by_description(conn, description)? {
            return Ok(id);
        }
        Self::create_or_reread(conn, description)
    }

    /// Insert a tag row, falling back to a re-read when the description is
    /// already taken.
    pub(crate) fn create_or_reread(
        conn: &Connection,
        description: &str,
    ) -> Result<TagId, TaskError> {
        let id = TagId::generate();
        let color = TagColor::random();
        let inserted = conn.execute(
            "INSERT INTO tags (id, description, color) VALUES (?1, ?2, ?3)",
            params![id, description, color.as_str()],
        );

        match inserted {
            Ok(_) => {
                info!(tag_id = %id, description, %color, "tag created");
                Ok(id)
            }
            Err(err) if is_unique_violation(&err) => {
                debug!(description, "tag inserted concurrently, re-reading");
                Self::find_by_description(conn, description)?.ok_or_else(|| {
                    TaskError::InvalidState {
                        code: TAG_CONFLICT,
                        message: format!("tag '{description}' conflicted but could not be re-read"),
                    }
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Drop one reference to `id`.
    ///
    /// The caller must already have deleted the link row. If no links remain,
    /// the tag row is deleted.
    pub fn release_tag(conn: &Connection, id: &TagId) -> Result<TagRelease, TaskError> {
        let links = Self::link_count(conn, id)?;
        if links > 0 {
            debug!(tag_id = %id, links, "tag still referenced");
            return Ok(TagRelease::Retained { links });
        }

        let deleted = conn.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
        if deleted > 0 {
            info!(tag_id = %id, "orphaned tag collected");
        }
        Ok(TagRelease::Collected)
    }

    /// Number of task links referencing `id`.
    pub fn link_count(conn: &Connection, id: &TagId) -> Result<u32, TaskError> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM task_tags WHERE tag_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Look up a tag ID by exact description.
    pub fn find_by_description(
        conn: &Connection,
        description: &str,
    ) -> Result<Option<TagId>, TaskError> {
        let id = conn
            .query_row(
                "SELECT id FROM tags WHERE description = ?1",
                params![description],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Get a tag by ID.
    pub fn get_tag(conn: &Connection, id: &TagId) -> Result<Option<Tag>, TaskError> {
        let tag = conn
            .query_row(
                "SELECT id, description, color FROM tags WHERE id = ?1",
                params![id],
                tag_from_row,
            )
            .optional()?;
        Ok(tag)
    }

    /// All tags, ordered by description.
    pub fn list_tags(conn: &Connection) -> Result<Vec<Tag>, TaskError> {
        let mut stmt =
            conn.prepare("SELECT id, description, color FROM tags ORDER BY description")?;
        let tags = stmt
            .query_map([], tag_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }
}

fn tag_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        description: row.get("description")?,
        color: TagColor::from_stored(row.get("color")?),
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use assert_matches::assert_matches;
    use tasklane_core::logging::capture_logs;
    use tracing::Level;

    use super::*;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        tasklane_store::run_migrations(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO categories (id, description) VALUES ('cat-1', 'Home');
             INSERT INTO tasks (id, description, category_id, owner_id)
                 VALUES ('task-a', 'A', 'cat-1', 'user-1'), ('task-b', 'B', 'cat-1', 'user-1');",
        )
        .unwrap();
        conn
    }

    fn link(conn: &Connection, task: &str, tag: &TagId) {
        conn.execute(
            "INSERT INTO task_tags (task_id, tag_id) VALUES (?1, ?2)",
            params![task, tag],
        )
        .unwrap();
    }

    fn unlink(conn: &Connection, task: &str, tag: &TagId) {
        conn.execute(
            "DELETE FROM task_tags WHERE task_id = ?1 AND tag_id = ?2",
            params![task, tag],
        )
        .unwrap();
    }

    fn tag_rows(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn ensure_creates_once() {
        let conn = setup_db();
        let first = TagRegistry::ensure_tag(&conn, "work").unwrap();
        let second = TagRegistry::ensure_tag(&conn, "work").unwrap();
        assert_eq!(first, second);
        assert_eq!(tag_rows(&conn), 1);
        assert!(first.starts_with("tag-"));
    }

    #[test]
    fn ensure_trims_key() {
        let conn = setup_db();
        let a = TagRegistry::ensure_tag(&conn, "home").unwrap();
        let b = TagRegistry::ensure_tag(&conn, "  home ").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ensure_rejects_blank() {
        let conn = setup_db();
        let err = TagRegistry::ensure_tag(&conn, "   ").unwrap_err();
        assert_matches!(err, TaskError::InvalidState { .. });
        assert_eq!(tag_rows(&conn), 0);
    }

    #[test]
    fn created_tag_gets_color() {
        let conn = setup_db();
        let id = TagRegistry::ensure_tag(&conn, "errands").unwrap();
        let tag = TagRegistry::get_tag(&conn, &id).unwrap().unwrap();
        assert_eq!(tag.description, "errands");
        assert_eq!(tag.color.as_str().len(), 7);
    }

    #[test]
    fn insert_collision_rereads_existing() {
        let conn = setup_db();
        let existing = TagRegistry::ensure_tag(&conn, "shared").unwrap();
        let again = TagRegistry::create_or_reread(&conn, "shared").unwrap();
        assert_eq!(existing, again);
        assert_eq!(tag_rows(&conn), 1);
    }

    #[test]
    fn release_keeps_referenced_tag() {
        let conn = setup_db();
        let id = TagRegistry::ensure_tag(&conn, "urgent").unwrap();
        link(&conn, "task-a", &id);
        link(&conn, "task-b", &id);

        unlink(&conn, "task-a", &id);
        let outcome = TagRegistry::release_tag(&conn, &id).unwrap();
        assert_eq!(outcome, TagRelease::Retained { links: 1 });
        assert!(TagRegistry::get_tag(&conn, &id).unwrap().is_some());

        unlink(&conn, "task-b", &id);
        let outcome = TagRegistry::release_tag(&conn, &id).unwrap();
        assert_eq!(outcome, TagRelease::Collected);
        assert!(TagRegistry::get_tag(&conn, &id).unwrap().is_none());
    }

    #[test]
    fn collection_is_logged() {
        let (logs, _guard) = capture_logs();
        let conn = setup_db();
        let id = TagRegistry::ensure_tag(&conn, "temp").unwrap();
        TagRegistry::release_tag(&conn, &id).unwrap();

        assert!(logs.has_event(Level::INFO, "tag created"));
        let collected = logs.matching("orphaned tag collected");
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].field("tag_id"), Some(id.as_str()));
    }

    #[test]
    fn list_is_alphabetical() {
        let conn = setup_db();
        TagRegistry::ensure_tag(&conn, "zeta").unwrap();
        TagRegistry::ensure_tag(&conn, "alpha").unwrap();
        let names: Vec<String> = TagRegistry::list_tags(&conn)
            .unwrap()
            .into_iter()
            .map(|t| t.description)
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
