//! SQL data access for tasks, categories, and task-tag links.
//!
//! All methods take a `&Connection` and are stateless. Ownership and input
//! checks live in the service layer; nothing here decides who may do what.

use rusqlite::{Connection, OptionalExtension, params};
use tasklane_core::{CategoryId, TagId, TaskId, UserId};

use crate::errors::TaskError;
use crate::types::{Category, Task, TaskCreateParams, TaskPatch, TaskStatus};

/// Current UTC timestamp as ISO 8601.
pub(crate) fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Escape `LIKE` wildcards so the term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

const TASK_COLUMNS: &str =
    "id, description, category_id, owner_id, completed_at, created_at, updated_at";

/// Task repository for SQL CRUD operations.
pub struct TaskRepository;

impl TaskRepository {
    // ─────────────────────────────────────────────────────────────────────
    // Tasks
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a task owned by `owner`. `params.description` must already be
    /// normalized.
    pub fn create_task(
        conn: &Connection,
        owner: &UserId,
        params: &TaskCreateParams,
    ) -> Result<Task, TaskError> {
        let id = TaskId::generate();
        let now = now_iso();
        let _ = conn.execute(
            "INSERT INTO tasks (id, description, category_id, owner_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, params.description, params.category_id, owner, now],
        )?;
        Self::get_task(conn, &id)?.ok_or_else(|| TaskError::task_not_found(id.as_str()))
    }

    /// Get a task by ID.
    pub fn get_task(conn: &Connection, id: &TaskId) -> Result<Option<Task>, TaskError> {
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    /// Owner of a task, or `None` if the task does not exist.
    pub fn owner_of(conn: &Connection, id: &TaskId) -> Result<Option<UserId>, TaskError> {
        let owner = conn
            .query_row(
                "SELECT owner_id FROM tasks WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(owner)
    }

    /// Apply a patch. Returns `false` if the task does not exist.
    pub fn update_task(conn: &Connection, id: &TaskId, patch: &TaskPatch) -> Result<bool, TaskError> {
        let now = now_iso();
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<&dyn rusqlite::ToSql> = Vec::new();

        if let Some(ref description) = patch.description {
            sets.push("description = ?");
            values.push(description);
        }
        if let Some(ref category_id) = patch.category_id {
            sets.push("category_id = ?");
            values.push(category_id);
        }

        sets.push("updated_at = ?");
        values.push(&now);
        values.push(id);

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
        let changed = conn.execute(&sql, values.as_slice())?;
        Ok(changed > 0)
    }

    /// Set `completed_at` if the task is open. Returns whether a row changed.
    pub fn mark_completed(conn: &Connection, id: &TaskId) -> Result<bool, TaskError> {
        let now = now_iso();
        let changed = conn.execute(
            "UPDATE tasks SET completed_at = ?1, updated_at = ?1
             WHERE id = ?2 AND completed_at IS NULL",
            params![now, id],
        )?;
        Ok(changed > 0)
    }

    /// Clear `completed_at` if the task is completed. Returns whether a row
    /// changed.
    pub fn mark_open(conn: &Connection, id: &TaskId) -> Result<bool, TaskError> {
        let changed = conn.execute(
            "UPDATE tasks SET completed_at = NULL, updated_at = ?1
             WHERE id = ?2 AND completed_at IS NOT NULL",
            params![now_iso(), id],
        )?;
        Ok(changed > 0)
    }

    /// Delete the task row.
    pub fn delete_task(conn: &Connection, id: &TaskId) -> Result<bool, TaskError> {
        let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// List tasks, optionally restricted to one owner and to descriptions
    /// containing `term` (ASCII case-insensitive).
    pub fn list_tasks(
        conn: &Connection,
        owner: Option<&UserId>,
        term: Option<&str>,
    ) -> Result<Vec<Task>, TaskError> {
        let pattern = term.map(like_pattern);
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE (?1 IS NULL OR owner_id = ?1)
               AND (?2 IS NULL OR description LIKE ?2 ESCAPE '\\')
             ORDER BY created_at, id"
        ))?;
        let tasks = stmt
            .query_map(params![owner, pattern], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Task-tag links
    // ─────────────────────────────────────────────────────────────────────

    /// Link a tag to a task. Returns `false` if the link already existed.
    pub fn insert_link(conn: &Connection, task_id: &TaskId, tag_id: &TagId) -> Result<bool, TaskError> {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?1, ?2)",
            params![task_id, tag_id],
        )?;
        Ok(inserted > 0)
    }

    /// Remove a link. Returns `false` if there was none.
    pub fn delete_link(conn: &Connection, task_id: &TaskId, tag_id: &TagId) -> Result<bool, TaskError> {
        let deleted = conn.execute(
            "DELETE FROM task_tags WHERE task_id = ?1 AND tag_id = ?2",
            params![task_id, tag_id],
        )?;
        Ok(deleted > 0)
    }

    /// IDs of the tags linked to a task, in link order.
    pub fn tag_ids_for_task(conn: &Connection, task_id: &TaskId) -> Result<Vec<TagId>, TaskError> {
        let mut stmt = conn.prepare(
            "SELECT tag_id FROM task_tags WHERE task_id = ?1 ORDER BY created_at, tag_id",
        )?;
        let ids = stmt
            .query_map(params![task_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Descriptions of the tags linked to a task, alphabetical.
    pub fn tag_descriptions(conn: &Connection, task_id: &TaskId) -> Result<Vec<String>, TaskError> {
        let mut stmt = conn.prepare(
            "SELECT t.description FROM task_tags tt
             JOIN tags t ON t.id = tt.tag_id
             WHERE tt.task_id = ?1
             ORDER BY t.description",
        )?;
        let names = stmt
            .query_map(params![task_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Categories
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a category with a normalized description.
    pub fn create_category(conn: &Connection, description: &str) -> Result<Category, TaskError> {
        let id = CategoryId::generate();
        let _ = conn.execute(
            "INSERT INTO categories (id, description) VALUES (?1, ?2)",
            params![id, description],
        )?;
        Ok(Category {
            id,
            description: description.to_string(),
        })
    }

    /// Whether a category exists.
    pub fn category_exists(conn: &Connection, id: &CategoryId) -> Result<bool, TaskError> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM categories WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Look up a category by exact description.
    pub fn find_category(conn: &Connection, description: &str) -> Result<Option<Category>, TaskError> {
        let category = conn
            .query_row(
                "SELECT id, description FROM categories WHERE description = ?1",
                params![description],
                category_from_row,
            )
            .optional()?;
        Ok(category)
    }

    /// All categories, ordered by description.
    pub fn list_categories(conn: &Connection) -> Result<Vec<Category>, TaskError> {
        let mut stmt = conn.prepare("SELECT id, description FROM categories ORDER BY description")?;
        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let completed_at: Option<String> = row.get("completed_at")?;
    Ok(Task {
        id: row.get("id")?,
        description: row.get("description")?,
        category_id: row.get("category_id")?,
        owner_id: row.get("owner_id")?,
        status: TaskStatus::from_completed_at(completed_at.as_deref()),
        completed_at,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn category_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get("id")?,
        description: row.get("description")?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
