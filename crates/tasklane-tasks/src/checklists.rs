//! Checklists and their items: storage and replace-by-reconciliation.
//!
//! [`ChecklistRepository::replace_for_task`] turns the persisted checklists of
//! a task into the submitted desired set. Checklists are reconciled by ID, and
//! each kept or newly created checklist has its items reconciled the same way.
//! Entities created here always get fresh IDs, even if the submitted input
//! carried an ID that matched nothing.

use std::cell::Cell;

use rusqlite::{Connection, params};
use serde::Serialize;
use tasklane_core::{ChecklistId, ChecklistItemId, TaskId};
use tracing::debug;

use crate::errors::TaskError;
use crate::reconcile::{ReconcileSummary, reconcile};
use crate::types::{
    Checklist, ChecklistInput, ChecklistItem, ChecklistItemInput, validate_checklists,
};

/// Counts from one checklist replacement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChecklistSyncReport {
    /// Checklist-level changes.
    pub checklists: ReconcileSummary,
    /// Item-level changes, summed over every checklist.
    pub items: ReconcileSummary,
}

fn same_checklist(desired: &ChecklistInput, persisted: &Checklist) -> bool {
    desired.id.as_ref().is_some_and(|id| *id == persisted.id)
}

fn same_item(desired: &ChecklistItemInput, persisted: &ChecklistItem) -> bool {
    desired.id.as_ref().is_some_and(|id| *id == persisted.id)
}

/// Pair each element with its zero-based position.
fn positioned<T>(items: &[T]) -> Vec<(i64, &T)> {
    (0_i64..).zip(items).collect()
}

/// Checklist repository for SQL CRUD and reconciliation.
pub struct ChecklistRepository;

impl ChecklistRepository {
    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// All checklists of a task with their items, in position order.
    pub fn list_for_task(conn: &Connection, task_id: &TaskId) -> Result<Vec<Checklist>, TaskError> {
        let mut stmt = conn.prepare(
            "SELECT id, task_id, description, position FROM checklists
             WHERE task_id = ?1 ORDER BY position, id",
        )?;
        let mut checklists = stmt
            .query_map(params![task_id], |row| {
                Ok(Checklist {
                    id: row.get("id")?,
                    task_id: row.get("task_id")?,
                    description: row.get("description")?,
                    position: row.get("position")?,
                    items: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for checklist in &mut checklists {
            checklist.items = Self::list_items(conn, &checklist.id)?;
        }
        Ok(checklists)
    }

    /// Items of one checklist, in position order.
    pub fn list_items(
        conn: &Connection,
        checklist_id: &ChecklistId,
    ) -> Result<Vec<ChecklistItem>, TaskError> {
        let mut stmt = conn.prepare(
            "SELECT id, checklist_id, description, completed, position FROM checklist_items
             WHERE checklist_id = ?1 ORDER BY position, id",
        )?;
        let items = stmt
            .query_map(params![checklist_id], |row| {
                Ok(ChecklistItem {
                    id: row.get("id")?,
                    checklist_id: row.get("checklist_id")?,
                    description: row.get("description")?,
                    completed: row.get("completed")?,
                    position: row.get("position")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reconciliation
    // ─────────────────────────────────────────────────────────────────────

    /// Make the task's checklists match `desired`.
    ///
    /// Every description is validated before the first write.
    pub fn replace_for_task(
        conn: &Connection,
        task_id: &TaskId,
        desired: &[ChecklistInput],
    ) -> Result<ChecklistSyncReport, TaskError> {
        validate_checklists(desired)?;
        let persisted = Self::list_for_task(conn, task_id)?;
        let items = Cell::new(ReconcileSummary::default());

        let checklists = reconcile::<_, _, TaskError, _, _, _, _>(
            &positioned(desired),
            &persisted,
            |(_, d), p| same_checklist(d, p),
            |&(position, d)| {
                let id = Self::insert_checklist(conn, task_id, d, position)?;
                let summary = Self::reconcile_items(conn, &id, &d.items, &[])?;
                items.set(items.get() + summary);
                Ok(())
            },
            |&(position, d), p| {
                Self::update_checklist(conn, &p.id, d, position)?;
                let summary = Self::reconcile_items(conn, &p.id, &d.items, &p.items)?;
                items.set(items.get() + summary);
                Ok(())
            },
            |p| Self::delete_checklist(conn, &p.id),
        )?;

        let report = ChecklistSyncReport {
            checklists,
            items: items.get(),
        };
        debug!(
            task_id = %task_id,
            checklists_created = report.checklists.created,
            checklists_updated = report.checklists.updated,
            checklists_removed = report.checklists.removed,
            items_created = report.items.created,
            items_updated = report.items.updated,
            items_removed = report.items.removed,
            "checklists reconciled"
        );
        Ok(report)
    }

    fn reconcile_items(
        conn: &Connection,
        checklist_id: &ChecklistId,
        desired: &[ChecklistItemInput],
        persisted: &[ChecklistItem],
    ) -> Result<ReconcileSummary, TaskError> {
        reconcile(
            &positioned(desired),
            persisted,
            |(_, d), p| same_item(d, p),
            |&(position, d)| Self::insert_item(conn, checklist_id, d, position),
            |&(position, d), p| Self::update_item(conn, &p.id, d, position),
            |p| Self::delete_item(conn, &p.id),
        )
    }

    // ─────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────

    fn insert_checklist(
        conn: &Connection,
        task_id: &TaskId,
        input: &ChecklistInput,
        position: i64,
    ) -> Result<ChecklistId, TaskError> {
        let id = ChecklistId::generate();
        let _ = conn.execute(
            "INSERT INTO checklists (id, task_id, description, position) VALUES (?1, ?2, ?3, ?4)",
            params![id, task_id, input.description.trim(), position],
        )?;
        Ok(id)
    }

    fn update_checklist(
        conn: &Connection,
        id: &ChecklistId,
        input: &ChecklistInput,
        position: i64,
    ) -> Result<(), TaskError> {
        let _ = conn.execute(
            "UPDATE checklists SET description = ?1, position = ?2 WHERE id = ?3",
            params![input.description.trim(), position, id],
        )?;
        Ok(())
    }

    /// Delete a checklist and its items.
    fn delete_checklist(conn: &Connection, id: &ChecklistId) -> Result<(), TaskError> {
        let _ = conn.execute(
            "DELETE FROM checklist_items WHERE checklist_id = ?1",
            params![id],
        )?;
        let _ = conn.execute("DELETE FROM checklists WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn insert_item(
        conn: &Connection,
        checklist_id: &ChecklistId,
        input: &ChecklistItemInput,
        position: i64,
    ) -> Result<(), TaskError> {
        let _ = conn.execute(
            "INSERT INTO checklist_items (id, checklist_id, description, completed, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ChecklistItemId::generate(),
                checklist_id,
                input.description.trim(),
                input.completed,
                position
            ],
        )?;
        Ok(())
    }

    fn update_item(
        conn: &Connection,
        id: &ChecklistItemId,
        input: &ChecklistItemInput,
        position: i64,
    ) -> Result<(), TaskError> {
        let _ = conn.execute(
            "UPDATE checklist_items SET description = ?1, completed = ?2, position = ?3
             WHERE id = ?4",
            params![input.description.trim(), input.completed, position, id],
        )?;
        Ok(())
    }

    fn delete_item(conn: &Connection, id: &ChecklistItemId) -> Result<(), TaskError> {
        let _ = conn.execute("DELETE FROM checklist_items WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Delete every checklist and item of a task.
    pub fn delete_for_task(conn: &Connection, task_id: &TaskId) -> Result<(), TaskError> {
        let _ = conn.execute(
            "DELETE FROM checklist_items
             WHERE checklist_id IN (SELECT id FROM checklists WHERE task_id = ?1)",
            params![task_id],
        )?;
        let _ = conn.execute("DELETE FROM checklists WHERE task_id = ?1", params![task_id])?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
