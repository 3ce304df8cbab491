//! Task facade: authorization, validation, then storage.
//!
//! Every operation runs against the `&Connection` its caller supplies, which in
//! production is an open transaction. Nothing here commits or rolls back; an
//! error simply propagates and the caller's transaction discards all writes.
//!
//! Rules enforced for every operation:
//!
//! - **Authentication**: no principal means `UnauthenticatedAccess`.
//! - **Ownership**: operations on an existing task need the owner or an admin.
//!   A missing task is reported as `NotFound` before ownership is checked, and
//!   no write happens until both checks pass.
//! - **Tag lifecycle**: a tag is ensured before its link is inserted, and
//!   released after its link is deleted, so no tag outlives its last link.

use rusqlite::Connection;
use serde::Serialize;
use tasklane_core::{CategoryId, Principal, TaskId};
use tracing::debug;

use crate::access::{ensure_task_access, require_admin, require_principal};
use crate::checklists::{ChecklistRepository, ChecklistSyncReport};
use crate::errors::{CATEGORY_EXISTS, TaskError};
use crate::repository::TaskRepository;
use crate::tags::TagRegistry;
use crate::types::{
    Category, Checklist, ChecklistInput, Tag, TagRelease, Task, TaskCreateParams, TaskPatch,
    TaskSummary, TaskWithDetails, normalized_description,
};

/// Result of deleting a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDeletion {
    /// The deleted task.
    pub task_id: TaskId,
    /// Links removed.
    pub tags_unlinked: usize,
    /// Tags deleted because the task held their last link.
    pub tags_collected: usize,
}

/// Result of replacing a task's checklists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistReplacement {
    /// What the reconciliation did.
    pub summary: ChecklistSyncReport,
    /// The checklists as now stored.
    pub checklists: Vec<Checklist>,
}

/// Task service with business rules and authorization.
pub struct TaskService;

impl TaskService {
    // ─────────────────────────────────────────────────────────────────────
    // Task lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create a task owned by the caller.
    pub fn create_task(
        conn: &Connection,
        principal: Option<&Principal>,
        params: &TaskCreateParams,
    ) -> Result<Task, TaskError> {
        let principal = require_principal(principal)?;
        let description = normalized_description(&params.description, "Task")?;
        ensure_category(conn, &params.category_id)?;

        let task = TaskRepository::create_task(
            conn,
            &principal.user_id,
            &TaskCreateParams {
                description: description.to_string(),
                category_id: params.category_id.clone(),
            },
        )?;
        debug!(task_id = %task.id, owner_id = %task.owner_id, "task created");
        Ok(task)
    }

    /// Change a task's description and/or category.
    pub fn patch_task(
        conn: &Connection,
        principal: Option<&Principal>,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, TaskError> {
        let principal = require_principal(principal)?;
        let _ = ensure_task_access(conn, principal, id)?;

        let description = patch
            .description
            .as_deref()
            .map(|d| normalized_description(d, "Task").map(str::to_string))
            .transpose()?;
        if let Some(ref category_id) = patch.category_id {
            ensure_category(conn, category_id)?;
        }

        let normalized = TaskPatch {
            description,
            category_id: patch.category_id.clone(),
        };
        if !normalized.is_empty() {
            let _ = TaskRepository::update_task(conn, id, &normalized)?;
            debug!(task_id = %id, "task patched");
        }
        load_task(conn, id)
    }

    /// Mark a task completed. Completing a completed task changes nothing.
    pub fn complete_task(
        conn: &Connection,
        principal: Option<&Principal>,
        id: &TaskId,
    ) -> Result<Task, TaskError> {
        let principal = require_principal(principal)?;
        let _ = ensure_task_access(conn, principal, id)?;
        let changed = TaskRepository::mark_completed(conn, id)?;
        debug!(task_id = %id, changed, "task completed");
        load_task(conn, id)
    }

    /// Reopen a task. Reopening an open task changes nothing.
    pub fn reopen_task(
        conn: &Connection,
        principal: Option<&Principal>,
        id: &TaskId,
    ) -> Result<Task, TaskError> {
        let principal = require_principal(principal)?;
        let _ = ensure_task_access(conn, principal, id)?;
        let changed = TaskRepository::mark_open(conn, id)?;
        debug!(task_id = %id, changed, "task reopened");
        load_task(conn, id)
    }

    /// Delete a task with its checklists and tag links.
    ///
    /// Each link is removed individually and its tag released, so tags used
    /// only by this task are deleted as well.
    pub fn delete_task(
        conn: &Connection,
        principal: Option<&Principal>,
        id: &TaskId,
    ) -> Result<TaskDeletion, TaskError> {
        let principal = require_principal(principal)?;
        let _ = ensure_task_access(conn, principal, id)?;

        let mut deletion = TaskDeletion {
            task_id: id.clone(),
            tags_unlinked: 0,
            tags_collected: 0,
        };
        for tag_id in TaskRepository::tag_ids_for_task(conn, id)? {
            if TaskRepository::delete_link(conn, id, &tag_id)? {
                deletion.tags_unlinked += 1;
            }
            if TagRegistry::release_tag(conn, &tag_id)? == TagRelease::Collected {
                deletion.tags_collected += 1;
            }
        }
        ChecklistRepository::delete_for_task(conn, id)?;
        let _ = TaskRepository::delete_task(conn, id)?;

        debug!(
            task_id = %id,
            tags_unlinked = deletion.tags_unlinked,
            tags_collected = deletion.tags_collected,
            "task deleted"
        );
        Ok(deletion)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tags
    // ─────────────────────────────────────────────────────────────────────

    /// Attach the tag described by `description`, creating the tag on first
    /// use. Attaching an already attached tag is a no-op.
    pub fn attach_tag(
        conn: &Connection,
        principal: Option<&Principal>,
        task_id: &TaskId,
        description: &str,
    ) -> Result<Tag, TaskError> {
        let principal = require_principal(principal)?;
        let _ = ensure_task_access(conn, principal, task_id)?;

        let tag_id = TagRegistry::ensure_tag(conn, description)?;
        let linked = TaskRepository::insert_link(conn, task_id, &tag_id)?;
        debug!(task_id = %task_id, tag_id = %tag_id, linked, "tag attached");

        TagRegistry::get_tag(conn, &tag_id)?
            .ok_or_else(|| TaskError::tag_not_found(tag_id.as_str()))
    }

    /// Detach the tag described by `description`. The tag itself is deleted
    /// once no task links to it.
    pub fn detach_tag(
        conn: &Connection,
        principal: Option<&Principal>,
        task_id: &TaskId,
        description: &str,
    ) -> Result<TagRelease, TaskError> {
        let principal = require_principal(principal)?;
        let _ = ensure_task_access(conn, principal, task_id)?;

        let description = normalized_description(description, "Tag")?;
        let tag_id = TagRegistry::find_by_description(conn, description)?
            .ok_or_else(|| TaskError::tag_not_found(description))?;

        let unlinked = TaskRepository::delete_link(conn, task_id, &tag_id)?;
        let release = TagRegistry::release_tag(conn, &tag_id)?;
        debug!(task_id = %task_id, tag_id = %tag_id, unlinked, ?release, "tag detached");
        Ok(release)
    }

    /// All tags.
    pub fn list_tags(conn: &Connection, principal: Option<&Principal>) -> Result<Vec<Tag>, TaskError> {
        let _ = require_principal(principal)?;
        TagRegistry::list_tags(conn)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Checklists
    // ─────────────────────────────────────────────────────────────────────

    /// Replace the task's checklists with `desired`.
    ///
    /// Inputs carrying the ID of an existing checklist (or item) of this task
    /// update it; inputs without a matching ID are created; persisted entries
    /// not named by any input are deleted.
    pub fn replace_checklists(
        conn: &Connection,
        principal: Option<&Principal>,
        task_id: &TaskId,
        desired: &[ChecklistInput],
    ) -> Result<ChecklistReplacement, TaskError> {
        let principal = require_principal(principal)?;
        let _ = ensure_task_access(conn, principal, task_id)?;

        let summary = ChecklistRepository::replace_for_task(conn, task_id, desired)?;
        let checklists = ChecklistRepository::list_for_task(conn, task_id)?;
        Ok(ChecklistReplacement {
            summary,
            checklists,
        })
    }

    /// Checklists of a task with their items.
    pub fn get_checklists(
        conn: &Connection,
        principal: Option<&Principal>,
        task_id: &TaskId,
    ) -> Result<Vec<Checklist>, TaskError> {
        let principal = require_principal(principal)?;
        let _ = ensure_task_access(conn, principal, task_id)?;
        ChecklistRepository::list_for_task(conn, task_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// A task with its tags and checklists.
    pub fn get_task(
        conn: &Connection,
        principal: Option<&Principal>,
        id: &TaskId,
    ) -> Result<TaskWithDetails, TaskError> {
        let principal = require_principal(principal)?;
        let _ = ensure_task_access(conn, principal, id)?;

        let task = load_task(conn, id)?;
        let tags = TaskRepository::tag_descriptions(conn, id)?;
        let checklists = ChecklistRepository::list_for_task(conn, id)?;
        Ok(TaskWithDetails {
            task,
            tags,
            checklists,
        })
    }

    /// Tasks visible to the caller: their own, or all of them for an admin.
    /// A blank search term is ignored.
    pub fn list_tasks(
        conn: &Connection,
        principal: Option<&Principal>,
        search_term: Option<&str>,
    ) -> Result<Vec<TaskSummary>, TaskError> {
        let principal = require_principal(principal)?;
        let owner = (!principal.admin).then_some(&principal.user_id);
        let term = search_term.map(str::trim).filter(|t| !t.is_empty());

        let tasks = TaskRepository::list_tasks(conn, owner, term)?;
        debug!(user_id = %principal.user_id, count = tasks.len(), "tasks listed");

        tasks
            .into_iter()
            .map(|task| {
                let tags = TaskRepository::tag_descriptions(conn, &task.id)?;
                Ok(TaskSummary { task, tags })
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Categories
    // ─────────────────────────────────────────────────────────────────────

    /// All categories.
    pub fn list_categories(
        conn: &Connection,
        principal: Option<&Principal>,
    ) -> Result<Vec<Category>, TaskError> {
        let _ = require_principal(principal)?;
        TaskRepository::list_categories(conn)
    }

    /// Create a category. Admin only.
    pub fn create_category(
        conn: &Connection,
        principal: Option<&Principal>,
        description: &str,
    ) -> Result<Category, TaskError> {
        let principal = require_principal(principal)?;
        require_admin(principal, "Category", description.trim())?;
        let description = normalized_description(description, "Category")?;

        if TaskRepository::find_category(conn, description)?.is_some() {
            return Err(TaskError::InvalidState {
                code: CATEGORY_EXISTS,
                message: format!("category '{description}' already exists"),
            });
        }
        let category = TaskRepository::create_category(conn, description)?;
        debug!(category_id = %category.id, description, "category created");
        Ok(category)
    }
}

fn ensure_category(conn: &Connection, id: &CategoryId) -> Result<(), TaskError> {
    if TaskRepository::category_exists(conn, id)? {
        Ok(())
    } else {
        Err(TaskError::category_not_found(id.as_str()))
    }
}

fn load_task(conn: &Connection, id: &TaskId) -> Result<Task, TaskError> {
    TaskRepository::get_task(conn, id)?.ok_or_else(|| TaskError::task_not_found(id.as_str()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::errors::TaskErrorKind;
    use crate::types::{ChecklistItemInput, TaskStatus};

    struct Fixture {
        conn: Connection,
        admin: Principal,
        owner: Principal,
        stranger: Principal,
        category: CategoryId,
    }

    fn setup() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        tasklane_store::run_migrations(&conn).unwrap();
        let admin = Principal::admin("user-admin");
        let category = TaskService::create_category(&conn, Some(&admin), "Home")
            .unwrap()
            .id;
        Fixture {
            conn,
            admin,
            owner: Principal::user("user-owner"),
            stranger: Principal::user("user-stranger"),
            category,
        }
    }

    fn new_task(fx: &Fixture, description: &str) -> Task {
        TaskService::create_task(
            &fx.conn,
            Some(&fx.owner),
            &TaskCreateParams {
                description: description.to_string(),
                category_id: fx.category.clone(),
            },
        )
        .unwrap()
    }

    #[test]
    fn create_requires_principal() {
        let fx = setup();
        let err = TaskService::create_task(
            &fx.conn,
            None,
            &TaskCreateParams {
                description: "x".into(),
                category_id: fx.category.clone(),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), TaskErrorKind::UnauthenticatedAccess);
    }

    #[test]
    fn create_trims_and_owns() {
        let fx = setup();
        let task = new_task(&fx, "  water plants  ");
        assert_eq!(task.description, "water plants");
        assert_eq!(task.owner_id, fx.owner.user_id);
        assert_eq!(task.status, TaskStatus::Open);
    }

    #[test]
    fn create_with_unknown_category() {
        let fx = setup();
        let err = TaskService::create_task(
            &fx.conn,
            Some(&fx.owner),
            &TaskCreateParams {
                description: "x".into(),
                category_id: CategoryId::from("cat-missing"),
            },
        )
        .unwrap_err();
        assert_matches!(err, TaskError::NotFound { entity: "Category", .. });
    }

    #[test]
    fn patch_changes_fields() {
        let fx = setup();
        let task = new_task(&fx, "old");
        let work = TaskService::create_category(&fx.conn, Some(&fx.admin), "Work").unwrap();

        let patched = TaskService::patch_task(
            &fx.conn,
            Some(&fx.owner),
            &task.id,
            &TaskPatch {
                description: Some("new".into()),
                category_id: Some(work.id.clone()),
            },
        )
        .unwrap();
        assert_eq!(patched.description, "new");
        assert_eq!(patched.category_id, work.id);
    }

    #[test]
    fn patch_rejects_blank_description() {
        let fx = setup();
        let task = new_task(&fx, "keep");
        let err = TaskService::patch_task(
            &fx.conn,
            Some(&fx.owner),
            &task.id,
            &TaskPatch {
                description: Some(" ".into()),
                category_id: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), TaskErrorKind::InvalidState);
    }

    #[test]
    fn empty_patch_returns_task_unchanged() {
        let fx = setup();
        let task = new_task(&fx, "same");
        let patched =
            TaskService::patch_task(&fx.conn, Some(&fx.owner), &task.id, &TaskPatch::default())
                .unwrap();
        assert_eq!(patched, task);
    }

    #[test]
    fn completion_state_machine() {
        let fx = setup();
        let task = new_task(&fx, "t");
        let p = Some(&fx.owner);

        let done = TaskService::complete_task(&fx.conn, p, &task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        let again = TaskService::complete_task(&fx.conn, p, &task.id).unwrap();
        assert_eq!(again.completed_at, done.completed_at);

        let open = TaskService::reopen_task(&fx.conn, p, &task.id).unwrap();
        assert_eq!(open.status, TaskStatus::Open);
        assert!(open.completed_at.is_none());
        let still_open = TaskService::reopen_task(&fx.conn, p, &task.id).unwrap();
        assert_eq!(still_open.status, TaskStatus::Open);
    }

    #[test]
    fn admin_may_modify_any_task() {
        let fx = setup();
        let task = new_task(&fx, "t");
        let done = TaskService::complete_task(&fx.conn, Some(&fx.admin), &task.id).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
    }

    #[test]
    fn stranger_is_denied_everywhere() {
        let fx = setup();
        let task = new_task(&fx, "mine");
        let s = Some(&fx.stranger);
        let id = &task.id;

        let results = [
            TaskService::patch_task(&fx.conn, s, id, &TaskPatch::default()).map(|_| ()),
            TaskService::complete_task(&fx.conn, s, id).map(|_| ()),
            TaskService::reopen_task(&fx.conn, s, id).map(|_| ()),
            TaskService::delete_task(&fx.conn, s, id).map(|_| ()),
            TaskService::attach_tag(&fx.conn, s, id, "x").map(|_| ()),
            TaskService::detach_tag(&fx.conn, s, id, "x").map(|_| ()),
            TaskService::replace_checklists(&fx.conn, s, id, &[]).map(|_| ()),
            TaskService::get_task(&fx.conn, s, id).map(|_| ()),
            TaskService::get_checklists(&fx.conn, s, id).map(|_| ()),
        ];
        for result in results {
            assert_matches!(result, Err(TaskError::AccessDenied { .. }));
        }
        assert!(TagRegistry::list_tags(&fx.conn).unwrap().is_empty());
    }

    #[test]
    fn missing_task_is_not_found_for_stranger() {
        let fx = setup();
        let err = TaskService::complete_task(&fx.conn, Some(&fx.stranger), &TaskId::from("task-x"))
            .unwrap_err();
        assert_eq!(err.kind(), TaskErrorKind::NotFound);
    }

    #[test]
    fn attach_is_idempotent() {
        let fx = setup();
        let task = new_task(&fx, "t");
        let first = TaskService::attach_tag(&fx.conn, Some(&fx.owner), &task.id, "home").unwrap();
        let second = TaskService::attach_tag(&fx.conn, Some(&fx.owner), &task.id, "home").unwrap();
        assert_eq!(first, second);
        assert_eq!(TagRegistry::link_count(&fx.conn, &first.id).unwrap(), 1);
    }

    #[test]
    fn detach_unknown_tag_is_not_found() {
        let fx = setup();
        let task = new_task(&fx, "t");
        let err = TaskService::detach_tag(&fx.conn, Some(&fx.owner), &task.id, "never")
            .unwrap_err();
        assert_matches!(err, TaskError::NotFound { entity: "Tag", .. });
    }

    #[test]
    fn detach_last_link_collects_tag() {
        let fx = setup();
        let task = new_task(&fx, "t");
        TaskService::attach_tag(&fx.conn, Some(&fx.owner), &task.id, "solo").unwrap();
        let release =
            TaskService::detach_tag(&fx.conn, Some(&fx.owner), &task.id, "solo").unwrap();
        assert_eq!(release, TagRelease::Collected);
        assert!(TagRegistry::find_by_description(&fx.conn, "solo").unwrap().is_none());
    }

    #[test]
    fn delete_task_collects_only_orphaned_tags() {
        let fx = setup();
        let a = new_task(&fx, "a");
        let b = new_task(&fx, "b");
        let p = Some(&fx.owner);
        TaskService::attach_tag(&fx.conn, p, &a.id, "shared").unwrap();
        TaskService::attach_tag(&fx.conn, p, &b.id, "shared").unwrap();
        TaskService::attach_tag(&fx.conn, p, &a.id, "only-a").unwrap();
        TaskService::replace_checklists(
            &fx.conn,
            p,
            &a.id,
            &[ChecklistInput {
                id: None,
                description: "steps".into(),
                items: vec![ChecklistItemInput {
                    description: "one".into(),
                    ..Default::default()
                }],
            }],
        )
        .unwrap();

        let deletion = TaskService::delete_task(&fx.conn, p, &a.id).unwrap();
        assert_eq!(deletion.tags_unlinked, 2);
        assert_eq!(deletion.tags_collected, 1);

        let remaining: Vec<String> = TagRegistry::list_tags(&fx.conn)
            .unwrap()
            .into_iter()
            .map(|t| t.description)
            .collect();
        assert_eq!(remaining, vec!["shared"]);
        assert!(TaskRepository::get_task(&fx.conn, &a.id).unwrap().is_none());
        assert!(ChecklistRepository::list_for_task(&fx.conn, &a.id).unwrap().is_empty());
    }

    #[test]
    fn get_task_includes_details() {
        let fx = setup();
        let task = new_task(&fx, "t");
        let p = Some(&fx.owner);
        TaskService::attach_tag(&fx.conn, p, &task.id, "b-tag").unwrap();
        TaskService::attach_tag(&fx.conn, p, &task.id, "a-tag").unwrap();
        TaskService::replace_checklists(
            &fx.conn,
            p,
            &task.id,
            &[ChecklistInput {
                description: "list".into(),
                ..Default::default()
            }],
        )
        .unwrap();

        let details = TaskService::get_task(&fx.conn, p, &task.id).unwrap();
        assert_eq!(details.task.id, task.id);
        assert_eq!(details.tags, vec!["a-tag", "b-tag"]);
        assert_eq!(details.checklists.len(), 1);
    }

    #[test]
    fn list_scopes_by_principal() {
        let fx = setup();
        new_task(&fx, "Buy milk");
        new_task(&fx, "walk dog");
        TaskService::create_task(
            &fx.conn,
            Some(&fx.stranger),
            &TaskCreateParams {
                description: "buy stamps".into(),
                category_id: fx.category.clone(),
            },
        )
        .unwrap();

        let mine = TaskService::list_tasks(&fx.conn, Some(&fx.owner), None).unwrap();
        assert_eq!(mine.len(), 2);

        let all = TaskService::list_tasks(&fx.conn, Some(&fx.admin), Some("  ")).unwrap();
        assert_eq!(all.len(), 3);

        let buys = TaskService::list_tasks(&fx.conn, Some(&fx.admin), Some("buy")).unwrap();
        assert_eq!(buys.len(), 2);

        assert_matches!(
            TaskService::list_tasks(&fx.conn, None, None),
            Err(TaskError::UnauthenticatedAccess)
        );
    }

    #[test]
    fn list_includes_tags() {
        let fx = setup();
        let task = new_task(&fx, "t");
        TaskService::attach_tag(&fx.conn, Some(&fx.owner), &task.id, "x").unwrap();
        let listed = TaskService::list_tasks(&fx.conn, Some(&fx.owner), None).unwrap();
        assert_eq!(listed[0].tags, vec!["x"]);
    }

    #[test]
    fn categories_are_admin_managed() {
        let fx = setup();
        assert_matches!(
            TaskService::create_category(&fx.conn, Some(&fx.owner), "Work"),
            Err(TaskError::AccessDenied { entity: "Category", .. })
        );
        let dup = TaskService::create_category(&fx.conn, Some(&fx.admin), "Home").unwrap_err();
        assert_eq!(dup.code(), CATEGORY_EXISTS);

        let names: Vec<String> = TaskService::list_categories(&fx.conn, Some(&fx.owner))
            .unwrap()
            .into_iter()
            .map(|c| c.description)
            .collect();
        assert_eq!(names, vec!["Home"]);
    }

    #[test]
    fn list_tags_requires_principal() {
        let fx = setup();
        assert_matches!(
            TaskService::list_tags(&fx.conn, None),
            Err(TaskError::UnauthenticatedAccess)
        );
        assert!(TaskService::list_tags(&fx.conn, Some(&fx.owner)).unwrap().is_empty());
    }
}
