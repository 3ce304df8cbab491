//! Authentication and ownership checks run before any write.

use rusqlite::Connection;
use tasklane_core::{Principal, TaskId, UserId};
use tracing::warn;

use crate::errors::TaskError;
use crate::repository::TaskRepository;

/// The principal, or `UnauthenticatedAccess` if there is none.
pub fn require_principal(principal: Option<&Principal>) -> Result<&Principal, TaskError> {
    principal.ok_or(TaskError::UnauthenticatedAccess)
}

/// Confirm `principal` may modify the task and return its owner.
///
/// A missing task is `NotFound`, checked before ownership.
pub fn ensure_task_access(
    conn: &Connection,
    principal: &Principal,
    task_id: &TaskId,
) -> Result<UserId, TaskError> {
    let owner = TaskRepository::owner_of(conn, task_id)?
        .ok_or_else(|| TaskError::task_not_found(task_id.as_str()))?;

    if !principal.can_modify(&owner) {
        warn!(
            task_id = %task_id,
            user_id = %principal.user_id,
            owner_id = %owner,
            "task access denied"
        );
        return Err(TaskError::AccessDenied {
            entity: "Task",
            id: task_id.to_string(),
        });
    }
    Ok(owner)
}

/// Require administrative privilege for an action on `entity`.
pub fn require_admin(principal: &Principal, entity: &'static str, id: &str) -> Result<(), TaskError> {
    if principal.admin {
        return Ok(());
    }
    warn!(user_id = %principal.user_id, entity, id, "admin privilege required");
    Err(TaskError::AccessDenied {
        entity,
        id: id.to_string(),
    })
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use assert_matches::assert_matches;
    use tasklane_core::logging::capture_logs;
    use tracing::Level;

    use super::*;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        tasklane_store::run_migrations(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO categories (id, description) VALUES ('cat-1', 'Home');
             INSERT INTO tasks (id, description, category_id, owner_id)
                 VALUES ('task-1', 'T', 'cat-1', 'user-owner');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn missing_principal_is_unauthenticated() {
        assert_matches!(require_principal(None), Err(TaskError::UnauthenticatedAccess));
        let p = Principal::user("user-1");
        assert_eq!(require_principal(Some(&p)).unwrap(), &p);
    }

    #[test]
    fn owner_and_admin_allowed() {
        let conn = setup_db();
        let task = TaskId::from("task-1");
        let owner = ensure_task_access(&conn, &Principal::user("user-owner"), &task).unwrap();
        assert_eq!(owner.as_str(), "user-owner");
        assert!(ensure_task_access(&conn, &Principal::admin("user-root"), &task).is_ok());
    }

    #[test]
    fn stranger_denied_and_logged() {
        let (logs, _guard) = capture_logs();
        let conn = setup_db();
        let err =
            ensure_task_access(&conn, &Principal::user("user-other"), &TaskId::from("task-1"))
                .unwrap_err();
        assert_matches!(err, TaskError::AccessDenied { entity: "Task", .. });
        assert!(logs.has_event(Level::WARN, "task access denied"));
    }

    #[test]
    fn not_found_wins_over_denial() {
        let conn = setup_db();
        let err = ensure_task_access(&conn, &Principal::user("user-other"), &TaskId::from("task-x"))
            .unwrap_err();
        assert_matches!(err, TaskError::NotFound { entity: "Task", .. });
    }

    #[test]
    fn admin_gate() {
        assert!(require_admin(&Principal::admin("user-root"), "Category", "Home").is_ok());
        assert_matches!(
            require_admin(&Principal::user("user-1"), "Category", "Home"),
            Err(TaskError::AccessDenied { entity: "Category", .. })
        );
    }
}
