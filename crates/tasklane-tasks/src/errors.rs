//! Task error types.
//!
//! Every failure the facade can raise is a typed variant. Outer layers map
//! them through [`TaskError::kind`] and never parse messages.

use tasklane_store::StoreError;
use thiserror::Error;

/// Errors from task, tag, and checklist operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Pool or transaction plumbing failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type (e.g. "Task", "Tag", "Category").
        entity: &'static str,
        /// The ID or key that was looked up.
        id: String,
    },

    /// The caller is neither the owner nor an administrator.
    #[error("Access denied to {entity} {id}")]
    AccessDenied {
        /// Entity type the caller tried to touch.
        entity: &'static str,
        /// The ID or key of that entity.
        id: String,
    },

    /// No authenticated caller.
    #[error("Authentication required")]
    UnauthenticatedAccess,

    /// Malformed input, or a conflict a re-read could not resolve.
    #[error("Invalid state ({code}): {message}")]
    InvalidState {
        /// Stable machine-readable code.
        code: &'static str,
        /// Human-readable detail.
        message: String,
    },
}

/// Coarse classification of a [`TaskError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskErrorKind {
    /// Missing task, checklist, category, or tag.
    NotFound,
    /// Ownership or admin check failed.
    AccessDenied,
    /// No principal.
    UnauthenticatedAccess,
    /// Bad input or unresolvable conflict.
    InvalidState,
    /// Infrastructure failure.
    Storage,
}

/// Code for an empty or whitespace-only description.
pub const INVALID_DESCRIPTION: &str = "INVALID_DESCRIPTION";

/// Code for a tag insert that collided and then vanished on re-read.
pub const TAG_CONFLICT: &str = "TAG_CONFLICT";

/// Code for creating a category whose description is taken.
pub const CATEGORY_EXISTS: &str = "CATEGORY_EXISTS";

impl TaskError {
    /// Classify this error.
    pub fn kind(&self) -> TaskErrorKind {
        match self {
            Self::NotFound { .. } => TaskErrorKind::NotFound,
            Self::AccessDenied { .. } => TaskErrorKind::AccessDenied,
            Self::UnauthenticatedAccess => TaskErrorKind::UnauthenticatedAccess,
            Self::InvalidState { .. } => TaskErrorKind::InvalidState,
            Self::Database(_) | Self::Store(_) => TaskErrorKind::Storage,
        }
    }

    /// Stable code suitable for wire responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AccessDenied { .. } => "ACCESS_DENIED",
            Self::UnauthenticatedAccess => "UNAUTHENTICATED",
            Self::InvalidState { code, .. } => *code,
            Self::Database(_) | Self::Store(_) => "STORAGE_ERROR",
        }
    }

    /// Create a not-found error for a task.
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Task",
            id: id.into(),
        }
    }

    /// Create a not-found error for a tag.
    pub fn tag_not_found(key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Tag",
            id: key.into(),
        }
    }

    /// Create a not-found error for a category.
    pub fn category_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Category",
            id: id.into(),
        }
    }

    /// Create an invalid-description error.
    pub fn invalid_description(what: &str) -> Self {
        Self::InvalidState {
            code: INVALID_DESCRIPTION,
            message: format!("{what} description must not be empty"),
        }
    }
}
