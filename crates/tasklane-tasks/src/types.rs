//! Domain types for the task aggregate.
//!
//! Read models (`Task`, `Tag`, `Checklist`, ...) serialize camelCase for the
//! outer layers. Input types (`TaskCreateParams`, `ChecklistInput`, ...) are
//! what a caller submits; an input whose `id` is `None` always denotes a new
//! entity.

use std::fmt;

use serde::{Deserialize, Serialize};
use tasklane_core::{CategoryId, ChecklistId, ChecklistItemId, TagId, TaskId, UserId};

use crate::errors::TaskError;

// ─────────────────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────────────────

/// Completion state, derived from `completed_at`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not completed (initial state).
    Open,
    /// Has a completion timestamp.
    Completed,
}

impl TaskStatus {
    /// Derive the status from a nullable completion timestamp.
    pub fn from_completed_at(completed_at: Option<&str>) -> Self {
        if completed_at.is_some() {
            Self::Completed
        } else {
            Self::Open
        }
    }
}

/// A persisted task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task ID.
    pub id: TaskId,
    /// Free-text description.
    pub description: String,
    /// Category the task belongs to.
    pub category_id: CategoryId,
    /// Creator and owner.
    pub owner_id: UserId,
    /// Derived from `completed_at`.
    pub status: TaskStatus,
    /// When the task was completed, if it is.
    pub completed_at: Option<String>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Last modification timestamp (ISO 8601).
    pub updated_at: String,
}

/// A task with its tag descriptions, as listed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    /// The task itself.
    #[serde(flatten)]
    pub task: Task,
    /// Descriptions of the attached tags, alphabetical.
    pub tags: Vec<String>,
}

/// A task with its full nested state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskWithDetails {
    /// The task itself.
    #[serde(flatten)]
    pub task: Task,
    /// Descriptions of the attached tags, alphabetical.
    pub tags: Vec<String>,
    /// Checklists with items, in position order.
    pub checklists: Vec<Checklist>,
}

/// Parameters for creating a task.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreateParams {
    /// Description (required, non-blank).
    pub description: String,
    /// Existing category.
    pub category_id: CategoryId,
}

/// Partial update of a task's plain fields. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// New description.
    pub description: Option<String>,
    /// New category.
    pub category_id: Option<CategoryId>,
}

impl TaskPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.category_id.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Category
// ─────────────────────────────────────────────────────────────────────────────

/// A task category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Category ID.
    pub id: CategoryId,
    /// Unique description.
    pub description: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tag
// ─────────────────────────────────────────────────────────────────────────────

/// Display color of a tag, stored as `#rrggbb`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagColor(String);

impl TagColor {
    /// Color from its RGB components.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(format!("#{r:02x}{g:02x}{b:02x}"))
    }

    /// A uniformly random color.
    pub fn random() -> Self {
        let [r, g, b] = rand::random::<[u8; 3]>();
        Self::from_rgb(r, g, b)
    }

    /// Wrap a stored value as-is.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// The `#rrggbb` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A shared tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Tag ID.
    pub id: TagId,
    /// Unique description, used as the lookup key.
    pub description: String,
    /// Display color assigned on creation.
    pub color: TagColor,
}

/// What releasing a tag reference did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TagRelease {
    /// Other links still reference the tag.
    Retained {
        /// Links left after the release.
        links: u32,
    },
    /// No links remained and the tag row was deleted.
    Collected,
}

// ─────────────────────────────────────────────────────────────────────────────
// Checklists
// ─────────────────────────────────────────────────────────────────────────────

/// A persisted checklist with its items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    /// Checklist ID.
    pub id: ChecklistId,
    /// Owning task.
    pub task_id: TaskId,
    /// Description.
    pub description: String,
    /// Zero-based position within the task.
    pub position: i64,
    /// Items in position order.
    pub items: Vec<ChecklistItem>,
}

/// A persisted checklist item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    /// Item ID.
    pub id: ChecklistItemId,
    /// Owning checklist.
    pub checklist_id: ChecklistId,
    /// Description.
    pub description: String,
    /// Whether the item is checked off.
    pub completed: bool,
    /// Zero-based position within the checklist.
    pub position: i64,
}

/// Desired state of one checklist.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistInput {
    /// Existing checklist to keep, or `None` to create one.
    #[serde(default)]
    pub id: Option<ChecklistId>,
    /// Description.
    pub description: String,
    /// Desired items, in order.
    #[serde(default)]
    pub items: Vec<ChecklistItemInput>,
}

/// Desired state of one checklist item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItemInput {
    /// Existing item to keep, or `None` to create one.
    #[serde(default)]
    pub id: Option<ChecklistItemId>,
    /// Description.
    pub description: String,
    /// Whether the item is checked off.
    #[serde(default)]
    pub completed: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

/// Trim `raw` and reject it if nothing is left.
///
/// `what` names the entity in the error message.
pub fn normalized_description<'a>(raw: &'a str, what: &str) -> Result<&'a str, TaskError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TaskError::invalid_description(what));
    }
    Ok(trimmed)
}

/// Check every description in a desired checklist set.
pub fn validate_checklists(desired: &[ChecklistInput]) -> Result<(), TaskError> {
    for checklist in desired {
        let _ = normalized_description(&checklist.description, "Checklist")?;
        for item in &checklist.items {
            let _ = normalized_description(&item.description, "Checklist item")?;
        }
    }
    Ok(())
}
