//! # tasklane-tasks
//!
//! The task aggregate over `SQLite`.
//!
//! - [`reconcile`] diffs a desired collection against a persisted one and
//!   drives caller-supplied create/update/remove callbacks
//! - [`TagRegistry`] keeps shared tags alive exactly as long as some task
//!   links to them
//! - [`TaskService`] is the facade: authorization first, then storage, all on
//!   the caller's transaction

#![deny(unsafe_code)]

pub mod access;
pub mod checklists;
pub mod errors;
pub mod reconcile;
pub mod repository;
pub mod service;
pub mod tags;
pub mod types;

pub use checklists::{ChecklistRepository, ChecklistSyncReport};
pub use errors::{TaskError, TaskErrorKind};
pub use reconcile::{ReconcileSummary, reconcile};
pub use repository::TaskRepository;
pub use service::{ChecklistReplacement, TaskDeletion, TaskService};
pub use tags::TagRegistry;
pub use types::{
    Category, Checklist, ChecklistInput, ChecklistItem, ChecklistItemInput, Tag, TagColor,
    TagRelease, Task, TaskCreateParams, TaskPatch, TaskStatus, TaskSummary, TaskWithDetails,
};
