//! # tasklane-core
//!
//! Foundation types shared by every tasklane crate:
//!
//! - **Branded IDs**: `TaskId`, `TagId`, `ChecklistId`, ... as newtypes so a tag
//!   ID can never be passed where a task ID is expected
//! - **Principal**: the authenticated caller and its admin flag, supplied by
//!   the outer layer and never computed by the domain
//! - **Logging**: `tracing` subscriber setup and an in-memory capture layer
//!   for tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod principal;

pub use ids::{CategoryId, ChecklistId, ChecklistItemId, TagId, TaskId, UserId};
pub use principal::Principal;
