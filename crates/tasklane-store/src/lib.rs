//! # tasklane-store
//!
//! `SQLite` persistence plumbing for tasklane: a pooled connection factory
//! with WAL and foreign keys on, the embedded schema migrations, and
//! [`Database::transaction`], the single place where units of work begin,
//! commit, and roll back.

#![deny(unsafe_code)]

pub mod connection;
pub mod database;
pub mod errors;
pub mod migrations;

pub use connection::{ConnectionConfig, ConnectionPool, PooledConnection};
pub use database::Database;
pub use errors::{Result, StoreError};
pub use migrations::{current_version, latest_version, run_migrations};
