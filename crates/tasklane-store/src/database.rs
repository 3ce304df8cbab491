//! The transaction boundary.
//!
//! [`Database`] owns the pool and is the only place a transaction begins or
//! ends. Domain code receives the open transaction as a plain `&Connection`
//! and never commits on its own.

use std::fmt::Display;
use std::path::Path;

use rusqlite::{Transaction, TransactionBehavior};
use tasklane_settings::DatabaseSettings;
use tracing::{debug, warn};

use crate::connection::{self, ConnectionConfig, ConnectionPool};
use crate::errors::{Result, StoreError};
use crate::migrations;

/// A migrated database behind a connection pool.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Open (creating if needed) the database file named by `settings` and
    /// bring its schema up to date.
    pub fn open(settings: &DatabaseSettings) -> Result<Self> {
        Self::open_path(&settings.path, &ConnectionConfig::from(settings))
    }

    /// Open the database at `path` with explicit pool settings.
    pub fn open_path(path: &Path, config: &ConnectionConfig) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        debug!(?path, pool_size = config.pool_size, "opening database");
        let pool = connection::new_file(path, config)?;
        Self::migrated(pool)
    }

    /// A private in-memory database, migrated and ready.
    pub fn open_in_memory() -> Result<Self> {
        let pool = connection::new_in_memory(&ConnectionConfig::default())?;
        Self::migrated(pool)
    }

    fn migrated(pool: ConnectionPool) -> Result<Self> {
        let conn = pool.get()?;
        let _ = migrations::run_migrations(&conn)?;
        drop(conn);
        Ok(Self { pool })
    }

    /// The schema version currently applied.
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.pool.get()?;
        migrations::current_version(&conn)
    }

    /// Run `f` inside one write transaction.
    ///
    /// The transaction starts `IMMEDIATE`, taking the write lock up front so
    /// concurrent writers serialize instead of failing mid-way. It commits when
    /// `f` returns `Ok` and rolls back otherwise, leaving no partial writes.
    pub fn transaction<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> std::result::Result<T, E>,
        E: From<StoreError> + Display,
    {
        let mut conn = self.pool.get().map_err(StoreError::from)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "transaction rolled back");
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
