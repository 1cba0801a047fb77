//! Driven ports for the dependency-ordered purge.
//!
//! A [`PurgeStore`] hands out [`PurgeSession`]s. A session owns one store
//! connection for its whole lifetime so that relaxing referential integrity
//! stays scoped to that connection. Dropping a session must release the
//! connection without returning it to any pool, which also discards a relaxed
//! setting if [`PurgeSession::restore_enforcement`] never ran.

use async_trait::async_trait;

use crate::domain::purge::PurgeTarget;

use super::define_port_error;

define_port_error! {
    /// Errors raised by purge adapters.
    pub enum PurgeStoreError {
        /// A dedicated connection could not be opened.
        Connection { message: String } => "purge connection failed: {message}",
        /// Referential-integrity enforcement could not be changed or verified.
        Enforcement { message: String } => "referential integrity toggle failed: {message}",
        /// The statement exceeded its time budget.
        Timeout { message: String } => "purge statement timed out: {message}",
        /// Any other query failure.
        Query { message: String } => "purge query failed: {message}",
    }
}

/// Source of purge sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurgeStore: Send + Sync {
    /// Open a session on a connection nobody else can use.
    async fn open_session(&self) -> Result<Box<dyn PurgeSession>, PurgeStoreError>;
}

/// One connection's worth of purge operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurgeSession: Send {
    /// Stop enforcing foreign keys for this session.
    async fn relax_enforcement(&mut self) -> Result<(), PurgeStoreError>;

    /// Whether the target's table exists.
    async fn table_exists(&mut self, target: PurgeTarget) -> Result<bool, PurgeStoreError>;

    /// Delete every row of the target's table, returning the row count.
    async fn delete_all(&mut self, target: PurgeTarget) -> Result<u64, PurgeStoreError>;

    /// Restart the table's identity sequence.
    ///
    /// Returns `false` when the table has no identity column.
    async fn reset_identity(&mut self, target: PurgeTarget) -> Result<bool, PurgeStoreError>;

    /// Enforce foreign keys again and confirm the setting took effect.
    async fn restore_enforcement(&mut self) -> Result<(), PurgeStoreError>;
}

/// Fixture store whose sessions see no tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixturePurgeStore;

#[async_trait]
impl PurgeStore for FixturePurgeStore {
    async fn open_session(&self) -> Result<Box<dyn PurgeSession>, PurgeStoreError> {
        Ok(Box::new(FixturePurgeSession))
    }
}

/// Session used by [`FixturePurgeStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FixturePurgeSession;

#[async_trait]
impl PurgeSession for FixturePurgeSession {
    async fn relax_enforcement(&mut self) -> Result<(), PurgeStoreError> {
        Ok(())
    }

    async fn table_exists(&mut self, _target: PurgeTarget) -> Result<bool, PurgeStoreError> {
        Ok(false)
    }

    async fn delete_all(&mut self, _target: PurgeTarget) -> Result<u64, PurgeStoreError> {
        Ok(0)
    }

    async fn reset_identity(&mut self, _target: PurgeTarget) -> Result<bool, PurgeStoreError> {
        Ok(false)
    }

    async fn restore_enforcement(&mut self) -> Result<(), PurgeStoreError> {
        Ok(())
    }
}
