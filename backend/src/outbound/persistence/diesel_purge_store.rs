//! PostgreSQL purge sessions.
//!
//! Each session owns a dedicated connection outside the pool. Foreign-key
//! enforcement is relaxed with `session_replication_role = replica`, which
//! only affects that connection. Dropping the session closes the connection,
//! so the setting cannot outlive it even when the caller is cancelled.
//!
//! A session-level advisory lock serialises purges across processes. Writes
//! from other sessions are not blocked: rows inserted into a table being
//! purged while enforcement is relaxed are checked normally by their own
//! sessions, but a purge racing with writers can still leave children behind
//! whose parents it deleted.

use std::time::Duration;

use async_trait::async_trait;
use diesel::QueryableByName;
use diesel::sql_types::{BigInt, Bool, Text};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{PurgeSession, PurgeStore, PurgeStoreError};
use crate::domain::purge::PurgeTarget;

use super::diesel_helpers::{DieselFailure, FailureClass, pool_error_message};
use super::pool::DbPool;

/// Advisory lock key shared by every purge.
const PURGE_LOCK_KEY: i64 = 0x7265_6769_7374_7261;

#[derive(QueryableByName)]
struct SettingRow {
    #[diesel(sql_type = Text)]
    value: String,
}

#[derive(QueryableByName)]
struct FlagRow {
    #[diesel(sql_type = Bool)]
    flag: bool,
}

/// Diesel implementation of [`PurgeStore`].
#[derive(Clone)]
pub struct DieselPurgeStore {
    pool: DbPool,
    statement_timeout_ms: u64,
}

impl DieselPurgeStore {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            statement_timeout_ms: 60_000,
        }
    }

    /// Server-side bound on every statement in a session, including the wait
    /// for the advisory lock.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

fn map_diesel_error(error: diesel::result::Error, operation: &str) -> PurgeStoreError {
    let failure = DieselFailure::classify(error, operation);
    match failure.class {
        FailureClass::Transient => PurgeStoreError::connection(failure.message),
        FailureClass::Timeout => PurgeStoreError::timeout(failure.message),
        FailureClass::Conflict | FailureClass::Query => {
            PurgeStoreError::query(failure.message)
        }
    }
}

#[async_trait]
impl PurgeStore for DieselPurgeStore {
    async fn open_session(&self) -> Result<Box<dyn PurgeSession>, PurgeStoreError> {
        let mut conn = self
            .pool
            .dedicated()
            .await
            .map_err(|err| PurgeStoreError::connection(pool_error_message(err)))?;

        diesel::sql_query(format!("SET statement_timeout = {}", self.statement_timeout_ms))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "set statement timeout"))?;
        diesel::sql_query("SELECT pg_advisory_lock($1)")
            .bind::<BigInt, _>(PURGE_LOCK_KEY)
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, "acquire purge lock"))?;
        debug!("purge session opened");

        Ok(Box::new(DieselPurgeSession { conn }))
    }
}

/// One purge session on a dedicated connection.
pub struct DieselPurgeSession {
    conn: AsyncPgConnection,
}

impl DieselPurgeSession {
    async fn set_replication_role(&mut self, role: &'static str) -> Result<(), PurgeStoreError> {
        diesel::sql_query(format!("SET session_replication_role = {role}"))
            .execute(&mut self.conn)
            .await
            .map_err(|err| PurgeStoreError::enforcement(err.to_string()))?;

        let current: SettingRow =
            diesel::sql_query("SELECT current_setting('session_replication_role') AS value")
                .get_result(&mut self.conn)
                .await
                .map_err(|err| PurgeStoreError::enforcement(err.to_string()))?;
        if current.value != role {
            return Err(PurgeStoreError::enforcement(format!(
                "session_replication_role is {} instead of {role}",
                current.value
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PurgeSession for DieselPurgeSession {
    async fn relax_enforcement(&mut self) -> Result<(), PurgeStoreError> {
        self.set_replication_role("replica").await
    }

    async fn table_exists(&mut self, target: PurgeTarget) -> Result<bool, PurgeStoreError> {
        let row: FlagRow = diesel::sql_query("SELECT to_regclass($1) IS NOT NULL AS flag")
            .bind::<Text, _>(target.table_name())
            .get_result(&mut self.conn)
            .await
            .map_err(|err| map_diesel_error(err, "check table"))?;
        Ok(row.flag)
    }

    async fn delete_all(&mut self, target: PurgeTarget) -> Result<u64, PurgeStoreError> {
        // Table names come from the static catalogue, never from callers.
        let deleted = diesel::sql_query(format!("DELETE FROM \"{}\"", target.table_name()))
            .execute(&mut self.conn)
            .await
            .map_err(|err| map_diesel_error(err, "delete rows"))?;
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }

    async fn reset_identity(&mut self, target: PurgeTarget) -> Result<bool, PurgeStoreError> {
        let row: FlagRow = diesel::sql_query(
            "SELECT setval(pg_get_serial_sequence($1, 'id'), 1, false) IS NOT NULL AS flag",
        )
        .bind::<Text, _>(target.table_name())
        .get_result(&mut self.conn)
        .await
        .map_err(|err| map_diesel_error(err, "reset identity"))?;
        Ok(row.flag)
    }

    async fn restore_enforcement(&mut self) -> Result<(), PurgeStoreError> {
        self.set_replication_role("origin").await
    }
}
