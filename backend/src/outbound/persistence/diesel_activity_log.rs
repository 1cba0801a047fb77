//! PostgreSQL-backed activity log.

use std::sync::Arc;

use async_trait::async_trait;
use diesel_async::RunQueryDsl;
use mockable::{Clock, DefaultClock};

use crate::domain::ports::{ActivityEntry, ActivityLog, ActivityLogError};

use super::diesel_helpers::{DieselFailure, pool_error_message};
use super::models::NewActivityLogRow;
use super::pool::DbPool;
use super::schema::activity_logs;

/// Appends entries to `activity_logs`, stamped with the configured clock.
#[derive(Clone)]
pub struct DieselActivityLog {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl DieselActivityLog {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            clock: Arc::new(DefaultClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl ActivityLog for DieselActivityLog {
    async fn record(&self, entry: &ActivityEntry) -> Result<(), ActivityLogError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| ActivityLogError::write(pool_error_message(err)))?;
        diesel::insert_into(activity_logs::table)
            .values(&NewActivityLogRow {
                action: &entry.action,
                detail: &entry.detail,
                actor: &entry.actor,
                created_at: self.clock.utc(),
            })
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| {
                ActivityLogError::write(DieselFailure::classify(err, "record activity").message)
            })
    }
}
