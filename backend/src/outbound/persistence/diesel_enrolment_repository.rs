//! PostgreSQL-backed enrolment writes.
//!
//! Batches run in a REPEATABLE READ transaction: the before count, the upsert
//! and the after count share one snapshot, and a concurrent insert of the
//! same pair makes the upsert fail with a serialization error instead of
//! being counted twice. Single rows use `ON CONFLICT DO NOTHING` followed by
//! a status update, so the affected-row count says exactly which path ran.

use std::time::Duration;

use async_trait::async_trait;
use diesel::dsl::{exists, now};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use crate::domain::enrolment::{CourseId, EnrolmentStatus, StudentId};
use crate::domain::ports::{
    BatchUpsertCounts, EnrolmentRepository, EnrolmentRepositoryError, RowUpsertOutcome,
};

use super::diesel_helpers::{
    DieselFailure, FailureClass, pool_error_message, statement_timeout_sql,
};
use super::models::NewEnrolmentRow;
use super::pool::DbPool;
use super::schema::{course_enrolments, courses};

const UNIQUE_PAIR_INDEX_SQL: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \
     course_enrolments_student_course_key ON course_enrolments (student_id, course_id)";

/// Diesel implementation of [`EnrolmentRepository`].
#[derive(Clone)]
pub struct DieselEnrolmentRepository {
    pool: DbPool,
    statement_timeout_ms: u64,
}

impl DieselEnrolmentRepository {
    /// Statements are cancelled server-side after 30 seconds by default.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use std::time::Duration;
    /// use registrar::outbound::persistence::{DbPool, DieselEnrolmentRepository, PoolConfig};
    ///
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// let pool = DbPool::new(PoolConfig::new("postgres://localhost/registry")).await?;
    /// let repository = DieselEnrolmentRepository::new(pool)
    ///     .with_statement_timeout(Duration::from_secs(10));
    /// # let _ = repository;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            statement_timeout_ms: 30_000,
        }
    }

    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

fn map_diesel_error(error: diesel::result::Error) -> EnrolmentRepositoryError {
    let failure = DieselFailure::classify(error, "enrolment write");
    match failure.class {
        FailureClass::Conflict => EnrolmentRepositoryError::conflict(failure.message),
        FailureClass::Transient => EnrolmentRepositoryError::transient(failure.message),
        FailureClass::Timeout => EnrolmentRepositoryError::timeout(failure.message),
        FailureClass::Query => EnrolmentRepositoryError::query(failure.message),
    }
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}

async fn count_existing(
    conn: &mut AsyncPgConnection,
    course_id: i64,
    student_ids: &[i64],
) -> QueryResult<i64> {
    course_enrolments::table
        .filter(course_enrolments::course_id.eq(course_id))
        .filter(course_enrolments::student_id.eq_any(student_ids))
        .count()
        .get_result(conn)
        .await
}

#[async_trait]
impl EnrolmentRepository for DieselEnrolmentRepository {
    async fn course_exists(&self, course_id: CourseId) -> Result<bool, EnrolmentRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| EnrolmentRepositoryError::connection(pool_error_message(err)))?;
        diesel::select(exists(courses::table.filter(courses::id.eq(course_id.get()))))
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn ensure_unique_constraint(&self) -> Result<(), EnrolmentRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| EnrolmentRepositoryError::connection(pool_error_message(err)))?;
        diesel::sql_query(UNIQUE_PAIR_INDEX_SQL)
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        debug!("enrolment uniqueness index present");
        Ok(())
    }

    async fn upsert_batch(
        &self,
        course_id: CourseId,
        student_ids: &[StudentId],
        status: EnrolmentStatus,
    ) -> Result<BatchUpsertCounts, EnrolmentRepositoryError> {
        if student_ids.is_empty() {
            return Ok(BatchUpsertCounts::default());
        }
        let course = course_id.get();
        let ids: Vec<i64> = student_ids.iter().map(|id| id.get()).collect();
        let rows: Vec<NewEnrolmentRow<'_>> = ids
            .iter()
            .map(|student_id| NewEnrolmentRow {
                student_id: *student_id,
                course_id: course,
                status: status.as_str(),
            })
            .collect();
        let timeout_sql = statement_timeout_sql(self.statement_timeout_ms);
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| EnrolmentRepositoryError::connection(pool_error_message(err)))?;

        conn.build_transaction()
            .repeatable_read()
            .run(|conn| {
                async move {
                    diesel::sql_query(timeout_sql.as_str()).execute(conn).await?;
                    let before = count_existing(conn, course, &ids).await?;
                    diesel::insert_into(course_enrolments::table)
                        .values(&rows)
                        .on_conflict((course_enrolments::student_id, course_enrolments::course_id))
                        .do_update()
                        .set((
                            course_enrolments::status.eq(excluded(course_enrolments::status)),
                            course_enrolments::updated_at.eq(now),
                        ))
                        .execute(conn)
                        .await?;
                    let after = count_existing(conn, course, &ids).await?;
                    Ok(BatchUpsertCounts {
                        existing_before: count_to_u64(before),
                        existing_after: count_to_u64(after),
                    })
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)
    }

    async fn upsert_one(
        &self,
        course_id: CourseId,
        student_id: StudentId,
        status: EnrolmentStatus,
    ) -> Result<RowUpsertOutcome, EnrolmentRepositoryError> {
        let row = NewEnrolmentRow {
            student_id: student_id.get(),
            course_id: course_id.get(),
            status: status.as_str(),
        };
        let timeout_sql = statement_timeout_sql(self.statement_timeout_ms);
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| EnrolmentRepositoryError::connection(pool_error_message(err)))?;

        conn.transaction(|conn| {
            async move {
                diesel::sql_query(timeout_sql.as_str()).execute(conn).await?;
                let inserted = diesel::insert_into(course_enrolments::table)
                    .values(&row)
                    .on_conflict((course_enrolments::student_id, course_enrolments::course_id))
                    .do_nothing()
                    .execute(conn)
                    .await?;
                if inserted > 0 {
                    return Ok(RowUpsertOutcome::Inserted);
                }
                diesel::update(
                    course_enrolments::table
                        .filter(course_enrolments::student_id.eq(row.student_id))
                        .filter(course_enrolments::course_id.eq(row.course_id)),
                )
                .set((
                    course_enrolments::status.eq(row.status),
                    course_enrolments::updated_at.eq(now),
                ))
                .execute(conn)
                .await?;
                Ok(RowUpsertOutcome::Existing)
            }
            .scope_boxed()
        })
        .await
        .map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn negative_counts_clamp_to_zero() {
        assert_eq!(count_to_u64(-1), 0);
        assert_eq!(count_to_u64(42), 42);
    }

    #[rstest]
    fn unique_index_statement_is_idempotent() {
        assert!(UNIQUE_PAIR_INDEX_SQL.contains("IF NOT EXISTS"));
        assert!(UNIQUE_PAIR_INDEX_SQL.ends_with("(student_id, course_id)"));
    }
}
