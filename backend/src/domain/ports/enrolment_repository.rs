//! Driven port for writing `course_enrolments` rows.
//!
//! Adapters own the transaction boundary: each call to
//! [`EnrolmentRepository::upsert_batch`] or [`EnrolmentRepository::upsert_one`]
//! commits or rolls back on its own.

use async_trait::async_trait;

use crate::domain::enrolment::{CourseId, EnrolmentStatus, StudentId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by enrolment repository adapters.
    pub enum EnrolmentRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "enrolment repository connection failed: {message}",
        /// A uniqueness constraint rejected the write.
        Conflict { message: String } => "enrolment already exists: {message}",
        /// Serialization failure, deadlock, or a dropped connection.
        Transient { message: String } => "transient enrolment store error: {message}",
        /// The statement exceeded its time budget.
        Timeout { message: String } => "enrolment statement timed out: {message}",
        /// Any other query failure.
        Query { message: String } => "enrolment repository query failed: {message}",
    }
}

impl EnrolmentRepositoryError {
    /// Whether a single retry may succeed.
    ///
    /// A failed connection checkout is a connectivity error like a dropped
    /// connection, so both qualify.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Connection { .. })
    }
}

/// Existence counts around one batch upsert, scoped to the batch's students
/// and the target course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchUpsertCounts {
    /// Rows for the batch's pairs visible before the upsert.
    pub existing_before: u64,
    /// Rows for the batch's pairs visible after the upsert.
    pub existing_after: u64,
}

impl BatchUpsertCounts {
    /// Pairs that did not exist before the batch ran.
    #[must_use]
    pub const fn inserted(&self) -> u64 {
        self.existing_after.saturating_sub(self.existing_before)
    }
}

/// Result of a single-row upsert in the fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowUpsertOutcome {
    /// A new row was written.
    Inserted,
    /// The pair already existed; its status was overwritten.
    Existing,
}

/// Port for idempotent enrolment writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrolmentRepository: Send + Sync {
    /// Whether the course exists.
    async fn course_exists(&self, course_id: CourseId) -> Result<bool, EnrolmentRepositoryError>;

    /// Create the `(student_id, course_id)` uniqueness constraint if absent.
    async fn ensure_unique_constraint(&self) -> Result<(), EnrolmentRepositoryError>;

    /// Upsert one row per student in a single statement and transaction.
    ///
    /// On conflict the status is overwritten. Implementations must count the
    /// existing pairs before and after the statement inside the same
    /// transaction, at an isolation level that makes a concurrent insert of
    /// the same pair fail the batch instead of being double counted.
    async fn upsert_batch(
        &self,
        course_id: CourseId,
        student_ids: &[StudentId],
        status: EnrolmentStatus,
    ) -> Result<BatchUpsertCounts, EnrolmentRepositoryError>;

    /// Upsert a single pair in its own transaction.
    async fn upsert_one(
        &self,
        course_id: CourseId,
        student_id: StudentId,
        status: EnrolmentStatus,
    ) -> Result<RowUpsertOutcome, EnrolmentRepositoryError>;
}

/// Fixture repository where every course exists and every pair is new.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureEnrolmentRepository;

#[async_trait]
impl EnrolmentRepository for FixtureEnrolmentRepository {
    async fn course_exists(&self, _course_id: CourseId) -> Result<bool, EnrolmentRepositoryError> {
        Ok(true)
    }

    async fn ensure_unique_constraint(&self) -> Result<(), EnrolmentRepositoryError> {
        Ok(())
    }

    async fn upsert_batch(
        &self,
        _course_id: CourseId,
        student_ids: &[StudentId],
        _status: EnrolmentStatus,
    ) -> Result<BatchUpsertCounts, EnrolmentRepositoryError> {
        Ok(BatchUpsertCounts {
            existing_before: 0,
            existing_after: u64::try_from(student_ids.len()).unwrap_or(u64::MAX),
        })
    }

    async fn upsert_one(
        &self,
        _course_id: CourseId,
        _student_id: StudentId,
        _status: EnrolmentStatus,
    ) -> Result<RowUpsertOutcome, EnrolmentRepositoryError> {
        Ok(RowUpsertOutcome::Inserted)
    }
}
