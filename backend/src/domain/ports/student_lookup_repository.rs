//! Driven port for resolving registration numbers to student ids.

use async_trait::async_trait;

use crate::domain::enrolment::StudentId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by student lookup adapters.
    pub enum StudentLookupRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "student lookup connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "student lookup query failed: {message}",
    }
}

/// One registration number found in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentMatch {
    pub registration_number: String,
    pub student_id: StudentId,
}

/// Batch lookup from natural key to surrogate key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StudentLookupRepository: Send + Sync {
    /// Find the students whose registration number is in
    /// `registration_numbers`, using one query for the whole slice.
    ///
    /// Matching is exact and case-sensitive. Numbers with no student are
    /// simply absent from the result.
    async fn find_by_registration_numbers(
        &self,
        registration_numbers: &[String],
    ) -> Result<Vec<StudentMatch>, StudentLookupRepositoryError>;
}

/// Fixture lookup that knows no students.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureStudentLookupRepository;

#[async_trait]
impl StudentLookupRepository for FixtureStudentLookupRepository {
    async fn find_by_registration_numbers(
        &self,
        _registration_numbers: &[String],
    ) -> Result<Vec<StudentMatch>, StudentLookupRepositoryError> {
        Ok(Vec::new())
    }
}
