//! PostgreSQL-backed student lookup.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::enrolment::StudentId;
use crate::domain::ports::{StudentLookupRepository, StudentLookupRepositoryError, StudentMatch};

use super::diesel_helpers::{DieselFailure, FailureClass, pool_error_message};
use super::models::StudentKeyRow;
use super::pool::DbPool;
use super::schema::students;

/// Diesel implementation of [`StudentLookupRepository`].
#[derive(Clone)]
pub struct DieselStudentLookupRepository {
    pool: DbPool,
}

impl DieselStudentLookupRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_diesel_error(error: diesel::result::Error) -> StudentLookupRepositoryError {
    let failure = DieselFailure::classify(error, "student lookup");
    match failure.class {
        FailureClass::Transient => StudentLookupRepositoryError::connection(failure.message),
        _ => StudentLookupRepositoryError::query(failure.message),
    }
}

#[async_trait]
impl StudentLookupRepository for DieselStudentLookupRepository {
    async fn find_by_registration_numbers(
        &self,
        registration_numbers: &[String],
    ) -> Result<Vec<StudentMatch>, StudentLookupRepositoryError> {
        if registration_numbers.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.get().await.map_err(|err| {
            StudentLookupRepositoryError::connection(pool_error_message(err))
        })?;

        // `eq_any` binds the whole slice as one array parameter.
        let rows: Vec<StudentKeyRow> = students::table
            .filter(students::registration_number.eq_any(registration_numbers))
            .select(StudentKeyRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        Ok(rows
            .into_iter()
            .map(|row| StudentMatch {
                registration_number: row.registration_number,
                student_id: StudentId::new(row.id),
            })
            .collect())
    }
}
