//! Batch upsert engine for bulk enrolment.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::Error;
use crate::domain::ports::{
    ActivityEntry, ActivityLog, BulkEnrolmentCommand, BulkEnrolmentRequest, EnrolmentRepository,
    EnrolmentRepositoryError, RowUpsertOutcome, StudentLookupRepository,
    StudentLookupRepositoryError,
};
use crate::domain::report::{EnrolmentFailure, EnrolmentReport};

use super::{
    BulkEnrolmentConfig, CourseId, EnrolmentStatus, IdentifierResolver, NormalisedIdentifiers,
    ResolvedStudent,
};

/// Domain service implementing [`BulkEnrolmentCommand`].
pub struct BulkEnrolmentService<L, R, A> {
    resolver: IdentifierResolver<L>,
    repository: Arc<R>,
    activity: Arc<A>,
    config: BulkEnrolmentConfig,
    constraint_ready: OnceCell<()>,
}

impl<L, R, A> BulkEnrolmentService<L, R, A>
where
    L: StudentLookupRepository,
{
    pub fn new(
        lookup: Arc<L>,
        repository: Arc<R>,
        activity: Arc<A>,
        config: BulkEnrolmentConfig,
    ) -> Self {
        Self {
            resolver: IdentifierResolver::new(lookup, config.lookup_chunk_size()),
            repository,
            activity,
            config,
            constraint_ready: OnceCell::new(),
        }
    }
}

#[async_trait]
impl<L, R, A> BulkEnrolmentCommand for BulkEnrolmentService<L, R, A>
where
    L: StudentLookupRepository,
    R: EnrolmentRepository,
    A: ActivityLog,
{
    async fn enrol(&self, request: BulkEnrolmentRequest) -> Result<EnrolmentReport, Error> {
        let course_id = CourseId::new(request.target_key)
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let identifiers = NormalisedIdentifiers::new(&request.identifiers)
            .map_err(|err| Error::invalid_request(err.to_string()))?;

        if !self
            .repository
            .course_exists(course_id)
            .await
            .map_err(map_repository_error)?
        {
            return Err(Error::invalid_request(format!(
                "course {course_id} does not exist"
            )));
        }

        let (resolved, unmatched) = self
            .resolver
            .resolve(&identifiers)
            .await
            .map_err(map_lookup_error)?
            .into_parts();
        let mut report = EnrolmentReport::new(resolved.len(), unmatched);

        if !resolved.is_empty() {
            self.ensure_unique_constraint().await?;
            for batch in resolved.chunks(self.config.batch_size().get()) {
                self.process_batch(course_id, request.status, batch, &mut report)
                    .await;
            }
        }

        info!(
            course_id = course_id.get(),
            resolved = report.resolved(),
            inserted = report.inserted(),
            skipped = report.skipped(),
            failed = report.failed(),
            unmatched = report.unmatched().len(),
            "bulk enrolment finished"
        );
        self.record_activity(course_id, &request.actor, &report).await;
        Ok(report)
    }
}

impl<L, R, A> BulkEnrolmentService<L, R, A>
where
    L: StudentLookupRepository,
    R: EnrolmentRepository,
    A: ActivityLog,
{
    async fn ensure_unique_constraint(&self) -> Result<(), Error> {
        self.constraint_ready
            .get_or_try_init(|| async { self.repository.ensure_unique_constraint().await })
            .await
            .map(|_| ())
            .map_err(map_repository_error)
    }

    async fn process_batch(
        &self,
        course_id: CourseId,
        status: EnrolmentStatus,
        batch: &[ResolvedStudent],
        report: &mut EnrolmentReport,
    ) {
        let student_ids: Vec<_> = batch.iter().map(|student| student.student_id).collect();
        let attempt = timeout(
            self.config.batch_timeout(),
            self.repository.upsert_batch(course_id, &student_ids, status),
        )
        .await;

        match attempt {
            Ok(Ok(counts)) => {
                let inserted = usize::try_from(counts.inserted())
                    .unwrap_or(batch.len())
                    .min(batch.len());
                debug!(size = batch.len(), inserted, "batch upserted");
                report.add_batch(inserted, batch.len() - inserted);
            }
            Ok(Err(EnrolmentRepositoryError::Timeout { message })) => {
                warn!(size = batch.len(), %message, "batch timed out in the store");
                fail_batch(batch, &format!("batch timed out: {message}"), report);
            }
            Ok(Err(error)) => {
                warn!(size = batch.len(), %error, "batch upsert failed; retrying row by row");
                self.process_rows(course_id, status, batch, report).await;
            }
            Err(_) => {
                warn!(size = batch.len(), "batch exceeded its time budget");
                fail_batch(batch, "batch timed out", report);
            }
        }
    }

    async fn process_rows(
        &self,
        course_id: CourseId,
        status: EnrolmentStatus,
        batch: &[ResolvedStudent],
        report: &mut EnrolmentReport,
    ) {
        for student in batch {
            match self.upsert_row(course_id, student, status).await {
                Ok(RowUpsertOutcome::Inserted) => report.add_inserted(),
                Ok(RowUpsertOutcome::Existing) | Err(EnrolmentRepositoryError::Conflict { .. }) => {
                    report.add_skipped();
                }
                Err(error) => {
                    warn!(
                        student_id = student.student_id.get(),
                        %error,
                        "row upsert failed"
                    );
                    report.add_failure(EnrolmentFailure {
                        student_id: student.student_id,
                        registration_number: student.registration_number.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }
    }

    /// One attempt plus one retry when the first failure is transient.
    async fn upsert_row(
        &self,
        course_id: CourseId,
        student: &ResolvedStudent,
        status: EnrolmentStatus,
    ) -> Result<RowUpsertOutcome, EnrolmentRepositoryError> {
        match self.attempt_row(course_id, student, status).await {
            Err(error) if error.is_transient() => {
                debug!(student_id = student.student_id.get(), %error, "retrying row");
                self.attempt_row(course_id, student, status).await
            }
            other => other,
        }
    }

    async fn attempt_row(
        &self,
        course_id: CourseId,
        student: &ResolvedStudent,
        status: EnrolmentStatus,
    ) -> Result<RowUpsertOutcome, EnrolmentRepositoryError> {
        timeout(
            self.config.batch_timeout(),
            self.repository
                .upsert_one(course_id, student.student_id, status),
        )
        .await
        .unwrap_or_else(|_| Err(EnrolmentRepositoryError::timeout("row exceeded its time budget")))
    }

    async fn record_activity(&self, course_id: CourseId, actor: &str, report: &EnrolmentReport) {
        let entry = ActivityEntry {
            action: "bulk_enrolment".to_owned(),
            detail: format!("course {course_id}: {}", report.message()),
            actor: actor.to_owned(),
        };
        if let Err(error) = self.activity.record(&entry).await {
            warn!(%error, "failed to record bulk enrolment activity");
        }
    }
}

fn fail_batch(batch: &[ResolvedStudent], reason: &str, report: &mut EnrolmentReport) {
    for student in batch {
        report.add_failure(EnrolmentFailure {
            student_id: student.student_id,
            registration_number: student.registration_number.clone(),
            reason: reason.to_owned(),
        });
    }
}

fn map_lookup_error(error: StudentLookupRepositoryError) -> Error {
    match error {
        StudentLookupRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("student lookup unavailable: {message}"))
        }
        StudentLookupRepositoryError::Query { message } => {
            Error::internal(format!("student lookup failed: {message}"))
        }
    }
}

fn map_repository_error(error: EnrolmentRepositoryError) -> Error {
    match error {
        EnrolmentRepositoryError::Connection { message }
        | EnrolmentRepositoryError::Transient { message }
        | EnrolmentRepositoryError::Timeout { message } => {
            Error::service_unavailable(format!("enrolment store unavailable: {message}"))
        }
        EnrolmentRepositoryError::Conflict { message } => Error::conflict(message),
        EnrolmentRepositoryError::Query { message } => {
            Error::internal(format!("enrolment store query failed: {message}"))
        }
    }
}
