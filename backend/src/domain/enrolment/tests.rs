//! Behaviour of the resolver and the batch upsert engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mockall::Sequence;
use mockall::predicate::eq;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::domain::ports::{
    ActivityLogError, BatchUpsertCounts, BulkEnrolmentCommand, BulkEnrolmentRequest,
    EnrolmentRepository, EnrolmentRepositoryError, MockActivityLog, MockEnrolmentRepository,
    MockStudentLookupRepository, RowUpsertOutcome, StudentLookupRepository,
    StudentLookupRepositoryError, StudentMatch,
};

type Service =
    BulkEnrolmentService<MockStudentLookupRepository, MockEnrolmentRepository, MockActivityLog>;

fn student(registration_number: &str, id: i64) -> StudentMatch {
    StudentMatch {
        registration_number: registration_number.to_owned(),
        student_id: StudentId::new(id),
    }
}

fn request(identifiers: &[&str]) -> BulkEnrolmentRequest {
    BulkEnrolmentRequest {
        target_key: 7,
        identifiers: identifiers.iter().map(|value| (*value).to_owned()).collect(),
        status: EnrolmentStatus::Active,
        actor: "registrar-admin".to_owned(),
    }
}

fn config(batch_size: usize, lookup_chunk_size: usize) -> BulkEnrolmentConfig {
    BulkEnrolmentConfig::new(batch_size, lookup_chunk_size, Duration::from_secs(5))
        .expect("valid config")
}

/// Lookup that knows `R1..=Rn` as students `1..=n`.
fn numbered_lookup(count: i64) -> MockStudentLookupRepository {
    let mut lookup = MockStudentLookupRepository::new();
    lookup.expect_find_by_registration_numbers().returning(move |numbers| {
        Ok(numbers
            .iter()
            .filter_map(|number| {
                let id: i64 = number.strip_prefix('R')?.parse().ok()?;
                (1..=count).contains(&id).then(|| student(number, id))
            })
            .collect())
    });
    lookup
}

fn ready_repository() -> MockEnrolmentRepository {
    let mut repo = MockEnrolmentRepository::new();
    repo.expect_course_exists().returning(|_| Ok(true));
    repo.expect_ensure_unique_constraint().times(..=1).returning(|| Ok(()));
    repo
}

#[fixture]
fn activity() -> MockActivityLog {
    let mut log = MockActivityLog::new();
    log.expect_record().returning(|_| Ok(()));
    log
}

fn service(
    lookup: MockStudentLookupRepository,
    repo: MockEnrolmentRepository,
    activity: MockActivityLog,
    config: BulkEnrolmentConfig,
) -> Service {
    BulkEnrolmentService::new(Arc::new(lookup), Arc::new(repo), Arc::new(activity), config)
}

#[rstest]
fn normalisation_trims_drops_blanks_and_deduplicates() {
    let ids = NormalisedIdentifiers::new(["A100", "A100", " A101 ", "", "   ", "a100"])
        .expect("non-empty");
    assert_eq!(ids.as_slice(), ["A100", "A101", "a100"]);
}

#[rstest]
#[case(Vec::new())]
#[case(vec!["", "  ", "\t"])]
fn normalisation_rejects_nothing_usable(#[case] raw: Vec<&str>) {
    assert_eq!(
        NormalisedIdentifiers::new(raw),
        Err(IdentifierValidationError::Empty)
    );
}

#[rstest]
#[tokio::test]
async fn resolver_partitions_every_identifier_once() {
    let mut lookup = MockStudentLookupRepository::new();
    lookup
        .expect_find_by_registration_numbers()
        .times(2)
        .returning(|numbers| {
            Ok(numbers
                .iter()
                .filter(|number| number.as_str() != "ZZZZ")
                .map(|number| student(number, i64::try_from(number.len()).unwrap_or(0)))
                .collect())
        });
    let resolver = IdentifierResolver::new(
        Arc::new(lookup),
        std::num::NonZeroUsize::new(2).expect("non-zero"),
    );
    let ids = NormalisedIdentifiers::new(["B1", "ZZZZ", "C22"]).expect("non-empty");

    let resolution = resolver.resolve(&ids).await.expect("resolves");

    assert_eq!(resolution.resolved().len() + resolution.unmatched().len(), ids.len());
    assert_eq!(resolution.unmatched(), ["ZZZZ"]);
    let map = resolution.resolved_map();
    assert_eq!(map.get("B1"), Some(&StudentId::new(2)));
    assert_eq!(map.get("C22"), Some(&StudentId::new(3)));
}

#[rstest]
#[tokio::test]
async fn example_request_inserts_then_skips_on_rerun(activity: MockActivityLog) {
    let mut lookup = MockStudentLookupRepository::new();
    lookup
        .expect_find_by_registration_numbers()
        .withf(|numbers| numbers.iter().map(String::as_str).eq(["A100", "A101", "ZZZZ"]))
        .times(2)
        .returning(|_| Ok(vec![student("A100", 1), student("A101", 2)]));

    let mut repo = ready_repository();
    let mut seq = Sequence::new();
    repo.expect_upsert_batch()
        .withf(|course, ids, status| {
            course.get() == 7
                && ids.iter().copied().eq([StudentId::new(1), StudentId::new(2)])
                && *status == EnrolmentStatus::Active
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| {
            Ok(BatchUpsertCounts {
                existing_before: 0,
                existing_after: 2,
            })
        });
    repo.expect_upsert_batch()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| {
            Ok(BatchUpsertCounts {
                existing_before: 2,
                existing_after: 2,
            })
        });

    let service = service(lookup, repo, activity, config(500, 5000));
    let input = ["A100", "A100", " A101 ", "ZZZZ"];

    let first = service.enrol(request(&input)).await.expect("first run");
    assert!(first.success());
    assert_eq!((first.inserted(), first.skipped(), first.failed()), (2, 0, 0));
    assert_eq!(first.unmatched(), ["ZZZZ"]);

    let second = service.enrol(request(&input)).await.expect("second run");
    assert_eq!((second.inserted(), second.skipped(), second.failed()), (0, 2, 0));
    assert!(second.is_conserved());
}

#[rstest]
#[case(0)]
#[case(-3)]
#[tokio::test]
async fn non_positive_target_is_rejected_before_any_io(
    #[case] target_key: i64,
    activity: MockActivityLog,
) {
    let service = service(
        MockStudentLookupRepository::new(),
        MockEnrolmentRepository::new(),
        activity,
        BulkEnrolmentConfig::default(),
    );
    let mut req = request(&["A100"]);
    req.target_key = target_key;

    let err = service.enrol(req).await.expect_err("invalid target");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn blank_identifiers_are_rejected(activity: MockActivityLog) {
    let service = service(
        MockStudentLookupRepository::new(),
        MockEnrolmentRepository::new(),
        activity,
        BulkEnrolmentConfig::default(),
    );

    let err = service.enrol(request(&[" ", ""])).await.expect_err("empty");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn unknown_course_is_rejected(activity: MockActivityLog) {
    let mut repo = MockEnrolmentRepository::new();
    repo.expect_course_exists()
        .with(eq(CourseId::new(7).expect("valid")))
        .returning(|_| Ok(false));
    let service = service(
        MockStudentLookupRepository::new(),
        repo,
        activity,
        BulkEnrolmentConfig::default(),
    );

    let err = service.enrol(request(&["A100"])).await.expect_err("no course");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert!(err.message().contains("course 7"));
}

#[rstest]
#[tokio::test]
async fn nothing_resolved_reports_failure_without_writes(activity: MockActivityLog) {
    let mut repo = MockEnrolmentRepository::new();
    repo.expect_course_exists().returning(|_| Ok(true));
    repo.expect_ensure_unique_constraint().never();
    repo.expect_upsert_batch().never();
    let service = service(numbered_lookup(0), repo, activity, BulkEnrolmentConfig::default());

    let report = service.enrol(request(&["X1", "X2"])).await.expect("report");

    assert!(!report.success());
    assert_eq!(report.unmatched(), ["X1", "X2"]);
    assert_eq!(report.inserted() + report.skipped() + report.failed(), 0);
}

#[rstest]
#[tokio::test]
async fn resolved_students_are_split_into_bounded_batches(activity: MockActivityLog) {
    let mut repo = ready_repository();
    let mut seq = Sequence::new();
    for expected in [2_usize, 2, 1] {
        repo.expect_upsert_batch()
            .withf(move |_, ids, _| ids.len() == expected)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, ids, _| {
                Ok(BatchUpsertCounts {
                    existing_before: 0,
                    existing_after: u64::try_from(ids.len()).expect("fits"),
                })
            });
    }
    let service = service(numbered_lookup(5), repo, activity, config(2, 5000));

    let report = service
        .enrol(request(&["R1", "R2", "R3", "R4", "R5"]))
        .await
        .expect("report");

    assert_eq!(report.inserted(), 5);
    assert!(report.is_conserved());
}

#[rstest]
#[tokio::test]
async fn failed_batch_falls_back_to_rows(activity: MockActivityLog) {
    let mut repo = ready_repository();
    repo.expect_upsert_batch()
        .returning(|_, _, _| Err(EnrolmentRepositoryError::query("check constraint")));
    repo.expect_upsert_one().returning(|_, student, _| match student.get() {
        1 => Ok(RowUpsertOutcome::Inserted),
        2 => Err(EnrolmentRepositoryError::conflict("duplicate key")),
        3 => Ok(RowUpsertOutcome::Existing),
        _ => Err(EnrolmentRepositoryError::query("status too long")),
    });
    let service = service(numbered_lookup(4), repo, activity, config(10, 5000));

    let report = service
        .enrol(request(&["R1", "R2", "R3", "R4"]))
        .await
        .expect("report");

    assert_eq!((report.inserted(), report.skipped(), report.failed()), (1, 2, 1));
    let failure = report.failures().first().expect("one failure");
    assert_eq!(failure.registration_number, "R4");
    assert!(failure.reason.contains("status too long"));
    assert!(report.is_conserved());
}

#[rstest]
#[tokio::test]
async fn transient_row_errors_are_retried_exactly_once(activity: MockActivityLog) {
    let mut repo = ready_repository();
    repo.expect_upsert_batch()
        .returning(|_, _, _| Err(EnrolmentRepositoryError::transient("deadlock detected")));
    let mut seq = Sequence::new();
    repo.expect_upsert_one()
        .with(
            eq(CourseId::new(7).expect("valid")),
            eq(StudentId::new(1)),
            eq(EnrolmentStatus::Active),
        )
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Err(EnrolmentRepositoryError::transient("deadlock detected")));
    repo.expect_upsert_one()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(RowUpsertOutcome::Inserted));
    repo.expect_upsert_one()
        .times(2)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Err(EnrolmentRepositoryError::transient("connection closed")));
    let service = service(numbered_lookup(2), repo, activity, config(10, 5000));

    let report = service.enrol(request(&["R1", "R2"])).await.expect("report");

    assert_eq!((report.inserted(), report.skipped(), report.failed()), (1, 0, 1));
}

#[rstest]
#[tokio::test]
async fn lost_connection_on_a_row_is_retried(activity: MockActivityLog) {
    let mut repo = ready_repository();
    repo.expect_upsert_batch()
        .returning(|_, _, _| Err(EnrolmentRepositoryError::transient("server closed the connection")));
    let mut seq = Sequence::new();
    repo.expect_upsert_one()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Err(EnrolmentRepositoryError::connection("pool checkout timed out")));
    repo.expect_upsert_one()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(RowUpsertOutcome::Inserted));
    let service = service(numbered_lookup(1), repo, activity, config(10, 5000));

    let report = service.enrol(request(&["R1"])).await.expect("report");

    assert_eq!((report.inserted(), report.skipped(), report.failed()), (1, 0, 0));
    assert!(report.is_conserved());
}

#[rstest]
#[tokio::test]
async fn unique_constraint_is_ensured_once_per_service(activity: MockActivityLog) {
    let mut repo = MockEnrolmentRepository::new();
    repo.expect_course_exists().returning(|_| Ok(true));
    repo.expect_ensure_unique_constraint().times(1).returning(|| Ok(()));
    repo.expect_upsert_batch()
        .times(2)
        .returning(|_, _, _| Ok(BatchUpsertCounts::default()));
    let service = service(numbered_lookup(1), repo, activity, config(10, 5000));

    service.enrol(request(&["R1"])).await.expect("first");
    service.enrol(request(&["R1"])).await.expect("second");
}

#[rstest]
#[tokio::test]
async fn activity_failures_do_not_fail_the_request() {
    let mut log = MockActivityLog::new();
    log.expect_record()
        .times(1)
        .returning(|_| Err(ActivityLogError::write("disk full")));
    let mut repo = ready_repository();
    repo.expect_upsert_batch().returning(|_, _, _| {
        Ok(BatchUpsertCounts {
            existing_before: 0,
            existing_after: 1,
        })
    });
    let service = service(numbered_lookup(1), repo, log, config(10, 5000));

    let report = service.enrol(request(&["R1"])).await.expect("report");
    assert_eq!(report.inserted(), 1);
}

#[rstest]
#[tokio::test]
async fn lookup_outage_is_service_unavailable(activity: MockActivityLog) {
    let mut lookup = MockStudentLookupRepository::new();
    lookup
        .expect_find_by_registration_numbers()
        .returning(|_| Err(StudentLookupRepositoryError::connection("pool exhausted")));
    let service = service(lookup, ready_repository(), activity, BulkEnrolmentConfig::default());

    let err = service.enrol(request(&["R1"])).await.expect_err("outage");
    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[case(0)]
#[case(MAX_BATCH_SIZE + 1)]
fn config_rejects_out_of_range_batch_sizes(#[case] size: usize) {
    assert_eq!(
        BulkEnrolmentConfig::new(size, 10, Duration::from_secs(1)),
        Err(BulkEnrolmentConfigError::BatchSize(size))
    );
}

#[rstest]
#[case("active", EnrolmentStatus::Active)]
#[case(" Withdrawn ", EnrolmentStatus::Withdrawn)]
fn status_parses_case_insensitively(#[case] raw: &str, #[case] expected: EnrolmentStatus) {
    assert_eq!(raw.parse::<EnrolmentStatus>(), Ok(expected));
}

/// Repository whose first batch hangs past any reasonable budget.
#[derive(Default)]
struct StallingRepository {
    batches: AtomicUsize,
}

#[async_trait]
impl EnrolmentRepository for StallingRepository {
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
        if self.batches.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(BatchUpsertCounts {
            existing_before: 0,
            existing_after: u64::try_from(student_ids.len()).expect("fits"),
        })
    }

    async fn upsert_one(
        &self,
        _course_id: CourseId,
        _student_id: StudentId,
        _status: EnrolmentStatus,
    ) -> Result<RowUpsertOutcome, EnrolmentRepositoryError> {
        panic!("timed-out batches must not fall back to rows");
    }
}

struct NumberedLookup;

#[async_trait]
impl StudentLookupRepository for NumberedLookup {
    async fn find_by_registration_numbers(
        &self,
        registration_numbers: &[String],
    ) -> Result<Vec<StudentMatch>, StudentLookupRepositoryError> {
        Ok(registration_numbers
            .iter()
            .enumerate()
            .map(|(index, number)| student(number, i64::try_from(index).expect("fits") + 1))
            .collect())
    }
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn timed_out_batch_fails_and_the_next_batch_proceeds(activity: MockActivityLog) {
    let repo = Arc::new(StallingRepository::default());
    let service = BulkEnrolmentService::new(
        Arc::new(NumberedLookup),
        Arc::clone(&repo),
        Arc::new(activity),
        config(2, 5000),
    );

    let report = service
        .enrol(request(&["R1", "R2", "R3"]))
        .await
        .expect("report");

    assert_eq!((report.inserted(), report.skipped(), report.failed()), (1, 0, 2));
    assert!(report.failures().iter().all(|f| f.reason == "batch timed out"));
    assert_eq!(repo.batches.load(Ordering::SeqCst), 2);
}
