//! Structured outcomes returned by the bulk operations.
//!
//! Callers always get a complete accounting rather than a pass/fail flag.
//! The reports are built incrementally by the services, one unit of work at a
//! time, so their counters can only move through the methods below.

use serde::Serialize;

use super::enrolment::StudentId;
use super::purge::PurgeTarget;

/// A resolved student whose enrolment could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrolmentFailure {
    pub student_id: StudentId,
    pub registration_number: String,
    pub reason: String,
}

/// Accounting for one bulk enrolment request.
///
/// ## Invariants
/// - `inserted + skipped + failed == resolved` once the service returns.
/// - `failures.len() == failed`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EnrolmentReport {
    resolved: usize,
    inserted: usize,
    skipped: usize,
    failed: usize,
    unmatched: Vec<String>,
    failures: Vec<EnrolmentFailure>,
}

impl EnrolmentReport {
    /// Start a report for `resolved` students and the given unmatched
    /// registration numbers.
    #[must_use]
    pub const fn new(resolved: usize, unmatched: Vec<String>) -> Self {
        Self {
            resolved,
            inserted: 0,
            skipped: 0,
            failed: 0,
            unmatched,
            failures: Vec::new(),
        }
    }

    pub(crate) const fn add_batch(&mut self, inserted: usize, skipped: usize) {
        self.inserted += inserted;
        self.skipped += skipped;
    }

    pub(crate) const fn add_inserted(&mut self) {
        self.inserted += 1;
    }

    pub(crate) const fn add_skipped(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn add_failure(&mut self, failure: EnrolmentFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    /// `true` when at least one identifier resolved.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.resolved > 0
    }

    #[must_use]
    pub const fn resolved(&self) -> usize {
        self.resolved
    }

    #[must_use]
    pub const fn inserted(&self) -> usize {
        self.inserted
    }

    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    #[must_use]
    pub fn unmatched(&self) -> &[String] {
        &self.unmatched
    }

    #[must_use]
    pub fn failures(&self) -> &[EnrolmentFailure] {
        &self.failures
    }

    /// Whether every resolved student is accounted for exactly once.
    #[must_use]
    pub const fn is_conserved(&self) -> bool {
        self.inserted + self.skipped + self.failed == self.resolved
    }

    /// One-line summary for operators.
    #[must_use]
    pub fn message(&self) -> String {
        if !self.success() {
            return format!(
                "No students matched the {} supplied registration numbers",
                self.unmatched.len()
            );
        }
        format!(
            "Enrolled {} new, {} already enrolled, {} failed, {} unmatched",
            self.inserted,
            self.skipped,
            self.failed,
            self.unmatched.len()
        )
    }
}

/// What happened to one requested table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Cleared,
    Missing,
    Failed,
}

/// Per-table purge outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub target: PurgeTarget,
    pub status: TableStatus,
    pub rows_deleted: u64,
    pub identity_reset: bool,
    pub reason: Option<String>,
}

impl TableOutcome {
    #[must_use]
    pub const fn cleared(target: PurgeTarget, rows_deleted: u64, identity_reset: bool) -> Self {
        Self {
            target,
            status: TableStatus::Cleared,
            rows_deleted,
            identity_reset,
            reason: None,
        }
    }

    #[must_use]
    pub const fn missing(target: PurgeTarget) -> Self {
        Self {
            target,
            status: TableStatus::Missing,
            rows_deleted: 0,
            identity_reset: false,
            reason: None,
        }
    }

    #[must_use]
    pub fn failed(target: PurgeTarget, reason: impl Into<String>) -> Self {
        Self {
            target,
            status: TableStatus::Failed,
            rows_deleted: 0,
            identity_reset: false,
            reason: Some(reason.into()),
        }
    }
}

/// A per-item purge error: an unknown table or a table that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeItemError {
    pub table: String,
    pub reason: String,
}

/// Accounting for one purge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    tables: Vec<TableOutcome>,
    errors: Vec<PurgeItemError>,
    enforcement_restored: bool,
}

impl Default for PurgeReport {
    fn default() -> Self {
        Self::new()
    }
}

impl PurgeReport {
    /// Empty report; enforcement counts as in force until a session relaxes it.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tables: Vec::new(),
            errors: Vec::new(),
            enforcement_restored: true,
        }
    }

    pub(crate) fn push_table(&mut self, outcome: TableOutcome) {
        if let Some(reason) = outcome.reason.as_ref() {
            self.errors.push(PurgeItemError {
                table: outcome.target.table_name().to_owned(),
                reason: reason.clone(),
            });
        }
        self.tables.push(outcome);
    }

    pub(crate) fn reject_unknown(&mut self, table: impl Into<String>) {
        self.errors.push(PurgeItemError {
            table: table.into(),
            reason: "not a purgeable table".to_owned(),
        });
    }

    pub(crate) const fn set_enforcement_restored(&mut self, restored: bool) {
        self.enforcement_restored = restored;
    }

    /// Labels of the tables that were emptied, in processing order.
    #[must_use]
    pub fn cleared(&self) -> Vec<&'static str> {
        self.labels_with(TableStatus::Cleared)
    }

    /// Labels of the requested tables that do not exist in the store.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        self.labels_with(TableStatus::Missing)
    }

    #[must_use]
    pub fn tables(&self) -> &[TableOutcome] {
        &self.tables
    }

    #[must_use]
    pub fn errors(&self) -> &[PurgeItemError] {
        &self.errors
    }

    /// Whether foreign keys are enforced again after the run.
    #[must_use]
    pub const fn enforcement_restored(&self) -> bool {
        self.enforcement_restored
    }

    fn labels_with(&self, status: TableStatus) -> Vec<&'static str> {
        self.tables
            .iter()
            .filter(|outcome| outcome.status == status)
            .map(|outcome| outcome.target.label())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn failure(id: i64) -> EnrolmentFailure {
        EnrolmentFailure {
            student_id: StudentId::new(id),
            registration_number: format!("R{id}"),
            reason: "boom".to_owned(),
        }
    }

    #[rstest]
    fn enrolment_report_tracks_conservation() {
        let mut report = EnrolmentReport::new(4, vec!["ZZZZ".to_owned()]);
        report.add_batch(1, 1);
        assert!(!report.is_conserved());

        report.add_skipped();
        report.add_failure(failure(9));

        assert!(report.is_conserved());
        assert_eq!(report.failures().len(), report.failed());
        assert_eq!(
            report.message(),
            "Enrolled 1 new, 2 already enrolled, 1 failed, 1 unmatched"
        );
    }

    #[rstest]
    fn unresolved_report_is_unsuccessful_but_conserved() {
        let report = EnrolmentReport::new(0, vec!["A".to_owned(), "B".to_owned()]);
        assert!(!report.success());
        assert!(report.is_conserved());
        assert!(report.message().starts_with("No students matched the 2"));
    }

    #[rstest]
    fn purge_report_splits_outcomes_by_status() {
        let mut report = PurgeReport::new();
        report.push_table(TableOutcome::cleared(PurgeTarget::CourseEnrolments, 3, true));
        report.push_table(TableOutcome::missing(PurgeTarget::ExamSchedules));
        report.push_table(TableOutcome::failed(PurgeTarget::Courses, "still referenced"));
        report.reject_unknown("grades");

        assert_eq!(report.cleared(), vec!["Course enrolments"]);
        assert_eq!(report.missing(), vec!["Exam schedules"]);
        let tables: Vec<_> = report.errors().iter().map(|e| e.table.as_str()).collect();
        assert_eq!(tables, vec!["courses", "grades"]);
        assert!(report.enforcement_restored());
    }
}
