//! Driving port for bulk enrolment.

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::enrolment::EnrolmentStatus;
use crate::domain::report::EnrolmentReport;

/// One bulk enrolment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkEnrolmentRequest {
    /// Raw course key; validated by the service.
    pub target_key: i64,
    /// Raw registration numbers as supplied by the caller.
    pub identifiers: Vec<String>,
    /// Status written to new rows and overwritten on existing ones.
    pub status: EnrolmentStatus,
    /// Who asked for the enrolment, for the audit trail.
    pub actor: String,
}

/// Driving port for bulk enrolment.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BulkEnrolmentCommand: Send + Sync {
    /// Resolve the identifiers and enrol every resolved student.
    ///
    /// Fails only for caller errors or when the store is unreachable before
    /// any work starts; everything else is accounted for in the report.
    async fn enrol(&self, request: BulkEnrolmentRequest) -> Result<EnrolmentReport, Error>;
}
