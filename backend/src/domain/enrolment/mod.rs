//! Bulk enrolment of students onto a course.
//!
//! The flow is resolve, then upsert in batches, then report. Registration
//! numbers are resolved to student ids by the [`IdentifierResolver`], and
//! [`BulkEnrolmentService`] writes one `course_enrolments` row per resolved
//! student in bounded batches with exact insert accounting.

mod resolver;
mod service;

#[cfg(test)]
mod tests;

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use resolver::{
    IdentifierResolver, IdentifierValidationError, NormalisedIdentifiers, Resolution,
    ResolvedStudent,
};
pub use service::BulkEnrolmentService;

/// Largest batch a single multi-row upsert may carry.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Validation errors for [`CourseId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CourseIdValidationError {
    /// The key was zero or negative.
    #[error("target key must be a positive integer, got {0}")]
    NonPositive(i64),
}

/// Surrogate key of the course students are enrolled onto.
///
/// # Examples
/// ```
/// use registrar::domain::enrolment::CourseId;
///
/// assert_eq!(CourseId::new(7).map(CourseId::get), Ok(7));
/// assert!(CourseId::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CourseId(i64);

impl CourseId {
    /// Validate and wrap a raw key.
    pub const fn new(value: i64) -> Result<Self, CourseIdValidationError> {
        if value <= 0 {
            return Err(CourseIdValidationError::NonPositive(value));
        }
        Ok(Self(value))
    }

    /// The raw key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for CourseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Surrogate key of a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(i64);

impl StudentId {
    /// Wrap a key read from the store.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// The raw key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status carried by an enrolment row; overwritten when a pair is resubmitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrolmentStatus {
    #[default]
    Active,
    Pending,
    Withdrawn,
    Completed,
}

impl EnrolmentStatus {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Withdrawn => "withdrawn",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for EnrolmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown enrolment status: {0}")]
pub struct UnknownEnrolmentStatus(pub String);

impl FromStr for EnrolmentStatus {
    type Err = UnknownEnrolmentStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "pending" => Ok(Self::Pending),
            "withdrawn" => Ok(Self::Withdrawn),
            "completed" => Ok(Self::Completed),
            _ => Err(UnknownEnrolmentStatus(s.to_owned())),
        }
    }
}

/// Errors raised when building a [`BulkEnrolmentConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkEnrolmentConfigError {
    #[error("batch size must be between 1 and {MAX_BATCH_SIZE}, got {0}")]
    BatchSize(usize),
    #[error("lookup chunk size must be positive")]
    LookupChunkSize,
    #[error("batch timeout must be non-zero")]
    BatchTimeout,
}

/// Tuning for the bulk enrolment engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkEnrolmentConfig {
    batch_size: NonZeroUsize,
    lookup_chunk_size: NonZeroUsize,
    batch_timeout: Duration,
}

impl BulkEnrolmentConfig {
    /// Validate and build the configuration.
    ///
    /// `batch_timeout` bounds each batch transaction and each row attempt
    /// in the fallback path.
    pub fn new(
        batch_size: usize,
        lookup_chunk_size: usize,
        batch_timeout: Duration,
    ) -> Result<Self, BulkEnrolmentConfigError> {
        let batch_size = NonZeroUsize::new(batch_size)
            .filter(|size| size.get() <= MAX_BATCH_SIZE)
            .ok_or(BulkEnrolmentConfigError::BatchSize(batch_size))?;
        let lookup_chunk_size =
            NonZeroUsize::new(lookup_chunk_size).ok_or(BulkEnrolmentConfigError::LookupChunkSize)?;
        if batch_timeout.is_zero() {
            return Err(BulkEnrolmentConfigError::BatchTimeout);
        }
        Ok(Self {
            batch_size,
            lookup_chunk_size,
            batch_timeout,
        })
    }

    #[must_use]
    pub const fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    #[must_use]
    pub const fn lookup_chunk_size(&self) -> NonZeroUsize {
        self.lookup_chunk_size
    }

    #[must_use]
    pub const fn batch_timeout(&self) -> Duration {
        self.batch_timeout
    }
}

impl Default for BulkEnrolmentConfig {
    fn default() -> Self {
        Self {
            batch_size: NonZeroUsize::new(500).unwrap_or(NonZeroUsize::MIN),
            lookup_chunk_size: NonZeroUsize::new(5000).unwrap_or(NonZeroUsize::MIN),
            batch_timeout: Duration::from_secs(30),
        }
    }
}
