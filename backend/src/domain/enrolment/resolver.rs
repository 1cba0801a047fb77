//! Registration number resolution.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::debug;

use crate::domain::ports::{StudentLookupRepository, StudentLookupRepositoryError};

use super::StudentId;

/// Validation errors for raw identifier lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierValidationError {
    #[error("at least one registration number is required")]
    Empty,
}

/// Trimmed, non-empty, de-duplicated registration numbers in first-seen order.
///
/// # Examples
/// ```
/// use registrar::domain::enrolment::NormalisedIdentifiers;
///
/// let ids = NormalisedIdentifiers::new(["A100", "A100", " A101 ", ""]).expect("non-empty");
/// assert_eq!(ids.as_slice(), ["A100", "A101"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalisedIdentifiers(Vec<String>);

impl NormalisedIdentifiers {
    /// Normalise raw input, rejecting lists with nothing left afterwards.
    pub fn new<I, S>(raw: I) -> Result<Self, IdentifierValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let identifiers: Vec<String> = raw
            .into_iter()
            .filter_map(|value| {
                let trimmed = value.as_ref().trim();
                (!trimmed.is_empty() && seen.insert(trimmed.to_owned()))
                    .then(|| trimmed.to_owned())
            })
            .collect();
        if identifiers.is_empty() {
            return Err(IdentifierValidationError::Empty);
        }
        Ok(Self(identifiers))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; construction rejects empty input.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A registration number and the student it resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStudent {
    pub registration_number: String,
    pub student_id: StudentId,
}

/// Partition of the normalised identifiers into resolved and unmatched.
///
/// Every identifier lands in exactly one side, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    resolved: Vec<ResolvedStudent>,
    unmatched: Vec<String>,
}

impl Resolution {
    #[must_use]
    pub fn resolved(&self) -> &[ResolvedStudent] {
        &self.resolved
    }

    #[must_use]
    pub fn unmatched(&self) -> &[String] {
        &self.unmatched
    }

    /// Resolved pairs keyed by registration number.
    #[must_use]
    pub fn resolved_map(&self) -> HashMap<&str, StudentId> {
        self.resolved
            .iter()
            .map(|student| (student.registration_number.as_str(), student.student_id))
            .collect()
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<ResolvedStudent>, Vec<String>) {
        (self.resolved, self.unmatched)
    }
}

/// Resolves registration numbers through a [`StudentLookupRepository`].
pub struct IdentifierResolver<L> {
    lookup: Arc<L>,
    chunk_size: NonZeroUsize,
}

impl<L> IdentifierResolver<L>
where
    L: StudentLookupRepository,
{
    /// `chunk_size` caps how many numbers go into one lookup query.
    pub const fn new(lookup: Arc<L>, chunk_size: NonZeroUsize) -> Self {
        Self { lookup, chunk_size }
    }

    /// Resolve every identifier, issuing one query per chunk.
    ///
    /// Unknown numbers are unmatched, never errors.
    pub async fn resolve(
        &self,
        identifiers: &NormalisedIdentifiers,
    ) -> Result<Resolution, StudentLookupRepositoryError> {
        let mut found: HashMap<String, StudentId> = HashMap::with_capacity(identifiers.len());
        for chunk in identifiers.as_slice().chunks(self.chunk_size.get()) {
            let matches = self.lookup.find_by_registration_numbers(chunk).await?;
            debug!(requested = chunk.len(), matched = matches.len(), "lookup chunk resolved");
            for student in matches {
                found
                    .entry(student.registration_number)
                    .or_insert(student.student_id);
            }
        }

        let mut resolution = Resolution::default();
        for registration_number in identifiers.as_slice() {
            match found.get(registration_number) {
                Some(student_id) => resolution.resolved.push(ResolvedStudent {
                    registration_number: registration_number.clone(),
                    student_id: *student_id,
                }),
                None => resolution.unmatched.push(registration_number.clone()),
            }
        }
        Ok(resolution)
    }
}
