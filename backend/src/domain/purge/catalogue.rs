//! Static purge catalogue.
//!
//! Variant order is deletion order: every table appears before the tables it
//! references, so iterating a `BTreeSet<PurgeTarget>` yields a safe order.

use serde::Serialize;

/// A table the purge may empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeTarget {
    CourseEnrolments,
    ExamSchedules,
    TimetableEntries,
    Courses,
    Students,
    Programs,
}

impl PurgeTarget {
    /// Every target in deletion order.
    pub const ORDERED: [Self; 6] = [
        Self::CourseEnrolments,
        Self::ExamSchedules,
        Self::TimetableEntries,
        Self::Courses,
        Self::Students,
        Self::Programs,
    ];

    /// Table name in the store.
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::CourseEnrolments => "course_enrolments",
            Self::ExamSchedules => "exam_schedules",
            Self::TimetableEntries => "timetable_entries",
            Self::Courses => "courses",
            Self::Students => "students",
            Self::Programs => "programs",
        }
    }

    /// Label shown to operators.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CourseEnrolments => "Course enrolments",
            Self::ExamSchedules => "Exam schedules",
            Self::TimetableEntries => "Timetable entries",
            Self::Courses => "Courses",
            Self::Students => "Students",
            Self::Programs => "Programmes",
        }
    }

    /// Targets this table holds foreign keys to.
    #[must_use]
    pub const fn references(self) -> &'static [Self] {
        match self {
            Self::CourseEnrolments => &[Self::Students, Self::Courses],
            Self::ExamSchedules | Self::TimetableEntries => &[Self::Courses],
            Self::Courses | Self::Students => &[Self::Programs],
            Self::Programs => &[],
        }
    }
}

/// Tables no purge request may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectedTable {
    AdminUsers,
    ActivityLogs,
    SchemaMigrations,
}

impl ProtectedTable {
    pub const ALL: [Self; 3] = [Self::AdminUsers, Self::ActivityLogs, Self::SchemaMigrations];

    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::AdminUsers => "admin_users",
            Self::ActivityLogs => "activity_logs",
            Self::SchemaMigrations => "__diesel_schema_migrations",
        }
    }
}

/// How a caller-supplied table name relates to the catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableClass {
    Target(PurgeTarget),
    Protected(ProtectedTable),
    Unknown(String),
}

/// Classify a table name.
///
/// Names are trimmed and compared case-insensitively, matching how the store
/// folds unquoted identifiers.
///
/// # Examples
/// ```
/// use registrar::domain::purge::{PurgeTarget, TableClass, classify};
///
/// assert_eq!(classify(" Students "), TableClass::Target(PurgeTarget::Students));
/// ```
#[must_use]
pub fn classify(name: &str) -> TableClass {
    let normalised = name.trim().to_ascii_lowercase();
    if let Some(protected) = ProtectedTable::ALL
        .into_iter()
        .find(|table| table.table_name() == normalised)
    {
        return TableClass::Protected(protected);
    }
    PurgeTarget::ORDERED
        .into_iter()
        .find(|target| target.table_name() == normalised)
        .map_or_else(|| TableClass::Unknown(name.to_owned()), TableClass::Target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn declared_order_matches_variant_order() {
        let mut sorted = PurgeTarget::ORDERED;
        sorted.sort();
        assert_eq!(sorted, PurgeTarget::ORDERED);
    }

    #[rstest]
    fn declared_order_is_topological() {
        for (position, target) in PurgeTarget::ORDERED.iter().enumerate() {
            for parent in target.references() {
                let parent_position = PurgeTarget::ORDERED
                    .iter()
                    .position(|candidate| candidate == parent)
                    .expect("referenced table is catalogued");
                assert!(
                    parent_position > position,
                    "{} must be deleted before {}",
                    target.table_name(),
                    parent.table_name()
                );
            }
        }
    }

    #[rstest]
    fn protected_tables_are_never_targets() {
        for protected in ProtectedTable::ALL {
            assert!(
                PurgeTarget::ORDERED
                    .iter()
                    .all(|target| target.table_name() != protected.table_name())
            );
        }
    }

    #[rstest]
    #[case("programs", TableClass::Target(PurgeTarget::Programs))]
    #[case("  COURSE_ENROLMENTS", TableClass::Target(PurgeTarget::CourseEnrolments))]
    #[case("activity_logs", TableClass::Protected(ProtectedTable::ActivityLogs))]
    #[case("Admin_Users ", TableClass::Protected(ProtectedTable::AdminUsers))]
    #[case("grades", TableClass::Unknown("grades".to_owned()))]
    fn classify_recognises_names(#[case] name: &str, #[case] expected: TableClass) {
        assert_eq!(classify(name), expected);
    }
}
