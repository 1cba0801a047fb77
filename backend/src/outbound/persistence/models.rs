//! Internal Diesel row structs.
//!
//! Implementation details of the persistence layer; never exposed to the
//! domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::{activity_logs, course_enrolments, students};

/// Registration number and id pair read during resolution.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StudentKeyRow {
    pub id: i64,
    pub registration_number: String,
}

/// Insertable enrolment; timestamps come from column defaults.
#[derive(Debug, Clone, Copy, Insertable)]
#[diesel(table_name = course_enrolments)]
pub(crate) struct NewEnrolmentRow<'a> {
    pub student_id: i64,
    pub course_id: i64,
    pub status: &'a str,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = activity_logs)]
pub(crate) struct NewActivityLogRow<'a> {
    pub action: &'a str,
    pub detail: &'a str,
    pub actor: &'a str,
    pub created_at: DateTime<Utc>,
}
