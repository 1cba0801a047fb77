//! Diesel table definitions for the tables queried through the DSL.
//!
//! These must match `migrations/` exactly. The purge adapter addresses the
//! remaining catalogue tables by name through `sql_query`.

diesel::table! {
    /// Students, keyed by surrogate id and looked up by registration number.
    students (id) {
        id -> Int8,
        registration_number -> Varchar,
        full_name -> Varchar,
        program_id -> Nullable<Int8>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    courses (id) {
        id -> Int8,
        code -> Varchar,
        title -> Varchar,
        program_id -> Nullable<Int8>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Student to course association; unique on `(student_id, course_id)`.
    course_enrolments (id) {
        id -> Int8,
        student_id -> Int8,
        course_id -> Int8,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only audit trail.
    activity_logs (id) {
        id -> Int8,
        action -> Varchar,
        detail -> Text,
        actor -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(course_enrolments -> students (student_id));
diesel::joinable!(course_enrolments -> courses (course_id));

diesel::allow_tables_to_appear_in_same_query!(activity_logs, course_enrolments, courses, students);
