//! Shared error classification for the Diesel adapters.
//!
//! Each adapter maps a [`DieselFailure`] onto its own port error. The
//! classification is based on the driver's error kind where Diesel exposes
//! one and on the server message otherwise (deadlocks and statement
//! timeouts have no dedicated kind).

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Coarse category of a failed database call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureClass {
    /// A uniqueness constraint rejected the write.
    Conflict,
    /// Serialization failure, deadlock, a broken transaction or a lost
    /// connection. A fresh attempt on another connection may succeed.
    Transient,
    /// The server cancelled the statement after its timeout.
    Timeout,
    /// Anything else.
    Query,
}

/// A classified Diesel error with a message safe to put in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DieselFailure {
    pub class: FailureClass,
    pub message: String,
}

impl DieselFailure {
    /// Classify `error`, logging the raw details at debug level.
    pub(crate) fn classify(error: DieselError, operation: &str) -> Self {
        match &error {
            DieselError::DatabaseError(kind, info) => {
                debug!(?kind, message = info.message(), %operation, "diesel operation failed");
            }
            _ => debug!(%error, %operation, "diesel operation failed"),
        }

        match error {
            DieselError::DatabaseError(kind, info) => {
                let message = info.message().to_owned();
                let class = match kind {
                    DatabaseErrorKind::UniqueViolation => FailureClass::Conflict,
                    DatabaseErrorKind::SerializationFailure
                    | DatabaseErrorKind::ClosedConnection
                    | DatabaseErrorKind::UnableToSendCommand => FailureClass::Transient,
                    _ => classify_message(&message),
                };
                Self { class, message }
            }
            DieselError::BrokenTransactionManager => Self {
                class: FailureClass::Transient,
                message: "transaction manager is broken".to_owned(),
            },
            DieselError::NotFound => Self {
                class: FailureClass::Query,
                message: "record not found".to_owned(),
            },
            other => Self {
                class: FailureClass::Query,
                message: other.to_string(),
            },
        }
    }
}

fn classify_message(message: &str) -> FailureClass {
    let lower = message.to_ascii_lowercase();
    if lower.contains("deadlock detected") {
        FailureClass::Transient
    } else if lower.contains("canceling statement due to statement timeout")
        || lower.contains("canceling statement due to lock timeout")
    {
        FailureClass::Timeout
    } else {
        FailureClass::Query
    }
}

/// Extract a readable message from a pool error.
pub(crate) fn pool_error_message(error: PoolError) -> String {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    }
}

/// `SET LOCAL statement_timeout` value for a budget in milliseconds.
pub(crate) fn statement_timeout_sql(timeout_ms: u64) -> String {
    format!("SET LOCAL statement_timeout = {timeout_ms}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Debug)]
    struct Info(&'static str);

    impl diesel::result::DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            self.0
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            None
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn database_error(kind: DatabaseErrorKind, message: &'static str) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(Info(message)))
    }

    #[rstest]
    #[case(DatabaseErrorKind::UniqueViolation, "duplicate key", FailureClass::Conflict)]
    #[case(DatabaseErrorKind::SerializationFailure, "could not serialize", FailureClass::Transient)]
    #[case(DatabaseErrorKind::ClosedConnection, "server closed", FailureClass::Transient)]
    #[case(DatabaseErrorKind::UnableToSendCommand, "broken pipe", FailureClass::Transient)]
    #[case(DatabaseErrorKind::Unknown, "deadlock detected", FailureClass::Transient)]
    #[case(
        DatabaseErrorKind::Unknown,
        "canceling statement due to statement timeout",
        FailureClass::Timeout
    )]
    #[case(DatabaseErrorKind::CheckViolation, "violates check constraint", FailureClass::Query)]
    fn database_errors_are_classified(
        #[case] kind: DatabaseErrorKind,
        #[case] message: &'static str,
        #[case] expected: FailureClass,
    ) {
        let failure = DieselFailure::classify(database_error(kind, message), "test");
        assert_eq!(failure.class, expected);
        assert_eq!(failure.message, message);
    }

    #[rstest]
    fn not_found_is_a_query_failure() {
        let failure = DieselFailure::classify(DieselError::NotFound, "test");
        assert_eq!(failure.class, FailureClass::Query);
    }

    #[rstest]
    fn statement_timeout_is_rendered_in_milliseconds() {
        assert_eq!(statement_timeout_sql(1500), "SET LOCAL statement_timeout = 1500");
    }
}
