//! Driven port for the activity audit trail.
//!
//! Writes are fire-and-forget from the caller's point of view: services log
//! a failed append and carry on.

use async_trait::async_trait;
use tracing::info;

use super::define_port_error;

define_port_error! {
    /// Errors raised by activity log adapters.
    pub enum ActivityLogError {
        /// The entry could not be written.
        Write { message: String } => "activity log write failed: {message}",
    }
}

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    /// Short verb describing the operation, such as `bulk_enrolment`.
    pub action: String,
    /// Human-readable summary of the outcome.
    pub detail: String,
    /// Who asked for the operation.
    pub actor: String,
}

/// Append-only audit sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Append one entry.
    async fn record(&self, entry: &ActivityEntry) -> Result<(), ActivityLogError>;
}

/// Activity log that only emits a tracing event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActivityLog;

#[async_trait]
impl ActivityLog for TracingActivityLog {
    async fn record(&self, entry: &ActivityEntry) -> Result<(), ActivityLogError> {
        info!(
            target: "registrar::activity",
            action = %entry.action,
            actor = %entry.actor,
            detail = %entry.detail,
            "activity recorded"
        );
        Ok(())
    }
}
