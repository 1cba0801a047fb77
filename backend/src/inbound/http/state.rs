//! Shared HTTP adapter state.
//!
//! Handlers accept this state via `actix_web::web::Data` so they only depend
//! on the driving ports and stay testable without I/O.

use std::sync::Arc;

use crate::domain::ports::{BulkEnrolmentCommand, PurgeCommand};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub enrolments: Arc<dyn BulkEnrolmentCommand>,
    pub purge: Arc<dyn PurgeCommand>,
}

impl HttpState {
    /// Bundle the driving ports.
    pub fn new(enrolments: Arc<dyn BulkEnrolmentCommand>, purge: Arc<dyn PurgeCommand>) -> Self {
        Self { enrolments, purge }
    }
}
