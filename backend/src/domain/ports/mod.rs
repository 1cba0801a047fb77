//! Domain ports for the hexagonal boundary.
//!
//! Driving ports ([`BulkEnrolmentCommand`], [`PurgeCommand`]) are what inbound
//! adapters call. Driven ports are what the domain services call out to.

mod macros;
pub(crate) use macros::define_port_error;

mod activity_log;
mod bulk_enrolment_command;
mod enrolment_repository;
mod purge_command;
mod purge_store;
mod student_lookup_repository;

#[cfg(test)]
pub use activity_log::MockActivityLog;
pub use activity_log::{ActivityEntry, ActivityLog, ActivityLogError, TracingActivityLog};
#[cfg(test)]
pub use bulk_enrolment_command::MockBulkEnrolmentCommand;
pub use bulk_enrolment_command::{BulkEnrolmentCommand, BulkEnrolmentRequest};
#[cfg(test)]
pub use enrolment_repository::MockEnrolmentRepository;
pub use enrolment_repository::{
    BatchUpsertCounts, EnrolmentRepository, EnrolmentRepositoryError,
    FixtureEnrolmentRepository, RowUpsertOutcome,
};
#[cfg(test)]
pub use purge_command::MockPurgeCommand;
pub use purge_command::{PurgeCommand, PurgeRequest, PurgeSelection};
#[cfg(test)]
pub use purge_store::{MockPurgeSession, MockPurgeStore};
pub use purge_store::{
    FixturePurgeSession, FixturePurgeStore, PurgeSession, PurgeStore, PurgeStoreError,
};
#[cfg(test)]
pub use student_lookup_repository::MockStudentLookupRepository;
pub use student_lookup_repository::{
    FixtureStudentLookupRepository, StudentLookupRepository, StudentLookupRepositoryError,
    StudentMatch,
};
