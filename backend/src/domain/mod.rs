//! Domain types, services and ports.
//!
//! Purpose: keep the enrolment and purge rules independent of HTTP and
//! Diesel. Inbound adapters call the driving ports in [`ports`]; the services
//! in [`enrolment`] and [`purge`] implement them on top of the driven ports.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic error payload.
//! - TraceId: request-scoped correlation identifier.
//! - report: structured outcomes for both bulk operations.

pub mod enrolment;
pub mod error;
pub mod ports;
pub mod purge;
pub mod report;
pub mod trace_id;

pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};

/// Convenient result alias for driving ports and handlers.
///
/// # Examples
/// ```
/// use registrar::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::invalid_request("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
