//! HTTP inbound adapter exposing the admin endpoints.

pub mod actor;
pub mod bulk_enrolments;
pub mod error;
pub mod health;
pub mod purge;
pub mod schemas;
pub mod state;
pub(crate) mod validation;

pub use error::ApiResult;
