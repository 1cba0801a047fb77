//! Registrar backend: bulk enrolment and dependency-ordered purge over a
//! PostgreSQL registry.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod settings;

pub use doc::ApiDoc;
pub use domain::TraceId;
pub use middleware::Trace;
