//! PostgreSQL persistence adapters using Diesel.
//!
//! Concrete implementations of the driven ports, backed by `diesel-async`
//! over a `bb8` pool.
//!
//! - **Thin adapters**: repositories translate between Diesel rows and
//!   domain types; the batching and retry rules live in the domain.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Classified errors**: Diesel errors are classified once in
//!   `diesel_helpers` and mapped onto each port's error enum.
//!
//! # Example
//!
//! ```rust,no_run
//! use registrar::outbound::persistence::{DbPool, DieselStudentLookupRepository, PoolConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/registry")).await?;
//! let lookup = DieselStudentLookupRepository::new(pool);
//! # let _ = lookup;
//! # Ok(())
//! # }
//! ```

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

mod diesel_activity_log;
mod diesel_enrolment_repository;
pub(crate) mod diesel_helpers;
mod diesel_purge_store;
mod diesel_student_lookup_repository;
mod models;
mod pool;
mod schema;

pub use diesel_activity_log::DieselActivityLog;
pub use diesel_enrolment_repository::DieselEnrolmentRepository;
pub use diesel_purge_store::{DieselPurgeSession, DieselPurgeStore};
pub use diesel_student_lookup_repository::DieselStudentLookupRepository;
pub use pool::{DbPool, PoolConfig, PoolError};

/// Schema migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Errors raised while applying [`MIGRATIONS`].
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("connect for migrations: {0}")]
    Connect(#[from] diesel::ConnectionError),
    #[error("apply migrations: {0}")]
    Apply(String),
}

/// Apply pending migrations over a blocking connection.
///
/// Call from `tokio::task::spawn_blocking` inside async contexts.
pub fn apply_migrations(database_url: &str) -> Result<usize, MigrationError> {
    let mut conn = PgConnection::establish(database_url)?;
    conn.run_pending_migrations(MIGRATIONS)
        .map(|applied| applied.len())
        .map_err(|err| MigrationError::Apply(err.to_string()))
}
