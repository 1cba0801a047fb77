//! Dependency-ordered purge of the registry tables.

mod catalogue;
mod service;


use std::time::Duration;

pub use catalogue::{ProtectedTable, PurgeTarget, TableClass, classify};
pub use service::PurgeService;

/// Tuning for the purge engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeConfig {
    /// Bound on each table's existence check, delete and identity reset.
    pub table_timeout: Duration,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            table_timeout: Duration::from_secs(60),
        }
    }
}
