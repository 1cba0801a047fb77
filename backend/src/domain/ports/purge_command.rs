//! Driving port for the dependency-ordered purge.

use async_trait::async_trait;

use crate::domain::Error;
use crate::domain::report::PurgeReport;

/// Which tables to purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeSelection {
    /// Caller-named tables, in any order.
    Tables(Vec<String>),
    /// Every catalogued table.
    All,
}

/// One purge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeRequest {
    pub selection: PurgeSelection,
    pub actor: String,
}

/// Driving port for purges.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PurgeCommand: Send + Sync {
    /// Empty the selected tables in dependency order.
    ///
    /// Naming a protected table rejects the whole request before anything is
    /// touched. Unknown names and per-table failures are reported per item.
    async fn purge(&self, request: PurgeRequest) -> Result<PurgeReport, Error>;
}
