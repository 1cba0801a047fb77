//! Service configuration loaded via OrthoConfig.
//!
//! Values come from CLI flags, `REGISTRAR_*` environment variables or a
//! configuration file. The bind address always has a value so that loading
//! succeeds with no sources at all; the other fields are optional and the
//! accessors apply defaults and validate ranges.

use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::enrolment::{BulkEnrolmentConfig, BulkEnrolmentConfigError};
use crate::domain::purge::PurgeConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_UPSERT_BATCH_SIZE: usize = 500;
const DEFAULT_LOOKUP_CHUNK_SIZE: usize = 5_000;
const DEFAULT_BATCH_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_TABLE_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_POOL_MAX_SIZE: u32 = 10;

/// Errors raised while validating settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid bind address '{value}': {source}")]
    BindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error(transparent)]
    BulkEnrolment(#[from] BulkEnrolmentConfigError),
    #[error("table timeout must be greater than zero")]
    TableTimeout,
    #[error("pool size must be greater than zero")]
    PoolSize,
}

/// Registrar service settings.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "REGISTRAR")]
pub struct RegistrarSettings {
    /// PostgreSQL connection URL; fixture ports are used when absent.
    pub database_url: Option<String>,
    /// Socket address the HTTP server binds to.
    #[ortho_config(default = "0.0.0.0:8080".to_owned())]
    pub bind_addr: String,
    /// Rows per upsert transaction (1 to 1000).
    pub upsert_batch_size: Option<usize>,
    /// Registration numbers per lookup query.
    pub lookup_chunk_size: Option<usize>,
    /// Upper bound on one upsert batch, in milliseconds.
    pub batch_timeout_ms: Option<u64>,
    /// Upper bound on purging one table, in milliseconds.
    pub table_timeout_ms: Option<u64>,
    /// Maximum pooled connections.
    pub pool_max_size: Option<u32>,
}

impl Default for RegistrarSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: DEFAULT_BIND_ADDR.to_owned(),
            upsert_batch_size: None,
            lookup_chunk_size: None,
            batch_timeout_ms: None,
            table_timeout_ms: None,
            pool_max_size: None,
        }
    }
}

impl RegistrarSettings {
    /// The database URL, ignoring blank values.
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Parsed bind address; a blank value falls back to the default.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let value = match self.bind_addr.trim() {
            "" => DEFAULT_BIND_ADDR,
            configured => configured,
        };
        value.parse().map_err(|source| SettingsError::BindAddr {
            value: value.to_owned(),
            source,
        })
    }

    /// Validated bulk enrolment tuning.
    pub fn bulk_enrolment(&self) -> Result<BulkEnrolmentConfig, SettingsError> {
        Ok(BulkEnrolmentConfig::new(
            self.upsert_batch_size.unwrap_or(DEFAULT_UPSERT_BATCH_SIZE),
            self.lookup_chunk_size.unwrap_or(DEFAULT_LOOKUP_CHUNK_SIZE),
            Duration::from_millis(self.batch_timeout_ms.unwrap_or(DEFAULT_BATCH_TIMEOUT_MS)),
        )?)
    }

    /// Validated purge tuning.
    pub fn purge(&self) -> Result<PurgeConfig, SettingsError> {
        let millis = self.table_timeout_ms.unwrap_or(DEFAULT_TABLE_TIMEOUT_MS);
        if millis == 0 {
            return Err(SettingsError::TableTimeout);
        }
        Ok(PurgeConfig {
            table_timeout: Duration::from_millis(millis),
        })
    }

    pub fn pool_max_size(&self) -> Result<u32, SettingsError> {
        match self.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE) {
            0 => Err(SettingsError::PoolSize),
            size => Ok(size),
        }
    }
}
