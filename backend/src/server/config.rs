//! HTTP server configuration object and helpers.

use std::net::SocketAddr;

use registrar::domain::enrolment::BulkEnrolmentConfig;
use registrar::domain::purge::PurgeConfig;
use registrar::outbound::persistence::DbPool;

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) bulk_enrolment: BulkEnrolmentConfig,
    pub(crate) purge: PurgeConfig,
}

impl ServerConfig {
    /// Configuration with default tuning and fixture ports.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            db_pool: None,
            bulk_enrolment: BulkEnrolmentConfig::default(),
            purge: PurgeConfig::default(),
        }
    }

    /// Attach a database pool; Diesel adapters replace the fixtures.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_bulk_enrolment(mut self, config: BulkEnrolmentConfig) -> Self {
        self.bulk_enrolment = config;
        self
    }

    #[must_use]
    pub fn with_purge(mut self, config: PurgeConfig) -> Self {
        self.purge = config;
        self
    }

    /// Return the socket address the server will bind to.
    #[cfg_attr(
        not(any(test, doctest)),
        expect(dead_code, reason = "Exercised by server tests")
    )]
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
