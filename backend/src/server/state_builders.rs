//! Builders wiring domain services to either Diesel adapters or fixtures.

use std::sync::Arc;

use actix_web::web;

use registrar::domain::enrolment::BulkEnrolmentService;
use registrar::domain::ports::{
    BulkEnrolmentCommand, FixtureEnrolmentRepository, FixturePurgeStore,
    FixtureStudentLookupRepository, PurgeCommand, TracingActivityLog,
};
use registrar::domain::purge::PurgeService;
use registrar::inbound::http::state::HttpState;
use registrar::outbound::persistence::{
    DbPool, DieselActivityLog, DieselEnrolmentRepository, DieselPurgeStore,
    DieselStudentLookupRepository,
};

use super::ServerConfig;

fn diesel_ports(
    pool: &DbPool,
    config: &ServerConfig,
) -> (Arc<dyn BulkEnrolmentCommand>, Arc<dyn PurgeCommand>) {
    let activity = Arc::new(DieselActivityLog::new(pool.clone()));
    let enrolments = BulkEnrolmentService::new(
        Arc::new(DieselStudentLookupRepository::new(pool.clone())),
        Arc::new(
            DieselEnrolmentRepository::new(pool.clone())
                .with_statement_timeout(config.bulk_enrolment.batch_timeout()),
        ),
        Arc::clone(&activity),
        config.bulk_enrolment,
    );
    let purge = PurgeService::new(
        Arc::new(
            DieselPurgeStore::new(pool.clone()).with_statement_timeout(config.purge.table_timeout),
        ),
        activity,
        config.purge,
    );
    (Arc::new(enrolments), Arc::new(purge))
}

fn fixture_ports(config: &ServerConfig) -> (Arc<dyn BulkEnrolmentCommand>, Arc<dyn PurgeCommand>) {
    let activity = Arc::new(TracingActivityLog);
    let enrolments = BulkEnrolmentService::new(
        Arc::new(FixtureStudentLookupRepository),
        Arc::new(FixtureEnrolmentRepository),
        Arc::clone(&activity),
        config.bulk_enrolment,
    );
    let purge = PurgeService::new(Arc::new(FixturePurgeStore), activity, config.purge);
    (Arc::new(enrolments), Arc::new(purge))
}

/// Build handler state from the configured pool, or fixtures without one.
pub(super) fn build_http_state(config: &ServerConfig) -> web::Data<HttpState> {
    let (enrolments, purge) = match &config.db_pool {
        Some(pool) => diesel_ports(pool, config),
        None => fixture_ports(config),
    };
    web::Data::new(HttpState::new(enrolments, purge))
}
