//! OpenAPI documentation configuration.
//!
//! [`ApiDoc`] registers the admin endpoints, the health probes and the error
//! schema wrappers. Swagger UI serves it in debug builds and
//! `cargo run --bin openapi-dump` prints it for external tooling.

use crate::inbound::http::bulk_enrolments::{
    BulkEnrolmentBody, BulkEnrolmentResponse, EnrolmentFailureBody,
};
use crate::inbound::http::purge::{PurgeBody, PurgeErrorBody, PurgeResponse, TableOutcomeBody};
use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};
use utoipa::OpenApi;

/// OpenAPI document for the registrar API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Registrar admin API",
        description = "Bulk enrolment and dependency-ordered purge of registry data."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::bulk_enrolments::bulk_enrol,
        crate::inbound::http::purge::purge_tables,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        BulkEnrolmentBody,
        BulkEnrolmentResponse,
        EnrolmentFailureBody,
        PurgeBody,
        PurgeResponse,
        PurgeErrorBody,
        TableOutcomeBody,
        ErrorSchema,
        ErrorCodeSchema
    )),
    tags(
        (name = "admin", description = "Bulk administrative operations"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
