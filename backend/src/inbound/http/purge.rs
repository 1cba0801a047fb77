//! Purge HTTP handler.
//!
//! ```text
//! POST /api/v1/admin/purge
//! ```

use actix_web::{HttpRequest, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::domain::Error;
use crate::domain::ports::{PurgeRequest, PurgeSelection};
use crate::domain::report::{PurgeItemError, PurgeReport, TableOutcome, TableStatus};
use crate::inbound::http::ApiResult;
use crate::inbound::http::actor::actor_from_headers;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;

/// Request payload: either named tables or the whole catalogue.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct PurgeBody {
    /// Tables to empty; processed in dependency order regardless of input order.
    #[schema(example = json!(["course_enrolments", "students"]))]
    pub tables: Option<Vec<String>>,
    /// Empty every catalogued table.
    pub all: Option<bool>,
}

/// Per-item error entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurgeErrorBody {
    pub table: String,
    pub reason: String,
}

impl From<&PurgeItemError> for PurgeErrorBody {
    fn from(value: &PurgeItemError) -> Self {
        Self {
            table: value.table.clone(),
            reason: value.reason.clone(),
        }
    }
}

/// Outcome for one catalogued table.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TableOutcomeBody {
    pub table: String,
    pub label: String,
    /// One of `cleared`, `missing` or `failed`.
    #[schema(example = "cleared")]
    pub status: String,
    pub rows_deleted: u64,
    pub identity_reset: bool,
    pub reason: Option<String>,
}

const fn status_str(status: TableStatus) -> &'static str {
    match status {
        TableStatus::Cleared => "cleared",
        TableStatus::Missing => "missing",
        TableStatus::Failed => "failed",
    }
}

impl From<&TableOutcome> for TableOutcomeBody {
    fn from(value: &TableOutcome) -> Self {
        Self {
            table: value.target.table_name().to_owned(),
            label: value.target.label().to_owned(),
            status: status_str(value.status).to_owned(),
            rows_deleted: value.rows_deleted,
            identity_reset: value.identity_reset,
            reason: value.reason.clone(),
        }
    }
}

/// Accounting returned for a purge.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PurgeResponse {
    /// Labels of emptied tables, in processing order.
    pub cleared: Vec<String>,
    /// Labels of requested tables absent from the store.
    pub missing: Vec<String>,
    pub errors: Vec<PurgeErrorBody>,
    pub tables: Vec<TableOutcomeBody>,
    /// `false` when foreign key enforcement could not be confirmed afterwards.
    pub enforcement_restored: bool,
}

impl From<PurgeReport> for PurgeResponse {
    fn from(report: PurgeReport) -> Self {
        Self {
            cleared: report.cleared().into_iter().map(str::to_owned).collect(),
            missing: report.missing().into_iter().map(str::to_owned).collect(),
            errors: report.errors().iter().map(PurgeErrorBody::from).collect(),
            tables: report.tables().iter().map(TableOutcomeBody::from).collect(),
            enforcement_restored: report.enforcement_restored(),
        }
    }
}

fn parse_selection(body: PurgeBody) -> Result<PurgeSelection, Error> {
    match (body.tables, body.all.unwrap_or(false)) {
        (Some(_), true) => Err(Error::invalid_request(
            "supply either tables or all, not both",
        )
        .with_details(json!({"fields": ["tables", "all"]}))),
        (Some(tables), false) => Ok(PurgeSelection::Tables(tables)),
        (None, true) => Ok(PurgeSelection::All),
        (None, false) => Err(Error::invalid_request(
            "supply a list of tables or set all to true",
        )
        .with_details(json!({"fields": ["tables", "all"]}))),
    }
}

/// Empty catalogued tables in dependency order.
#[utoipa::path(
    post,
    path = "/api/v1/admin/purge",
    request_body = PurgeBody,
    params(
        ("x-actor-id" = Option<String>, Header, description = "Operator recorded in the activity log")
    ),
    responses(
        (status = 200, description = "Purge accounting", body = PurgeResponse),
        (status = 400, description = "Invalid or protected table selection", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema),
        (status = 500, description = "Internal server error", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "purgeTables"
)]
#[post("/admin/purge")]
pub async fn purge_tables(
    state: web::Data<HttpState>,
    request: HttpRequest,
    payload: web::Json<PurgeBody>,
) -> ApiResult<web::Json<PurgeResponse>> {
    let selection = parse_selection(payload.into_inner())?;
    let report = state
        .purge
        .purge(PurgeRequest {
            selection,
            actor: actor_from_headers(request.headers()),
        })
        .await?;
    Ok(web::Json(PurgeResponse::from(report)))
}
