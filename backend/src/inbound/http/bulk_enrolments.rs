//! Bulk enrolment HTTP handler.
//!
//! ```text
//! POST /api/v1/admin/enrolments/bulk
//! ```

use std::str::FromStr;

use actix_web::{HttpRequest, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::enrolment::EnrolmentStatus;
use crate::domain::ports::BulkEnrolmentRequest;
use crate::domain::report::{EnrolmentFailure, EnrolmentReport};
use crate::domain::Error;
use crate::inbound::http::ApiResult;
use crate::inbound::http::actor::actor_from_headers;
use crate::inbound::http::schemas::ErrorSchema;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{invalid_field_error, missing_field_error};

/// Request payload for a bulk enrolment.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct BulkEnrolmentBody {
    /// Course every resolved student is enrolled on.
    #[schema(example = 12)]
    pub target_key: Option<i64>,
    /// Student registration numbers; blanks and duplicates are ignored.
    #[schema(example = json!(["A100", "A101"]))]
    pub identifiers: Option<Vec<String>>,
    /// Enrolment status to write; defaults to `active`.
    #[schema(example = "active")]
    pub status: Option<String>,
}

/// One resolved student whose enrolment failed.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EnrolmentFailureBody {
    pub student_id: i64,
    pub registration_number: String,
    pub reason: String,
}

impl From<&EnrolmentFailure> for EnrolmentFailureBody {
    fn from(value: &EnrolmentFailure) -> Self {
        Self {
            student_id: value.student_id.get(),
            registration_number: value.registration_number.clone(),
            reason: value.reason.clone(),
        }
    }
}

/// Accounting returned for a bulk enrolment.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkEnrolmentResponse {
    /// `false` only when no identifier matched a student.
    pub success: bool,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Registration numbers with no matching student, in request order.
    pub unmatched: Vec<String>,
    pub failures: Vec<EnrolmentFailureBody>,
    pub message: String,
}

impl From<EnrolmentReport> for BulkEnrolmentResponse {
    fn from(report: EnrolmentReport) -> Self {
        Self {
            success: report.success(),
            inserted: report.inserted(),
            skipped: report.skipped(),
            failed: report.failed(),
            unmatched: report.unmatched().to_vec(),
            failures: report.failures().iter().map(EnrolmentFailureBody::from).collect(),
            message: report.message(),
        }
    }
}

fn parse_status(raw: Option<String>) -> Result<EnrolmentStatus, Error> {
    match raw {
        None => Ok(EnrolmentStatus::default()),
        Some(value) => EnrolmentStatus::from_str(&value).map_err(|err| {
            invalid_field_error("status", value.clone(), err.to_string())
        }),
    }
}

fn parse_body(body: BulkEnrolmentBody, actor: String) -> Result<BulkEnrolmentRequest, Error> {
    let target_key = body
        .target_key
        .ok_or_else(|| missing_field_error("target_key"))?;
    let identifiers = body
        .identifiers
        .ok_or_else(|| missing_field_error("identifiers"))?;
    let status = parse_status(body.status)?;
    Ok(BulkEnrolmentRequest {
        target_key,
        identifiers,
        status,
        actor,
    })
}

/// Enrol a list of students on a course, idempotently.
#[utoipa::path(
    post,
    path = "/api/v1/admin/enrolments/bulk",
    request_body = BulkEnrolmentBody,
    params(
        ("x-actor-id" = Option<String>, Header, description = "Operator recorded in the activity log")
    ),
    responses(
        (status = 200, description = "Enrolment accounting", body = BulkEnrolmentResponse),
        (status = 400, description = "Invalid request", body = ErrorSchema),
        (status = 409, description = "Conflict", body = ErrorSchema),
        (status = 503, description = "Service unavailable", body = ErrorSchema),
        (status = 500, description = "Internal server error", body = ErrorSchema)
    ),
    tags = ["admin"],
    operation_id = "bulkEnrol"
)]
#[post("/admin/enrolments/bulk")]
pub async fn bulk_enrol(
    state: web::Data<HttpState>,
    request: HttpRequest,
    payload: web::Json<BulkEnrolmentBody>,
) -> ApiResult<web::Json<BulkEnrolmentResponse>> {
    let actor = actor_from_headers(request.headers());
    let command = parse_body(payload.into_inner(), actor)?;
    let report = state.enrolments.enrol(command).await?;
    Ok(web::Json(BulkEnrolmentResponse::from(report)))
}
