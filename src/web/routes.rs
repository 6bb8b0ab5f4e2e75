use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use super::templates;
use super::AppState;
use crate::report::{CreateReportRequest, Report, ReportId, ReportStatus};

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/reports", post(create_report))
        .route("/api/reports/:id", get(get_report))
        .route("/api/*rest", any(api_not_found))
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    success: bool,
    id: ReportId,
    message: &'static str,
    status: ReportStatus,
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    success: bool,
    data: Report,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": error.into() })),
    )
        .into_response()
}

// ========== API Routes ==========

async fn health() -> Response {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

async fn create_report(
    State(state): State<AppState>,
    payload: Result<Json<CreateReportRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e.body_text(), "Rejected report request body");
            return error_response(StatusCode::BAD_REQUEST, e.body_text());
        }
    };

    let request = match body.validate(state.config.max_range_days) {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "Invalid report request");
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let report = match state
        .pipeline
        .store()
        .create_pending(&request, Utc::now())
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to create report: {e}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create report");
        }
    };

    let id = report.id;
    info!(
        report_id = %id,
        channel = %request.username,
        start = %request.range.start(),
        end = %request.range.end(),
        "Report accepted"
    );

    Arc::clone(&state.pipeline).spawn(report);

    (
        StatusCode::ACCEPTED,
        Json(CreatedResponse {
            success: true,
            id,
            message: "Report generation started",
            status: ReportStatus::Pending,
        }),
    )
        .into_response()
}

async fn get_report(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<ReportId>() else {
        return error_response(StatusCode::NOT_FOUND, "Report not found");
    };

    match state.pipeline.store().load(id).await {
        Ok(Some(report)) => Json(ReportResponse {
            success: true,
            data: report,
        })
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Report not found"),
        Err(e) => {
            tracing::error!("Failed to load report {id}: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read report")
        }
    }
}

async fn api_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

// ========== Frontend ==========

/// Entry page for every non-API path; the frontend does its own routing.
pub async fn index(method: Method) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    Html(templates::render_index().into_string()).into_response()
}
