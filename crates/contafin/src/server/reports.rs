use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::{ServerState, error::ApiError, extract::OptionalJson};
use crate::{scheduler, storage::Report};

pub(super) async fn latest(State(state): State<ServerState>) -> Json<Report> {
    let report = match state.ctx().stores().reports.latest() {
        Some(report) => report,
        None => scheduler::generate_financial_report(state.ctx()).await,
    };
    Json(report)
}

#[derive(Debug, Serialize)]
pub(super) struct ReportList {
    count: usize,
    reports: Vec<Report>,
}

pub(super) async fn list(State(state): State<ServerState>) -> Json<ReportList> {
    let reports = state.ctx().stores().reports.list();
    Json(ReportList {
        count: reports.len(),
        reports,
    })
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct GenerateRequest {
    #[serde(default)]
    background: bool,
}

#[derive(Debug, Serialize)]
struct GeneratedReport {
    message: &'static str,
    #[serde(flatten)]
    report: Report,
}

pub(super) async fn generate(
    State(state): State<ServerState>,
    OptionalJson(request): OptionalJson<GenerateRequest>,
) -> Result<Response, ApiError> {
    let request = request.unwrap_or_default();

    if request.background {
        state.scheduler().request_report().await.map_err(|err| {
            warn!(error = ?err, "failed to queue report generation");
            ApiError::Internal("No se pudo programar la generación del informe".to_string())
        })?;
        let body = Json(json!({
            "message": "Generación de informe programada",
            "queued": true,
        }));
        return Ok((StatusCode::ACCEPTED, body).into_response());
    }

    let report = scheduler::generate_financial_report(state.ctx()).await;
    Ok(Json(GeneratedReport {
        message: "Informe financiero generado correctamente",
        report,
    })
    .into_response())
}
