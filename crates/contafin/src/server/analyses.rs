use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};

use super::{ServerState, error::ApiError, parse_id, templates::non_blank, workbook_attachment};
use crate::{
    spreadsheet::{
        self, TemplateKind, TemplateOptions,
        import::{self, ImportedSheet},
    },
    storage::{AnalysisRecord, AnalysisSummary, AttachedFile, ERROR_ANALYSIS_KIND},
};

const DEFAULT_IMPORT_ANALYSIS: &str = "general";

#[derive(Debug, Deserialize)]
pub(super) struct CreateAnalysisRequest {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    parameters: Value,
}

/// Asks the assistant for an analysis; a template tag as `type` also attaches
/// that workbook, customised with `company_name` / `period` parameters.
pub(super) async fn create(
    State(state): State<ServerState>,
    payload: Result<Json<CreateAnalysisRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let kind = non_blank(request.kind)
        .ok_or_else(|| ApiError::BadRequest("Se requiere un 'type' en el JSON".to_string()))?;
    let parameters = match request.parameters {
        Value::Null => Value::Object(Default::default()),
        parameters => parameters,
    };

    let mut attachment = None;
    if let Ok(template) = kind.parse::<TemplateKind>() {
        let text = |key: &str| {
            parameters
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let options = TemplateOptions {
            company_name: non_blank(text("company_name")),
            period: non_blank(text("period")),
        };
        let data = spreadsheet::render(template, options).await?;
        attachment = Some(AttachedFile {
            name: template.file_name(Local::now().date_naive()),
            data,
        });
    }

    let content = state.ctx().assistant().analysis(&kind, &parameters).await;
    let mut record = AnalysisRecord::new(kind.as_str(), parameters, content);
    if let Some(file) = attachment {
        record = record.with_file(file);
    }

    let summary = record.summary();
    state.ctx().stores().analyses.insert(record);
    info!(analysis = %summary.id, kind = %summary.kind, "analysis stored");
    Ok((StatusCode::CREATED, Json(summary)).into_response())
}

#[derive(Debug, Serialize)]
pub(super) struct AnalysisList {
    count: usize,
    analyses: Vec<AnalysisSummary>,
}

pub(super) async fn list(State(state): State<ServerState>) -> Json<AnalysisList> {
    let analyses = state.ctx().stores().analyses.list();
    Json(AnalysisList {
        count: analyses.len(),
        analyses,
    })
}

pub(super) async fn show(
    State(state): State<ServerState>,
    Path(raw_id): Path<String>,
) -> Result<Json<AnalysisSummary>, ApiError> {
    let record = find(&state, &raw_id)?;
    Ok(Json(record.summary()))
}

pub(super) async fn download_file(
    State(state): State<ServerState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let record = find(&state, &raw_id)?;
    let file = record.file.ok_or_else(|| {
        ApiError::NotFound(format!("El análisis {raw_id} no tiene archivo adjunto"))
    })?;
    Ok(workbook_attachment(&file.name, file.data))
}

fn find(state: &ServerState, raw_id: &str) -> Result<AnalysisRecord, ApiError> {
    parse_id(raw_id)
        .and_then(|id| state.ctx().stores().analyses.get(id))
        .ok_or_else(|| ApiError::NotFound(format!("Análisis {raw_id} no encontrado")))
}

#[derive(Debug, Serialize)]
struct ImportResponse {
    message: &'static str,
    analysis: AnalysisSummary,
    sheets: Vec<ImportedSheet>,
}

struct Upload {
    file_name: String,
    data: Bytes,
}

pub(super) async fn import_file(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut upload = None;
    let mut analysis_type = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        ApiError::BadRequest(format!("Formulario multipart inválido: {}", err.body_text()))
    })? {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().trim().to_string();
                let data = field.bytes().await.map_err(|err| {
                    ApiError::BadRequest(format!("No se pudo leer el archivo: {}", err.body_text()))
                })?;
                upload = Some(Upload { file_name, data });
            }
            Some("analysis_type") => {
                let text = field.text().await.map_err(|err| {
                    ApiError::BadRequest(format!("Campo 'analysis_type' inválido: {}", err.body_text()))
                })?;
                analysis_type = non_blank(Some(text));
            }
            _ => {}
        }
    }

    let Upload { file_name, data } = upload
        .ok_or_else(|| ApiError::BadRequest("No se ha enviado ningún archivo".to_string()))?;
    if file_name.is_empty() {
        return Err(ApiError::BadRequest("Nombre de archivo vacío".to_string()));
    }
    import::supported_extension(&file_name)?;
    let analysis_type = analysis_type.unwrap_or_else(|| DEFAULT_IMPORT_ANALYSIS.to_string());

    let temp_dir = state.ctx().config().temp_dir.clone();
    let spooled = Bytes::clone(&data);
    let name = file_name.clone();
    let imported = tokio::task::spawn_blocking(move || {
        import::import_bytes(&name, &spooled, &temp_dir)
    })
    .await
    .map_err(spreadsheet::SpreadsheetError::from)
    .and_then(|result| result);

    let workbook = match imported {
        Ok(workbook) => workbook,
        Err(err) => {
            error!(file = %file_name, error = ?err, "file import failed");
            let message = format!("Error al procesar el archivo: {err}");
            let record = AnalysisRecord::new(
                ERROR_ANALYSIS_KIND,
                json!({ "file_name": file_name, "analysis_type": analysis_type }),
                message.clone(),
            );
            let analysis_id = record.id;
            state.ctx().stores().analyses.insert(record);
            return Err(ApiError::ImportFailed {
                message,
                analysis_id,
            });
        }
    };

    let content = state
        .ctx()
        .assistant()
        .import_review(&workbook, &analysis_type)
        .await;
    let parameters = json!({
        "file_name": file_name,
        "sheets": workbook
            .sheets
            .iter()
            .map(|sheet| sheet.name.as_str())
            .collect::<Vec<_>>(),
    });
    let record = AnalysisRecord::new(analysis_type, parameters, content).with_file(AttachedFile {
        name: file_name,
        data: data.to_vec(),
    });
    let analysis = record.summary();
    state.ctx().stores().analyses.insert(record);
    info!(
        analysis = %analysis.id,
        sheets = workbook.sheets.len(),
        "imported workbook analysed"
    );

    let body = Json(ImportResponse {
        message: "Archivo importado y analizado correctamente",
        analysis,
        sheets: workbook.sheets,
    });
    Ok((StatusCode::CREATED, body).into_response())
}
