use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ServerState, TIMESTAMP_FORMAT, error::ApiError, parse_id, workbook_attachment};
use crate::{
    spreadsheet::{TemplateKind, TemplateOptions},
    storage::TemplateSummary,
};

#[derive(Debug, Deserialize)]
pub(super) struct TemplateQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
}

pub(super) async fn download_stock(
    State(state): State<ServerState>,
    Query(query): Query<TemplateQuery>,
) -> Result<Response, ApiError> {
    let kind = match query.kind.as_deref() {
        Some(tag) => tag.parse::<TemplateKind>()?,
        None => TemplateKind::CashFlow,
    };
    let record = state.ctx().default_template(kind).await?;
    Ok(workbook_attachment(&record.name, record.data))
}

#[derive(Debug, Serialize)]
struct StockTemplateEntry {
    name: String,
    timestamp: String,
    url: String,
}

#[derive(Debug, Serialize)]
pub(super) struct StockTemplateList {
    count: usize,
    templates: BTreeMap<&'static str, StockTemplateEntry>,
}

pub(super) async fn list_stock(State(state): State<ServerState>) -> Json<StockTemplateList> {
    let store = &state.ctx().stores().templates;
    let templates: BTreeMap<_, _> = TemplateKind::ALL
        .into_iter()
        .map(|kind| {
            let url = format!("/excel-template?type={}", kind.tag());
            let entry = match store.latest_default(kind) {
                Some(record) => StockTemplateEntry {
                    name: record.name,
                    timestamp: record
                        .created_at
                        .with_timezone(&Local)
                        .format(TIMESTAMP_FORMAT)
                        .to_string(),
                    url,
                },
                None => StockTemplateEntry {
                    name: format!("{}.xlsx", kind.tag()),
                    timestamp: "No generada aún".to_string(),
                    url,
                },
            };
            (kind.tag(), entry)
        })
        .collect();

    Json(StockTemplateList {
        count: templates.len(),
        templates,
    })
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateTemplateRequest {
    #[serde(rename = "type")]
    kind: Option<String>,
    company_name: Option<String>,
    period: Option<String>,
    #[serde(default)]
    params: Value,
}

pub(super) async fn create(
    State(state): State<ServerState>,
    payload: Result<Json<CreateTemplateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let kind = request
        .kind
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("Se requiere un 'type' en el JSON".to_string()))?
        .parse::<TemplateKind>()?;
    let params = match request.params {
        Value::Null => Value::Object(Default::default()),
        params @ Value::Object(_) => params,
        _ => {
            return Err(ApiError::BadRequest(
                "'params' debe ser un objeto JSON".to_string(),
            ));
        }
    };
    let options = TemplateOptions {
        company_name: non_blank(request.company_name),
        period: non_blank(request.period),
    };

    let record = state.ctx().create_template(kind, options, params).await?;
    Ok((StatusCode::CREATED, Json(record.summary())).into_response())
}

#[derive(Debug, Serialize)]
pub(super) struct TemplateList {
    count: usize,
    templates: Vec<TemplateSummary>,
}

pub(super) async fn list(State(state): State<ServerState>) -> Json<TemplateList> {
    let templates = state.ctx().stores().templates.list();
    Json(TemplateList {
        count: templates.len(),
        templates,
    })
}

pub(super) async fn download(
    State(state): State<ServerState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound(format!("Plantilla {raw_id} no encontrada"));
    let id = parse_id(&raw_id).ok_or_else(not_found)?;
    let record = state
        .ctx()
        .stores()
        .templates
        .get(id)
        .ok_or_else(not_found)?;
    Ok(workbook_attachment(&record.name, record.data))
}

pub(super) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
