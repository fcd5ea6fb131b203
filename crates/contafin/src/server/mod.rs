use std::{net::SocketAddr, path::Path};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, Utc};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

mod analyses;
mod chat;
pub mod error;
mod extract;
mod reports;
mod templates;

use crate::{
    scheduler::SchedulerHandle,
    spreadsheet::{TemplateKind, XLSX_MEDIA_TYPE},
    state::AppContext,
};

/// Upload ceiling for `/import`.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
pub(super) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone)]
pub struct ServerState {
    ctx: AppContext,
    scheduler: SchedulerHandle,
}

impl ServerState {
    pub fn new(ctx: AppContext, scheduler: SchedulerHandle) -> Self {
        Self { ctx, scheduler }
    }

    fn ctx(&self) -> &AppContext {
        &self.ctx
    }

    fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }
}

pub async fn serve(state: ServerState) -> anyhow::Result<()> {
    let addr: SocketAddr = state.ctx().config().server.addr().parse()?;
    let listener = TcpListener::bind(addr).await?;
    serve_with_listener(listener, state).await
}

pub async fn serve_with_listener(listener: TcpListener, state: ServerState) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "server listening");

    let app = router(state.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.ctx().clone()))
        .await?;

    Ok(())
}

fn router(state: ServerState) -> Router {
    let cors = cors_layer(state.ctx().config().server.frontend_origin.as_deref());

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/chat", post(chat::chat))
        .route("/reset", post(chat::reset))
        .route("/report", get(reports::latest))
        .route("/reports", get(reports::list))
        .route("/generate-report", post(reports::generate))
        .route("/excel-template", get(templates::download_stock))
        .route("/excel-templates", get(templates::list_stock))
        .route("/templates", get(templates::list).post(templates::create))
        .route("/templates/:id", get(templates::download))
        .route("/analyses", get(analyses::list).post(analyses::create))
        .route("/analyses/:id", get(analyses::show))
        .route("/analyses/:id/file", get(analyses::download_file))
        .route(
            "/import",
            post(analyses::import_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(frontend_origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match frontend_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(err)) => {
            warn!(error = %err, "invalid FRONTEND_URL, allowing any origin");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

async fn shutdown_signal(ctx: AppContext) {
    ctx.shutdown_notifier().notified().await;
}

async fn index() -> Json<Value> {
    let templates: Vec<&str> = TemplateKind::ALL.iter().map(|kind| kind.tag()).collect();
    Json(json!({
        "message": "ContaFin - Agente Contable-Financiero para PYMEs",
        "description": "Asistente especializado en contabilidad, finanzas operativas y cumplimiento fiscal",
        "company": "Innovación Financiera - Expertos en Soluciones Contables y Financieras",
        "status": "online",
        "last_update": Local::now().format(TIMESTAMP_FORMAT).to_string(),
        "endpoints": {
            "/chat": "POST - Interactuar con ContaFin mediante mensajes",
            "/reset": "POST - Reiniciar una sesión de conversación",
            "/report": "GET - Obtener el último informe financiero",
            "/reports": "GET - Listar los informes disponibles",
            "/generate-report": "POST - Solicitar un nuevo análisis financiero",
            "/excel-template": "GET - Obtener plantilla Excel según tipo solicitado",
            "/excel-templates": "GET - Listar todas las plantillas Excel disponibles",
            "/templates": "GET/POST - Listar o crear plantillas personalizadas",
            "/templates/{id}": "GET - Descargar una plantilla creada",
            "/analyses": "GET/POST - Listar o solicitar análisis financieros",
            "/analyses/{id}": "GET - Consultar un análisis",
            "/analyses/{id}/file": "GET - Descargar el archivo adjunto de un análisis",
            "/import": "POST - Importar un archivo Excel para su análisis",
            "/health": "GET - Verificar estado del servicio",
        },
        "templates_available": templates,
    }))
}

async fn health(State(state): State<ServerState>) -> Json<Value> {
    let ctx = state.ctx();
    let config = ctx.config();
    let stores = ctx.stores();
    let identity = ctx.assistant().identity();

    let last_report_age_hours = match stores.reports.latest() {
        Some(report) => {
            let age = Utc::now() - report.generated_at;
            json!(age.num_seconds() as f64 / 3600.0)
        }
        None => json!("N/A"),
    };
    let next_scheduled_report = match state.scheduler().next_slot() {
        Some(at) => json!(at.format(TIMESTAMP_FORMAT).to_string()),
        None => json!("N/A"),
    };

    Json(json!({
        "status": "ok",
        "service_name": "ContaFin - Agente Contable-Financiero",
        "provider": "Innovación Financiera",
        "llm_provider": identity.provider,
        "model": identity.model,
        "ollama_url": config.llm.base_url,
        "reports_count": stores.reports.len(),
        "templates_count": stores.templates.len(),
        "analyses_count": stores.analyses.len(),
        "sessions_count": stores.sessions.len(),
        "last_report_age_hours": last_report_age_hours,
        "next_scheduled_report": next_scheduled_report,
        "uptime_seconds": (Utc::now() - ctx.started_at()).num_seconds(),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Local::now().format(TIMESTAMP_FORMAT).to_string(),
    }))
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

/// Serves workbook bytes as a download named `file_name`.
fn workbook_attachment(file_name: &str, data: Vec<u8>) -> Response {
    let media_type = match Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("xls") => "application/vnd.ms-excel",
        Some("ods") => "application/vnd.oasis.opendocument.spreadsheet",
        _ => XLSX_MEDIA_TYPE,
    };
    // Header values must stay printable ASCII.
    let safe_name: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    (
        [
            (header::CONTENT_TYPE, media_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{safe_name}\""),
            ),
        ],
        data,
    )
        .into_response()
}
