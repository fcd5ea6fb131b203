use std::time::Duration;

use anyhow::Result;
use contafin::{
    config::AppConfig,
    spreadsheet::{self, TemplateKind, TemplateOptions, XLSX_MEDIA_TYPE},
};
use httpmock::prelude::*;
use reqwest::{
    StatusCode,
    multipart::{Form, Part},
};
use serde_json::{Value, json};
use serial_test::serial;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

mod common;

use common::TestApp;

#[tokio::test]
#[serial]
async fn stub_service_serves_chat_reports_templates_and_imports() -> Result<()> {
    let tmp = TempDir::new()?;
    unsafe {
        std::env::set_var("LLM_PROVIDER", "local_stub");
        std::env::set_var("TEMP_DIR", tmp.path());
    }
    let config = AppConfig::load()?;
    unsafe {
        std::env::remove_var("LLM_PROVIDER");
        std::env::remove_var("TEMP_DIR");
    }

    let app = TestApp::spawn(config).await?;

    // Startup report and template warm-up run in the background.
    timeout(Duration::from_secs(10), async {
        while app.ctx.stores().reports.is_empty() || app.ctx.stores().templates.len() < 2 {
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await?;

    let chat: Value = app
        .client
        .post(app.url("/chat"))
        .json(&json!({"message": "¿Qué es el punto de equilibrio?", "session_id": "e2e"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(chat["session_id"], "e2e");
    assert!(
        chat["response"]
            .as_str()
            .unwrap_or_default()
            .contains("¿Qué es el punto de equilibrio?")
    );
    assert_eq!(app.ctx.stores().sessions.history("e2e").len(), 2);

    let missing = app
        .client
        .post(app.url("/chat"))
        .json(&json!({"session_id": "e2e"}))
        .send()
        .await?;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let reports: Value = app.client.get(app.url("/reports")).send().await?.json().await?;
    assert_eq!(reports["count"], 1);

    let template = app
        .client
        .get(app.url("/excel-template?type=flujo_caja"))
        .send()
        .await?;
    assert_eq!(template.status(), StatusCode::OK);
    assert_eq!(
        template
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some(XLSX_MEDIA_TYPE)
    );
    let bytes = template.bytes().await?;
    assert!(bytes.starts_with(b"PK"));
    // Served from the warm-up cache.
    assert_eq!(app.ctx.stores().templates.len(), 2);

    let invalid = app
        .client
        .get(app.url("/excel-template?type=inventario"))
        .send()
        .await?;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let workbook = spreadsheet::generate(TemplateKind::FinancialRatios, &TemplateOptions::default())?;
    let form = Form::new().text("analysis_type", "rentabilidad").part(
        "file",
        Part::bytes(workbook).file_name("ratios_cliente.xlsx"),
    );
    let imported = app
        .client
        .post(app.url("/import"))
        .multipart(form)
        .send()
        .await?;
    assert_eq!(imported.status(), StatusCode::CREATED);
    let imported: Value = imported.json().await?;
    assert_eq!(imported["analysis"]["type"], "rentabilidad");
    assert_eq!(imported["sheets"][0]["name"], "Ratios Financieros");

    let analyses: Value = app.client.get(app.url("/analyses")).send().await?.json().await?;
    assert_eq!(analyses["count"], 1);

    let health: Value = app.client.get(app.url("/health")).send().await?.json().await?;
    assert_eq!(health["llm_provider"], "local_stub");
    assert_eq!(health["analyses_count"], 1);
    assert!(health["next_scheduled_report"].is_string());

    app.shutdown().await
}

#[tokio::test]
#[serial]
async fn chat_falls_back_to_completion_against_ollama() -> Result<()> {
    let ollama = MockServer::start_async().await;
    let chat_mock = ollama
        .mock_async(|when, then| {
            when.method(POST).path("/api/chat");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"message":{"role":"assistant","content":""}}"#);
        })
        .await;
    let generate_mock = ollama
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("Usuario: Necesito un flujo de caja");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"response":"Aquí tiene su flujo de caja.","done":true}"#);
        })
        .await;

    let tmp = TempDir::new()?;
    let config_path = tmp.path().join("contafin.yml");
    std::fs::write(
        &config_path,
        "reports:\n  schedule: []\n  generate_on_startup: false\ntemplates:\n  warm_up: []\n",
    )?;

    unsafe {
        std::env::set_var("CONTAFIN_CONFIG", &config_path);
        std::env::set_var("OLLAMA_URL", ollama.base_url());
        std::env::set_var("MODEL_NAME", "llama3:8b");
    }
    let config = AppConfig::load()?;
    unsafe {
        std::env::remove_var("CONTAFIN_CONFIG");
        std::env::remove_var("OLLAMA_URL");
        std::env::remove_var("MODEL_NAME");
    }

    let app = TestApp::spawn(config).await?;

    let chat: Value = app
        .client
        .post(app.url("/chat"))
        .json(&json!({"message": "Necesito un flujo de caja"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(chat["response"], "Aquí tiene su flujo de caja.");
    assert_eq!(chat["session_id"], "default");

    chat_mock.assert_hits_async(1).await;
    generate_mock.assert_hits_async(1).await;

    let health: Value = app.client.get(app.url("/health")).send().await?.json().await?;
    assert_eq!(health["model"], "llama3:8b");
    assert_eq!(health["ollama_url"], ollama.base_url());
    assert_eq!(health["next_scheduled_report"], "N/A");

    app.shutdown().await
}
