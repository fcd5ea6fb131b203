use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Notify;
use tracing::info;

use crate::{
    assistant::Assistant,
    config::AppConfig,
    spreadsheet::{self, SpreadsheetError, TemplateKind, TemplateOptions},
    storage::{Stores, TemplateRecord},
};

#[derive(Clone)]
pub struct AppContext {
    config: Arc<AppConfig>,
    shutdown: Arc<Notify>,
    assistant: Arc<Assistant>,
    stores: Stores,
    started_at: DateTime<Utc>,
}

impl AppContext {
    pub fn new(config: AppConfig, assistant: Arc<Assistant>) -> Self {
        let stores = Stores::in_memory(&config);
        Self::with_stores(config, assistant, stores)
    }

    pub fn with_stores(config: AppConfig, assistant: Arc<Assistant>, stores: Stores) -> Self {
        Self {
            config: Arc::new(config),
            shutdown: Arc::new(Notify::new()),
            assistant,
            stores,
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    pub fn assistant(&self) -> Arc<Assistant> {
        Arc::clone(&self.assistant)
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn shutdown_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// The cached stock-layout workbook for `kind`, generating and storing it
    /// on first use.
    pub async fn default_template(
        &self,
        kind: TemplateKind,
    ) -> Result<TemplateRecord, SpreadsheetError> {
        if let Some(record) = self.stores.templates.latest_default(kind) {
            return Ok(record);
        }
        self.create_template(kind, TemplateOptions::default(), Value::Object(Default::default()))
            .await
    }

    pub async fn create_template(
        &self,
        kind: TemplateKind,
        options: TemplateOptions,
        params: Value,
    ) -> Result<TemplateRecord, SpreadsheetError> {
        let data = spreadsheet::render(kind, options.clone()).await?;
        let record = TemplateRecord::new(kind, data, options, params);
        info!(
            template = %record.id,
            kind = %kind,
            bytes = record.data.len(),
            "template generated"
        );
        self.stores.templates.insert(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LocalStubClient;
    use serde_json::json;

    fn context() -> AppContext {
        let config = AppConfig::from_lookup(|_| None).expect("config");
        AppContext::new(config, Arc::new(Assistant::new(Arc::new(LocalStubClient))))
    }

    #[tokio::test]
    async fn default_template_is_generated_once() {
        let ctx = context();
        let first = ctx.default_template(TemplateKind::Payroll).await.expect("template");
        let second = ctx.default_template(TemplateKind::Payroll).await.expect("template");

        assert_eq!(first.id, second.id);
        assert_eq!(ctx.stores().templates.len(), 1);
        assert!(first.data.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn customised_template_does_not_replace_default() {
        let ctx = context();
        let custom = ctx
            .create_template(
                TemplateKind::CashFlow,
                TemplateOptions {
                    company_name: Some("Ferretería El Tornillo".to_string()),
                    period: None,
                },
                json!({}),
            )
            .await
            .expect("template");
        assert!(!custom.is_default());

        let stock = ctx.default_template(TemplateKind::CashFlow).await.expect("template");
        assert_ne!(stock.id, custom.id);
        assert_eq!(ctx.stores().templates.len(), 2);
    }
}
