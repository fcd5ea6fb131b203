//! Record types and the store interfaces the service is wired against.
//!
//! Handlers and the scheduler only see the traits below; [`Stores::in_memory`]
//! supplies the process-lifetime implementations from [`memory`].

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    llm::ChatMessage,
    spreadsheet::{TemplateKind, TemplateOptions},
};

pub mod memory;

pub use memory::{
    InMemoryAnalysisStore, InMemoryReportStore, InMemorySessionStore, InMemoryTemplateStore,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub id: Uuid,
    /// Calendar day the report was produced, `YYYY-MM-DD`.
    pub date: String,
    pub content: String,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// `date` is the calendar day in the zone `generated_at` carries.
    pub fn new<Tz: TimeZone>(content: impl Into<String>, generated_at: DateTime<Tz>) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: generated_at.date_naive().format("%Y-%m-%d").to_string(),
            content: content.into(),
            generated_at: generated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateRecord {
    pub id: Uuid,
    pub kind: TemplateKind,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub company_name: Option<String>,
    pub period: Option<String>,
    pub params: Value,
}

impl TemplateRecord {
    pub fn new(kind: TemplateKind, data: Vec<u8>, options: TemplateOptions, params: Value) -> Self {
        Self::created_at(kind, data, options, params, Local::now())
    }

    /// Names the workbook after the calendar day in the zone of `created_at`.
    pub fn created_at<Tz: TimeZone>(
        kind: TemplateKind,
        data: Vec<u8>,
        options: TemplateOptions,
        params: Value,
        created_at: DateTime<Tz>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: kind.file_name(created_at.date_naive()),
            data,
            created_at: created_at.with_timezone(&Utc),
            company_name: options.company_name,
            period: options.period,
            params,
        }
    }

    /// Whether the workbook uses the stock layout, with no caller customisation.
    pub fn is_default(&self) -> bool {
        self.company_name.is_none()
            && self.period.is_none()
            && self.params.as_object().is_none_or(|params| params.is_empty())
    }

    pub fn summary(&self) -> TemplateSummary {
        TemplateSummary {
            id: self.id,
            kind: self.kind,
            name: self.name.clone(),
            created_at: self.created_at,
            company_name: self.company_name.clone(),
            period: self.period.clone(),
            params: self.params.clone(),
            size_bytes: self.data.len(),
            download_url: format!("/templates/{}", self.id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub params: Value,
    pub size_bytes: usize,
    pub download_url: String,
}

#[derive(Debug, Clone)]
pub struct AttachedFile {
    pub name: String,
    pub data: Vec<u8>,
}

pub const ERROR_ANALYSIS_KIND: &str = "error";

#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub kind: String,
    pub date: DateTime<Utc>,
    pub parameters: Value,
    pub content: String,
    pub file: Option<AttachedFile>,
}

impl AnalysisRecord {
    pub fn new(kind: impl Into<String>, parameters: Value, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            date: Utc::now(),
            parameters,
            content: content.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: AttachedFile) -> Self {
        self.file = Some(file);
        self
    }

    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            id: self.id,
            kind: self.kind.clone(),
            date: self.date,
            parameters: self.parameters.clone(),
            content: self.content.clone(),
            file_name: self.file.as_ref().map(|file| file.name.clone()),
            file_url: self
                .file
                .as_ref()
                .map(|_| format!("/analyses/{}/file", self.id)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: DateTime<Utc>,
    pub parameters: Value,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

pub trait SessionStore: Send + Sync {
    fn history(&self, session_id: &str) -> Vec<ChatMessage>;
    /// Creates an empty session when none exists.
    fn ensure(&self, session_id: &str);
    /// Appends one user turn and the assistant reply, in that order.
    fn append_exchange(&self, session_id: &str, user: ChatMessage, assistant: ChatMessage);
    /// Empties the session, creating it when absent. Returns whether it existed.
    fn reset(&self, session_id: &str) -> bool;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait ReportStore: Send + Sync {
    fn push(&self, report: Report);
    fn latest(&self) -> Option<Report>;
    /// Oldest first.
    fn list(&self) -> Vec<Report>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait TemplateStore: Send + Sync {
    fn insert(&self, record: TemplateRecord);
    fn get(&self, id: Uuid) -> Option<TemplateRecord>;
    /// Most recent stock-layout workbook of `kind`, if one was generated.
    fn latest_default(&self, kind: TemplateKind) -> Option<TemplateRecord>;
    /// Oldest first.
    fn list(&self) -> Vec<TemplateSummary>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait AnalysisStore: Send + Sync {
    fn insert(&self, record: AnalysisRecord);
    fn get(&self, id: Uuid) -> Option<AnalysisRecord>;
    /// Oldest first.
    fn list(&self) -> Vec<AnalysisSummary>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub reports: Arc<dyn ReportStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub analyses: Arc<dyn AnalysisStore>,
}

impl Stores {
    pub fn in_memory(config: &AppConfig) -> Self {
        Self {
            sessions: Arc::new(InMemorySessionStore::new(config.sessions.max_messages)),
            reports: Arc::new(InMemoryReportStore::new(config.reports.history_limit)),
            templates: Arc::new(InMemoryTemplateStore::default()),
            analyses: Arc::new(InMemoryAnalysisStore::default()),
        }
    }
}
