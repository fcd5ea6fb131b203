use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    AnalysisRecord, AnalysisStore, AnalysisSummary, Report, ReportStore, SessionStore,
    TemplateRecord, TemplateStore, TemplateSummary,
};
use crate::{llm::ChatMessage, spreadsheet::TemplateKind};

/// Session histories keyed by caller-supplied id.
///
/// Histories are unbounded unless `max_messages` is set, in which case the
/// oldest turns are dropped first.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Vec<ChatMessage>>>,
    max_messages: Option<usize>,
}

impl InMemorySessionStore {
    pub fn new(max_messages: Option<usize>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_messages,
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.sessions
            .lock()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    fn ensure(&self, session_id: &str) {
        self.sessions
            .lock()
            .entry(session_id.to_string())
            .or_default();
    }

    fn append_exchange(&self, session_id: &str, user: ChatMessage, assistant: ChatMessage) {
        let mut sessions = self.sessions.lock();
        let history = sessions.entry(session_id.to_string()).or_default();
        history.push(user);
        history.push(assistant);

        if let Some(limit) = self.max_messages {
            if history.len() > limit {
                let excess = history.len() - limit;
                history.drain(..excess);
            }
        }
    }

    fn reset(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .insert(session_id.to_string(), Vec::new())
            .is_some()
    }

    fn len(&self) -> usize {
        self.sessions.lock().len()
    }
}

/// Bounded report history; the oldest report is dropped once `limit` is
/// exceeded.
#[derive(Debug)]
pub struct InMemoryReportStore {
    reports: Mutex<VecDeque<Report>>,
    limit: usize,
}

impl InMemoryReportStore {
    pub fn new(limit: usize) -> Self {
        Self {
            reports: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
        }
    }
}

impl ReportStore for InMemoryReportStore {
    fn push(&self, report: Report) {
        let mut reports = self.reports.lock();
        reports.push_back(report);
        while reports.len() > self.limit {
            reports.pop_front();
        }
    }

    fn latest(&self) -> Option<Report> {
        self.reports.lock().back().cloned()
    }

    fn list(&self) -> Vec<Report> {
        self.reports.lock().iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.reports.lock().len()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    templates: Mutex<HashMap<Uuid, TemplateRecord>>,
}

impl TemplateStore for InMemoryTemplateStore {
    fn insert(&self, record: TemplateRecord) {
        self.templates.lock().insert(record.id, record);
    }

    fn get(&self, id: Uuid) -> Option<TemplateRecord> {
        self.templates.lock().get(&id).cloned()
    }

    fn latest_default(&self, kind: TemplateKind) -> Option<TemplateRecord> {
        self.templates
            .lock()
            .values()
            .filter(|record| record.kind == kind && record.is_default())
            .max_by_key(|record| record.created_at)
            .cloned()
    }

    fn list(&self) -> Vec<TemplateSummary> {
        let mut summaries: Vec<TemplateSummary> = self
            .templates
            .lock()
            .values()
            .map(TemplateRecord::summary)
            .collect();
        summaries.sort_by_key(|summary| summary.created_at);
        summaries
    }

    fn len(&self) -> usize {
        self.templates.lock().len()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAnalysisStore {
    analyses: Mutex<HashMap<Uuid, AnalysisRecord>>,
}

impl AnalysisStore for InMemoryAnalysisStore {
    fn insert(&self, record: AnalysisRecord) {
        self.analyses.lock().insert(record.id, record);
    }

    fn get(&self, id: Uuid) -> Option<AnalysisRecord> {
        self.analyses.lock().get(&id).cloned()
    }

    fn list(&self) -> Vec<AnalysisSummary> {
        let mut summaries: Vec<AnalysisSummary> = self
            .analyses
            .lock()
            .values()
            .map(AnalysisRecord::summary)
            .collect();
        summaries.sort_by_key(|summary| summary.date);
        summaries
    }

    fn len(&self) -> usize {
        self.analyses.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[test]
    fn exchange_appends_user_then_assistant() {
        let store = InMemorySessionStore::default();
        store.append_exchange(
            "cliente-1",
            ChatMessage::user("¿Qué es el punto de equilibrio?"),
            ChatMessage::assistant("Es el nivel de ventas..."),
        );

        let history = store.history("cliente-1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatMessage::user("¿Qué es el punto de equilibrio?"));
        assert_eq!(history[1], ChatMessage::assistant("Es el nivel de ventas..."));
        assert!(store.history("otro").is_empty());
    }

    #[test]
    fn sessions_grow_without_cap_by_default() {
        let store = InMemorySessionStore::default();
        for turn in 0..100 {
            store.append_exchange(
                "largo",
                ChatMessage::user(format!("pregunta {turn}")),
                ChatMessage::assistant(format!("respuesta {turn}")),
            );
        }
        assert_eq!(store.history("largo").len(), 200);
    }

    #[test]
    fn session_cap_drops_oldest_turns() {
        let store = InMemorySessionStore::new(Some(4));
        for turn in 0..3 {
            store.append_exchange(
                "s",
                ChatMessage::user(format!("pregunta {turn}")),
                ChatMessage::assistant(format!("respuesta {turn}")),
            );
        }

        let history = store.history("s");
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "pregunta 1");
        assert_eq!(history[3].content, "respuesta 2");
    }

    #[test]
    fn reset_reports_whether_session_existed() {
        let store = InMemorySessionStore::default();
        assert!(!store.reset("nueva"));
        assert_eq!(store.len(), 1);

        store.append_exchange("nueva", ChatMessage::user("a"), ChatMessage::assistant("b"));
        assert!(store.reset("nueva"));
        assert!(store.history("nueva").is_empty());
    }

    #[test]
    fn ensure_creates_empty_session_once() {
        let store = InMemorySessionStore::default();
        store.ensure("default");
        store.append_exchange("default", ChatMessage::user("a"), ChatMessage::assistant("b"));
        store.ensure("default");
        assert_eq!(store.history("default").len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn report_history_keeps_most_recent_within_cap() {
        let store = InMemoryReportStore::new(30);
        let start = Utc::now();
        for index in 0..45 {
            store.push(Report::new(
                format!("informe {index}"),
                start + Duration::minutes(index),
            ));
            assert!(store.len() <= 30);
        }

        let reports = store.list();
        assert_eq!(reports.len(), 30);
        let contents: Vec<&str> = reports.iter().map(|report| report.content.as_str()).collect();
        let expected: Vec<String> = (15..45).map(|index| format!("informe {index}")).collect();
        assert_eq!(contents, expected);
        assert_eq!(store.latest().unwrap().content, "informe 44");
    }

    #[test]
    fn empty_report_store_has_no_latest() {
        let store = InMemoryReportStore::new(5);
        assert!(store.latest().is_none());
        assert!(store.is_empty());
    }

    fn template(kind: TemplateKind, offset_secs: i64, company: Option<&str>) -> TemplateRecord {
        TemplateRecord {
            id: Uuid::new_v4(),
            kind,
            data: vec![offset_secs as u8],
            created_at: Utc::now() + Duration::seconds(offset_secs),
            name: format!("{}.xlsx", kind.tag()),
            company_name: company.map(str::to_string),
            period: None,
            params: json!({}),
        }
    }

    #[test]
    fn latest_default_skips_customised_templates() {
        let store = InMemoryTemplateStore::default();
        let older = template(TemplateKind::Payroll, 0, None);
        let newer = template(TemplateKind::Payroll, 10, None);
        let custom = template(TemplateKind::Payroll, 20, Some("Ferretería El Tornillo"));
        let other_kind = template(TemplateKind::CashFlow, 30, None);
        let newer_id = newer.id;

        for record in [older, newer, custom, other_kind] {
            store.insert(record);
        }

        let found = store
            .latest_default(TemplateKind::Payroll)
            .expect("default payroll template");
        assert_eq!(found.id, newer_id);
        assert!(store.latest_default(TemplateKind::BreakEven).is_none());
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn template_list_is_ordered_by_creation() {
        let store = InMemoryTemplateStore::default();
        let late = template(TemplateKind::BalanceSheet, 50, None);
        let early = template(TemplateKind::IncomeStatement, 5, None);
        let (late_id, early_id) = (late.id, early.id);
        store.insert(late);
        store.insert(early);

        let ids: Vec<Uuid> = store.list().iter().map(|summary| summary.id).collect();
        assert_eq!(ids, vec![early_id, late_id]);
    }

    #[test]
    fn analyses_are_retrievable_by_id() {
        let store = InMemoryAnalysisStore::default();
        let record = AnalysisRecord::new("ratios_financieros", json!({"sector": "retail"}), "ok");
        let id = record.id;
        store.insert(record);

        let found = store.get(id).expect("stored analysis");
        assert_eq!(found.kind, "ratios_financieros");
        assert!(store.get(Uuid::new_v4()).is_none());
        assert_eq!(store.list().len(), 1);
    }
}
