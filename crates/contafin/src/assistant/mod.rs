use std::{fmt::Write, sync::Arc};

use chrono::NaiveDate;
use serde_json::Value;
use tracing::info;

use crate::{
    config::{AppConfig, LlmProvider},
    llm::{ChatMessage, LlmClient, LlmIdentity, LocalStubClient, OllamaClient, Role},
    spreadsheet::import::ImportedWorkbook,
};

pub mod prompts;

/// The ContaFin persona in front of an [`LlmClient`].
pub struct Assistant {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl Assistant {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: prompts::SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn from_app_config(config: &AppConfig) -> anyhow::Result<Self> {
        let llm: Arc<dyn LlmClient> = match config.llm.provider {
            LlmProvider::LocalStub => Arc::new(LocalStubClient),
            LlmProvider::Ollama => Arc::new(OllamaClient::from_config(&config.llm)?),
        };
        Ok(Self::new(llm))
    }

    pub fn identity(&self) -> LlmIdentity {
        self.llm.identity()
    }

    /// Answers `message` in the context of `history`. A blank chat reply is
    /// retried once through the completion endpoint with a flattened prompt.
    pub async fn reply(&self, history: &[ChatMessage], message: &str) -> String {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend_from_slice(history);
        messages.push(ChatMessage::user(message));

        let reply = self.llm.chat(&messages).await;
        if !reply.trim().is_empty() {
            return reply;
        }

        info!("chat endpoint returned an empty reply, falling back to completion");
        let prompt = build_completion_prompt(&self.system_prompt, history, message);
        self.llm.complete(&prompt).await
    }

    pub async fn financial_report(&self, date: NaiveDate) -> String {
        self.reply(&[], &prompts::financial_report(date)).await
    }

    pub async fn analysis(&self, kind: &str, parameters: &Value) -> String {
        self.reply(&[], &prompts::analysis(kind, parameters)).await
    }

    pub async fn import_review(&self, workbook: &ImportedWorkbook, analysis_type: &str) -> String {
        let prompt = prompts::import_review(&workbook.file_name, analysis_type, &workbook.summary());
        self.reply(&[], &prompt).await
    }
}

/// Flattens a conversation into a single completion prompt ending with the
/// assistant label, ready for the model to continue.
pub fn build_completion_prompt(system: &str, history: &[ChatMessage], message: &str) -> String {
    let mut prompt = format!("{system}\n\n{}\n", prompts::HISTORY_HEADING);
    for entry in history {
        let label = match entry.role {
            Role::User => prompts::USER_LABEL,
            Role::Assistant | Role::System => prompts::ASSISTANT_LABEL,
        };
        let _ = writeln!(&mut prompt, "{label}: {}", entry.content);
    }
    let _ = write!(
        &mut prompt,
        "\n{}: {message}\n{}: ",
        prompts::USER_LABEL,
        prompts::ASSISTANT_LABEL
    );
    prompt
}
