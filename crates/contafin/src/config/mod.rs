use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, anyhow};
use serde::{Deserialize, de::DeserializeOwned};
use tracing_subscriber::{EnvFilter, fmt};

use crate::spreadsheet::TemplateKind;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub temp_dir: PathBuf,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub reports: ReportConfig,
    pub sessions: SessionConfig,
    pub templates: TemplateConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Allowed CORS origin; any origin when unset.
    pub frontend_origin: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    Ollama,
    LocalStub,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    /// Alternate endpoint tried once when the primary answers 403.
    pub fallback_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub history_limit: usize,
    /// Five-field cron expressions, evaluated in local time.
    pub schedule: Vec<String>,
    pub generate_on_startup: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_messages: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub warm_up: Vec<TemplateKind>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    temp_dir: Option<PathBuf>,
    server: FileServerConfig,
    llm: LlmConfig,
    reports: ReportConfig,
    sessions: SessionConfig,
    templates: TemplateConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileServerConfig {
    bind_addr: Option<String>,
    frontend_origin: Option<String>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an optional YAML file named by
    /// `CONTAFIN_CONFIG`, then applies environment overrides read through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let file: FileConfig = match var("CONTAFIN_CONFIG") {
            Some(path) => load_yaml(path)?,
            None => FileConfig::default(),
        };

        let mut llm = file.llm;
        if let Some(url) = var("OLLAMA_URL") {
            llm.base_url = url;
        }
        if let Some(url) = var("OLLAMA_FALLBACK_URL") {
            llm.fallback_url = url;
        }
        if let Some(model) = var("MODEL_NAME") {
            llm.model = model;
        }
        if let Some(provider) = var("LLM_PROVIDER") {
            llm.provider = parse_provider(&provider)?;
        }
        llm.base_url = normalize_url(&llm.base_url);
        llm.fallback_url = normalize_url(&llm.fallback_url);

        let bind_addr = match var("CONTAFIN_BIND") {
            Some(addr) => addr,
            None => match var("PORT") {
                Some(port) => {
                    let port: u16 = port
                        .trim()
                        .parse()
                        .with_context(|| format!("parsing PORT value {port:?}"))?;
                    format!("0.0.0.0:{port}")
                }
                None => file
                    .server
                    .bind_addr
                    .unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            },
        };

        let frontend_origin = var("FRONTEND_URL").or(file.server.frontend_origin);

        let temp_dir = var("TEMP_DIR")
            .map(PathBuf::from)
            .or(file.temp_dir)
            .unwrap_or_else(env::temp_dir);

        if file.reports.history_limit == 0 {
            return Err(anyhow!("reports.history_limit must be at least 1"));
        }

        Ok(Self {
            temp_dir,
            server: ServerConfig {
                bind_addr,
                frontend_origin,
            },
            llm,
            reports: file.reports,
            sessions: file.sessions,
            templates: file.templates,
        })
    }
}

impl ServerConfig {
    pub fn addr(&self) -> &str {
        &self.bind_addr
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    /// Delay before the attempt following `attempt` (zero based): the base
    /// delay doubled once per failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            fallback_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3:8b".to_string(),
            temperature: 0.7,
            timeout_secs: 120,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            history_limit: 30,
            schedule: vec!["0 8 * * *".to_string(), "0 9 * * Mon".to_string()],
            generate_on_startup: true,
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            warm_up: vec![TemplateKind::CashFlow, TemplateKind::Payroll],
        }
    }
}

pub fn load_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).with_context(|| format!("reading yaml {:?}", path))?;
    let parsed =
        serde_yaml::from_str(&content).with_context(|| format!("parsing yaml {:?}", path))?;
    Ok(parsed)
}

fn parse_provider(raw: &str) -> anyhow::Result<LlmProvider> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "ollama" => Ok(LlmProvider::Ollama),
        "local_stub" | "stub" => Ok(LlmProvider::LocalStub),
        other => Err(anyhow!("unknown LLM_PROVIDER {other:?}")),
    }
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_sources() {
        let config = AppConfig::from_lookup(lookup_from(&[])).expect("config");
        assert_eq!(config.server.addr(), "0.0.0.0:5000");
        assert_eq!(config.llm.model, "llama3:8b");
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.retry.max_attempts, 3);
        assert_eq!(config.reports.history_limit, 30);
        assert_eq!(config.reports.schedule.len(), 2);
        assert!(config.server.frontend_origin.is_none());
        assert_eq!(
            config.templates.warm_up,
            vec![TemplateKind::CashFlow, TemplateKind::Payroll]
        );
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("OLLAMA_URL", "http://inference.internal:8080/"),
            ("MODEL_NAME", "mistral"),
            ("PORT", "8081"),
            ("FRONTEND_URL", "https://app.example.com"),
            ("TEMP_DIR", "/var/tmp/contafin"),
            ("LLM_PROVIDER", "local_stub"),
        ]))
        .expect("config");

        assert_eq!(config.llm.base_url, "http://inference.internal:8080");
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.server.addr(), "0.0.0.0:8081");
        assert_eq!(
            config.server.frontend_origin.as_deref(),
            Some("https://app.example.com")
        );
        assert_eq!(config.temp_dir, PathBuf::from("/var/tmp/contafin"));
        assert_eq!(config.llm.provider, LlmProvider::LocalStub);
    }

    #[test]
    fn bind_override_wins_over_port() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "9000"),
            ("CONTAFIN_BIND", "127.0.0.1:0"),
        ]))
        .expect("config");
        assert_eq!(config.server.addr(), "127.0.0.1:0");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("parsing PORT"));
    }

    #[test]
    fn yaml_file_sets_scheduler_and_retry() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("contafin.yml");
        fs::write(
            &path,
            "llm:\n  temperature: 0.2\n  retry:\n    max_attempts: 5\n    base_delay_ms: 10\nreports:\n  history_limit: 50\n  schedule:\n    - \"30 7 * * *\"\n  generate_on_startup: false\nsessions:\n  max_messages: 40\ntemplates:\n  warm_up: [balance_general]\n",
        )
        .expect("write yaml");

        let path = path.to_string_lossy().to_string();
        let config =
            AppConfig::from_lookup(lookup_from(&[("CONTAFIN_CONFIG", path.as_str())]))
                .expect("config");

        assert_eq!(config.llm.retry.max_attempts, 5);
        assert_eq!(config.llm.retry.base_delay_ms, 10);
        assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.llm.model, "llama3:8b");
        assert_eq!(config.reports.history_limit, 50);
        assert_eq!(config.reports.schedule, vec!["30 7 * * *".to_string()]);
        assert!(!config.reports.generate_on_startup);
        assert_eq!(config.sessions.max_messages, Some(40));
        assert_eq!(config.templates.warm_up, vec![TemplateKind::BalanceSheet]);
    }

    #[test]
    fn zero_history_limit_is_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("contafin.yml");
        fs::write(&path, "reports:\n  history_limit: 0\n").expect("write yaml");
        let path = path.to_string_lossy().to_string();
        let err = AppConfig::from_lookup(lookup_from(&[("CONTAFIN_CONFIG", path.as_str())]))
            .unwrap_err();
        assert!(err.to_string().contains("history_limit"));
    }

    #[test]
    fn retry_delay_doubles_per_attempt() {
        let retry = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1_000,
        };
        assert_eq!(retry.delay_after(0), Duration::from_secs(1));
        assert_eq!(retry.delay_after(1), Duration::from_secs(2));
        assert_eq!(retry.delay_after(2), Duration::from_secs(4));
    }

    #[test]
    #[serial]
    fn load_reads_process_environment() {
        unsafe {
            env::set_var("MODEL_NAME", "qwen2:7b");
            env::set_var("CONTAFIN_BIND", "127.0.0.1:0");
        }

        let config = AppConfig::load().expect("config");
        assert_eq!(config.llm.model, "qwen2:7b");
        assert_eq!(config.server.addr(), "127.0.0.1:0");

        unsafe {
            env::remove_var("MODEL_NAME");
            env::remove_var("CONTAFIN_BIND");
        }
    }
}
