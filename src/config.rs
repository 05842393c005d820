use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionDefaults,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "qwiz-hub".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,

    /// CORS origins; empty allows any origin
    pub allowed_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    /// Answer window used when a session does not pick one
    pub default_answer_time_seconds: u32,

    /// Transcript chunks shorter than this (after trimming) are not sent to the LLM
    pub min_transcript_chars: usize,

    /// Sessions with no connections are dropped after this long
    pub idle_timeout_secs: u64,

    /// How often the idle reaper runs
    pub reap_interval_secs: u64,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            default_answer_time_seconds: 30,
            min_transcript_chars: 20,
            idle_timeout_secs: 2 * 60 * 60, // 2 hours
            reap_interval_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Gemini API key; question generation is disabled without one
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl Config {
    /// Load from an optional config file (any format the `config` crate
    /// understands), then apply `QWIZ__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("QWIZ").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
