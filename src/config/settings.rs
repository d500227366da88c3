use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub templates: TemplateSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub delivery: DeliverySettings,
    #[serde(default)]
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// What to emit in place of a placeholder missing from the render context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPlaceholderMode {
    /// Leave `{name}` verbatim in the output
    #[default]
    Keep,
    /// Replace with an empty string
    Empty,
    /// Replace with `TemplateSettings::sentinel`
    Sentinel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSettings {
    /// Directory holding `<namespace>/<template_set>.json` documents
    #[serde(default = "default_template_root")]
    pub root: PathBuf,
    /// Process-wide fallback language
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default)]
    pub missing_placeholder: MissingPlaceholderMode,
    /// Replacement text when `missing_placeholder = "sentinel"`
    #[serde(default)]
    pub sentinel: String,
}

fn default_template_root() -> PathBuf {
    PathBuf::from("templates")
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    10_000 // 10 seconds
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter_factor() -> f64 {
    0.1
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliverySettings {
    /// Transport backend: "telegram" or "log"
    #[serde(default = "default_transport")]
    pub transport: String,
    /// Truncate over-long text/captions instead of rejecting them
    #[serde(default = "default_truncate_overlong")]
    pub truncate_overlong: bool,
    /// Upper bound on concurrent sends during a broadcast
    #[serde(default = "default_max_concurrent_sends")]
    pub max_concurrent_sends: usize,
}

fn default_transport() -> String {
    "log".to_string()
}

fn default_truncate_overlong() -> bool {
    true
}

fn default_max_concurrent_sends() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    pub bot_token: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Emit JSON log lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
    /// Filter directive used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("templates.root", "templates")?
            .set_default("templates.default_language", "en")?
            .set_default("delivery.transport", "log")?
            .set_default("retry.max_attempts", 3)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // APP__TEMPLATES__ROOT, APP__TELEGRAM__BOT_TOKEN, APP__RETRY__MAX_ATTEMPTS, ...
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            root: default_template_root(),
            default_language: default_language(),
            missing_placeholder: MissingPlaceholderMode::default(),
            sentinel: String::new(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            truncate_overlong: default_truncate_overlong(),
            max_concurrent_sends: default_max_concurrent_sends(),
        }
    }
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            json: false,
            filter: default_log_filter(),
        }
    }
}
