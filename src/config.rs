use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub linkedin: LinkedInConfig,
    #[serde(default)]
    pub outreach: OutreachConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pitch: PitchConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

#[derive(Deserialize, Clone, Default)]
pub struct LinkedInConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

// Manual Debug impl to avoid leaking the password
impl std::fmt::Debug for LinkedInConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedInConfig")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutreachConfig {
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_max_targets")]
    pub max_targets: usize,
    /// Explicit checkpoint session token. Derived from account and query when unset.
    #[serde(default)]
    pub session: Option<String>,
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            query: default_query(),
            max_targets: default_max_targets(),
            session: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub chrome_path: Option<String>,
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_login_timeout")]
    pub login_timeout_secs: u64,
    #[serde(default = "default_action_timeout")]
    pub action_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            debug_port: default_debug_port(),
            profile_dir: default_profile_dir(),
            user_agent: default_user_agent(),
            login_timeout_secs: default_login_timeout(),
            action_timeout_secs: default_action_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    Claude,
}

impl LlmProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.0-flash",
            Self::Claude => "claude-sonnet-4-20250514",
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::Claude => "ANTHROPIC_API_KEY",
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            api_key: None,
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl LlmConfig {
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// What is being sold; feeds every prompt.
#[derive(Debug, Deserialize, Clone)]
pub struct PitchConfig {
    #[serde(default = "default_product")]
    pub product: String,
    #[serde(default = "default_product_summary")]
    pub summary: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_specialty")]
    pub specialty: String,
    #[serde(default = "default_signup_url")]
    pub signup_url: String,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            product: default_product(),
            summary: default_product_summary(),
            audience: default_audience(),
            specialty: default_specialty(),
            signup_url: default_signup_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckpointConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_checkpoint_dir")]
    pub dir: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_checkpoint_dir(),
        }
    }
}

fn default_query() -> String {
    "solo health professional".to_string()
}

fn default_max_targets() -> usize {
    10
}

fn default_debug_port() -> u16 {
    9222
}

fn default_profile_dir() -> PathBuf {
    PathBuf::from(".outreach/chrome-profile")
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string()
}

fn default_login_timeout() -> u64 {
    30
}

fn default_action_timeout() -> u64 {
    8
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_product() -> String {
    "Hippocrate EMR".to_string()
}

fn default_product_summary() -> String {
    "a modern electronic medical record platform purpose-built for solo healthcare providers"
        .to_string()
}

fn default_audience() -> String {
    "clinicians who juggle both patient care and administrative tasks on their own".to_string()
}

fn default_specialty() -> String {
    "healthcare professional".to_string()
}

fn default_signup_url() -> String {
    "https://www.hippocrate.org/shop/product/hippocrate-sign-up-2".to_string()
}

fn default_true() -> bool {
    true
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".outreach/checkpoints")
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("outreach").required(false));
        }

        // Environment variable overrides with OUTREACH_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("OUTREACH")
                .separator("__")
                .try_parsing(true),
        );

        // Plain variables from a .env file or the shell win over everything else
        builder = builder
            .set_override_option("linkedin.email", std::env::var("LINKEDIN_EMAIL").ok())
            .and_then(|b| {
                b.set_override_option("linkedin.password", std::env::var("LINKEDIN_PASSWORD").ok())
            })
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let mut config: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if config.llm.api_key.is_none() {
            config.llm.api_key = std::env::var(config.llm.provider.env_var()).ok();
        }

        Ok(config)
    }

    /// Reject configurations that cannot possibly run, before any browsing.
    pub fn validate(&self) -> Result<()> {
        if self.linkedin.email.trim().is_empty() || self.linkedin.password.is_empty() {
            return Err(AppError::Config(
                "Set LINKEDIN_EMAIL and LINKEDIN_PASSWORD in your environment or .env file"
                    .to_string(),
            ));
        }

        if self.llm_api_key().is_none() {
            return Err(AppError::Config(format!(
                "Set {} (or llm.api_key) for the {:?} provider",
                self.llm.provider.env_var(),
                self.llm.provider
            )));
        }

        if self.outreach.query.trim().is_empty() {
            return Err(AppError::Config(
                "outreach.query must not be blank".to_string(),
            ));
        }

        if self.outreach.max_targets == 0 {
            return Err(AppError::Config(
                "outreach.max_targets must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn llm_api_key(&self) -> Option<&str> {
        self.llm
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }
}
