use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

/// Gemini REST API base URL.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Prompt sent on every suggestion request unless overridden.
pub const DEFAULT_PROMPT: &str = "京都のおすすめ観光スポットを5つ、以下の厳密なJSON配列形式でのみ提案してください: [{\"name\": \"スポット名\", \"description\": \"15文字程度の簡単な説明\", \"image_url\": \"画像のURL\"}]";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 1;
const DEFAULT_EXPECTED_COUNT: usize = 5;

#[derive(Debug, Clone)]
pub struct SuggestConfig {
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub generation: GenerationSettings,
    pub policy: RequestPolicy,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub api_key: Secret<String>,
    pub api_base: String,
}

/// What gets asked, and of which model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    pub model: String,
    pub prompt: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

/// Per-request timeout, retry budget and count expectations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPolicy {
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub expected_count: usize,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            expected_count: DEFAULT_EXPECTED_COUNT,
        }
    }
}

impl SuggestConfig {
    /// Load from `.env`, the optional `configuration` file and the process
    /// environment. Fails if the API key is absent.
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_prod = lookup("ENVIRONMENT").as_deref() == Some("prod");
        let get = |key: &str, default: Option<&str>| get_env(&lookup, key, default, is_prod);

        let api_key = get("GEMINI_API_KEY", None)?;
        if api_key.trim().is_empty() {
            return Err(AppError::config("GEMINI_API_KEY is set but empty"));
        }

        let prompt = get("SUGGEST_PROMPT", Some(DEFAULT_PROMPT))?;
        if prompt.trim().is_empty() {
            return Err(AppError::config("SUGGEST_PROMPT must not be empty"));
        }

        let request_timeout_secs: u64 = parse_number(
            "SUGGEST_REQUEST_TIMEOUT_SECS",
            get(
                "SUGGEST_REQUEST_TIMEOUT_SECS",
                Some(&DEFAULT_REQUEST_TIMEOUT_SECS.to_string()),
            )?,
        )?;
        if request_timeout_secs == 0 {
            return Err(AppError::config(
                "SUGGEST_REQUEST_TIMEOUT_SECS must be at least 1",
            ));
        }

        Ok(SuggestConfig {
            common,
            google: GoogleConfig {
                api_key: Secret::new(api_key),
                api_base: get("GEMINI_API_BASE", Some(DEFAULT_GEMINI_API_BASE))?
                    .trim_end_matches('/')
                    .to_string(),
            },
            generation: GenerationSettings {
                model: get("GEMINI_MODEL", Some(DEFAULT_MODEL))?,
                prompt,
            },
            policy: RequestPolicy {
                request_timeout: Duration::from_secs(request_timeout_secs),
                max_retries: parse_number(
                    "SUGGEST_MAX_RETRIES",
                    get("SUGGEST_MAX_RETRIES", Some(&DEFAULT_MAX_RETRIES.to_string()))?,
                )?,
                expected_count: parse_number(
                    "SUGGEST_EXPECTED_COUNT",
                    get(
                        "SUGGEST_EXPECTED_COUNT",
                        Some(&DEFAULT_EXPECTED_COUNT.to_string()),
                    )?,
                )?,
            },
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|v| !v.is_empty()),
        })
    }

    pub fn api_key(&self) -> &str {
        self.google.api_key.expose_secret()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: String) -> Result<T, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::config(format!("{} must be a non-negative integer, got '{}'", key, raw)))
}

fn get_env<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(val) => Ok(val),
        None => {
            if is_prod {
                Err(AppError::config(format!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::config(format!("{} is required but not set", key)))
            }
        }
    }
}
