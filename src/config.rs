use crate::error::{ConfigError, Result as AppResult};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://opentdb.com/api.php";
const DEFAULT_QUESTION_AMOUNT: u8 = 5;
// The trivia API refuses batches larger than this.
const MAX_QUESTION_AMOUNT: u16 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct TriviaApiConfig {
    pub base_url: String,
    /// Kept wider than a request amount so out-of-range values reach
    /// validation instead of failing to deserialize.
    pub amount: u16,
    pub request_timeout_secs: u64,
}

impl TriviaApiConfig {
    /// Questions per batch. Only meaningful on validated settings.
    pub fn question_amount(&self) -> u8 {
        u8::try_from(self.amount).unwrap_or(DEFAULT_QUESTION_AMOUNT)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for TriviaApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            amount: u16::from(DEFAULT_QUESTION_AMOUNT),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSettings {
    pub trivia_api: TriviaApiConfig,
    pub retry: RetryConfig,
}

impl AppSettings {
    fn validate(self) -> Result<Self, ConfigError> {
        if self.trivia_api.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "trivia_api.base_url must not be empty".to_string(),
            ));
        }
        if !(1..=MAX_QUESTION_AMOUNT).contains(&self.trivia_api.amount) {
            return Err(ConfigError::InvalidValue(format!(
                "trivia_api.amount must be between 1 and {}, got {}",
                MAX_QUESTION_AMOUNT, self.trivia_api.amount
            )));
        }
        if self.retry.base_delay_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "retry.base_delay_ms must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}

/// `QUIZZICAL__TRIVIA_API__AMOUNT=10` maps to `trivia_api.amount`.
fn environment() -> Environment {
    Environment::with_prefix("QUIZZICAL")
        .separator("__")
        .try_parsing(true)
}

pub fn load_settings() -> AppResult<AppSettings> {
    // Later sources win: env vars override the file
    let builder = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(environment());

    build_settings(builder)
}

fn build_settings(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> AppResult<AppSettings> {
    let defaults = AppSettings::default();

    let settings = builder
        .set_default("trivia_api.base_url", defaults.trivia_api.base_url)
        .and_then(|b| b.set_default("trivia_api.amount", defaults.trivia_api.amount as u64))
        .and_then(|b| {
            b.set_default(
                "trivia_api.request_timeout_secs",
                defaults.trivia_api.request_timeout_secs,
            )
        })
        .and_then(|b| b.set_default("retry.max_retries", defaults.retry.max_retries as u64))
        .and_then(|b| b.set_default("retry.base_delay_ms", defaults.retry.base_delay_ms))
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let parsed: AppSettings = settings.try_deserialize()?;

    Ok(parsed.validate()?)
}
