//! Run configuration loaded from the environment
//!
//! Everything a run needs is read once at startup into [`Config`] and passed
//! by reference to each component.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::Weekday;

use crate::alerts::Thresholds;

pub const ENV_FRED_API_KEY: &str = "FRED_API_KEY";
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_SERIES_ID: &str = "SPREADWATCH_SERIES_ID";
pub const ENV_SERIES_NAME: &str = "SPREADWATCH_SERIES_NAME";
pub const ENV_STATE_FILE: &str = "SPREADWATCH_STATE_FILE";
pub const ENV_WINDOW: &str = "SPREADWATCH_WINDOW";
pub const ENV_CHANGE_THRESHOLD: &str = "SPREADWATCH_CHANGE_THRESHOLD";
pub const ENV_HIGH_THRESHOLD: &str = "SPREADWATCH_HIGH_THRESHOLD";
pub const ENV_CRITICAL_THRESHOLD: &str = "SPREADWATCH_CRITICAL_THRESHOLD";
pub const ENV_HEARTBEAT_DAY: &str = "SPREADWATCH_HEARTBEAT_DAY";
pub const ENV_STALE_AFTER_DAYS: &str = "SPREADWATCH_STALE_AFTER_DAYS";
pub const ENV_FRED_BASE_URL: &str = "FRED_BASE_URL";
pub const ENV_TELEGRAM_BASE_URL: &str = "TELEGRAM_BASE_URL";

/// ICE BofA US High Yield Index Option-Adjusted Spread
pub const DEFAULT_SERIES_ID: &str = "BAMLH0A0HYM2";
pub const DEFAULT_SERIES_NAME: &str = "High Yield Bond Spread";
pub const DEFAULT_STATE_FILE: &str = "bond_spread_state.json";
pub const DEFAULT_WINDOW: usize = 10;
pub const DEFAULT_STALE_AFTER_DAYS: i64 = 7;
/// Largest accepted staleness limit, about ten years
pub const MAX_STALE_AFTER_DAYS: i64 = 3650;
pub const DEFAULT_FRED_BASE_URL: &str = "https://api.stlouisfed.org";
pub const DEFAULT_TELEGRAM_BASE_URL: &str = "https://api.telegram.org";

/// Series source settings
#[derive(Debug, Clone)]
pub struct SeriesConfig {
    /// FRED series identifier
    pub id: String,
    /// Human-readable name used in message titles
    pub name: String,
    /// FRED API key
    pub api_key: String,
    /// Number of most recent observations requested per run
    pub window: usize,
    /// API root, overridable for testing
    pub base_url: String,
}

/// Chat destination settings. Either credential may be absent.
#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub base_url: String,
}

impl TelegramConfig {
    /// Both the bot token and the chat id are present
    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }

    /// Names of the missing credential variables
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bot_token.is_none() {
            missing.push(ENV_TELEGRAM_BOT_TOKEN);
        }
        if self.chat_id.is_none() {
            missing.push(ENV_TELEGRAM_CHAT_ID);
        }
        missing
    }
}

/// Complete run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub series: SeriesConfig,
    pub telegram: TelegramConfig,
    pub thresholds: Thresholds,
    /// Location of the persisted snapshot
    pub state_file: PathBuf,
    /// Day of the week on which the weekly rollup is sent
    pub heartbeat_day: Weekday,
    /// Age of the last recorded run after which the state counts as stale
    pub stale_after_days: i64,
}

impl Config {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as unset. Only the series API key is
    /// required; malformed optional values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get(ENV_FRED_API_KEY)
            .ok_or(ConfigError::MissingRequired(ENV_FRED_API_KEY))?;

        let defaults = Thresholds::default();
        let thresholds = Thresholds {
            daily_change: parse_or(&get, ENV_CHANGE_THRESHOLD, defaults.daily_change),
            high: parse_or(&get, ENV_HIGH_THRESHOLD, defaults.high),
            critical: parse_or(&get, ENV_CRITICAL_THRESHOLD, defaults.critical),
        };

        let window = parse_or(&get, ENV_WINDOW, DEFAULT_WINDOW).max(1);

        let mut stale_after_days =
            parse_or(&get, ENV_STALE_AFTER_DAYS, DEFAULT_STALE_AFTER_DAYS);
        if !(1..=MAX_STALE_AFTER_DAYS).contains(&stale_after_days) {
            tracing::warn!(
                key = ENV_STALE_AFTER_DAYS,
                value = stale_after_days,
                "Ignoring out-of-range setting, expected 1..={}",
                MAX_STALE_AFTER_DAYS
            );
            stale_after_days = DEFAULT_STALE_AFTER_DAYS;
        }

        Ok(Self {
            series: SeriesConfig {
                id: get(ENV_SERIES_ID).unwrap_or_else(|| DEFAULT_SERIES_ID.to_string()),
                name: get(ENV_SERIES_NAME).unwrap_or_else(|| DEFAULT_SERIES_NAME.to_string()),
                api_key,
                window,
                base_url: get(ENV_FRED_BASE_URL)
                    .unwrap_or_else(|| DEFAULT_FRED_BASE_URL.to_string()),
            },
            telegram: TelegramConfig {
                bot_token: get(ENV_TELEGRAM_BOT_TOKEN),
                chat_id: get(ENV_TELEGRAM_CHAT_ID),
                base_url: get(ENV_TELEGRAM_BASE_URL)
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_BASE_URL.to_string()),
            },
            thresholds,
            state_file: get(ENV_STATE_FILE)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            heartbeat_day: parse_or(&get, ENV_HEARTBEAT_DAY, Weekday::Mon),
            stale_after_days,
        })
    }

    /// Log the effective configuration without credentials
    pub fn log_summary(&self) {
        tracing::info!("spreadwatch configuration:");
        tracing::info!("  Series: {} ({})", self.series.name, self.series.id);
        tracing::info!("  Window: {} observations", self.series.window);
        tracing::info!(
            "  Thresholds: change={} high={} critical={}",
            self.thresholds.daily_change,
            self.thresholds.high,
            self.thresholds.critical
        );
        tracing::info!("  State file: {}", self.state_file.display());
        tracing::info!("  Weekly rollup day: {}", self.heartbeat_day);
        if self.telegram.is_configured() {
            tracing::info!("  Telegram: enabled");
        } else {
            tracing::warn!("  Telegram: not configured, messages will only be logged");
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key = key, value = %raw, "Ignoring unparseable setting");
            default
        }),
        None => default,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Required setting {0} is not configured")]
    MissingRequired(&'static str),
}
