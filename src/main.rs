//! spreadwatch batch run
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - FRED_API_KEY: FRED API key (required)
//! - TELEGRAM_BOT_TOKEN, TELEGRAM_CHAT_ID: chat delivery (optional, log-only without them)
//! - SPREADWATCH_SERIES_ID: FRED series (default: BAMLH0A0HYM2)
//! - SPREADWATCH_STATE_FILE: state file path (default: bond_spread_state.json)
//! - SPREADWATCH_CHANGE_THRESHOLD / _HIGH_THRESHOLD / _CRITICAL_THRESHOLD
//!   (default: 0.15 / 5.0 / 6.5)
//! - SPREADWATCH_HEARTBEAT_DAY: weekday of the weekly summary (default: Mon)
//! - RUST_LOG: Log level (default: info)
//!
//! Exits 0 on success (with or without alerts), 1 on configuration or fetch failure.

use std::process::ExitCode;

use spreadwatch::{Config, Runner};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spreadwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("spreadwatch {}", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    config.log_summary();

    let runner = match Runner::new(&config) {
        Ok(runner) => runner,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize");
            return ExitCode::FAILURE;
        }
    };

    let status = runner.execute(chrono::Utc::now()).await;
    ExitCode::from(status.exit_code())
}
