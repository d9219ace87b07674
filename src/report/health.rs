//! Non-fatal self-check run before each fetch

use chrono::{DateTime, Duration, Utc};

use crate::alerts::Message;
use crate::config::Config;
use crate::state::Snapshot;

/// A problem found by the self-check
#[derive(Debug, Clone, PartialEq)]
pub enum HealthIssue {
    /// Optional settings that are not configured
    MissingOptional(Vec<&'static str>),
    /// High threshold not below the critical threshold
    InconsistentThresholds { high: f64, critical: f64 },
    /// No run recorded for longer than the staleness limit
    StaleState {
        last_run: DateTime<Utc>,
        days: i64,
    },
}

impl HealthIssue {
    pub fn describe(&self) -> String {
        match self {
            HealthIssue::MissingOptional(names) => {
                format!("Missing optional settings: {}", names.join(", "))
            }
            HealthIssue::InconsistentThresholds { high, critical } => format!(
                "High threshold {high:.2}% is not below the critical threshold {critical:.2}%"
            ),
            HealthIssue::StaleState { last_run, days } => format!(
                "Last recorded run was {} ({days} days ago)",
                last_run.format("%Y-%m-%d %H:%M UTC")
            ),
        }
    }
}

/// Collect configuration and state issues
pub fn check_health(
    config: &Config,
    prior: Option<&Snapshot>,
    now: DateTime<Utc>,
) -> Vec<HealthIssue> {
    let mut issues = Vec::new();

    let missing = config.telegram.missing();
    if !missing.is_empty() {
        issues.push(HealthIssue::MissingOptional(missing));
    }

    if !config.thresholds.is_consistent() {
        issues.push(HealthIssue::InconsistentThresholds {
            high: config.thresholds.high,
            critical: config.thresholds.critical,
        });
    }

    let max_age = Duration::try_days(config.stale_after_days);
    if let (Some(snapshot), Some(max_age)) = (prior, max_age) {
        if snapshot.is_stale(now, max_age) {
            issues.push(HealthIssue::StaleState {
                last_run: snapshot.last_run,
                days: now.signed_duration_since(snapshot.last_run).num_days(),
            });
        }
    }

    issues
}

/// Message listing the issues found
pub fn health_message(issues: &[HealthIssue], series_name: &str) -> Message {
    let mut message = Message::new()
        .text("⚠️ ")
        .bold(format!("Health check - {series_name}"))
        .line();

    for issue in issues {
        message = message.line().text(format!("• {}", issue.describe()));
    }

    message
}
