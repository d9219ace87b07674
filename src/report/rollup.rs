use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};

use crate::alerts::evaluator::fred_series_url;
use crate::alerts::{Message, Thresholds};
use crate::series::Observation;

/// Days covered by the rollup, counting the newest observation's day
pub const ROLLUP_DAYS: i64 = 7;

/// Coarse level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelStatus {
    Normal,
    Elevated,
    Critical,
}

impl LevelStatus {
    pub fn classify(value: f64, thresholds: &Thresholds) -> Self {
        if value >= thresholds.critical {
            LevelStatus::Critical
        } else if value >= thresholds.high {
            LevelStatus::Elevated
        } else {
            LevelStatus::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LevelStatus::Normal => "NORMAL",
            LevelStatus::Elevated => "ELEVATED",
            LevelStatus::Critical => "CRITICAL",
        }
    }

    fn emoji(&self) -> &'static str {
        match self {
            LevelStatus::Normal => "🟢",
            LevelStatus::Elevated => "🟡",
            LevelStatus::Critical => "🔴",
        }
    }
}

impl fmt::Display for LevelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of the last week of observations
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyRollup {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
    pub status: LevelStatus,
}

/// Whether `now` falls on the configured rollup day (UTC)
pub fn is_rollup_day(now: DateTime<Utc>, day: Weekday) -> bool {
    now.weekday() == day
}

impl WeeklyRollup {
    /// Summarize newest-first observations within [`ROLLUP_DAYS`] of the newest one
    pub fn compute(observations: &[Observation], thresholds: &Thresholds) -> Option<Self> {
        let newest = observations.first()?;
        let cutoff = newest.date - Duration::days(ROLLUP_DAYS - 1);

        let week: Vec<&Observation> = observations
            .iter()
            .filter(|obs| obs.date >= cutoff && obs.date <= newest.date)
            .collect();

        let count = week.len();
        let sum: f64 = week.iter().map(|obs| obs.value).sum();
        let min = week.iter().map(|obs| obs.value).fold(f64::INFINITY, f64::min);
        let max = week
            .iter()
            .map(|obs| obs.value)
            .fold(f64::NEG_INFINITY, f64::max);
        let from = week.iter().map(|obs| obs.date).min().unwrap_or(newest.date);

        Some(Self {
            from,
            to: newest.date,
            count,
            average: sum / count as f64,
            min,
            max,
            latest: newest.value,
            status: LevelStatus::classify(newest.value, thresholds),
        })
    }

    pub fn message(&self, series_id: &str, series_name: &str) -> Message {
        Message::new()
            .text("📅 ")
            .bold(format!("Weekly summary - {series_name}"))
            .line()
            .line()
            .text(format!("Period: {} to {} ({} observations)", self.from, self.to, self.count))
            .line()
            .text("Latest: ")
            .bold(format!("{:.2}%", self.latest))
            .line()
            .text(format!("Average: {:.2}%", self.average))
            .line()
            .text(format!("Min: {:.2}%  Max: {:.2}%", self.min, self.max))
            .line()
            .text(format!("Status: {} ", self.status.emoji()))
            .bold(self.status.as_str())
            .line()
            .line()
            .italic("spreadwatch ran successfully")
            .line()
            .text("🔗 ")
            .link("View on FRED", fred_series_url(series_id))
    }
}
