//! Alert rules: turns the recent observations and the previous snapshot
//! into a classified set of conditions and a formatted message

use super::config::{AlertCondition, AlertSet, Direction, Thresholds};
use super::message::Message;
use crate::config::{Config, DEFAULT_SERIES_ID, DEFAULT_SERIES_NAME};
use crate::series::Observation;
use crate::state::Snapshot;

/// Observations considered by the trend rules
pub const TREND_WINDOW: usize = 5;
/// Rising intervals within the trend window that count as a moderate uptrend
pub const MODERATE_TREND_MIN_RISES: usize = 3;

/// The series is published in hundredths of a percentage point
const VALUE_SCALE: f64 = 100.0;

/// Link to the series page on FRED
pub fn fred_series_url(series_id: &str) -> String {
    format!("https://fred.stlouisfed.org/series/{series_id}")
}

/// Link to the series chart on TradingView
pub fn tradingview_url(series_id: &str) -> String {
    format!("https://www.tradingview.com/symbols/FRED-{series_id}/")
}

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Nothing worth reporting
    Quiet,
    /// No prior state existed; report the current value only
    FirstRun { message: Message },
    /// One or more conditions fired
    Alert { alerts: AlertSet, message: Message },
}

impl Evaluation {
    pub fn has_alert(&self) -> bool {
        !matches!(self, Evaluation::Quiet)
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            Evaluation::Quiet => None,
            Evaluation::FirstRun { message } | Evaluation::Alert { message, .. } => Some(message),
        }
    }

    pub fn is_critical(&self) -> bool {
        match self {
            Evaluation::Alert { alerts, .. } => alerts.is_critical(),
            _ => false,
        }
    }

    pub fn alerts(&self) -> Option<&AlertSet> {
        match self {
            Evaluation::Alert { alerts, .. } => Some(alerts),
            _ => None,
        }
    }
}

/// Evaluates the alert rules for one series
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    thresholds: Thresholds,
    series_id: String,
    series_name: String,
}

impl AlertEvaluator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            series_id: DEFAULT_SERIES_ID.to_string(),
            series_name: DEFAULT_SERIES_NAME.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.thresholds).with_series(&config.series.id, &config.series.name)
    }

    pub fn with_series(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.series_id = id.into();
        self.series_name = name.into();
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Evaluate newest-first `observations` against the previous snapshot
    pub fn evaluate(&self, observations: &[Observation], prior: Option<&Snapshot>) -> Evaluation {
        let Some(current) = observations.first() else {
            return Evaluation::Quiet;
        };

        let Some(prior) = prior else {
            return Evaluation::FirstRun {
                message: self.first_run_message(current),
            };
        };

        let alerts = self.check_conditions(observations, prior.value);
        if alerts.is_empty() {
            return Evaluation::Quiet;
        }

        let message = self.alert_message(current, prior, &alerts);
        Evaluation::Alert { alerts, message }
    }

    /// Every condition that fires for the newest observation against `prior_value`
    pub fn check_conditions(&self, observations: &[Observation], prior_value: f64) -> AlertSet {
        let mut alerts = AlertSet::new();
        let Some(current) = observations.first() else {
            return alerts;
        };
        let value = current.value;
        let t = &self.thresholds;
        let (change, change_pct) = compute_change(value, prior_value);

        if change.abs() >= t.daily_change {
            alerts.push(AlertCondition::MagnitudeChange {
                direction: Direction::of(change),
                change,
                change_pct,
            });
        }

        if value >= t.critical {
            alerts.push(AlertCondition::LevelCritical {
                value,
                threshold: t.critical,
            });
        } else if value >= t.high {
            alerts.push(AlertCondition::LevelHigh {
                value,
                threshold: t.high,
            });
        }

        if prior_value < t.high && value >= t.high {
            alerts.push(AlertCondition::CrossedUp { threshold: t.high });
        }
        if prior_value >= t.high && value < t.high {
            alerts.push(AlertCondition::CrossedDown { threshold: t.high });
        }
        if prior_value < t.critical && value >= t.critical {
            alerts.push(AlertCondition::CriticalCross {
                threshold: t.critical,
            });
        }

        if let Some(trend) = self.trend_condition(observations) {
            alerts.push(trend);
        }

        alerts
    }

    /// Trend over the newest [`TREND_WINDOW`] observations.
    ///
    /// Strict rise, then strict fall, then a moderate rise; first match wins.
    fn trend_condition(&self, observations: &[Observation]) -> Option<AlertCondition> {
        if observations.len() < TREND_WINDOW {
            return None;
        }

        // Newest first: w[0] is the later day of each pair
        let window = &observations[..TREND_WINDOW];
        let intervals = TREND_WINDOW - 1;
        let rising = window.windows(2).filter(|w| w[0].value > w[1].value).count();
        let falling = window.windows(2).filter(|w| w[0].value < w[1].value).count();

        if rising == intervals {
            Some(AlertCondition::TrendUp {
                days: TREND_WINDOW,
                critical: window[0].value >= self.thresholds.high,
            })
        } else if falling == intervals {
            Some(AlertCondition::TrendDown { days: TREND_WINDOW })
        } else if rising >= MODERATE_TREND_MIN_RISES {
            Some(AlertCondition::ModerateUptrend { rising, intervals })
        } else {
            None
        }
    }

    fn first_run_message(&self, current: &Observation) -> Message {
        Message::new()
            .text("📊 ")
            .bold(format!("Monitoring started - {}", self.series_name))
            .line()
            .line()
            .text(format!("📅 Date: {}", current.date))
            .line()
            .text("📈 Current spread: ")
            .bold(format!("{:.2}%", current.value))
            .line()
            .line()
            .text("🔗 ")
            .link("View on FRED", fred_series_url(&self.series_id))
    }

    fn alert_message(&self, current: &Observation, prior: &Snapshot, alerts: &AlertSet) -> Message {
        let (change, change_pct) = compute_change(current.value, prior.value);
        let arrow = match Direction::of(change) {
            Direction::Up => "🔺",
            Direction::Down => "🔻",
        };

        let mut message = Message::new()
            .text("📊 ")
            .bold(format!("ALERT - {}", self.series_name))
            .line()
            .line()
            .text(format!("📅 Date: {}", current.date))
            .line()
            .text("📈 Current spread: ")
            .bold(format!("{:.2}%", current.value))
            .line()
            .text(format!(
                "📉 Previous spread: {:.2}% ({})",
                prior.value, prior.date
            ))
            .line()
            .text(format!("{arrow} Change: {change:+.2}% ({change_pct:+.1}%)"))
            .line()
            .line()
            .text("🚨 ")
            .bold("ALERTS:")
            .line();

        for condition in alerts.iter() {
            message = message
                .line()
                .text("• ")
                .append(condition.describe())
                .line();
        }

        message
            .line()
            .text("📊 Historical context:")
            .line()
            .text("   • Normal: 3-5%")
            .line()
            .text("   • 2008 crisis: >20%")
            .line()
            .text("   • COVID-19: ~10%")
            .line()
            .line()
            .text("🔗 ")
            .link("View chart on FRED", fred_series_url(&self.series_id))
            .line()
            .text("📈 ")
            .link("View on TradingView", tradingview_url(&self.series_id))
    }
}

/// Absolute and relative change; the relative change is 0 when `prior` is 0.
///
/// The absolute change is taken on values rounded to the published
/// precision, so 4.55 to 4.40 is exactly 0.15.
fn compute_change(current: f64, prior: f64) -> (f64, f64) {
    let change = ((current * VALUE_SCALE).round() - (prior * VALUE_SCALE).round()) / VALUE_SCALE;
    let change_pct = if prior != 0.0 {
        change / prior * 100.0
    } else {
        0.0
    };
    (change, change_pct)
}
