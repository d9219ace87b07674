//! Alert thresholds and condition types

use serde::{Deserialize, Serialize};

use super::message::Message;

/// Alert thresholds, in percentage units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum absolute change against the previous value that alerts
    pub daily_change: f64,
    /// Level considered high
    pub high: f64,
    /// Level considered critical
    pub critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            daily_change: 0.15,
            high: 5.0,
            critical: 6.5,
        }
    }
}

impl Thresholds {
    /// The high level sits strictly below the critical level
    pub fn is_consistent(&self) -> bool {
        self.daily_change >= 0.0 && self.high < self.critical
    }
}

/// Direction of a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn of(change: f64) -> Self {
        if change > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// A single fired alert condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlertCondition {
    /// Absolute change against the previous value reached the daily threshold
    MagnitudeChange {
        direction: Direction,
        change: f64,
        change_pct: f64,
    },
    /// Value at or above the high threshold (and below critical)
    LevelHigh { value: f64, threshold: f64 },
    /// Value at or above the critical threshold
    LevelCritical { value: f64, threshold: f64 },
    /// Crossed the high threshold upwards
    CrossedUp { threshold: f64 },
    /// Fell back below the high threshold
    CrossedDown { threshold: f64 },
    /// Crossed the critical threshold upwards
    CriticalCross { threshold: f64 },
    /// Rose on every one of the last `days` observations
    TrendUp { days: usize, critical: bool },
    /// Fell on every one of the last `days` observations
    TrendDown { days: usize },
    /// Rose on most, but not all, of the recent intervals
    ModerateUptrend { rising: usize, intervals: usize },
}

impl AlertCondition {
    pub fn severity(&self) -> Severity {
        match self {
            AlertCondition::LevelCritical { .. }
            | AlertCondition::CriticalCross { .. }
            | AlertCondition::TrendUp { critical: true, .. } => Severity::Critical,
            AlertCondition::MagnitudeChange { .. }
            | AlertCondition::LevelHigh { .. }
            | AlertCondition::CrossedUp { .. }
            | AlertCondition::TrendUp { critical: false, .. } => Severity::Warning,
            AlertCondition::CrossedDown { .. }
            | AlertCondition::TrendDown { .. }
            | AlertCondition::ModerateUptrend { .. } => Severity::Info,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity() == Severity::Critical
    }

    /// Short stable label, used in logs
    pub fn label(&self) -> &'static str {
        match self {
            AlertCondition::MagnitudeChange { .. } => "magnitude_change",
            AlertCondition::LevelHigh { .. } => "level_high",
            AlertCondition::LevelCritical { .. } => "level_critical",
            AlertCondition::CrossedUp { .. } => "threshold_cross_up",
            AlertCondition::CrossedDown { .. } => "threshold_cross_down",
            AlertCondition::CriticalCross { .. } => "critical_cross",
            AlertCondition::TrendUp { .. } => "trend_up",
            AlertCondition::TrendDown { .. } => "trend_down",
            AlertCondition::ModerateUptrend { .. } => "moderate_uptrend",
        }
    }

    /// Itemized description for the alert message
    pub fn describe(&self) -> Message {
        match self {
            AlertCondition::MagnitudeChange {
                direction,
                change,
                change_pct,
            } => {
                let heading = match direction {
                    Direction::Up => "📈 ",
                    Direction::Down => "📉 ",
                };
                let label = match direction {
                    Direction::Up => "SHARP RISE",
                    Direction::Down => "SHARP DROP",
                };
                Message::new()
                    .text(heading)
                    .bold(label)
                    .line()
                    .text(format!("   Change: {change:+.2}% ({change_pct:+.1}%)"))
            }
            AlertCondition::LevelCritical { value, threshold } => Message::new()
                .text("🚨 ")
                .bold("CRITICAL LEVEL")
                .line()
                .text(format!("   Spread at {value:.2}% (threshold: {threshold:.2}%)")),
            AlertCondition::LevelHigh { value, threshold } => Message::new()
                .text("⚠️ ")
                .bold("HIGH LEVEL")
                .line()
                .text(format!("   Spread at {value:.2}% (threshold: {threshold:.2}%)")),
            AlertCondition::CrossedUp { threshold } => Message::new()
                .text("⬆️ Spread crossed above ")
                .bold(format!("{threshold:.2}%")),
            AlertCondition::CrossedDown { threshold } => Message::new()
                .text("⬇️ Spread fell below ")
                .bold(format!("{threshold:.2}%")),
            AlertCondition::CriticalCross { threshold } => Message::new()
                .text("🚨 Spread crossed the CRITICAL threshold of ")
                .bold(format!("{threshold:.2}%")),
            AlertCondition::TrendUp { days, .. } => Message::new()
                .text("📈 ")
                .bold("TREND")
                .text(format!(": {days} consecutive days rising")),
            AlertCondition::TrendDown { days } => Message::new()
                .text("📉 ")
                .bold("TREND")
                .text(format!(": {days} consecutive days falling")),
            AlertCondition::ModerateUptrend { rising, intervals } => Message::new()
                .text("↗️ ")
                .bold("MODERATE UPTREND")
                .text(format!(": rose on {rising} of the last {intervals} days")),
        }
    }
}

/// Ordered set of conditions fired in one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertSet {
    conditions: Vec<AlertCondition>,
}

impl AlertSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: AlertCondition) {
        self.conditions.push(condition);
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// True if any fired condition is critical
    pub fn is_critical(&self) -> bool {
        self.conditions.iter().any(AlertCondition::is_critical)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AlertCondition> {
        self.conditions.iter()
    }

    /// Whether a condition with the given label fired
    pub fn contains(&self, label: &str) -> bool {
        self.conditions.iter().any(|c| c.label() == label)
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.conditions.iter().map(AlertCondition::label).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let thresholds = Thresholds::default();
        assert_eq!(thresholds.daily_change, 0.15);
        assert_eq!(thresholds.high, 5.0);
        assert_eq!(thresholds.critical, 6.5);
        assert!(thresholds.is_consistent());

        let inverted = Thresholds {
            high: 7.0,
            ..thresholds
        };
        assert!(!inverted.is_consistent());
    }

    #[test]
    fn test_severity() {
        assert!(AlertCondition::LevelCritical {
            value: 6.6,
            threshold: 6.5
        }
        .is_critical());
        assert!(AlertCondition::TrendUp {
            days: 5,
            critical: true
        }
        .is_critical());
        assert!(!AlertCondition::TrendUp {
            days: 5,
            critical: false
        }
        .is_critical());
        assert_eq!(
            AlertCondition::TrendDown { days: 5 }.severity(),
            Severity::Info
        );
    }

    #[test]
    fn test_alert_set_critical_flag() {
        let mut set = AlertSet::new();
        assert!(set.is_empty());

        set.push(AlertCondition::LevelHigh {
            value: 5.2,
            threshold: 5.0,
        });
        assert!(!set.is_critical());

        set.push(AlertCondition::CriticalCross { threshold: 6.5 });
        assert!(set.is_critical());
        assert_eq!(set.labels(), vec!["level_high", "critical_cross"]);
    }

    #[test]
    fn test_describe_magnitude() {
        let text = AlertCondition::MagnitudeChange {
            direction: Direction::Down,
            change: -0.2,
            change_pct: -3.08,
        }
        .describe()
        .to_plain();

        assert!(text.contains("SHARP DROP"));
        assert!(text.contains("-0.20% (-3.1%)"));
    }
}
