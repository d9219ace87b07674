//! Non-alert reports: the weekly rollup (heartbeat) and the configuration
//! and state health check

pub mod health;
pub mod rollup;

pub use health::{check_health, health_message, HealthIssue};
pub use rollup::{is_rollup_day, LevelStatus, WeeklyRollup};
