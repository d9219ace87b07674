//! Alerting for the tracked series
//!
//! Threshold and trend rules over the recent observations, a structured
//! message model, and delivery to a Telegram chat.

pub mod config;
pub mod evaluator;
pub mod message;
pub mod notifier;

pub use config::{AlertCondition, AlertSet, Direction, Severity, Thresholds};
pub use evaluator::{AlertEvaluator, Evaluation};
pub use message::{Message, Segment};
pub use notifier::{BotInfo, Notifier, NotifyError};
