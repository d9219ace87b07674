//! spreadwatch: scheduled alerts for a single FRED time series
//!
//! Each invocation fetches the most recent observations of one series,
//! compares the newest value against the snapshot saved by the previous run,
//! and sends a Telegram message when a threshold or trend rule fires. It is
//! a batch job: an external scheduler (cron, CI) triggers every run.
//!
//! # Rules
//!
//! - **Magnitude**: absolute daily change at or above the change threshold
//! - **Level**: value at or above the high or critical threshold
//! - **Crossing**: high threshold crossed in either direction, critical upwards
//! - **Trend**: five strictly rising or falling days, or a moderate uptrend
//!
//! # Example
//!
//! ```no_run
//! use spreadwatch::alerts::{AlertEvaluator, Thresholds};
//! use spreadwatch::series::Observation;
//! use chrono::NaiveDate;
//!
//! let evaluator = AlertEvaluator::new(Thresholds::default());
//! let today = Observation::new(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(), 6.6);
//!
//! let evaluation = evaluator.evaluate(&[today], None);
//! if let Some(message) = evaluation.message() {
//!     println!("{}", message.to_plain());
//! }
//! ```
//!
//! # Running a full cycle
//!
//! ```no_run
//! use spreadwatch::{Config, Runner};
//!
//! # tokio_test::block_on(async {
//! let config = Config::from_env().unwrap();
//! let runner = Runner::new(&config).unwrap();
//! let status = runner.execute(chrono::Utc::now()).await;
//! std::process::exit(status.exit_code().into());
//! # });
//! ```

pub mod alerts;
pub mod config;
pub mod report;
pub mod runner;
pub mod series;
pub mod state;

// Re-export commonly used types
pub use alerts::{AlertEvaluator, Evaluation, Message, Notifier, Thresholds};
pub use config::{Config, ConfigError};
pub use runner::{RunError, RunStatus, Runner};
pub use series::{FetchError, FredClient, Observation};
pub use state::{Snapshot, StateStore};
