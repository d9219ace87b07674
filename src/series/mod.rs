//! Series source: recent observations of one FRED time series
//!
//! The client requests the newest N points, drops points the source marks
//! as unavailable, and validates the newest value before handing the batch
//! to the evaluator.

pub mod client;

pub use client::{FetchError, FredClient, RetryPolicy, TransportError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lowest value accepted as a plausible reading
pub const PLAUSIBLE_MIN: f64 = 0.5;
/// Highest value accepted as a plausible reading
pub const PLAUSIBLE_MAX: f64 = 30.0;

/// One dated reading of the series, in percentage units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }

    /// Whether the value lies inside the plausibility band (inclusive)
    pub fn is_plausible(&self) -> bool {
        (PLAUSIBLE_MIN..=PLAUSIBLE_MAX).contains(&self.value)
    }
}
