//! Snapshot of the last observed value

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::series::Observation;

/// Last observed value and the time of the run that recorded it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Date of the observation
    #[serde(rename = "fecha", alias = "date")]
    pub date: NaiveDate,
    /// Observed value
    #[serde(rename = "valor", alias = "value")]
    pub value: f64,
    /// When the run that wrote this snapshot finished evaluating
    #[serde(rename = "ultima_ejecucion", alias = "last_run", with = "last_run_serde")]
    pub last_run: DateTime<Utc>,
}

impl Snapshot {
    /// Snapshot of a freshly fetched observation
    pub fn from_observation(observation: &Observation, last_run: DateTime<Utc>) -> Self {
        Self {
            date: observation.date,
            value: observation.value,
            last_run,
        }
    }

    /// True when the recorded run is older than `max_age`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.last_run) > max_age
    }
}

/// Timestamps are written as RFC 3339. Naive ISO-8601 timestamps without an
/// offset are read back as UTC.
mod last_run_serde {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;

        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(parsed.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| D::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
    }
}
