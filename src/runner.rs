//! One monitoring run: fetch, evaluate, notify, persist
//!
//! The state file is written whenever a trustworthy current value was
//! fetched, regardless of notification outcome. Failures that prevent
//! obtaining that value skip persistence and fail the run.

use chrono::{DateTime, Utc};

use crate::alerts::{AlertEvaluator, Evaluation, Message, Notifier, NotifyError};
use crate::config::{Config, ConfigError};
use crate::report::{check_health, health_message, is_rollup_day, WeeklyRollup};
use crate::series::{FetchError, FredClient, Observation, RetryPolicy, TransportError};
use crate::state::{Snapshot, StateError, StateStore};

/// What a successful run did
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub evaluation: Evaluation,
    /// Alert message delivered to the chat
    pub delivered: bool,
    /// Snapshot written at the end of the run
    pub snapshot: Snapshot,
    /// Whether the weekly rollup was delivered, if it was due
    pub rollup_delivered: Option<bool>,
}

/// Final status of a run, mapped to the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failed => 1,
        }
    }
}

/// Sequences the components of a run
pub struct Runner<'a> {
    config: &'a Config,
    client: FredClient,
    store: StateStore,
    evaluator: AlertEvaluator,
    notifier: Notifier,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a Config) -> Result<Self, RunError> {
        Ok(Self {
            config,
            client: FredClient::new(&config.series)?,
            store: StateStore::new(&config.state_file),
            evaluator: AlertEvaluator::from_config(config),
            notifier: Notifier::new(&config.telegram)?,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.client = self.client.with_retry(retry);
        self
    }

    /// Run once and report any failure, returning the status for the exit code
    pub async fn execute(&self, now: DateTime<Utc>) -> RunStatus {
        match self.run(now).await {
            Ok(outcome) => {
                tracing::info!(
                    alert = outcome.evaluation.has_alert(),
                    delivered = outcome.delivered,
                    date = %outcome.snapshot.date,
                    "Run completed successfully"
                );
                RunStatus::Success
            }
            Err(e) => {
                self.report_failure(&e, now).await;
                RunStatus::Failed
            }
        }
    }

    /// Fetch, evaluate, notify and persist
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunOutcome, RunError> {
        let prior = self.store.load();

        self.self_check(prior.as_ref(), now).await;

        tracing::info!(series_id = %self.client.series_id(), "Fetching observations");
        let observations = self.client.fetch(self.config.series.window).await?;
        let newest = *observations.first().ok_or(FetchError::EmptyResult)?;
        tracing::info!(
            count = observations.len(),
            "Received observations, latest {} = {:.2}%",
            newest.date,
            newest.value
        );

        match &prior {
            Some(snapshot) => tracing::info!(
                "Previous value {} = {:.2}%",
                snapshot.date,
                snapshot.value
            ),
            None => tracing::info!("No prior state"),
        }

        let evaluation = self.evaluator.evaluate(&observations, prior.as_ref());

        let delivered = match evaluation.message() {
            Some(message) => {
                if let Some(alerts) = evaluation.alerts() {
                    tracing::warn!(
                        conditions = ?alerts.labels(),
                        critical = alerts.is_critical(),
                        "Alert conditions detected"
                    );
                }
                self.notifier.notify(message, evaluation.is_critical()).await
            }
            None => {
                tracing::info!("No alerts, spread within normal ranges");
                false
            }
        };

        let snapshot = Snapshot::from_observation(&newest, now);
        self.store.save(&snapshot)?;
        tracing::info!(path = %self.store.path().display(), date = %snapshot.date, "State saved");

        let rollup_delivered = if is_rollup_day(now, self.config.heartbeat_day) {
            Some(self.send_rollup(&observations).await)
        } else {
            None
        };

        Ok(RunOutcome {
            evaluation,
            delivered,
            snapshot,
            rollup_delivered,
        })
    }

    async fn self_check(&self, prior: Option<&Snapshot>, now: DateTime<Utc>) {
        let issues = check_health(self.config, prior, now);
        if issues.is_empty() {
            tracing::debug!("Health check passed");
            return;
        }

        for issue in &issues {
            tracing::warn!("Health check: {}", issue.describe());
        }
        let message = health_message(&issues, &self.config.series.name);
        self.notifier.notify(&message, false).await;
    }

    async fn send_rollup(&self, observations: &[Observation]) -> bool {
        match WeeklyRollup::compute(observations, &self.config.thresholds) {
            Some(rollup) => {
                tracing::info!(
                    average = rollup.average,
                    min = rollup.min,
                    max = rollup.max,
                    status = %rollup.status,
                    "Sending weekly rollup"
                );
                let message = rollup.message(&self.config.series.id, &self.config.series.name);
                self.notifier.notify(&message, false).await
            }
            None => false,
        }
    }

    /// Log a failed run and, unless configuration is at fault, send a
    /// critical error message
    pub async fn report_failure(&self, error: &RunError, now: DateTime<Utc>) {
        tracing::error!(kind = ?error.kind(), error = %error, "Run failed");

        if error.kind() == ErrorKind::Configuration {
            return;
        }

        let message = failure_message(error, &self.config.series.name, now);
        self.notifier.notify(&message, true).await;
    }
}

/// Critical message describing a failed run
pub fn failure_message(error: &RunError, series_name: &str, now: DateTime<Utc>) -> Message {
    Message::new()
        .text("❌ ")
        .bold(format!("Error in {series_name} tracker"))
        .line()
        .line()
        .text(format!("Kind: {}", error.kind().as_str()))
        .line()
        .text(format!("Error: {error}"))
        .line()
        .text(format!("Time: {}", now.format("%Y-%m-%d %H:%M:%S UTC")))
}

/// Classification of run failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required setting missing
    Configuration,
    /// Network failures that outlasted the retry bound
    TransientFetch,
    /// Source answered, but with unusable data
    DataValidity,
    /// State file could not be written
    State,
    /// Anything else
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::TransientFetch => "fetch",
            ErrorKind::DataValidity => "data validity",
            ErrorKind::State => "state",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

/// Run errors
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("HTTP client error: {0}")]
    Client(#[from] TransportError),

    #[error("Notifier error: {0}")]
    Notifier(#[from] NotifyError),
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::Config(_) => ErrorKind::Configuration,
            RunError::Fetch(e) if e.is_transient() => ErrorKind::TransientFetch,
            RunError::Fetch(_) => ErrorKind::DataValidity,
            RunError::State(_) => ErrorKind::State,
            RunError::Client(_) | RunError::Notifier(_) => ErrorKind::Unexpected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ENV_FRED_API_KEY, ENV_FRED_BASE_URL, ENV_STATE_FILE, ENV_TELEGRAM_BASE_URL,
        ENV_TELEGRAM_BOT_TOKEN, ENV_TELEGRAM_CHAT_ID,
    };
    use chrono::{NaiveDate, TimeZone};
    use std::collections::HashMap;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OBS_PATH: &str = "/fred/series/observations";
    const SEND_PATH: &str = "/bottoken/sendMessage";

    /// 2024-01-10 is a Wednesday, so no rollup is due
    fn wednesday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap()
    }

    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 8, 8, 0, 0).unwrap()
    }

    fn test_config(fred: &MockServer, telegram: &MockServer, state_file: &Path) -> Config {
        let vars: HashMap<&str, String> = HashMap::from([
            (ENV_FRED_API_KEY, "key".to_string()),
            (ENV_FRED_BASE_URL, fred.uri()),
            (ENV_TELEGRAM_BOT_TOKEN, "token".to_string()),
            (ENV_TELEGRAM_CHAT_ID, "42".to_string()),
            (ENV_TELEGRAM_BASE_URL, telegram.uri()),
            (ENV_STATE_FILE, state_file.display().to_string()),
        ]);
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    fn runner(config: &Config) -> Runner<'_> {
        Runner::new(config).unwrap().with_retry(RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(10),
        })
    }

    async fn serve_observations(server: &MockServer, points: &[(&str, &str)]) {
        let observations: Vec<_> = points
            .iter()
            .map(|(date, value)| serde_json::json!({ "date": date, "value": value }))
            .collect();
        Mock::given(method("GET"))
            .and(path(OBS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "observations": observations })),
            )
            .mount(server)
            .await;
    }

    async fn expect_messages(server: &MockServer, status: u16, count: u64) {
        Mock::given(method("POST"))
            .and(path(SEND_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                "ok": status == 200,
                "description": "test"
            })))
            .expect(count)
            .mount(server)
            .await;
    }

    fn write_prior(path: &Path, value: f64) {
        let snapshot = Snapshot {
            date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            value,
            last_run: Utc.with_ymd_and_hms(2024, 1, 9, 8, 0, 0).unwrap(),
        };
        StateStore::new(path).save(&snapshot).unwrap();
    }

    #[tokio::test]
    async fn test_first_run_alerts_and_saves_state() {
        let (fred, telegram) = (MockServer::start().await, MockServer::start().await);
        let temp_dir = TempDir::new().unwrap();
        let state_file = temp_dir.path().join("state.json");

        serve_observations(&fred, &[("2024-01-09", "3.45"), ("2024-01-08", "3.40")]).await;
        expect_messages(&telegram, 200, 1).await;

        let config = test_config(&fred, &telegram, &state_file);
        let outcome = runner(&config).run(wednesday()).await.unwrap();

        assert!(matches!(outcome.evaluation, Evaluation::FirstRun { .. }));
        assert!(outcome.delivered);
        assert_eq!(outcome.rollup_delivered, None);

        let saved = StateStore::new(&state_file).load().unwrap();
        assert_eq!(saved.value, 3.45);
        assert_eq!(saved.date, NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        assert_eq!(saved.last_run, wednesday());
    }

    #[tokio::test]
    async fn test_critical_alert_run() {
        let (fred, telegram) = (MockServer::start().await, MockServer::start().await);
        let temp_dir = TempDir::new().unwrap();
        let state_file = temp_dir.path().join("state.json");
        write_prior(&state_file, 6.4);

        serve_observations(&fred, &[("2024-01-09", "6.6")]).await;
        expect_messages(&telegram, 200, 1).await;

        let config = test_config(&fred, &telegram, &state_file);
        let outcome = runner(&config).run(wednesday()).await.unwrap();

        assert!(outcome.evaluation.is_critical());
        assert!(outcome.delivered);
        assert_eq!(StateStore::new(&state_file).load().unwrap().value, 6.6);
    }

    #[tokio::test]
    async fn test_quiet_run_sends_nothing() {
        let (fred, telegram) = (MockServer::start().await, MockServer::start().await);
        let temp_dir = TempDir::new().unwrap();
        let state_file = temp_dir.path().join("state.json");
        write_prior(&state_file, 4.4);

        serve_observations(&fred, &[("2024-01-09", "4.5")]).await;
        expect_messages(&telegram, 200, 0).await;

        let config = test_config(&fred, &telegram, &state_file);
        let runner = runner(&config);
        let outcome = runner.run(wednesday()).await.unwrap();

        assert_eq!(outcome.evaluation, Evaluation::Quiet);
        assert!(!outcome.delivered);
        assert_eq!(StateStore::new(&state_file).load().unwrap().value, 4.5);

        // Same value again: still quiet, still a success
        assert_eq!(runner.execute(wednesday()).await.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_delivery_failure_still_persists() {
        let (fred, telegram) = (MockServer::start().await, MockServer::start().await);
        let temp_dir = TempDir::new().unwrap();
        let state_file = temp_dir.path().join("state.json");
        write_prior(&state_file, 4.5);

        serve_observations(&fred, &[("2024-01-09", "5.2")]).await;
        expect_messages(&telegram, 500, 1).await;

        let config = test_config(&fred, &telegram, &state_file);
        let runner = runner(&config);
        let outcome = runner.run(wednesday()).await.unwrap();

        assert!(outcome.evaluation.has_alert());
        assert!(!outcome.delivered);
        assert_eq!(StateStore::new(&state_file).load().unwrap().value, 5.2);
    }

    #[tokio::test]
    async fn test_invalid_data_fails_without_persisting() {
        let (fred, telegram) = (MockServer::start().await, MockServer::start().await);
        let temp_dir = TempDir::new().unwrap();
        let state_file = temp_dir.path().join("state.json");
        write_prior(&state_file, 4.5);

        serve_observations(&fred, &[("2024-01-09", "35.0")]).await;
        // The error report is the only message
        expect_messages(&telegram, 200, 1).await;

        let config = test_config(&fred, &telegram, &state_file);
        let runner = runner(&config);

        let err = runner.run(wednesday()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataValidity);
        assert_eq!(StateStore::new(&state_file).load().unwrap().value, 4.5);

        runner.report_failure(&err, wednesday()).await;
    }

    #[tokio::test]
    async fn test_execute_maps_fetch_failure_to_exit_code() {
        let (fred, telegram) = (MockServer::start().await, MockServer::start().await);
        let temp_dir = TempDir::new().unwrap();
        let state_file = temp_dir.path().join("state.json");

        Mock::given(method("GET"))
            .and(path(OBS_PATH))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&fred)
            .await;
        expect_messages(&telegram, 200, 1).await;

        let config = test_config(&fred, &telegram, &state_file);
        let status = runner(&config).execute(wednesday()).await;

        assert_eq!(status, RunStatus::Failed);
        assert_eq!(status.exit_code(), 1);
        assert!(!state_file.exists());
    }

    #[tokio::test]
    async fn test_rollup_on_heartbeat_day() {
        let (fred, telegram) = (MockServer::start().await, MockServer::start().await);
        let temp_dir = TempDir::new().unwrap();
        let state_file = temp_dir.path().join("state.json");
        write_prior(&state_file, 3.4);

        serve_observations(
            &fred,
            &[("2024-01-05", "3.42"), ("2024-01-04", "3.38"), ("2024-01-03", "3.45")],
        )
        .await;
        // Quiet evaluation, so only the rollup goes out
        expect_messages(&telegram, 200, 1).await;

        let config = test_config(&fred, &telegram, &state_file);
        let outcome = runner(&config).run(monday()).await.unwrap();

        assert_eq!(outcome.evaluation, Evaluation::Quiet);
        assert_eq!(outcome.rollup_delivered, Some(true));
    }

    #[tokio::test]
    async fn test_stale_state_is_reported() {
        let (fred, telegram) = (MockServer::start().await, MockServer::start().await);
        let temp_dir = TempDir::new().unwrap();
        let state_file = temp_dir.path().join("state.json");
        write_prior(&state_file, 4.4);

        serve_observations(&fred, &[("2024-01-19", "4.5")]).await;
        // Health report only; the value moved too little to alert
        expect_messages(&telegram, 200, 1).await;

        let config = test_config(&fred, &telegram, &state_file);
        let stale_now = Utc.with_ymd_and_hms(2024, 1, 24, 8, 0, 0).unwrap();
        let outcome = runner(&config).run(stale_now).await.unwrap();

        assert_eq!(outcome.evaluation, Evaluation::Quiet);
    }

    #[test]
    fn test_error_kinds() {
        let config_err = RunError::from(ConfigError::MissingRequired(ENV_FRED_API_KEY));
        assert_eq!(config_err.kind(), ErrorKind::Configuration);

        assert_eq!(
            RunError::from(FetchError::EmptyResult).kind(),
            ErrorKind::DataValidity
        );
        let transient = RunError::from(FetchError::FetchFailed {
            attempts: 3,
            source: TransportError::Status {
                status: 503,
                body: String::new(),
            },
        });
        assert_eq!(transient.kind(), ErrorKind::TransientFetch);

        let text = failure_message(&transient, "High Yield Bond Spread", wednesday()).to_plain();
        assert!(text.contains("Kind: fetch"));
        assert!(text.contains("Fetch failed after 3 attempts"));
        assert!(text.contains("2024-01-10 08:00:00 UTC"));
    }
}
