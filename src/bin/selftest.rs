//! spreadwatch self-test
//!
//! Checks the series source and the Telegram bot without waiting for the
//! scheduled run. Never touches the state file.
//!
//! Run with: cargo run --bin selftest [-- --send]
//!
//! With `--send`, a test message and a simulated alert built from real data
//! are delivered to the configured chat.

use std::process::ExitCode;

use spreadwatch::alerts::{AlertEvaluator, Evaluation, Message, Notifier};
use spreadwatch::series::{FredClient, PLAUSIBLE_MAX, PLAUSIBLE_MIN};
use spreadwatch::{Config, Snapshot};

#[derive(Default)]
struct Tally {
    passed: usize,
    failed: usize,
}

impl Tally {
    fn record(&mut self, name: &str, passed: bool, detail: impl AsRef<str>) {
        if passed {
            self.passed += 1;
            println!("PASS | {}", name);
        } else {
            self.failed += 1;
            println!("FAIL | {}", name);
        }
        let detail = detail.as_ref();
        if !detail.is_empty() {
            println!("       {}", detail);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let send = std::env::args().any(|arg| arg == "--send");
    let now = chrono::Utc::now();
    let mut tally = Tally::default();

    println!("spreadwatch self-test");
    println!("=====================");
    println!("Date: {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("FAIL | Load configuration");
            println!("       {}", e);
            return ExitCode::FAILURE;
        }
    };
    tally.record("Load configuration", true, format!("Series: {}", config.series.id));

    // Series source
    println!();
    println!("Series source");
    let observations = match FredClient::new(&config.series) {
        Ok(client) => match client.fetch(5).await {
            Ok(observations) => {
                tally.record(
                    "Fetch latest observations",
                    true,
                    format!("{} observations", observations.len()),
                );
                for (i, obs) in observations.iter().enumerate() {
                    println!("       {}. {}: {:.2}%", i + 1, obs.date, obs.value);
                }
                if let Some(latest) = observations.first() {
                    tally.record(
                        "Latest value in plausible range",
                        latest.is_plausible(),
                        format!(
                            "{:.2}% (range {}-{}%)",
                            latest.value, PLAUSIBLE_MIN, PLAUSIBLE_MAX
                        ),
                    );
                }
                observations
            }
            Err(e) => {
                tally.record("Fetch latest observations", false, e.to_string());
                Vec::new()
            }
        },
        Err(e) => {
            tally.record("Create HTTP client", false, e.to_string());
            Vec::new()
        }
    };

    // Telegram
    println!();
    println!("Telegram");
    let notifier = match Notifier::new(&config.telegram) {
        Ok(notifier) => Some(notifier),
        Err(e) => {
            tally.record("Create HTTP client", false, e.to_string());
            None
        }
    };

    if let Some(notifier) = &notifier {
        if notifier.is_configured() {
            match notifier.verify().await {
                Ok(bot) => tally.record(
                    "Bot token valid",
                    true,
                    format!(
                        "{} (@{}, id {})",
                        bot.first_name,
                        bot.username.as_deref().unwrap_or("n/a"),
                        bot.id
                    ),
                ),
                Err(e) => tally.record("Bot token valid", false, e.to_string()),
            }
        } else {
            println!(
                "SKIP | Telegram not configured ({})",
                config.telegram.missing().join(", ")
            );
        }
    }

    // Simulated alert from the two newest real observations
    println!();
    println!("Simulated alert");
    let simulated = match observations.get(1) {
        Some(previous) => {
            let prior = Snapshot::from_observation(previous, now);
            let evaluator = AlertEvaluator::from_config(&config);
            let evaluation = evaluator.evaluate(&observations[..1], Some(&prior));
            match &evaluation {
                Evaluation::Quiet => println!(
                    "       No alerts would fire ({:.2}% vs {:.2}%)",
                    observations[0].value, previous.value
                ),
                _ => {
                    if let Some(message) = evaluation.message() {
                        println!("{}", message.to_plain());
                    }
                }
            }
            Some(evaluation)
        }
        None => {
            tally.record("Simulate alert", false, "Not enough observations");
            None
        }
    };

    if send {
        if let Some(notifier) = notifier.as_ref().filter(|n| n.is_configured()) {
            println!();
            println!("Delivery");
            let test_message = Message::new()
                .text("🧪 ")
                .bold("spreadwatch self-test")
                .line()
                .line()
                .text(format!("Date: {}", now.format("%Y-%m-%d %H:%M:%S UTC")))
                .line()
                .italic("If you can read this, delivery is configured correctly");
            let delivered = notifier.notify(&test_message, false).await;
            tally.record("Send test message", delivered, "");

            if let Some(message) = simulated.as_ref().and_then(Evaluation::message) {
                let message = Message::new()
                    .italic("Simulation with real data")
                    .line()
                    .line()
                    .append(message.clone());
                let delivered = notifier.notify(&message, false).await;
                tally.record("Send simulated alert", delivered, "");
            }
        }
    }

    println!();
    println!("Summary: {} passed, {} failed", tally.passed, tally.failed);

    if tally.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
