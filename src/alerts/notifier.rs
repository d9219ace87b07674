//! Telegram delivery for alert messages

use std::time::Duration;

use serde::Deserialize;

use super::message::Message;
use crate::config::TelegramConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Notifier for sending messages to a Telegram chat
pub struct Notifier {
    client: reqwest::Client,
    bot_token: Option<String>,
    chat_id: Option<String>,
    base_url: String,
}

/// Bot identity reported by `getMe`
#[derive(Debug, Clone, Deserialize)]
pub struct BotInfo {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

impl Notifier {
    /// Create a notifier; missing credentials leave it in log-only mode
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        Ok(Self {
            client,
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Bot token and chat id are both present
    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }

    /// Deliver a message, returning whether it was delivered.
    ///
    /// Critical messages get an urgent marker line in front. Delivery
    /// failures are logged, never retried.
    pub async fn notify(&self, message: &Message, is_critical: bool) -> bool {
        let message = if is_critical {
            message
                .clone()
                .prepend(Message::new().text("🚨🚨🚨").line())
        } else {
            message.clone()
        };

        tracing::info!(critical = is_critical, "Message:\n{}", message.to_plain());

        let (Some(token), Some(chat_id)) = (&self.bot_token, &self.chat_id) else {
            tracing::warn!("Telegram not configured, message logged only");
            return false;
        };

        match self.send_message(token, chat_id, &message).await {
            Ok(()) => {
                tracing::info!("Message sent to Telegram");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send Telegram message");
                false
            }
        }
    }

    async fn send_message(
        &self,
        token: &str,
        chat_id: &str,
        message: &Message,
    ) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": message.to_html(),
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let url = format!("{}/bot{}/sendMessage", self.base_url, token);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.without_url().to_string()))?;

        Self::check_response::<serde_json::Value>(response).await?;
        Ok(())
    }

    /// Verify the bot credential with `getMe`
    pub async fn verify(&self) -> Result<BotInfo, NotifyError> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or(NotifyError::NotConfigured)?;

        let url = format!("{}/bot{}/getMe", self.base_url, token);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.without_url().to_string()))?;

        Self::check_response::<BotInfo>(response)
            .await?
            .ok_or_else(|| NotifyError::Rejected("getMe returned no bot".to_string()))
    }

    async fn check_response<T>(response: reqwest::Response) -> Result<Option<T>, NotifyError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NotifyError::Http(e.without_url().to_string()))?;

        let parsed: Option<ApiResponse<T>> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let description = parsed
                .and_then(|p| p.description)
                .unwrap_or(body);
            return Err(NotifyError::Status {
                status: status.as_u16(),
                description,
            });
        }

        match parsed {
            Some(api) if api.ok => Ok(api.result),
            Some(api) => Err(NotifyError::Rejected(
                api.description.unwrap_or_else(|| "unknown error".to_string()),
            )),
            None => Err(NotifyError::Rejected(format!("unexpected response: {body}"))),
        }
    }
}

/// Notifier errors
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Telegram not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Telegram returned status {status}: {description}")]
    Status { status: u16, description: String },

    #[error("Telegram rejected the request: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(base_url: &str) -> Notifier {
        Notifier::new(&TelegramConfig {
            bot_token: Some("123:abc".to_string()),
            chat_id: Some("42".to_string()),
            base_url: base_url.to_string(),
        })
        .unwrap()
    }

    fn message() -> Message {
        Message::new().bold("Spread").text(" at 5.20%")
    }

    #[tokio::test]
    async fn test_unconfigured_logs_only() {
        let notifier = Notifier::new(&TelegramConfig {
            bot_token: Some("123:abc".to_string()),
            chat_id: None,
            base_url: "http://127.0.0.1:9".to_string(),
        })
        .unwrap();

        assert!(!notifier.is_configured());
        assert!(!notifier.notify(&message(), true).await);
    }

    #[tokio::test]
    async fn test_sends_html_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "42",
                "text": "<b>Spread</b> at 5.20%",
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "message_id": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(notifier(&server.uri()).notify(&message(), false).await);
    }

    #[tokio::test]
    async fn test_critical_marker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "text": "🚨🚨🚨\n<b>Spread</b> at 5.20%",
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })),
            )
            .expect(1)
            .mount(&server)
            .await;

        assert!(notifier(&server.uri()).notify(&message(), true).await);
    }

    #[tokio::test]
    async fn test_failure_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(!notifier(&server.uri()).notify(&message(), false).await);
    }

    #[tokio::test]
    async fn test_ok_false_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Forbidden"
            })))
            .mount(&server)
            .await;

        assert!(!notifier(&server.uri()).notify(&message(), false).await);
    }

    #[tokio::test]
    async fn test_verify() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bot123:abc/getMe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {
                    "id": 123,
                    "is_bot": true,
                    "first_name": "Spread Bot",
                    "username": "spread_bot"
                }
            })))
            .mount(&server)
            .await;

        let bot = notifier(&server.uri()).verify().await.unwrap();
        assert_eq!(bot.id, 123);
        assert_eq!(bot.username.as_deref(), Some("spread_bot"));

        let unconfigured = Notifier::new(&TelegramConfig::default()).unwrap();
        assert!(matches!(
            unconfigured.verify().await,
            Err(NotifyError::NotConfigured)
        ));
    }
}
