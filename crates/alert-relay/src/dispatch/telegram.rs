//! Telegram bot API dispatcher.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{read_body, retry_after, Ack, Dispatcher};
use crate::config::Platform;
use crate::error::DispatchError;
use crate::format::{PlatformMessage, TelegramMessage};

/// Sends HTML messages through `sendMessage`.
pub struct TelegramDispatcher {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    #[serde(flatten)]
    message: &'a TelegramMessage,
}

impl TelegramDispatcher {
    #[must_use]
    pub fn new(client: reqwest::Client, api_url: String, bot_token: String) -> Self {
        Self {
            client,
            api_url,
            bot_token,
        }
    }
}

#[async_trait]
impl Dispatcher for TelegramDispatcher {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn send(&self, destination: &str, message: &PlatformMessage) -> Result<Ack, DispatchError> {
        let PlatformMessage::Telegram(payload) = message else {
            return Err(DispatchError::WrongMessage {
                platform: Platform::Telegram,
                got: message.platform(),
            });
        };

        // The token is part of the path, so never log the URL.
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        debug!(platform = "telegram", destination, "Sending message");

        let response = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id: destination,
                message: payload,
            })
            .send()
            .await
            .map_err(|e| DispatchError::from(e.without_url()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let (body, json) = read_body(response).await;

        if status.is_success() {
            return Ok(Ack {
                platform: Platform::Telegram,
                destination: destination.to_string(),
                message_id: json
                    .as_ref()
                    .and_then(|j| j.pointer("/result/message_id"))
                    .and_then(Value::as_i64)
                    .map(|id| id.to_string()),
            });
        }

        let description = json
            .as_ref()
            .and_then(|j| j.get("description"))
            .and_then(Value::as_str)
            .map_or_else(|| body.clone(), ToString::to_string);

        warn!(
            platform = "telegram",
            destination,
            status = %status,
            description = %description,
            "Telegram API request failed"
        );

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => DispatchError::Unauthorized(description),
            StatusCode::TOO_MANY_REQUESTS => DispatchError::RateLimited {
                retry_after_secs: retry_after(&headers, json.as_ref()),
            },
            StatusCode::FORBIDDEN => DispatchError::InvalidDestination {
                destination: destination.to_string(),
                reason: description,
            },
            StatusCode::BAD_REQUEST if description.contains("chat not found") => {
                DispatchError::InvalidDestination {
                    destination: destination.to_string(),
                    reason: description,
                }
            }
            _ => DispatchError::Api {
                platform: Platform::Telegram,
                status: status.as_u16(),
                body,
            },
        })
    }
}
