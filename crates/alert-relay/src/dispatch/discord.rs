//! Discord bot API dispatcher.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use super::{read_body, retry_after, Ack, Dispatcher};
use crate::config::Platform;
use crate::error::DispatchError;
use crate::format::PlatformMessage;

// Discord JSON error codes
const UNKNOWN_CHANNEL: u64 = 10003;
const MISSING_ACCESS: u64 = 50001;

/// Posts embeds to channels with a bot token.
pub struct DiscordDispatcher {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
}

impl DiscordDispatcher {
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
impl Dispatcher for DiscordDispatcher {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    async fn send(&self, destination: &str, message: &PlatformMessage) -> Result<Ack, DispatchError> {
        let PlatformMessage::Discord(payload) = message else {
            return Err(DispatchError::WrongMessage {
                platform: Platform::Discord,
                got: message.platform(),
            });
        };

        let url = format!("{}/channels/{destination}/messages", self.api_url);
        debug!(platform = "discord", destination, "Sending message");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let (body, json) = read_body(response).await;

        if status.is_success() {
            return Ok(Ack {
                platform: Platform::Discord,
                destination: destination.to_string(),
                message_id: json
                    .as_ref()
                    .and_then(|j| j.get("id"))
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            });
        }

        let code = json.as_ref().and_then(|j| j.get("code")).and_then(Value::as_u64);

        warn!(
            platform = "discord",
            destination,
            status = %status,
            code = ?code,
            body = %body,
            "Discord API request failed"
        );

        Err(match status {
            StatusCode::UNAUTHORIZED => DispatchError::Unauthorized(body),
            StatusCode::TOO_MANY_REQUESTS => DispatchError::RateLimited {
                retry_after_secs: retry_after(&headers, json.as_ref()),
            },
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => DispatchError::InvalidDestination {
                destination: destination.to_string(),
                reason: body,
            },
            // A 400 is a rejected payload unless the code points at the channel.
            StatusCode::BAD_REQUEST if matches!(code, Some(UNKNOWN_CHANNEL | MISSING_ACCESS)) => {
                DispatchError::InvalidDestination {
                    destination: destination.to_string(),
                    reason: body,
                }
            }
            _ => DispatchError::Api {
                platform: Platform::Discord,
                status: status.as_u16(),
                body,
            },
        })
    }
}
