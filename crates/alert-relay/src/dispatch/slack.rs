//! Slack Web API dispatcher.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{read_body, retry_after, Ack, Dispatcher};
use crate::config::Platform;
use crate::error::DispatchError;
use crate::format::{PlatformMessage, SlackMessage};

/// Posts attachments through `chat.postMessage` with a bearer token.
pub struct SlackDispatcher {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    #[serde(flatten)]
    message: &'a SlackMessage,
}

impl SlackDispatcher {
    #[must_use]
    pub fn new(client: reqwest::Client, api_url: String, token: String) -> Self {
        Self {
            client,
            api_url,
            token,
        }
    }
}

#[async_trait]
impl Dispatcher for SlackDispatcher {
    fn platform(&self) -> Platform {
        Platform::Slack
    }

    async fn send(&self, destination: &str, message: &PlatformMessage) -> Result<Ack, DispatchError> {
        let PlatformMessage::Slack(payload) = message else {
            return Err(DispatchError::WrongMessage {
                platform: Platform::Slack,
                got: message.platform(),
            });
        };

        let url = format!("{}/chat.postMessage", self.api_url);
        debug!(platform = "slack", destination, "Sending message");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&PostMessage {
                channel: destination,
                message: payload,
            })
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let (body, json) = read_body(response).await;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DispatchError::RateLimited {
                retry_after_secs: retry_after(&headers, json.as_ref()),
            });
        }

        // Slack answers 200 with `ok: false` for most API errors.
        let ok = json
            .as_ref()
            .and_then(|j| j.get("ok"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if status.is_success() && ok {
            return Ok(Ack {
                platform: Platform::Slack,
                destination: destination.to_string(),
                message_id: json
                    .as_ref()
                    .and_then(|j| j.get("ts"))
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            });
        }

        let error = json
            .as_ref()
            .and_then(|j| j.get("error"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        warn!(
            platform = "slack",
            destination,
            status = %status,
            error = %error,
            "Slack API request failed"
        );

        Err(match error.as_str() {
            "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked" | "token_expired" => {
                DispatchError::Unauthorized(error)
            }
            "ratelimited" => DispatchError::RateLimited {
                retry_after_secs: retry_after(&headers, json.as_ref()),
            },
            "channel_not_found" | "not_in_channel" | "is_archived" => {
                DispatchError::InvalidDestination {
                    destination: destination.to_string(),
                    reason: error,
                }
            }
            _ => DispatchError::Api {
                platform: Platform::Slack,
                status: status.as_u16(),
                body,
            },
        })
    }
}
