//! Platform dispatchers.
//!
//! A dispatcher makes exactly one HTTP call per [`Dispatcher::send`]. There
//! are no retries here: Alertmanager re-delivers webhooks itself, and the
//! webhook response never reports dispatch failures.

pub mod discord;
pub mod slack;
pub mod telegram;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Serialize;
use serde_json::Value;

use crate::config::{Platform, PlatformConfig};
use crate::error::DispatchError;
use crate::format::PlatformMessage;

pub use discord::DiscordDispatcher;
pub use slack::SlackDispatcher;
pub use telegram::TelegramDispatcher;

/// Default bound on one outbound request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Confirmation that a platform accepted a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub platform: Platform,
    pub destination: String,
    /// Platform message id, when the API returns one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Sends formatted messages to one platform.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    fn platform(&self) -> Platform;

    /// Send one message to one destination.
    async fn send(&self, destination: &str, message: &PlatformMessage) -> Result<Ack, DispatchError>;
}

/// Build the shared HTTP client; every request it makes carries `timeout`.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, DispatchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("alert-relay/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DispatchError::Http)
}

/// Create the dispatcher for a configured platform.
#[must_use]
pub fn dispatcher_for(platform: &PlatformConfig, client: reqwest::Client) -> Arc<dyn Dispatcher> {
    let api_url = platform.api_url.clone();
    let token = platform.token.clone();
    match platform.kind {
        Platform::Discord => Arc::new(DiscordDispatcher::new(client, api_url, token)),
        Platform::Slack => Arc::new(SlackDispatcher::new(client, api_url, token)),
        Platform::Telegram => Arc::new(TelegramDispatcher::new(client, api_url, token)),
    }
}

/// Rate-limit delay from a JSON body (`retry_after` or
/// `parameters.retry_after`) or the `Retry-After` header.
pub(crate) fn retry_after(headers: &HeaderMap, body: Option<&Value>) -> Option<f64> {
    body.and_then(|b| {
        b.get("retry_after")
            .or_else(|| b.pointer("/parameters/retry_after"))
            .and_then(Value::as_f64)
    })
    .or_else(|| {
        headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}

/// Response body as text plus its JSON form, if it is JSON.
pub(crate) async fn read_body(response: reqwest::Response) -> (String, Option<Value>) {
    let body = response.text().await.unwrap_or_default();
    let json = serde_json::from_str(&body).ok();
    (body, json)
}
