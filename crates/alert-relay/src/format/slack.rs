//! Slack attachments with mrkdwn text.

use serde::Serialize;

use super::{render_links, AlertDetails, MessageFormatter, PlatformMessage, SeverityGroup};
use crate::config::{ChannelConfig, Platform};

/// Body of a `chat.postMessage` call, minus the channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackMessage {
    /// Plain fallback shown in notifications
    pub text: String,
    pub attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackAttachment {
    pub fallback: String,
    pub color: String,
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SlackField>,
    pub mrkdwn_in: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

/// One attachment per group, one paragraph per alert.
pub struct SlackFormatter;

impl MessageFormatter for SlackFormatter {
    fn platform(&self) -> Platform {
        Platform::Slack
    }

    fn format(&self, group: &SeverityGroup<'_>, _channel: &ChannelConfig) -> PlatformMessage {
        let title = group.title();

        let text = group
            .alerts
            .iter()
            .map(|alert| paragraph(&AlertDetails::of(alert)))
            .collect::<Vec<_>>()
            .join("\n\n");

        let attachment = SlackAttachment {
            fallback: escape(&title),
            color: format!("#{:06X}", group.color()),
            title: escape(&title),
            text,
            fields: vec![
                SlackField {
                    title: "Environment".to_string(),
                    value: escape(group.environment),
                    short: true,
                },
                SlackField {
                    title: "Severity".to_string(),
                    value: escape(group.severity),
                    short: true,
                },
            ],
            mrkdwn_in: vec!["text".to_string()],
            footer: Some(format!(
                "{} | {}",
                escape(group.environment),
                escape(group.severity)
            )),
            ts: group.latest_event().map(|t| t.timestamp()),
        };

        PlatformMessage::Slack(SlackMessage {
            text: escape(&title),
            attachments: vec![attachment],
        })
    }
}

fn paragraph(details: &AlertDetails) -> String {
    let mut lines = vec![format!("*{}*", escape(&details.heading))];
    lines.extend(
        details
            .lines
            .iter()
            .map(|(title, value)| format!("*{title}*: {}", render(value))),
    );
    lines.join("\n")
}

/// Slack links are kept as-is; everything else is entity-escaped.
fn render(text: &str) -> String {
    render_links(text, escape, |url, label| format!("<{url}|{}>", escape(label)))
}

/// Slack only requires `&`, `<` and `>` to be escaped in message text.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
