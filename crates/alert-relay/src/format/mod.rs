//! Message formatting per platform.
//!
//! Alerts of one batch are partitioned into [`SeverityGroup`]s and each group
//! becomes one outbound message per platform. Formatting is pure: the same
//! group and channel always produce the same message, because every timestamp
//! in the output comes from the alerts themselves.

pub mod discord;
pub mod slack;
pub mod telegram;

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::alert::{Alert, AlertStatus};
use crate::config::{ChannelConfig, Platform};

pub use discord::{DiscordFormatter, DiscordMessage};
pub use slack::{SlackFormatter, SlackMessage};
pub use telegram::{TelegramFormatter, TelegramMessage};

/// Slack-style link markup, `<https://url|label>`, as used in alert annotations.
static LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(https?://[^|>\s]+)\|([^>]*)>").unwrap());

const COLOR_CRITICAL: u32 = 0x00e0_1e5a; // Red
const COLOR_WARNING: u32 = 0x00ec_b22e; // Yellow
const COLOR_INFO: u32 = 0x0036_c5f0; // Blue
const COLOR_RESOLVED: u32 = 0x002e_b67d; // Green

/// Alerts of one batch that share an environment and a severity.
#[derive(Debug, Clone)]
pub struct SeverityGroup<'a> {
    pub environment: &'a str,
    pub severity: &'a str,
    /// In the order they appeared in the webhook payload
    pub alerts: Vec<&'a Alert>,
}

impl SeverityGroup<'_> {
    /// Firing if any alert in the group is still firing.
    #[must_use]
    pub fn status(&self) -> AlertStatus {
        if self.alerts.iter().any(|a| a.is_firing()) {
            AlertStatus::Firing
        } else {
            AlertStatus::Resolved
        }
    }

    /// The shared alert name, or a count when the group mixes alert names.
    #[must_use]
    pub fn alert_name(&self) -> String {
        let mut names = self.alerts.iter().map(|a| a.name());
        match names.next() {
            Some(first) if names.all(|n| n == first) => first.to_string(),
            _ => format!("{} alerts", self.alerts.len()),
        }
    }

    /// Message title, e.g. `[FIRING:3] HighLatency`.
    #[must_use]
    pub fn title(&self) -> String {
        let status = self.status().label();
        match self.alerts.len() {
            1 => format!("[{status}] {}", self.alert_name()),
            n => format!("[{status}:{n}] {}", self.alert_name()),
        }
    }

    /// Side-bar colour keyed by status and severity.
    #[must_use]
    pub fn color(&self) -> u32 {
        match (self.status(), self.severity) {
            (AlertStatus::Resolved, _) => COLOR_RESOLVED,
            (AlertStatus::Firing, "critical") => COLOR_CRITICAL,
            (AlertStatus::Firing, "info") => COLOR_INFO,
            (AlertStatus::Firing, _) => COLOR_WARNING,
        }
    }

    /// Most recent event time in the group (start or resolution).
    #[must_use]
    pub fn latest_event(&self) -> Option<DateTime<Utc>> {
        self.alerts
            .iter()
            .map(|a| a.resolved_at().unwrap_or(a.starts_at))
            .max()
    }
}

/// A formatted message, ready for one platform's dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PlatformMessage {
    Discord(DiscordMessage),
    Slack(SlackMessage),
    Telegram(TelegramMessage),
}

impl PlatformMessage {
    #[must_use]
    pub const fn platform(&self) -> Platform {
        match self {
            Self::Discord(_) => Platform::Discord,
            Self::Slack(_) => Platform::Slack,
            Self::Telegram(_) => Platform::Telegram,
        }
    }
}

/// Turns a severity group into one platform's message.
pub trait MessageFormatter: Send + Sync {
    fn platform(&self) -> Platform;

    fn format(&self, group: &SeverityGroup<'_>, channel: &ChannelConfig) -> PlatformMessage;
}

/// The formatter for a platform.
#[must_use]
pub fn formatter_for(platform: Platform) -> &'static dyn MessageFormatter {
    match platform {
        Platform::Discord => &DiscordFormatter,
        Platform::Slack => &SlackFormatter,
        Platform::Telegram => &TelegramFormatter,
    }
}

/// Format a group for a platform.
#[must_use]
pub fn format(group: &SeverityGroup<'_>, platform: Platform, channel: &ChannelConfig) -> PlatformMessage {
    formatter_for(platform).format(group, channel)
}

/// Per-alert content shared by all formatters, still unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AlertDetails {
    /// `FIRING: <summary>`, or the alert name when there is no summary
    pub heading: String,
    pub lines: Vec<(&'static str, String)>,
}

impl AlertDetails {
    pub(crate) fn of(alert: &Alert) -> Self {
        let heading = format!(
            "{}: {}",
            alert.status.label(),
            alert.annotation("summary").unwrap_or_else(|| alert.name())
        );

        let mut lines = vec![("Alert", alert.name().to_string())];

        for (key, title) in [
            ("description", "Description"),
            ("info", "Info"),
            ("runbook_url", "Runbook URL"),
        ] {
            if let Some(value) = alert.annotation(key) {
                lines.push((title, value.to_string()));
            }
        }

        if let Some((title, host)) = alert.host() {
            lines.push((title, host.to_string()));
        }
        if let Some(app) = alert.label("app") {
            lines.push(("App", app.to_string()));
        }
        if let Some(log) = alert.label("log") {
            lines.push(("Log", log.to_string()));
        }

        lines.push(("Started", format_time(alert.starts_at)));
        if let Some(ended) = alert.resolved_at() {
            lines.push(("Resolved", format_time(ended)));
            let secs = (ended - alert.starts_at).num_seconds().max(0);
            lines.push(("Duration", format_duration(secs as u64)));
        }

        Self { heading, lines }
    }
}

pub(crate) fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Format seconds into a human-readable duration.
pub(crate) fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        let mins = secs / 60;
        let remaining_secs = secs % 60;
        if remaining_secs == 0 {
            format!("{mins}m")
        } else {
            format!("{mins}m {remaining_secs}s")
        }
    } else {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins == 0 {
            format!("{hours}h")
        } else {
            format!("{hours}h {mins}m")
        }
    }
}

/// Rewrite Slack-style links with `link`, escaping everything else with `escape`.
pub(crate) fn render_links(
    text: &str,
    escape: impl Fn(&str) -> String,
    link: impl Fn(&str, &str) -> String,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in LINK_PATTERN.captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always matches");
        out.push_str(&escape(&text[last..whole.start()]));
        out.push_str(&link(&caps[1], &caps[2]));
        last = whole.end();
    }
    out.push_str(&escape(&text[last..]));
    out
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
