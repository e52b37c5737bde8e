//! Telegram messages in HTML parse mode.

use serde::Serialize;

use super::{render_links, truncate, AlertDetails, MessageFormatter, PlatformMessage, SeverityGroup};
use crate::config::{ChannelConfig, Platform};

/// Telegram rejects messages longer than this.
const MAX_MESSAGE: usize = 4096;

/// Longest single value before escaping.
const MAX_VALUE: usize = 512;

const MAX_TITLE: usize = 256;
const MAX_LABEL: usize = 64;

/// Room kept for the "N more alerts not shown" note.
const NOTE_RESERVE: usize = 64;

/// A line is dropped rather than squeezed below this many characters.
const MIN_LINE: usize = 16;

/// Body of a `sendMessage` call, minus the chat id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelegramMessage {
    pub text: String,
    pub parse_mode: String,
    pub disable_web_page_preview: bool,
}

/// One message per group, one paragraph per alert.
pub struct TelegramFormatter;

impl MessageFormatter for TelegramFormatter {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    fn format(&self, group: &SeverityGroup<'_>, _channel: &ChannelConfig) -> PlatformMessage {
        let mut text = format!(
            "<b>{}</b>\n<b>Environment</b>: {}\n<b>Severity</b>: {}",
            escape(&truncate(&group.title(), MAX_TITLE)),
            escape(&truncate(group.environment, MAX_LABEL)),
            escape(&truncate(group.severity, MAX_LABEL))
        );

        // Only the first paragraph is ever cut; later ones are dropped whole.
        let total = group.alerts.len();
        let reserve = if total > 1 { NOTE_RESERVE } else { 0 };
        for (index, alert) in group.alerts.iter().enumerate() {
            let room = MAX_MESSAGE.saturating_sub(text.chars().count() + 2 + reserve);
            let (para, complete) = paragraph(&AlertDetails::of(alert), room);

            if index > 0 && !complete {
                text.push_str(&format!("\n\n<i>{} more alerts not shown</i>", total - index));
                break;
            }
            text.push_str("\n\n");
            text.push_str(&para);
        }

        PlatformMessage::Telegram(TelegramMessage {
            text,
            parse_mode: "HTML".to_string(),
            disable_web_page_preview: true,
        })
    }
}

/// Render one alert in at most `budget` characters, markup included.
///
/// Values are cut before they are escaped so a tag or entity is never split.
/// The flag is false when the budget forced anything to be cut or left out.
fn paragraph(details: &AlertDetails, budget: usize) -> (String, bool) {
    let heading = truncate(&details.heading, MAX_VALUE);
    let mut complete = true;

    let escaped = escape(&heading);
    let heading = if escaped.chars().count() + 7 <= budget {
        escaped
    } else {
        complete = false;
        escape_within(&heading, budget.saturating_sub(7))
    };
    let mut text = format!("<b>{heading}</b>");
    let mut used = text.chars().count();

    for (title, value) in &details.lines {
        let prefix = format!("\n<b>{title}</b>: ");
        let room = budget.saturating_sub(used + prefix.chars().count());
        if room < MIN_LINE {
            complete = false;
            break;
        }

        let cut = truncate(value, MAX_VALUE);
        let mut rendered = render(&cut);
        if rendered.chars().count() > room {
            complete = false;
            rendered = escape_within(&cut, room);
        }

        used += prefix.chars().count() + rendered.chars().count();
        text.push_str(&prefix);
        text.push_str(&rendered);
    }

    (text, complete)
}

fn render(text: &str) -> String {
    render_links(text, escape, |url, label| {
        format!("<a href=\"{}\">{}</a>", escape_attr(url), escape(label))
    })
}

/// Escape the characters that are significant in Telegram's HTML subset.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape `text`, cutting it so the escaped form fits in `max` characters.
fn escape_within(text: &str, max: usize) -> String {
    let escaped = escape(text);
    if escaped.chars().count() <= max {
        return escaped;
    }
    if max == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    let mut buf = [0; 4];
    for c in text.chars() {
        let piece = escape(c.encode_utf8(&mut buf));
        let len = piece.chars().count();
        if used + len + 1 > max {
            break;
        }
        used += len;
        out.push_str(&piece);
    }
    out.push('…');
    out
}

fn escape_attr(text: &str) -> String {
    escape(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::tests::{alert, firing, resolved};

    fn channel() -> ChannelConfig {
        ChannelConfig {
            channel_id: "-1001234".to_string(),
            author: None,
        }
    }

    fn text(message: PlatformMessage) -> String {
        match message {
            PlatformMessage::Telegram(m) => {
                assert_eq!(m.parse_mode, "HTML");
                m.text
            }
            other => panic!("expected telegram message, got {other:?}"),
        }
    }

    #[test]
    fn test_message_layout() {
        let a = firing("HighLatency", "API slow");
        let b = resolved("HighLatency");
        let group = SeverityGroup {
            environment: "prod",
            severity: "critical",
            alerts: vec![&a, &b],
        };

        let text = text(TelegramFormatter.format(&group, &channel()));
        let paragraphs: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(paragraphs.len(), 3);
        assert_eq!(
            paragraphs[0],
            "<b>[FIRING:2] HighLatency</b>\n<b>Environment</b>: prod\n<b>Severity</b>: critical"
        );
        assert!(paragraphs[1].starts_with("<b>FIRING: API slow</b>"));
        assert!(paragraphs[1].contains("<b>Started</b>: 2024-05-01 10:00:00 UTC"));
        assert!(!paragraphs[1].contains("Resolved"));
        assert!(paragraphs[2].contains("<b>Resolved</b>: 2024-05-01 11:15:00 UTC"));
    }

    #[test]
    fn test_html_is_escaped_and_links_converted() {
        let a = alert(serde_json::json!({
            "status": "firing",
            "labels": {"alertname": "Queue<depth>"},
            "annotations": {"description": "a & b <https://grafana.local/d?x=1&y=2|dash>"},
            "startsAt": "2024-05-01T10:00:00Z"
        }));
        let group = SeverityGroup {
            environment: "prod",
            severity: "warning",
            alerts: vec![&a],
        };
        let text = text(TelegramFormatter.format(&group, &channel()));
        assert!(text.contains("<b>Alert</b>: Queue&lt;depth&gt;"));
        assert!(text.contains(
            "a &amp; b <a href=\"https://grafana.local/d?x=1&amp;y=2\">dash</a>"
        ));
    }

    #[test]
    fn test_long_batches_stay_under_limit() {
        let long = "x".repeat(400);
        let alerts: Vec<_> = (0..40).map(|_| firing("Flood", &long)).collect();
        let group = SeverityGroup {
            environment: "prod",
            severity: "warning",
            alerts: alerts.iter().collect(),
        };
        let text = text(TelegramFormatter.format(&group, &channel()));
        assert!(text.chars().count() <= MAX_MESSAGE);
        assert!(text.ends_with("more alerts not shown</i>"));
    }

    #[test]
    fn test_single_oversized_alert_stays_under_limit() {
        let long = "a&".repeat(300);
        let a = alert(serde_json::json!({
            "status": "firing",
            "labels": {
                "alertname": long,
                "severity": "critical",
                "hostname": long,
                "app": long,
                "log": long
            },
            "annotations": {
                "summary": long,
                "description": long,
                "info": long,
                "runbook_url": long
            },
            "startsAt": "2024-05-01T10:00:00Z"
        }));
        let group = SeverityGroup {
            environment: "prod",
            severity: "critical",
            alerts: vec![&a],
        };

        let text = text(TelegramFormatter.format(&group, &channel()));
        assert!(text.chars().count() <= MAX_MESSAGE);
        assert!(text.starts_with("<b>[FIRING] a&amp;"));
        // entities are never split
        let entities = text.matches("&amp;").count() + text.matches("&lt;").count() + text.matches("&gt;").count();
        assert_eq!(text.matches('&').count(), entities);
        assert_eq!(text.matches("<b>").count(), text.matches("</b>").count());
    }

    #[test]
    fn test_escape_within_keeps_entities_whole() {
        assert_eq!(escape_within("a<b", 10), "a&lt;b");
        assert_eq!(escape_within("a<b", 5), "a…");
        assert_eq!(escape_within("abc", 0), "");
    }
}
