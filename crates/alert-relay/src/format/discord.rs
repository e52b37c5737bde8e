//! Discord rich embeds.

use serde::Serialize;

use super::{render_links, truncate, AlertDetails, MessageFormatter, PlatformMessage, SeverityGroup};
use crate::config::{ChannelConfig, Platform};

// Discord API limits
const MAX_TITLE: usize = 256;
const MAX_DESCRIPTION: usize = 4096;
const MAX_FIELDS: usize = 25;
const MAX_FIELD_NAME: usize = 256;
const MAX_FIELD_VALUE: usize = 1024;
const MAX_LABEL: usize = 64;
/// Combined length of title, description, author and fields.
const MAX_EMBED: usize = 6000;

/// Room kept for the "N more alerts not shown" note.
const NOTE_RESERVE: usize = 64;

/// Body of a Discord create-message request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscordMessage {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// One embed per group, one field per alert.
pub struct DiscordFormatter;

impl MessageFormatter for DiscordFormatter {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    fn format(&self, group: &SeverityGroup<'_>, channel: &ChannelConfig) -> PlatformMessage {
        let mut description = format!(
            "**Environment**: {}\n**Severity**: {}",
            escape(&truncate(group.environment, MAX_LABEL)),
            escape(&truncate(group.severity, MAX_LABEL))
        );
        let title = truncate(&group.title(), MAX_TITLE);
        let author = channel.author.as_ref().map(|author| EmbedAuthor {
            name: truncate(&author.name, MAX_TITLE),
            icon_url: author.icon_url.clone(),
        });

        let mut used = title.chars().count()
            + description.chars().count()
            + author.as_ref().map_or(0, |a| a.name.chars().count());
        let budget = MAX_EMBED - NOTE_RESERVE;

        let mut fields = Vec::new();
        for alert in group.alerts.iter().take(MAX_FIELDS) {
            let field = field(&AlertDetails::of(alert));
            let size = field.name.chars().count() + field.value.chars().count();
            if used + size > budget {
                break;
            }
            used += size;
            fields.push(field);
        }

        let hidden = group.alerts.len() - fields.len();
        if hidden > 0 {
            description.push_str(&format!("\n*{hidden} more alerts not shown*"));
        }

        let embed = Embed {
            title,
            kind: "rich".to_string(),
            description: truncate(&description, MAX_DESCRIPTION),
            color: group.color(),
            author,
            fields,
            timestamp: group.latest_event().map(|t| t.to_rfc3339()),
        };

        PlatformMessage::Discord(DiscordMessage {
            embeds: vec![embed],
        })
    }
}

fn field(details: &AlertDetails) -> EmbedField {
    let value = details
        .lines
        .iter()
        .map(|(title, value)| format!("**{title}**: {}", render(value)))
        .collect::<Vec<_>>()
        .join("\n");

    EmbedField {
        name: truncate(&details.heading, MAX_FIELD_NAME),
        value: truncate(&value, MAX_FIELD_VALUE),
        inline: false,
    }
}

fn render(text: &str) -> String {
    render_links(text, escape, |url, label| format!("[{}]({url})", escape(label)))
}

/// Backslash-escape Discord markdown control characters.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '~' | '`' | '|' | '[' | ']' | '#' | '>') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
