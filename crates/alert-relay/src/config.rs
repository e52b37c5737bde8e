//! Routing configuration.
//!
//! The YAML file is parsed into private raw structs and then validated into
//! [`Config`]. A `Config` that exists has passed validation, and it is never
//! mutated afterwards; the server shares it behind an `Arc`.
//!
//! ```yaml
//! discord:
//!   bot_token: "..."
//!   environments:
//!     prod:
//!       critical:
//!         channel_id: 123
//!         author: { name: Prometheus, icon_url: "https://..." }
//! telegram:
//!   bot_token: "..."
//!   environments:
//!     prod:
//!       critical: { chat_id: -1001234 }
//! valid_environments: [prod, test]
//! default_environment: prod
//! environment_mapping:
//!   us-east-1: prod
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;

/// Label keys checked (in order) for the environment source identifier.
const DEFAULT_SOURCE_LABELS: &[&str] = &["environment", "region", "cluster"];

/// Alerts that are dropped before routing.
const DEFAULT_IGNORED_ALERTS: &[&str] = &["Watchdog"];

/// Supported notification platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Discord,
    Slack,
    Telegram,
}

impl Platform {
    /// All platforms, in dispatch-registration order.
    pub const ALL: [Platform; 3] = [Self::Discord, Self::Slack, Self::Telegram];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Slack => "slack",
            Self::Telegram => "telegram",
        }
    }

    /// Public API endpoint used when no `api_url` override is configured.
    #[must_use]
    pub const fn default_api_url(&self) -> &'static str {
        match self {
            Self::Discord => "https://discord.com/api/v10",
            Self::Slack => "https://slack.com/api",
            Self::Telegram => "https://api.telegram.org",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author block shown on rich-embed platforms.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// One (environment, severity) destination on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChannelConfig {
    /// Channel id (Discord, Slack) or chat id (Telegram)
    #[serde(alias = "chat_id", deserialize_with = "deserialize_id")]
    pub channel_id: String,
    /// Display metadata, only used by Discord
    #[serde(default)]
    pub author: Option<Author>,
}

/// Severity name → destination.
pub type SeverityRouteSet = BTreeMap<String, ChannelConfig>;

/// Validated settings for one platform.
#[derive(Clone)]
pub struct PlatformConfig {
    pub kind: Platform,
    /// Bot token (Discord, Telegram) or API token (Slack)
    pub token: String,
    /// API base URL; the platform default when not overridden
    pub api_url: String,
    /// Environment name → severity routes
    pub environments: BTreeMap<String, SeverityRouteSet>,
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("kind", &self.kind)
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("environments", &self.environments)
            .finish()
    }
}

/// Immutable, validated routing configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Configured platforms, in [`Platform::ALL`] order
    pub platforms: Vec<PlatformConfig>,
    pub valid_environments: BTreeSet<String>,
    pub default_environment: String,
    /// Source identifier (label value) → environment name
    pub environment_mapping: BTreeMap<String, String>,
    /// Label keys that carry the source identifier, most specific first
    pub source_labels: Vec<String>,
    /// Alert names that are never forwarded
    pub ignored_alerts: Vec<String>,
}

impl Config {
    /// Read and validate a YAML config file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config = Self::from_yaml_str(&content)?;
        info!(
            path = %path.display(),
            platforms = ?config.platforms.iter().map(|p| p.kind.as_str()).collect::<Vec<_>>(),
            environments = config.valid_environments.len(),
            "Loaded routing config"
        );
        Ok(config)
    }

    /// Parse and validate YAML config text.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(content)?;
        Self::try_from(raw)
    }

    /// Look up the settings for one platform, if it is configured.
    #[must_use]
    pub fn platform(&self, kind: Platform) -> Option<&PlatformConfig> {
        self.platforms.iter().find(|p| p.kind == kind)
    }

    #[must_use]
    pub fn is_valid_environment(&self, name: &str) -> bool {
        self.valid_environments.contains(name)
    }

    #[must_use]
    pub fn is_ignored(&self, alert_name: &str) -> bool {
        self.ignored_alerts.iter().any(|a| a == alert_name)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    discord: Option<RawPlatform>,
    #[serde(default)]
    slack: Option<RawPlatform>,
    #[serde(default)]
    telegram: Option<RawPlatform>,
    valid_environments: Vec<String>,
    default_environment: String,
    #[serde(default)]
    environment_mapping: BTreeMap<String, String>,
    #[serde(default)]
    source_labels: Option<Vec<String>>,
    #[serde(default)]
    ignored_alerts: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawPlatform {
    #[serde(alias = "token")]
    bot_token: String,
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    environments: BTreeMap<String, SeverityRouteSet>,
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let valid_environments: BTreeSet<String> = raw.valid_environments.into_iter().collect();
        if valid_environments.is_empty() {
            return Err(ConfigError::NoEnvironments);
        }

        if !valid_environments.contains(&raw.default_environment) {
            return Err(ConfigError::InvalidDefaultEnvironment(
                raw.default_environment,
            ));
        }

        for (source_label, environment) in &raw.environment_mapping {
            if !valid_environments.contains(environment) {
                return Err(ConfigError::InvalidMappedEnvironment {
                    source_label: source_label.clone(),
                    environment: environment.clone(),
                });
            }
        }

        let sections = [
            (Platform::Discord, raw.discord),
            (Platform::Slack, raw.slack),
            (Platform::Telegram, raw.telegram),
        ];

        let mut platforms = Vec::new();
        for (kind, section) in sections {
            let Some(section) = section else {
                debug!(platform = %kind, "Platform not configured");
                continue;
            };
            platforms.push(validate_platform(kind, section, &valid_environments)?);
        }

        if platforms.is_empty() {
            return Err(ConfigError::NoPlatforms);
        }

        let source_labels = raw.source_labels.unwrap_or_else(|| {
            DEFAULT_SOURCE_LABELS
                .iter()
                .map(ToString::to_string)
                .collect()
        });
        let ignored_alerts = raw.ignored_alerts.unwrap_or_else(|| {
            DEFAULT_IGNORED_ALERTS
                .iter()
                .map(ToString::to_string)
                .collect()
        });

        Ok(Self {
            platforms,
            valid_environments,
            default_environment: raw.default_environment,
            environment_mapping: raw.environment_mapping,
            source_labels,
            ignored_alerts,
        })
    }
}

fn validate_platform(
    kind: Platform,
    section: RawPlatform,
    valid_environments: &BTreeSet<String>,
) -> Result<PlatformConfig, ConfigError> {
    if section.bot_token.trim().is_empty() {
        return Err(ConfigError::MissingCredential(kind));
    }

    for (environment, routes) in &section.environments {
        if !valid_environments.contains(environment) {
            return Err(ConfigError::UnknownRouteEnvironment {
                platform: kind,
                environment: environment.clone(),
            });
        }
        for (severity, channel) in routes {
            if channel.channel_id.trim().is_empty() {
                return Err(ConfigError::MissingChannelId {
                    platform: kind,
                    environment: environment.clone(),
                    severity: severity.clone(),
                });
            }
        }
    }

    let api_url = match section.api_url {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            url.trim_end_matches('/').to_string()
        }
        Some(url) => return Err(ConfigError::InvalidApiUrl { platform: kind, url }),
        None => kind.default_api_url().to_string(),
    };

    Ok(PlatformConfig {
        kind,
        token: section.bot_token,
        api_url,
        environments: section.environments,
    })
}

/// Channel ids are numeric on Discord and Telegram; accept YAML numbers and strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Signed(n) => n.to_string(),
        Id::Unsigned(n) => n.to_string(),
    })
}
