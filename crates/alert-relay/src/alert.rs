//! Alertmanager webhook types.
//!
//! Reference: <https://prometheus.io/docs/alerting/latest/configuration/#webhook_config>

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Alert status as reported by Alertmanager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl AlertStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Firing => "FIRING",
            Self::Resolved => "RESOLVED",
        }
    }
}

/// Alertmanager webhook payload: one group of alerts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertGroup {
    /// Version of the payload format
    #[serde(default)]
    pub version: String,
    /// Unique identifier for this group of alerts
    #[serde(default)]
    pub group_key: String,
    /// Status of the group as a whole
    pub status: AlertStatus,
    /// Receiver that matched this group
    #[serde(default)]
    pub receiver: String,
    /// Labels used to group the alerts
    #[serde(default)]
    pub group_labels: HashMap<String, String>,
    /// Labels common to all alerts
    #[serde(default)]
    pub common_labels: HashMap<String, String>,
    /// Annotations common to all alerts
    #[serde(default)]
    pub common_annotations: HashMap<String, String>,
    /// External URL for Alertmanager
    #[serde(default, rename = "externalURL")]
    pub external_url: String,
    /// Alerts in this notification
    pub alerts: Vec<Alert>,
}

impl AlertGroup {
    /// Look up a label, preferring the group labels over the common labels.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.group_labels
            .get(key)
            .or_else(|| self.common_labels.get(key))
            .map(String::as_str)
    }
}

/// Individual alert from Alertmanager.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub status: AlertStatus,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub starts_at: DateTime<Utc>,
    /// Zero time (`0001-01-01T00:00:00Z`) while the alert is still firing
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl Alert {
    /// Get the alert name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.labels.get("alertname").map_or("unknown", String::as_str)
    }

    /// Get the severity label, if any.
    #[must_use]
    pub fn severity(&self) -> Option<&str> {
        self.labels.get("severity").map(String::as_str)
    }

    #[must_use]
    pub fn is_firing(&self) -> bool {
        self.status == AlertStatus::Firing
    }

    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The host the alert is about, with the label it came from.
    #[must_use]
    pub fn host(&self) -> Option<(&'static str, &str)> {
        [
            ("hostname", "Hostname"),
            ("nodename", "Instance"),
            ("node", "Node"),
            ("instance", "Instance"),
        ]
        .into_iter()
        .find_map(|(key, title)| self.label(key).map(|value| (title, value)))
    }

    /// End time, only for resolved alerts.
    #[must_use]
    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            AlertStatus::Resolved => self.ends_at.filter(|end| *end >= self.starts_at),
            AlertStatus::Firing => None,
        }
    }
}
