//! Environment resolution from alert source labels.

use tracing::debug;

use crate::alert::{Alert, AlertGroup};
use crate::config::Config;

/// Map a source identifier to an environment name.
///
/// Mapped identifiers win. An unmapped identifier that already names a valid
/// environment is used as is; anything else falls back to
/// `default_environment`.
#[must_use]
pub fn resolve<'a>(source: Option<&str>, config: &'a Config) -> &'a str {
    let Some(source) = source else {
        debug!(
            environment = %config.default_environment,
            "No source label, using default environment"
        );
        return &config.default_environment;
    };

    if let Some(environment) = config.environment_mapping.get(source) {
        environment
    } else if let Some(environment) = config.valid_environments.get(source) {
        environment
    } else {
        debug!(
            source,
            environment = %config.default_environment,
            "Unmapped source label, using default environment"
        );
        &config.default_environment
    }
}

/// Find the source identifier for an alert.
///
/// Each key in `source_labels` is tried in order, first on the alert's own
/// labels and then on the group's labels.
#[must_use]
pub fn source_value<'a>(alert: &'a Alert, group: &'a AlertGroup, config: &Config) -> Option<&'a str> {
    config.source_labels.iter().find_map(|key| {
        alert
            .label(key)
            .or_else(|| group.label(key).filter(|v| !v.is_empty()))
    })
}
