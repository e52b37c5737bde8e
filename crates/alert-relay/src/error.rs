//! Error types for the relay.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::Platform;

/// Errors raised while loading or validating the routing configuration.
///
/// All of these are fatal: the process refuses to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML or does not match the schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// None of `discord`, `slack` or `telegram` is present
    #[error("no notification platform configured (expected at least one of discord, slack, telegram)")]
    NoPlatforms,

    /// A platform section has an empty token
    #[error("missing credential for {0}")]
    MissingCredential(Platform),

    /// `valid_environments` is empty
    #[error("valid_environments must contain at least one environment")]
    NoEnvironments,

    /// `default_environment` is not listed in `valid_environments`
    #[error("default_environment '{0}' is not in valid_environments")]
    InvalidDefaultEnvironment(String),

    /// An `environment_mapping` entry points at an unknown environment
    #[error("environment_mapping '{source_label}' maps to unknown environment '{environment}'")]
    InvalidMappedEnvironment {
        source_label: String,
        environment: String,
    },

    /// A platform routes an environment that is not in `valid_environments`
    #[error("{platform} routes unknown environment '{environment}'")]
    UnknownRouteEnvironment {
        platform: Platform,
        environment: String,
    },

    /// A route has an empty channel id
    #[error("{platform} route {environment}.{severity} has an empty channel_id")]
    MissingChannelId {
        platform: Platform,
        environment: String,
        severity: String,
    },

    /// An `api_url` override is not an absolute http(s) URL
    #[error("{platform} api_url '{url}' must start with http:// or https://")]
    InvalidApiUrl { platform: Platform, url: String },
}

/// Errors returned by a single dispatch attempt to a chat platform.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request did not complete within the client timeout
    #[error("request timed out")]
    Timeout,

    /// The platform rejected the credential
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// Rate limited by the platform
    #[error("rate limited{}", retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<f64> },

    /// The channel or chat id was rejected
    #[error("invalid destination '{destination}': {reason}")]
    InvalidDestination { destination: String, reason: String },

    /// Any other non-success answer from the platform
    #[error("{platform} API returned {status}: {body}")]
    Api {
        platform: Platform,
        status: u16,
        body: String,
    },

    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// The message was formatted for a different platform
    #[error("{platform} dispatcher cannot send a {got} message")]
    WrongMessage { platform: Platform, got: Platform },
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// Per-pair failures recorded by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The resolved environment is not one of `valid_environments`
    #[error("resolved environment '{0}' is not a valid environment")]
    InvalidEnvironment(String),

    /// A platform is configured but no dispatcher was registered for it
    #[error("no dispatcher registered for {0}")]
    NoDispatcher(Platform),

    /// Sending failed
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The platform task panicked or was cancelled
    #[error("dispatch task aborted: {0}")]
    TaskAborted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_message() {
        let err = DispatchError::RateLimited {
            retry_after_secs: Some(1.5),
        };
        assert_eq!(err.to_string(), "rate limited, retry after 1.5s");

        let err = DispatchError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "rate limited");
    }

    #[test]
    fn test_config_error_names_platform() {
        let err = ConfigError::MissingChannelId {
            platform: Platform::Telegram,
            environment: "prod".to_string(),
            severity: "critical".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "telegram route prod.critical has an empty channel_id"
        );
    }
}
