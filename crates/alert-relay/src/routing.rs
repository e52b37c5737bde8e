//! Route selection: (platform, environment, severity) → destination.

use crate::config::{ChannelConfig, PlatformConfig};

/// Result of a route lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// A destination is configured for the pair
    Channel(&'a ChannelConfig),
    /// Nothing configured; the platform is skipped for this pair
    NotConfigured,
}

impl<'a> Route<'a> {
    #[must_use]
    pub const fn channel(self) -> Option<&'a ChannelConfig> {
        match self {
            Self::Channel(channel) => Some(channel),
            Self::NotConfigured => None,
        }
    }
}

/// Look up the destination for an environment and severity on one platform.
///
/// Both keys are matched exactly; `Critical` does not match `critical`.
#[must_use]
pub fn select<'a>(platform: &'a PlatformConfig, environment: &str, severity: &str) -> Route<'a> {
    platform
        .environments
        .get(environment)
        .and_then(|routes| routes.get(severity))
        .map_or(Route::NotConfigured, Route::Channel)
}
