//! Alertmanager webhook relay for Discord, Slack and Telegram.
//!
//! Alertmanager posts alert batches to the relay; each batch is split by
//! environment and severity, routed to the channels configured for every
//! platform, formatted in the platform's markup and sent.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use alert_relay::{dispatch, server, Config, NotificationPipeline};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Arc::new(Config::load("config.yml".as_ref()).await?);
//! let pipeline = NotificationPipeline::new(config, dispatch::DEFAULT_TIMEOUT)?;
//! let router = server::build_router(Arc::new(pipeline));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8090").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`environment`] maps a source label (region, cluster, ...) to an environment
//! - [`routing`] picks the destination for (platform, environment, severity)
//! - [`format`] renders one message per severity group and platform
//! - [`dispatch`] sends it, one [`Dispatcher`] per platform
//! - [`NotificationPipeline`] ties them together for each webhook call
//!
//! Dispatch failures never fail the webhook: Alertmanager always gets
//! `{"status":"ok"}` for a well-formed body.

pub mod alert;
pub mod config;
pub mod dispatch;
pub mod environment;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod routing;
pub mod server;

pub use alert::{Alert, AlertGroup, AlertStatus};
pub use config::{ChannelConfig, Config, Platform, PlatformConfig};
pub use dispatch::{Ack, Dispatcher};
pub use error::{ConfigError, DispatchError, PipelineError};
pub use format::{MessageFormatter, PlatformMessage, SeverityGroup};
pub use pipeline::{NotificationPipeline, OutcomeStatus, PipelineResult};
pub use routing::Route;
