//! Per-webhook orchestration: resolve, route, format, dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::alert::AlertGroup;
use crate::config::{Config, Platform};
use crate::dispatch::{self, Ack, Dispatcher};
use crate::environment;
use crate::error::{DispatchError, PipelineError};
use crate::format::{self, SeverityGroup};
use crate::routing::{self, Route};

/// Severity used when neither the alert nor the request path carries one.
pub const UNKNOWN_SEVERITY: &str = "unknown";

/// What happened to one (platform, environment, severity) pair.
#[derive(Debug)]
pub enum OutcomeStatus {
    Sent(Ack),
    /// No route configured for the pair
    Skipped,
    Failed(PipelineError),
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub platform: Platform,
    pub environment: String,
    pub severity: String,
    /// Number of alerts in the formatted message
    pub alerts: usize,
    pub status: OutcomeStatus,
}

/// Aggregated outcome of one webhook call.
#[derive(Debug, Default)]
pub struct PipelineResult {
    pub outcomes: Vec<DispatchOutcome>,
    /// Alerts dropped by `ignored_alerts`
    pub ignored: usize,
}

/// Counts for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PipelineResult {
    #[must_use]
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for outcome in &self.outcomes {
            match outcome.status {
                OutcomeStatus::Sent(_) => summary.sent += 1,
                OutcomeStatus::Skipped => summary.skipped += 1,
                OutcomeStatus::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// Outcomes for one platform, in severity-group order.
    pub fn for_platform(&self, platform: Platform) -> impl Iterator<Item = &DispatchOutcome> {
        self.outcomes.iter().filter(move |o| o.platform == platform)
    }
}

/// Alerts of the batch sharing an environment and severity, by index.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Partition {
    environment: String,
    severity: String,
    indices: Vec<usize>,
}

impl Partition {
    fn group<'a>(&'a self, batch: &'a AlertGroup) -> SeverityGroup<'a> {
        SeverityGroup {
            environment: &self.environment,
            severity: &self.severity,
            alerts: self.indices.iter().map(|&i| &batch.alerts[i]).collect(),
        }
    }
}

/// Routes webhook batches to every configured platform.
///
/// Holds the immutable config and one dispatcher per platform; cheap to
/// share behind an `Arc` across concurrent requests.
pub struct NotificationPipeline {
    config: Arc<Config>,
    dispatchers: HashMap<Platform, Arc<dyn Dispatcher>>,
}

impl NotificationPipeline {
    /// Build HTTP dispatchers for every configured platform.
    pub fn new(config: Arc<Config>, timeout: Duration) -> Result<Self, DispatchError> {
        let client = dispatch::build_client(timeout)?;
        let dispatchers = config
            .platforms
            .iter()
            .map(|platform| dispatch::dispatcher_for(platform, client.clone()))
            .collect();
        Ok(Self::with_dispatchers(config, dispatchers))
    }

    /// Use specific dispatchers (one per platform; later entries win).
    #[must_use]
    pub fn with_dispatchers(config: Arc<Config>, dispatchers: Vec<Arc<dyn Dispatcher>>) -> Self {
        let dispatchers = dispatchers
            .into_iter()
            .map(|d| (d.platform(), d))
            .collect();
        Self {
            config,
            dispatchers,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Forward one webhook batch.
    ///
    /// `path_severity` is the severity carried in the request path, used for
    /// alerts without a `severity` label. Platforms are dispatched
    /// concurrently on spawned tasks, so in-flight sends finish even if the
    /// caller stops waiting.
    pub async fn handle(&self, batch: AlertGroup, path_severity: Option<&str>) -> PipelineResult {
        let (partitions, ignored) = partition(&batch, &self.config, path_severity);

        if partitions.is_empty() {
            debug!(ignored, "No alerts to forward");
            return PipelineResult {
                outcomes: Vec::new(),
                ignored,
            };
        }

        let batch = Arc::new(batch);
        let partitions = Arc::new(partitions);

        let tasks: Vec<_> = self
            .config
            .platforms
            .iter()
            .map(|platform| {
                let kind = platform.kind;
                let task = tokio::spawn(run_platform(
                    kind,
                    Arc::clone(&self.config),
                    self.dispatchers.get(&kind).cloned(),
                    Arc::clone(&batch),
                    Arc::clone(&partitions),
                ));
                (kind, task)
            })
            .collect();

        let (kinds, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let joined = futures::future::join_all(handles).await;

        let mut outcomes = Vec::new();
        for (kind, result) in kinds.into_iter().zip(joined) {
            match result {
                Ok(platform_outcomes) => outcomes.extend(platform_outcomes),
                Err(e) => {
                    error!(platform = %kind, error = %e, "Dispatch task aborted");
                    outcomes.extend(partitions.iter().map(|p| DispatchOutcome {
                        platform: kind,
                        environment: p.environment.clone(),
                        severity: p.severity.clone(),
                        alerts: p.indices.len(),
                        status: OutcomeStatus::Failed(PipelineError::TaskAborted(e.to_string())),
                    }));
                }
            }
        }

        let result = PipelineResult { outcomes, ignored };
        let summary = result.summary();
        info!(
            alerts = batch.alerts.len(),
            groups = partitions.len(),
            sent = summary.sent,
            skipped = summary.skipped,
            failed = summary.failed,
            ignored,
            "Webhook processed"
        );
        result
    }
}

/// Split a batch into (environment, severity) partitions, in the order each
/// pair first appears. Returns the partitions and the ignored-alert count.
fn partition(batch: &AlertGroup, config: &Config, path_severity: Option<&str>) -> (Vec<Partition>, usize) {
    let mut partitions: Vec<Partition> = Vec::new();
    let mut ignored = 0;

    for (index, alert) in batch.alerts.iter().enumerate() {
        if config.is_ignored(alert.name()) {
            debug!(alert = alert.name(), "Ignoring alert");
            ignored += 1;
            continue;
        }

        let source = environment::source_value(alert, batch, config);
        let environment = environment::resolve(source, config);
        let severity = alert
            .severity()
            .filter(|s| !s.is_empty())
            .or(path_severity)
            .unwrap_or(UNKNOWN_SEVERITY);

        if let Some(existing) = partitions
            .iter_mut()
            .find(|p| p.environment == environment && p.severity == severity)
        {
            existing.indices.push(index);
        } else {
            partitions.push(Partition {
                environment: environment.to_string(),
                severity: severity.to_string(),
                indices: vec![index],
            });
        }
    }

    (partitions, ignored)
}

async fn run_platform(
    kind: Platform,
    config: Arc<Config>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    batch: Arc<AlertGroup>,
    partitions: Arc<Vec<Partition>>,
) -> Vec<DispatchOutcome> {
    let mut outcomes = Vec::with_capacity(partitions.len());

    for partition in partitions.iter() {
        let status = dispatch_partition(kind, &config, dispatcher.as_deref(), &batch, partition).await;
        outcomes.push(DispatchOutcome {
            platform: kind,
            environment: partition.environment.clone(),
            severity: partition.severity.clone(),
            alerts: partition.indices.len(),
            status,
        });
    }

    outcomes
}

async fn dispatch_partition(
    kind: Platform,
    config: &Config,
    dispatcher: Option<&dyn Dispatcher>,
    batch: &AlertGroup,
    partition: &Partition,
) -> OutcomeStatus {
    let environment = partition.environment.as_str();
    let severity = partition.severity.as_str();

    if !config.is_valid_environment(environment) {
        error!(platform = %kind, environment, severity, "Resolved environment is not valid");
        return OutcomeStatus::Failed(PipelineError::InvalidEnvironment(environment.to_string()));
    }

    let Some(platform) = config.platform(kind) else {
        return OutcomeStatus::Skipped;
    };

    let channel = match routing::select(platform, environment, severity) {
        Route::Channel(channel) => channel,
        Route::NotConfigured => {
            warn!(platform = %kind, environment, severity, "No route configured, skipping");
            return OutcomeStatus::Skipped;
        }
    };

    let Some(dispatcher) = dispatcher else {
        error!(platform = %kind, "No dispatcher registered");
        return OutcomeStatus::Failed(PipelineError::NoDispatcher(kind));
    };

    let group = partition.group(batch);
    let message = format::format(&group, kind, channel);
    let destination = channel.channel_id.as_str();

    match dispatcher.send(destination, &message).await {
        Ok(ack) => {
            info!(
                platform = %kind,
                destination,
                environment,
                severity,
                alerts = group.alerts.len(),
                "Notification sent"
            );
            OutcomeStatus::Sent(ack)
        }
        Err(e) => {
            error!(
                platform = %kind,
                destination,
                environment,
                severity,
                error = %e,
                "Failed to send notification"
            );
            OutcomeStatus::Failed(PipelineError::Dispatch(e))
        }
    }
}
