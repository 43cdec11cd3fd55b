//! Run pipeline and the per-channel delivery records it produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::branch_filter::{FilterTarget, filter_by_with};
use crate::config::NotifyConfig;
use crate::dispatch::Dispatcher;
use crate::error::{NotifyError, Result};
use crate::gate::should_post;
use crate::interpolate::EnvironmentMap;
use crate::message::build_message_body;
use crate::template::{BuiltinTemplate, modify_custom_template};

const ENV_MENTIONS: &str = "SLACK_PARAM_MENTIONS";
const ENV_BUILD_TIME: &str = "CIRCLE_BUILD_TIME";

/// Represents the status of a delivery to one channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// One payload sent (or attempted) to one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub channel: String,
    pub status: DeliveryStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Delivery {
    pub fn new(channel: String) -> Self {
        Self {
            channel,
            status: DeliveryStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    pub fn mark_sent(&mut self) {
        self.status = DeliveryStatus::Sent;
        self.completed_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = DeliveryStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn is_failed(&self) -> bool {
        self.status == DeliveryStatus::Failed
    }
}

/// Why a run ended without sending anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Event,
    Branch,
    Tag,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Skipped(SkipReason),
    Delivered(Vec<Delivery>),
}

/// Runs the whole notify flow for one CI step.
pub struct Notifier {
    dispatcher: Arc<dyn Dispatcher>,
}

impl Notifier {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Diagnostics and the debug payload dump go to stdout.
    pub async fn run(&self, config: &NotifyConfig, env: &EnvironmentMap) -> Result<RunOutcome> {
        let mut stdout = io::stdout();
        self.run_with_output(config, env, &mut stdout).await
    }

    pub async fn run_with_output<W: Write>(
        &self,
        config: &NotifyConfig,
        env: &EnvironmentMap,
        out: &mut W,
    ) -> Result<RunOutcome> {
        if !should_post(&config.build_status, &config.event) {
            info!(
                event = %config.event,
                status = %config.build_status,
                "Event does not call for a notification, skipping"
            );
            return Ok(RunOutcome::Skipped(SkipReason::Event));
        }

        // A broken template fails the run even on a branch that would be filtered.
        let template = resolve_template(config)?;
        if let Some(raw) = template.as_deref() {
            modify_custom_template(raw)?;
        }

        let branch_patterns = config.branch_pattern_source()?;
        if !filter_by_with(
            branch_patterns.as_deref(),
            config.branch.as_deref(),
            FilterTarget::Branch,
            out,
        )? {
            return Ok(RunOutcome::Skipped(SkipReason::Branch));
        }
        let tag_patterns = config.tag_pattern_source()?;
        if !filter_by_with(
            tag_patterns.as_deref(),
            config.tag.as_deref(),
            FilterTarget::Tag,
            out,
        )? {
            return Ok(RunOutcome::Skipped(SkipReason::Tag));
        }

        let template_env = template_env(config, env);
        let payloads = config
            .channels()?
            .into_iter()
            .map(|channel| {
                build_message_body(
                    template.as_deref(),
                    &config.build_status,
                    &channel,
                    &template_env,
                )
                .map(|payload| (channel, payload))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut deliveries = Vec::with_capacity(payloads.len());
        for (channel, payload) in payloads {
            if config.debug {
                writeln!(out, "{}", payload)?;
            }

            let mut delivery = Delivery::new(channel);
            match self.dispatcher.send(&payload).await {
                Ok(outcome) if outcome.ok => {
                    info!(channel = %delivery.channel, dispatcher = self.dispatcher.name(), "Notification sent");
                    delivery.mark_sent();
                }
                Ok(outcome) => {
                    let reason = outcome.error.unwrap_or_else(|| "unknown error".to_string());
                    error!(channel = %delivery.channel, error = %reason, "Notification rejected");
                    delivery.mark_failed(reason);
                }
                Err(e) => {
                    error!(channel = %delivery.channel, error = %e, "Notification could not be sent");
                    delivery.mark_failed(e.to_string());
                }
            }
            deliveries.push(delivery);
        }

        let failures: Vec<String> = deliveries
            .iter()
            .filter(|d| d.is_failed())
            .map(|d| format!("{}: {}", d.channel, d.error.as_deref().unwrap_or_default()))
            .collect();
        if !failures.is_empty() {
            if !config.ignore_errors {
                return Err(NotifyError::DispatchError(failures.join("; ")));
            }
            warn!(
                failed = failures.len(),
                "Some notifications failed; continuing because errors are ignored"
            );
        }

        debug!(deliveries = deliveries.len(), "Run finished");
        Ok(RunOutcome::Delivered(deliveries))
    }
}

/// The run's environment plus the values the built-in templates reference
/// that CI does not export: mentions (empty unless configured) and the
/// time of the run, unless the environment already sets them.
pub(crate) fn template_env(config: &NotifyConfig, env: &EnvironmentMap) -> EnvironmentMap {
    let mut template_env = env.clone();
    template_env.insert(
        ENV_MENTIONS.to_string(),
        config.mentions.clone().unwrap_or_default(),
    );
    template_env
        .entry(ENV_BUILD_TIME.to_string())
        .or_insert_with(|| Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string());
    template_env
}

/// Custom template (file, then inline), then a named built-in. `None` means
/// the default for the build status.
fn resolve_template(config: &NotifyConfig) -> Result<Option<String>> {
    if let Some(custom) = config.custom_template_source()? {
        debug!("Using custom template");
        return Ok(Some(custom));
    }
    match config.template.as_deref() {
        Some(name) => {
            let builtin = BuiltinTemplate::from_str(name)?;
            debug!(template = %builtin, "Using named built-in template");
            Ok(Some(builtin.source().to_string()))
        }
        None => Ok(None),
    }
}
