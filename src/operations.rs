//! # Long-running operations
//!
//! Mutating compute calls return immediately with an operation resource;
//! the work completes server-side. [`wait`] polls the operation until it
//! reaches `DONE`, backing off exponentially between polls, and turns a
//! recorded operation error into a command failure.

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use indicatif::ProgressBar;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api;

/// Delay before the first poll.
const INITIAL_POLL_DELAY: Duration = Duration::from_secs(1);
/// Poll delays grow by this factor, capped at [`MAX_POLL_DELAY`].
const POLL_BACKOFF_FACTOR: f64 = 1.5;
const MAX_POLL_DELAY: Duration = Duration::from_secs(5);
/// Random extra per poll so concurrent pollers spread out.
const POLL_JITTER_MS: u64 = 250;

/// Default for the `--timeout` flag of waiting commands.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationStatus::Pending => "PENDING",
            OperationStatus::Running => "RUNNING",
            OperationStatus::Done => "DONE",
        };
        write!(f, "{s}")
    }
}

/// A compute operation resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// What the operation does, e.g. `insert` or `stop`.
    #[serde(rename = "operationType", skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    /// Link to the resource the operation acts on.
    #[serde(rename = "targetLink", skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,
    pub status: OperationStatus,
    #[serde(rename = "statusMessage", skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Completion estimate, 0 to 100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    /// Full URL of the zone for zonal operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// Full URL of the region for regional operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "insertTime", skip_serializing_if = "Option::is_none")]
    pub insert_time: Option<String>,
    #[serde(rename = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(rename = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(rename = "selfLink", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    /// Present when the operation finished with errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationErrors>,
    #[serde(
        rename = "httpErrorStatusCode",
        skip_serializing_if = "Option::is_none"
    )]
    pub http_error_status_code: Option<u16>,
    #[serde(rename = "httpErrorMessage", skip_serializing_if = "Option::is_none")]
    pub http_error_message: Option<String>,
    /// Who started the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// The `error` block of a failed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationErrors {
    #[serde(default)]
    pub errors: Vec<OperationErrorDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Where an operation lives. Compute scopes operations per zone, per
/// region, or globally, each with its own URL space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationScope {
    Zone(String),
    Region(String),
    Global,
}

impl Operation {
    pub fn scope(&self) -> OperationScope {
        if let Some(zone) = &self.zone {
            OperationScope::Zone(last_segment(zone).to_string())
        } else if let Some(region) = &self.region {
            OperationScope::Region(last_segment(region).to_string())
        } else {
            OperationScope::Global
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == OperationStatus::Done
    }
}

/// Last path segment of a URL-shaped value, e.g. the zone name out of its
/// full URL.
pub fn last_segment(url: &str) -> &str {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("operation [{name}] failed: {message}")]
    Failed { name: String, message: String },

    #[error(
        "Operation timed out after {0} seconds. The operation may still be \
         underway remotely and may still succeed."
    )]
    Timeout(u64),
}

/// Polls `operation` until it is `DONE` or `timeout` passes. Shows a
/// spinner unless `quiet`. Returns the finished operation; an error the
/// server recorded on it becomes [`WaitError::Failed`].
///
/// Polling follows the operation's own self-link, so it sticks to the API
/// version the operation was created under.
pub async fn wait(operation: Operation, timeout: Duration, quiet: bool) -> Result<Operation> {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Waiting for [{}] to complete...", operation.name));

    let result = poll_until_done(operation, timeout, &spinner).await;
    spinner.finish_and_clear();
    result
}

async fn poll_until_done(
    mut current: Operation,
    timeout: Duration,
    spinner: &ProgressBar,
) -> Result<Operation> {
    let deadline = Instant::now() + timeout;
    let mut delay = INITIAL_POLL_DELAY;
    loop {
        if current.is_done() {
            return finished(current);
        }
        if Instant::now() >= deadline {
            return Err(WaitError::Timeout(timeout.as_secs()).into());
        }
        if let Some(progress) = current.progress {
            spinner.set_message(format!(
                "Waiting for [{}] to complete... ({progress}%)",
                current.name
            ));
        }
        tokio::time::sleep(with_jitter(delay)).await;
        delay = next_delay(delay);
        current = refresh(&current).await?;
    }
}

/// A `DONE` operation still carries its failure, if any, in `error`.
fn finished(operation: Operation) -> Result<Operation> {
    match &operation.error {
        Some(block) if !block.errors.is_empty() => {
            let message = block
                .errors
                .iter()
                .map(|e| match (&e.code, &e.message) {
                    (Some(code), Some(msg)) => format!("{code}: {msg}"),
                    (None, Some(msg)) => msg.clone(),
                    (Some(code), None) => code.clone(),
                    (None, None) => "unknown error".to_string(),
                })
                .collect::<Vec<_>>()
                .join("; ");
            Err(WaitError::Failed {
                name: operation.name.clone(),
                message,
            }
            .into())
        }
        _ => Ok(operation),
    }
}

async fn refresh(current: &Operation) -> Result<Operation> {
    let Some(link) = &current.self_link else {
        bail!("operation [{}] has no selfLink to poll", current.name);
    };
    debug!(operation = %current.name, "polling");
    api::get_json(Url::parse(link)?).await
}

fn with_jitter(delay: Duration) -> Duration {
    delay + Duration::from_millis(rand::random_range(0..POLL_JITTER_MS))
}

/// 1s, 1.5s, 2.25s, ... capped at [`MAX_POLL_DELAY`].
fn next_delay(delay: Duration) -> Duration {
    MAX_POLL_DELAY.min(delay.mul_f64(POLL_BACKOFF_FACTOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_operation() -> Operation {
        serde_json::from_value(serde_json::json!({
            "id": "7128783508439765",
            "name": "operation-1756-abcdef",
            "operationType": "insert",
            "targetLink": "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a/instances/vm-1",
            "status": "RUNNING",
            "progress": 40,
            "zone": "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a",
            "insertTime": "2026-08-24T10:00:00.000-07:00",
            "selfLink": "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a/operations/operation-1756-abcdef",
            "user": "robot@p.iam.gserviceaccount.com"
        }))
        .unwrap()
    }

    #[test]
    fn deserializes_operation() {
        let op = running_operation();
        assert_eq!(op.status, OperationStatus::Running);
        assert_eq!(op.progress, Some(40));
        assert_eq!(op.operation_type.as_deref(), Some("insert"));
        assert_eq!(op.scope(), OperationScope::Zone("us-central1-a".to_string()));
    }

    #[test]
    fn scope_falls_back_to_region_then_global() {
        let mut op = running_operation();
        op.zone = None;
        op.region =
            Some("https://www.googleapis.com/compute/v1/projects/p/regions/us-central1".into());
        assert_eq!(op.scope(), OperationScope::Region("us-central1".to_string()));
        op.region = None;
        assert_eq!(op.scope(), OperationScope::Global);
    }

    #[test]
    fn backoff_grows_to_cap() {
        let mut delay = INITIAL_POLL_DELAY;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(delay.as_millis());
            delay = next_delay(delay);
        }
        assert_eq!(seen, vec![1000, 1500, 2250, 3375, 5000]);
        assert_eq!(next_delay(delay), MAX_POLL_DELAY);
    }

    #[test]
    fn finished_joins_error_details() {
        let mut op = running_operation();
        op.status = OperationStatus::Done;
        op.error = Some(OperationErrors {
            errors: vec![
                OperationErrorDetail {
                    code: Some("QUOTA_EXCEEDED".into()),
                    message: Some("Quota 'CPUS' exceeded".into()),
                    location: None,
                },
                OperationErrorDetail {
                    code: Some("RESOURCE_NOT_READY".into()),
                    message: None,
                    location: None,
                },
            ],
        });
        let err = finished(op).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("operation [operation-1756-abcdef] failed"), "{msg}");
        assert!(msg.contains("QUOTA_EXCEEDED: Quota 'CPUS' exceeded"), "{msg}");
        assert!(msg.contains("RESOURCE_NOT_READY"), "{msg}");
    }

    #[tokio::test]
    async fn wait_returns_done_operation_without_polling() {
        let mut op = running_operation();
        op.status = OperationStatus::Done;
        op.progress = Some(100);
        let done = wait(op, Duration::from_secs(1), true)
            .await
            .unwrap();
        assert!(done.is_done());
    }

    #[tokio::test]
    async fn wait_times_out_before_first_poll() {
        let op = running_operation();
        let err = wait(op, Duration::ZERO, true)
            .await
            .unwrap_err();
        assert!(
            err.to_string().contains("timed out after 0 seconds"),
            "{err}"
        );
        assert!(err.to_string().contains("may still be underway"), "{err}");
    }
}
