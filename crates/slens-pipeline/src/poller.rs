//! Bounded status polling.
//!
//! Checks the remote worker at a fixed interval until it reports a terminal
//! status, the attempt budget runs out, or the job is cancelled. Transport
//! and decode errors on a single check are tolerated; each still consumes
//! one attempt.

use std::sync::Arc;
use std::time::Duration;

use slens_analysis_client::{RemoteStatus, StatusSource};
use slens_models::AnalysisPayload;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::PollError;
use crate::metrics;
use crate::retry::FailureTracker;

/// Terminal result of a polling session.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(AnalysisPayload),
    /// Remote worker reported an error
    Failed(String),
    /// Remote worker does not know the correlation id
    NotFound,
    TimedOut { attempts: u32 },
    /// Stopped by cancellation; the job state is left untouched
    Cancelled,
}

impl PollOutcome {
    pub fn into_result(self) -> Result<AnalysisPayload, PollError> {
        match self {
            PollOutcome::Completed(payload) => Ok(payload),
            PollOutcome::Failed(detail) => Err(PollError::RemoteFailure(detail)),
            PollOutcome::NotFound => Err(PollError::RemoteJobUnknown),
            PollOutcome::TimedOut { attempts } => Err(PollError::Timeout { attempts }),
            PollOutcome::Cancelled => Err(PollError::Cancelled),
        }
    }
}

#[derive(Clone)]
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    interval: Duration,
    max_attempts: u32,
}

impl StatusPoller {
    pub fn new(source: Arc<dyn StatusSource>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            source,
            interval,
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Poll `correlation_id` until a terminal outcome.
    ///
    /// The first check happens immediately; the interval is waited between
    /// checks, never after the last one. `cancel` flipping to `true` stops
    /// the loop at the next check or mid-sleep.
    pub async fn await_terminal(
        &self,
        correlation_id: &str,
        cancel: &mut watch::Receiver<bool>,
    ) -> PollOutcome {
        let mut failures = FailureTracker::new(3);

        for attempt in 1..=self.max_attempts {
            if *cancel.borrow() {
                return PollOutcome::Cancelled;
            }

            let status = tokio::select! {
                status = self.source.fetch_status(correlation_id) => status,
                _ = cancelled(cancel) => return PollOutcome::Cancelled,
            };

            match status {
                Ok(RemoteStatus::Completed(payload)) => {
                    metrics::record_poll_attempt("completed");
                    info!(correlation_id, attempt, "Remote analysis completed");
                    return PollOutcome::Completed(payload);
                }
                Ok(RemoteStatus::Error(detail)) => {
                    metrics::record_poll_attempt("error");
                    warn!(correlation_id, attempt, "Remote analysis failed: {}", detail);
                    return PollOutcome::Failed(detail);
                }
                Ok(RemoteStatus::NotFound) => {
                    metrics::record_poll_attempt("not_found");
                    warn!(correlation_id, attempt, "Remote worker does not know this job");
                    return PollOutcome::NotFound;
                }
                Ok(RemoteStatus::Processing) => {
                    metrics::record_poll_attempt("processing");
                    failures.record_success();
                    debug!(correlation_id, attempt, "Still processing");
                }
                Err(e) => {
                    metrics::record_poll_attempt(if e.is_retryable() {
                        "transport_error"
                    } else {
                        "bad_response"
                    });
                    if failures.record_failure() {
                        warn!(correlation_id, attempt, "Status check failed: {}", e);
                    }
                }
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = cancelled(cancel) => return PollOutcome::Cancelled,
                }
            }
        }

        warn!(
            correlation_id,
            attempts = self.max_attempts,
            "Gave up waiting for remote analysis"
        );
        PollOutcome::TimedOut {
            attempts: self.max_attempts,
        }
    }
}

/// Resolves once cancellation is requested. Pends forever if the sender is
/// gone without cancelling.
pub(crate) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}
