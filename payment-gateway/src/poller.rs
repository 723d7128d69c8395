//! Status polling for a single mobile-money attempt.
//!
//! A poll sequence moves `idle -> pending -> checking -> (paid | cancelled |
//! failed | expired) -> idle`. Non-terminal replies are re-checked on a fixed
//! interval; transport failures back off exponentially. Every sequence is
//! bounded by an attempt cap, a consecutive-error cap and an overall timeout.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::metrics::GatewayMetrics;
use crate::paynow::ProviderError;
use crate::reply::{PaymentStatus, ProviderReply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_delay: Duration,
    pub interval: Duration,
    /// First delay after a failed check; doubles per consecutive failure.
    pub error_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
    pub max_consecutive_errors: u32,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(5),
            error_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(60),
            max_attempts: 60,
            max_consecutive_errors: 10,
            timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl PollPolicy {
    pub fn backoff_for(&self, consecutive_errors: u32) -> Duration {
        let exponent = consecutive_errors.saturating_sub(1).min(16);
        self.error_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff.max(self.error_backoff))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    Idle,
    Pending,
    Checking,
    Paid,
    Cancelled,
    Failed,
    Expired,
}

/// Normalized view of one status reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: Option<PaymentStatus>,
    pub reference: Option<String>,
    pub amount: Option<String>,
    pub paynow_reference: Option<String>,
    pub poll_url: Option<String>,
    pub hash: Option<String>,
    pub hash_valid: bool,
}

impl StatusUpdate {
    pub fn from_reply(reply: &ProviderReply, integration_key: &str) -> StatusUpdate {
        StatusUpdate {
            status: reply.status(),
            reference: reply.owned("reference"),
            amount: reply.owned("amount"),
            paynow_reference: reply.owned("paynowreference"),
            poll_url: reply.owned("pollurl"),
            hash: reply.owned("hash"),
            hash_valid: reply.verify_hash(integration_key),
        }
    }

    pub fn with_status(status: PaymentStatus) -> StatusUpdate {
        StatusUpdate {
            status: Some(status),
            reference: None,
            amount: None,
            paynow_reference: None,
            poll_url: None,
            hash: None,
            hash_valid: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollFailure {
    Cancelled(StatusUpdate),
    Failed(StatusUpdate),
    Expired { attempts: u32, last_error: Option<String> },
    /// The poll URL itself was refused; retrying cannot help.
    Rejected(String),
}

impl PollFailure {
    pub fn terminal_state(&self) -> PollState {
        match self {
            PollFailure::Cancelled(_) => PollState::Cancelled,
            PollFailure::Failed(_) | PollFailure::Rejected(_) => PollState::Failed,
            PollFailure::Expired { .. } => PollState::Expired,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Paid(StatusUpdate),
    Failed(PollFailure),
}

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn check_status(&self, poll_url: &str) -> Result<StatusUpdate, ProviderError>;
}

/// Receives the UI-facing callbacks of a poll sequence. `on_success` and
/// `on_failure` are mutually exclusive and fire at most once per sequence.
#[async_trait]
pub trait PaymentObserver: Send + Sync {
    async fn on_state(&self, _state: PollState) {}
    async fn on_success(&self, update: &StatusUpdate);
    async fn on_failure(&self, failure: &PollFailure);
}

#[derive(Clone)]
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    policy: PollPolicy,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl StatusPoller {
    pub fn new(source: Arc<dyn StatusSource>, policy: PollPolicy) -> Self {
        Self { source, policy, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_poll_check(outcome);
        }
    }

    fn check_hash(&self, poll_url: &str, update: &StatusUpdate) {
        if update.hash.is_none() || update.hash_valid {
            return;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_hash_mismatch("poll");
        }
        warn!(poll_url, reference = ?update.reference, "Paynow poll reply hash did not verify");
    }

    pub async fn run(&self, poll_url: &str, observer: &dyn PaymentObserver) -> PollOutcome {
        let started = Instant::now();
        let mut delay = self.policy.initial_delay;
        let mut attempts = 0u32;
        let mut consecutive_errors = 0u32;
        let mut last_error: Option<String> = None;

        observer.on_state(PollState::Pending).await;
        loop {
            if started.elapsed() + delay > self.policy.timeout {
                debug!(poll_url, attempts, "Poll deadline reached");
                let failure = PollFailure::Expired { attempts, last_error };
                return self.fail(observer, failure).await;
            }
            sleep(delay).await;

            attempts += 1;
            observer.on_state(PollState::Checking).await;
            match self.source.check_status(poll_url).await {
                Ok(update) => {
                    consecutive_errors = 0;
                    self.check_hash(poll_url, &update);
                    match update.status {
                        Some(PaymentStatus::Paid) => {
                            self.record("paid");
                            info!(poll_url, attempts, reference = ?update.reference, "Payment confirmed");
                            observer.on_state(PollState::Paid).await;
                            observer.on_success(&update).await;
                            observer.on_state(PollState::Idle).await;
                            return PollOutcome::Paid(update);
                        }
                        Some(PaymentStatus::Cancelled) => {
                            self.record("cancelled");
                            return self.fail(observer, PollFailure::Cancelled(update)).await;
                        }
                        Some(PaymentStatus::Failed) => {
                            self.record("failed");
                            return self.fail(observer, PollFailure::Failed(update)).await;
                        }
                        _ => {
                            self.record("pending");
                            debug!(poll_url, attempts, status = ?update.status, "Payment not settled yet");
                            delay = self.policy.interval;
                        }
                    }
                }
                Err(err) if !err.is_retryable() => {
                    self.record("error");
                    warn!(poll_url, error = %err, "Poll url rejected");
                    return self.fail(observer, PollFailure::Rejected(err.to_string())).await;
                }
                Err(err) => {
                    self.record("error");
                    consecutive_errors += 1;
                    delay = self.policy.backoff_for(consecutive_errors);
                    warn!(poll_url, attempts, consecutive_errors, retry_in = ?delay, error = %err, "Status check failed");
                    last_error = Some(err.to_string());
                    if consecutive_errors >= self.policy.max_consecutive_errors {
                        let failure = PollFailure::Expired { attempts, last_error };
                        return self.fail(observer, failure).await;
                    }
                }
            }

            if attempts >= self.policy.max_attempts {
                let failure = PollFailure::Expired { attempts, last_error };
                return self.fail(observer, failure).await;
            }
            observer.on_state(PollState::Pending).await;
        }
    }

    async fn fail(&self, observer: &dyn PaymentObserver, failure: PollFailure) -> PollOutcome {
        info!(state = ?failure.terminal_state(), "Payment attempt ended without confirmation");
        observer.on_state(failure.terminal_state()).await;
        observer.on_failure(&failure).await;
        observer.on_state(PollState::Idle).await;
        PollOutcome::Failed(failure)
    }

    /// Run the sequence on a background task.
    pub fn spawn(&self, poll_url: String, observer: Arc<dyn PaymentObserver>) -> PollHandle {
        let poller = self.clone();
        let handle = tokio::spawn(async move { poller.run(&poll_url, observer.as_ref()).await });
        PollHandle { handle }
    }
}

pub struct PollHandle {
    handle: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// Abandon the sequence; no further callbacks fire.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// `None` when the sequence was cancelled.
    pub async fn outcome(self) -> Option<PollOutcome> {
        self.handle.await.ok()
    }
}
