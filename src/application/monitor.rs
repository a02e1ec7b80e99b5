use super::session::PollingSession;
use crate::domain::ports::PaymentGatewayRef;
use crate::domain::status::Settlement;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{Instrument, debug, info, info_span, warn};

/// Stand-in deadline when the configured one does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// How a monitoring session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorOutcome {
    Completed(Settlement),
    TimedOut,
    Cancelled,
}

/// Called once with the final outcome, before the outcome is published to
/// handles.
pub(crate) type FinishHook = Box<dyn FnOnce(&MonitorOutcome) + Send>;

/// Cloneable handle to a running monitoring session.
///
/// Cancelling is idempotent. When every handle is dropped the session is
/// cancelled as well.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    payment_id: Arc<str>,
    cancel: Arc<watch::Sender<bool>>,
    outcome: watch::Receiver<Option<MonitorOutcome>>,
}

impl MonitorHandle {
    pub fn payment_id(&self) -> &str {
        &self.payment_id
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    pub fn outcome(&self) -> Option<MonitorOutcome> {
        self.outcome.borrow().clone()
    }

    /// Waits for the session to end and returns its outcome.
    pub async fn finished(&self) -> MonitorOutcome {
        let mut outcome = self.outcome.clone();
        match outcome.wait_for(Option::is_some).await {
            Ok(done) => (*done).clone().unwrap_or(MonitorOutcome::Cancelled),
            // the task went away without reporting
            Err(_) => MonitorOutcome::Cancelled,
        }
    }
}

/// Spawns the recurring status check for `session` on the current runtime.
pub(crate) fn spawn(
    session: PollingSession,
    gateway: PaymentGatewayRef,
    poll_interval: Duration,
    on_finish: FinishHook,
) -> MonitorHandle {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (outcome_tx, outcome_rx) = watch::channel(None);
    let handle = MonitorHandle {
        payment_id: Arc::from(session.payment_id()),
        cancel: Arc::new(cancel_tx),
        outcome: outcome_rx,
    };

    let span = info_span!("payment_monitor", payment_id = %session.payment_id());
    tokio::spawn(
        async move {
            let outcome = run(session, gateway, poll_interval, cancel_rx).await;
            on_finish(&outcome);
            outcome_tx.send_replace(Some(outcome));
        }
        .instrument(span),
    );

    handle
}

async fn run(
    mut session: PollingSession,
    gateway: PaymentGatewayRef,
    poll_interval: Duration,
    mut cancel_rx: watch::Receiver<bool>,
) -> MonitorOutcome {
    let payment_id = session.payment_id().to_string();
    let now = Instant::now();
    let deadline = now
        .checked_add(session.remaining(Utc::now()))
        .unwrap_or_else(|| now + FAR_FUTURE);
    // No check can happen after the deadline anyway.
    let first_check = now.checked_add(poll_interval).unwrap_or(deadline);
    let mut ticker = time::interval_at(first_check, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        created_at = %session.created_at(),
        deadline = %session.deadline(),
        "monitoring payment"
    );

    let outcome = loop {
        tokio::select! {
            biased;
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => break MonitorOutcome::Cancelled,
            _ = time::sleep_until(deadline) => break MonitorOutcome::TimedOut,
            _ = ticker.tick() => {}
        }

        // The check is awaited inline, so a slow response delays the next
        // tick instead of overlapping with it.
        let result = tokio::select! {
            biased;
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => break MonitorOutcome::Cancelled,
            _ = time::sleep_until(deadline) => break MonitorOutcome::TimedOut,
            result = gateway.payment_status(&payment_id) => result,
        };
        session.record_attempt();

        match result {
            Ok(status) => {
                debug!(
                    attempt = session.attempt_count(),
                    status = ?status.status,
                    dual_transfer_completed = status.dual_transfer_completed,
                    "status checked"
                );
                if let Some(settlement) = session.evaluate(&status) {
                    break MonitorOutcome::Completed(settlement);
                }
            }
            Err(e) => {
                warn!(attempt = session.attempt_count(), error = %e, "status check failed");
            }
        }
    };

    // An explicit cancel that raced with the last check wins.
    let outcome = if outcome != MonitorOutcome::Cancelled && *cancel_rx.borrow() {
        MonitorOutcome::Cancelled
    } else {
        outcome
    };

    match &outcome {
        MonitorOutcome::Completed(settlement) => info!(
            attempts = session.attempt_count(),
            signature = %settlement.signature,
            "payment completed"
        ),
        MonitorOutcome::TimedOut => {
            info!(attempts = session.attempt_count(), "payment monitoring timed out")
        }
        MonitorOutcome::Cancelled => {
            info!(attempts = session.attempt_count(), "payment monitoring cancelled")
        }
    }

    outcome
}
