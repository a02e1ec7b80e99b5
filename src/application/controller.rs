use super::events::{FlowEvent, FlowState};
use super::monitor::{self, MonitorHandle, MonitorOutcome};
use super::session::PollingSession;
use crate::config::MonitorSettings;
use crate::domain::amount::Amount;
use crate::domain::payment::{PaymentRecord, PaymentRequest};
use crate::domain::ports::PaymentGatewayRef;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// A payment created on the service, together with the client-side facts
/// needed to monitor it.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentAttempt {
    pub record: PaymentRecord,
    pub order_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct FlowShared {
    state: FlowState,
    /// Bumped for every monitoring session; a session only reports while it
    /// is still the current one.
    generation: u64,
    active: Option<MonitorHandle>,
}

/// Drives one payment attempt at a time for a single presentation surface.
///
/// Presentation code supplies user input and renders the [`FlowEvent`]s
/// received on the channel returned by [`PaymentFlowController::new`].
pub struct PaymentFlowController {
    gateway: PaymentGatewayRef,
    settings: MonitorSettings,
    recipient: Option<String>,
    events: mpsc::UnboundedSender<FlowEvent>,
    submitting: AtomicBool,
    shared: Arc<Mutex<FlowShared>>,
}

/// Releases the submission gate even if the creation future is dropped.
struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FlowShared {
    /// Cancels the active session and starts a new generation, so the
    /// retired session can no longer change state or emit events.
    fn retire_active(&mut self) -> Option<MonitorHandle> {
        self.generation += 1;
        let previous = self.active.take()?;
        previous.cancel();
        Some(previous)
    }
}

fn lock(shared: &Mutex<FlowShared>) -> MutexGuard<'_, FlowShared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PaymentFlowController {
    /// Creates a controller and the receiving end of its event stream.
    ///
    /// # Arguments
    ///
    /// * `gateway` - The payment service adapter.
    /// * `settings` - Poll interval, timeout and grace window.
    /// * `recipient` - The merchant wallet address, if one is known.
    pub fn new(
        gateway: PaymentGatewayRef,
        settings: MonitorSettings,
        recipient: Option<String>,
    ) -> (Self, mpsc::UnboundedReceiver<FlowEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            gateway,
            settings,
            recipient,
            events,
            submitting: AtomicBool::new(false),
            shared: Arc::new(Mutex::new(FlowShared::default())),
        };
        (controller, receiver)
    }

    pub fn state(&self) -> FlowState {
        lock(&self.shared).state
    }

    pub fn active_monitor(&self) -> Option<MonitorHandle> {
        lock(&self.shared).active.clone()
    }

    /// Asks the payment service whether it is reachable.
    pub async fn check_service(&self) -> bool {
        let available = self.gateway.is_available().await;
        if available {
            info!("payment service available");
        } else {
            warn!("payment service unavailable");
        }
        available
    }

    /// Creates a payment for `amount_text` of `token_symbol`.
    ///
    /// Input is validated before anything is sent; invalid input never
    /// reaches the network. While one creation call is in flight further
    /// calls fail with [`PaymentError::SubmissionInProgress`]. The creation
    /// call is made once and never retried. Valid input supersedes any
    /// session still monitoring an earlier payment.
    pub async fn create_payment(
        &self,
        amount_text: &str,
        token_symbol: &str,
    ) -> Result<PaymentAttempt> {
        if self.submitting.swap(true, Ordering::AcqRel) {
            warn!("payment creation already in flight");
            let e = PaymentError::SubmissionInProgress;
            self.emit(FlowEvent::Error(e.user_message()));
            return Err(e);
        }
        let _guard = SubmitGuard(&self.submitting);

        let request = match self.build_request(amount_text, token_symbol) {
            Ok(request) => request,
            Err(e) => {
                warn!(
                    amount = amount_text,
                    token = token_symbol,
                    error = %e,
                    "rejected payment input"
                );
                self.emit(FlowEvent::Error(e.user_message()));
                return Err(e);
            }
        };

        let created_at = Utc::now();
        {
            let mut shared = lock(&self.shared);
            if let Some(previous) = shared.retire_active() {
                info!(
                    previous = previous.payment_id(),
                    order_id = %request.order_id,
                    "superseding active monitoring session for a new payment"
                );
            }
            shared.state = FlowState::Creating;
        }
        self.emit(FlowEvent::Loading);
        info!(
            order_id = %request.order_id,
            amount = %request.amount,
            token = %request.token_symbol,
            "creating payment"
        );

        match self.gateway.create_payment(&request).await {
            Ok(record) => {
                info!(payment_id = %record.id, order_id = %request.order_id, "payment created");
                self.set_state(FlowState::Created);
                self.emit(FlowEvent::Created(record.clone()));
                Ok(PaymentAttempt {
                    record,
                    order_id: request.order_id,
                    created_at,
                })
            }
            Err(e) => {
                error!(order_id = %request.order_id, error = %e, "payment creation failed");
                self.set_state(FlowState::CreateFailed);
                self.emit(FlowEvent::Error(e.user_message()));
                Err(e)
            }
        }
    }

    /// Starts watching `payment_id` until it settles, times out or is
    /// cancelled. Any session already running on this controller is
    /// cancelled first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_monitoring(&self, payment_id: &str, created_at: DateTime<Utc>) -> MonitorHandle {
        let mut shared = lock(&self.shared);
        if let Some(previous) = shared.retire_active() {
            info!(
                previous = previous.payment_id(),
                next = payment_id,
                "superseding active monitoring session"
            );
        }
        let generation = shared.generation;
        shared.state = FlowState::Monitoring;

        let session = PollingSession::new(payment_id, created_at, &self.settings);
        let on_finish = self.finish_hook(generation);
        let handle = monitor::spawn(
            session,
            Arc::clone(&self.gateway),
            self.settings.poll_interval,
            on_finish,
        );
        shared.active = Some(handle.clone());
        handle
    }

    /// Creates a payment and immediately starts monitoring it.
    pub async fn submit(
        &self,
        amount_text: &str,
        token_symbol: &str,
    ) -> Result<(PaymentAttempt, MonitorHandle)> {
        let attempt = self.create_payment(amount_text, token_symbol).await?;
        let handle = self.start_monitoring(&attempt.record.id, attempt.created_at);
        Ok((attempt, handle))
    }

    /// Abandons the active monitoring session, if any.
    pub fn cancel(&self) {
        let mut shared = lock(&self.shared);
        if let Some(active) = shared.retire_active() {
            info!(payment_id = active.payment_id(), "cancelling payment monitoring");
            shared.state = FlowState::Cancelled;
        }
    }

    fn build_request(&self, amount_text: &str, token_symbol: &str) -> Result<PaymentRequest> {
        let recipient = self
            .recipient
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .ok_or_else(|| {
                PaymentError::ValidationError("Invalid wallet address or amount".to_string())
            })?;

        let amount = Amount::parse(amount_text)?;

        let token_symbol = token_symbol.trim();
        if token_symbol.is_empty() {
            return Err(PaymentError::ValidationError("Please select a coin".to_string()));
        }

        Ok(PaymentRequest::new(recipient, amount, token_symbol))
    }

    fn finish_hook(&self, generation: u64) -> monitor::FinishHook {
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();
        Box::new(move |outcome: &MonitorOutcome| {
            let mut shared = lock(&shared);
            if shared.generation != generation {
                return;
            }
            shared.active = None;
            match outcome {
                MonitorOutcome::Completed(settlement) => {
                    shared.state = FlowState::Completed;
                    let _ = events.send(FlowEvent::Completed(settlement.clone()));
                }
                MonitorOutcome::TimedOut => {
                    shared.state = FlowState::TimedOut;
                    let _ = events.send(FlowEvent::TimedOut);
                }
                MonitorOutcome::Cancelled => {
                    shared.state = FlowState::Cancelled;
                }
            }
        })
    }

    fn set_state(&self, state: FlowState) {
        lock(&self.shared).state = state;
    }

    fn emit(&self, event: FlowEvent) {
        // Nobody listening is not an error for the flow itself.
        let _ = self.events.send(event);
    }
}

impl Drop for PaymentFlowController {
    fn drop(&mut self) {
        lock(&self.shared).retire_active();
    }
}
