use crate::domain::payment::{FeeInfo, PaymentRecord, PaymentRequest};
use crate::domain::ports::PaymentGateway;
use crate::domain::status::{PaymentStatus, StatusKind};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

const SANDBOX_FEE_WALLET: &str = "CryptoNowSandboxFeeWallet";

#[derive(Default)]
struct GatewayState {
    payments: HashMap<String, PaymentRecord>,
    requests: Vec<PaymentRequest>,
    create_failures: VecDeque<PaymentError>,
    /// Scripted status responses per payment id; the last entry repeats.
    scripts: HashMap<String, VecDeque<Result<PaymentStatus>>>,
    status_calls: HashMap<String, usize>,
    create_delay: Option<Duration>,
    status_delay: Option<Duration>,
    settle_after: Option<usize>,
}

/// A scripted, in-process payment service.
///
/// Uses `Arc<RwLock<..>>` so clones share state: tests keep one clone to
/// script responses and inspect calls while the controller owns another.
/// Also backs the binary's sandbox mode.
#[derive(Clone)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<GatewayState>>,
    create_calls: Arc<AtomicUsize>,
    status_checks: Arc<AtomicUsize>,
    status_in_flight: Arc<AtomicUsize>,
    peak_status_in_flight: Arc<AtomicUsize>,
    available: Arc<AtomicBool>,
}

/// Counts one status call as in flight until dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(current, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for InMemoryPaymentGateway {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            create_calls: Arc::default(),
            status_checks: Arc::default(),
            status_in_flight: Arc::default(),
            peak_status_in_flight: Arc::default(),
            available: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl InMemoryPaymentGateway {
    /// Creates an empty gateway that reports every payment as pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports created payments as settled once they have been checked
    /// `checks` times.
    pub async fn settle_after(&self, checks: usize) {
        self.state.write().await.settle_after = Some(checks);
    }

    pub async fn set_create_delay(&self, delay: Duration) {
        self.state.write().await.create_delay = Some(delay);
    }

    /// Makes every status call take `delay` before answering.
    pub async fn set_status_delay(&self, delay: Duration) {
        self.state.write().await.status_delay = Some(delay);
    }

    pub async fn fail_next_create(&self, error: PaymentError) {
        self.state.write().await.create_failures.push_back(error);
    }

    /// Appends a scripted response for `payment_id`.
    pub async fn push_status(&self, payment_id: &str, response: Result<PaymentStatus>) {
        self.state
            .write()
            .await
            .scripts
            .entry(payment_id.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Total status checks across all payments.
    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }

    /// Highest number of status calls that were ever running at once.
    pub fn peak_status_in_flight(&self) -> usize {
        self.peak_status_in_flight.load(Ordering::SeqCst)
    }

    pub async fn status_calls(&self, payment_id: &str) -> usize {
        self.state
            .read()
            .await
            .status_calls
            .get(payment_id)
            .copied()
            .unwrap_or(0)
    }

    pub async fn created_requests(&self) -> Vec<PaymentRequest> {
        self.state.read().await.requests.clone()
    }

    fn record_for(request: &PaymentRequest, sequence: usize) -> PaymentRecord {
        let id = format!("pay_{sequence:012}");
        PaymentRecord {
            payment_url: format!(
                "solana:{}?amount={}&reference={}",
                request.recipient_address, request.amount, id
            ),
            id,
            amount: request.amount,
            token_symbol: request.token_symbol.clone(),
            fee: FeeInfo {
                amount: Decimal::ONE,
                wallet: SANDBOX_FEE_WALLET.to_string(),
                token_symbol: request.token_symbol.clone(),
            },
            qr_image: None,
        }
    }

    fn settled(record: &PaymentRecord) -> PaymentStatus {
        PaymentStatus {
            id: record.id.clone(),
            status: StatusKind::Completed,
            dual_transfer_completed: true,
            signature: Some(format!("sandbox{}", record.id.replace('_', ""))),
            verified_at: Some(Utc::now()),
            amount: Some(record.amount),
            token: Some(record.token_symbol.clone()),
        }
    }

    fn pending(payment_id: &str) -> PaymentStatus {
        PaymentStatus {
            id: payment_id.to_string(),
            status: StatusKind::Pending,
            dual_transfer_completed: false,
            signature: None,
            verified_at: None,
            amount: None,
            token: None,
        }
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentRecord> {
        let sequence = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = self.state.read().await.create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        state.requests.push(request.clone());
        if let Some(error) = state.create_failures.pop_front() {
            return Err(error);
        }

        let record = Self::record_for(request, sequence);
        state.payments.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.status_in_flight, &self.peak_status_in_flight);

        let delay = self.state.read().await.status_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        let calls = {
            let calls = state.status_calls.entry(payment_id.to_string()).or_insert(0);
            *calls += 1;
            *calls
        };

        if let Some(script) = state.scripts.get_mut(payment_id)
            && let Some(front) = script.front()
        {
            let response = front.clone();
            if script.len() > 1 {
                script.pop_front();
            }
            return response;
        }

        let settle_after = state.settle_after;
        match state.payments.get(payment_id) {
            Some(record) if settle_after.is_some_and(|after| calls > after) => {
                Ok(Self::settled(record))
            }
            Some(_) => Ok(Self::pending(payment_id)),
            None => Err(PaymentError::ServiceError {
                status: 404,
                body: format!("payment {payment_id} not found"),
            }),
        }
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
