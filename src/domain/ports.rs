use super::payment::{PaymentRecord, PaymentRequest};
use super::status::PaymentStatus;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The remote payment service, as seen by the payment flow.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment. Called exactly once per attempt, never retried.
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentRecord>;
    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus>;
    /// Liveness probe.
    async fn is_available(&self) -> bool;
}

pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;
