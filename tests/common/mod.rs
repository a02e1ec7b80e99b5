#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, Utc};
use cryptonow_pos::application::controller::PaymentFlowController;
use cryptonow_pos::application::events::FlowEvent;
use cryptonow_pos::config::MonitorSettings;
use cryptonow_pos::domain::status::{PaymentStatus, StatusKind};
use cryptonow_pos::infrastructure::in_memory::InMemoryPaymentGateway;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub const RECIPIENT: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";

pub fn controller(
    gateway: &InMemoryPaymentGateway,
) -> (PaymentFlowController, UnboundedReceiver<FlowEvent>) {
    PaymentFlowController::new(
        Arc::new(gateway.clone()),
        MonitorSettings::default(),
        Some(RECIPIENT.to_string()),
    )
}

pub fn pending(payment_id: &str) -> PaymentStatus {
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

/// A dual-transfer completion verified `offset_secs` relative to `created_at`.
pub fn settled(payment_id: &str, created_at: DateTime<Utc>, offset_secs: i64) -> PaymentStatus {
    PaymentStatus {
        id: payment_id.to_string(),
        status: StatusKind::Completed,
        dual_transfer_completed: true,
        signature: Some(format!("sig_{payment_id}_5KtPn1LGuxhFiwjxErkxTb")),
        verified_at: Some(created_at + TimeDelta::seconds(offset_secs)),
        amount: None,
        token: None,
    }
}

/// Everything emitted so far, without waiting.
pub fn drain(events: &mut UnboundedReceiver<FlowEvent>) -> Vec<FlowEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
