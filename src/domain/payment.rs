use super::amount::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_ORDER_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Generates a time-derived order id (`order_<unix millis>`).
///
/// Two calls within the same millisecond get distinct ids: the second one is
/// bumped to the next free millisecond value.
pub fn next_order_id() -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let mut last = LAST_ORDER_MILLIS.load(Ordering::Relaxed);
    let millis = loop {
        let candidate = now.max(last + 1);
        match LAST_ORDER_MILLIS.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break candidate,
            Err(actual) => last = actual,
        }
    };
    format!("order_{millis}")
}

/// A request to create one payment on the payment service.
///
/// Built once per payment attempt and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRequest {
    #[serde(rename = "recipient")]
    pub recipient_address: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "token")]
    pub token_symbol: String,
    pub label: String,
    pub message: String,
    #[serde(rename = "orderId")]
    pub order_id: String,
}

impl PaymentRequest {
    pub fn new(recipient_address: &str, amount: Amount, token_symbol: &str) -> Self {
        Self::with_order_id(recipient_address, amount, token_symbol, next_order_id())
    }

    pub fn with_order_id(
        recipient_address: &str,
        amount: Amount,
        token_symbol: &str,
        order_id: String,
    ) -> Self {
        Self {
            recipient_address: recipient_address.to_string(),
            amount: amount.value(),
            token_symbol: token_symbol.to_string(),
            label: format!("CryptoNow Payment {amount} {token_symbol}"),
            message: format!("Payment of {amount} {token_symbol} + 1 {token_symbol} CryptoNow fee"),
            order_id,
        }
    }
}

/// Service fee charged on top of the merchant amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeInfo {
    pub amount: Decimal,
    pub wallet: String,
    #[serde(rename = "token")]
    pub token_symbol: String,
}

/// A payment as created by the payment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    /// The Solana Pay URL the customer's wallet should open.
    #[serde(rename = "solana_pay_url")]
    pub payment_url: String,
    pub amount: Decimal,
    #[serde(rename = "token")]
    pub token_symbol: String,
    #[serde(rename = "fee_info")]
    pub fee: FeeInfo,
    /// Pre-rendered QR image (usually a `data:` URL), when the service supplies one.
    #[serde(rename = "qr_code", default, skip_serializing_if = "Option::is_none")]
    pub qr_image: Option<String>,
}

impl PaymentRecord {
    /// The last eight characters of the id, for display.
    pub fn short_id(&self) -> &str {
        let start = self
            .id
            .char_indices()
            .rev()
            .nth(7)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        &self.id[start..]
    }
}
