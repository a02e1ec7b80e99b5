//! HTTP adapter for the CryptoNow payment service.
//!
//! Endpoints:
//! - `POST /api/payment/create` creates a payment
//! - `GET /api/payment/{id}/status` reports its settlement state
//! - `GET /api/test` is the liveness probe
//!
//! Successful bodies are wrapped as `{"success": true, "data": ...}`.

use crate::config::ClientConfig;
use crate::domain::payment::{FeeInfo, PaymentRecord, PaymentRequest};
use crate::domain::ports::PaymentGateway;
use crate::domain::status::PaymentStatus;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

// The payment URL is optional here so that its absence surfaces as a
// protocol error rather than a generic decode failure.
#[derive(Deserialize)]
struct CreatedPayment {
    id: String,
    solana_pay_url: Option<String>,
    amount: Decimal,
    token: String,
    fee_info: FeeInfo,
    #[serde(default)]
    qr_code: Option<String>,
}

impl TryFrom<CreatedPayment> for PaymentRecord {
    type Error = PaymentError;

    fn try_from(created: CreatedPayment) -> Result<Self> {
        let payment_url = created
            .solana_pay_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                PaymentError::ProtocolError(
                    "Invalid server response - missing payment URL".to_string(),
                )
            })?;

        Ok(Self {
            id: created.id,
            payment_url,
            amount: created.amount,
            token_symbol: created.token,
            fee: created.fee_info,
            qr_image: created.qr_code.filter(|image| !image.is_empty()),
        })
    }
}

/// Talks to the payment service over HTTPS with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: Url,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| PaymentError::ConfigError(format!("invalid server URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(PaymentError::ConfigError(format!(
                "server URL cannot be used as a base: {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PaymentError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(&config.server_url, config.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PaymentError::ConfigError(format!("server URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_data<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::ServiceError {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            PaymentError::ProtocolError(format!("unexpected response body: {e}"))
        })?;

        if !envelope.success {
            return Err(PaymentError::ProtocolError(
                envelope
                    .error
                    .unwrap_or_else(|| "service did not report success".to_string()),
            ));
        }

        envelope.data.ok_or_else(|| {
            PaymentError::ProtocolError("Invalid server response - missing payment data".to_string())
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentRecord> {
        let url = self.endpoint(&["api", "payment", "create"])?;
        debug!(%url, order_id = %request.order_id, "sending payment creation request");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "payment creation request failed");
                PaymentError::ConnectivityError(e.to_string())
            })?;

        debug!(status = %response.status(), "payment creation response received");
        let created: CreatedPayment = Self::read_data(response).await?;
        let record = PaymentRecord::try_from(created)?;

        if !record.payment_url.starts_with("solana:") {
            warn!(url = %record.payment_url, "payment URL does not use the solana: scheme");
        }
        debug!(has_qr_image = record.qr_image.is_some(), "payment record decoded");
        Ok(record)
    }

    async fn payment_status(&self, payment_id: &str) -> Result<PaymentStatus> {
        let url = self.endpoint(&["api", "payment", payment_id, "status"])?;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| PaymentError::ConnectivityError(e.to_string()))?;

        Self::read_data(response).await
    }

    async fn is_available(&self) -> bool {
        let url = match self.endpoint(&["api", "test"]) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "cannot build liveness probe URL");
                return false;
            }
        };

        info!(%url, "testing payment service connection");
        match self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "liveness probe failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "payment service unreachable");
                false
            }
        }
    }
}
