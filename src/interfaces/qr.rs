use crate::domain::payment::PaymentRecord;
use crate::error::{PaymentError, Result};
use reqwest::Url;
use std::fmt;

const QR_SIZE: &str = "300x300";

/// Where the presentation layer gets the QR image for a payment from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrSource {
    /// Image data supplied by the payment service, usually a `data:` URL.
    Inline(String),
    /// An external rendering service that encodes the payment URL.
    Remote(Url),
}

impl QrSource {
    /// Prefers the service's own image and falls back to `qr_service_url`.
    pub fn for_record(record: &PaymentRecord, qr_service_url: &str) -> Result<Self> {
        if let Some(image) = record.qr_image.as_deref().filter(|image| !image.is_empty()) {
            return Ok(Self::Inline(image.to_string()));
        }

        Url::parse_with_params(
            qr_service_url,
            &[("size", QR_SIZE), ("data", record.payment_url.as_str())],
        )
        .map(Self::Remote)
        .map_err(|e| PaymentError::ConfigError(format!("invalid QR service URL: {e}")))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline(_))
    }
}

impl fmt::Display for QrSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(data) => write!(f, "server-provided image ({} bytes)", data.len()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}
