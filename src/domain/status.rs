use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    #[default]
    Pending,
    Completed,
    #[serde(other)]
    Other,
}

/// A snapshot of a payment's settlement state as reported by the service.
///
/// Fields other than `verified_at` decode leniently: a null or mistyped
/// value falls back to its default instead of failing the whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub status: StatusKind,
    /// Both the merchant transfer and the fee transfer are confirmed on-chain.
    #[serde(
        default,
        alias = "dualTransferCompleted",
        deserialize_with = "lenient"
    )]
    pub dual_transfer_completed: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub signature: Option<String>,
    #[serde(
        default,
        alias = "verifiedAt",
        deserialize_with = "deserialize_timestamp"
    )]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient")]
    pub token: Option<String>,
}

/// A completion the client has accepted for one payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub payment_id: String,
    pub signature: String,
    pub verified_at: DateTime<Utc>,
    pub amount: Option<Decimal>,
    pub token: Option<String>,
}

impl PaymentStatus {
    /// Returns the signature and verification time if this snapshot claims
    /// settlement.
    ///
    /// A completed dual transfer is the primary signal; `status == completed`
    /// is accepted as a fallback. Either way a non-empty signature and a
    /// verification timestamp are required. Freshness against the attempt's
    /// creation time is checked by the polling session, not here.
    pub fn settlement_proof(&self) -> Option<(&str, DateTime<Utc>)> {
        let claims_settled = self.dual_transfer_completed || self.status == StatusKind::Completed;
        if !claims_settled {
            return None;
        }

        let signature = self.signature.as_deref().map(str::trim)?;
        if signature.is_empty() {
            return None;
        }

        self.verified_at.map(|at| (signature, at))
    }

    pub fn into_settlement(self, signature: &str, verified_at: DateTime<Utc>) -> Settlement {
        Settlement {
            payment_id: self.id,
            signature: signature.to_string(),
            verified_at,
            amount: self.amount,
            token: self.token,
        }
    }
}

/// Decodes `T`, or its default when the value is null or has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

/// Accepts RFC 3339 strings or Unix timestamps in milliseconds.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawTimestamp> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(RawTimestamp::Millis(millis)) => DateTime::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {millis}"))),
        Some(RawTimestamp::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RawTimestamp::Text(text)) => DateTime::parse_from_rfc3339(text.trim())
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn status(value: serde_json::Value) -> PaymentStatus {
        serde_json::from_value(value).expect("Failed to deserialize status")
    }

    #[test]
    fn test_status_defaults() {
        let parsed = status(json!({ "id": "p1", "status": "pending" }));
        assert_eq!(parsed.status, StatusKind::Pending);
        assert!(!parsed.dual_transfer_completed);
        assert_eq!(parsed.signature, None);
        assert_eq!(parsed.verified_at, None);
    }

    #[test]
    fn test_unknown_status_maps_to_other() {
        let parsed = status(json!({ "id": "p1", "status": "refunded" }));
        assert_eq!(parsed.status, StatusKind::Other);
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let text = status(json!({ "id": "p1", "verified_at": "2026-03-01T12:00:00Z" }));
        assert_eq!(text.verified_at, Some(expected));

        let offset = status(json!({ "id": "p1", "verified_at": "2026-03-01T14:00:00+02:00" }));
        assert_eq!(offset.verified_at, Some(expected));

        let millis = status(json!({ "id": "p1", "verifiedAt": expected.timestamp_millis() }));
        assert_eq!(millis.verified_at, Some(expected));

        let null = status(json!({ "id": "p1", "verified_at": null }));
        assert_eq!(null.verified_at, None);
    }

    #[test]
    fn test_camel_case_aliases() {
        let parsed = status(json!({
            "id": "p1",
            "status": "pending",
            "dualTransferCompleted": true,
            "signature": "5sig",
            "verifiedAt": "2026-03-01T12:00:00Z"
        }));
        assert!(parsed.dual_transfer_completed);
        assert!(parsed.settlement_proof().is_some());
    }

    #[test]
    fn test_settlement_proof_requires_signature_and_timestamp() {
        let no_signature = status(json!({
            "id": "p1",
            "status": "completed",
            "verified_at": "2026-03-01T12:00:00Z"
        }));
        assert!(no_signature.settlement_proof().is_none());

        let blank_signature = status(json!({
            "id": "p1",
            "status": "completed",
            "signature": "  ",
            "verified_at": "2026-03-01T12:00:00Z"
        }));
        assert!(blank_signature.settlement_proof().is_none());

        let no_timestamp = status(json!({
            "id": "p1",
            "dual_transfer_completed": true,
            "signature": "5sig"
        }));
        assert!(no_timestamp.settlement_proof().is_none());
    }

    #[test]
    fn test_null_dual_transfer_flag_does_not_block_completion() {
        let parsed = status(json!({
            "status": "completed",
            "dual_transfer_completed": null,
            "signature": "5sig",
            "verified_at": "2026-03-01T12:00:00Z"
        }));
        assert!(!parsed.dual_transfer_completed);
        assert_eq!(parsed.status, StatusKind::Completed);
        assert_eq!(parsed.settlement_proof().map(|(sig, _)| sig), Some("5sig"));
    }

    #[test]
    fn test_malformed_display_fields_are_dropped() {
        let parsed = status(json!({
            "id": "p1",
            "status": null,
            "dual_transfer_completed": "yes",
            "signature": "5sig",
            "verified_at": "2026-03-01T12:00:00Z",
            "amount": "twelve",
            "token": 42
        }));
        assert_eq!(parsed.status, StatusKind::Pending);
        assert!(!parsed.dual_transfer_completed);
        assert_eq!(parsed.amount, None);
        assert_eq!(parsed.token, None);

        let numeric = status(json!({ "id": "p1", "amount": "12.5", "token": "USDC" }));
        assert_eq!(numeric.amount, Some(Decimal::new(125, 1)));
        assert_eq!(numeric.token.as_deref(), Some("USDC"));
    }

    #[test]
    fn test_settlement_proof_paths() {
        let fallback = status(json!({
            "id": "p1",
            "status": "completed",
            "signature": "5sig",
            "verified_at": "2026-03-01T12:00:00Z"
        }));
        assert_eq!(fallback.settlement_proof().map(|(sig, _)| sig), Some("5sig"));

        let pending = status(json!({
            "id": "p1",
            "status": "pending",
            "signature": "5sig",
            "verified_at": "2026-03-01T12:00:00Z"
        }));
        assert!(pending.settlement_proof().is_none());
    }
}
