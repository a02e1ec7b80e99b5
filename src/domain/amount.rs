use crate::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A positive payment amount as entered by the merchant.
///
/// Wraps `rust_decimal::Decimal` so that amounts are never zero, negative or
/// non-finite once they reach the payment service.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    /// Parses free-form user input.
    ///
    /// Surrounding whitespace is ignored. Both plain (`12.5`) and scientific
    /// (`1.25e1`) notation are accepted.
    pub fn parse(text: &str) -> Result<Self, PaymentError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PaymentError::ValidationError(
                "Please enter a valid amount".to_string(),
            ));
        }

        let value = Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|_| {
                PaymentError::ValidationError("Please enter a valid amount".to_string())
            })?;

        Self::new(value.normalize())
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl FromStr for Amount {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(PaymentError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(PaymentError::ValidationError(_))
        ));
    }

    #[test]
    fn test_parse_trims_and_normalizes() {
        let amount = Amount::parse("  12.50 ").unwrap();
        assert_eq!(amount.value(), dec!(12.5));
        assert_eq!(amount.to_string(), "12.5");
    }

    #[test]
    fn test_parse_scientific_notation() {
        let amount = Amount::parse("2.5e1").unwrap();
        assert_eq!(amount.value(), dec!(25));
    }

    #[test]
    fn test_parse_rejects_non_positive_and_garbage() {
        for input in ["", "   ", "0", "0.000", "-3", "abc", "NaN", "inf", "-inf", "12abc"] {
            assert!(
                matches!(Amount::parse(input), Err(PaymentError::ValidationError(_))),
                "expected {input:?} to be rejected"
            );
        }
    }
}
