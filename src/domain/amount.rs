use crate::error::AdmissionError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A positive fee amount.
///
/// Wraps `rust_decimal::Decimal` so fees are never represented as binary
/// floats inside the workflow; conversion to a JSON number happens only at
/// the wire boundary.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

/// Admission-test fee charged when a request names no amount.
pub const DEFAULT_FEE: Amount = Amount(dec!(20));

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, AdmissionError> {
        if value > Decimal::ZERO {
            Ok(Self(value.normalize()))
        } else {
            Err(AdmissionError::InvalidAmount(value.to_string()))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Coerces a loosely typed request value into an amount.
    ///
    /// Absent or `null` falls back to `default`. JSON numbers and numeric
    /// strings are accepted; anything else, or a value that is not strictly
    /// positive, is rejected.
    pub fn coerce(value: Option<&Value>, default: Amount) -> Result<Self, AdmissionError> {
        let decimal = match value {
            None | Some(Value::Null) => return Ok(default),
            Some(Value::Number(n)) => parse_decimal(&n.to_string()),
            Some(Value::String(s)) => parse_decimal(s.trim()),
            Some(_) => None,
        };

        match decimal {
            Some(d) => Self::new(d),
            None => Err(AdmissionError::InvalidAmount(
                value.map(Value::to_string).unwrap_or_default(),
            )),
        }
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

impl TryFrom<Decimal> for Amount {
    type Error = AdmissionError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
