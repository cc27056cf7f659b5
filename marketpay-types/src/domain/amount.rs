//! Type-safe monetary value in Algerian dinars.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Errors produced when constructing or parsing an [`Amount`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount cannot be negative")]
    Negative,

    #[error("Amount supports at most two decimal places")]
    TooManyDecimals,

    #[error("Malformed amount: {0}")]
    Malformed(String),
}

/// A DZD amount stored in centimes (smallest currency unit).
///
/// All arithmetic and wire conversion happens on the integer centime
/// value to avoid floating-point precision issues. The gateway receives
/// the centime value directly (decimal dinars times 100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Creates an Amount from a centime count.
    pub fn from_centimes(centimes: i64) -> Result<Self, AmountError> {
        if centimes < 0 {
            return Err(AmountError::Negative);
        }
        Ok(Self(centimes))
    }

    /// Creates an Amount from a whole number of dinars.
    pub fn from_dinars(dinars: i64) -> Result<Self, AmountError> {
        if dinars < 0 {
            return Err(AmountError::Negative);
        }
        dinars
            .checked_mul(100)
            .map(Self)
            .ok_or_else(|| AmountError::Malformed(dinars.to_string()))
    }

    /// Returns the amount in centimes, the unit transmitted to the gateway.
    pub fn centimes(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(&self, other: Amount) -> Option<Amount> {
        if self.0 < other.0 {
            return None;
        }
        Some(Amount(self.0 - other.0))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(AmountError::Negative);
        }
        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (s, ""),
        };
        if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::Malformed(s.to_string()));
        }
        if minor.len() > 2 {
            return Err(AmountError::TooManyDecimals);
        }
        if !minor.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::Malformed(s.to_string()));
        }
        let major: i64 = major
            .parse()
            .map_err(|_| AmountError::Malformed(s.to_string()))?;
        let minor: i64 = if minor.is_empty() {
            0
        } else if minor.len() == 1 {
            // "12.5" means 50 centimes
            minor
                .parse::<i64>()
                .map_err(|_| AmountError::Malformed(s.to_string()))?
                * 10
        } else {
            minor
                .parse()
                .map_err(|_| AmountError::Malformed(s.to_string()))?
        };
        let centimes = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| AmountError::Malformed(s.to_string()))?;
        Ok(Self(centimes))
    }
}

// Serialized as a decimal string ("1200.00") so JSON clients never see
// a float. Accepts strings and JSON numbers on the way in.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a decimal DZD amount as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(de::Error::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        let v = i64::try_from(v).map_err(de::Error::custom)?;
        Amount::from_dinars(v).map_err(de::Error::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Amount::from_dinars(v).map_err(de::Error::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        let centimes = (v * 100.0).round();
        if !centimes.is_finite() || centimes < 0.0 || centimes > i64::MAX as f64 {
            return Err(de::Error::custom(AmountError::Malformed(v.to_string())));
        }
        // Reject inputs with more than two decimal places.
        if ((centimes / 100.0) - v).abs() > 1e-6 {
            return Err(de::Error::custom(AmountError::TooManyDecimals));
        }
        Amount::from_centimes(centimes as i64).map_err(de::Error::custom)
    }
}

/// Configured per-transaction bounds, checked before any gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentLimits {
    pub min: Amount,
    pub max: Amount,
}

impl PaymentLimits {
    pub fn contains(&self, amount: Amount) -> bool {
        amount >= self.min && amount <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        for s in ["199.99", "0.01", "500000.00", "1200.00"] {
            let amount: Amount = s.parse().unwrap();
            assert_eq!(amount.to_string(), s);
        }
    }

    #[test]
    fn test_parse_whole_dinars() {
        let amount: Amount = "1200".parse().unwrap();
        assert_eq!(amount.centimes(), 120_000);
        assert_eq!(amount.to_string(), "1200.00");
    }

    #[test]
    fn test_parse_single_decimal() {
        let amount: Amount = "12.5".parse().unwrap();
        assert_eq!(amount.centimes(), 1250);
    }

    #[test]
    fn test_parse_rejects_three_decimals() {
        let result = "10.999".parse::<Amount>();
        assert_eq!(result, Err(AmountError::TooManyDecimals));
    }

    #[test]
    fn test_parse_rejects_negative() {
        let result = "-5.00".parse::<Amount>();
        assert_eq!(result, Err(AmountError::Negative));
    }

    #[test]
    fn test_minor_unit_conversion_is_exact() {
        let amount: Amount = "199.99".parse().unwrap();
        assert_eq!(amount.centimes(), 19_999);
        let back = Amount::from_centimes(19_999).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_serde_string_round_trip() {
        let amount: Amount = "1200.00".parse().unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1200.00\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_deserialize_from_number() {
        let amount: Amount = serde_json::from_str("1200").unwrap();
        assert_eq!(amount.centimes(), 120_000);
        let amount: Amount = serde_json::from_str("199.99").unwrap();
        assert_eq!(amount.centimes(), 19_999);
    }

    #[test]
    fn test_checked_sub_refuses_underflow() {
        let a = Amount::from_dinars(10).unwrap();
        let b = Amount::from_dinars(20).unwrap();
        assert!(a.checked_sub(b).is_none());
    }

    #[test]
    fn test_limits_contains() {
        let limits = PaymentLimits {
            min: Amount::from_dinars(100).unwrap(),
            max: Amount::from_dinars(500_000).unwrap(),
        };
        assert!(!limits.contains(Amount::from_dinars(50).unwrap()));
        assert!(limits.contains(Amount::from_dinars(100).unwrap()));
        assert!(!limits.contains(Amount::from_dinars(600_000).unwrap()));
    }
}
