//! Card format rules for the networks the gateway accepts.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Card networks handled by the national gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardNetwork {
    Cib,
    Edahabia,
}

impl AsRef<str> for CardNetwork {
    fn as_ref(&self) -> &str {
        match self {
            CardNetwork::Cib => "CIB",
            CardNetwork::Edahabia => "EDAHABIA",
        }
    }
}

impl std::fmt::Display for CardNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Card validation failures. All of these are local checks; a card that
/// fails here is never sent to the gateway.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CardError {
    #[error("Invalid card number for {network}: {reason}")]
    InvalidNumber {
        network: CardNetwork,
        reason: &'static str,
    },

    #[error("Card is expired")]
    Expired,

    #[error("Invalid expiry date")]
    InvalidExpiry,

    #[error("Invalid CVV for {0}")]
    InvalidCvv(CardNetwork),
}

// CIB PANs are 19 digits on the national issuer prefix; EDAHABIA cards
// are 16 digits.
const CIB_PAN_LENGTH: usize = 19;
const CIB_ISSUER_PREFIX: char = '6';
const EDAHABIA_PAN_LENGTH: usize = 16;

/// Strips whitespace from a card number as typed by the user.
pub fn normalize_card_number(number: &str) -> String {
    number.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Validates a card number against the network's length and prefix rules.
pub fn validate_card_number(network: CardNetwork, number: &str) -> Result<(), CardError> {
    let digits = normalize_card_number(number);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(CardError::InvalidNumber {
            network,
            reason: "must contain only digits",
        });
    }
    match network {
        CardNetwork::Cib => {
            if digits.len() != CIB_PAN_LENGTH {
                return Err(CardError::InvalidNumber {
                    network,
                    reason: "must be exactly 19 digits",
                });
            }
            if !digits.starts_with(CIB_ISSUER_PREFIX) {
                return Err(CardError::InvalidNumber {
                    network,
                    reason: "does not match the CIB issuer prefix",
                });
            }
        }
        CardNetwork::Edahabia => {
            if digits.len() != EDAHABIA_PAN_LENGTH {
                return Err(CardError::InvalidNumber {
                    network,
                    reason: "must be exactly 16 digits",
                });
            }
        }
    }
    Ok(())
}

/// Validates a 1-based month and 2-digit year expiry pair.
///
/// The card is valid through the end of its expiry month.
pub fn validate_expiry(month: u32, year: u32) -> Result<(), CardError> {
    if !(1..=12).contains(&month) || year > 99 {
        return Err(CardError::InvalidExpiry);
    }
    let year = 2000 + year as i32;
    let (boundary_year, boundary_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let boundary = NaiveDate::from_ymd_opt(boundary_year, boundary_month, 1)
        .ok_or(CardError::InvalidExpiry)?;
    if boundary <= Utc::now().date_naive() {
        return Err(CardError::Expired);
    }
    Ok(())
}

/// Validates the CVV: 3 digits for CIB, 3-4 for EDAHABIA.
pub fn validate_cvv(network: CardNetwork, value: &str) -> Result<(), CardError> {
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(CardError::InvalidCvv(network));
    }
    let valid = match network {
        CardNetwork::Cib => value.len() == 3,
        CardNetwork::Edahabia => (3..=4).contains(&value.len()),
    };
    if !valid {
        return Err(CardError::InvalidCvv(network));
    }
    Ok(())
}

/// Card details as submitted for a direct charge. Never persisted; only
/// the last four digits survive into the payment detail record.
#[derive(Debug, Clone, Deserialize)]
pub struct CardDetails {
    pub network: CardNetwork,
    pub number: String,
    pub holder_name: String,
    pub expiry_month: u32,
    pub expiry_year: u32,
    pub cvv: String,
}

impl CardDetails {
    /// Validates all fields; the first failure wins.
    pub fn validate(&self) -> Result<(), CardError> {
        validate_card_number(self.network, &self.number)?;
        validate_expiry(self.expiry_month, self.expiry_year)?;
        validate_cvv(self.network, &self.cvv)
    }

    /// The last four digits of the normalized card number.
    pub fn last4(&self) -> String {
        let digits = normalize_card_number(&self.number);
        let start = digits.len().saturating_sub(4);
        digits[start..].to_string()
    }
}

/// Helper for picking a far-future expiry year in tests and fixtures.
pub fn current_two_digit_year() -> u32 {
    (Utc::now().year() % 100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cib_number() -> String {
        format!("6{}", "2".repeat(18))
    }

    #[test]
    fn test_cib_number_valid() {
        assert!(validate_card_number(CardNetwork::Cib, &cib_number()).is_ok());
    }

    #[test]
    fn test_cib_number_whitespace_stripped() {
        let spaced = "6222 2222 2222 2222 222";
        assert!(validate_card_number(CardNetwork::Cib, spaced).is_ok());
    }

    #[test]
    fn test_cib_number_wrong_length() {
        let result = validate_card_number(CardNetwork::Cib, "62222");
        assert!(matches!(result, Err(CardError::InvalidNumber { .. })));
    }

    #[test]
    fn test_cib_number_wrong_prefix() {
        let number = format!("5{}", "2".repeat(18));
        let result = validate_card_number(CardNetwork::Cib, &number);
        assert!(matches!(result, Err(CardError::InvalidNumber { .. })));
    }

    #[test]
    fn test_edahabia_number_valid() {
        assert!(validate_card_number(CardNetwork::Edahabia, &"6".repeat(16)).is_ok());
    }

    #[test]
    fn test_edahabia_number_wrong_length() {
        let result = validate_card_number(CardNetwork::Edahabia, &"6".repeat(19));
        assert!(matches!(result, Err(CardError::InvalidNumber { .. })));
    }

    #[test]
    fn test_expiry_future_is_valid() {
        let year = current_two_digit_year() + 3;
        assert!(validate_expiry(6, year).is_ok());
    }

    #[test]
    fn test_expiry_past_is_expired() {
        assert_eq!(validate_expiry(1, 20), Err(CardError::Expired));
    }

    #[test]
    fn test_expiry_bad_month() {
        assert_eq!(validate_expiry(13, 30), Err(CardError::InvalidExpiry));
        assert_eq!(validate_expiry(0, 30), Err(CardError::InvalidExpiry));
    }

    #[test]
    fn test_cvv_rules() {
        assert!(validate_cvv(CardNetwork::Cib, "123").is_ok());
        assert!(validate_cvv(CardNetwork::Cib, "1234").is_err());
        assert!(validate_cvv(CardNetwork::Edahabia, "123").is_ok());
        assert!(validate_cvv(CardNetwork::Edahabia, "1234").is_ok());
        assert!(validate_cvv(CardNetwork::Edahabia, "12345").is_err());
        assert!(validate_cvv(CardNetwork::Cib, "12a").is_err());
    }

    #[test]
    fn test_last4() {
        let card = CardDetails {
            network: CardNetwork::Cib,
            number: "6222 2222 2222 2221 111".to_string(),
            holder_name: "A HOLDER".to_string(),
            expiry_month: 6,
            expiry_year: current_two_digit_year() + 2,
            cvv: "123".to_string(),
        };
        assert_eq!(card.last4(), "1111");
    }
}
