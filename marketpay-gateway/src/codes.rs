//! Gateway action-code translation.
//!
//! This table is the wire contract with the card network; the numeric
//! codes and their meaning must not drift.

/// Normalized meaning of a gateway action/response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeOutcome {
    pub approved: bool,
    pub message: &'static str,
}

/// Maps a gateway action code to its outcome. Unknown codes fail with
/// a generic message.
pub fn action_code_outcome(code: &str) -> CodeOutcome {
    match code {
        "00" => CodeOutcome {
            approved: true,
            message: "Approved",
        },
        "05" => CodeOutcome {
            approved: false,
            message: "Authorization refused",
        },
        "51" => CodeOutcome {
            approved: false,
            message: "Insufficient funds",
        },
        "54" | "33" => CodeOutcome {
            approved: false,
            message: "Card expired",
        },
        "61" | "65" => CodeOutcome {
            approved: false,
            message: "Transaction limit exceeded",
        },
        "91" => CodeOutcome {
            approved: false,
            message: "Card issuer unavailable",
        },
        "96" => CodeOutcome {
            approved: false,
            message: "System error",
        },
        _ => CodeOutcome {
            approved: false,
            message: "Payment failed",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approved_code() {
        let outcome = action_code_outcome("00");
        assert!(outcome.approved);
        assert_eq!(outcome.message, "Approved");
    }

    #[test]
    fn test_decline_codes() {
        for (code, message) in [
            ("05", "Authorization refused"),
            ("51", "Insufficient funds"),
            ("54", "Card expired"),
            ("33", "Card expired"),
            ("61", "Transaction limit exceeded"),
            ("65", "Transaction limit exceeded"),
            ("91", "Card issuer unavailable"),
            ("96", "System error"),
        ] {
            let outcome = action_code_outcome(code);
            assert!(!outcome.approved, "{code} must not be approved");
            assert_eq!(outcome.message, message);
        }
    }

    #[test]
    fn test_unknown_code_defaults_to_failure() {
        let outcome = action_code_outcome("42");
        assert!(!outcome.approved);
        assert_eq!(outcome.message, "Payment failed");
    }
}
