//! Request and webhook signing.
//!
//! The gateway contract signs the lexicographically sorted
//! `key=value&...` rendering of a payload with HMAC-SHA256 under the
//! shared merchant secret. Verification recomputes and compares in
//! constant time.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Renders the canonical signature base: keys sorted lexicographically,
/// joined as `key=value&key=value`.
fn signature_base(fields: &BTreeMap<&str, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Signs a field map with HMAC-SHA256, hex-encoded.
pub fn sign_fields(fields: &BTreeMap<&str, String>, secret_key: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret_key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signature_base(fields).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies a signature using constant-time comparison.
pub fn verify_fields(fields: &BTreeMap<&str, String>, signature: &str, secret_key: &str) -> bool {
    let expected = sign_fields(fields, secret_key);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> BTreeMap<&'static str, String> {
        let mut fields = BTreeMap::new();
        fields.insert("amount", "1200.00".to_string());
        fields.insert("order_number", "ORD-AA11BB22CC33".to_string());
        fields.insert("action_code", "00".to_string());
        fields
    }

    #[test]
    fn test_signature_base_is_sorted() {
        assert_eq!(
            signature_base(&fields()),
            "action_code=00&amount=1200.00&order_number=ORD-AA11BB22CC33"
        );
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let secret = "merchant_secret_123";
        let signature = sign_fields(&fields(), secret);
        assert!(verify_fields(&fields(), &signature, secret));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let secret = "merchant_secret_123";
        assert_eq!(sign_fields(&fields(), secret), sign_fields(&fields(), secret));
    }

    #[test]
    fn test_flipping_any_field_breaks_verification() {
        let secret = "merchant_secret_123";
        let signature = sign_fields(&fields(), secret);

        for key in ["amount", "order_number", "action_code"] {
            let mut tampered = fields();
            tampered.insert(key, "tampered".to_string());
            assert!(
                !verify_fields(&tampered, &signature, secret),
                "tampering {key} must invalidate the signature"
            );
        }
    }

    #[test]
    fn test_wrong_secret_fails() {
        let signature = sign_fields(&fields(), "merchant_secret_123");
        assert!(!verify_fields(&fields(), &signature, "other_secret"));
    }
}
