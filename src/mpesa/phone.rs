//! MSISDN normalisation
//!
//! The provider only accepts `2547XXXXXXXX` / `2541XXXXXXXX`. Accepted
//! inputs: `+254…`, `254…`, `07…`, `01…`, `7…`, `1…`, with optional spaces
//! or dashes.

use crate::error::PaymentError;

const COUNTRY_CODE: &str = "254";
const SUBSCRIBER_LEN: usize = 9;

pub fn normalize_msisdn(raw: &str) -> Result<String, PaymentError> {
    let invalid = || PaymentError::Validation(format!("invalid phone number: {}", raw));

    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let subscriber = if let Some(rest) = digits.strip_prefix(COUNTRY_CODE) {
        rest
    } else if let Some(rest) = digits.strip_prefix('0') {
        rest
    } else {
        digits
    };

    if subscriber.len() != SUBSCRIBER_LEN || !matches!(subscriber.as_bytes()[0], b'7' | b'1') {
        return Err(invalid());
    }
    Ok(format!("{}{}", COUNTRY_CODE, subscriber))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_forms() {
        for input in [
            "+254700000000",
            "254700000000",
            "0700000000",
            "700000000",
            "0700 000 000",
            "+254-700-000-000",
        ] {
            assert_eq!(normalize_msisdn(input).unwrap(), "254700000000", "{}", input);
        }
        assert_eq!(normalize_msisdn("0110123456").unwrap(), "254110123456");
    }

    #[test]
    fn test_rejected_forms() {
        for input in ["", "+", "25470000000", "0800000000", "+1 202 555 0100", "07000000ab"] {
            let err = normalize_msisdn(input).unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR", "{}", input);
        }
    }
}
