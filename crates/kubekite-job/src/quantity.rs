//! Kubernetes resource quantity parsing
//!
//! Accepts the apimachinery quantity grammar:
//!
//! ```text
//! <quantity>        ::= <signedNumber><suffix>
//! <number>          ::= <digits> | <digits>.<digits> | <digits>. | .<digits>
//! <suffix>          ::= <binarySI> | <decimalExponent> | <decimalSI>
//! <binarySI>        ::= Ki | Mi | Gi | Ti | Pi | Ei
//! <decimalSI>       ::= n | u | m | "" | k | M | G | T | P | E
//! <decimalExponent> ::= "e" <signedNumber> | "E" <signedNumber>
//! ```
//!
//! The accepted text is kept verbatim; the API server canonicalizes it.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

const BINARY_SI: &[&str] = &["Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];
const DECIMAL_SI: &[&str] = &["n", "u", "m", "", "k", "M", "G", "T", "P", "E"];

/// Why a quantity string was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("quantity '{0}' has no numeric part")]
    MissingNumber(String),
    #[error("quantity '{0}' has a malformed number")]
    MalformedNumber(String),
    #[error("quantity '{0}' has an unknown suffix '{1}'")]
    UnknownSuffix(String, String),
}

/// Parse `input` as a Kubernetes quantity.
pub fn parse_quantity(input: &str) -> Result<Quantity, QuantityError> {
    if input.is_empty() {
        return Err(QuantityError::Empty);
    }

    let split = number_end(input);
    let (number, suffix) = input.split_at(split);

    if !is_signed_decimal(number) {
        return Err(if number.chars().any(|c| c.is_ascii_digit()) {
            QuantityError::MalformedNumber(input.to_string())
        } else {
            QuantityError::MissingNumber(input.to_string())
        });
    }

    if !is_suffix(suffix) {
        return Err(QuantityError::UnknownSuffix(
            input.to_string(),
            suffix.to_string(),
        ));
    }

    Ok(Quantity(input.to_string()))
}

/// Byte offset where the numeric part ends
fn number_end(input: &str) -> usize {
    input
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '+' || c == '-'))))
        .map(|(i, _)| i)
        .unwrap_or(input.len())
}

fn is_signed_decimal(s: &str) -> bool {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let mut parts = unsigned.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let frac = parts.next();

    let digits_only = |p: &str| p.chars().all(|c| c.is_ascii_digit());
    match frac {
        None => !whole.is_empty() && digits_only(whole),
        Some(frac) => {
            (!whole.is_empty() || !frac.is_empty()) && digits_only(whole) && digits_only(frac)
        }
    }
}

fn is_suffix(suffix: &str) -> bool {
    if BINARY_SI.contains(&suffix) || DECIMAL_SI.contains(&suffix) {
        return true;
    }
    // Decimal exponent: e/E followed by a signed integer
    match suffix.strip_prefix(['e', 'E']) {
        Some(exp) => {
            let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}
