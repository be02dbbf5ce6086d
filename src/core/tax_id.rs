//! National tax-ID checksum validation.
//!
//! Two forms share one modulo-11 family: the 11-digit individual form
//! (primary) and the 14-digit legal-entity form (secondary). Display
//! separators such as `.`, `-` and `/` are ignored.

use serde::{Deserialize, Serialize};

const PRIMARY_LEN: usize = 11;
const SECONDARY_LEN: usize = 14;

/// Which tax-ID form a value is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxIdKind {
    /// 11-digit individual taxpayer ID.
    Primary,
    /// 14-digit legal-entity ID.
    Secondary,
}

/// Strip everything except ASCII digits.
///
/// ```
/// assert_eq!(cardwise::core::normalize_tax_id("529.982.247-25"), "52998224725");
/// ```
pub fn normalize_tax_id(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validate an 11-digit individual tax ID.
///
/// Non-digits are stripped first. Wrong length and repeated-digit
/// sequences such as `"11111111111"` are rejected.
pub fn is_valid_tax_id_primary(value: &str) -> bool {
    let Some(digits) = checked_digits(value, PRIMARY_LEN) else {
        return false;
    };

    let first = check_digit(&digits[..9], |i| 10 - i as u32);
    let second = check_digit(&digits[..10], |i| 11 - i as u32);

    first == digits[9] && second == digits[10]
}

/// Validate a 14-digit legal-entity tax ID.
///
/// Weights run from `n - 7` down to 2 and wrap to 9, where `n` is the
/// number of digits being summed (12 for the first check digit, 13 for
/// the second).
pub fn is_valid_tax_id_secondary(value: &str) -> bool {
    let Some(digits) = checked_digits(value, SECONDARY_LEN) else {
        return false;
    };

    let first = check_digit(&digits[..12], cyclic_weight(12));
    let second = check_digit(&digits[..13], cyclic_weight(13));

    first == digits[12] && second == digits[13]
}

/// Identify which form a value is, or `None` if it is valid as neither.
pub fn classify_tax_id(value: &str) -> Option<TaxIdKind> {
    if is_valid_tax_id_primary(value) {
        Some(TaxIdKind::Primary)
    } else if is_valid_tax_id_secondary(value) {
        Some(TaxIdKind::Secondary)
    } else {
        None
    }
}

/// Digits of `value` if it has exactly `len` of them and they are not all equal.
fn checked_digits(value: &str, len: usize) -> Option<Vec<u32>> {
    let digits: Vec<u32> = value.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != len {
        return None;
    }
    if digits.iter().all(|&d| d == digits[0]) {
        return None;
    }
    Some(digits)
}

fn check_digit(digits: &[u32], weight: impl Fn(usize) -> u32) -> u32 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| d * weight(i))
        .sum();
    let remainder = sum % 11;
    if remainder < 2 { 0 } else { 11 - remainder }
}

/// Weight for position `i` when summing the first `n` digits: starts at
/// `n - 7`, decrements to 2, then restarts at 9.
fn cyclic_weight(n: usize) -> impl Fn(usize) -> u32 {
    move |i| {
        let start = (n - 7) as u32;
        let steps = i as u32;
        if steps <= start - 2 {
            start - steps
        } else {
            9 - (steps - (start - 1)) % 8
        }
    }
}
