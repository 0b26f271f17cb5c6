//! Locale-Aware Symbol Ordering
//!
//! Approximates the root-locale collation that a `localeCompare` sort
//! produces for trading symbols, without pulling in ICU:
//!
//! 1. Primary level: whitespace < punctuation/symbols < digits < letters,
//!    letters compared case-insensitively.
//! 2. Tertiary level: at the first case difference, lowercase sorts first.
//! 3. Final tie-break on the raw code points so the order is total.

use std::cmp::Ordering;

/// Punctuation and symbols in root-collation order.
const PUNCTUATION_ORDER: &str = "_-,;:!?.'\"()[]{}@*/\\&#%`^+<=>|~$";

/// Compare two strings the way a locale-aware sort would.
#[must_use]
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(primary_weight)
        .cmp(b.chars().map(primary_weight))
        .then_with(|| a.chars().map(case_weight).cmp(b.chars().map(case_weight)))
        .then_with(|| a.cmp(b))
}

/// Primary collation weight: (character class, position within class).
fn primary_weight(c: char) -> (u8, u32) {
    if c.is_whitespace() {
        return (0, u32::from(c));
    }
    if let Some(index) = PUNCTUATION_ORDER.find(c) {
        #[allow(clippy::cast_possible_truncation)]
        return (1, index as u32);
    }
    if let Some(digit) = c.to_digit(10) {
        return (3, digit);
    }
    if c.is_alphabetic() {
        let folded = c.to_lowercase().next().unwrap_or(c);
        return (4, u32::from(folded));
    }
    // Remaining symbols sort after the known punctuation, by code point.
    (2, u32::from(c))
}

fn case_weight(c: char) -> u8 {
    u8::from(c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("ALPHA", "ZETA", Ordering::Less ; "plain letters")]
    #[test_case("ZETA", "ALPHA", Ordering::Greater ; "reversed")]
    #[test_case("INFY", "INFY", Ordering::Equal ; "identical")]
    #[test_case("M&M", "M&MFIN", Ordering::Less ; "prefix sorts first")]
    #[test_case("3MINDIA", "AARTIIND", Ordering::Less ; "digits before letters")]
    #[test_case("BAJAJ-AUTO", "BAJAJFINSV", Ordering::Less ; "hyphen before letters")]
    #[test_case("abb", "ABC", Ordering::Less ; "case-insensitive primary")]
    #[test_case("abc", "ABC", Ordering::Less ; "lowercase first on tie")]
    #[test_case("A-1", "A1", Ordering::Less ; "punctuation before digits")]
    #[test_case("NIFTY 50", "NIFTY-50", Ordering::Less ; "space before punctuation")]
    fn ordering(a: &str, b: &str, expected: Ordering) {
        assert_eq!(locale_cmp(a, b), expected);
    }

    #[test]
    fn differs_from_byte_order_for_mixed_case() {
        // Byte order puts every uppercase letter before any lowercase one.
        assert_eq!("ABC".cmp("abb"), Ordering::Less);
        assert_eq!(locale_cmp("ABC", "abb"), Ordering::Greater);
    }

    #[test]
    fn total_order_on_distinct_strings() {
        assert_ne!(locale_cmp("a\u{e9}", "ae"), Ordering::Equal);
    }
}
