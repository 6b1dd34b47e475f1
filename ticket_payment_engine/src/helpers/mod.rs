//! Normalisation and validation helpers for checkout contact fields.
//!
//! Phone numbers arrive in any format people type them in ("+380 67 123 45 67", "0671234567",
//! "067-123-45-67"). Matching compares the trailing nine digits, which is the national significant
//! number for Ukrainian mobiles regardless of how the prefix was written.

use regex::Regex;
use std::sync::OnceLock;

use crate::db_types::OrderKind;

/// Digits compared when deciding whether two phone numbers refer to the same line.
pub const PHONE_MATCH_DIGITS: usize = 9;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

/// Trims and lowercases an email address. Returns `None` if the result does not look like an email.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    if email_regex().is_match(&email) {
        Some(email)
    } else {
        None
    }
}

/// Strips a phone number down to its digits. Returns `None` if fewer than [`PHONE_MATCH_DIGITS`] remain.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= PHONE_MATCH_DIGITS {
        Some(digits)
    } else {
        None
    }
}

/// The trailing digits of a phone number used for matching.
pub fn phone_tail(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let skip = digits.len().saturating_sub(PHONE_MATCH_DIGITS);
    digits.chars().skip(skip).collect()
}

/// Whether two phone numbers refer to the same line, comparing trailing digits only.
pub fn phones_match(a: &str, b: &str) -> bool {
    let (ta, tb) = (phone_tail(a), phone_tail(b));
    !ta.is_empty() && ta == tb
}

/// Builds the gateway order reference for an order, e.g. `TICKET_42_1718000000`. The unix-time suffix
/// keeps references unique across database resets.
pub fn new_order_reference(kind: OrderKind, order_id: i64) -> String {
    format!("{}_{order_id}_{}", kind.reference_prefix(), chrono::Utc::now().timestamp())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn emails_are_lowercased_and_trimmed() {
        assert_eq!(normalize_email("  Olena@Example.COM "), Some("olena@example.com".into()));
        assert_eq!(normalize_email("not-an-email"), None);
        assert_eq!(normalize_email("two@@example.com"), None);
    }

    #[test]
    fn phone_formats_match() {
        assert!(phones_match("+380 67 123 45 67", "0671234567"));
        assert!(phones_match("380671234567", "067-123-45-67"));
        assert!(!phones_match("0671234567", "0671234568"));
        assert!(!phones_match("", "0671234567"));
    }

    #[test]
    fn short_phones_are_rejected() {
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("+380671234567"), Some("380671234567".into()));
    }

    #[test]
    fn reference_carries_prefix_and_id() {
        let r = new_order_reference(OrderKind::Ticket, 42);
        assert!(r.starts_with("TICKET_42_"));
        let r = new_order_reference(OrderKind::Subscription, 7);
        assert!(r.starts_with("SUB_7_"));
    }
}
