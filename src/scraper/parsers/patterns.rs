//! Free-text matchers for listing fields whose markup is unreliable.

use regex::Regex;
use std::sync::LazyLock;

/// Optional `+`, a digit, then at least six more digits or separators
static PHONE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d\-\s()]{6,}").expect("valid regex"));

/// `1,234 reviews`, `12 review`
static REVIEW_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d[\d,]*)\s*reviews?\b").expect("valid regex"));

/// Accessibility labels like `4.5 stars`
static STAR_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*stars?").expect("valid regex"));

static LEADING_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid regex"));

/// Minimum digits for text to count as a phone number
pub const MIN_PHONE_DIGITS: usize = 7;

/// True when `text` contains a phone-number shaped run with enough digits
pub fn looks_like_phone(text: &str) -> bool {
    PHONE_SHAPE
        .find_iter(text)
        .any(|m| digit_count(m.as_str()) >= MIN_PHONE_DIGITS)
}

/// True when `text` reads like a domain name
pub fn looks_like_domain(text: &str) -> bool {
    text.contains('.')
}

/// Review count with thousands separators removed
pub fn review_count(text: &str) -> Option<String> {
    let caps = REVIEW_COUNT.captures(text)?;
    let digits: String = caps[1].chars().filter(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}

/// Rating from a `N stars` label
pub fn rating_from_label(label: &str) -> Option<String> {
    STAR_LABEL.captures(label).map(|caps| caps[1].to_string())
}

/// First decimal number in free text
pub fn leading_decimal(text: &str) -> Option<String> {
    LEADING_DECIMAL.find(text).map(|m| m.as_str().to_string())
}

pub fn digit_count(text: &str) -> usize {
    text.chars().filter(char::is_ascii_digit).count()
}
