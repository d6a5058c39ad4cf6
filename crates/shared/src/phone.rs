//! Destination number formatting for new conversations.
//!
//! Only one format is accepted: ten digits rendered as `(XXX) XXX-XXXX`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DIGITS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneNumberError {
    #[error("Please enter a complete 10-digit phone number")]
    Incomplete { digits: usize },
    #[error("Phone number has too many digits")]
    TooLong { digits: usize },
}

/// A validated ten-digit number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber {
    digits: String,
}

impl PhoneNumber {
    /// Parse free-form input. Non-digits are ignored and a leading `1`
    /// country digit is stripped first.
    pub fn parse(input: &str) -> Result<Self, PhoneNumberError> {
        let digits = normalize(input);
        match digits.len() {
            DIGITS => Ok(Self { digits }),
            n if n < DIGITS => Err(PhoneNumberError::Incomplete { digits: n }),
            n => Err(PhoneNumberError::TooLong { digits: n }),
        }
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    pub fn area_code(&self) -> &str {
        &self.digits[..3]
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) {}-{}",
            &self.digits[..3],
            &self.digits[3..6],
            &self.digits[6..]
        )
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(number: PhoneNumber) -> Self {
        number.to_string()
    }
}

/// Format a complete number as `(XXX) XXX-XXXX`.
pub fn format_phone_number(input: &str) -> Result<String, PhoneNumberError> {
    PhoneNumber::parse(input).map(|n| n.to_string())
}

/// Format input progressively while the user is still typing, e.g.
/// `"55512"` becomes `"(555) 12"`. Never fails; extra digits are dropped.
pub fn format_as_typed(input: &str) -> String {
    let mut digits = normalize(input);
    digits.truncate(DIGITS);
    match digits.len() {
        0 => String::new(),
        1..=3 => format!("({}", digits),
        4..=6 => format!("({}) {}", &digits[..3], &digits[3..]),
        _ => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
    }
}

fn normalize(input: &str) -> String {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix('1') {
        Some(rest) => rest.to_string(),
        None => digits,
    }
}
