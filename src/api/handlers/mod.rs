//! API handlers and shared validation helpers.

pub mod auth;
pub mod health;
pub mod me;
pub mod root;

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern"));

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("username pattern"));

/// Lightweight email sanity check used before persisting anything.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Usernames are 3-30 characters: letters, digits, underscores.
#[must_use]
pub fn valid_username(username: &str) -> bool {
    USERNAME_PATTERN.is_match(username)
}

/// Minimum password bar: 8 characters with at least one letter and one digit.
#[must_use]
pub fn valid_password(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_simple() {
        assert!(valid_email("user@example.com"));
    }

    #[test]
    fn valid_email_rejects_missing_at() {
        assert!(!valid_email("user.example.com"));
        assert!(!valid_email("user@example"));
        assert!(!valid_email("us er@example.com"));
    }

    #[test]
    fn valid_username_bounds() {
        assert!(valid_username("alice"));
        assert!(valid_username("alice_2"));
        assert!(!valid_username("al"));
        assert!(!valid_username(&"a".repeat(31)));
        assert!(!valid_username("alice!"));
    }

    #[test]
    fn valid_password_needs_letter_and_digit() {
        assert!(valid_password("hunter2hunter2"));
        assert!(!valid_password("short1a"));
        assert!(!valid_password("allletters"));
        assert!(!valid_password("1234567890"));
    }
}
