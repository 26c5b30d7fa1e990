//! Output escaping, input cleanup, validation predicates and password hashing.
//!
//! Nothing is escaped automatically: every caller interpolating user or
//! database text into markup must pass it through [`escape`] first.

use crate::error::AppError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use regex::Regex;
use std::sync::OnceLock;

const MAX_EMAIL_LEN: usize = 320;

/// HTML-encode `& < > " '`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Strip markup tags and surrounding whitespace from form input.
pub fn clean_input(text: &str) -> String {
    strip_tags(text).trim().to_string()
}

fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match (in_tag, c) {
            (false, '<') => in_tag = true,
            (true, '>') => in_tag = false,
            (false, _) => out.push(c),
            (true, _) => {}
        }
    }
    out
}

pub fn is_not_empty(text: &str) -> bool {
    !text.trim().is_empty()
}

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(
                r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
            )
            .ok()
        })
        .as_ref()
}

/// Address with a dotted domain and no empty local-part segments.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN {
        return false;
    }
    email_pattern().map(|re| re.is_match(email)).unwrap_or(false)
}

/// Argon2id PHC string with a random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Password(e.to_string()))
}

/// False for a wrong password and for a hash that does not parse.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_encodes_reserved_characters() {
        let out = escape("<script>alert('x') & \"y\"</script>");
        assert!(!out.contains('<') && !out.contains('>'));
        assert_eq!(
            out,
            "&lt;script&gt;alert(&#039;x&#039;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
        assert_eq!(escape("Élève n°1"), "Élève n°1");
    }

    #[test]
    fn clean_input_strips_tags_and_trims() {
        assert_eq!(clean_input("  <b>Marie</b> Curie \n"), "Marie Curie");
        assert_eq!(clean_input("a < b"), "a");
    }

    #[test]
    fn not_empty_ignores_whitespace() {
        assert!(is_not_empty(" x "));
        assert!(!is_not_empty(" \t\n"));
        assert!(!is_not_empty(""));
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("marie.curie@example.org"));
        assert!(is_valid_email("first+tag@sub.example.co"));
        assert!(!is_valid_email("marie@localhost"));
        assert!(!is_valid_email("marie..curie@example.org"));
        assert!(!is_valid_email(".marie@example.org"));
        assert!(!is_valid_email("no-at-sign.example.org"));
        assert!(!is_valid_email("marie@-example.org"));
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("s3cret", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("s3cret", "not-a-hash"));
        assert_ne!(hash, hash_password("s3cret").unwrap());
    }
}
