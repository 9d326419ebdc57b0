//! Password hashing and the validator set applied to new passwords.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::AppError;

const COMMON_PASSWORDS: &[&str] = &[
    "123456", "123456789", "12345678", "password", "qwerty", "qwerty123", "1q2w3e4r",
    "111111", "1234567890", "1234567", "12345", "1234", "abc123", "password1",
    "password123", "iloveyou", "123123", "000000", "qwertyuiop", "monkey", "dragon",
    "letmein", "football", "baseball", "welcome", "welcome1", "sunshine", "princess",
    "admin", "admin123", "passw0rd", "starwars", "trustno1", "master", "shadow",
    "superman", "michael", "whatever", "asdfghjkl", "zaq12wsx", "changeme", "secret",
];

/// Hashes `password` into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .to_string();
    Ok(phc)
}

/// False for a wrong password and for an unparseable hash alike.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Burns one verification so unknown usernames cost the same as wrong passwords.
pub fn verify_dummy(password: &str) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    if let Some(hash) = DUMMY.get_or_init(|| hash_password("gatehouse-timing-equaliser").ok()) {
        let _ = verify_password(hash, password);
    }
}

/// Rules a new password must satisfy. Every failure is reported, in declaration order.
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

impl PasswordPolicy {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn validate(&self, password: &str, username: &str) -> Vec<String> {
        let mut errors = Vec::new();

        if is_similar(password, username) {
            errors.push("The password is too similar to the username.".to_string());
        }
        if password.chars().count() < self.min_length {
            errors.push(format!(
                "This password is too short. It must contain at least {} characters.",
                self.min_length
            ));
        }
        let lowered = password.trim().to_lowercase();
        if COMMON_PASSWORDS.contains(&lowered.as_str()) {
            errors.push("This password is too common.".to_string());
        }
        if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            errors.push("This password is entirely numeric.".to_string());
        }

        errors
    }
}

/// Highest share of characters a password may have in common with the username.
const MAX_SIMILARITY: f64 = 0.7;

/// Character-overlap ratio against the whole username and each of its word
/// parts. Passwords ten times longer than a short username are not compared.
fn is_similar(password: &str, username: &str) -> bool {
    let password = password.to_lowercase();
    let username = username.to_lowercase();
    if password.is_empty() || username.is_empty() {
        return false;
    }

    let password_len = password.chars().count();
    let username_len = username.chars().count();
    if password_len >= 10 * username_len
        && (username_len as f64) < MAX_SIMILARITY / 2.0 * password_len as f64
    {
        return false;
    }

    username
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|part| !part.is_empty())
        .chain(std::iter::once(username.as_str()))
        .any(|part| overlap_ratio(&password, part) >= MAX_SIMILARITY)
}

/// `2 * shared / total` where `shared` counts characters common to both
/// strings, with multiplicity, regardless of order.
fn overlap_ratio(a: &str, b: &str) -> f64 {
    let mut available: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *available.entry(c).or_default() += 1;
    }

    let mut shared = 0usize;
    for c in a.chars() {
        if let Some(count) = available.get_mut(&c).filter(|n| **n > 0) {
            *count -= 1;
            shared += 1;
        }
    }

    let total = a.chars().count() + b.chars().count();
    2.0 * shared as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse battery"));
        assert!(!verify_password(&hash, "Correct horse battery"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }

    #[test]
    fn test_policy_accepts_reasonable_password() {
        let policy = PasswordPolicy::default();
        assert!(policy.validate("tangerine-orbit-42", "alice").is_empty());
    }

    #[test]
    fn test_policy_reports_every_failure_in_order() {
        let policy = PasswordPolicy::default();
        let errors = policy.validate("1234", "bob");
        assert_eq!(
            errors,
            vec![
                "This password is too short. It must contain at least 8 characters.".to_string(),
                "This password is too common.".to_string(),
                "This password is entirely numeric.".to_string(),
            ]
        );
    }

    #[test]
    fn test_policy_similarity() {
        let policy = PasswordPolicy::new(8);
        let errors = policy.validate("Margaret1999!", "margaret");
        assert_eq!(errors, vec!["The password is too similar to the username.".to_string()]);

        assert!(!policy.validate("alice123!", "alice").is_empty());
        assert!(!policy.validate("smith-jane", "jane.smith").is_empty());

        // Sharing a few characters is not enough.
        assert!(policy.validate("ab-tangerine-orbit", "ab").is_empty());
        // A long passphrase that merely contains the username passes.
        assert!(policy.validate("alice-in-a-tangerine-orbit", "alice").is_empty());
    }

    #[test]
    fn test_overlap_ratio() {
        assert_eq!(overlap_ratio("abc", "abc"), 1.0);
        assert_eq!(overlap_ratio("abc", "xyz"), 0.0);
        assert_eq!(overlap_ratio("aab", "ab"), 0.8);
    }
}
