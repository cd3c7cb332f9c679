//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password against the provider's limits
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.chars().count() < 6 {
        return Err("Password must be at least 6 characters long".to_string());
    }

    // bcrypt on the provider side ignores everything past 72 bytes
    if password.len() > 72 {
        return Err("Password must be at most 72 bytes long".to_string());
    }

    Ok(())
}

/// Validate display name
pub fn validate_full_name(full_name: &str) -> Result<(), String> {
    let trimmed = full_name.trim();

    if trimmed.is_empty() {
        return Err("Full name is required".to_string());
    }

    if trimmed.chars().count() > 100 {
        return Err("Full name must be at most 100 characters long".to_string());
    }

    if trimmed.chars().any(char::is_control) {
        return Err("Full name contains invalid characters".to_string());
    }

    Ok(())
}
