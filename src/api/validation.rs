//! Input validation for API requests.
//!
//! Validators return `Result<(), String>` with a human-readable reason;
//! handlers wrap the reason in the `ApiError` appropriate for the endpoint.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::ApiError;

lazy_static! {
    /// Loose email shape check: something@something.tld
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// Absolute HTTP/HTTPS link
    static ref HTTP_URL_REGEX: Regex = Regex::new(
        r"^https?://[^\s/$.?#][^\s]*$"
    ).unwrap();
}

/// Return the trimmed value of a required text field, or a 400 `invalid_request`.
pub fn required<'a>(value: Option<&'a str>, field_name: &str) -> Result<&'a str, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::validation(format!("{} is required", field_name))),
    }
}

/// Treat empty or whitespace-only strings as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a display name (account names double as login handles)
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }

    // Names containing '@' would be ambiguous with emails at login
    if name.contains('@') {
        return Err("Name cannot contain '@'".to_string());
    }

    Ok(())
}

/// Validate an absolute http(s) link
pub fn validate_link(url: &str) -> Result<(), String> {
    if url.len() > 2048 {
        return Err("Link is too long (max 2048 characters)".to_string());
    }

    if !HTTP_URL_REGEX.is_match(url) {
        return Err("Link must be an http(s) URL".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_required() {
        assert_eq!(required(Some("  Acme "), "name").unwrap(), "Acme");

        let err = required(None, "name").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.machine_code(), "invalid_request");
        assert_eq!(err.message(), "name is required");

        assert!(required(Some("   "), "name").is_err());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("x".into())), Some("x".into()));
        assert_eq!(non_empty(Some("".into())), None);
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("acme@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.org").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert!(validate_email("").is_err());
        assert!(validate_email("acme").is_err());
        assert!(validate_email("acme@example").is_err());
        assert!(validate_email("a cme@example.com").is_err());
        assert!(validate_email(&format!("{}@example.com", "a".repeat(250))).is_err());
    }

    #[test]
    fn test_names() {
        assert!(validate_name("Acme Corp").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("acme@corp").is_err());
        assert!(validate_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn test_links() {
        assert!(validate_link("https://acme.example/jobs/1").is_ok());
        assert!(validate_link("http://localhost:3000").is_ok());
        assert!(validate_link("ftp://acme.example").is_err());
        assert!(validate_link("acme.example").is_err());
        assert!(validate_link("https://").is_err());
    }
}
