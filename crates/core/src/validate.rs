//! Input validation shared by registration and company management.
//!
//! Identities are compared exactly as stored (case-sensitive), so validation
//! only trims surrounding whitespace and never changes case.

use crate::error::{DomainError, DomainResult};

/// Minimum accepted length of a login secret.
pub const MIN_SECRET_LEN: usize = 6;

/// Validate and normalize a login identity (email).
pub fn identity(raw: &str) -> DomainResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("email must not be blank"));
    }

    let Some((local, domain)) = trimmed.split_once('@') else {
        return Err(DomainError::validation("invalid email format"));
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(DomainError::validation("invalid email format"));
    }

    Ok(trimmed.to_string())
}

/// Validate a plaintext secret before it is hashed.
pub fn secret(raw: &str) -> DomainResult<()> {
    if raw.chars().count() < MIN_SECRET_LEN {
        return Err(DomainError::validation(format!(
            "password must be at least {MIN_SECRET_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate a required free-text field (full name, company name).
pub fn non_blank(field: &str, raw: &str) -> DomainResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_keeps_case_and_trims() {
        assert_eq!(identity("  Alice@Example.com ").unwrap(), "Alice@Example.com");
    }

    #[test]
    fn identity_rejects_malformed_values() {
        for raw in ["", "   ", "no-at-sign", "@x.com", "a@", "a@b@c"] {
            assert!(identity(raw).is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn secret_enforces_minimum_length() {
        assert!(secret("12345").is_err());
        assert!(secret("secret1").is_ok());
    }

    #[test]
    fn non_blank_names_the_field() {
        let err = non_blank("fullName", " ").unwrap_err();
        assert_eq!(err, DomainError::validation("fullName must not be blank"));
    }
}
