//! Input validation utilities.
//!
//! This module contains functions for validating identifiers received from the REST and CLI
//! front ends before they reach storage or logs.

use crate::{StackError, StackResult};

/// Validates that a submission id is safe to use as a storage key and in log lines.
///
/// - Rejects empty or whitespace-only strings
/// - Bounds the length to avoid pathological inputs
/// - Restricts characters to ASCII alphanumerics, `-` and `_`
///
/// # Errors
///
/// Returns a `StackError::InvalidInput` if the id is invalid.
pub fn validate_submission_id(submission_id: &str) -> StackResult<()> {
    const MAX_SUBMISSION_ID_LEN: usize = 128;

    if submission_id.trim().is_empty() {
        return Err(StackError::InvalidInput(
            "submission id cannot be empty".into(),
        ));
    }

    if submission_id.len() > MAX_SUBMISSION_ID_LEN {
        return Err(StackError::InvalidInput(format!(
            "submission id exceeds maximum length of {} characters",
            MAX_SUBMISSION_ID_LEN
        )));
    }

    let ok = submission_id
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z' | b'-' | b'_'));

    if !ok {
        return Err(StackError::InvalidInput(
            "submission id contains invalid characters (only alphanumeric, '-', '_' allowed)"
                .into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_submission_id_accepts_uuid_like_ids() {
        assert!(validate_submission_id("3f2b6c1e-9a4d-4c1b-8f5e-2d7a9b0c1e2f").is_ok());
        assert!(validate_submission_id("sub_123").is_ok());
    }

    #[test]
    fn test_validate_submission_id_rejects_bad_input() {
        assert!(validate_submission_id("").is_err());
        assert!(validate_submission_id("   ").is_err());
        assert!(validate_submission_id("../etc/passwd").is_err());
        assert!(validate_submission_id("id with space").is_err());
        assert!(validate_submission_id(&"a".repeat(129)).is_err());
    }
}
