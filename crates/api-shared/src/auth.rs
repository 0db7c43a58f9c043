/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing API key")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Validates the provided API key against the expected key resolved at startup.
///
/// When no key is configured every request is allowed.
pub fn validate_api_key(provided: Option<&str>, expected: Option<&str>) -> Result<(), AuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match provided {
        None => Err(AuthError::Missing),
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(AuthError::Invalid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_configured_key_allows_everything() {
        assert_eq!(validate_api_key(None, None), Ok(()));
        assert_eq!(validate_api_key(Some("anything"), None), Ok(()));
    }

    #[test]
    fn test_configured_key_must_match() {
        assert_eq!(validate_api_key(Some("secret"), Some("secret")), Ok(()));
        assert_eq!(validate_api_key(Some("nope"), Some("secret")), Err(AuthError::Invalid));
        assert_eq!(validate_api_key(None, Some("secret")), Err(AuthError::Missing));
    }
}
