// src/utils/session_id.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;

static SESSION_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{8,128}$").expect("valid session id pattern"));

/// Session ids are minted by the player; only their shape is checked here.
pub fn validate_session_id(session_id: &str) -> Result<(), AppError> {
    if !SESSION_ID_RE.is_match(session_id) {
        return Err(AppError::BadRequest(
            "Session id must be 8-128 characters of letters, digits, '-' or '_'".to_string(),
        ));
    }
    Ok(())
}

/// Mints a session id for clients that do not have one yet.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid() {
        let id = generate_session_id();
        assert!(validate_session_id(&id).is_ok());
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn test_rejects_bad_ids() {
        assert!(validate_session_id("short").is_err());
        assert!(validate_session_id("has spaces in it").is_err());
        assert!(validate_session_id("../../etc/passwd").is_err());
        assert!(validate_session_id(&"x".repeat(129)).is_err());
        assert!(validate_session_id("abc_DEF-123").is_ok());
    }
}
