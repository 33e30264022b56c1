//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest key accepted as a player id (live-store keys are short auth uids).
const MAX_PLAYER_ID_LENGTH: usize = 128;

/// Validates that a player id can be used as a live-store key.
///
/// ```ignore
/// validate_player_id("uid-42")   // Ok
/// validate_player_id("")         // Err - empty
/// validate_player_id("a/b")      // Err - path separator
/// ```
pub fn validate_player_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        let mut err = ValidationError::new("player_id_empty");
        err.message = Some("Player ID must not be empty".into());
        return Err(err);
    }

    if id.len() > MAX_PLAYER_ID_LENGTH {
        let mut err = ValidationError::new("player_id_length");
        err.message = Some(
            format!(
                "Player ID must be at most {MAX_PLAYER_ID_LENGTH} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if id
        .chars()
        .any(|c| matches!(c, '.' | '#' | '$' | '[' | ']' | '/') || c.is_control())
    {
        let mut err = ValidationError::new("player_id_format");
        err.message = Some("Player ID contains characters not allowed in store keys".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_id_valid() {
        assert!(validate_player_id("uid-42").is_ok());
        assert!(validate_player_id("Xy9_zQ").is_ok());
    }

    #[test]
    fn test_validate_player_id_invalid_length() {
        assert!(validate_player_id("").is_err());
        assert!(validate_player_id("   ").is_err());
        assert!(validate_player_id(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_player_id_invalid_format() {
        assert!(validate_player_id("a/b").is_err()); // path separator
        assert!(validate_player_id("a.b").is_err());
        assert!(validate_player_id("a#b").is_err());
        assert!(validate_player_id("a\nb").is_err());
    }
}
