//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a game code is exactly six decimal digits without a leading zero.
///
/// # Examples
///
/// ```ignore
/// validate_game_code("482913") // Ok
/// validate_game_code("082913") // Err - leading zero
/// validate_game_code("48291")  // Err - too short
/// ```
pub fn validate_game_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != 6 {
        let mut err = ValidationError::new("game_code_length");
        err.message = Some(format!("Game code must be exactly 6 digits (got {})", code.len()).into());
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_digit()) || code.starts_with('0') {
        let mut err = ValidationError::new("game_code_format");
        err.message = Some("Game code must be a number between 100000 and 999999".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a `#rrggbb` team color.
pub fn validate_team_color(color: &str) -> Result<(), ValidationError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("team_color_format");
        err.message = Some("Team color must look like `#21808d`".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_game_code_valid() {
        assert!(validate_game_code("100000").is_ok());
        assert!(validate_game_code("999999").is_ok());
        assert!(validate_game_code("482913").is_ok());
    }

    #[test]
    fn test_validate_game_code_invalid_length() {
        assert!(validate_game_code("48291").is_err()); // too short
        assert!(validate_game_code("4829130").is_err()); // too long
        assert!(validate_game_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_game_code_invalid_format() {
        assert!(validate_game_code("082913").is_err()); // leading zero
        assert!(validate_game_code("48a913").is_err()); // letter
        assert!(validate_game_code("48 913").is_err()); // space
    }

    #[test]
    fn test_validate_team_color() {
        assert!(validate_team_color("#21808d").is_ok());
        assert!(validate_team_color("#C0152F").is_ok());
        assert!(validate_team_color("21808d").is_err()); // missing hash
        assert!(validate_team_color("#21808").is_err()); // too short
        assert!(validate_team_color("#21808g").is_err()); // invalid hex
        assert!(validate_team_color("#é1808").is_err()); // multi-byte
    }
}
