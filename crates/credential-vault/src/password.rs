//! Password strength check for wallet encryption passwords

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Whether `password` is strong enough to protect wallet material.
///
/// Requires at least `MIN_PASSWORD_LENGTH` characters with at least one
/// lowercase letter, one uppercase letter and one digit.
pub fn is_strong_password(password: &str) -> bool {
    if password.trim().is_empty() || password.chars().count() < MIN_PASSWORD_LENGTH {
        return false;
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    has_lower && has_upper && has_digit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_mixed_case_with_digit() {
        assert!(is_strong_password("CorrectHorse42"));
        assert!(is_strong_password("aB3aaaaaaaaa"));
    }

    #[test]
    fn rejects_short_passwords() {
        assert!(!is_strong_password("Ab3"));
        assert!(!is_strong_password("aB3aaaaaaaa"));
    }

    #[test]
    fn rejects_missing_character_classes() {
        assert!(!is_strong_password("alllowercase123"));
        assert!(!is_strong_password("ALLUPPERCASE123"));
        assert!(!is_strong_password("NoDigitsAtAllHere"));
    }

    #[test]
    fn rejects_blank() {
        assert!(!is_strong_password(""));
        assert!(!is_strong_password("              "));
    }
}
