//! Checks run before a command is built. Failures carry the message shown
//! to the user.

use funban_common::User;

pub const MAX_NAME_LEN: usize = 20;
pub const MAX_LABEL_LEN: usize = 40;

/// A user name must be non-empty, at most 20 characters, must not start
/// with whitespace, and must not clash with another user's name. When
/// renaming, `editing_id` excludes the user being renamed from the clash
/// check.
pub fn validate_user_name(name: &str, existing: &[User], editing_id: Option<i64>) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is required.".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("Name cannot exceed {} characters.", MAX_NAME_LEN));
    }
    if name.starts_with(char::is_whitespace) {
        return Err("Name cannot start with a space.".to_string());
    }
    let taken = existing
        .iter()
        .any(|user| user.name == name && Some(user.id) != editing_id);
    if taken {
        return Err("Name already exists. Please choose a different name.".to_string());
    }
    Ok(())
}

pub fn validate_note_text(text: &str) -> Result<(), String> {
    if text.trim().is_empty() {
        return Err("Text is required".to_string());
    }
    Ok(())
}

pub fn validate_snapshot_label(label: &str) -> Result<(), String> {
    if label.is_empty() {
        return Err("Label is required.".to_string());
    }
    if label.chars().count() > MAX_LABEL_LEN {
        return Err(format!("Label cannot exceed {} characters.", MAX_LABEL_LEN));
    }
    if label.starts_with(char::is_whitespace) {
        return Err("Label cannot start with a space.".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Vec<User> {
        vec![
            User {
                id: 1,
                name: "Ann".to_string(),
                color: "red".to_string(),
            },
            User {
                id: 2,
                name: "Bob".to_string(),
                color: "blue".to_string(),
            },
        ]
    }

    #[test]
    fn test_valid_name() {
        assert!(validate_user_name("Cleo", &users(), None).is_ok());
    }

    #[test]
    fn test_name_rules() {
        assert_eq!(validate_user_name("", &users(), None).unwrap_err(), "Name is required.");
        assert!(validate_user_name(" Cleo", &users(), None).is_err());
        assert!(validate_user_name(&"x".repeat(21), &users(), None).is_err());
        assert!(validate_user_name(&"é".repeat(20), &users(), None).is_ok());
    }

    #[test]
    fn test_name_must_be_unique_case_sensitive() {
        assert!(validate_user_name("Ann", &users(), None).is_err());
        assert!(validate_user_name("ann", &users(), None).is_ok());
    }

    #[test]
    fn test_rename_to_own_name_is_allowed() {
        assert!(validate_user_name("Ann", &users(), Some(1)).is_ok());
        assert!(validate_user_name("Bob", &users(), Some(1)).is_err());
    }

    #[test]
    fn test_note_text_must_not_be_blank() {
        assert!(validate_note_text("  \n").is_err());
        assert!(validate_note_text(" fix login ").is_ok());
    }

    #[test]
    fn test_snapshot_label_rules() {
        assert!(validate_snapshot_label("Sprint 12").is_ok());
        assert!(validate_snapshot_label("").is_err());
        assert!(validate_snapshot_label(" Sprint").is_err());
        assert!(validate_snapshot_label(&"l".repeat(41)).is_err());
        assert!(validate_snapshot_label(&"l".repeat(40)).is_ok());
    }
}
