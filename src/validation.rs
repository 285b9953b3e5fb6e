//! Display name validation for the `rename` command.

use std::collections::BTreeSet;

/// Reasons a requested display name is refused. The `Display` text is sent to the
/// client verbatim.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("Name cannot be empty")]
    Empty,

    #[error("Name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Name contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("Name cannot contain '[' or ']'")]
    Brackets,
}

/// Validate a requested display name, returning the trimmed form to store.
///
/// Length is counted in characters, not bytes, so non-ASCII names get the same budget.
pub fn validate_display_name(raw: &str, max_length: usize) -> Result<String, NameError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(NameError::Empty);
    }
    if trimmed.chars().count() > max_length {
        return Err(NameError::TooLong { max: max_length });
    }

    let control: BTreeSet<String> = trimmed
        .chars()
        .filter(|c| c.is_control())
        .map(|c| format!("\\u{{{:04x}}}", c as u32))
        .collect();
    if !control.is_empty() {
        return Err(NameError::InvalidCharacters {
            chars: control.into_iter().collect::<Vec<_>>().join(", "),
        });
    }

    // Names are rendered as `[name]: text`; brackets would make lines ambiguous.
    if trimmed.contains('[') || trimmed.contains(']') {
        return Err(NameError::Brackets);
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_and_trims() {
        assert_eq!(validate_display_name("  Bob ", 32).unwrap(), "Bob");
        assert_eq!(validate_display_name("Zoë the 2nd", 32).unwrap(), "Zoë the 2nd");
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert_eq!(validate_display_name("", 32), Err(NameError::Empty));
        assert_eq!(validate_display_name("   \t", 32), Err(NameError::Empty));
    }

    #[test]
    fn length_counts_characters() {
        assert!(validate_display_name("ééééé", 5).is_ok());
        assert_eq!(
            validate_display_name("abcdef", 5),
            Err(NameError::TooLong { max: 5 })
        );
    }

    #[test]
    fn rejects_control_characters() {
        let err = validate_display_name("bad\u{7}name", 32).unwrap_err();
        assert_eq!(
            err,
            NameError::InvalidCharacters {
                chars: "\\u{0007}".into()
            }
        );
    }

    #[test]
    fn rejects_brackets() {
        assert_eq!(validate_display_name("[admin]", 32), Err(NameError::Brackets));
    }
}
