/// Text written over a message when its sender unsends it. The row itself
/// is never deleted.
pub const UNSENT_BODY: &str = "Message unsent";

/// Longest accepted body, counted in characters after trimming.
pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyError {
    Empty,
    TooLong,
}

/// Trim a submitted body and check it against the length rules.
/// Shared by the API (authoritative) and the client (early feedback).
pub fn normalize_body(raw: &str) -> Result<&str, BodyError> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(BodyError::Empty);
    }
    if body.chars().count() > MAX_MESSAGE_CHARS {
        return Err(BodyError::TooLong);
    }
    Ok(body)
}

pub fn is_unsent(body: &str) -> bool {
    body.trim().eq_ignore_ascii_case(UNSENT_BODY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_before_measuring() {
        let padded = format!("  {}  ", "x".repeat(MAX_MESSAGE_CHARS));
        assert_eq!(normalize_body(&padded).unwrap().len(), MAX_MESSAGE_CHARS);
        assert_eq!(
            normalize_body(&"x".repeat(MAX_MESSAGE_CHARS + 1)),
            Err(BodyError::TooLong)
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        let accented = "é".repeat(MAX_MESSAGE_CHARS);
        assert!(normalize_body(&accented).is_ok());
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(normalize_body(" \t\n "), Err(BodyError::Empty));
        assert_eq!(normalize_body(""), Err(BodyError::Empty));
    }

    #[test]
    fn unsent_match_ignores_case() {
        assert!(is_unsent("Message unsent"));
        assert!(is_unsent(" message UNSENT "));
        assert!(!is_unsent("Message unsent!"));
    }
}
