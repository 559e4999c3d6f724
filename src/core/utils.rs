use unicode_segmentation::UnicodeSegmentation;
use validator::ValidationError;

const FORBIDDEN_USERNAME_CHARACTERS: [char; 9] = ['/', '(', ')', '"', '<', '>', '\\', '{', '}'];
const MAX_USERNAME_GRAPHEMES: usize = 150;

/// Lower-case, ASCII-alphanumeric words joined with `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }

    slug
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let is_empty_or_whitespace = username.trim().is_empty();
    let is_too_long = username.graphemes(true).count() > MAX_USERNAME_GRAPHEMES;
    let contains_forbidden_characters = username
        .chars()
        .any(|g| FORBIDDEN_USERNAME_CHARACTERS.contains(&g) || g.is_whitespace());

    if is_empty_or_whitespace || is_too_long || contains_forbidden_characters {
        let mut error = ValidationError::new("username");
        error.message = Some("Enter a valid username.".into());
        return Err(error);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};

    #[test]
    fn slugify_joins_words_with_dashes() {
        assert_eq!(slugify("The Matrix Reloaded"), "the-matrix-reloaded");
        assert_eq!(slugify("  Premium  Plan!! "), "premium-plan");
        assert_eq!(slugify("season_1 -- finale"), "season-1-finale");
    }

    #[test]
    fn slugify_drops_non_ascii_characters() {
        assert_eq!(slugify("فیلم Night"), "night");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn a_150_grapheme_long_username_is_valid() {
        let username = "ё".repeat(150);
        assert_ok!(validate_username(&username));
    }

    #[test]
    fn a_username_longer_than_150_graphemes_is_rejected() {
        let username = "a".repeat(151);
        assert_err!(validate_username(&username));
    }

    #[test]
    fn usernames_with_forbidden_characters_are_rejected() {
        for username in ["bad/name", "<script>", "with space", "   "] {
            assert_err!(validate_username(username));
        }
    }
}
