//! RFC-6901 pointer helpers.

use crate::error::PatchError;

/// Split a pointer into unescaped reference tokens. `""` is the root.
pub fn parse(pointer: &str) -> Result<Vec<String>, PatchError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(PatchError::InvalidPointer(pointer.to_string()));
    };
    rest.split('/').map(|raw| unescape(raw, pointer)).collect()
}

fn unescape(token: &str, pointer: &str) -> Result<String, PatchError> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return Err(PatchError::InvalidPointer(pointer.to_string())),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

pub fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

pub fn format(tokens: &[String]) -> String {
    tokens.iter().map(|t| format!("/{}", escape(t))).collect()
}

pub fn child(parent: &str, token: &str) -> String {
    format!("{parent}/{}", escape(token))
}

/// Array index token: digits only, no leading zero.
pub fn parse_index(token: &str) -> Option<usize> {
    if token.is_empty() || (token.len() > 1 && token.starts_with('0')) {
        return None;
    }
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// `path` equals `root` or lies beneath it.
pub fn is_within(path: &str, root: &str) -> bool {
    if root.is_empty() {
        return true;
    }
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Parent pointer, or `None` for the root.
pub fn parent(pointer: &str) -> Option<&str> {
    if pointer.is_empty() {
        return None;
    }
    pointer.rfind('/').map(|idx| &pointer[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaped_tokens_round_trip() {
        let tokens = parse("/a~1b/c~0d/0").unwrap();
        assert_eq!(tokens, vec!["a/b", "c~d", "0"]);
        assert_eq!(format(&tokens), "/a~1b/c~0d/0");
    }

    #[test]
    fn relative_pointer_is_invalid() {
        assert!(parse("a/b").is_err());
        assert!(parse("/a~2").is_err());
    }

    #[test]
    fn within_respects_segment_boundaries() {
        assert!(is_within("/workouts/0/name", "/workouts/0"));
        assert!(is_within("/workouts/0", "/workouts/0"));
        assert!(!is_within("/workouts/01", "/workouts/0"));
        assert!(!is_within("/workouts", "/workouts/0"));
    }

    #[test]
    fn index_rejects_leading_zero() {
        assert_eq!(parse_index("0"), Some(0));
        assert_eq!(parse_index("12"), Some(12));
        assert_eq!(parse_index("01"), None);
        assert_eq!(parse_index("-"), None);
    }
}
