//! Deterministic object-key composition from global and per-route policies.
//!
//! Grounded on `brylix::validation`'s `lazy_static!` regex-compilation
//! pattern, repurposed from name validation to name sanitization.

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;

use crate::errors::{UploadError, UploadResult};

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
}

const MAX_KEY_LEN: usize = 1024;
const RANDOM_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Replace anything outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    UNSAFE_CHARS.replace_all(name, "_").into_owned()
}

fn random_suffix() -> String {
    let mut rng = rand::rng();
    (0..6)
        .map(|_| {
            let idx = rng.random_range(0..RANDOM_SUFFIX_ALPHABET.len());
            RANDOM_SUFFIX_ALPHABET[idx] as char
        })
        .collect()
}

/// The default tail generator: `${userIdOrAnonymous}/${epochMs}/${6-char base36 random}/${sanitizedName}`.
pub fn default_tail(user_id: Option<&str>, epoch_ms: i64, original_name: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        user_id.unwrap_or("anonymous"),
        epoch_ms,
        random_suffix(),
        sanitize_name(original_name),
    )
}

fn reject_forbidden(key: &str) -> UploadResult<()> {
    if key.starts_with('/') {
        return Err(UploadError::KeyTooLong(format!(
            "key must not start with '/': {key}"
        )));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(UploadError::KeyTooLong(format!(
            "key must not contain '..' segments: {key}"
        )));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(UploadError::KeyTooLong(format!(
            "key exceeds {MAX_KEY_LEN} bytes ({} bytes)",
            key.len()
        )));
    }
    Ok(())
}

/// Join `global_prefix`, `route_prefix`, and `tail` into one key, or accept
/// `tail` verbatim if the route's `generateKey` already returned a full path
/// (the §4.I escape hatch). Validates the forbidden patterns either way.
pub fn compose_key(
    global_prefix: Option<&str>,
    route_prefix: Option<&str>,
    tail: &str,
    tail_is_full_path: bool,
) -> UploadResult<String> {
    let key = if tail_is_full_path {
        tail.to_string()
    } else {
        let mut parts = Vec::new();
        if let Some(p) = global_prefix {
            if !p.is_empty() {
                parts.push(p.trim_matches('/').to_string());
            }
        }
        if let Some(p) = route_prefix {
            if !p.is_empty() {
                parts.push(p.trim_matches('/').to_string());
            }
        }
        parts.push(tail.trim_start_matches('/').to_string());
        parts.join("/")
    };

    reject_forbidden(&key)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name_replaces_unsafe_chars() {
        assert_eq!(sanitize_name("my file (1).png"), "my_file__1_.png");
        assert_eq!(sanitize_name("report.pdf"), "report.pdf");
    }

    #[test]
    fn test_default_tail_shape() {
        let tail = default_tail(Some("u1"), 1_700_000_000_000, "a.png");
        let parts: Vec<&str> = tail.split('/').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "u1");
        assert_eq!(parts[1], "1700000000000");
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3], "a.png");
    }

    #[test]
    fn test_default_tail_anonymous_when_no_user() {
        let tail = default_tail(None, 1, "x.png");
        assert!(tail.starts_with("anonymous/"));
    }

    #[test]
    fn test_compose_key_joins_prefixes() {
        let key = compose_key(Some("uploads"), Some("avatars"), "u1/1/abc123/x.png", false).unwrap();
        assert_eq!(key, "uploads/avatars/u1/1/abc123/x.png");
    }

    #[test]
    fn test_compose_key_full_path_escape_hatch() {
        let key = compose_key(Some("uploads"), None, "custom/full/path.png", true).unwrap();
        assert_eq!(key, "custom/full/path.png");
    }

    #[test]
    fn test_compose_key_rejects_leading_slash() {
        let err = compose_key(None, None, "/etc/passwd", true).unwrap_err();
        assert_eq!(err.code(), "KEY_TOO_LONG");
    }

    #[test]
    fn test_compose_key_rejects_dotdot_segment() {
        let err = compose_key(Some("uploads"), None, "../../etc/passwd", false).unwrap_err();
        assert_eq!(err.code(), "KEY_TOO_LONG");
    }

    #[test]
    fn test_compose_key_rejects_overlong_key() {
        let long_tail = "a".repeat(2000);
        let err = compose_key(None, None, &long_tail, true).unwrap_err();
        assert_eq!(err.code(), "KEY_TOO_LONG");
    }
}
