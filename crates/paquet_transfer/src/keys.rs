//! Transfer ids and storage-key construction.

use rand::Rng;
use thiserror::Error;

use paquet_store::META_OBJECT_SUFFIX;

/// Human-typable alphabet: uppercase letters and digits minus the
/// look-alikes I, O, 0 and 1.
pub const TRANSFER_ID_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const TRANSFER_ID_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty object path")]
    Empty,
    #[error("object path escapes the transfer namespace")]
    Traversal,
    #[error("object path contains unsafe characters")]
    UnsafeCharacter,
    #[error("object path collides with the reserved metadata suffix")]
    Reserved,
}

pub fn generate_transfer_id() -> String {
    let mut rng = rand::thread_rng();
    (0..TRANSFER_ID_LEN)
        .map(|_| TRANSFER_ID_ALPHABET[rng.gen_range(0..TRANSFER_ID_ALPHABET.len())] as char)
        .collect()
}

/// Uppercase and validate a caller-supplied transfer id.
pub fn normalize_transfer_id(raw: &str) -> Option<String> {
    let id = raw.trim().to_ascii_uppercase();
    let valid = id.len() == TRANSFER_ID_LEN
        && id.bytes().all(|byte| TRANSFER_ID_ALPHABET.contains(&byte));
    valid.then_some(id)
}

/// Key prefix under which all of a transfer's objects live.
pub fn namespace(id: &str) -> String {
    format!("transfers/{id}/")
}

/// Key of the reserved metadata control object.
pub fn meta_key(id: &str) -> String {
    format!("{}{META_OBJECT_SUFFIX}", namespace(id))
}

pub fn object_key(id: &str, relative_path: &str) -> String {
    format!("{}{relative_path}", namespace(id))
}

/// Sanitize a caller-supplied relative path before it becomes a storage key.
///
/// Leading slashes are stripped; traversal components, backslashes and
/// control characters are rejected outright.
pub fn sanitize_object_path(raw: &str) -> Result<String, PathError> {
    let trimmed = raw.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }
    if trimmed.bytes().any(|byte| byte.is_ascii_control()) || trimmed.contains('\\') {
        return Err(PathError::UnsafeCharacter);
    }
    for component in trimmed.split('/') {
        match component {
            "" | "." | ".." => return Err(PathError::Traversal),
            _ if component.ends_with(META_OBJECT_SUFFIX) => return Err(PathError::Reserved),
            _ => {}
        }
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_use_the_fixed_alphabet() {
        for _ in 0..64 {
            let id = generate_transfer_id();
            assert_eq!(id.len(), TRANSFER_ID_LEN);
            assert!(id.bytes().all(|byte| TRANSFER_ID_ALPHABET.contains(&byte)));
        }
    }

    #[test]
    fn normalization_uppercases_and_validates() {
        assert_eq!(normalize_transfer_id("ab3xq9"), Some("AB3XQ9".to_string()));
        assert_eq!(normalize_transfer_id(" AB3XQ9 "), Some("AB3XQ9".to_string()));
        assert_eq!(normalize_transfer_id("AB3XQ"), None);
        assert_eq!(normalize_transfer_id("AB3XQ0"), None); // 0 not in alphabet
        assert_eq!(normalize_transfer_id("AB3XQ99"), None);
    }

    #[test]
    fn namespace_and_meta_key_shapes() {
        assert_eq!(namespace("AB3XQ9"), "transfers/AB3XQ9/");
        assert_eq!(meta_key("AB3XQ9"), "transfers/AB3XQ9/.meta.json");
        assert_eq!(
            object_key("AB3XQ9", "docs/readme.md"),
            "transfers/AB3XQ9/docs/readme.md"
        );
    }

    #[test]
    fn sanitize_accepts_plain_relative_paths() {
        assert_eq!(sanitize_object_path("notes.txt").unwrap(), "notes.txt");
        assert_eq!(sanitize_object_path("/docs/a.md").unwrap(), "docs/a.md");
    }

    #[test]
    fn sanitize_rejects_traversal_and_unsafe_paths() {
        assert_eq!(sanitize_object_path(""), Err(PathError::Empty));
        assert_eq!(sanitize_object_path("///"), Err(PathError::Empty));
        assert_eq!(sanitize_object_path("../etc/passwd"), Err(PathError::Traversal));
        assert_eq!(sanitize_object_path("a/../b"), Err(PathError::Traversal));
        assert_eq!(sanitize_object_path("a//b"), Err(PathError::Traversal));
        assert_eq!(sanitize_object_path("a/./b"), Err(PathError::Traversal));
        assert_eq!(
            sanitize_object_path("a\\b"),
            Err(PathError::UnsafeCharacter)
        );
        assert_eq!(
            sanitize_object_path("a\u{0}b"),
            Err(PathError::UnsafeCharacter)
        );
    }

    #[test]
    fn sanitize_rejects_paths_that_shadow_the_metadata_object() {
        assert_eq!(sanitize_object_path(".meta.json"), Err(PathError::Reserved));
        assert_eq!(
            sanitize_object_path("docs/report.meta.json"),
            Err(PathError::Reserved)
        );
        assert_eq!(
            sanitize_object_path("meta.json").unwrap(),
            "meta.json".to_string()
        );
    }
}
