//! Unique identifier generation.
//!
//! UIDs use the UUID-derived form `2.25.<decimal uuid>` (PS3.5 B.2), which
//! needs no registered root and stays within the 64-character limit.

use uuid::Uuid;

/// Generate a fresh UID.
pub fn generate_uid() -> String {
    format!("2.25.{}", Uuid::new_v4().as_u128())
}

/// Derive a UID by appending a numeric suffix component.
///
/// Used for per-level frame-of-reference and concatenation UIDs, which are
/// the series UID extended with the level's instance number.
pub fn derive_uid(base: &str, suffix: u32) -> String {
    format!("{base}.{suffix}")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_uid_shape() {
        let uid = generate_uid();
        assert!(uid.starts_with("2.25."));
        assert!(uid.len() <= 64);
        assert!(uid[5..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_generated_uids_unique() {
        assert_ne!(generate_uid(), generate_uid());
    }

    #[test]
    fn test_derive_uid() {
        assert_eq!(derive_uid("1.2.3", 4), "1.2.3.4");
    }
}
