//! Reference name validation following git-style conventions.
//!
//! Valid reference names:
//! - Must be non-empty
//! - Must not contain whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - Must not contain `..` (double dot) or `@{`
//! - Must not start or end with `.` or `/`
//! - Must not end with `.lock`
//! - Must not contain consecutive slashes (`//`)
//! - Components between slashes must be non-empty and not start with `.`

use crate::error::{StoreError, StoreResult};

/// Characters that are forbidden anywhere in a reference name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Validate a reference name, returning `Ok(())` if valid.
///
/// Applies to the full stored name (`refs/heads/main`) and equally to the
/// short form (`main`); the rules are component-wise.
///
/// # Examples
///
/// ```
/// use tvs_store::names::validate_reference_name;
///
/// assert!(validate_reference_name("refs/heads/main").is_ok());
/// assert!(validate_reference_name("refs/tags/v1.0").is_ok());
/// assert!(validate_reference_name("").is_err());
/// assert!(validate_reference_name("refs/heads/bad..name").is_err());
/// ```
pub fn validate_reference_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "reference name must not be empty"));
    }

    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(invalid(
                name,
                format!("contains forbidden character: {ch:?}"),
            ));
        }
    }

    // Parent traversal.
    if name.contains("..") {
        return Err(invalid(name, "must not contain '..'"));
    }

    // Reflog syntax.
    if name.contains("@{") {
        return Err(invalid(name, "must not contain '@{'"));
    }

    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(name, "must not start or end with '.'"));
    }

    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }

    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }

    if name.contains("//") {
        return Err(invalid(name, "must not contain consecutive slashes '//'"));
    }

    for component in name.split('/') {
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }

    Ok(())
}

fn invalid(name: &str, reason: impl Into<String>) -> StoreError {
    StoreError::InvalidReference {
        name: name.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_simple_names() {
        assert!(validate_reference_name("main").is_ok());
        assert!(validate_reference_name("develop").is_ok());
        assert!(validate_reference_name("my-branch").is_ok());
        assert!(validate_reference_name("v1.0").is_ok());
    }

    #[test]
    fn valid_canonical_names() {
        assert!(validate_reference_name("refs/heads/main").is_ok());
        assert!(validate_reference_name("refs/heads/feature/deep/nested").is_ok());
        assert!(validate_reference_name("refs/tags/v2.1.0").is_ok());
    }

    #[test]
    fn reject_empty_name() {
        assert!(validate_reference_name("").is_err());
    }

    #[test]
    fn reject_double_dot() {
        assert!(validate_reference_name("bad..name").is_err());
        assert!(validate_reference_name("refs/heads/a..b").is_err());
    }

    #[test]
    fn reject_whitespace() {
        assert!(validate_reference_name("has space").is_err());
        assert!(validate_reference_name("has\ttab").is_err());
        assert!(validate_reference_name("has\nnewline").is_err());
    }

    #[test]
    fn reject_forbidden_chars() {
        for bad in ["a~b", "a^b", "a:b", "a?b", "a*b", "a[b", "a\\b"] {
            assert!(validate_reference_name(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn reject_dot_boundaries() {
        assert!(validate_reference_name(".hidden").is_err());
        assert!(validate_reference_name("trailing.").is_err());
        assert!(validate_reference_name("refs/heads/.hidden").is_err());
    }

    #[test]
    fn reject_slash_boundaries() {
        assert!(validate_reference_name("/leading").is_err());
        assert!(validate_reference_name("trailing/").is_err());
    }

    #[test]
    fn reject_consecutive_slashes() {
        assert!(validate_reference_name("refs//heads").is_err());
    }

    #[test]
    fn reject_lock_suffix() {
        assert!(validate_reference_name("refs/heads/main.lock").is_err());
    }

    #[test]
    fn reject_at_brace() {
        assert!(validate_reference_name("ref@{0}").is_err());
    }

    #[test]
    fn error_carries_name_and_reason() {
        let err = validate_reference_name("a..b").unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidReference {
                name: "a..b".into(),
                reason: "must not contain '..'".into(),
            }
        );
    }
}
