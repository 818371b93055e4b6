//! Wildcard pattern matching for access rules and subjects.
//!
//! Four pattern forms are supported:
//! - `"*"` matches every value
//! - `"foo*"` matches values starting with `"foo"`
//! - `"*foo"` matches values ending with `"foo"`
//! - anything else is compared for exact equality
//!
//! Matching is case-sensitive. A `*` anywhere other than the first or last
//! position is an ordinary character.
//!
//! A pattern with `*` at both ends (`"*foo*"`) is read both ways and matches
//! if either reading does: values starting with `"*foo"` or ending with
//! `"foo*"`. It is NOT a substring match.

/// Returns whether `value` matches `pattern`.
///
/// # Examples
///
/// ```
/// use meshgate_rbac::pattern::matches;
///
/// assert!(matches("*", "anything"));
/// assert!(matches("products.*", "products.svc.cluster.local"));
/// assert!(matches("*.cluster.local", "products.svc.cluster.local"));
/// assert!(!matches("GET", "get"));
/// ```
pub fn matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" || pattern == value {
        return true;
    }

    let prefix_hit = pattern
        .strip_suffix('*')
        .is_some_and(|prefix| value.starts_with(prefix));
    let suffix_hit = pattern
        .strip_prefix('*')
        .is_some_and(|suffix| value.ends_with(suffix));

    prefix_hit || suffix_hit
}

/// Returns whether `value` matches any of `patterns`.
///
/// An empty pattern list matches nothing; callers that treat an empty list as
/// a wildcard check for emptiness first.
pub fn matches_any<S: AsRef<str>>(patterns: &[S], value: &str) -> bool {
    patterns.iter().any(|p| matches(p.as_ref(), value))
}
