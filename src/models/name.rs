//! Qualified style names.
//!
//! A style that belongs to a partition carries the partition prefix in its
//! name, separated by [`NAME_SEPARATOR`]:
//!
//! ```text
//! {prefix}::{name}
//! ```
//!
//! A name without the separator is unprefixed and belongs to the default
//! collection only. Splitting always happens at the *first* separator, so a
//! bare name may itself contain `::`.
//!
//! # Examples
//!
//! ```
//! use stylestore::models::name;
//!
//! assert_eq!(name::split("cat::portrait"), (Some("cat"), "portrait"));
//! assert_eq!(name::split("portrait"), (None, "portrait"));
//! assert_eq!(name::merge(Some("cat"), "portrait"), "cat::portrait");
//! assert_eq!(name::merge(Some(""), "portrait"), "portrait");
//! ```

/// Separator between a partition prefix and the bare style name.
pub const NAME_SEPARATOR: &str = "::";

/// Returns `true` if the name carries a partition prefix.
#[must_use]
pub fn has_prefix(fullname: &str) -> bool {
    fullname.contains(NAME_SEPARATOR)
}

/// Splits a name into its prefix (if any) and bare name at the first separator.
#[must_use]
pub fn split(fullname: &str) -> (Option<&str>, &str) {
    fullname
        .split_once(NAME_SEPARATOR)
        .map_or((None, fullname), |(prefix, name)| (Some(prefix), name))
}

/// Joins a prefix and a bare name.
///
/// Returns the bare name unchanged when the prefix is `None` or empty.
#[must_use]
pub fn merge(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}{NAME_SEPARATOR}{name}"),
        _ => name.to_string(),
    }
}

/// Resolves a possibly-prefixed name against a fallback prefix.
///
/// Without `force`, a prefix already embedded in `name` wins over
/// `fallback_prefix`. With `force`, the bare name is always re-qualified with
/// `fallback_prefix`.
///
/// ```
/// use stylestore::models::name::resolve;
///
/// assert_eq!(resolve("dog::run", "cat", false), "dog::run");
/// assert_eq!(resolve("run", "cat", false), "cat::run");
/// assert_eq!(resolve("dog::run", "cat", true), "cat::run");
/// assert_eq!(resolve("dog::run", "", true), "run");
/// ```
#[must_use]
pub fn resolve(name: &str, fallback_prefix: &str, force: bool) -> String {
    let (embedded, bare) = split(name);
    let prefix = if force {
        Some(fallback_prefix)
    } else {
        embedded.or(Some(fallback_prefix))
    };
    merge(prefix, bare)
}
