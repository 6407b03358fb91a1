//! Shared helpers for the Intake workspace.

pub mod date_handling;

/// Clamps a string to at most `max_chars` characters, counting Unicode
/// scalar values rather than bytes.
///
/// Returns the input untouched when it already fits.
///
/// # Example
/// ```rust
/// use intake_util::clamp_to_max_chars;
///
/// assert_eq!(clamp_to_max_chars("hello", 3), "hel");
/// assert_eq!(clamp_to_max_chars("hello", 10), "hello");
/// assert_eq!(clamp_to_max_chars("héllo", 2), "hé");
/// ```
pub fn clamp_to_max_chars(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((byte_index, _)) => input[..byte_index].to_string(),
        None => input.to_string(),
    }
}

/// Splits a comma-separated tag string into trimmed, non-empty entries.
///
/// # Example
/// ```rust
/// use intake_util::split_tag_list;
///
/// assert_eq!(split_tag_list("baz, qux, foo"), vec!["baz", "qux", "foo"]);
/// assert_eq!(split_tag_list(" , ,"), Vec::<String>::new());
/// ```
pub fn split_tag_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
