//! Tag merge resolution.
//!
//! Computes the result of combining a template's tag list with the user's
//! current tags under a merge operator. Replace versus merge is decided
//! solely by dirtiness for the add/legacy case; remove always subtracts.
//! Insertion order is preserved: current tags first, template tags appended.

use indexmap::IndexSet;
use intake_types::TemplateOperator;
use intake_util::split_tag_list;
use serde_json::Value as JsonValue;

/// Resolves the merged tag set for a template application.
///
/// `field_is_dirty` means the user added at least one tag manually before
/// the template was applied. `Remove` subtracts the template tags from a
/// dirty set and empties a clean one; any other operator (including the
/// legacy absent operator) replaces a clean set and unions into a dirty one.
pub fn resolve_tag_merge(
    current_tags: &IndexSet<String>,
    template_tags: Option<&IndexSet<String>>,
    operator: Option<TemplateOperator>,
    field_is_dirty: bool,
) -> IndexSet<String> {
    let template_tags = template_tags.filter(|tags| !tags.is_empty());

    match operator {
        Some(TemplateOperator::Remove) => match (field_is_dirty, template_tags) {
            (false, _) => IndexSet::new(),
            (true, Some(removals)) => current_tags.difference(removals).cloned().collect(),
            (true, None) => current_tags.clone(),
        },
        _ => match (field_is_dirty, template_tags) {
            (false, Some(replacements)) => replacements.clone(),
            (false, None) => IndexSet::new(),
            (true, Some(additions)) => current_tags.union(additions).cloned().collect(),
            (true, None) => current_tags.clone(),
        },
    }
}

/// Parses a template option payload into a tag set. Accepts a comma-joined
/// string or a string list.
pub fn tags_from_option_value(value: &JsonValue) -> IndexSet<String> {
    match value {
        JsonValue::String(text) => split_tag_list(text).into_iter().collect(),
        JsonValue::Array(entries) => entries
            .iter()
            .filter_map(|entry| entry.as_str())
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect(),
        _ => IndexSet::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(entries: &[&str]) -> IndexSet<String> {
        entries.iter().map(|entry| entry.to_string()).collect()
    }

    #[test]
    fn add_on_dirty_field_unions_and_dedupes() {
        let merged = resolve_tag_merge(&tags(&["baz", "qux", "foo"]), Some(&tags(&["foo", "bar"])), Some(TemplateOperator::Add), true);
        assert_eq!(merged, tags(&["baz", "qux", "foo", "bar"]));
    }

    #[test]
    fn remove_on_dirty_field_subtracts() {
        let merged = resolve_tag_merge(
            &tags(&["foo", "bar", "baz", "qux"]),
            Some(&tags(&["foo", "bar"])),
            Some(TemplateOperator::Remove),
            true,
        );
        assert_eq!(merged, tags(&["baz", "qux"]));
    }

    #[test]
    fn legacy_operator_replaces_clean_field() {
        let merged = resolve_tag_merge(&IndexSet::new(), Some(&tags(&["foo", "bar"])), None, false);
        assert_eq!(merged, tags(&["foo", "bar"]));
    }

    #[test]
    fn empty_template_tags_leave_dirty_field_untouched() {
        let current = tags(&["foo", "bar"]);
        assert_eq!(resolve_tag_merge(&current, None, Some(TemplateOperator::Add), true), current);
        assert_eq!(resolve_tag_merge(&current, Some(&IndexSet::new()), Some(TemplateOperator::Remove), true), current);
    }

    #[test]
    fn clean_field_stays_empty_for_empty_template_and_remove() {
        assert!(resolve_tag_merge(&IndexSet::new(), None, None, false).is_empty());
        assert!(resolve_tag_merge(&tags(&["seeded"]), Some(&tags(&["x"])), Some(TemplateOperator::Remove), false).is_empty());
    }

    #[test]
    fn option_payload_accepts_comma_strings_and_lists() {
        assert_eq!(tags_from_option_value(&serde_json::json!("foo, bar")), tags(&["foo", "bar"]));
        assert_eq!(tags_from_option_value(&serde_json::json!(["foo", " bar "])), tags(&["foo", "bar"]));
        assert!(tags_from_option_value(&serde_json::json!(null)).is_empty());
    }
}
