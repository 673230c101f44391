//! Canonical column identifiers, built-in column catalog, and key normalization.

use std::collections::BTreeMap;

use crate::view::{ColumnRef, DisplayType};

/// Prefix of canonical custom-field column ids (`customField_<id>`).
pub const CUSTOM_FIELD_PREFIX: &str = "customField_";
/// Suffix of spanning keys that carry the show-on-second-row flag.
pub const SECOND_ROW_SUFFIX: &str = "_secondRow";

/// Leading selection checkbox column.
pub const SELECT_COLUMN_ID: &str = "select";
/// Per-record actions rendered next to the selection checkbox.
pub const ROW_ACTIONS_COLUMN_ID: &str = "row_actions";
/// Actions-only column occupying slot 0 of the sub row.
pub const SUB_ROW_ACTIONS_COLUMN_ID: &str = "sub_row_actions";

/// Pseudo-columns that are always placed by the layout and never configured.
pub const RESERVED_COLUMN_IDS: [&str; 3] = [
    SELECT_COLUMN_ID,
    ROW_ACTIONS_COLUMN_ID,
    SUB_ROW_ACTIONS_COLUMN_ID,
];

/// Closed set of built-in document attributes that can appear as columns.
pub const BUILTIN_FIELD_IDS: [&str; 12] = [
    "title",
    "created",
    "added",
    "modified",
    "correspondent",
    "document_type",
    "storage_path",
    "tags",
    "owner",
    "notes",
    "asn",
    "page_count",
];

/// Column order used when neither a view, pending edits, nor global settings
/// provide one.
pub const DEFAULT_COLUMN_ORDER: [&str; 12] = [
    "asn",
    "title",
    "correspondent",
    "document_type",
    "storage_path",
    "tags",
    "created",
    "added",
    "modified",
    "owner",
    "notes",
    "page_count",
];

/// Which family a column id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    BuiltIn,
    CustomField,
}

/// A resolved, displayable column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: String,
    pub kind: ColumnKind,
    pub display_type: DisplayType,
    pub header: String,
}

fn is_numeric_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|byte| byte.is_ascii_digit())
}

/// Builds the canonical column id for a custom field.
pub fn custom_field_column_id(field_id: u64) -> String {
    format!("{CUSTOM_FIELD_PREFIX}{field_id}")
}

/// Normalizes a string column id to its canonical form.
///
/// Numeric strings become `customField_<n>`; everything else, including ids
/// that already carry the prefix, is returned unchanged.
pub fn normalize_column_key(id: &str) -> String {
    if !is_numeric_id(id) {
        return id.to_string();
    }
    match id.parse::<u64>() {
        Ok(field_id) => custom_field_column_id(field_id),
        Err(_) => format!("{CUSTOM_FIELD_PREFIX}{id}"),
    }
}

/// Normalizes a column order entry to its canonical form.
pub fn normalize_column_id(id: &ColumnRef) -> String {
    match id {
        ColumnRef::Id(field_id) => custom_field_column_id(*field_id),
        ColumnRef::Name(name) => normalize_column_key(name),
    }
}

/// Parses the numeric suffix of a `customField_<id>` column id.
pub fn extract_custom_field_id(id: &str) -> Option<u64> {
    let suffix = id.strip_prefix(CUSTOM_FIELD_PREFIX)?;
    if !is_numeric_id(suffix) {
        return None;
    }
    suffix.parse().ok()
}

/// Resolves a custom-field id from either the bare numeric or the prefixed form.
pub fn custom_field_id_of(id: &str) -> Option<u64> {
    extract_custom_field_id(&normalize_column_key(id))
}

/// Returns `true` when `id` names a custom-field column in either form.
pub fn is_custom_field(id: &str) -> bool {
    custom_field_id_of(id).is_some()
}

/// Returns `true` for reserved pseudo-columns.
pub fn is_reserved(id: &str) -> bool {
    RESERVED_COLUMN_IDS.contains(&id)
}

/// Returns `true` for allowlisted built-in fields and reserved pseudo-columns.
pub fn is_builtin(id: &str) -> bool {
    BUILTIN_FIELD_IDS.contains(&id) || is_reserved(id)
}

pub fn column_kind(id: &str) -> Option<ColumnKind> {
    if is_custom_field(id) {
        Some(ColumnKind::CustomField)
    } else if is_builtin(id) {
        Some(ColumnKind::BuiltIn)
    } else {
        None
    }
}

/// Spanning key holding the show-on-second-row flag of `column_id`.
pub fn second_row_key(column_id: &str) -> String {
    format!("{column_id}{SECOND_ROW_SUFFIX}")
}

/// Normalizes every entry of a column order list.
pub fn normalize_column_order(order: &[ColumnRef]) -> Vec<String> {
    order.iter().map(normalize_column_id).collect()
}

/// Normalizes every entry of an order list already held as strings.
pub fn normalize_column_keys_list(order: &[String]) -> Vec<String> {
    order.iter().map(|id| normalize_column_key(id)).collect()
}

/// Normalizes the keys of a visibility, sizing, or display-type map.
/// When two keys collapse to the same canonical id the canonical entry wins.
pub fn normalize_column_keys<V: Clone>(map: &BTreeMap<String, V>) -> BTreeMap<String, V> {
    let mut normalized = BTreeMap::new();
    for (key, value) in map {
        let canonical = normalize_column_key(key);
        if canonical != *key && normalized.contains_key(&canonical) {
            continue;
        }
        normalized.insert(canonical, value.clone());
    }
    normalized
}

/// Normalizes spanning keys, keeping the `_secondRow` suffix on the canonical base id.
pub fn normalize_spanning_keys(spanning: &BTreeMap<String, bool>) -> BTreeMap<String, bool> {
    let mut normalized = BTreeMap::new();
    for (key, flag) in spanning {
        let canonical = match key.strip_suffix(SECOND_ROW_SUFFIX) {
            Some(base) => second_row_key(&normalize_column_key(base)),
            None => normalize_column_key(key),
        };
        if canonical != *key && normalized.contains_key(&canonical) {
            continue;
        }
        normalized.insert(canonical, *flag);
    }
    normalized
}

/// Default header label for a built-in column.
pub fn builtin_header_label(id: &str) -> String {
    match id {
        "asn" => "ASN".to_string(),
        "document_type" => "Document type".to_string(),
        "storage_path" => "Storage path".to_string(),
        "page_count" => "Pages".to_string(),
        id if is_reserved(id) => String::new(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

/// Display type used to render a built-in column.
pub fn builtin_display_type(id: &str) -> DisplayType {
    match id {
        "created" | "added" | "modified" => DisplayType::Date,
        "correspondent" | "document_type" | "storage_path" | "tags" => DisplayType::List,
        "asn" => DisplayType::Identifier,
        _ => DisplayType::Text,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::view::ColumnRef;

    use super::{
        builtin_header_label, column_kind, custom_field_id_of, extract_custom_field_id,
        is_builtin, is_custom_field, normalize_column_id, normalize_column_key,
        normalize_column_keys, normalize_column_order, normalize_spanning_keys, ColumnKind,
    };

    #[test]
    fn test_normalize_maps_every_custom_field_form_to_one_id() {
        assert_eq!(normalize_column_id(&ColumnRef::Id(5)), "customField_5");
        assert_eq!(normalize_column_key("5"), "customField_5");
        assert_eq!(normalize_column_key("customField_5"), "customField_5");
        assert_eq!(normalize_column_key("title"), "title");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for id in ["5", "007", "customField_5", "title", "customField_x", "", "12ab"] {
            let once = normalize_column_key(id);
            assert_eq!(normalize_column_key(&once), once, "id={id}");
        }
        assert_eq!(normalize_column_key("007"), "customField_7");
    }

    #[test]
    fn test_extract_custom_field_id_parses_prefixed_suffix_only() {
        assert_eq!(extract_custom_field_id("customField_42"), Some(42));
        assert_eq!(extract_custom_field_id("42"), None);
        assert_eq!(extract_custom_field_id("customField_"), None);
        assert_eq!(extract_custom_field_id("customField_4x"), None);
        assert_eq!(custom_field_id_of("42"), Some(42));
    }

    #[test]
    fn test_classification_of_builtin_custom_and_unknown_ids() {
        assert!(is_builtin("title"));
        assert!(is_builtin("select"));
        assert!(!is_builtin("customField_3"));
        assert!(is_custom_field("customField_3"));
        assert!(is_custom_field("3"));
        assert!(!is_custom_field("mystery"));
        assert_eq!(column_kind("tags"), Some(ColumnKind::BuiltIn));
        assert_eq!(column_kind("9"), Some(ColumnKind::CustomField));
        assert_eq!(column_kind("mystery"), None);
    }

    #[test]
    fn test_bulk_normalization_rewrites_keys_and_order_entries() {
        let order = vec![ColumnRef::Id(2), ColumnRef::from("title"), ColumnRef::from("3")];
        assert_eq!(
            normalize_column_order(&order),
            vec!["customField_2", "title", "customField_3"]
        );

        let mut sizing = BTreeMap::new();
        sizing.insert("4".to_string(), 120.0);
        sizing.insert("customField_4".to_string(), 180.0);
        sizing.insert("title".to_string(), 300.0);
        let normalized = normalize_column_keys(&sizing);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized.get("customField_4"), Some(&180.0));
        assert_eq!(normalized.get("title"), Some(&300.0));
    }

    #[test]
    fn test_normalize_spanning_keys_keeps_second_row_suffix() {
        let mut spanning = BTreeMap::new();
        spanning.insert("7".to_string(), true);
        spanning.insert("8_secondRow".to_string(), true);
        spanning.insert("created_secondRow".to_string(), false);

        let normalized = normalize_spanning_keys(&spanning);
        assert_eq!(normalized.get("customField_7"), Some(&true));
        assert_eq!(normalized.get("customField_8_secondRow"), Some(&true));
        assert_eq!(normalized.get("created_secondRow"), Some(&false));
    }

    #[test]
    fn test_builtin_header_labels() {
        assert_eq!(builtin_header_label("title"), "Title");
        assert_eq!(builtin_header_label("asn"), "ASN");
        assert_eq!(builtin_header_label("document_type"), "Document type");
        assert_eq!(builtin_header_label("select"), "");
    }
}
