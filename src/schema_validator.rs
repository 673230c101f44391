//! Repairs persisted views whose field references drifted from the custom-field catalog.
//!
//! Validation never fails: every problem is resolved by dropping (or keeping)
//! the offending entry and recording one human-readable warning for it.

use std::collections::{BTreeMap, HashSet};

use crate::{
    columns::{
        custom_field_column_id, custom_field_id_of, extract_custom_field_id, is_builtin,
        normalize_column_key, SECOND_ROW_SUFFIX,
    },
    view::{ColumnRef, CustomField, CustomView, DisplayType, FilterRule},
};

/// Result of sanitizing a view against the current catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewValidation {
    pub sanitized: CustomView,
    pub warnings: Vec<String>,
    /// Reserved; no current rule produces an error.
    pub errors: Vec<String>,
}

impl ViewValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

enum ColumnVerdict {
    Builtin,
    KnownCustomField,
    MissingCustomField(u64),
    Unrecognized,
}

fn classify_column(id: &str, known_field_ids: &HashSet<u64>) -> ColumnVerdict {
    if is_builtin(id) {
        return ColumnVerdict::Builtin;
    }
    match custom_field_id_of(id) {
        Some(field_id) if known_field_ids.contains(&field_id) => ColumnVerdict::KnownCustomField,
        Some(field_id) => ColumnVerdict::MissingCustomField(field_id),
        None => ColumnVerdict::Unrecognized,
    }
}

fn sanitize_column_order(
    order: &[ColumnRef],
    known_field_ids: &HashSet<u64>,
    warnings: &mut Vec<String>,
) -> Vec<ColumnRef> {
    let mut kept = Vec::with_capacity(order.len());
    for entry in order {
        let verdict = match entry {
            ColumnRef::Id(field_id) if known_field_ids.contains(field_id) => {
                ColumnVerdict::KnownCustomField
            }
            ColumnRef::Id(field_id) => ColumnVerdict::MissingCustomField(*field_id),
            ColumnRef::Name(name) => classify_column(name, known_field_ids),
        };
        match verdict {
            ColumnVerdict::Builtin | ColumnVerdict::KnownCustomField => kept.push(entry.clone()),
            ColumnVerdict::MissingCustomField(field_id) => warnings.push(format!(
                "column_order: removed entry '{entry}' referencing missing custom field {field_id}"
            )),
            ColumnVerdict::Unrecognized => {
                warnings.push(format!(
                    "column_order: kept unrecognized column '{entry}'"
                ));
                kept.push(entry.clone());
            }
        }
    }
    kept
}

fn sanitize_column_sizing(
    sizing: &BTreeMap<String, f64>,
    known_field_ids: &HashSet<u64>,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, f64> {
    let mut kept = BTreeMap::new();
    for (key, width) in sizing {
        match classify_column(key, known_field_ids) {
            ColumnVerdict::Builtin => {
                kept.insert(key.clone(), *width);
            }
            ColumnVerdict::KnownCustomField => {
                let canonical = normalize_column_key(key);
                if canonical != *key && kept.contains_key(&canonical) {
                    continue;
                }
                kept.insert(canonical, *width);
            }
            ColumnVerdict::MissingCustomField(field_id) => warnings.push(format!(
                "column_sizing: removed width for '{key}' referencing missing custom field {field_id}"
            )),
            ColumnVerdict::Unrecognized => {
                warnings.push(format!(
                    "column_sizing: kept width for unrecognized column '{key}'"
                ));
                kept.insert(key.clone(), *width);
            }
        }
    }
    kept
}

fn sanitize_column_visibility(
    visibility: &BTreeMap<String, bool>,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, bool> {
    let mut kept = BTreeMap::new();
    for (key, shown) in visibility {
        if is_builtin(key) {
            kept.insert(key.clone(), *shown);
        } else if let Some(field_id) = custom_field_id_of(key) {
            warnings.push(format!(
                "column_visibility: removed custom field {field_id} entry '{key}'; custom field visibility is not stored here"
            ));
        } else {
            warnings.push(format!(
                "column_visibility: removed non built-in entry '{key}'"
            ));
        }
    }
    kept
}

fn sanitize_column_display_types(
    display_types: &BTreeMap<String, DisplayType>,
    known_field_ids: &HashSet<u64>,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, DisplayType> {
    let mut kept = BTreeMap::new();
    for (key, display_type) in display_types {
        match custom_field_id_of(key) {
            Some(field_id) if known_field_ids.contains(&field_id) => {
                kept.insert(custom_field_column_id(field_id), *display_type);
            }
            Some(field_id) => warnings.push(format!(
                "column_display_types: removed display type for '{key}' referencing missing custom field {field_id}"
            )),
            None => warnings.push(format!(
                "column_display_types: removed display type for non custom field '{key}'"
            )),
        }
    }
    kept
}

fn sanitize_filter_rules(
    rules: &[FilterRule],
    known_field_ids: &HashSet<u64>,
    warnings: &mut Vec<String>,
) -> Vec<FilterRule> {
    rules
        .iter()
        .filter(|rule| match rule.custom_field_id() {
            Some(field_id) if !known_field_ids.contains(&field_id) => {
                warnings.push(format!(
                    "filter_rules: removed rule '{}' referencing missing custom field {field_id}",
                    rule.rule_type
                ));
                false
            }
            _ => true,
        })
        .cloned()
        .collect()
}

fn sanitize_filter_visibility(
    filter_visibility: &BTreeMap<String, bool>,
    known_field_ids: &HashSet<u64>,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, bool> {
    filter_visibility
        .iter()
        .filter(|(key, _)| match extract_custom_field_id(key) {
            Some(field_id) if !known_field_ids.contains(&field_id) => {
                warnings.push(format!(
                    "filter_visibility: removed filter '{key}' referencing missing custom field {field_id}"
                ));
                false
            }
            _ => true,
        })
        .map(|(key, shown)| (key.clone(), *shown))
        .collect()
}

fn sanitize_column_spanning(
    spanning: &BTreeMap<String, bool>,
    known_field_ids: &HashSet<u64>,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, bool> {
    spanning
        .iter()
        .filter(|(key, _)| {
            let base = key.strip_suffix(SECOND_ROW_SUFFIX).unwrap_or(key.as_str());
            match custom_field_id_of(base) {
                Some(field_id) if !known_field_ids.contains(&field_id) => {
                    warnings.push(format!(
                        "column_spanning: removed flag '{key}' referencing missing custom field {field_id}"
                    ));
                    false
                }
                _ => true,
            }
        })
        .map(|(key, flag)| (key.clone(), *flag))
        .collect()
}

/// Produces a copy of `view` with every reference to a custom field missing
/// from `catalog` removed, plus one warning per removed or suspicious entry.
///
/// Column order is strict for custom-field ids and lenient for unrecognized
/// string ids, which are kept (with a warning).
pub fn validate_and_sanitize_custom_view(
    view: &CustomView,
    catalog: &[CustomField],
) -> ViewValidation {
    let known_field_ids: HashSet<u64> = catalog.iter().map(|field| field.id).collect();
    let mut warnings = Vec::new();

    let mut sanitized = view.clone();
    sanitized.column_order =
        sanitize_column_order(&view.column_order, &known_field_ids, &mut warnings);
    sanitized.column_sizing =
        sanitize_column_sizing(&view.column_sizing, &known_field_ids, &mut warnings);
    sanitized.column_visibility = sanitize_column_visibility(&view.column_visibility, &mut warnings);
    sanitized.column_display_types = sanitize_column_display_types(
        &view.column_display_types,
        &known_field_ids,
        &mut warnings,
    );
    sanitized.column_spanning =
        sanitize_column_spanning(&view.column_spanning, &known_field_ids, &mut warnings);
    sanitized.filter_rules =
        sanitize_filter_rules(&view.filter_rules, &known_field_ids, &mut warnings);
    sanitized.filter_visibility =
        sanitize_filter_visibility(&view.filter_visibility, &known_field_ids, &mut warnings);

    ViewValidation {
        sanitized,
        warnings,
        errors: Vec::new(),
    }
}
