//! Global fallback settings bag read by documented key-naming conventions.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::{columns::custom_field_id_of, view::DisplayType};

/// Per-field flag that opts a custom field into the document list.
pub const CUSTOM_FIELD_SHOW_COLUMN_PREFIX: &str = "custom_field_show_column_";
/// Per-field display type override.
pub const CUSTOM_FIELD_DISPLAY_TYPE_PREFIX: &str = "custom_field_display_type_";
/// Per-field column width in pixels.
pub const CUSTOM_FIELD_COLUMN_WIDTH_PREFIX: &str = "custom_field_column_width_";
/// Ordered list of custom-field ids.
pub const CUSTOM_FIELD_DISPLAY_ORDER_KEY: &str = "custom_field_display_order";
/// Ordered list of column ids for the whole document list.
pub const DOCUMENT_LIST_COLUMN_ORDER_KEY: &str = "document_list_column_order";
/// Map of built-in column id to shown flag.
pub const DOCUMENT_LIST_COLUMN_VISIBILITY_KEY: &str = "document_list_column_visibility";
/// Map of column id to width for built-in columns.
pub const DOCUMENT_LIST_COLUMN_SIZING_KEY: &str = "document_list_column_sizing";

pub fn custom_field_show_column_key(field_id: u64) -> String {
    format!("{CUSTOM_FIELD_SHOW_COLUMN_PREFIX}{field_id}")
}

pub fn custom_field_display_type_key(field_id: u64) -> String {
    format!("{CUSTOM_FIELD_DISPLAY_TYPE_PREFIX}{field_id}")
}

pub fn custom_field_column_width_key(field_id: u64) -> String {
    format!("{CUSTOM_FIELD_COLUMN_WIDTH_PREFIX}{field_id}")
}

/// Flat key/value settings used when no custom view is active.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct GlobalSettings {
    values: BTreeMap<String, Value>,
}

impl GlobalSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Explicit opt-in flag for a custom field; `None` when unset or not a bool.
    pub fn custom_field_shown(&self, field_id: u64) -> Option<bool> {
        self.get(&custom_field_show_column_key(field_id))
            .and_then(Value::as_bool)
    }

    pub fn custom_field_display_type(&self, field_id: u64) -> Option<DisplayType> {
        self.get(&custom_field_display_type_key(field_id))
            .and_then(Value::as_str)
            .and_then(DisplayType::from_key)
    }

    /// Raw numeric width for a custom field; validity is left to the caller.
    pub fn custom_field_width(&self, field_id: u64) -> Option<f64> {
        self.get(&custom_field_column_width_key(field_id))
            .and_then(Value::as_f64)
    }

    /// Custom-field display order. Entries may be numbers, numeric strings, or
    /// `customField_<id>` strings; anything else is skipped.
    pub fn custom_field_display_order(&self) -> Option<Vec<u64>> {
        let entries = self.get(CUSTOM_FIELD_DISPLAY_ORDER_KEY)?.as_array()?;
        Some(
            entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::Number(number) => number.as_u64(),
                    Value::String(text) => custom_field_id_of(text),
                    _ => None,
                })
                .collect(),
        )
    }

    /// Document-list column order as raw string ids (numbers are stringified).
    pub fn document_list_column_order(&self) -> Option<Vec<String>> {
        let entries = self.get(DOCUMENT_LIST_COLUMN_ORDER_KEY)?.as_array()?;
        Some(
            entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::Number(number) => number.as_u64().map(|id| id.to_string()),
                    Value::String(text) => Some(text.clone()),
                    _ => None,
                })
                .collect(),
        )
    }

    pub fn document_list_column_visibility(&self) -> Option<BTreeMap<String, bool>> {
        let entries = self.get(DOCUMENT_LIST_COLUMN_VISIBILITY_KEY)?.as_object()?;
        Some(
            entries
                .iter()
                .filter_map(|(key, value)| value.as_bool().map(|shown| (key.clone(), shown)))
                .collect(),
        )
    }

    /// Built-in widths keyed by column id; non-numeric entries are skipped.
    pub fn document_list_column_sizing(&self) -> BTreeMap<String, f64> {
        let Some(entries) = self
            .get(DOCUMENT_LIST_COLUMN_SIZING_KEY)
            .and_then(Value::as_object)
        else {
            return BTreeMap::new();
        };
        entries
            .iter()
            .filter_map(|(key, value)| value.as_f64().map(|width| (key.clone(), width)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        custom_field_column_width_key, custom_field_display_type_key,
        custom_field_show_column_key, GlobalSettings, CUSTOM_FIELD_DISPLAY_ORDER_KEY,
        DOCUMENT_LIST_COLUMN_ORDER_KEY, DOCUMENT_LIST_COLUMN_VISIBILITY_KEY,
    };
    use crate::view::DisplayType;

    #[test]
    fn test_per_field_keys_follow_naming_conventions() {
        let mut settings = GlobalSettings::new();
        settings.set(&custom_field_show_column_key(3), true);
        settings.set(&custom_field_display_type_key(3), "url");
        settings.set(&custom_field_column_width_key(3), 210);

        assert_eq!(settings.custom_field_shown(3), Some(true));
        assert_eq!(settings.custom_field_display_type(3), Some(DisplayType::Url));
        assert_eq!(settings.custom_field_width(3), Some(210.0));
        assert_eq!(settings.custom_field_shown(4), None);
    }

    #[test]
    fn test_non_bool_show_flag_is_not_an_opt_in() {
        let mut settings = GlobalSettings::new();
        settings.set(&custom_field_show_column_key(3), "yes");
        assert_eq!(settings.custom_field_shown(3), None);
    }

    #[test]
    fn test_list_valued_keys_accept_mixed_entries() {
        let mut settings = GlobalSettings::new();
        settings.set(CUSTOM_FIELD_DISPLAY_ORDER_KEY, json!([4, "2", "customField_9", true]));
        settings.set(DOCUMENT_LIST_COLUMN_ORDER_KEY, json!(["title", 5, null]));
        settings.set(
            DOCUMENT_LIST_COLUMN_VISIBILITY_KEY,
            json!({"title": false, "tags": "maybe"}),
        );

        assert_eq!(settings.custom_field_display_order(), Some(vec![4, 2, 9]));
        assert_eq!(
            settings.document_list_column_order(),
            Some(vec!["title".to_string(), "5".to_string()])
        );
        let visibility = settings
            .document_list_column_visibility()
            .expect("visibility map should be present");
        assert_eq!(visibility.get("title"), Some(&false));
        assert!(!visibility.contains_key("tags"));
    }

    #[test]
    fn test_settings_round_trip_as_flat_json_object() {
        let settings: GlobalSettings =
            serde_json::from_str(r#"{"custom_field_show_column_1": true}"#)
                .expect("settings should parse");
        assert_eq!(settings.custom_field_shown(1), Some(true));
    }
}
