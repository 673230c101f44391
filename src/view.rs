//! Custom view wire model, catalog fields, and pending edit overrides.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Deserializer};

/// Identifier of a selectable view.
///
/// Persisted views carry the numeric id assigned by the view store. Ephemeral
/// views (presets that only exist client side) are keyed by a string and can
/// never be saved to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum ViewId {
    Persisted(i64),
    Ephemeral(String),
}

impl ViewId {
    /// Returns the numeric store id when this view can be saved to.
    pub fn persisted(&self) -> Option<i64> {
        match self {
            Self::Persisted(id) => Some(*id),
            Self::Ephemeral(_) => None,
        }
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persisted(id) => write!(f, "{id}"),
            Self::Ephemeral(key) => write!(f, "{key}"),
        }
    }
}

/// One entry of a persisted `column_order`: a bare custom-field number or a
/// string id (built-in name, `customField_<n>`, or a numeric string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Id(u64),
    Name(String),
}

impl From<u64> for ColumnRef {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// How a column's cell content is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    Text,
    Date,
    Url,
    Checkbox,
    List,
    Identifier,
}

impl DisplayType {
    /// Default display type for a custom-field data type.
    pub fn for_data_type(data_type: &str) -> Self {
        match data_type.trim().to_ascii_lowercase().as_str() {
            "date" => Self::Date,
            "url" => Self::Url,
            "boolean" => Self::Checkbox,
            "select" | "documentlink" => Self::List,
            "integer" => Self::Identifier,
            // string, longtext, float, monetary and anything new
            _ => Self::Text,
        }
    }

    /// Parses a stored display type token.
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "date" => Some(Self::Date),
            "url" => Some(Self::Url),
            "checkbox" => Some(Self::Checkbox),
            "list" => Some(Self::List),
            "identifier" => Some(Self::Identifier),
            _ => None,
        }
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::Url => "url",
            Self::Checkbox => "checkbox",
            Self::List => "list",
            Self::Identifier => "identifier",
        }
    }
}

/// Custom field definition supplied by the catalog service.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct CustomField {
    pub id: u64,
    pub data_type: String,
    pub name: String,
}

/// Prefix of filter rule types that target one custom field (`custom_field_<id>`).
pub const CUSTOM_FIELD_RULE_PREFIX: &str = "custom_field_";

/// A typed filter rule stored with a view.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FilterRule {
    pub rule_type: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl FilterRule {
    pub fn new(rule_type: &str, value: impl Into<serde_json::Value>) -> Self {
        Self {
            rule_type: rule_type.to_string(),
            value: value.into(),
        }
    }

    /// Returns the custom-field id this rule filters on, if it is a custom-field rule.
    pub fn custom_field_id(&self) -> Option<u64> {
        let suffix = self.rule_type.strip_prefix(CUSTOM_FIELD_RULE_PREFIX)?;
        if suffix.is_empty() || !suffix.bytes().all(|byte| byte.is_ascii_digit()) {
            return None;
        }
        suffix.parse().ok()
    }
}

/// Persisted, shareable column and filter configuration.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CustomView {
    pub id: ViewId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<u64>,
    #[serde(default)]
    pub is_global: bool,
    #[serde(default, deserialize_with = "deserialize_column_order")]
    pub column_order: Vec<ColumnRef>,
    #[serde(default)]
    pub column_visibility: BTreeMap<String, bool>,
    #[serde(default, deserialize_with = "deserialize_column_widths")]
    pub column_sizing: BTreeMap<String, f64>,
    #[serde(default)]
    pub column_display_types: BTreeMap<String, DisplayType>,
    #[serde(default)]
    pub column_spanning: BTreeMap<String, bool>,
    #[serde(default)]
    pub filter_rules: Vec<FilterRule>,
    #[serde(default)]
    pub filter_visibility: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_reverse: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

impl CustomView {
    /// Creates an empty view with the given id and name.
    pub fn new(id: ViewId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: None,
            owner: None,
            is_global: false,
            column_order: Vec::new(),
            column_visibility: BTreeMap::new(),
            column_sizing: BTreeMap::new(),
            column_display_types: BTreeMap::new(),
            column_spanning: BTreeMap::new(),
            filter_rules: Vec::new(),
            filter_visibility: BTreeMap::new(),
            sort_field: None,
            sort_reverse: None,
            created: None,
            modified: None,
        }
    }
}

/// Payload for creating a view; the store assigns the id.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewCustomView {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_global: bool,
    pub column_order: Vec<ColumnRef>,
    pub column_visibility: BTreeMap<String, bool>,
    pub column_sizing: BTreeMap<String, f64>,
    pub column_display_types: BTreeMap<String, DisplayType>,
    pub column_spanning: BTreeMap<String, bool>,
    pub filter_rules: Vec<FilterRule>,
    pub filter_visibility: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_reverse: Option<bool>,
}

impl NewCustomView {
    /// Materializes the payload as a stored view under `id`.
    pub fn into_view(self, id: ViewId) -> CustomView {
        CustomView {
            id,
            name: self.name,
            description: self.description,
            owner: None,
            is_global: self.is_global,
            column_order: self.column_order,
            column_visibility: self.column_visibility,
            column_sizing: self.column_sizing,
            column_display_types: self.column_display_types,
            column_spanning: self.column_spanning,
            filter_rules: self.filter_rules,
            filter_visibility: self.filter_visibility,
            sort_field: self.sort_field,
            sort_reverse: self.sort_reverse,
            created: None,
            modified: None,
        }
    }
}

/// Partial update payload; only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CustomViewUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_order: Option<Vec<ColumnRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_visibility: Option<BTreeMap<String, bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_sizing: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_spanning: Option<BTreeMap<String, bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_visibility: Option<BTreeMap<String, bool>>,
}

impl CustomViewUpdate {
    /// Applies the present fields onto `view`.
    pub fn apply_to(&self, view: &mut CustomView) {
        if let Some(order) = &self.column_order {
            view.column_order = order.clone();
        }
        if let Some(visibility) = &self.column_visibility {
            view.column_visibility = visibility.clone();
        }
        if let Some(sizing) = &self.column_sizing {
            view.column_sizing = sizing.clone();
        }
        if let Some(spanning) = &self.column_spanning {
            view.column_spanning = spanning.clone();
        }
        if let Some(filter_visibility) = &self.filter_visibility {
            view.filter_visibility = filter_visibility.clone();
        }
    }
}

/// Unsaved overrides made since the active view was loaded or saved.
/// `None` defers to the persisted view or the global settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingEdits {
    pub order: Option<Vec<String>>,
    pub visibility: Option<BTreeMap<String, bool>>,
    pub filter_visibility: Option<BTreeMap<String, bool>>,
    pub spanning: Option<BTreeMap<String, bool>>,
}

impl PendingEdits {
    pub fn is_empty(&self) -> bool {
        self.order.is_none()
            && self.visibility.is_none()
            && self.filter_visibility.is_none()
            && self.spanning.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Reads a width map, dropping entries that are not numbers instead of
/// rejecting the whole view.
fn deserialize_column_widths<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| value.as_f64().map(|width| (key, width)))
        .collect())
}

/// Reads a stored column order, skipping entries that are neither a
/// non-negative integer nor a string.
fn deserialize_column_order<'de, D>(deserializer: D) -> Result<Vec<ColumnRef>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|entry| match entry {
            serde_json::Value::Number(number) => match number.as_u64() {
                Some(id) => Some(ColumnRef::Id(id)),
                None => {
                    warn!("Ignoring column order entry {}: not a field id", number);
                    None
                }
            },
            serde_json::Value::String(name) => Some(ColumnRef::Name(name)),
            other => {
                warn!("Ignoring column order entry {}: unsupported type", other);
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{ColumnRef, CustomView, DisplayType, FilterRule, PendingEdits, ViewId};

    #[test]
    fn test_custom_view_parses_mixed_column_order_and_drops_non_numeric_widths() {
        let json = r#"{
            "id": 4,
            "name": "Inbox",
            "is_global": true,
            "column_order": [10, "title", "customField_3"],
            "column_visibility": {"title": true},
            "column_sizing": {"title": 240, "customField_3": "wide"},
            "column_display_types": {"customField_3": "checkbox"}
        }"#;

        let view: CustomView = serde_json::from_str(json).expect("view should parse");
        assert_eq!(view.id, ViewId::Persisted(4));
        assert_eq!(
            view.column_order,
            vec![
                ColumnRef::Id(10),
                ColumnRef::Name("title".to_string()),
                ColumnRef::Name("customField_3".to_string()),
            ]
        );
        assert_eq!(view.column_sizing.len(), 1);
        assert_eq!(view.column_sizing.get("title"), Some(&240.0));
        assert_eq!(
            view.column_display_types.get("customField_3"),
            Some(&DisplayType::Checkbox)
        );
        assert!(view.filter_rules.is_empty());
        assert!(view.sort_field.is_none());
    }

    #[test]
    fn test_column_order_skips_entries_that_are_not_ids_or_names() {
        let json = r#"{
            "id": 5,
            "name": "Backlog",
            "column_order": [10, 10.0, -1, "title", null, {"id": 3}]
        }"#;

        let view: CustomView = serde_json::from_str(json).expect("view should still parse");
        assert_eq!(
            view.column_order,
            vec![ColumnRef::Id(10), ColumnRef::Name("title".to_string())]
        );
    }

    #[test]
    fn test_view_id_only_numeric_ids_are_persisted() {
        let persisted: ViewId = serde_json::from_str("12").expect("numeric id should parse");
        let ephemeral: ViewId = serde_json::from_str("\"12\"").expect("string id should parse");

        assert_eq!(persisted.persisted(), Some(12));
        assert_eq!(ephemeral.persisted(), None);
        assert_eq!(ViewId::Ephemeral("inbox".to_string()).persisted(), None);
    }

    #[test]
    fn test_display_type_for_data_type_uses_lookup_table() {
        assert_eq!(DisplayType::for_data_type("string"), DisplayType::Text);
        assert_eq!(DisplayType::for_data_type("monetary"), DisplayType::Text);
        assert_eq!(DisplayType::for_data_type("date"), DisplayType::Date);
        assert_eq!(DisplayType::for_data_type("url"), DisplayType::Url);
        assert_eq!(DisplayType::for_data_type("boolean"), DisplayType::Checkbox);
        assert_eq!(DisplayType::for_data_type("select"), DisplayType::List);
        assert_eq!(DisplayType::for_data_type("documentlink"), DisplayType::List);
        assert_eq!(DisplayType::for_data_type("integer"), DisplayType::Identifier);
        assert_eq!(DisplayType::for_data_type("something_new"), DisplayType::Text);
    }

    #[test]
    fn test_filter_rule_custom_field_id_requires_numeric_suffix() {
        assert_eq!(
            FilterRule::new("custom_field_10", "x").custom_field_id(),
            Some(10)
        );
        assert_eq!(FilterRule::new("custom_field_", "x").custom_field_id(), None);
        assert_eq!(
            FilterRule::new("custom_field_query", "x").custom_field_id(),
            None
        );
        assert_eq!(FilterRule::new("title_content", "x").custom_field_id(), None);
    }

    #[test]
    fn test_pending_edits_clear_resets_every_override() {
        let mut pending = PendingEdits {
            order: Some(vec!["title".to_string()]),
            ..PendingEdits::default()
        };
        assert!(!pending.is_empty());

        pending.clear();
        assert!(pending.is_empty());
    }
}
