//! Merges the active view, pending edits, and global settings into one
//! effective column configuration.
//!
//! Every aspect is resolved from an explicit list of sources in priority
//! order; the first source that has a value wins. Resolution is pure and is
//! recomputed from scratch for every input snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    columns::{
        builtin_display_type, column_kind, custom_field_column_id, extract_custom_field_id,
        normalize_column_keys, normalize_column_keys_list, normalize_column_order,
        normalize_spanning_keys, Column, ColumnKind, BUILTIN_FIELD_IDS,
    },
    settings::GlobalSettings,
    view::{CustomField, CustomView, DisplayType, PendingEdits},
};

/// Where a resolved aspect came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Pending,
    CustomView,
    GlobalSettings,
}

/// Borrowed inputs of one resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolverInput<'a> {
    pub custom_view: Option<&'a CustomView>,
    pub settings: &'a GlobalSettings,
    pub pending: &'a PendingEdits,
    pub catalog: &'a [CustomField],
}

/// A visible custom-field column.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomFieldColumn {
    pub field: CustomField,
    pub display_type: DisplayType,
    pub column_width: Option<f64>,
}

/// An enabled built-in column.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinFieldColumn {
    pub id: String,
    pub column_width: Option<f64>,
}

/// Resolved, read-only column configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfiguration {
    /// `None` means the caller should fall back to its default order.
    pub column_order: Option<Vec<String>>,
    pub order_source: Option<ConfigSource>,
    /// Absent keys are visible.
    pub column_visibility: BTreeMap<String, bool>,
    pub custom_field_columns: Vec<CustomFieldColumn>,
    pub builtin_fields: Vec<BuiltinFieldColumn>,
    pub column_sizing: BTreeMap<String, f64>,
    pub column_spanning: BTreeMap<String, bool>,
    pub filter_visibility: BTreeMap<String, bool>,
}

/// Returns the first source in priority order that holds a value.
fn first_present<T>(
    sources: impl IntoIterator<Item = (ConfigSource, Option<T>)>,
) -> Option<(ConfigSource, T)> {
    sources
        .into_iter()
        .find_map(|(source, value)| value.map(|value| (source, value)))
}

/// A width is usable only when it is a finite, positive number.
pub fn valid_width(width: f64) -> Option<f64> {
    (width.is_finite() && width > 0.0).then_some(width)
}

fn valid_widths(sizing: BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    sizing
        .into_iter()
        .filter_map(|(key, width)| valid_width(width).map(|width| (key, width)))
        .collect()
}

/// Order sources: pending edits, then the active view, then global settings.
pub fn resolve_column_order(input: &ResolverInput) -> Option<(ConfigSource, Vec<String>)> {
    first_present([
        (
            ConfigSource::Pending,
            input.pending.order.as_deref().map(normalize_column_keys_list),
        ),
        (
            ConfigSource::CustomView,
            input
                .custom_view
                .map(|view| normalize_column_order(&view.column_order)),
        ),
        (
            ConfigSource::GlobalSettings,
            input
                .settings
                .document_list_column_order()
                .map(|order| normalize_column_keys_list(&order)),
        ),
    ])
}

/// Visibility sources: pending edits, then the active view; global settings
/// only apply while no view is active.
pub fn resolve_column_visibility(input: &ResolverInput) -> BTreeMap<String, bool> {
    let global_visibility = match input.custom_view {
        Some(_) => None,
        None => input.settings.document_list_column_visibility(),
    };
    first_present([
        (ConfigSource::Pending, input.pending.visibility.clone()),
        (
            ConfigSource::CustomView,
            input.custom_view.map(|view| view.column_visibility.clone()),
        ),
        (ConfigSource::GlobalSettings, global_visibility),
    ])
    .map(|(_, visibility)| normalize_column_keys(&visibility))
    .unwrap_or_default()
}

/// Width sources: the active view's sizing, else the per-field and built-in
/// global width keys. Invalid widths are dropped.
pub fn resolve_column_sizing(input: &ResolverInput) -> BTreeMap<String, f64> {
    if let Some(view) = input.custom_view {
        return valid_widths(normalize_column_keys(&view.column_sizing));
    }
    let mut sizing = normalize_column_keys(&input.settings.document_list_column_sizing());
    for field in input.catalog {
        if let Some(width) = input.settings.custom_field_width(field.id) {
            sizing.insert(custom_field_column_id(field.id), width);
        }
    }
    valid_widths(sizing)
}

pub fn resolve_column_spanning(input: &ResolverInput) -> BTreeMap<String, bool> {
    first_present([
        (ConfigSource::Pending, input.pending.spanning.clone()),
        (
            ConfigSource::CustomView,
            input.custom_view.map(|view| view.column_spanning.clone()),
        ),
    ])
    .map(|(_, spanning)| normalize_spanning_keys(&spanning))
    .unwrap_or_default()
}

pub fn resolve_filter_visibility(input: &ResolverInput) -> BTreeMap<String, bool> {
    first_present([
        (ConfigSource::Pending, input.pending.filter_visibility.clone()),
        (
            ConfigSource::CustomView,
            input.custom_view.map(|view| view.filter_visibility.clone()),
        ),
    ])
    .map(|(_, filter_visibility)| filter_visibility)
    .unwrap_or_default()
}

fn view_custom_field_columns(
    view: &CustomView,
    catalog: &[CustomField],
    visibility: &BTreeMap<String, bool>,
    sizing: &BTreeMap<String, f64>,
) -> Vec<CustomFieldColumn> {
    let fields_by_id: HashMap<u64, &CustomField> =
        catalog.iter().map(|field| (field.id, field)).collect();
    let display_types = normalize_column_keys(&view.column_display_types);
    let is_visible = |column_id: &str| visibility.get(column_id).copied().unwrap_or(true);
    let to_column = |field: &CustomField| {
        let column_id = custom_field_column_id(field.id);
        CustomFieldColumn {
            field: field.clone(),
            display_type: display_types
                .get(&column_id)
                .copied()
                .unwrap_or_else(|| DisplayType::for_data_type(&field.data_type)),
            column_width: sizing.get(&column_id).copied(),
        }
    };

    let mut ordered_ids = HashSet::new();
    let mut columns = Vec::new();
    for column_id in normalize_column_order(&view.column_order) {
        let Some(field_id) = extract_custom_field_id(&column_id) else {
            continue;
        };
        if !ordered_ids.insert(field_id) {
            continue;
        }
        let Some(field) = fields_by_id.get(&field_id) else {
            continue;
        };
        if is_visible(&column_id) {
            columns.push(to_column(field));
        }
    }

    for field in catalog {
        if ordered_ids.contains(&field.id) {
            continue;
        }
        if is_visible(&custom_field_column_id(field.id)) {
            ordered_ids.insert(field.id);
            columns.push(to_column(field));
        }
    }
    columns
}

fn global_custom_field_columns(
    settings: &GlobalSettings,
    catalog: &[CustomField],
    sizing: &BTreeMap<String, f64>,
) -> Vec<CustomFieldColumn> {
    let mut columns: Vec<CustomFieldColumn> = catalog
        .iter()
        .filter(|field| settings.custom_field_shown(field.id) == Some(true))
        .map(|field| CustomFieldColumn {
            field: field.clone(),
            display_type: settings
                .custom_field_display_type(field.id)
                .unwrap_or_else(|| DisplayType::for_data_type(&field.data_type)),
            column_width: sizing.get(&custom_field_column_id(field.id)).copied(),
        })
        .collect();

    if let Some(display_order) = settings.custom_field_display_order() {
        let mut position_by_id = HashMap::new();
        for (position, field_id) in display_order.into_iter().enumerate() {
            position_by_id.entry(field_id).or_insert(position);
        }
        // stable: unresolved ids keep their catalog order after resolved ones
        columns.sort_by_key(|column| {
            position_by_id
                .get(&column.field.id)
                .copied()
                .unwrap_or(usize::MAX)
        });
    }
    columns
}

/// Resolves the effective configuration for one input snapshot.
pub fn resolve_configuration(input: &ResolverInput) -> EffectiveConfiguration {
    let (order_source, column_order) = match resolve_column_order(input) {
        Some((source, order)) => (Some(source), Some(order)),
        None => (None, None),
    };
    let column_visibility = resolve_column_visibility(input);
    let column_sizing = resolve_column_sizing(input);

    let custom_field_columns = match input.custom_view {
        Some(view) => {
            view_custom_field_columns(view, input.catalog, &column_visibility, &column_sizing)
        }
        None => global_custom_field_columns(input.settings, input.catalog, &column_sizing),
    };

    let builtin_fields = BUILTIN_FIELD_IDS
        .iter()
        .filter(|id| column_visibility.get(**id) != Some(&false))
        .map(|id| BuiltinFieldColumn {
            id: id.to_string(),
            column_width: column_sizing.get(*id).copied(),
        })
        .collect();

    EffectiveConfiguration {
        column_order,
        order_source,
        column_visibility,
        custom_field_columns,
        builtin_fields,
        column_sizing,
        column_spanning: resolve_column_spanning(input),
        filter_visibility: resolve_filter_visibility(input),
    }
}

impl EffectiveConfiguration {
    /// Ordered, visible, non-reserved column ids for the layout compositor.
    ///
    /// Follows the resolved order (or `default_order`), keeps only enabled
    /// built-ins and resolved custom fields, and appends resolved columns the
    /// order does not mention.
    pub fn table_columns(&self, default_order: &[String]) -> Vec<String> {
        let available: Vec<String> = self
            .builtin_fields
            .iter()
            .map(|builtin| builtin.id.clone())
            .chain(
                self.custom_field_columns
                    .iter()
                    .map(|column| custom_field_column_id(column.field.id)),
            )
            .collect();
        let available_ids: HashSet<&str> = available.iter().map(String::as_str).collect();

        let order = match &self.column_order {
            Some(order) => order.clone(),
            None => normalize_column_keys_list(default_order),
        };

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(available.len());
        for column_id in order {
            if available_ids.contains(column_id.as_str()) && seen.insert(column_id.clone()) {
                columns.push(column_id);
            }
        }
        for column_id in available {
            if seen.insert(column_id.clone()) {
                columns.push(column_id);
            }
        }
        columns
    }

    /// Describes the ordered table columns with their kind, display type, and
    /// header label.
    pub fn describe_columns(
        &self,
        default_order: &[String],
        header_label: &dyn Fn(&str) -> String,
    ) -> Vec<Column> {
        self.table_columns(default_order)
            .into_iter()
            .map(|id| {
                let display_type = match self.custom_field_column(&id) {
                    Some(column) => column.display_type,
                    None => builtin_display_type(&id),
                };
                Column {
                    kind: column_kind(&id).unwrap_or(ColumnKind::BuiltIn),
                    display_type,
                    header: header_label(id.as_str()),
                    id,
                }
            })
            .collect()
    }

    pub fn custom_field_column(&self, column_id: &str) -> Option<&CustomFieldColumn> {
        let field_id = extract_custom_field_id(column_id)?;
        self.custom_field_columns
            .iter()
            .find(|column| column.field.id == field_id)
    }
}

/// Owned copy of the inputs the cached result was computed from.
#[derive(Debug, Clone, PartialEq)]
struct ResolverSnapshot {
    custom_view: Option<CustomView>,
    settings: GlobalSettings,
    pending: PendingEdits,
    catalog: Vec<CustomField>,
}

impl ResolverSnapshot {
    fn from_input(input: &ResolverInput) -> Self {
        Self {
            custom_view: input.custom_view.cloned(),
            settings: input.settings.clone(),
            pending: input.pending.clone(),
            catalog: input.catalog.to_vec(),
        }
    }

    fn matches(&self, input: &ResolverInput) -> bool {
        self.custom_view.as_ref() == input.custom_view
            && self.settings == *input.settings
            && self.pending == *input.pending
            && self.catalog.as_slice() == input.catalog
    }
}

/// Caches the last resolution, keyed by structural equality of its inputs.
#[derive(Debug, Default)]
pub struct ResolutionMemo {
    last: Option<(ResolverSnapshot, EffectiveConfiguration)>,
}

impl ResolutionMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `input` equals the snapshot of the cached result.
    pub fn is_cached_for(&self, input: &ResolverInput) -> bool {
        self.last
            .as_ref()
            .is_some_and(|(snapshot, _)| snapshot.matches(input))
    }

    /// Returns the cached result for an equal snapshot, else resolves and caches.
    pub fn resolve(&mut self, input: &ResolverInput) -> EffectiveConfiguration {
        if let Some((snapshot, effective)) = &self.last {
            if snapshot.matches(input) {
                return effective.clone();
            }
        }
        let effective = resolve_configuration(input);
        self.last = Some((ResolverSnapshot::from_input(input), effective.clone()));
        effective
    }

    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use crate::{
        columns::DEFAULT_COLUMN_ORDER,
        settings::{
            custom_field_column_width_key, custom_field_display_type_key,
            custom_field_show_column_key, GlobalSettings, CUSTOM_FIELD_DISPLAY_ORDER_KEY,
            DOCUMENT_LIST_COLUMN_ORDER_KEY, DOCUMENT_LIST_COLUMN_VISIBILITY_KEY,
        },
        view::{ColumnRef, CustomField, CustomView, DisplayType, PendingEdits, ViewId},
    };

    use super::{
        resolve_column_order, resolve_configuration, ConfigSource, ResolutionMemo,
        ResolverInput,
    };

    fn field(id: u64, data_type: &str, name: &str) -> CustomField {
        CustomField {
            id,
            data_type: data_type.to_string(),
            name: name.to_string(),
        }
    }

    fn catalog() -> Vec<CustomField> {
        vec![
            field(1, "date", "Due"),
            field(2, "boolean", "Paid"),
            field(3, "string", "Reference"),
        ]
    }

    fn default_order() -> Vec<String> {
        DEFAULT_COLUMN_ORDER.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_order_precedence_pending_then_view_then_settings() {
        let catalog = catalog();
        let mut settings = GlobalSettings::new();
        settings.set(DOCUMENT_LIST_COLUMN_ORDER_KEY, json!(["tags", "title"]));
        let mut view = CustomView::new(ViewId::Persisted(1), "View");
        view.column_order = vec![ColumnRef::from("created"), ColumnRef::Id(2)];
        let pending = PendingEdits {
            order: Some(vec!["3".to_string(), "title".to_string()]),
            ..PendingEdits::default()
        };
        let no_pending = PendingEdits::default();

        let with_pending = ResolverInput {
            custom_view: Some(&view),
            settings: &settings,
            pending: &pending,
            catalog: &catalog,
        };
        assert_eq!(
            resolve_column_order(&with_pending),
            Some((
                ConfigSource::Pending,
                vec!["customField_3".to_string(), "title".to_string()]
            ))
        );

        let view_only = ResolverInput {
            pending: &no_pending,
            ..with_pending
        };
        assert_eq!(
            resolve_column_order(&view_only),
            Some((
                ConfigSource::CustomView,
                vec!["created".to_string(), "customField_2".to_string()]
            ))
        );

        let settings_only = ResolverInput {
            custom_view: None,
            ..view_only
        };
        assert_eq!(
            resolve_column_order(&settings_only).map(|(source, _)| source),
            Some(ConfigSource::GlobalSettings)
        );

        let empty_settings = GlobalSettings::new();
        let nothing = ResolverInput {
            settings: &empty_settings,
            ..settings_only
        };
        assert_eq!(resolve_column_order(&nothing), None);
    }

    #[test]
    fn test_view_custom_fields_follow_order_then_append_remaining_catalog_fields() {
        let catalog = catalog();
        let settings = GlobalSettings::new();
        let pending = PendingEdits::default();
        let mut view = CustomView::new(ViewId::Persisted(1), "View");
        view.column_order = vec![
            ColumnRef::Id(3),
            ColumnRef::from("title"),
            ColumnRef::from("customField_1"),
            ColumnRef::Id(3),
        ];
        view.column_display_types
            .insert("customField_3".to_string(), DisplayType::Url);
        view.column_sizing.insert("customField_1".to_string(), 150.0);

        let effective = resolve_configuration(&ResolverInput {
            custom_view: Some(&view),
            settings: &settings,
            pending: &pending,
            catalog: &catalog,
        });

        let ids: Vec<u64> = effective
            .custom_field_columns
            .iter()
            .map(|column| column.field.id)
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(effective.custom_field_columns[0].display_type, DisplayType::Url);
        assert_eq!(effective.custom_field_columns[1].display_type, DisplayType::Date);
        assert_eq!(effective.custom_field_columns[1].column_width, Some(150.0));
        assert_eq!(
            effective.custom_field_columns[2].display_type,
            DisplayType::Checkbox
        );
    }

    #[test]
    fn test_pending_visibility_can_hide_a_view_custom_field() {
        let catalog = catalog();
        let settings = GlobalSettings::new();
        let mut hidden = BTreeMap::new();
        hidden.insert("customField_2".to_string(), false);
        let pending = PendingEdits {
            visibility: Some(hidden),
            ..PendingEdits::default()
        };
        let view = CustomView::new(ViewId::Persisted(1), "View");

        let effective = resolve_configuration(&ResolverInput {
            custom_view: Some(&view),
            settings: &settings,
            pending: &pending,
            catalog: &catalog,
        });

        let ids: Vec<u64> = effective
            .custom_field_columns
            .iter()
            .map(|column| column.field.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_global_custom_fields_are_opt_in_and_follow_display_order() {
        let catalog = catalog();
        let pending = PendingEdits::default();
        let mut settings = GlobalSettings::new();
        settings.set(&custom_field_show_column_key(1), true);
        settings.set(&custom_field_show_column_key(2), true);
        settings.set(&custom_field_show_column_key(3), true);
        settings.set(CUSTOM_FIELD_DISPLAY_ORDER_KEY, json!([3, 1]));
        settings.set(&custom_field_display_type_key(1), "text");
        settings.set(&custom_field_column_width_key(2), 90);

        let effective = resolve_configuration(&ResolverInput {
            custom_view: None,
            settings: &settings,
            pending: &pending,
            catalog: &catalog,
        });
        let ids: Vec<u64> = effective
            .custom_field_columns
            .iter()
            .map(|column| column.field.id)
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(effective.custom_field_columns[1].display_type, DisplayType::Text);
        assert_eq!(effective.custom_field_columns[2].column_width, Some(90.0));

        settings.remove(&custom_field_show_column_key(2));
        settings.set(&custom_field_show_column_key(3), false);
        let effective = resolve_configuration(&ResolverInput {
            custom_view: None,
            settings: &settings,
            pending: &pending,
            catalog: &catalog,
        });
        let ids: Vec<u64> = effective
            .custom_field_columns
            .iter()
            .map(|column| column.field.id)
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_builtins_are_opt_out_on_explicit_false_only() {
        let catalog = catalog();
        let pending = PendingEdits::default();
        let mut settings = GlobalSettings::new();
        settings.set(
            DOCUMENT_LIST_COLUMN_VISIBILITY_KEY,
            json!({"notes": false, "tags": true}),
        );

        let effective = resolve_configuration(&ResolverInput {
            custom_view: None,
            settings: &settings,
            pending: &pending,
            catalog: &catalog,
        });
        let builtin_ids: Vec<&str> = effective
            .builtin_fields
            .iter()
            .map(|builtin| builtin.id.as_str())
            .collect();
        assert!(builtin_ids.contains(&"title"));
        assert!(builtin_ids.contains(&"tags"));
        assert!(!builtin_ids.contains(&"notes"));
        assert!(effective.custom_field_columns.is_empty());

        let mut view = CustomView::new(ViewId::Persisted(1), "View");
        view.column_visibility.insert("created".to_string(), false);
        let effective = resolve_configuration(&ResolverInput {
            custom_view: Some(&view),
            settings: &settings,
            pending: &pending,
            catalog: &catalog,
        });
        let builtin_ids: Vec<&str> = effective
            .builtin_fields
            .iter()
            .map(|builtin| builtin.id.as_str())
            .collect();
        assert!(builtin_ids.contains(&"notes"));
        assert!(!builtin_ids.contains(&"created"));
    }

    #[test]
    fn test_invalid_widths_are_silently_discarded() {
        let catalog = catalog();
        let settings = GlobalSettings::new();
        let pending = PendingEdits::default();
        let mut view = CustomView::new(ViewId::Persisted(1), "View");
        view.column_sizing.insert("title".to_string(), 280.0);
        view.column_sizing.insert("tags".to_string(), 0.0);
        view.column_sizing.insert("notes".to_string(), -10.0);
        view.column_sizing.insert("owner".to_string(), f64::NAN);
        view.column_sizing.insert("2".to_string(), 75.0);

        let effective = resolve_configuration(&ResolverInput {
            custom_view: Some(&view),
            settings: &settings,
            pending: &pending,
            catalog: &catalog,
        });

        assert_eq!(effective.column_sizing.len(), 2);
        assert_eq!(effective.column_sizing.get("title"), Some(&280.0));
        assert_eq!(effective.column_sizing.get("customField_2"), Some(&75.0));
        let tags = effective
            .builtin_fields
            .iter()
            .find(|builtin| builtin.id == "tags")
            .expect("tags should be enabled");
        assert_eq!(tags.column_width, None);
    }

    #[test]
    fn test_table_columns_use_default_order_and_append_unordered_columns() {
        let catalog = catalog();
        let pending = PendingEdits::default();
        let mut view = CustomView::new(ViewId::Persisted(1), "View");
        view.column_order = vec![
            ColumnRef::Id(2),
            ColumnRef::from("title"),
            ColumnRef::from("select"),
        ];
        let mut hidden = BTreeMap::new();
        for id in crate::columns::BUILTIN_FIELD_IDS {
            hidden.insert(id.to_string(), id == "title" || id == "tags");
        }
        view.column_visibility = hidden;
        let settings = GlobalSettings::new();

        let effective = resolve_configuration(&ResolverInput {
            custom_view: Some(&view),
            settings: &settings,
            pending: &pending,
            catalog: &catalog,
        });
        assert_eq!(
            effective.table_columns(&default_order()),
            vec!["customField_2", "title", "tags", "customField_1", "customField_3"]
        );

        let no_view = resolve_configuration(&ResolverInput {
            custom_view: None,
            settings: &settings,
            pending: &pending,
            catalog: &catalog,
        });
        assert_eq!(no_view.table_columns(&default_order()), default_order());
    }

    #[test]
    fn test_memo_reuses_result_only_for_equal_inputs() {
        let catalog = catalog();
        let settings = GlobalSettings::new();
        let pending = PendingEdits::default();
        let view = CustomView::new(ViewId::Persisted(1), "View");
        let input = ResolverInput {
            custom_view: Some(&view),
            settings: &settings,
            pending: &pending,
            catalog: &catalog,
        };

        let mut memo = ResolutionMemo::new();
        assert!(!memo.is_cached_for(&input));
        let first = memo.resolve(&input);
        assert!(memo.is_cached_for(&input));
        assert_eq!(memo.resolve(&input), first);

        let edited = PendingEdits {
            order: Some(vec!["tags".to_string()]),
            ..PendingEdits::default()
        };
        let changed = ResolverInput {
            pending: &edited,
            ..input
        };
        assert!(!memo.is_cached_for(&changed));
        let second = memo.resolve(&changed);
        assert_eq!(second.column_order, Some(vec!["tags".to_string()]));
        assert!(!memo.is_cached_for(&input));

        memo.invalidate();
        assert!(!memo.is_cached_for(&changed));
    }
}
