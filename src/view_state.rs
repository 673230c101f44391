//! Selection, editing, and persistence of the active custom view.
//!
//! The controller owns the only mutable view state: the fetched view list,
//! the sanitized active view, the working column widths, pending overrides,
//! and the last-saved baseline. Everything shown to the table is derived from
//! that state through the pure resolver and layout functions.

use std::{collections::BTreeMap, sync::Arc};

use log::{debug, error, info, warn};
use tokio::sync::broadcast::Sender;

use crate::{
    change_detector::{self, ViewSnapshot},
    columns::{
        builtin_header_label, extract_custom_field_id, is_builtin, is_custom_field,
        normalize_column_key, normalize_column_keys, normalize_column_keys_list, second_row_key,
        Column, DEFAULT_COLUMN_ORDER,
    },
    protocol::ViewMessage,
    resolver::{
        resolve_column_order, resolve_column_spanning, resolve_column_visibility,
        resolve_filter_visibility, valid_width, EffectiveConfiguration, ResolutionMemo,
        ResolverInput,
    },
    schema_validator::validate_and_sanitize_custom_view,
    settings::GlobalSettings,
    store::{ViewNamePrompt, ViewStore},
    table_layout::{compose_table_layout, LayoutRequest, TableLayout},
    view::{
        ColumnRef, CustomField, CustomView, CustomViewUpdate, NewCustomView, PendingEdits,
        ViewId,
    },
};

/// Keeps the built-in entries of a visibility map; custom-field visibility
/// is not stored with a view.
fn builtin_visibility(visibility: &BTreeMap<String, bool>) -> BTreeMap<String, bool> {
    visibility
        .iter()
        .filter(|(key, _)| is_builtin(key))
        .map(|(key, shown)| (key.clone(), *shown))
        .collect()
}

/// Coordinates the active view with its pending edits and the view store.
pub struct ViewStateController {
    store: Arc<dyn ViewStore>,
    name_prompt: Box<dyn ViewNamePrompt>,
    bus_producer: Sender<ViewMessage>,
    default_order: Vec<String>,
    header_labels: BTreeMap<String, String>,
    views: Vec<CustomView>,
    catalog: Vec<CustomField>,
    settings: GlobalSettings,
    selected: Option<ViewId>,
    active_view: Option<CustomView>,
    active_warnings: Vec<String>,
    /// Working widths; the grid edits these directly, outside pending edits.
    column_sizing: BTreeMap<String, f64>,
    pending: PendingEdits,
    baseline: ViewSnapshot,
    saving: bool,
    memo: ResolutionMemo,
}

impl ViewStateController {
    /// Creates a controller with no view selected.
    pub fn new(
        store: Arc<dyn ViewStore>,
        name_prompt: Box<dyn ViewNamePrompt>,
        bus_producer: Sender<ViewMessage>,
    ) -> Self {
        Self {
            store,
            name_prompt,
            bus_producer,
            default_order: DEFAULT_COLUMN_ORDER
                .iter()
                .map(|id| id.to_string())
                .collect(),
            header_labels: BTreeMap::new(),
            views: Vec::new(),
            catalog: Vec::new(),
            settings: GlobalSettings::new(),
            selected: None,
            active_view: None,
            active_warnings: Vec::new(),
            column_sizing: BTreeMap::new(),
            pending: PendingEdits::default(),
            baseline: ViewSnapshot::default(),
            saving: false,
            memo: ResolutionMemo::new(),
        }
    }

    /// Replaces the order used when neither a view nor the settings define one.
    pub fn with_default_order(mut self, default_order: Vec<String>) -> Self {
        self.default_order = normalize_column_keys_list(&default_order);
        self
    }

    /// Header label overrides keyed by column id.
    pub fn with_header_labels(mut self, header_labels: BTreeMap<String, String>) -> Self {
        self.header_labels = normalize_column_keys(&header_labels);
        self
    }

    pub fn views(&self) -> &[CustomView] {
        &self.views
    }

    pub fn selected_view_id(&self) -> Option<&ViewId> {
        self.selected.as_ref()
    }

    /// The selected view after sanitizing against the current catalog.
    pub fn active_view(&self) -> Option<&CustomView> {
        self.active_view.as_ref()
    }

    /// Drift warnings produced by the last validation of the active view.
    pub fn active_warnings(&self) -> &[String] {
        &self.active_warnings
    }

    pub fn pending(&self) -> &PendingEdits {
        &self.pending
    }

    pub fn baseline(&self) -> &ViewSnapshot {
        &self.baseline
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn set_settings(&mut self, settings: GlobalSettings) {
        self.settings = settings;
    }

    fn publish(&self, message: ViewMessage) {
        let _ = self.bus_producer.send(message);
    }

    fn find_view(&self, view_id: &ViewId) -> Option<&CustomView> {
        self.views.iter().find(|view| &view.id == view_id)
    }

    /// Sanitizes `view` against the catalog, reporting drift when the
    /// warnings differ from the last ones reported for the active view.
    fn sanitize(&mut self, view: &CustomView) -> CustomView {
        let validation = validate_and_sanitize_custom_view(view, &self.catalog);
        if validation.warnings != self.active_warnings {
            for warning in &validation.warnings {
                warn!("ViewState: view id={} drift: {}", view.id, warning);
            }
            if !validation.warnings.is_empty() {
                self.publish(ViewMessage::SchemaDriftDetected {
                    view_id: view.id.clone(),
                    warnings: validation.warnings.clone(),
                });
            }
        }
        self.active_warnings = validation.warnings;
        validation.sanitized
    }

    /// Lists views from the store and revalidates the current selection.
    ///
    /// A selection that no longer exists falls back to no view. Working
    /// widths, pending edits, and the baseline of a surviving selection are
    /// left as they are.
    pub fn refresh_views(&mut self) -> Result<(), String> {
        let views = match self.store.list_custom_views() {
            Ok(views) => views,
            Err(err) => {
                error!("ViewState: failed to refresh views: {}", err);
                self.publish(ViewMessage::ViewsRefreshFailed(err.clone()));
                return Err(err);
            }
        };
        debug!("ViewState: refreshed {} views", views.len());
        self.views = views;

        let Some(selected) = self.selected.clone() else {
            return Ok(());
        };
        match self.find_view(&selected).cloned() {
            Some(view) => {
                let sanitized = self.sanitize(&view);
                self.active_view = Some(sanitized);
            }
            None => {
                warn!(
                    "ViewState: selected view id={} is no longer available",
                    selected
                );
                self.clear_selection();
            }
        }
        Ok(())
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.active_view = None;
        self.active_warnings.clear();
        self.column_sizing.clear();
        self.pending.clear();
        self.baseline = ViewSnapshot::default();
        self.memo.invalidate();
        self.publish(ViewMessage::ViewSelected(None));
    }

    /// Activates a view (or none), discarding pending edits and resetting
    /// the working state and baseline to the sanitized view.
    pub fn select_view(&mut self, view_id: Option<ViewId>) -> Result<(), String> {
        let Some(view_id) = view_id else {
            self.clear_selection();
            return Ok(());
        };
        let view = self
            .find_view(&view_id)
            .cloned()
            .ok_or_else(|| format!("Custom view {} not found", view_id))?;

        self.active_warnings.clear();
        let sanitized = self.sanitize(&view);
        self.column_sizing = normalize_column_keys(&sanitized.column_sizing);
        self.baseline = ViewSnapshot::from_view(&sanitized);
        self.active_view = Some(sanitized);
        self.selected = Some(view_id.clone());
        self.pending.clear();
        self.memo.invalidate();
        info!("ViewState: selected view id={}", view_id);
        self.publish(ViewMessage::ViewSelected(Some(view_id)));
        Ok(())
    }

    /// Installs a new custom-field catalog and revalidates the active view.
    pub fn set_catalog(&mut self, catalog: Vec<CustomField>) {
        self.catalog = catalog;
        let Some(view) = self
            .selected
            .clone()
            .and_then(|view_id| self.find_view(&view_id).cloned())
        else {
            return;
        };
        let sanitized = self.sanitize(&view);
        let known_ids: Vec<u64> = self.catalog.iter().map(|field| field.id).collect();
        self.column_sizing.retain(|key, _| {
            !is_custom_field(key)
                || extract_custom_field_id(key).is_some_and(|id| known_ids.contains(&id))
        });
        self.baseline = ViewSnapshot::from_view(&sanitized);
        self.active_view = Some(sanitized);
    }

    pub fn set_column_order(&mut self, order: &[String]) {
        self.pending.order = Some(normalize_column_keys_list(order));
    }

    pub fn set_column_visibility(&mut self, column_id: &str, visible: bool) {
        let mut visibility = resolve_column_visibility(&self.resolver_input());
        visibility.insert(normalize_column_key(column_id), visible);
        self.pending.visibility = Some(visibility);
    }

    /// Sets (or with `None` clears) a working column width. Widths are only
    /// tracked while a view is active.
    pub fn set_column_width(&mut self, column_id: &str, width: Option<f64>) {
        if self.active_view.is_none() {
            debug!("ViewState: ignoring width for {} without an active view", column_id);
            return;
        }
        let key = normalize_column_key(column_id);
        match width.and_then(valid_width) {
            Some(width) => {
                self.column_sizing.insert(key, width);
            }
            None => {
                self.column_sizing.remove(&key);
            }
        }
    }

    pub fn set_filter_visibility(&mut self, filter_id: &str, shown: bool) {
        let mut filter_visibility = resolve_filter_visibility(&self.resolver_input());
        filter_visibility.insert(filter_id.to_string(), shown);
        self.pending.filter_visibility = Some(filter_visibility);
    }

    pub fn set_span_both_rows(&mut self, column_id: &str, enabled: bool) {
        self.set_spanning_flag(normalize_column_key(column_id), enabled);
    }

    pub fn set_show_on_second_row(&mut self, column_id: &str, enabled: bool) {
        self.set_spanning_flag(second_row_key(&normalize_column_key(column_id)), enabled);
    }

    fn set_spanning_flag(&mut self, key: String, enabled: bool) {
        let mut spanning = resolve_column_spanning(&self.resolver_input());
        spanning.insert(key, enabled);
        self.pending.spanning = Some(spanning);
    }

    fn resolver_input(&self) -> ResolverInput<'_> {
        ResolverInput {
            custom_view: self.active_view.as_ref(),
            settings: &self.settings,
            pending: &self.pending,
            catalog: &self.catalog,
        }
    }

    /// The active view with the working widths applied.
    fn working_view(&self) -> Option<CustomView> {
        self.active_view.as_ref().map(|view| {
            let mut working = view.clone();
            working.column_sizing = self.column_sizing.clone();
            working
        })
    }

    /// Resolves the configuration for the current state; reuses the last
    /// result while the inputs are structurally unchanged.
    pub fn effective_configuration(&mut self) -> EffectiveConfiguration {
        let working = self.working_view();
        let input = ResolverInput {
            custom_view: working.as_ref(),
            settings: &self.settings,
            pending: &self.pending,
            catalog: &self.catalog,
        };
        self.memo.resolve(&input)
    }

    fn header_label(&self, column_id: &str) -> String {
        if let Some(label) = self.header_labels.get(column_id) {
            return label.clone();
        }
        if let Some(field_id) = extract_custom_field_id(column_id) {
            return self
                .catalog
                .iter()
                .find(|field| field.id == field_id)
                .map(|field| field.name.clone())
                .unwrap_or_else(|| column_id.to_string());
        }
        builtin_header_label(column_id)
    }

    /// Composes the two-row grid for the current effective configuration.
    pub fn table_layout(&mut self) -> TableLayout {
        let effective = self.effective_configuration();
        let columns = effective.table_columns(&self.default_order);
        let header_label = |column_id: &str| self.header_label(column_id);
        compose_table_layout(&LayoutRequest {
            columns: &columns,
            visibility: &effective.column_visibility,
            spanning: &effective.column_spanning,
            header_label: &header_label,
        })
    }

    /// Ordered column descriptors for the current effective configuration.
    pub fn columns(&mut self) -> Vec<Column> {
        let effective = self.effective_configuration();
        let header_label = |column_id: &str| self.header_label(column_id);
        effective.describe_columns(&self.default_order, &header_label)
    }

    /// Current values of the savable aspects, in canonical form.
    pub fn current_snapshot(&self) -> ViewSnapshot {
        let input = self.resolver_input();
        ViewSnapshot {
            sizing: self.column_sizing.clone(),
            order: resolve_column_order(&input)
                .map(|(_, order)| order)
                .unwrap_or_default(),
            visibility: resolve_column_visibility(&input),
            filter_visibility: resolve_filter_visibility(&input),
            spanning: resolve_column_spanning(&input),
        }
        .normalized()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        change_detector::has_unsaved_changes(
            self.selected.as_ref(),
            &self.current_snapshot(),
            &self.baseline,
        )
    }

    /// Writes the current state to the selected persisted view.
    ///
    /// Pending edits and the baseline only change after the store confirms
    /// the update; a failure is logged and published, never returned.
    pub fn save(&mut self) {
        let Some(view_id) = self.selected.as_ref().and_then(ViewId::persisted) else {
            debug!("ViewState: save skipped, no persisted view selected");
            return;
        };
        if self.active_view.is_none() {
            debug!("ViewState: save skipped, view id={} is not loaded", view_id);
            return;
        }

        let snapshot = self.current_snapshot();
        let update = CustomViewUpdate {
            column_order: Some(snapshot.order.iter().cloned().map(ColumnRef::from).collect()),
            column_visibility: Some(builtin_visibility(&snapshot.visibility)),
            column_sizing: Some(snapshot.sizing.clone()),
            column_spanning: Some(snapshot.spanning.clone()),
            filter_visibility: Some(snapshot.filter_visibility.clone()),
        };

        self.saving = true;
        match self.store.update_custom_view(view_id, &update) {
            Ok(_) => {
                self.promote_saved_update(view_id, &update);
                info!("ViewState: saved view id={}", view_id);
                self.publish(ViewMessage::ViewSaved(view_id));
                // refresh errors are logged and published by refresh_views
                let _ = self.refresh_views();
            }
            Err(err) => {
                error!("ViewState: failed to save view id={}: {}", view_id, err);
                self.publish(ViewMessage::ViewSaveFailed {
                    view_id,
                    error: err,
                });
            }
        }
        self.saving = false;
    }

    /// Applies a confirmed update to the local view list and rebuilds the
    /// active view, working widths, and baseline from its sanitized form.
    fn promote_saved_update(&mut self, view_id: i64, update: &CustomViewUpdate) {
        for view in self
            .views
            .iter_mut()
            .filter(|view| view.id.persisted() == Some(view_id))
        {
            update.apply_to(view);
        }
        let saved = match self.find_view(&ViewId::Persisted(view_id)).cloned() {
            Some(view) => Some(view),
            None => self.active_view.clone().map(|mut view| {
                update.apply_to(&mut view);
                view
            }),
        };
        if let Some(saved) = saved {
            let sanitized = self.sanitize(&saved);
            self.baseline = ViewSnapshot::from_view(&sanitized);
            self.column_sizing = self.baseline.sizing.clone();
            self.active_view = Some(sanitized);
        }
        self.pending.clear();
        self.memo.invalidate();
    }

    /// Discards pending edits and restores the working widths from the
    /// baseline.
    pub fn revert(&mut self) {
        let Some(view_id) = self
            .active_view
            .as_ref()
            .map(|view| view.id.clone())
        else {
            debug!("ViewState: revert skipped, no active view");
            return;
        };
        self.column_sizing = self.baseline.sizing.clone();
        self.pending.clear();
        self.memo.invalidate();
        info!("ViewState: reverted view id={}", view_id);
        self.publish(ViewMessage::ChangesReverted(view_id));
    }

    /// Creates a new view from the current state under a user-supplied name
    /// and selects it. Returns the new id, or `None` when cancelled or failed.
    pub fn save_as(&mut self) -> Option<i64> {
        let Some(active_view) = self.active_view.as_ref() else {
            debug!("ViewState: save as skipped, no active view");
            return None;
        };
        let Some(name) = self
            .name_prompt
            .request_view_name(&active_view.name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
        else {
            debug!("ViewState: save as cancelled");
            return None;
        };

        let snapshot = self.current_snapshot();
        let payload = NewCustomView {
            name,
            description: active_view.description.clone(),
            is_global: false,
            column_order: snapshot.order.into_iter().map(ColumnRef::from).collect(),
            column_visibility: builtin_visibility(&snapshot.visibility),
            column_sizing: snapshot.sizing,
            column_display_types: normalize_column_keys(&active_view.column_display_types),
            column_spanning: snapshot.spanning,
            filter_rules: active_view.filter_rules.clone(),
            filter_visibility: snapshot.filter_visibility,
            sort_field: active_view.sort_field.clone(),
            sort_reverse: active_view.sort_reverse,
        };

        self.saving = true;
        let created = self.store.create_custom_view(&payload);
        self.saving = false;
        let created = match created {
            Ok(created) => created,
            Err(err) => {
                error!("ViewState: failed to create view '{}': {}", payload.name, err);
                self.publish(ViewMessage::ViewCreateFailed(err));
                return None;
            }
        };
        let Some(created_id) = created.id.persisted() else {
            error!(
                "ViewState: store returned non-persisted id={} for '{}'",
                created.id, payload.name
            );
            return None;
        };
        info!("ViewState: created view id={} name={}", created_id, payload.name);
        self.publish(ViewMessage::ViewCreated(created_id));

        if self.refresh_views().is_err() || self.find_view(&created.id).is_none() {
            self.views.push(created.clone());
        }
        if let Err(err) = self.select_view(Some(created.id)) {
            error!("ViewState: failed to select created view: {}", err);
        }
        Some(created_id)
    }
}
