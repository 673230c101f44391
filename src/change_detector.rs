//! Unsaved-change detection against the last-saved baseline.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    columns::{
        normalize_column_keys, normalize_column_keys_list, normalize_column_order,
        normalize_spanning_keys,
    },
    view::{CustomView, ViewId},
};

/// The five savable aspects of a view, as plain canonical maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSnapshot {
    pub sizing: BTreeMap<String, f64>,
    pub order: Vec<String>,
    pub visibility: BTreeMap<String, bool>,
    pub filter_visibility: BTreeMap<String, bool>,
    pub spanning: BTreeMap<String, bool>,
}

impl ViewSnapshot {
    /// Captures the savable aspects of a persisted view in canonical form.
    pub fn from_view(view: &CustomView) -> Self {
        Self {
            sizing: normalize_column_keys(&view.column_sizing),
            order: normalize_column_order(&view.column_order),
            visibility: normalize_column_keys(&view.column_visibility),
            filter_visibility: view.filter_visibility.clone(),
            spanning: normalize_spanning_keys(&view.column_spanning),
        }
    }

    /// Returns a copy with every column key in canonical form.
    pub fn normalized(&self) -> Self {
        Self {
            sizing: normalize_column_keys(&self.sizing),
            order: normalize_column_keys_list(&self.order),
            visibility: normalize_column_keys(&self.visibility),
            filter_visibility: self.filter_visibility.clone(),
            spanning: normalize_spanning_keys(&self.spanning),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangedAspect {
    Sizing,
    Order,
    Visibility,
    FilterVisibility,
    Spanning,
}

fn union_keys<'a, V>(
    current: &'a BTreeMap<String, V>,
    baseline: &'a BTreeMap<String, V>,
) -> BTreeSet<&'a str> {
    current
        .keys()
        .chain(baseline.keys())
        .map(String::as_str)
        .collect()
}

/// Missing sizing keys stay missing: a width added or removed is a change.
fn sizing_differs(current: &BTreeMap<String, f64>, baseline: &BTreeMap<String, f64>) -> bool {
    union_keys(current, baseline)
        .into_iter()
        .any(|key| current.get(key) != baseline.get(key))
}

fn flags_differ(
    current: &BTreeMap<String, bool>,
    baseline: &BTreeMap<String, bool>,
    missing: bool,
) -> bool {
    union_keys(current, baseline).into_iter().any(|key| {
        current.get(key).copied().unwrap_or(missing)
            != baseline.get(key).copied().unwrap_or(missing)
    })
}

/// Lists the aspects whose current value differs from the baseline.
pub fn changed_aspects(current: &ViewSnapshot, baseline: &ViewSnapshot) -> Vec<ChangedAspect> {
    let mut changed = Vec::new();
    if sizing_differs(&current.sizing, &baseline.sizing) {
        changed.push(ChangedAspect::Sizing);
    }
    if current.order != baseline.order {
        changed.push(ChangedAspect::Order);
    }
    if flags_differ(&current.visibility, &baseline.visibility, true) {
        changed.push(ChangedAspect::Visibility);
    }
    if flags_differ(&current.filter_visibility, &baseline.filter_visibility, false) {
        changed.push(ChangedAspect::FilterVisibility);
    }
    if flags_differ(&current.spanning, &baseline.spanning, false) {
        changed.push(ChangedAspect::Spanning);
    }
    changed
}

/// Returns `true` when a persisted view is selected and any aspect differs
/// from the baseline. Views that cannot be saved to never report changes.
pub fn has_unsaved_changes(
    selected: Option<&ViewId>,
    current: &ViewSnapshot,
    baseline: &ViewSnapshot,
) -> bool {
    if selected.and_then(ViewId::persisted).is_none() {
        return false;
    }
    !changed_aspects(current, baseline).is_empty()
}
