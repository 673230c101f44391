//! Process-local view store backed by a mutex-guarded list.

use std::sync::Mutex;

use log::debug;

use super::ViewStore;
use crate::view::{CustomView, CustomViewUpdate, NewCustomView, ViewId};

#[derive(Debug, Default)]
struct StoreState {
    views: Vec<CustomView>,
    next_id: i64,
    fail_next_list: Option<String>,
    fail_next_create: Option<String>,
    fail_next_update: Option<String>,
    update_calls: Vec<(i64, CustomViewUpdate)>,
    list_calls: usize,
}

/// Reference [`ViewStore`] keeping views in memory, with one-shot failure
/// injection for each operation.
#[derive(Debug, Default)]
pub struct InMemoryViewStore {
    state: Mutex<StoreState>,
}

impl InMemoryViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store. New ids continue after the largest persisted id.
    pub fn with_views(views: Vec<CustomView>) -> Self {
        let next_id = views
            .iter()
            .filter_map(|view| view.id.persisted())
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            state: Mutex::new(StoreState {
                views,
                next_id,
                ..StoreState::default()
            }),
        }
    }

    fn with_state<T>(&self, apply: impl FnOnce(&mut StoreState) -> T) -> Result<T, String> {
        let mut state = self
            .state
            .lock()
            .map_err(|err| format!("View store lock poisoned: {}", err))?;
        Ok(apply(&mut state))
    }

    pub fn fail_next_list(&self, reason: &str) -> Result<(), String> {
        self.with_state(|state| state.fail_next_list = Some(reason.to_string()))
    }

    pub fn fail_next_create(&self, reason: &str) -> Result<(), String> {
        self.with_state(|state| state.fail_next_create = Some(reason.to_string()))
    }

    pub fn fail_next_update(&self, reason: &str) -> Result<(), String> {
        self.with_state(|state| state.fail_next_update = Some(reason.to_string()))
    }

    /// Update payloads received so far, in call order.
    pub fn update_calls(&self) -> Result<Vec<(i64, CustomViewUpdate)>, String> {
        self.with_state(|state| state.update_calls.clone())
    }

    /// Number of list requests received so far, failed ones included.
    pub fn list_calls(&self) -> Result<usize, String> {
        self.with_state(|state| state.list_calls)
    }

    /// Removes a view; returns whether it existed.
    pub fn remove_view(&self, view_id: &ViewId) -> Result<bool, String> {
        self.with_state(|state| {
            let before = state.views.len();
            state.views.retain(|view| &view.id != view_id);
            state.views.len() != before
        })
    }

    pub fn view(&self, id: i64) -> Result<Option<CustomView>, String> {
        self.with_state(|state| {
            state
                .views
                .iter()
                .find(|view| view.id.persisted() == Some(id))
                .cloned()
        })
    }
}

impl ViewStore for InMemoryViewStore {
    fn list_custom_views(&self) -> Result<Vec<CustomView>, String> {
        self.with_state(|state| {
            state.list_calls += 1;
            match state.fail_next_list.take() {
                Some(reason) => Err(format!("Failed to list custom views: {}", reason)),
                None => Ok(state.views.clone()),
            }
        })?
    }

    fn create_custom_view(&self, view: &NewCustomView) -> Result<CustomView, String> {
        self.with_state(|state| {
            if let Some(reason) = state.fail_next_create.take() {
                return Err(format!(
                    "Failed to create custom view '{}': {}",
                    view.name, reason
                ));
            }
            let id = state.next_id.max(1);
            state.next_id = id + 1;
            let created = view.clone().into_view(ViewId::Persisted(id));
            state.views.push(created.clone());
            debug!("InMemoryViewStore: created view id={} name={}", id, view.name);
            Ok(created)
        })?
    }

    fn update_custom_view(
        &self,
        id: i64,
        update: &CustomViewUpdate,
    ) -> Result<CustomView, String> {
        self.with_state(|state| {
            state.update_calls.push((id, update.clone()));
            if let Some(reason) = state.fail_next_update.take() {
                return Err(format!("Failed to update custom view {}: {}", id, reason));
            }
            let Some(view) = state
                .views
                .iter_mut()
                .find(|view| view.id.persisted() == Some(id))
            else {
                return Err(format!("Custom view {} not found", id));
            };
            update.apply_to(view);
            debug!("InMemoryViewStore: updated view id={}", id);
            Ok(view.clone())
        })?
    }
}
