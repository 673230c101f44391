//! View persistence abstractions and the in-memory implementation.

pub mod in_memory;

use crate::view::{CustomView, CustomViewUpdate, NewCustomView};

/// Interface implemented by custom view persistence services.
pub trait ViewStore: Send + Sync {
    fn list_custom_views(&self) -> Result<Vec<CustomView>, String>;
    fn create_custom_view(&self, view: &NewCustomView) -> Result<CustomView, String>;
    fn update_custom_view(&self, id: i64, update: &CustomViewUpdate)
        -> Result<CustomView, String>;
}

/// Asks the user for the name of a view about to be created.
pub trait ViewNamePrompt {
    /// Returns `None` when the user cancels.
    fn request_view_name(&self, current_name: &str) -> Option<String>;
}

/// Prompt that answers with a fixed name, or cancels when given `None`.
#[derive(Debug, Clone, Default)]
pub struct FixedViewName(pub Option<String>);

impl ViewNamePrompt for FixedViewName {
    fn request_view_name(&self, _current_name: &str) -> Option<String> {
        self.0.clone()
    }
}
