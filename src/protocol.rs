//! Notifications published by the view state controller.
//!
//! Consumers subscribe to the broadcast channel handed to the controller;
//! sending never blocks and a missing subscriber is not an error.

use crate::view::ViewId;

/// View lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewMessage {
    /// A view became active (`None` = global settings only).
    ViewSelected(Option<ViewId>),
    /// The active view referenced columns or fields that no longer exist.
    SchemaDriftDetected {
        view_id: ViewId,
        warnings: Vec<String>,
    },
    ViewSaved(i64),
    ViewSaveFailed {
        view_id: i64,
        error: String,
    },
    ViewCreated(i64),
    ViewCreateFailed(String),
    ChangesReverted(ViewId),
    /// Listing views from the store failed; the previous list is kept.
    ViewsRefreshFailed(String),
}
