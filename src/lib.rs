//! Custom view reconciliation and two-row table layout for a document list.

pub mod change_detector;
pub mod columns;
pub mod config;
pub mod protocol;
pub mod resolver;
pub mod schema_validator;
pub mod settings;
pub mod store;
pub mod table_layout;
pub mod view;
pub mod view_state;
pub mod workspace;
