//! JSON workspace snapshots consumed by the inspector binary.

use std::path::Path;

use crate::{
    settings::GlobalSettings,
    view::{CustomField, CustomView, ViewId},
};

/// Views, catalog, and settings captured from a document list instance.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct WorkspaceSnapshot {
    #[serde(default)]
    pub views: Vec<CustomView>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub settings: GlobalSettings,
}

pub fn parse_workspace(text: &str) -> Result<WorkspaceSnapshot, String> {
    serde_json::from_str(text).map_err(|err| format!("failed to parse workspace JSON: {}", err))
}

pub fn load_workspace(path: &Path) -> Result<WorkspaceSnapshot, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read workspace {}: {}", path.display(), err))?;
    parse_workspace(&text)
}

/// Numeric ids select persisted views; anything else names an ephemeral one.
pub fn parse_view_id(raw: &str) -> ViewId {
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(id) => ViewId::Persisted(id),
        Err(_) => ViewId::Ephemeral(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_view_id, parse_workspace};
    use crate::view::ViewId;

    #[test]
    fn test_workspace_parses_views_fields_and_settings() {
        let workspace = parse_workspace(
            r#"{
                "views": [{"id": 1, "name": "Inbox", "column_order": [10, "title"]}],
                "custom_fields": [{"id": 10, "data_type": "date", "name": "Due"}],
                "settings": {"custom_field_show_column_10": true}
            }"#,
        )
        .expect("workspace should parse");

        assert_eq!(workspace.views.len(), 1);
        assert_eq!(workspace.custom_fields[0].name, "Due");
        assert_eq!(workspace.settings.custom_field_shown(10), Some(true));
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let workspace = parse_workspace("{}").expect("empty workspace should parse");
        assert!(workspace.views.is_empty());
        assert!(parse_workspace("[").is_err());
    }

    #[test]
    fn test_view_id_argument_parsing() {
        assert_eq!(parse_view_id(" 4 "), ViewId::Persisted(4));
        assert_eq!(parse_view_id("recent"), ViewId::Ephemeral("recent".to_string()));
    }
}
