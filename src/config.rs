//! Inspector configuration model, defaults, and loading.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::columns::DEFAULT_COLUMN_ORDER;

/// File name looked up under the user config directory.
pub const CONFIG_FILE_NAME: &str = "doclist_views.toml";

/// Root configuration persisted to `doclist_views.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Document list table preferences.
    pub table: TableConfig,
    #[serde(default)]
    /// Log output preferences.
    pub logging: LoggingConfig,
}

/// Document list table preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TableConfig {
    /// Column order used when neither the view nor the settings define one.
    #[serde(default = "default_column_order")]
    pub default_column_order: Vec<String>,
    /// Header label overrides keyed by column id.
    #[serde(default)]
    pub header_labels: BTreeMap<String, String>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            default_column_order: default_column_order(),
            header_labels: BTreeMap::new(),
        }
    }
}

/// Log verbosity, mapped onto `log::LevelFilter`.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
}

fn default_column_order() -> Vec<String> {
    DEFAULT_COLUMN_ORDER
        .iter()
        .map(|id| id.to_string())
        .collect()
}

/// Default config location, when the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Parses config text; an empty column order falls back to the default.
pub fn parse_config(text: &str) -> Result<Config, String> {
    let mut config = toml::from_str::<Config>(text)
        .map_err(|err| format!("failed to parse config as Config: {}", err))?;
    if config.table.default_column_order.is_empty() {
        config.table.default_column_order = default_column_order();
    }
    Ok(config)
}

/// Loads the config file at `path`, falling back to defaults when it is
/// missing or malformed.
pub fn load_config_file(path: &Path) -> Config {
    if !path.exists() {
        info!(
            "Config file not found. Using defaults. path={}",
            path.display()
        );
        return Config::default();
    }
    let config_content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            warn!(
                "Failed to read config file {}. Using defaults. error={}",
                path.display(),
                err
            );
            return Config::default();
        }
    };
    match parse_config(&config_content) {
        Ok(config) => config,
        Err(err) => {
            warn!(
                "Failed to parse config file {}. Using defaults. error={}",
                path.display(),
                err
            );
            Config::default()
        }
    }
}

/// Loads the explicit config path, else the default location, else defaults.
pub fn load_config(explicit_path: Option<&Path>) -> Config {
    match explicit_path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => load_config_file(&path),
        None => Config::default(),
    }
}
