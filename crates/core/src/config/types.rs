use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::DEFAULT_TOP_TAGS;
use crate::manager::ReindexPolicy;
use crate::parser::ParserStrategy;

#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub version: u32,
    pub profile: Option<String>,
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    pub vault_root: String,
    /// Folder for new daily notes, relative to `vault_root`.
    #[serde(default)]
    pub daily_dir: Option<String>,
    /// Folders skipped while indexing (relative to vault_root).
    #[serde(default)]
    pub excluded_folders: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file_level: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file_level: None, file: None }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    #[serde(default)]
    pub on_error: ReindexPolicy,
}

#[derive(Debug, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    #[serde(default)]
    pub strategy: ParserStrategy,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SummaryConfig {
    #[serde(default = "default_top_tags")]
    pub top_tags: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self { top_tags: default_top_tags() }
    }
}

fn default_top_tags() -> usize {
    DEFAULT_TOP_TAGS
}

/// Configuration after profile selection and path expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// `None` when no config file was found.
    pub active_profile: Option<String>,
    /// `None` when no config file was found; the caller must supply one.
    pub vault_root: Option<PathBuf>,
    pub daily_dir: Option<String>,
    pub excluded_folders: Vec<PathBuf>,
    pub logging: LoggingConfig,
    pub on_error: ReindexPolicy,
    pub parser: ParserStrategy,
    pub top_tags: usize,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            active_profile: None,
            vault_root: None,
            daily_dir: None,
            excluded_folders: Vec::new(),
            logging: LoggingConfig::default(),
            on_error: ReindexPolicy::default(),
            parser: ParserStrategy::default(),
            top_tags: DEFAULT_TOP_TAGS,
        }
    }
}
