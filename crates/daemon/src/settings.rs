//! Layering of CLI flags, environment and the config file.

use std::path::PathBuf;

use thiserror::Error;
use yapper_core::config::{ConfigError, ConfigLoader, LoggingConfig, ResolvedConfig};
use yapper_core::{DomainOptions, ParserStrategy, ReindexPolicy};

use crate::Cli;
use crate::logging::parse_level;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid log level '{0}' (expected error, warn, info, debug or trace)")]
    BadLogLevel(String),
}

/// Everything the daemon needs at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub vault_root: PathBuf,
    pub excluded_folders: Vec<PathBuf>,
    pub logging: LoggingConfig,
    pub on_error: ReindexPolicy,
    pub parser: ParserStrategy,
    pub domain: DomainOptions,
    pub socket: Option<PathBuf>,
    pub initial_reindex: bool,
}

impl Settings {
    pub fn load(cli: &Cli) -> Result<Self, SettingsError> {
        let resolved = ConfigLoader::load(cli.config.as_deref(), cli.profile.as_deref())?;
        Self::merge(cli, resolved)
    }

    /// Apply flags (and their env fallbacks, which clap already folded in)
    /// over a resolved config. Without any vault root the working directory
    /// is used.
    pub fn merge(cli: &Cli, resolved: ResolvedConfig) -> Result<Self, SettingsError> {
        let mut logging = resolved.logging;
        if let Some(ref level) = cli.log_level {
            if parse_level(level).is_none() {
                return Err(SettingsError::BadLogLevel(level.clone()));
            }
            logging.level = level.clone();
        }

        let vault_root = cli
            .vault
            .clone()
            .or(resolved.vault_root)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            vault_root,
            excluded_folders: resolved.excluded_folders,
            logging,
            on_error: resolved.on_error,
            parser: resolved.parser,
            domain: DomainOptions { daily_dir: resolved.daily_dir, top_tags: resolved.top_tags },
            socket: cli.socket.clone(),
            initial_reindex: !cli.no_initial_reindex,
        })
    }
}
