mod dispatch;
mod logging;
mod rpc;
mod server;
mod settings;

use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use yapper_core::{Domain, FileSystemVault, InMemoryIndexStore, Vault, VaultIndexManager};

use crate::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "yapperd", version, about = "Task and log index daemon for a markdown vault")]
pub struct Cli {
    /// Path to config file (default: ~/.config/yapper/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Profile to use from the config
    #[arg(long)]
    pub profile: Option<String>,

    /// Vault root, overriding the profile
    #[arg(long, env = "YAPPER_VAULT")]
    pub vault: Option<PathBuf>,

    /// error, warn, info, debug or trace
    #[arg(long, env = "YAPPER_LOG")]
    pub log_level: Option<String>,

    /// Listen on this Unix socket instead of stdin/stdout
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Skip the full reindex at startup
    #[arg(long)]
    pub no_initial_reindex: bool,
}

fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("yapperd: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = logging::init(&settings.logging) {
        eprintln!("yapperd: failed to open log file: {e}");
        process::exit(1);
    }

    let vault = match FileSystemVault::with_exclusions(
        &settings.vault_root,
        settings.excluded_folders.clone(),
    ) {
        Ok(vault) => vault,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    info!(
        "Starting yapperd {} (vault: {}, parser: {:?})",
        yapper_core::version(),
        vault.root().display(),
        settings.parser
    );

    let manager = VaultIndexManager::new(
        Arc::new(vault),
        Arc::new(InMemoryIndexStore::new()),
        settings.parser.build(),
    )
    .with_policy(settings.on_error);
    let domain = Domain::new(manager, settings.domain.clone());

    if settings.initial_reindex {
        match domain.reindex_all() {
            Ok(stats) => info!(
                "Initial reindex: {} notes, {} tasks in {} ms",
                stats.notes_indexed, stats.tasks, stats.duration_ms
            ),
            Err(e) => error!("Initial reindex failed: {}", e),
        }
    }

    let result = match settings.socket {
        Some(ref path) => serve_socket(&domain, path),
        None => {
            let stdin = io::stdin();
            server::serve(&domain, stdin.lock(), io::stdout().lock())
        }
    };

    match result {
        Ok(()) => info!("Input closed, shutting down"),
        Err(e) => {
            error!("Server stopped: {}", e);
            process::exit(1);
        }
    }
}

#[cfg(unix)]
fn serve_socket(
    domain: &Domain<FileSystemVault, InMemoryIndexStore>,
    path: &std::path::Path,
) -> io::Result<()> {
    let listener = server::socket::bind(path)?;
    server::socket::run(domain, &listener);
    Ok(())
}

#[cfg(not(unix))]
fn serve_socket(
    _domain: &Domain<FileSystemVault, InMemoryIndexStore>,
    _path: &std::path::Path,
) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "Unix sockets are not available on this platform"))
}
