//! Task and log index over a vault of markdown notes.
//!
//! Notes stay the source of truth. The crate reads them through a [`Vault`],
//! parses `## Tasks` and `## Log` sections with a [`NoteParser`], and keeps
//! the results in an [`IndexStore`] that the [`Domain`] queries.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use yapper_core::{
//!     Domain, DomainOptions, FileSystemVault, InMemoryIndexStore, ParserStrategy,
//!     VaultIndexManager,
//! };
//! use yapper_core::model::TaskFilter;
//!
//! let vault = Arc::new(FileSystemVault::new(Path::new("/home/me/notes")).unwrap());
//! let store = Arc::new(InMemoryIndexStore::new());
//! let manager = VaultIndexManager::new(vault, store, ParserStrategy::Regex.build());
//! let domain = Domain::new(manager, DomainOptions::default());
//!
//! domain.reindex_all().unwrap();
//! for task in domain.list_tasks(&TaskFilter::default()) {
//!     println!("{} {}", task.id, task.title);
//! }
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod domain;
pub mod index;
pub mod manager;
pub mod model;
pub mod parser;
pub mod vault;

pub use domain::{Domain, DomainError, DomainOptions, DomainResult};
pub use index::{InMemoryIndexStore, IndexStore};
pub use manager::{CancelToken, IndexStats, ReindexError, ReindexPolicy, VaultIndexManager};
pub use parser::{AstNoteParser, NoteParser, ParserStrategy, RegexNoteParser};
pub use vault::{FileSystemVault, Vault, VaultError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
