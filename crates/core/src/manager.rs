//! Index building orchestration: vault → parser → store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::IndexStore;
use crate::model::NoteId;
use crate::parser::NoteParser;
use crate::vault::{Vault, VaultError};

#[derive(Debug, Error)]
pub enum ReindexError {
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("failed to index {path}: {source}")]
    Note {
        path: String,
        #[source]
        source: VaultError,
    },

    #[error("reindex cancelled after {indexed} notes")]
    Cancelled { indexed: usize },
}

/// What a full reindex does when one note cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReindexPolicy {
    /// Log it, count it in [`IndexStats::notes_skipped`], keep going.
    #[default]
    Skip,
    /// Stop at the first failure.
    Abort,
}

/// Statistics from an indexing operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of note files discovered.
    pub files_found: usize,
    /// Number of notes parsed and stored.
    pub notes_indexed: usize,
    /// Number of notes skipped due to errors.
    pub notes_skipped: usize,
    /// Number of stale notes dropped because their file is gone.
    pub notes_removed: usize,
    pub tasks: usize,
    pub log_entries: usize,
    pub mentions: usize,
    /// Indexing duration in milliseconds.
    pub duration_ms: u64,
}

/// Cooperative cancellation flag for long reindexes. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Keeps a store in sync with a vault through a parser.
pub struct VaultIndexManager<V, S> {
    vault: Arc<V>,
    store: Arc<S>,
    parser: Box<dyn NoteParser>,
    policy: ReindexPolicy,
}

impl<V: Vault, S: IndexStore> VaultIndexManager<V, S> {
    pub fn new(vault: Arc<V>, store: Arc<S>, parser: Box<dyn NoteParser>) -> Self {
        Self { vault, store, parser, policy: ReindexPolicy::default() }
    }

    pub fn with_policy(mut self, policy: ReindexPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn vault(&self) -> &Arc<V> {
        &self.vault
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Re-parse every note in the vault.
    ///
    /// `cancel` is checked between notes. Notes indexed before cancellation
    /// stay indexed. Once a pass completes, notes whose files disappeared are
    /// dropped from the store.
    pub fn full_reindex(&self, cancel: &CancelToken) -> Result<IndexStats, ReindexError> {
        let start = Instant::now();
        let mut stats = IndexStats::default();

        let paths = self.vault.list_note_paths()?;
        stats.files_found = paths.len();
        tracing::debug!(
            "Reindexing {} notes under {} with the {} parser",
            paths.len(),
            self.vault.root().display(),
            self.parser.name()
        );

        for path in &paths {
            if cancel.is_cancelled() {
                tracing::info!("Reindex cancelled after {} notes", stats.notes_indexed);
                return Err(ReindexError::Cancelled { indexed: stats.notes_indexed });
            }

            match self.index_path(path) {
                Ok(counts) => {
                    stats.notes_indexed += 1;
                    stats.tasks += counts.tasks;
                    stats.log_entries += counts.log_entries;
                    stats.mentions += counts.mentions;
                }
                Err(e) => match self.policy {
                    ReindexPolicy::Skip => {
                        tracing::warn!("Failed to index {}: {}", path, e);
                        stats.notes_skipped += 1;
                    }
                    ReindexPolicy::Abort => {
                        return Err(ReindexError::Note { path: path.clone(), source: e });
                    }
                },
            }
        }

        for stale in self.store.note_ids() {
            if !paths.iter().any(|p| p == stale.as_str()) && self.store.remove_note(&stale) {
                tracing::debug!("Dropped {} from the index; file is gone", stale);
                stats.notes_removed += 1;
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Indexed {} notes ({} skipped, {} removed): {} tasks, {} log entries, {} mentions in {}ms",
            stats.notes_indexed,
            stats.notes_skipped,
            stats.notes_removed,
            stats.tasks,
            stats.log_entries,
            stats.mentions,
            stats.duration_ms
        );
        Ok(stats)
    }

    /// Load, parse and store a single note.
    pub fn reindex_note(&self, path: &str) -> Result<NoteId, ReindexError> {
        let note = self.vault.load_note(path)?;
        let id = note.id.clone();
        self.store_note(note);
        Ok(id)
    }

    fn index_path(&self, path: &str) -> Result<EntityCounts, VaultError> {
        let note = self.vault.load_note(path)?;
        Ok(self.store_note(note))
    }

    fn store_note(&self, note: crate::model::Note) -> EntityCounts {
        let parsed = self.parser.parse(note);
        let counts = EntityCounts {
            tasks: parsed.tasks.len(),
            log_entries: parsed.log_entries.len(),
            mentions: parsed.mentions.len(),
        };
        tracing::debug!(
            "Indexed {}: {} tasks, {} log entries, {} mentions",
            parsed.note.id,
            counts.tasks,
            counts.log_entries,
            counts.mentions
        );
        self.store.upsert_parsed_note(parsed);
        counts
    }
}

struct EntityCounts {
    tasks: usize,
    log_entries: usize,
    mentions: usize,
}
