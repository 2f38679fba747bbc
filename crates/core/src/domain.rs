//! Query-facing API composed from the vault, parser and index.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::index::IndexStore;
use crate::manager::{CancelToken, IndexStats, ReindexError, VaultIndexManager};
use crate::model::{
    DateRange, Note, NoteFilter, NoteId, NoteMeta, TagCount, TagItems, Task, TaskDetail,
    TaskFilter, TaskId, WeeklySummary,
};
use crate::vault::{Vault, VaultError};

pub const DEFAULT_TOP_TAGS: usize = 10;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("note not found: {0}")]
    NoteNotFound(NoteId),

    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Reindex(#[from] ReindexError),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Settings for daily notes and summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainOptions {
    /// Vault-relative folder for new daily notes. `None` means the root.
    pub daily_dir: Option<String>,
    /// How many tags a weekly summary reports.
    pub top_tags: usize,
}

impl Default for DomainOptions {
    fn default() -> Self {
        Self { daily_dir: None, top_tags: DEFAULT_TOP_TAGS }
    }
}

/// Build a [`DateRange`], rejecting `start > end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> DomainResult<DateRange> {
    DateRange::new(start, end).ok_or(DomainError::InvalidRange { start, end })
}

/// Markdown written for a freshly created daily note.
pub fn daily_template(date: NaiveDate) -> String {
    format!("# {}\n\n## Tasks\n\n## Log\n", date.format("%Y-%m-%d"))
}

pub struct Domain<V, S> {
    manager: VaultIndexManager<V, S>,
    options: DomainOptions,
}

impl<V: Vault, S: IndexStore> Domain<V, S> {
    pub fn new(manager: VaultIndexManager<V, S>, options: DomainOptions) -> Self {
        Self { manager, options }
    }

    pub fn manager(&self) -> &VaultIndexManager<V, S> {
        &self.manager
    }

    pub fn reindex_all(&self) -> DomainResult<IndexStats> {
        self.reindex_all_with(&CancelToken::new())
    }

    pub fn reindex_all_with(&self, cancel: &CancelToken) -> DomainResult<IndexStats> {
        Ok(self.manager.full_reindex(cancel)?)
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        self.store().list_tasks(filter)
    }

    pub fn task_detail(&self, id: &TaskId) -> Option<TaskDetail> {
        let task = self.store().get_task(id)?;
        Some(TaskDetail {
            mentions: self.store().get_mentions_for_task(id),
            log_entries: self.store().get_log_entries_for_task(id),
            task,
        })
    }

    pub fn items_for_tag(&self, tag: &str) -> Option<TagItems> {
        self.store().items_for_tag(tag)
    }

    pub fn list_tags(&self) -> Vec<String> {
        self.store().list_tags()
    }

    pub fn notes_in_range(&self, range: DateRange) -> Vec<NoteMeta> {
        self.store().list_notes(&NoteFilter::from(range))
    }

    pub fn read_note(&self, id: &NoteId) -> DomainResult<Note> {
        self.store().get_note(id).ok_or_else(|| DomainError::NoteNotFound(id.clone()))
    }

    /// Persist `content` to the note and re-index it. Unknown ids create a
    /// new note at that vault-relative path.
    pub fn write_note(&self, id: &NoteId, content: &str) -> DomainResult<Note> {
        let path = match self.store().get_note(id) {
            Some(existing) => existing.id.0,
            None => {
                tracing::info!("Creating note {}", id);
                id.0.clone()
            }
        };

        self.manager.vault().write_note(&path, content)?;
        let id = self.manager.reindex_note(&path)?;
        self.read_note(&id)
    }

    /// The daily note for `date`, created from the template if none exists.
    ///
    /// Only notes whose date comes from their file name count; with several,
    /// the smallest id wins.
    pub fn open_daily(&self, date: NaiveDate) -> DomainResult<Note> {
        let existing = self
            .store()
            .list_notes(&NoteFilter::from(DateRange::single(date)))
            .into_iter()
            .filter(|meta| meta.date_source == crate::model::DateSource::Filename)
            .map(|meta| meta.id)
            .min();

        if let Some(id) = existing {
            return self.read_note(&id);
        }

        let file_name = format!("{}.md", date.format("%Y-%m-%d"));
        let path = match self.options.daily_dir.as_deref().map(|d| d.trim_matches('/')) {
            Some(dir) if !dir.is_empty() => format!("{dir}/{file_name}"),
            _ => file_name,
        };

        if self.manager.vault().create_note(&path, &daily_template(date))? {
            tracing::info!("Created daily note {}", path);
        }
        let id = self.manager.reindex_note(&path)?;
        self.read_note(&id)
    }

    pub fn weekly_summary(&self, range: DateRange) -> WeeklySummary {
        let tasks = self.store().list_tasks(&TaskFilter::default());

        let new_tasks =
            tasks.iter().filter(|t| range.contains(t.created_at.date())).cloned().collect();
        let completed_tasks = tasks
            .iter()
            .filter(|t| t.closed_at.is_some_and(|closed| range.contains(closed.date())))
            .cloned()
            .collect();

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for tag in tasks.iter().flat_map(|t| &t.tags) {
            *counts.entry(tag.as_str()).or_default() += 1;
        }
        let mut top_tags: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount { tag: tag.to_string(), count })
            .collect();
        top_tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        top_tags.truncate(self.options.top_tags);

        WeeklySummary { new_tasks, completed_tasks, notes: self.notes_in_range(range), top_tags }
    }

    fn store(&self) -> &S {
        self.manager.store()
    }
}
