//! Derived index over parsed notes.
//!
//! The index is a cache: every entry can be rebuilt from the vault. Writers
//! replace a note's whole contribution at once, so readers never see a note
//! half indexed.
//!
//! # Example
//!
//! ```
//! use yapper_core::index::{InMemoryIndexStore, IndexStore};
//! use yapper_core::model::TaskFilter;
//!
//! let store = InMemoryIndexStore::new();
//! assert!(store.list_tasks(&TaskFilter::default()).is_empty());
//! assert!(store.list_tags().is_empty());
//! ```

mod store;

pub use store::InMemoryIndexStore;

use crate::model::{
    LogEntry, Note, NoteFilter, NoteId, NoteMeta, ParsedNote, TagItems, Task, TaskFilter,
    TaskId, TaskMention,
};

/// Query and mutation surface of the index. Safe to share across threads.
pub trait IndexStore: Send + Sync {
    /// Replace everything previously indexed for `parsed.note` with `parsed`.
    fn upsert_parsed_note(&self, parsed: ParsedNote);

    /// Drop every entity the note contributed. Returns whether it was indexed.
    fn remove_note(&self, id: &NoteId) -> bool;

    fn get_task(&self, id: &TaskId) -> Option<Task>;

    /// Tasks matching `filter`, sorted by id.
    fn list_tasks(&self, filter: &TaskFilter) -> Vec<Task>;

    /// Log entries referencing the task, ordered by note then line.
    fn get_log_entries_for_task(&self, id: &TaskId) -> Vec<LogEntry>;

    /// Mentions of the task, ordered by note then line.
    fn get_mentions_for_task(&self, id: &TaskId) -> Vec<TaskMention>;

    /// Notes within the filter's date bounds, newest first.
    fn list_notes(&self, filter: &NoteFilter) -> Vec<NoteMeta>;

    fn get_note(&self, id: &NoteId) -> Option<Note>;

    fn note_ids(&self) -> Vec<NoteId>;

    fn list_tags(&self) -> Vec<String>;

    /// Everything filed under `tag`, or `None` when nothing carries it.
    fn items_for_tag(&self, tag: &str) -> Option<TagItems>;
}
