//! In-memory [`IndexStore`] guarded by a reader/writer lock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::IndexStore;
use crate::model::{
    LogEntry, LogEntryId, Note, NoteFilter, NoteId, NoteMeta, ParsedNote, TagItems, Task,
    TaskFilter, TaskId, TaskMention, normalize_tag,
};

/// Mentions are unique per note, line and task.
type MentionKey = (NoteId, usize, TaskId);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum TagMember {
    Task(TaskId),
    Log(LogEntryId),
    Mention(MentionKey),
}

/// What one note contributed to the index, so removal can undo exactly that.
#[derive(Debug, Default)]
struct NoteSnapshot {
    task_ids: BTreeSet<TaskId>,
    log_ids: Vec<LogEntryId>,
    mention_keys: Vec<MentionKey>,
    tag_members: BTreeSet<(String, TagMember)>,
}

#[derive(Debug, Default)]
struct TagBucket {
    tasks: BTreeSet<TaskId>,
    log_entries: BTreeSet<LogEntryId>,
    mentions: BTreeSet<MentionKey>,
}

impl TagBucket {
    fn insert(&mut self, member: TagMember) {
        match member {
            TagMember::Task(id) => {
                self.tasks.insert(id);
            }
            TagMember::Log(id) => {
                self.log_entries.insert(id);
            }
            TagMember::Mention(key) => {
                self.mentions.insert(key);
            }
        }
    }

    fn remove(&mut self, member: &TagMember) {
        match member {
            TagMember::Task(id) => {
                self.tasks.remove(id);
            }
            TagMember::Log(id) => {
                self.log_entries.remove(id);
            }
            TagMember::Mention(key) => {
                self.mentions.remove(key);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.log_entries.is_empty() && self.mentions.is_empty()
    }
}

#[derive(Debug, Default)]
struct IndexState {
    notes: BTreeMap<NoteId, Note>,
    tasks: BTreeMap<TaskId, Task>,
    log_entries: BTreeMap<LogEntryId, LogEntry>,
    mentions: BTreeMap<MentionKey, TaskMention>,
    tags: BTreeMap<String, TagBucket>,
    logs_by_task: BTreeMap<TaskId, BTreeSet<LogEntryId>>,
    mentions_by_task: BTreeMap<TaskId, BTreeSet<MentionKey>>,
    snapshots: BTreeMap<NoteId, NoteSnapshot>,
}

impl IndexState {
    fn tag(&mut self, tag: &str, member: TagMember, snapshot: &mut NoteSnapshot) {
        self.tags.entry(tag.to_string()).or_default().insert(member.clone());
        snapshot.tag_members.insert((tag.to_string(), member));
    }

    fn untag(&mut self, tag: &str, member: &TagMember) {
        if let Some(bucket) = self.tags.get_mut(tag) {
            bucket.remove(member);
            if bucket.is_empty() {
                self.tags.remove(tag);
            }
        }
    }

    fn upsert(&mut self, parsed: ParsedNote) {
        let ParsedNote { note, tasks, log_entries, mentions } = parsed;
        let note_id = note.id.clone();

        self.remove(&note_id);
        let mut snapshot = NoteSnapshot::default();

        // ─────────────────────────────────────────────────────────────────────
        // Tasks
        // ─────────────────────────────────────────────────────────────────────

        for task in tasks {
            if let Some(previous) = self.tasks.get(&task.id)
                && previous.note_id != note_id
            {
                tracing::warn!(
                    "Task {} defined in both {} and {}; keeping {}",
                    task.id,
                    previous.note_id,
                    note_id,
                    note_id
                );
                self.evict_task(&task.id);
            } else if snapshot.task_ids.contains(&task.id) {
                let member = TagMember::Task(task.id.clone());
                snapshot.tag_members.retain(|(_, m)| *m != member);
                self.evict_task(&task.id);
            }

            for tag in &task.tags {
                self.tag(tag, TagMember::Task(task.id.clone()), &mut snapshot);
            }
            snapshot.task_ids.insert(task.id.clone());
            self.tasks.insert(task.id.clone(), task);
        }

        // ─────────────────────────────────────────────────────────────────────
        // Log entries
        // ─────────────────────────────────────────────────────────────────────

        for entry in log_entries {
            for tag in &entry.tags {
                self.tag(tag, TagMember::Log(entry.id.clone()), &mut snapshot);
            }
            for task_id in &entry.task_ids {
                self.logs_by_task.entry(task_id.clone()).or_default().insert(entry.id.clone());
            }
            snapshot.log_ids.push(entry.id.clone());
            self.log_entries.insert(entry.id.clone(), entry);
        }

        // ─────────────────────────────────────────────────────────────────────
        // Mentions
        // ─────────────────────────────────────────────────────────────────────

        for mention in mentions {
            let key: MentionKey = (note_id.clone(), mention.line, mention.task_id.clone());
            for tag in &mention.tags {
                self.tag(tag, TagMember::Mention(key.clone()), &mut snapshot);
            }
            self.mentions_by_task.entry(mention.task_id.clone()).or_default().insert(key.clone());
            snapshot.mention_keys.push(key.clone());
            self.mentions.insert(key, mention);
        }

        self.snapshots.insert(note_id.clone(), snapshot);
        self.notes.insert(note_id, note);
    }

    /// Drop the current version of a task and forget it in its owner's
    /// snapshot.
    fn evict_task(&mut self, id: &TaskId) {
        let Some(task) = self.tasks.remove(id) else {
            return;
        };
        let member = TagMember::Task(id.clone());
        for tag in &task.tags {
            self.untag(tag, &member);
        }
        if let Some(owner) = self.snapshots.get_mut(&task.note_id) {
            owner.task_ids.remove(id);
            owner.tag_members.retain(|(_, m)| *m != member);
        }
    }

    fn remove(&mut self, note_id: &NoteId) -> bool {
        let had_note = self.notes.remove(note_id).is_some();
        let Some(snapshot) = self.snapshots.remove(note_id) else {
            return had_note;
        };

        for (tag, member) in &snapshot.tag_members {
            self.untag(tag, member);
        }

        for id in &snapshot.task_ids {
            if self.tasks.get(id).is_some_and(|t| t.note_id == *note_id) {
                self.tasks.remove(id);
            }
        }

        for id in &snapshot.log_ids {
            let Some(entry) = self.log_entries.remove(id) else {
                continue;
            };
            for task_id in &entry.task_ids {
                if let Some(ids) = self.logs_by_task.get_mut(task_id) {
                    ids.remove(id);
                    if ids.is_empty() {
                        self.logs_by_task.remove(task_id);
                    }
                }
            }
        }

        for key in &snapshot.mention_keys {
            self.mentions.remove(key);
            let task_id = &key.2;
            if let Some(keys) = self.mentions_by_task.get_mut(task_id) {
                keys.remove(key);
                if keys.is_empty() {
                    self.mentions_by_task.remove(task_id);
                }
            }
        }

        true
    }

    fn sorted_log_entries<'a>(&self, ids: impl Iterator<Item = &'a LogEntryId>) -> Vec<LogEntry> {
        let mut entries: Vec<LogEntry> =
            ids.filter_map(|id| self.log_entries.get(id)).cloned().collect();
        entries.sort_by(|a, b| (&a.note_id, a.line).cmp(&(&b.note_id, b.line)));
        entries
    }

    fn mentions_for<'a>(&self, keys: impl Iterator<Item = &'a MentionKey>) -> Vec<TaskMention> {
        keys.filter_map(|key| self.mentions.get(key)).cloned().collect()
    }
}

/// Default [`IndexStore`]: ordered maps behind a single [`RwLock`].
///
/// Queries take the read lock, upserts and removals the write lock. Each
/// mutation finishes its swap before releasing, so a poisoned lock still
/// guards consistent data and is recovered rather than propagated.
#[derive(Debug, Default)]
pub struct InMemoryIndexStore {
    state: RwLock<IndexState>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IndexStore for InMemoryIndexStore {
    fn upsert_parsed_note(&self, parsed: ParsedNote) {
        self.write().upsert(parsed);
    }

    fn remove_note(&self, id: &NoteId) -> bool {
        self.write().remove(id)
    }

    fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.read().tasks.get(id).cloned()
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        self.read().tasks.values().filter(|task| filter.matches(task)).cloned().collect()
    }

    fn get_log_entries_for_task(&self, id: &TaskId) -> Vec<LogEntry> {
        let state = self.read();
        match state.logs_by_task.get(id) {
            Some(ids) => state.sorted_log_entries(ids.iter()),
            None => Vec::new(),
        }
    }

    fn get_mentions_for_task(&self, id: &TaskId) -> Vec<TaskMention> {
        let state = self.read();
        match state.mentions_by_task.get(id) {
            Some(keys) => state.mentions_for(keys.iter()),
            None => Vec::new(),
        }
    }

    fn list_notes(&self, filter: &NoteFilter) -> Vec<NoteMeta> {
        let mut notes: Vec<NoteMeta> = self
            .read()
            .notes
            .values()
            .filter(|note| filter.matches(note.date))
            .map(Note::meta)
            .collect();
        notes.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        notes
    }

    fn get_note(&self, id: &NoteId) -> Option<Note> {
        self.read().notes.get(id).cloned()
    }

    fn note_ids(&self) -> Vec<NoteId> {
        self.read().notes.keys().cloned().collect()
    }

    fn list_tags(&self) -> Vec<String> {
        self.read().tags.keys().cloned().collect()
    }

    fn items_for_tag(&self, tag: &str) -> Option<TagItems> {
        let tag = normalize_tag(tag)?;
        let state = self.read();
        let bucket = state.tags.get(&tag)?;

        Some(TagItems {
            tasks: bucket.tasks.iter().filter_map(|id| state.tasks.get(id)).cloned().collect(),
            log_entries: state.sorted_log_entries(bucket.log_entries.iter()),
            mentions: state.mentions_for(bucket.mentions.iter()),
            tag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateSource, TaskStatus};
    use crate::parser::{NoteParser, RegexNoteParser};
    use chrono::NaiveDate;
    use std::path::PathBuf;

    const SCENARIO: &str = "## Tasks\n- [ ] Draft summary #work [T-1234]\n- [x] Finish report #work\n## Log\n- 2024-05-01 Completed milestone #wins [T-1234]";

    fn parsed(id: &str, content: &str) -> ParsedNote {
        let date = crate::vault::extract_date(std::path::Path::new(id));
        RegexNoteParser.parse(Note {
            id: NoteId::new(id),
            path: PathBuf::from(id),
            title: id.to_string(),
            date,
            date_source: if date.is_some() { DateSource::Filename } else { DateSource::Modified },
            modified: None,
            content: content.to_string(),
        })
    }

    fn scenario_store() -> InMemoryIndexStore {
        let store = InMemoryIndexStore::new();
        store.upsert_parsed_note(parsed("2024-05-02.md", SCENARIO));
        store
    }

    #[test]
    fn test_scenario_queries() {
        let store = scenario_store();

        assert_eq!(store.list_tasks(&TaskFilter::default()).len(), 2);

        let task = store.get_task(&TaskId::new("T-1234")).unwrap();
        assert_eq!(task.status, TaskStatus::Open);
        assert_eq!(task.tags, vec!["work"]);

        let mentions = store.get_mentions_for_task(&TaskId::new("T-1234"));
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].line, 5);
        assert_eq!(
            mentions[0].log_entry_id.as_ref().map(LogEntryId::as_str),
            Some("2024-05-02.md:5")
        );

        let work = store.items_for_tag("work").unwrap();
        assert_eq!(work.tasks.len(), 2);
        assert!(work.log_entries.is_empty());

        let wins = store.items_for_tag("#WINS").unwrap();
        assert_eq!(wins.log_entries.len(), 1);
        assert_eq!(wins.mentions.len(), 1);

        assert_eq!(store.list_tags(), vec!["wins", "work"]);
    }

    #[test]
    fn test_remove_note_prunes_tags() {
        let store = scenario_store();
        assert!(store.remove_note(&NoteId::new("2024-05-02.md")));

        assert!(store.items_for_tag("work").is_none());
        assert!(store.list_tags().is_empty());
        assert!(store.list_tasks(&TaskFilter::default()).is_empty());
        assert!(store.get_mentions_for_task(&TaskId::new("T-1234")).is_empty());
        assert!(store.get_log_entries_for_task(&TaskId::new("T-1234")).is_empty());
        assert!(!store.remove_note(&NoteId::new("2024-05-02.md")));
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = scenario_store();
        let before = (store.list_tasks(&TaskFilter::default()), store.list_tags());
        store.upsert_parsed_note(parsed("2024-05-02.md", SCENARIO));
        assert_eq!((store.list_tasks(&TaskFilter::default()), store.list_tags()), before);
        assert_eq!(store.get_mentions_for_task(&TaskId::new("T-1234")).len(), 1);
    }

    #[test]
    fn test_upsert_replaces_previous_contribution() {
        let store = scenario_store();
        store.upsert_parsed_note(parsed("2024-05-02.md", "## Tasks\n- [x] Something else #home\n"));

        let tasks = store.list_tasks(&TaskFilter::default());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Something else");
        assert_eq!(store.list_tags(), vec!["home"]);
        assert!(store.get_task(&TaskId::new("T-1234")).is_none());
    }

    #[test]
    fn test_duplicate_task_id_last_write_wins() {
        let store = InMemoryIndexStore::new();
        store.upsert_parsed_note(parsed("a.md", "## Tasks\n- [ ] First [T-1] #alpha\n"));
        store.upsert_parsed_note(parsed("b.md", "## Tasks\n- [x] Second [T-1] #beta\n"));

        let task = store.get_task(&TaskId::new("T-1")).unwrap();
        assert_eq!(task.note_id.as_str(), "b.md");
        assert_eq!(store.list_tags(), vec!["beta"]);

        // a.md no longer owns T-1, so removing it keeps b.md's version.
        store.remove_note(&NoteId::new("a.md"));
        assert_eq!(store.get_task(&TaskId::new("T-1")).unwrap().title, "Second");
        assert_eq!(store.list_tags(), vec!["beta"]);
    }

    #[test]
    fn test_backlinks_ordered_by_note_then_line() {
        let store = InMemoryIndexStore::new();
        let mut log = String::from("## Log\n");
        for i in 0..10 {
            log.push_str(&format!("- entry {i} [T-1]\n"));
        }
        store.upsert_parsed_note(parsed("b.md", &log));
        store.upsert_parsed_note(parsed("a.md", "## Log\n- early [T-1]\n"));

        let lines: Vec<_> = store
            .get_log_entries_for_task(&TaskId::new("T-1"))
            .iter()
            .map(|e| (e.note_id.to_string(), e.line))
            .collect();
        assert_eq!(lines[0], ("a.md".to_string(), 2));
        assert_eq!(lines[1], ("b.md".to_string(), 2));
        assert_eq!(lines[10], ("b.md".to_string(), 11));

        let mention_lines: Vec<_> = store
            .get_mentions_for_task(&TaskId::new("T-1"))
            .iter()
            .map(|m| m.line)
            .collect();
        assert_eq!(mention_lines.len(), 11);
        assert_eq!(&mention_lines[..3], &[2, 2, 3]);
    }

    #[test]
    fn test_list_notes_newest_first_within_bounds() {
        let store = InMemoryIndexStore::new();
        for id in ["2024-05-01.md", "2024-05-03.md", "2024-05-02.md", "ideas.md"] {
            store.upsert_parsed_note(parsed(id, "# x"));
        }

        let all: Vec<_> =
            store.list_notes(&NoteFilter::default()).into_iter().map(|n| n.id.0).collect();
        assert_eq!(all, vec!["2024-05-03.md", "2024-05-02.md", "2024-05-01.md", "ideas.md"]);

        let bounded = NoteFilter {
            start: NaiveDate::from_ymd_opt(2024, 5, 2),
            end: NaiveDate::from_ymd_opt(2024, 5, 3),
        };
        let ids: Vec<_> = store.list_notes(&bounded).into_iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec!["2024-05-03.md", "2024-05-02.md"]);
    }

    #[test]
    fn test_unknown_or_empty_tag() {
        let store = scenario_store();
        assert!(store.items_for_tag("nope").is_none());
        assert!(store.items_for_tag("#").is_none());
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let store = std::sync::Arc::new(scenario_store());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        if i == 0 {
                            store.upsert_parsed_note(parsed("2024-05-02.md", SCENARIO));
                        } else {
                            assert_eq!(store.list_tasks(&TaskFilter::default()).len(), 2);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
