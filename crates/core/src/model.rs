//! Entities derived from a vault: notes, tasks, log entries and mentions.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Vault-relative, slash-separated note path.
    NoteId
);
string_id!(
    /// Explicit `T-…` identifier or the `note#line` fallback.
    TaskId
);
string_id!(
    /// `note:line` of the log bullet.
    LogEntryId
);

/// Where a note's date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DateSource {
    /// Parsed from the file name (daily notes).
    Filename,
    /// Taken from the file modification time.
    #[default]
    Modified,
}

/// A markdown file in the vault. The content is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Absolute path on disk.
    pub path: PathBuf,
    pub title: String,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub date_source: DateSource,
    #[serde(default)]
    pub modified: Option<DateTime<Local>>,
    pub content: String,
}

impl Note {
    /// Metadata view without the content.
    pub fn meta(&self) -> NoteMeta {
        NoteMeta {
            id: self.id.clone(),
            path: self.path.clone(),
            title: self.title.clone(),
            date: self.date,
            date_source: self.date_source,
        }
    }

    /// Whether this note is the daily note for `date`.
    pub fn is_daily_for(&self, date: NaiveDate) -> bool {
        self.date_source == DateSource::Filename && self.date == Some(date)
    }

    /// Timestamp that parsed entities of this note are anchored to.
    pub fn anchor(&self) -> NaiveDateTime {
        if let Some(date) = self.date {
            return date.and_time(chrono::NaiveTime::MIN);
        }
        match self.modified {
            Some(modified) => modified.naive_local(),
            None => DateTime::<chrono::Utc>::UNIX_EPOCH.naive_utc(),
        }
    }
}

/// Note metadata returned by range queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteMeta {
    pub id: NoteId,
    pub path: PathBuf,
    pub title: String,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub date_source: DateSource,
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    #[serde(alias = "todo")]
    Open,
    #[serde(alias = "in-progress")]
    InProgress,
    Blocked,
    Done,
}

impl TaskStatus {
    /// Map a checkbox mark to a status. Unknown marks are open.
    pub fn from_mark(mark: char) -> Self {
        match mark {
            'x' | 'X' => Self::Done,
            '~' | '/' => Self::InProgress,
            '!' => Self::Blocked,
            _ => Self::Open,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "open" | "todo" => Some(Self::Open),
            "inprogress" => Some(Self::InProgress),
            "blocked" => Some(Self::Blocked),
            "done" | "completed" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Done => "done",
        }
    }
}

/// A checkbox item from a `## Tasks` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub note_id: NoteId,
    pub title: String,
    /// Cleaned continuation lines, if any.
    pub description: Option<String>,
    pub status: TaskStatus,
    pub tags: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    /// Set iff `status` is `Done`.
    pub closed_at: Option<NaiveDateTime>,
    /// 1-based line of the checkbox.
    pub line: usize,
}

/// A bullet from a `## Log` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogEntryId,
    pub note_id: NoteId,
    pub line: usize,
    pub timestamp: Option<NaiveDateTime>,
    pub content: String,
    pub tags: Vec<String>,
    pub task_ids: Vec<TaskId>,
}

/// Backlink from note text to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMention {
    pub task_id: TaskId,
    pub note_id: NoteId,
    pub log_entry_id: Option<LogEntryId>,
    pub line: usize,
    pub excerpt: String,
    pub tags: Vec<String>,
}

/// Everything a parser extracted from one note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedNote {
    pub note: Note,
    pub tasks: Vec<Task>,
    pub log_entries: Vec<LogEntry>,
    pub mentions: Vec<TaskMention>,
}

/// Conjunctive task filter. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub statuses: Vec<TaskStatus>,
    /// Tasks must carry every one of these tags.
    pub tags: Vec<String>,
    /// Case-insensitive substring of title or description.
    pub text_search: Option<String>,
    /// `updated_at` or `closed_at` on or after this date.
    pub touched_since: Option<NaiveDate>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }

        if !self
            .tags
            .iter()
            .filter_map(|t| normalize_tag(t))
            .all(|tag| task.tags.iter().any(|t| *t == tag))
        {
            return false;
        }

        if let Some(needle) = self.text_search.as_deref().map(str::trim)
            && !needle.is_empty()
        {
            let needle = needle.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_description = task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }

        if let Some(cutoff) = self.touched_since {
            let touched = task.updated_at.date() >= cutoff
                || task.closed_at.is_some_and(|closed| closed.date() >= cutoff);
            if !touched {
                return false;
            }
        }

        true
    }
}

/// Inclusive bounds on note dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl NoteFilter {
    pub fn matches(&self, date: Option<NaiveDate>) -> bool {
        if self.start.is_none() && self.end.is_none() {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }
}

/// Closed date interval, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl From<DateRange> for NoteFilter {
    fn from(range: DateRange) -> Self {
        Self { start: Some(range.start), end: Some(range.end) }
    }
}

/// Everything filed under one tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagItems {
    pub tag: String,
    pub tasks: Vec<Task>,
    pub log_entries: Vec<LogEntry>,
    pub mentions: Vec<TaskMention>,
}

/// A task together with its backlinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetail {
    pub task: Task,
    pub mentions: Vec<TaskMention>,
    pub log_entries: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Activity across a date range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub new_tasks: Vec<Task>,
    pub completed_tasks: Vec<Task>,
    pub notes: Vec<NoteMeta>,
    pub top_tags: Vec<TagCount>,
}

/// Trim, strip a leading `#`, and lowercase. Empty tags normalize to `None`.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim();
    let tag = tag.strip_prefix('#').unwrap_or(tag).trim();
    if tag.is_empty() { None } else { Some(tag.to_lowercase()) }
}
