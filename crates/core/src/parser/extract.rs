//! Token extraction shared by every parser strategy.
//!
//! Strategies only decide *where* entries are (which lines, which section).
//! Everything else happens here: checkbox marks, ids, tags, timestamps, and
//! the final [`ParsedNote`] assembly.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::model::{
    LogEntry, LogEntryId, Note, ParsedNote, Task, TaskId, TaskMention, TaskStatus,
    normalize_tag,
};

const MAX_EXCERPT_CHARS: usize = 120;

static CHECKBOX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*]\s+\[(.)\]\s*(.*)$").unwrap());

static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[-*]\s+(.*)$").unwrap());

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*#{1,6}(\s|$)").unwrap());

static TASK_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(T-[0-9A-Za-z_-]+)\]").unwrap());

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|[\s(])#([\w/-]+)").unwrap());

/// Parentheses holding nothing but tags and task ids.
static TAG_ONLY_PARENS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*(?:(?:#[\w/-]+|\[T-[0-9A-Za-z_-]+\])[\s,]*)+\)").unwrap()
});

static DATE_STAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})(?:[ T](\d{1,2}):(\d{2})(?::(\d{2}))?)?(?:\s+-\s+|\s+|$)")
        .unwrap()
});

static TIME_STAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\s?([aApP][mM]))?(?:\s+-\s+|\s+|$)").unwrap()
});

/// Level-2 section a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    Tasks,
    Log,
    Other,
}

impl Section {
    pub(crate) fn from_heading(title: &str) -> Self {
        let title = title.trim();
        if title.eq_ignore_ascii_case("tasks") {
            Self::Tasks
        } else if title.eq_ignore_ascii_case("log") {
            Self::Log
        } else {
            Self::Other
        }
    }
}

/// A located piece of a note, as found by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Block<'a> {
    /// Candidate task line inside `## Tasks`.
    Task { line: usize, text: &'a str, continuation: Vec<&'a str> },
    /// Bullet inside `## Log`.
    Log { line: usize, text: &'a str, continuation: Vec<&'a str> },
    /// Any line outside the known sections.
    Loose { line: usize, text: &'a str },
}

pub(crate) fn is_bullet(line: &str) -> bool {
    BULLET_RE.is_match(line)
}

pub(crate) fn is_heading(line: &str) -> bool {
    HEADING_RE.is_match(line)
}

/// Run a strategy's `locate` over the note content and turn the blocks it
/// finds into entities, in line order.
pub(crate) fn assemble<F>(note: Note, locate: F) -> ParsedNote
where
    F: for<'a> FnOnce(&'a str) -> Vec<Block<'a>>,
{
    let (tasks, log_entries, mentions) = {
        let blocks = locate(&note.content);
        extract_entities(&note, blocks)
    };
    ParsedNote { note, tasks, log_entries, mentions }
}

fn extract_entities(
    note: &Note,
    mut blocks: Vec<Block<'_>>,
) -> (Vec<Task>, Vec<LogEntry>, Vec<TaskMention>) {
    blocks.sort_by_key(|block| match block {
        Block::Task { line, .. } | Block::Log { line, .. } | Block::Loose { line, .. } => *line,
    });

    let anchor = note.anchor();
    let mut tasks = Vec::new();
    let mut log_entries = Vec::new();
    let mut mentions = Vec::new();

    for block in blocks {
        match block {
            Block::Task { line, text, continuation } => {
                if let Some(task) = build_task(note, anchor, line, text, &continuation) {
                    tasks.push(task);
                }
            }
            Block::Log { line, text, continuation } => {
                if let Some((entry, entry_mentions)) =
                    build_log_entry(note, anchor, line, text, &continuation)
                {
                    log_entries.push(entry);
                    mentions.extend(entry_mentions);
                }
            }
            Block::Loose { line, text } => {
                let tags = extract_tags(text);
                for task_id in extract_task_ids(text) {
                    mentions.push(TaskMention {
                        task_id,
                        note_id: note.id.clone(),
                        log_entry_id: None,
                        line,
                        excerpt: excerpt(text),
                        tags: tags.clone(),
                    });
                }
            }
        }
    }

    (tasks, log_entries, mentions)
}

fn build_task(
    note: &Note,
    anchor: NaiveDateTime,
    line: usize,
    text: &str,
    continuation: &[&str],
) -> Option<Task> {
    let caps = CHECKBOX_RE.captures(text)?;
    let mark = caps[1].chars().next().unwrap_or(' ');
    let body = caps[2].trim();
    if body.is_empty() {
        return None;
    }

    let id = TASK_ID_RE
        .captures(body)
        .map(|c| TaskId::new(&c[1]))
        .unwrap_or_else(|| TaskId::new(format!("{}#{}", note.id, line)));

    let full = join_lines(body, continuation);
    let status = TaskStatus::from_mark(mark);
    let title = match clean_line(body) {
        cleaned if cleaned.is_empty() => body.to_string(),
        cleaned => cleaned,
    };
    let description = clean_lines(continuation);

    Some(Task {
        id,
        note_id: note.id.clone(),
        title,
        description: (!description.is_empty()).then_some(description),
        status,
        tags: extract_tags(&full),
        created_at: anchor,
        updated_at: anchor,
        closed_at: (status == TaskStatus::Done).then_some(anchor),
        line,
    })
}

fn build_log_entry(
    note: &Note,
    anchor: NaiveDateTime,
    line: usize,
    text: &str,
    continuation: &[&str],
) -> Option<(LogEntry, Vec<TaskMention>)> {
    let caps = BULLET_RE.captures(text)?;
    let body = caps.get(1).map_or("", |m| m.as_str()).trim();
    if body.is_empty() {
        return None;
    }

    let (timestamp, rest) = split_timestamp(body, anchor.date());
    if rest.trim().is_empty() && continuation.iter().all(|l| l.trim().is_empty()) {
        return None;
    }
    let full = join_lines(body, continuation);
    let tags = extract_tags(&full);
    let task_ids = extract_task_ids(&full);

    let mut content_lines = vec![clean_line(rest)];
    content_lines.extend(continuation.iter().map(|l| clean_line(l)));
    let content = content_lines
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let id = LogEntryId::new(format!("{}:{}", note.id, line));
    let mentions = task_ids
        .iter()
        .map(|task_id| TaskMention {
            task_id: task_id.clone(),
            note_id: note.id.clone(),
            log_entry_id: Some(id.clone()),
            line,
            excerpt: excerpt(&full),
            tags: tags.clone(),
        })
        .collect();

    let entry = LogEntry { id, note_id: note.id.clone(), line, timestamp, content, tags, task_ids };
    Some((entry, mentions))
}

/// Split a leading timestamp off a log body.
///
/// Accepts `HH:MM`, `H:MM`, `HH:MM:SS`, an `am`/`pm` suffix, and
/// `YYYY-MM-DD[ HH:MM[:SS]]`. Time-only stamps land on `date`. An unparseable
/// stamp leaves the body untouched.
pub(crate) fn split_timestamp(body: &str, date: NaiveDate) -> (Option<NaiveDateTime>, &str) {
    if let Some(caps) = DATE_STAMP_RE.captures(body) {
        let stamp_date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok();
        let time = match caps.get(2) {
            Some(hour) => clock_time(hour.as_str(), &caps[3], caps.get(4).map(|m| m.as_str()), None),
            None => Some(NaiveTime::MIN),
        };
        if let (Some(d), Some(t)) = (stamp_date, time) {
            return (Some(d.and_time(t)), &body[caps[0].len()..]);
        }
        return (None, body);
    }

    if let Some(caps) = TIME_STAMP_RE.captures(body)
        && let Some(time) = clock_time(
            &caps[1],
            &caps[2],
            caps.get(3).map(|m| m.as_str()),
            caps.get(4).map(|m| m.as_str()),
        )
    {
        return (Some(date.and_time(time)), &body[caps[0].len()..]);
    }

    (None, body)
}

fn clock_time(hour: &str, minute: &str, second: Option<&str>, meridiem: Option<&str>) -> Option<NaiveTime> {
    let mut hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    let second: u32 = second.map_or(Some(0), |s| s.parse().ok())?;

    if let Some(meridiem) = meridiem {
        if hour == 0 || hour > 12 {
            return None;
        }
        let pm = meridiem.eq_ignore_ascii_case("pm");
        hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
    }

    NaiveTime::from_hms_opt(hour, minute, second)
}

/// Hashtags in `text`, normalized, sorted and de-duplicated.
pub(crate) fn extract_tags(text: &str) -> Vec<String> {
    TAG_RE
        .captures_iter(text)
        .filter_map(|caps| normalize_tag(&caps[2]))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Distinct `[T-…]` references in order of first appearance.
pub(crate) fn extract_task_ids(text: &str) -> Vec<TaskId> {
    let mut ids: Vec<TaskId> = Vec::new();
    for caps in TASK_ID_RE.captures_iter(text) {
        let id = TaskId::new(&caps[1]);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Drop tags and id brackets (with any parentheses that held only those),
/// then collapse whitespace.
pub(crate) fn clean_line(text: &str) -> String {
    let without_parens = TAG_ONLY_PARENS_RE.replace_all(text, " ");
    let without_ids = TASK_ID_RE.replace_all(&without_parens, " ");
    let without_tags = TAG_RE.replace_all(&without_ids, "${1}");
    without_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_lines(lines: &[&str]) -> String {
    lines.iter().map(|l| clean_line(l)).filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n")
}

fn join_lines(first: &str, rest: &[&str]) -> String {
    std::iter::once(first).chain(rest.iter().copied()).collect::<Vec<_>>().join("\n")
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_EXCERPT_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(MAX_EXCERPT_CHARS).collect();
    cut.push('…');
    cut
}
