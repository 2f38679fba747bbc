//! Line-oriented parser driven by regular expressions.

use super::NoteParser;
use super::extract::{self, Block, Section};
use crate::model::{Note, ParsedNote};

/// Scans a note line by line. Only `## ` headings switch sections; every
/// other line is classified by the section it falls in.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexNoteParser;

impl RegexNoteParser {
    pub fn new() -> Self {
        Self
    }
}

impl NoteParser for RegexNoteParser {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn parse(&self, note: Note) -> ParsedNote {
        extract::assemble(note, locate_blocks)
    }
}

fn locate_blocks(content: &str) -> Vec<Block<'_>> {
    let lines: Vec<&str> = content.lines().collect();
    let mut blocks = Vec::new();
    let mut section = Section::Other;
    let mut idx = 0;

    while idx < lines.len() {
        let raw = lines[idx];
        let line = idx + 1;
        idx += 1;

        if let Some(title) = raw.trim_start().strip_prefix("## ") {
            section = Section::from_heading(title);
            continue;
        }

        match section {
            Section::Tasks | Section::Log if extract::is_bullet(raw) => {
                let continuation = take_continuation(&lines, &mut idx);
                let text = raw.trim_end();
                blocks.push(match section {
                    Section::Tasks => Block::Task { line, text, continuation },
                    _ => Block::Log { line, text, continuation },
                });
            }
            Section::Tasks | Section::Log => {}
            Section::Other => blocks.push(Block::Loose { line, text: raw.trim() }),
        }
    }

    blocks
}

/// Indented lines directly below an entry, up to the next bullet, heading or
/// blank line. Advances `idx` past them.
fn take_continuation<'a>(lines: &[&'a str], idx: &mut usize) -> Vec<&'a str> {
    let mut continuation = Vec::new();
    while let Some(next) = lines.get(*idx) {
        let indented = next.starts_with(' ') || next.starts_with('\t');
        if !indented
            || next.trim().is_empty()
            || extract::is_bullet(next)
            || extract::is_heading(next)
        {
            break;
        }
        continuation.push(next.trim());
        *idx += 1;
    }
    continuation
}
