//! CommonMark parser backed by comrak.

use comrak::nodes::{AstNode, NodeValue};
use comrak::{Arena, Options, parse_document};

use super::NoteParser;
use super::extract::{self, Block, Section};
use crate::model::{Note, ParsedNote};

/// Locates sections and list items through the comrak AST, then reads the
/// raw source lines of each item.
///
/// Unlike [`RegexNoteParser`](super::RegexNoteParser) it ignores `## ` lines
/// and bullets inside fenced code, and it follows CommonMark lazy
/// continuation lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct AstNoteParser;

impl AstNoteParser {
    pub fn new() -> Self {
        Self
    }
}

impl NoteParser for AstNoteParser {
    fn name(&self) -> &'static str {
        "ast"
    }

    fn parse(&self, note: Note) -> ParsedNote {
        extract::assemble(note, locate_blocks)
    }
}

fn locate_blocks(content: &str) -> Vec<Block<'_>> {
    let arena = Arena::new();
    let options = default_options();
    let root = parse_document(&arena, content, &options);
    let lines: Vec<&str> = content.lines().collect();

    let mut boundaries: Vec<(usize, Section)> = Vec::new();
    for node in root.descendants() {
        if let NodeValue::Heading(ref heading) = node.data.borrow().value
            && heading.level == 2
            && !heading.setext
        {
            let line = node.data.borrow().sourcepos.start.line;
            boundaries.push((line, Section::from_heading(&collect_text(node))));
        }
    }

    let section_at = |line: usize| {
        boundaries
            .iter()
            .take_while(|(start, _)| *start < line)
            .last()
            .map_or(Section::Other, |(_, section)| *section)
    };

    let mut blocks = Vec::new();

    for node in root.descendants() {
        if !matches!(node.data.borrow().value, NodeValue::Item(_) | NodeValue::TaskItem(..)) {
            continue;
        }
        let line = node.data.borrow().sourcepos.start.line;
        let Some(raw) = line.checked_sub(1).and_then(|idx| lines.get(idx)) else {
            continue;
        };

        let section = section_at(line);
        if section == Section::Other {
            continue;
        }

        let paragraph_end = first_paragraph_end(node).unwrap_or(line).min(lines.len());
        let continuation: Vec<&str> = lines[line..paragraph_end.max(line)]
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();

        let text = raw.trim_end();
        blocks.push(match section {
            Section::Tasks => Block::Task { line, text, continuation },
            _ => Block::Log { line, text, continuation },
        });
    }

    for (idx, raw) in lines.iter().enumerate() {
        let line = idx + 1;
        if section_at(line) == Section::Other && !boundaries.iter().any(|(b, _)| *b == line) {
            blocks.push(Block::Loose { line, text: raw.trim() });
        }
    }

    blocks
}

/// Last source line of the item's leading paragraph.
fn first_paragraph_end<'a>(item: &'a AstNode<'a>) -> Option<usize> {
    let child = item.first_child()?;
    let data = child.data.borrow();
    matches!(data.value, NodeValue::Paragraph).then_some(data.sourcepos.end.line)
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.parse.smart = false;
    options
}

fn collect_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.descendants() {
        if let NodeValue::Text(ref t) = child.data.borrow().value {
            text.push_str(t);
        }
    }
    text
}
