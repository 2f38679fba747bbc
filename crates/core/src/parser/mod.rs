//! Note parsing: raw markdown in, tasks, log entries and mentions out.
//!
//! A note is read through two conventional level-2 sections:
//!
//! ```markdown
//! ## Tasks
//! - [ ] Draft summary #work [T-1234]
//! - [x] Finish report #work
//!
//! ## Log
//! - 09:15 Kicked off [T-1234] #wins
//! ```
//!
//! Checkbox items under `## Tasks` become [`Task`](crate::model::Task)s,
//! bullets under `## Log` become [`LogEntry`](crate::model::LogEntry)s, and
//! every `[T-…]` reference outside a task line becomes a
//! [`TaskMention`](crate::model::TaskMention).

mod ast;
pub(crate) mod extract;
mod line_scan;

use serde::{Deserialize, Serialize};

use crate::model::{Note, ParsedNote};

pub use ast::AstNoteParser;
pub use line_scan::RegexNoteParser;

/// A parsing strategy. Implementations are pure: the same note always
/// yields the same [`ParsedNote`].
pub trait NoteParser: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn parse(&self, note: Note) -> ParsedNote;
}

/// Selects a [`NoteParser`] implementation from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserStrategy {
    #[default]
    Regex,
    Ast,
}

impl ParserStrategy {
    pub fn build(self) -> Box<dyn NoteParser> {
        match self {
            Self::Regex => Box::new(RegexNoteParser::new()),
            Self::Ast => Box::new(AstNoteParser::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_builds_matching_parser() {
        assert_eq!(ParserStrategy::default().build().name(), "regex");
        assert_eq!(ParserStrategy::Ast.build().name(), "ast");
    }

    #[test]
    fn test_strategy_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Section {
            strategy: ParserStrategy,
        }
        let parsed: Section = toml::from_str("strategy = \"ast\"").unwrap();
        assert_eq!(parsed.strategy, ParserStrategy::Ast);
    }
}
