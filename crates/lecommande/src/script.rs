//! Parsed scripts.
//!
//! A [`Script`] keeps every source line as a [`ScriptEntry`] so it can be
//! written back unchanged: commands, comments, blank lines, and lines that
//! failed to parse.

use crate::command::Command;
use crate::error::ParseError;
use crate::parameters::ParameterSet;
use crate::parser::parse_line;
use crate::registry::CommandRegistry;
use lestatut::{CommandStatus, Severity};
use std::fmt;

/// What a script line turned into.
pub enum EntryKind {
    /// An executable command.
    Command(Box<dyn Command>),
    /// `#` comment or part of a `/* ... */` block.
    Comment,
    /// Empty line.
    Blank,
    /// Line that could not be parsed.
    Unparsed(ParseError),
}

impl fmt::Debug for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(command) => f.debug_tuple("Command").field(&command.name()).finish(),
            Self::Comment => f.write_str("Comment"),
            Self::Blank => f.write_str("Blank"),
            Self::Unparsed(err) => f.debug_tuple("Unparsed").field(err).finish(),
        }
    }
}

/// One line of a script.
#[derive(Debug)]
pub struct ScriptEntry {
    /// 1-based source line (0 for entries added programmatically).
    pub line: usize,
    /// Source text, trimmed.
    pub text: String,
    /// Alias of a binding line.
    pub alias: Option<String>,
    /// Parameters of a command entry.
    pub parameters: ParameterSet,
    /// Per-phase status.
    pub status: CommandStatus,
    /// What the line is.
    pub kind: EntryKind,
}

impl ScriptEntry {
    /// Build a command entry programmatically.
    pub fn command(
        command: Box<dyn Command>,
        alias: Option<String>,
        parameters: ParameterSet,
    ) -> Self {
        let text = command.serialize(alias.as_deref(), &parameters);
        Self {
            line: 0,
            text,
            alias,
            parameters,
            status: CommandStatus::new(),
            kind: EntryKind::Command(command),
        }
    }

    fn passive(line: usize, text: &str, kind: EntryKind) -> Self {
        Self {
            line,
            text: text.to_string(),
            alias: None,
            parameters: ParameterSet::new(),
            status: CommandStatus::new(),
            kind,
        }
    }

    /// Executable command entry?
    #[must_use]
    pub fn is_command(&self) -> bool {
        matches!(self.kind, EntryKind::Command(_))
    }

    /// Does this entry appear in run reports (commands and unparsed lines)?
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        matches!(self.kind, EntryKind::Command(_) | EntryKind::Unparsed(_))
    }

    /// Command name; for unknown commands, the name as written.
    #[must_use]
    pub fn command_name(&self) -> &str {
        match &self.kind {
            EntryKind::Command(command) => command.name(),
            EntryKind::Unparsed(ParseError::UnknownCommand { name, .. }) => name,
            _ => "",
        }
    }

    /// Worst severity over all phases.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.status.severity()
    }

    /// Canonical text for commands, source text otherwise.
    #[must_use]
    pub fn to_text(&self) -> String {
        match &self.kind {
            EntryKind::Command(command) => {
                command.serialize(self.alias.as_deref(), &self.parameters)
            }
            _ => self.text.clone(),
        }
    }
}

/// Ordered list of script entries.
#[derive(Debug, Default)]
pub struct Script {
    entries: Vec<ScriptEntry>,
    source: Option<String>,
}

impl Script {
    /// Create an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse script text. Never fails; see [`EntryKind::Unparsed`].
    #[must_use]
    pub fn parse(text: &str, registry: &CommandRegistry) -> Self {
        let mut entries = Vec::new();
        let mut in_block = false;

        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let trimmed = raw.trim();

            if in_block || trimmed.starts_with("/*") {
                let opens_here = !in_block;
                let body = if opens_here { &trimmed[2..] } else { trimmed };
                in_block = !(body.contains("*/"));
                entries.push(ScriptEntry::passive(line, trimmed, EntryKind::Comment));
                continue;
            }
            if trimmed.is_empty() {
                entries.push(ScriptEntry::passive(line, trimmed, EntryKind::Blank));
                continue;
            }
            if trimmed.starts_with('#') {
                entries.push(ScriptEntry::passive(line, trimmed, EntryKind::Comment));
                continue;
            }

            match parse_line(trimmed, registry) {
                Ok(parsed) => entries.push(ScriptEntry {
                    line,
                    text: trimmed.to_string(),
                    alias: parsed.alias,
                    parameters: parsed.parameters,
                    status: CommandStatus::new(),
                    kind: EntryKind::Command(parsed.command),
                }),
                Err(err) => entries.push(ScriptEntry::passive(
                    line,
                    trimmed,
                    EntryKind::Unparsed(err.at_line(line)),
                )),
            }
        }

        Self {
            entries,
            source: Some(text.to_string()),
        }
    }

    /// All entries in order.
    #[must_use]
    pub fn entries(&self) -> &[ScriptEntry] {
        &self.entries
    }

    /// Mutable access to the entries (statuses, parameters).
    pub fn entries_mut(&mut self) -> &mut [ScriptEntry] {
        &mut self.entries
    }

    /// Entry by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ScriptEntry> {
        self.entries.get(index)
    }

    /// Append an entry.
    pub fn push(&mut self, entry: ScriptEntry) {
        self.source = None;
        self.entries.push(entry);
    }

    /// Replace the entry at `index`, returning the old one.
    pub fn replace(&mut self, index: usize, entry: ScriptEntry) -> Option<ScriptEntry> {
        let slot = self.entries.get_mut(index)?;
        self.source = None;
        Some(std::mem::replace(slot, entry))
    }

    /// Number of entries (all kinds).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of executable commands.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_command()).count()
    }

    /// Parse errors in line order.
    pub fn parse_errors(&self) -> impl Iterator<Item = &ParseError> {
        self.entries.iter().filter_map(|e| match &e.kind {
            EntryKind::Unparsed(err) => Some(err),
            _ => None,
        })
    }

    /// Canonical text: commands re-serialized, other lines verbatim.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = self
            .entries
            .iter()
            .map(ScriptEntry::to_text)
            .collect::<Vec<_>>()
            .join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Text as parsed; canonical text once entries were pushed or replaced.
    #[must_use]
    pub fn source_text(&self) -> String {
        self.source.clone().unwrap_or_else(|| self.to_text())
    }

    /// Worst severity over all entries.
    #[must_use]
    pub fn severity(&self) -> Severity {
        Severity::worst_of(self.entries.iter().map(ScriptEntry::severity))
    }
}
