//! Script line grammar and canonical serialization.
//!
//! Two productions, told apart by an `=` before the first unquoted `(`:
//!
//! ```text
//! [TS ]<alias> = <CommandName>(<name>=<value>,...)
//! <CommandName>(<name>=<value>,...)
//! ```
//!
//! Values may be double-quoted to carry commas, parentheses, `=` or
//! surrounding whitespace; a literal quote inside a quoted value is doubled.

use crate::command::Command;
use crate::error::ParseError;
use crate::parameters::{ParameterSet, Provenance};
use crate::registry::CommandRegistry;
use crate::script::Script;
use std::fmt;

const TS_KEYWORD: &str = "TS";

/// Syntax-level view of one statement, before the command name is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Alias from a binding line.
    pub alias: Option<String>,
    /// Command name as written.
    pub name: String,
    /// Parameters, tagged `Persistent`.
    pub parameters: ParameterSet,
}

/// A statement whose command name resolved to a registered command.
pub struct ParsedLine {
    /// Alias from a binding line.
    pub alias: Option<String>,
    /// Fresh command instance.
    pub command: Box<dyn Command>,
    /// Parameters, tagged `Persistent`.
    pub parameters: ParameterSet,
}

impl fmt::Debug for ParsedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedLine")
            .field("alias", &self.alias)
            .field("command", &self.command.name())
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Index of the first `(` outside quotes.
fn find_open_paren(text: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Index of the `)` closing the `(` at `open`.
fn find_close_paren(text: &str, open: usize) -> Result<usize, &'static str> {
    let mut depth = 0usize;
    let mut in_quotes = false;
    for (i, c) in text[open..].char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + i);
                }
            }
            _ => {}
        }
    }
    if in_quotes {
        Err("unterminated quote")
    } else {
        Err("missing ')'")
    }
}

fn is_command_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split the text between the outer parentheses into `(name, value)` pairs.
///
/// Commas inside quotes or nested parentheses do not split. Unquoted values
/// are trimmed; quoted values are kept verbatim with doubled quotes undone.
pub fn split_parameters(text: &str) -> Result<Vec<(String, String)>, String> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut tokens = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth = depth.saturating_sub(1),
            ',' if !in_quotes && depth == 0 => {
                tokens.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err("unterminated quote".to_string());
    }
    tokens.push(&text[start..]);

    let mut pairs: Vec<(String, String)> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let (name, value) = token
            .split_once('=')
            .ok_or_else(|| format!("expected name=value, found \"{}\"", token.trim()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("missing parameter name in \"{}\"", token.trim()));
        }
        if name.contains('"') || name.contains(char::is_whitespace) {
            return Err(format!("invalid parameter name \"{name}\""));
        }
        if pairs.iter().any(|(existing, _)| existing == name) {
            return Err(format!("duplicate parameter \"{name}\""));
        }
        pairs.push((name.to_string(), unquote(value.trim())?));
    }
    Ok(pairs)
}

fn unquote(value: &str) -> Result<String, String> {
    let Some(rest) = value.strip_prefix('"') else {
        return Ok(value.to_string());
    };
    let mut out = String::with_capacity(rest.len());
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                out.push('"');
            } else if chars.next().is_none() {
                return Ok(out);
            } else {
                return Err(format!("unexpected text after closing quote in {value}"));
            }
        } else {
            out.push(c);
        }
    }
    Err(format!("unterminated quote in {value}"))
}

/// Parse one statement without consulting a registry.
pub fn parse_statement(line: &str) -> Result<Statement, ParseError> {
    let text = line.trim();
    let syntax = |message: &str| ParseError::syntax(0, text, message);

    let open = find_open_paren(text).ok_or_else(|| syntax("missing '('"))?;
    let head = &text[..open];

    let (alias, name) = match head.split_once('=') {
        Some((lhs, rhs)) => {
            let lhs = lhs.trim();
            let alias = match lhs.strip_prefix(TS_KEYWORD) {
                Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim(),
                _ => lhs,
            };
            if alias.is_empty() {
                return Err(syntax("missing alias before '='"));
            }
            if alias.contains(char::is_whitespace) {
                return Err(syntax("alias must not contain spaces"));
            }
            (Some(alias.to_string()), rhs.trim())
        }
        None => {
            let head = head.trim();
            if head
                .strip_prefix(TS_KEYWORD)
                .is_some_and(|rest| rest.starts_with(char::is_whitespace))
            {
                return Err(syntax("expected '=' after alias"));
            }
            (None, head)
        }
    };

    if !is_command_name(name) {
        return Err(syntax("invalid command name"));
    }

    let close = find_close_paren(text, open).map_err(syntax)?;
    if !text[close + 1..].trim().is_empty() {
        return Err(syntax("unexpected text after ')'"));
    }

    let pairs = split_parameters(&text[open + 1..close]).map_err(|m| syntax(&m))?;
    let mut parameters = ParameterSet::new();
    for (key, value) in pairs {
        parameters.set_with_provenance(key, value, Provenance::Persistent);
    }

    Ok(Statement {
        alias,
        name: name.to_string(),
        parameters,
    })
}

/// Parse one trimmed, non-empty line into a command instance.
pub fn parse_line(line: &str, registry: &CommandRegistry) -> Result<ParsedLine, ParseError> {
    let statement = parse_statement(line)?;
    let command = registry
        .create(&statement.name)
        .ok_or_else(|| ParseError::UnknownCommand {
            line: 0,
            name: statement.name.clone(),
            suggestion: registry.suggest(&statement.name).map(str::to_string),
        })?;
    Ok(ParsedLine {
        alias: statement.alias,
        command,
        parameters: statement.parameters,
    })
}

/// Parse a whole script. Never fails; bad lines become unparsed entries.
pub fn parse_script(text: &str, registry: &CommandRegistry) -> Script {
    Script::parse(text, registry)
}

fn needs_quotes(value: &str) -> bool {
    value.trim() != value || value.contains([',', '(', ')', '=', '"'])
}

fn quote(value: &str) -> String {
    if needs_quotes(value) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Canonical script text for a command.
///
/// Recognized parameters come first in declared order, then the rest in
/// insertion order. Empty values and `Default` values are left out.
pub fn to_script_text(
    name: &str,
    alias: Option<&str>,
    parameters: &ParameterSet,
    recognized: &[&str],
) -> String {
    let declared = recognized
        .iter()
        .filter_map(|key| parameters.parameter(key).map(|p| (*key, p)));
    let extra = parameters
        .iter()
        .filter(|(key, _)| !recognized.contains(key));

    let params = declared
        .chain(extra)
        .filter(|(_, p)| p.provenance != Provenance::Default && !p.value.is_empty())
        .map(|(key, p)| format!("{key}={}", quote(&p.value)))
        .collect::<Vec<_>>()
        .join(",");

    match alias {
        Some(alias) => format!("{TS_KEYWORD} {alias} = {name}({params})"),
        None => format!("{name}({params})"),
    }
}
