// Integration tests for script parsing and the command contract.

use lecommande::{
    parse_script, Command, CommandExecutionError, CommandRegistry, EntryKind,
    InvalidParameterError, Invocation, LogRecord, ParameterCheck, ParameterSet, ParseError,
    RunContext,
};

struct ReadSomething;

impl Command for ReadSomething {
    fn name(&self) -> &'static str {
        "ReadSomething"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &["InputFile", "Format"]
    }

    fn validate(&self, parameters: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        ParameterCheck::new(self.name(), parameters, self.recognized_parameters())
            .required("InputFile")
            .finish()
    }

    fn run(
        &mut self,
        _invocation: Invocation<'_>,
        _ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        Ok(())
    }
}

struct Stop;

impl Command for Stop {
    fn name(&self) -> &'static str {
        "Stop"
    }

    fn recognized_parameters(&self) -> &'static [&'static str] {
        &[]
    }

    fn validate(&self, _: &ParameterSet) -> Result<Vec<LogRecord>, InvalidParameterError> {
        Ok(Vec::new())
    }

    fn run(
        &mut self,
        _invocation: Invocation<'_>,
        ctx: &mut RunContext<'_>,
    ) -> Result<(), CommandExecutionError> {
        ctx.request_exit();
        Ok(())
    }
}

fn registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry
        .register(|| Box::new(ReadSomething))
        .register(|| Box::new(Stop));
    registry
}

const SCRIPT: &str = "\
# Read the inflow
TS Inflow = ReadSomething(InputFile=\"in flow.dv\",Format=DateValue)

/* disabled
ReadSomething(InputFile=old.dv)
*/
readsomething(InputFile=x.dv)
ReadSomething(InputFile=a.dv
Stop()
";

#[test]
fn every_line_becomes_an_entry() {
    let script = parse_script(SCRIPT, &registry());
    let kinds: Vec<&str> = script
        .entries()
        .iter()
        .map(|e| match &e.kind {
            EntryKind::Command(_) => "command",
            EntryKind::Comment => "comment",
            EntryKind::Blank => "blank",
            EntryKind::Unparsed(_) => "unparsed",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "comment", "command", "blank", "comment", "comment", "comment", "unparsed",
            "unparsed", "command"
        ]
    );
    assert_eq!(script.command_count(), 2);
    assert_eq!(script.entries()[8].line, 9);
}

#[test]
fn binding_line_keeps_alias_and_quoted_value() {
    let script = parse_script(SCRIPT, &registry());
    let entry = &script.entries()[1];
    assert_eq!(entry.alias.as_deref(), Some("Inflow"));
    assert_eq!(entry.parameters.get("InputFile"), Some("in flow.dv"));
    assert_eq!(entry.command_name(), "ReadSomething");
}

#[test]
fn unknown_command_suggests_registered_spelling() {
    let script = parse_script(SCRIPT, &registry());
    let errors: Vec<&ParseError> = script.parse_errors().collect();
    assert_eq!(errors.len(), 2);

    match errors[0] {
        ParseError::UnknownCommand {
            line,
            name,
            suggestion,
        } => {
            assert_eq!(*line, 7);
            assert_eq!(name, "readsomething");
            assert_eq!(suggestion.as_deref(), Some("ReadSomething"));
        }
        other => panic!("expected unknown command, got {other:?}"),
    }
    assert!(matches!(errors[1], ParseError::Syntax { line: 8, .. }));
}

#[test]
fn canonical_text_preserves_comments_and_bad_lines() {
    let script = parse_script(SCRIPT, &registry());
    let text = script.to_text();
    let reparsed = parse_script(&text, &registry());

    assert_eq!(reparsed.len(), script.len());
    assert_eq!(reparsed.command_count(), script.command_count());
    assert!(text.contains("TS Inflow = ReadSomething(InputFile=in flow.dv,Format=DateValue)"));
    assert!(text.contains("ReadSomething(InputFile=a.dv\n"));
    assert_eq!(script.source_text(), SCRIPT);
}

#[test]
fn validation_blocks_only_missing_required() {
    let script = parse_script("ReadSomething(Format=DateValue)\nStop()", &registry());
    let EntryKind::Command(command) = &script.entries()[0].kind else {
        panic!("first line should parse");
    };
    let err = command
        .validate(&script.entries()[0].parameters)
        .expect_err("InputFile is required");
    assert!(err.to_string().contains("InputFile"));
}
