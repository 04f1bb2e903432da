// End-to-end runs of scripts built from the standard registry.

use lecatalogue::standard_registry;
use lecommande::{CommandPhase, NamedResult, ProgressUpdate, ResultKind, Script, Severity};
use leprocesseur::{Orchestrator, ProcessorListener, RunConfig, RunReport, RunState};
use rstest::rstest;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn orchestrator_in(dir: &Path) -> Orchestrator {
    Orchestrator::new(RunConfig {
        working_dir: dir.to_path_buf(),
        ..RunConfig::default()
    })
}

fn run_text(orchestrator: &mut Orchestrator, text: &str) -> (Script, RunReport) {
    let registry = standard_registry();
    let mut script = Script::parse(text, &registry);
    let report = orchestrator.run(&mut script).expect("run");
    (script, report)
}

fn result(orchestrator: &Orchestrator, name: &str) -> Option<NamedResult> {
    let state = orchestrator.state();
    let guard = state.read().expect("state lock");
    guard.result(name).map(|handle| (*handle).clone())
}

#[test]
fn new_series_is_bound_under_its_alias() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (_, report) = run_text(
        &mut orchestrator,
        "SetOutputPeriod(OutputStart=\"2024-01-01\",OutputEnd=\"2024-01-05\")\n\
         TS Flow = NewTimeSeries(NewTSID=\"Gauge.Flow.Day\",InitialValue=2.5,Units=CFS)\n",
    );

    assert!(report.is_success(), "{}", report.summary());
    let Some(NamedResult::TimeSeries(ts)) = result(&orchestrator, "Flow") else {
        panic!("Flow not bound");
    };
    assert_eq!(ts.identifier, "Gauge.Flow.Day");
    assert_eq!(ts.points.len(), 5);
    assert_eq!(ts.value_count(), 5);
    assert!(result(&orchestrator, "Gauge.Flow.Day").is_none());
}

#[test]
fn missing_required_parameter_blocks_only_that_command() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (script, report) = run_text(
        &mut orchestrator,
        "NewTable(Columns=\"a,b\")\nNewTable(TableID=Stations,Columns=\"id,name\")\n",
    );

    assert_eq!(report.severity, Severity::Failure);
    let first = &script.entries()[0];
    assert_eq!(first.status.phase_severity(CommandPhase::Initialization), Severity::Failure);
    assert!(report
        .records
        .iter()
        .any(|r| r.line == 1 && r.message.contains("\"TableID\" is required")));
    assert!(!report.commands[0].ran);
    assert!(report.commands[1].ran);
    assert!(matches!(result(&orchestrator, "Stations"), Some(NamedResult::Table(_))));
}

#[test]
fn unknown_command_is_reported_and_the_rest_runs() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (_, report) = run_text(
        &mut orchestrator,
        "# header\nReadFil(InputFile=x.dv)\nSetProperty(PropertyName=Region,PropertyValue=North)\n",
    );

    assert_eq!(report.commands.len(), 2);
    assert_eq!(report.commands[0].line, 2);
    assert_eq!(report.commands[0].severity, Severity::Failure);
    assert!(report.commands[1].ran);
    let state = orchestrator.state();
    let region = state.read().expect("lock").property("Region");
    assert_eq!(region.as_deref(), Some("North"));
}

#[test]
fn read_write_round_trip_through_files() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("in.dv"),
        "# TSID: A.Day\n# Interval: Day\n2024-01-01,1\n2024-01-02,\n2024-01-03,3\n",
    )
    .expect("write input");
    let mut orchestrator = orchestrator_in(dir.path());

    let (_, report) = run_text(
        &mut orchestrator,
        "SetProperty(PropertyName=Out,PropertyValue=results)\n\
         TS A = ReadFile(InputFile=in.dv,InputStart=2024-01-02)\n\
         WriteFile(TSID=A,OutputFile=\"${Out}/a.dv\")\n",
    );

    assert!(report.is_success(), "{}", report.summary());
    let text = std::fs::read_to_string(dir.path().join("results").join("a.dv")).expect("output");
    assert!(text.starts_with("# TSID: A.Day\n"));
    assert!(text.contains("2024-01-02,\n2024-01-03,3\n"));
    assert!(!text.contains("2024-01-01"));
}

#[test]
fn read_failure_is_a_command_failure() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (_, report) = run_text(
        &mut orchestrator,
        "TS A = ReadFile(InputFile=missing.dv)\nMessage(Message=after)\n",
    );

    assert_eq!(report.commands[0].run, Severity::Failure);
    assert_eq!(report.commands[1].run, Severity::Success);
    assert_eq!(report.status, RunState::Done);
}

#[rstest]
#[case("WriteFile(TSID=Nothing*,OutputFile=x.dv)")]
#[case("Free(TSID=Nothing*)")]
fn empty_selection_warns(#[case] line: &str) {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (_, report) = run_text(&mut orchestrator, line);

    assert_eq!(report.severity, Severity::Warning);
    assert!(!dir.path().join("x.dv").exists());
}

#[test]
fn ensemble_and_free_use_selectors() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (_, report) = run_text(
        &mut orchestrator,
        "SetOutputPeriod(OutputStart=2024-01-01,OutputEnd=2024-01-02)\n\
         TS Flow1 = NewTimeSeries(NewTSID=F1)\n\
         TS Flow2 = NewTimeSeries(NewTSID=F2)\n\
         TS Stage = NewTimeSeries(NewTSID=S1)\n\
         NewEnsemble(EnsembleID=Flows,TSID=Flow*)\n\
         Free(TSID=Stage)\n",
    );

    assert!(report.is_success(), "{}", report.summary());
    let Some(NamedResult::Ensemble(ensemble)) = result(&orchestrator, "Flows") else {
        panic!("ensemble not bound");
    };
    assert_eq!(ensemble.members, vec!["Flow1", "Flow2"]);
    assert!(result(&orchestrator, "Stage").is_none());
}

#[test]
fn discovery_declares_aliases_before_running() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());
    let registry = standard_registry();
    let mut script = Script::parse(
        "TS A = ReadFile(InputFile=a.dv)\nNewTable(TableID=T,Columns=x)\n",
        &registry,
    );

    orchestrator.validate_only(&mut script).expect("validate");

    let state = orchestrator.state();
    let guard = state.read().expect("lock");
    assert_eq!(guard.discovered().get("A"), Some(&ResultKind::TimeSeries));
    assert_eq!(guard.discovered().get("T"), Some(&ResultKind::Table));
    assert_eq!(guard.result_count(), 0);
}

#[test]
fn message_severity_maps_to_records() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (_, report) = run_text(
        &mut orchestrator,
        "Message(Message=hello)\nMessage(Message=careful,CommandStatus=WARNING)\n\
         Message(Message=stop,CommandStatus=FAILURE)\n",
    );

    let runs: Vec<Severity> = report.commands.iter().map(|c| c.run).collect();
    assert_eq!(runs, vec![Severity::Success, Severity::Warning, Severity::Failure]);
}

#[test]
fn exit_skips_the_rest() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (_, report) = run_text(
        &mut orchestrator,
        "Message(Message=one)\nExit()\nNewTable(TableID=T,Columns=x)\n",
    );

    assert_eq!(report.exit_at, Some(1));
    assert_eq!(report.commands_run, 2);
    assert!(result(&orchestrator, "T").is_none());
}

#[test]
fn strict_mode_stops_at_a_line_that_did_not_parse() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = Orchestrator::new(RunConfig {
        working_dir: dir.path().to_path_buf(),
        strict: true,
        ..RunConfig::default()
    });

    let (_, report) = run_text(
        &mut orchestrator,
        "Message(Message=first)
ReadFil(InputFile=x.dv)
NewTable(TableID=T,Columns=x)
",
    );

    assert_eq!(report.aborted_at, Some(1));
    assert_eq!(report.commands_run, 1);
    assert!(!report.commands[2].ran);
    assert!(result(&orchestrator, "T").is_none());
}

#[test]
fn free_removes_every_match_together() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (_, report) = run_text(
        &mut orchestrator,
        "SetOutputPeriod(OutputStart=2024-01-01,OutputEnd=2024-01-02)
         TS Flow1 = NewTimeSeries(NewTSID=F1)
         TS Flow2 = NewTimeSeries(NewTSID=F2)
         NewTable(TableID=Flows,Columns=x)
         Free(TSID=Flow*)
",
    );

    assert!(report.is_success(), "{}", report.summary());
    assert!(report.records.iter().any(|r| r.message == "Freed 3 result(s)"));
    let state = orchestrator.state();
    assert_eq!(state.read().expect("lock").result_count(), 0);
}

#[test]
fn new_series_may_end_on_the_last_representable_day() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (_, report) = run_text(
        &mut orchestrator,
        "TS Edge = NewTimeSeries(NewTSID=Edge,SetStart=\"9999-12-31 + 92093338 Day\",SetEnd=\"9999-12-31 + 92093340 Day\")
",
    );

    assert!(report.is_success(), "{}", report.summary());
    let Some(NamedResult::TimeSeries(ts)) = result(&orchestrator, "Edge") else {
        panic!("Edge not bound");
    };
    assert_eq!(ts.points.len(), 3);
    assert_eq!(
        ts.points.last().map(|p| p.date.date()),
        Some(chrono::NaiveDate::MAX)
    );
}

#[rstest]
#[case("SetStart=\"2024-01-01 + 99999999 Week\",SetEnd=2024-01-02", CommandPhase::Initialization)]
#[case("SetStart=\"0001-01-01 - 99999999 Week\",SetEnd=2024-01-02", CommandPhase::Initialization)]
#[case("SetStart=\"CurrentToDay - 99999999 Week\",SetEnd=2024-01-02", CommandPhase::Run)]
#[case("SetStart=2024-01-01,SetEnd=\"CurrentToDay + 99999999 Week\"", CommandPhase::Run)]
fn offsets_past_the_calendar_fail_the_command(#[case] params: &str, #[case] phase: CommandPhase) {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (script, report) = run_text(
        &mut orchestrator,
        &format!("TS A = NewTimeSeries(NewTSID=A,{params})
Message(Message=after)
"),
    );

    assert_eq!(
        script.entries()[0].status.phase_severity(phase),
        Severity::Failure,
        "{}",
        report.summary()
    );
    assert!(report.records.iter().any(|r| r.message.contains("out of range")));
    assert!(report.commands[1].ran);
    assert!(result(&orchestrator, "A").is_none());
}

#[rstest]
#[case("WaitTime=1e300")]
#[case("WaitTime=1,ProgressIncrement=1e300")]
fn wait_rejects_durations_it_cannot_represent(#[case] params: &str) {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let (script, report) = run_text(&mut orchestrator, &format!("Wait({params})
"));

    assert_eq!(
        script.entries()[0]
            .status
            .phase_severity(CommandPhase::Initialization),
        Severity::Failure
    );
    assert!(!report.commands[0].ran);
}

#[derive(Default)]
struct Progress {
    updates: Vec<ProgressUpdate>,
}

impl ProcessorListener for Progress {
    fn command_progress(&mut self, update: &ProgressUpdate) {
        self.updates.push(update.clone());
    }
}

#[test]
fn wait_reports_progress() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());
    let registry = standard_registry();
    let mut script = Script::parse("Wait(WaitTime=0.3,ProgressIncrement=0.1)\n", &registry);
    let mut listener = Progress::default();

    let report = orchestrator
        .run_with_listener(&mut script, &mut listener)
        .expect("run");

    assert!(report.is_success());
    assert!(listener.updates.len() >= 3, "{} updates", listener.updates.len());
    let last = listener.updates.last().expect("final update");
    assert!((last.fraction() - 1.0).abs() < f64::EPSILON);
}

struct CancelOnProgress {
    token: lecommande::CancellationToken,
}

impl ProcessorListener for CancelOnProgress {
    fn command_progress(&mut self, update: &ProgressUpdate) {
        if update.current > 0.0 {
            self.token.cancel();
        }
    }
}

#[test]
fn wait_is_interrupted_by_cancellation() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());
    let registry = standard_registry();
    let mut script = Script::parse(
        "Wait(WaitTime=30,ProgressIncrement=0.2)\nMessage(Message=never)\n",
        &registry,
    );
    let mut listener = CancelOnProgress {
        token: orchestrator.cancellation_token(),
    };

    let started = Instant::now();
    let report = orchestrator
        .run_with_listener(&mut script, &mut listener)
        .expect("run");

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.status, RunState::Cancelled);
    assert_eq!(report.commands_run, 1);
}

#[cfg(unix)]
#[test]
fn run_program_times_out_and_keeps_output() {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());

    let started = Instant::now();
    let (_, report) = run_text(
        &mut orchestrator,
        "RunProgram(CommandLine=\"echo partial; sleep 10\",UseCommandShell=True,Timeout=0.5)\n\
         Message(Message=next)\n",
    );

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.commands[0].run, Severity::Failure);
    assert!(report.records.iter().any(|r| r.message.contains("timed out")));
    assert!(report
        .records
        .iter()
        .any(|r| r.message.starts_with("Program stdout") && r.message.contains("partial")));
    assert!(report.commands[1].ran);
}

#[cfg(unix)]
#[rstest]
#[case("exit 0", "", Severity::Success)]
#[case("exit 3", "", Severity::Failure)]
#[case("exit 3", "0,3", Severity::Success)]
fn run_program_exit_codes(#[case] line: &str, #[case] ok: &str, #[case] expected: Severity) {
    let dir = tempdir().expect("tempdir");
    let mut orchestrator = orchestrator_in(dir.path());
    let ok = if ok.is_empty() {
        String::new()
    } else {
        format!(",ExitCodeOk=\"{ok}\"")
    };

    let (_, report) = run_text(
        &mut orchestrator,
        &format!("RunProgram(CommandLine=\"{line}\",UseCommandShell=True{ok})\n"),
    );

    assert_eq!(report.commands[0].run, expected, "{}", report.summary());
}
