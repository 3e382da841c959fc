mod common;
mod logic;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use ledgerquest_game::{JsonlRecordStore, RecordHistory};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use common::scenario::{get_scenario, list_scenarios};
use common::split_csv;
use logic::{
    GameTester, LogicTester, PlayabilityAggregate, PlayabilityRecord, SeedInfo, TesterAssets,
    aggregate_playability, resolve_seed_inputs, run_playability_analysis,
    validate_playability_targets,
};

#[derive(Debug, Parser)]
#[command(name = "ledgerquest-tester", version)]
#[command(about = "Automated QA for the LedgerQuest engine: scripted playthroughs and balance sweeps")]
struct Args {
    /// Scenarios to run (comma-separated, or "all")
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated; half-open ranges like 10..20 are accepted)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and per playability strategy
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Engine config JSON; fields left out keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-lines file that finished games are recorded into
    #[arg(long)]
    records: Option<PathBuf>,

    /// User id games are recorded under
    #[arg(long, default_value = "qa-bot")]
    user: String,

    /// Print the recorded games for --user from --records and exit
    #[arg(long, requires = "records")]
    list_records: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? || maybe_list_records(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seed_infos = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let logic_seeds: Vec<u64> = seed_infos.iter().map(|s| s.seed).collect();
    log::info!(
        "running {} scenario(s) over {} seed(s)",
        scenarios.len(),
        logic_seeds.len()
    );
    let tester_assets = Arc::new(TesterAssets::from_config_path(args.config.as_deref())?);
    let mut game_tester = GameTester::new(tester_assets, args.verbose);
    if let Some(path) = args.records.as_ref() {
        game_tester = game_tester.with_records(JsonlRecordStore::new(path.clone()), &args.user);
    }

    let all_results = run_logic_scenarios(&args, &scenarios, &logic_seeds, &game_tester);

    let (playability_records, playability_aggregates) =
        gather_playability(&args, &game_tester, &seed_infos)?;

    write_reports(
        &args,
        &all_results,
        playability_records.as_deref(),
        playability_aggregates.as_deref(),
        start_time,
    )?;

    if let Some(aggregates) = playability_aggregates.as_ref() {
        validate_playability_targets(aggregates)?;
    }

    if all_results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn maybe_list_records(args: &Args) -> Result<bool> {
    if !args.list_records {
        return Ok(false);
    }
    let Some(path) = args.records.as_ref() else {
        return Ok(false);
    };
    let store = JsonlRecordStore::new(path.clone());
    let records = store
        .records_for_user(&args.user)
        .with_context(|| format!("failed to read records from {}", path.display()))?;
    let mut output_target = OutputTarget::new(args.output.clone())?;
    logic::reports::generate_records_listing(output_target.writer(), &args.user, &records)?;
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎮 LedgerQuest Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for (key, _) in list_scenarios() {
            if !scenarios.iter().any(|s| s == key) {
                scenarios.push(key.to_string());
            }
        }
    }
    scenarios
}

fn run_logic_scenarios(
    args: &Args,
    scenarios: &[String],
    logic_seeds: &[u64],
    game_tester: &GameTester,
) -> Vec<logic::ScenarioResult> {
    let mut results: Vec<logic::ScenarioResult> = Vec::new();

    println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let logic_tester = LogicTester::new(game_tester.clone(), args.verbose);

    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            results.extend(logic_tester.run_scenario(&scenario, logic_seeds, args.iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

type PlayabilitySummary = (
    Option<Vec<PlayabilityRecord>>,
    Option<Vec<PlayabilityAggregate>>,
);

fn gather_playability(
    args: &Args,
    game_tester: &GameTester,
    seed_infos: &[SeedInfo],
) -> Result<PlayabilitySummary> {
    if !matches!(args.report.as_str(), "console" | "csv") {
        return Ok((None, None));
    }
    let records = run_playability_analysis(game_tester, seed_infos, args.iterations)?;
    let aggregates = aggregate_playability(&records);
    Ok((Some(records), Some(aggregates)))
}

fn write_reports(
    args: &Args,
    results: &[logic::ScenarioResult],
    playability_records: Option<&[PlayabilityRecord]>,
    playability_aggregates: Option<&[PlayabilityAggregate]>,
    start_time: Instant,
) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(&mut output_target, "[]")?;
            } else {
                logic::reports::generate_json_report(&mut output_target, results)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# LedgerQuest Logic Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        "csv" => {
            if let Some(records) = playability_records {
                logic::reports::generate_csv_report(&mut output_target, records)?;
            } else {
                writeln!(&mut output_target, "[]")?;
            }
        }
        _ => {
            let duration = start_time.elapsed();
            if results.is_empty() {
                writeln!(&mut output_target, "No logic scenarios executed.")?;
            } else if let Some(aggregates) = playability_aggregates {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    aggregates,
                    duration,
                )?;
            } else {
                writeln!(&mut output_target, "Playability data unavailable.")?;
            }
        }
    }

    let duration = start_time.elapsed();
    writeln!(&mut output_target)?;
    writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{GameplayStrategy, ScenarioResult};
    use ledgerquest_game::Grade;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ledgerquest-{}-{name}", std::process::id()))
    }

    fn base_args() -> Args {
        Args {
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            report: "json".to_string(),
            config: None,
            records: None,
            user: "qa-bot".to_string(),
            list_records: false,
            verbose: false,
            output: None,
        }
    }

    fn tester() -> GameTester {
        GameTester::new(Arc::new(TesterAssets::bundled().unwrap()), false)
    }

    fn sample_record() -> PlayabilityRecord {
        PlayabilityRecord {
            strategy: GameplayStrategy::Saver,
            seed: 42,
            grade: Grade::A,
            final_balance: 41_250,
            correct_answers: 6,
            total_questions: 6,
            insurance_lapses: 0,
            rejected_commands: 0,
        }
    }

    fn sample_aggregate() -> PlayabilityAggregate {
        PlayabilityAggregate {
            strategy: GameplayStrategy::Saver,
            iterations: 1,
            grade_counts: BTreeMap::from([(Grade::A, 1)]),
            mean_balance: 41_250.0,
            std_balance: 0.0,
            min_balance: 41_250,
            max_balance: 41_250,
            mean_correct: 6.0,
            questions_per_game: 6,
            lapse_rate: 0.0,
        }
    }

    fn sample_result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "Smoke Test".to_string(),
            seed: 1337,
            passed,
            iterations_run: 3,
            successful_iterations: if passed { 3 } else { 2 },
            failures: if passed {
                Vec::new()
            } else {
                vec!["failure".to_string()]
            },
            average_duration: Duration::from_millis(10),
            performance_data: vec![Duration::from_millis(10)],
        }
    }

    #[test]
    fn expands_all_scenarios_keyword() {
        let expanded = expand_scenarios("smoke,all");
        assert_eq!(expanded.first().map(String::as_str), Some("smoke"));
        assert_eq!(expanded.len(), list_scenarios().len());
        assert!(expanded.contains(&"ledger-integrity".to_string()));
    }

    #[test]
    fn expand_scenarios_without_all_preserves_order() {
        let expanded = expand_scenarios("quiz,smoke");
        assert_eq!(expanded, vec!["quiz".to_string(), "smoke".to_string()]);
    }

    #[test]
    fn run_logic_scenarios_skips_unknown_names() {
        let args = base_args();
        let results = run_logic_scenarios(
            &args,
            &["smoke".to_string(), "not-a-scenario".to_string()],
            &[7],
            &tester(),
        );
        assert_eq!(results.len(), 1);
        assert!(results[0].passed, "{:?}", results[0].failures);
    }

    #[test]
    fn gather_playability_only_for_console_and_csv() {
        let seeds = vec![SeedInfo::from_numeric(42)];
        let (records, aggregates) = gather_playability(&base_args(), &tester(), &seeds).unwrap();
        assert!(records.is_none());
        assert!(aggregates.is_none());

        let args = Args {
            report: "csv".to_string(),
            ..base_args()
        };
        let (records, aggregates) = gather_playability(&args, &tester(), &seeds).unwrap();
        assert_eq!(records.unwrap().len(), GameplayStrategy::ALL.len());
        assert_eq!(aggregates.unwrap().len(), GameplayStrategy::ALL.len());
    }

    #[test]
    fn maybe_list_scenarios_writes_output() {
        let temp = temp_file("scenarios.txt");
        let args = Args {
            list_scenarios: true,
            output: Some(temp.clone()),
            ..base_args()
        };
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Available scenarios"));
        assert!(content.contains("quiz-gate"));
    }

    #[test]
    fn maybe_list_scenarios_returns_false_when_disabled() {
        assert!(!maybe_list_scenarios(&base_args()).unwrap());
        assert!(!maybe_list_records(&base_args()).unwrap());
    }

    #[test]
    fn maybe_list_records_prints_empty_history() {
        let output = temp_file("records-listing.txt");
        let args = Args {
            list_records: true,
            records: Some(temp_file("missing-records.jsonl")),
            user: "nobody".to_string(),
            output: Some(output.clone()),
            ..base_args()
        };
        assert!(maybe_list_records(&args).unwrap());
        let content = std::fs::read_to_string(output).unwrap();
        assert!(content.contains("Game records for nobody"));
        assert!(content.contains("(none)"));
    }

    #[test]
    fn write_reports_emits_json_output() {
        let temp = temp_file("empty-report.json");
        let args = Args {
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], None, None, Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("[]"));
    }

    #[test]
    fn write_reports_markdown_empty_results() {
        let temp = temp_file("empty-report.md");
        let args = Args {
            report: "markdown".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], None, None, Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("No scenarios executed"));
    }

    #[test]
    fn write_reports_emits_markdown_report() {
        let temp = temp_file("report.md");
        let args = Args {
            report: "markdown".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(false)], None, None, Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("# LedgerQuest Logic Test Results"));
        assert!(content.contains("Smoke Test"));
    }

    #[test]
    fn write_reports_emits_json_for_results() {
        let temp = temp_file("report.json");
        let args = Args {
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(true)], None, None, Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("scenario_name"));
    }

    #[test]
    fn write_reports_emits_csv_report() {
        let temp = temp_file("report.csv");
        let args = Args {
            report: "csv".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Some(&[sample_record()]), None, Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.starts_with("strategy,seed,grade"));
        assert!(content.contains("Saver,42,A,41250"));
    }

    #[test]
    fn write_reports_emits_console_report_with_playability() {
        let temp = temp_file("report-console.txt");
        let args = Args {
            report: "console".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(
            &args,
            &[sample_result(true)],
            None,
            Some(&[sample_aggregate()]),
            Instant::now(),
        )
        .unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Playability Summary"));
    }

    #[test]
    fn write_reports_console_without_playability() {
        let temp = temp_file("report.txt");
        let args = Args {
            report: "console".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(true)], None, None, Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Playability data unavailable"));
    }

    #[test]
    fn output_target_stdout_writes() {
        let mut target = OutputTarget::new(None).unwrap();
        target.write_all(b"ok").unwrap();
        target.flush().unwrap();
    }

    #[test]
    fn args_parse_record_options() {
        let args = Args::try_parse_from([
            "ledgerquest-tester",
            "--records",
            "games.jsonl",
            "--list-records",
            "--user",
            "alice",
        ])
        .unwrap();
        assert!(args.list_records);
        assert_eq!(args.user, "alice");
        assert!(Args::try_parse_from(["ledgerquest-tester", "--list-records"]).is_err());
    }
}
