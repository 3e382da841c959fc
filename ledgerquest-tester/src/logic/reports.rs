use anyhow::Result;
use colored::Colorize;
use ledgerquest_game::numbers::format_money;
use ledgerquest_game::{GameSummaryRecord, Grade};
use std::io::Write;
use std::time::Duration;

use super::ScenarioResult;
use super::playability::{PlayabilityAggregate, PlayabilityRecord};

const GRADES: [Grade; 4] = [Grade::S, Grade::A, Grade::B, Grade::C];

fn success_rate(passed: usize, total: usize) -> f64 {
    ledgerquest_game::numbers::ratio(passed, total) * 100.0
}

pub fn generate_console_report(
    out: &mut dyn Write,
    results: &[ScenarioResult],
    aggregates: &[PlayabilityAggregate],
    total_duration: Duration,
) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Logic Test Results Summary".bright_cyan().bold())?;
    writeln!(out, "{}", "==============================".cyan())?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();
    let failed_tests = total_tests - passed_tests;

    writeln!(out, "Total scenarios: {total_tests}")?;
    writeln!(out, "Passed: {}", passed_tests.to_string().green())?;
    writeln!(out, "Failed: {}", failed_tests.to_string().red())?;
    writeln!(
        out,
        "Success rate: {:.1}%",
        success_rate(passed_tests, total_tests)
    )?;
    writeln!(out, "Total time: {total_duration:?}")?;
    writeln!(out)?;

    for result in results {
        let status = if result.passed {
            "✅ PASS".green()
        } else {
            "❌ FAIL".red()
        };

        writeln!(
            out,
            "{} {} (seed {})",
            status,
            result.scenario_name.bold(),
            result.seed
        )?;
        writeln!(
            out,
            "   Iterations: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "   Average time: {:?}", result.average_duration)?;

        if !result.failures.is_empty() {
            writeln!(out, "   Failures:")?;
            for failure in &result.failures {
                writeln!(out, "     • {}", failure.red())?;
            }
        }
        writeln!(out)?;
    }

    let fastest = results.iter().min_by_key(|r| r.average_duration);
    let slowest = results.iter().max_by_key(|r| r.average_duration);
    if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
        writeln!(out, "{}", "⚡ Performance Summary".bright_yellow().bold())?;
        writeln!(out, "{}", "=====================".yellow())?;
        writeln!(
            out,
            "Fastest: {} ({:?})",
            fastest.scenario_name.green(),
            fastest.average_duration
        )?;
        writeln!(
            out,
            "Slowest: {} ({:?})",
            slowest.scenario_name.yellow(),
            slowest.average_duration
        )?;
        writeln!(out)?;
    }

    if !aggregates.is_empty() {
        writeln!(out, "{}", "🎲 Playability Summary".bright_magenta().bold())?;
        writeln!(out, "{}", "======================".magenta())?;
        for aggregate in aggregates {
            writeln!(
                out,
                "{} ({} games): balance mean {} (σ {:.0}) min {} max {} | correct {:.2}/{} | lapses {:.0}%",
                aggregate.strategy.to_string().bold(),
                aggregate.iterations,
                format_money(whole_money(aggregate.mean_balance)),
                aggregate.std_balance,
                format_money(aggregate.min_balance),
                format_money(aggregate.max_balance),
                aggregate.mean_correct,
                aggregate.questions_per_game,
                aggregate.lapse_rate * 100.0
            )?;
            writeln!(out, "   Grades: {}", grade_breakdown(aggregate))?;
        }
    }

    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn whole_money(value: f64) -> i64 {
    value.round() as i64
}

fn grade_breakdown(aggregate: &PlayabilityAggregate) -> String {
    GRADES
        .iter()
        .map(|grade| format!("{grade} {:.0}%", aggregate.grade_share(*grade) * 100.0))
        .collect::<Vec<_>>()
        .join(" · ")
}

pub fn generate_json_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    let json_output = serde_json::to_string_pretty(results)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

pub fn generate_markdown_report(out: &mut dyn Write, results: &[ScenarioResult]) -> Result<()> {
    writeln!(out, "# LedgerQuest Logic Test Results\n")?;

    let total_tests = results.len();
    let passed_tests = results.iter().filter(|r| r.passed).count();
    let failed_tests = total_tests - passed_tests;

    writeln!(out, "## Summary\n")?;
    writeln!(out, "- **Total scenarios**: {total_tests}")?;
    writeln!(out, "- **Passed**: {passed_tests}")?;
    writeln!(out, "- **Failed**: {failed_tests}")?;
    writeln!(
        out,
        "- **Success rate**: {:.1}%\n",
        success_rate(passed_tests, total_tests)
    )?;

    writeln!(out, "## Detailed Results\n")?;

    for result in results {
        let status = if result.passed { "✅" } else { "❌" };

        writeln!(
            out,
            "### {} {} (seed {})\n",
            status, result.scenario_name, result.seed
        )?;
        writeln!(
            out,
            "- **Iterations**: {}/{} successful",
            result.successful_iterations, result.iterations_run
        )?;
        writeln!(out, "- **Average time**: {:?}", result.average_duration)?;

        if !result.failures.is_empty() {
            writeln!(out, "- **Failures**:")?;
            for failure in &result.failures {
                writeln!(out, "  - {failure}")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn generate_csv_report(out: &mut dyn Write, records: &[PlayabilityRecord]) -> Result<()> {
    writeln!(
        out,
        "strategy,seed,grade,final_balance,correct_answers,total_questions,insurance_lapses,rejected_commands"
    )?;
    for record in records {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            record.strategy,
            record.seed,
            record.grade,
            record.final_balance,
            record.correct_answers,
            record.total_questions,
            record.insurance_lapses,
            record.rejected_commands
        )?;
    }
    Ok(())
}

/// A user's saved games, newest first.
pub fn generate_records_listing(
    out: &mut dyn Write,
    user: &str,
    records: &[GameSummaryRecord],
) -> Result<()> {
    writeln!(out, "Game records for {user}:")?;
    if records.is_empty() {
        writeln!(out, "  (none)")?;
        return Ok(());
    }
    for record in records {
        writeln!(
            out,
            "  {}  grade {}  balance {:>8}  correct {}/{}  rounds {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            record.grade,
            format_money(record.final_balance),
            record.total_correct,
            record.total_questions,
            record.rounds_completed
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::policy::GameplayStrategy;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "Smoke".to_string(),
            seed: 9,
            passed,
            iterations_run: 2,
            successful_iterations: if passed { 2 } else { 1 },
            failures: if passed {
                Vec::new()
            } else {
                vec!["Iteration 2: broke".to_string()]
            },
            average_duration: Duration::from_millis(4),
            performance_data: vec![Duration::from_millis(4)],
        }
    }

    fn aggregate() -> PlayabilityAggregate {
        PlayabilityAggregate {
            strategy: GameplayStrategy::Saver,
            iterations: 2,
            grade_counts: BTreeMap::from([(Grade::S, 1), (Grade::A, 1)]),
            mean_balance: 61_234.0,
            std_balance: 10.0,
            min_balance: 60_000,
            max_balance: 62_468,
            mean_correct: 6.0,
            questions_per_game: 6,
            lapse_rate: 0.0,
        }
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
        let mut buffer = Vec::new();
        f(&mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn console_report_lists_failures_and_playability() {
        let text = render(|out| {
            generate_console_report(
                out,
                &[result(true), result(false)],
                &[aggregate()],
                Duration::from_millis(20),
            )
        });
        assert!(text.contains("Success rate: 50.0%"));
        assert!(text.contains("Iteration 2: broke"));
        assert!(text.contains("Playability Summary"));
        assert!(text.contains("mean 61,234"));
        assert!(text.contains("S 50% · A 50% · B 0% · C 0%"));
    }

    #[test]
    fn markdown_report_has_sections() {
        let text = render(|out| generate_markdown_report(out, &[result(false)]));
        assert!(text.starts_with("# LedgerQuest Logic Test Results"));
        assert!(text.contains("### ❌ Smoke (seed 9)"));
        assert!(text.contains("  - Iteration 2: broke"));
    }

    #[test]
    fn json_report_round_trips() {
        let text = render(|out| generate_json_report(out, &[result(true)]));
        let parsed: Vec<ScenarioResult> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0].scenario_name, "Smoke");
        assert_eq!(parsed[0].average_duration, Duration::from_millis(4));
    }

    #[test]
    fn csv_report_has_header_and_rows() {
        let record = PlayabilityRecord {
            strategy: GameplayStrategy::Spender,
            seed: 4,
            grade: Grade::C,
            final_balance: -1_200,
            correct_answers: 6,
            total_questions: 6,
            insurance_lapses: 0,
            rejected_commands: 3,
        };
        let text = render(|out| generate_csv_report(out, &[record]));
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("strategy,seed,grade"));
        assert_eq!(lines[1], "Spender,4,C,-1200,6,6,0,3");
    }

    #[test]
    fn records_listing_formats_each_game() {
        let record = GameSummaryRecord {
            user_id: "qa".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            final_balance: 58_000,
            rounds_completed: 3,
            grade: Grade::A,
            total_correct: 4,
            total_questions: 6,
        };
        let text = render(|out| generate_records_listing(out, "qa", &[record]));
        assert!(text.contains("2026-03-01 09:30:00 UTC"));
        assert!(text.contains("grade A"));
        assert!(text.contains("58,000"));

        let empty = render(|out| generate_records_listing(out, "nobody", &[]));
        assert!(empty.contains("(none)"));
    }
}
