use anyhow::{Context, Result, anyhow, ensure};
use ledgerquest_game::{CommandError, EngineConfig, FinanceEngine, NoticeBuffer, Outcome};

use super::TestScenario;
use crate::logic::game_tester::SimulationSummary;
use crate::logic::{GameplayStrategy, SimulationPlan};

pub fn insurance_lapse_scenario() -> TestScenario {
    TestScenario::simulation(
        "Insurance Lapse Handling",
        SimulationPlan::new(GameplayStrategy::Saver)
            .with_setup(unaffordable_premium)
            .with_expectation(insurance_lapse_expectation),
    )
}

pub fn quiz_gate_scenario() -> TestScenario {
    TestScenario::simulation(
        "Quiz Gate Before Advancing",
        SimulationPlan::new(GameplayStrategy::Random).with_expectation(quiz_gate_expectation),
    )
}

pub fn ledger_integrity_scenario() -> TestScenario {
    TestScenario::simulation(
        "Ledger Integrity",
        SimulationPlan::new(GameplayStrategy::Spender).with_expectation(ledger_expectation),
    )
}

fn unaffordable_premium(cfg: &mut EngineConfig) {
    cfg.insurance_premium = cfg.base_salary.saturating_mul(10).max(1_000_000);
    cfg.total_rounds = cfg.total_rounds.max(2);
}

fn insurance_lapse_expectation(summary: &SimulationSummary) -> Result<()> {
    let session = &summary.final_session;
    let later_rounds: Vec<bool> = summary
        .commands
        .iter()
        .filter_map(|outcome| match outcome {
            Outcome::RoundStarted {
                round,
                insurance_lapsed,
                ..
            } if *round > 1 => Some(*insurance_lapsed),
            _ => None,
        })
        .collect();
    ensure!(!later_rounds.is_empty(), "game never reached round 2");
    ensure!(
        later_rounds.iter().all(|lapsed| *lapsed),
        "an unaffordable premium was paid: {later_rounds:?}"
    );
    ensure!(
        usize::try_from(session.insurance_lapses).ok() == Some(later_rounds.len()),
        "expected {} lapses, session counts {}",
        later_rounds.len(),
        session.insurance_lapses
    );
    ensure!(
        summary.has_notice("Insurance lapsed"),
        "no lapse notice was sent"
    );
    ensure!(
        session.has_insurance == session.has_taken("insurance"),
        "insurance flag and one-time list disagree"
    );
    Ok(())
}

fn expect_rejection(result: Result<Outcome, CommandError>, expected: &CommandError) -> Result<()> {
    match result {
        Err(err) if err == *expected => Ok(()),
        Err(err) => Err(anyhow!("expected {expected}, got {err}")),
        Ok(outcome) => Err(anyhow!("expected {expected}, command succeeded: {outcome:?}")),
    }
}

/// Drives a fresh engine for the same seed through the quiz gate by hand.
fn quiz_gate_expectation(summary: &SimulationSummary) -> Result<()> {
    ensure!(
        summary.rejections_of("advance_round") == 0,
        "runner was refused an advance after submitting"
    );

    let mut engine = FinanceEngine::seeded(summary.seed)
        .context("failed to build replay engine")?
        .with_notifier(NoticeBuffer::new());
    engine.start_game().context("replay engine could not start")?;
    expect_rejection(engine.advance_round(), &CommandError::QuizIncomplete)?;

    let answers: Vec<(String, String)> = engine
        .session()
        .quiz
        .questions
        .iter()
        .map(|q| (q.id.clone(), q.correct_option_id.clone()))
        .collect();
    let ((first_q, first_o), rest) = answers
        .split_first()
        .ok_or_else(|| anyhow!("round one sampled no questions"))?;

    engine.answer_quiz(first_q, first_o)?;
    if !rest.is_empty() {
        expect_rejection(engine.submit_quiz(), &CommandError::QuizIncomplete)?;
        expect_rejection(engine.advance_round(), &CommandError::QuizIncomplete)?;
    }
    for (question, option) in rest {
        engine.answer_quiz(question, option)?;
    }
    engine.submit_quiz()?;
    expect_rejection(engine.submit_quiz(), &CommandError::QuizAlreadySubmitted)?;
    expect_rejection(
        engine.answer_quiz(first_q, first_o),
        &CommandError::QuizAlreadySubmitted,
    )?;
    engine.advance_round()?;
    ensure!(engine.session().round == 2, "advance after submit did not move on");
    Ok(())
}

/// Replays the balance from each outcome's own numbers.
fn ledger_expectation(summary: &SimulationSummary) -> Result<()> {
    let mut running: Option<i64> = None;
    for (step, outcome) in summary.commands.iter().enumerate() {
        let previous = || running.with_context(|| format!("step {step} ran before any round"));
        match outcome {
            Outcome::RoundStarted { balance, .. } => running = Some(*balance),
            Outcome::Purchased { cost, balance, .. } | Outcome::Invested { cost, balance, .. } => {
                let before = previous()?;
                ensure!(
                    before - cost == *balance,
                    "step {step}: {before} - {cost} reported as {balance}"
                );
                running = Some(*balance);
            }
            Outcome::EventDrawn { event, balance, .. } => {
                let before = previous()?;
                ensure!(
                    before + event.effect == *balance,
                    "step {step}: {before} + {} reported as {balance}",
                    event.effect
                );
                running = Some(*balance);
            }
            Outcome::QuizGraded { reward, .. } => running = Some(previous()? + reward),
            Outcome::GameFinished { balance, .. } => {
                let before = previous()?;
                ensure!(before == *balance, "game finished at {balance}, ledger says {before}");
            }
            Outcome::AnswerRecorded { .. } | Outcome::Restarted => {}
        }
    }

    let session = &summary.final_session;
    ensure!(
        running == Some(session.balance),
        "replayed balance {running:?} differs from final {}",
        session.balance
    );
    ensure!(
        session.ledger_total == session.balance,
        "ledger total {} differs from balance {}",
        session.ledger_total,
        session.balance
    );
    Ok(())
}
