use anyhow::{Context, Result, ensure};
use ledgerquest_game::Outcome;

use super::TestScenario;
use crate::logic::game_tester::SimulationSummary;
use crate::logic::{GameplayStrategy, SimulationPlan};

pub fn full_game_scenario(strategy: GameplayStrategy) -> TestScenario {
    TestScenario::simulation(
        format!("Full Game - {strategy} Strategy"),
        full_game_plan(strategy),
    )
}

pub fn full_game_plan(strategy: GameplayStrategy) -> SimulationPlan {
    let plan = SimulationPlan::new(strategy).with_expectation(full_game_expectation);
    match strategy {
        GameplayStrategy::Saver => plan.with_expectation(saver_expectation),
        GameplayStrategy::Spender => plan.with_expectation(spender_expectation),
        GameplayStrategy::Investor => plan.with_expectation(investor_expectation),
        GameplayStrategy::Random => plan,
    }
}

/// The final outcome agrees with the session and the quiz totals add up.
pub fn full_game_expectation(summary: &SimulationSummary) -> Result<()> {
    let session = &summary.final_session;
    ensure!(session.is_over, "game did not finish");

    let Some(Outcome::GameFinished {
        grade,
        balance,
        correct_answers,
        ..
    }) = summary.commands.last()
    else {
        anyhow::bail!("last applied command did not finish the game");
    };
    let final_grade = session
        .final_grade
        .context("session is over but has no grade")?;
    ensure!(
        *grade == final_grade,
        "grade mismatch: outcome {grade}, session {final_grade}"
    );
    ensure!(*balance == session.balance, "final balance mismatch");
    ensure!(
        *correct_answers == session.cumulative_correct,
        "correct answer count mismatch"
    );

    let (graded_correct, graded_asked) = summary
        .commands
        .iter()
        .filter_map(|outcome| match outcome {
            Outcome::QuizGraded { correct, asked, .. } => Some((*correct, *asked)),
            _ => None,
        })
        .fold((0usize, 0usize), |(c, a), (correct, asked)| (c + correct, a + asked));
    ensure!(
        u32::try_from(graded_correct).ok() == Some(session.cumulative_correct),
        "graded {graded_correct} correct but session counts {}",
        session.cumulative_correct
    );
    ensure!(
        u32::try_from(graded_asked).ok() == Some(session.total_questions()),
        "asked {graded_asked} questions but {} were recorded",
        session.total_questions()
    );
    Ok(())
}

fn answered_everything(summary: &SimulationSummary) -> Result<()> {
    let session = &summary.final_session;
    ensure!(
        session.missed_questions().next().is_none(),
        "{} missed {} questions",
        summary.strategy,
        session.missed_questions().count()
    );
    Ok(())
}

fn saver_expectation(summary: &SimulationSummary) -> Result<()> {
    answered_everything(summary)?;
    ensure!(
        !summary
            .commands
            .iter()
            .any(|o| matches!(o, Outcome::Purchased { .. })),
        "saver bought an optional item"
    );
    ensure!(
        summary.final_session.has_taken("course"),
        "saver never took the course"
    );
    Ok(())
}

fn spender_expectation(summary: &SimulationSummary) -> Result<()> {
    answered_everything(summary)?;
    let purchases = summary
        .commands
        .iter()
        .filter(|o| matches!(o, Outcome::Purchased { .. }))
        .count();
    ensure!(purchases > 0, "spender never bought anything");
    ensure!(
        summary.rejections_of("purchase_optional") == 0,
        "spender tried to buy something it could not afford"
    );
    Ok(())
}

fn investor_expectation(summary: &SimulationSummary) -> Result<()> {
    answered_everything(summary)?;
    let session = &summary.final_session;
    ensure!(session.has_taken("course"), "investor never took the course");
    ensure!(
        session.has_taken("emergency_fund"),
        "investor never built an emergency fund"
    );
    ensure!(
        session.savings_bonus_pct > 0,
        "course bonus was not applied"
    );
    Ok(())
}
