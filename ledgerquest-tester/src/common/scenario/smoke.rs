use anyhow::{Result, ensure};

use super::TestScenario;
use crate::logic::game_tester::SimulationSummary;
use crate::logic::{GameplayStrategy, SimulationPlan};

pub fn smoke_scenario() -> TestScenario {
    TestScenario::simulation(
        "Smoke Test",
        SimulationPlan::new(GameplayStrategy::Saver).with_expectation(smoke_expectation),
    )
}

fn smoke_expectation(summary: &SimulationSummary) -> Result<()> {
    let session = &summary.final_session;
    ensure!(session.is_over, "game should be over after the last round");
    ensure!(session.final_grade.is_some(), "finished game has no grade");
    ensure!(session.round >= 1, "game never left round 0");
    ensure!(!session.log.is_empty(), "game log is empty");
    ensure!(
        session.ledger_total == session.balance,
        "ledger total {} differs from balance {}",
        session.ledger_total,
        session.balance
    );
    ensure!(
        summary.has_notice("Quiz results"),
        "no quiz result notice was sent"
    );
    Ok(())
}
