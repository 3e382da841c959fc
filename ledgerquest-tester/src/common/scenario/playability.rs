use anyhow::{Result, ensure};

use super::TestScenario;
use crate::logic::game_tester::{SimulationSummary, session_fingerprint};
use crate::logic::{GameplayStrategy, SimulationPlan};

pub fn deterministic_verification_scenario() -> TestScenario {
    TestScenario::simulation(
        "Deterministic Playthrough Verification",
        SimulationPlan::new(GameplayStrategy::Random)
            .with_replay()
            .with_expectation(deterministic_expectation),
    )
}

fn deterministic_expectation(summary: &SimulationSummary) -> Result<()> {
    let replay = summary
        .replay_fingerprint
        .ok_or_else(|| anyhow::anyhow!("plan did not replay the seed"))?;
    ensure!(
        replay == summary.fingerprint,
        "seed {} diverged on replay: {:016x} vs {:016x}",
        summary.seed,
        summary.fingerprint,
        replay
    );
    ensure!(
        session_fingerprint(&summary.final_session)? == summary.fingerprint,
        "fingerprint is not stable for the same session"
    );
    Ok(())
}
