use crate::logic::{GameplayStrategy, SimulationPlan};

pub mod catalog;
pub mod full_game;
pub mod playability;
pub mod smoke;

/// Named plan the logic tester runs across seeds and iterations.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SimulationPlan,
}

impl TestScenario {
    #[must_use]
    pub fn simulation(name: impl Into<String>, plan: SimulationPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    match name.to_lowercase().as_str() {
        "smoke" => Some(smoke::smoke_scenario()),
        "full-game-saver" | "saver" => Some(full_game::full_game_scenario(GameplayStrategy::Saver)),
        "full-game-spender" | "spender" => {
            Some(full_game::full_game_scenario(GameplayStrategy::Spender))
        }
        "full-game-investor" | "investor" => {
            Some(full_game::full_game_scenario(GameplayStrategy::Investor))
        }
        "full-game-random" | "random" => {
            Some(full_game::full_game_scenario(GameplayStrategy::Random))
        }
        "deterministic" | "deterministic-verification" => {
            Some(playability::deterministic_verification_scenario())
        }
        "insurance-lapse" | "lapse" => Some(catalog::insurance_lapse_scenario()),
        "quiz-gate" | "quiz" => Some(catalog::quiz_gate_scenario()),
        "ledger-integrity" | "ledger" => Some(catalog::ledger_integrity_scenario()),
        _ => None,
    }
}

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("smoke", "Smoke Test"),
        ("full-game-saver", "Full Game - Saver Strategy"),
        ("full-game-spender", "Full Game - Spender Strategy"),
        ("full-game-investor", "Full Game - Investor Strategy"),
        ("full-game-random", "Full Game - Random Strategy"),
        ("deterministic", "Deterministic Playthrough Verification"),
        ("insurance-lapse", "Insurance Lapse Handling"),
        ("quiz-gate", "Quiz Gate Before Advancing"),
        ("ledger-integrity", "Ledger Integrity"),
    ]
}
