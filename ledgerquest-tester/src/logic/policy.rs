use std::fmt;

use ledgerquest_game::{GameData, GameSession, InvestmentAction, QuizQuestion};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Serialize, Serializer};

/// Quiz answer returned by a [`PlayerPolicy`]
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    pub option_id: String,
    pub rationale: Option<String>,
}

impl PolicyDecision {
    #[must_use]
    pub fn new(option_id: impl Into<String>, rationale: Option<String>) -> Self {
        Self {
            option_id: option_id.into(),
            rationale,
        }
    }
}

/// Policy interface for automated play strategies.
///
/// The runner asks for money moves first, then purchases against the balance
/// left over, then event draws, then quiz answers.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Investment option ids to attempt this round, in order.
    fn money_moves(&mut self, session: &GameSession, data: &GameData) -> Vec<String>;

    /// Optional expense ids to attempt this round, in order.
    fn purchases(&mut self, session: &GameSession, data: &GameData) -> Vec<String>;

    /// How many events to draw this round.
    fn event_draws(&mut self, session: &GameSession) -> u8;

    /// Select an answer for a sampled quiz question.
    fn answer(&mut self, question: &QuizQuestion) -> PolicyDecision;
}

/// Built-in gameplay strategies for automated runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameplayStrategy {
    Saver,
    Spender,
    Investor,
    Random,
}

impl GameplayStrategy {
    pub const ALL: [Self; 4] = [Self::Saver, Self::Spender, Self::Investor, Self::Random];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            GameplayStrategy::Saver => "Saver",
            GameplayStrategy::Spender => "Spender",
            GameplayStrategy::Investor => "Investor",
            GameplayStrategy::Random => "Random",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn PlayerPolicy + Send> {
        match self {
            GameplayStrategy::Saver => Box::new(SaverPolicy),
            GameplayStrategy::Spender => Box::new(SpenderPolicy),
            GameplayStrategy::Investor => Box::new(InvestorPolicy),
            GameplayStrategy::Random => Box::new(RandomPolicy::new(seed)),
        }
    }
}

impl Serialize for GameplayStrategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl fmt::Display for GameplayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct SaverPolicy;
struct SpenderPolicy;
struct InvestorPolicy;

struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

/// Ids of the catalog options with the given actions that are still open.
fn open_moves(session: &GameSession, data: &GameData, wanted: &[InvestmentAction]) -> Vec<String> {
    wanted
        .iter()
        .filter_map(|action| data.investments.iter().find(|opt| opt.action == *action))
        .filter(|opt| !(opt.one_time && session.has_taken(&opt.id)))
        .map(|opt| opt.id.clone())
        .collect()
}

fn correct_answer(question: &QuizQuestion) -> PolicyDecision {
    PolicyDecision::new(question.correct_option_id.clone(), Some("knows it".to_string()))
}

impl PlayerPolicy for SaverPolicy {
    fn name(&self) -> &'static str {
        "Saver"
    }

    fn money_moves(&mut self, session: &GameSession, data: &GameData) -> Vec<String> {
        open_moves(
            session,
            data,
            &[InvestmentAction::Course, InvestmentAction::Insurance],
        )
    }

    fn purchases(&mut self, _session: &GameSession, _data: &GameData) -> Vec<String> {
        Vec::new()
    }

    fn event_draws(&mut self, session: &GameSession) -> u8 {
        session.event_draws_remaining
    }

    fn answer(&mut self, question: &QuizQuestion) -> PolicyDecision {
        correct_answer(question)
    }
}

impl PlayerPolicy for SpenderPolicy {
    fn name(&self) -> &'static str {
        "Spender"
    }

    fn money_moves(&mut self, _session: &GameSession, _data: &GameData) -> Vec<String> {
        Vec::new()
    }

    fn purchases(&mut self, session: &GameSession, data: &GameData) -> Vec<String> {
        let mut budget = session.balance;
        data.optional_expenses
            .iter()
            .filter(|item| !session.has_purchased(&item.id))
            .filter(|item| {
                let affordable = item.cost <= budget;
                if affordable {
                    budget -= item.cost;
                }
                affordable
            })
            .map(|item| item.id.clone())
            .collect()
    }

    fn event_draws(&mut self, session: &GameSession) -> u8 {
        session.event_draws_remaining
    }

    fn answer(&mut self, question: &QuizQuestion) -> PolicyDecision {
        correct_answer(question)
    }
}

impl PlayerPolicy for InvestorPolicy {
    fn name(&self) -> &'static str {
        "Investor"
    }

    fn money_moves(&mut self, session: &GameSession, data: &GameData) -> Vec<String> {
        open_moves(
            session,
            data,
            &[
                InvestmentAction::Course,
                InvestmentAction::EmergencyFund,
                InvestmentAction::Insurance,
            ],
        )
    }

    fn purchases(&mut self, _session: &GameSession, _data: &GameData) -> Vec<String> {
        Vec::new()
    }

    fn event_draws(&mut self, session: &GameSession) -> u8 {
        session.event_draws_remaining.min(1)
    }

    fn answer(&mut self, question: &QuizQuestion) -> PolicyDecision {
        correct_answer(question)
    }
}

impl PlayerPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn money_moves(&mut self, _session: &GameSession, data: &GameData) -> Vec<String> {
        data.investments
            .iter()
            .filter(|_| self.rng.gen_bool(0.3))
            .map(|opt| opt.id.clone())
            .collect()
    }

    fn purchases(&mut self, _session: &GameSession, data: &GameData) -> Vec<String> {
        data.optional_expenses
            .iter()
            .filter(|_| self.rng.gen_bool(0.4))
            .map(|item| item.id.clone())
            .collect()
    }

    fn event_draws(&mut self, session: &GameSession) -> u8 {
        self.rng.gen_range(0..=session.event_draws_remaining)
    }

    fn answer(&mut self, question: &QuizQuestion) -> PolicyDecision {
        let option_id = question
            .options
            .choose(&mut self.rng)
            .map_or_else(|| question.correct_option_id.clone(), |o| o.id.clone());
        PolicyDecision::new(option_id, Some("guess".to_string()))
    }
}
