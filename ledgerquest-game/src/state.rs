//! Session state owned by [`crate::FinanceEngine`].
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::constants::GAME_LOG_CAPACITY;
use crate::data::{QuizQuestion, RandomEvent};
use crate::grade::Grade;

/// Where the session sits in the round lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundPhase {
    #[default]
    NotStarted,
    InRound(u8),
    Over,
}

/// Most-recent-first round log with a fixed capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl GameLog {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Prepend an entry tagged with the round it happened in.
    pub fn push(&mut self, round: u8, message: impl AsRef<str>) {
        let round = round.max(1);
        self.entries
            .push_front(format!("[Round {round}] {}", message.as_ref()));
        self.entries.truncate(self.capacity);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    #[must_use]
    pub fn latest(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for GameLog {
    fn default() -> Self {
        Self::with_capacity(GAME_LOG_CAPACITY)
    }
}

/// Outcome for one question of a submitted quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub question_id: String,
    pub selected_option_id: Option<String>,
    pub correct_option_id: String,
    pub is_correct: bool,
}

/// The quiz sampled for the current round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizRound {
    pub questions: SmallVec<[QuizQuestion; 2]>,
    /// Selected option per question id.
    pub answers: BTreeMap<String, String>,
    pub submitted: bool,
    pub results: Option<Vec<QuizResult>>,
}

impl QuizRound {
    #[must_use]
    pub fn with_questions(questions: impl IntoIterator<Item = QuizQuestion>) -> Self {
        Self {
            questions: questions.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn question(&self, question_id: &str) -> Option<&QuizQuestion> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Every sampled question has an answer.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.questions
            .iter()
            .all(|q| self.answers.contains_key(&q.id))
    }

    /// Questions were sampled but the round has not been graded yet.
    #[must_use]
    pub fn awaiting_submission(&self) -> bool {
        !self.questions.is_empty() && !self.submitted
    }
}

/// One entry in the whole-session quiz review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub round: u8,
    pub question: QuizQuestion,
    pub selected_option_id: Option<String>,
    pub is_correct: bool,
}

/// Complete mutable state of one play-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub phase: RoundPhase,
    pub round: u8,
    pub balance: i64,
    /// Salary bonus in percent; 0 until the course is taken.
    pub savings_bonus_pct: u8,
    pub has_insurance: bool,
    /// One-time actions taken, in the order they happened.
    pub investments_taken: SmallVec<[String; 4]>,
    pub optional_purchases: BTreeSet<String>,
    pub event_draws_remaining: u8,
    pub last_drawn_event: Option<RandomEvent>,
    pub quiz: QuizRound,
    pub cumulative_correct: u32,
    pub answered_questions: Vec<AnsweredQuestion>,
    pub log: GameLog,
    pub is_over: bool,
    pub final_grade: Option<Grade>,
    /// Running sum of every balance change applied since the game started.
    pub ledger_total: i64,
    pub insurance_lapses: u32,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new(GAME_LOG_CAPACITY)
    }
}

impl GameSession {
    /// Fresh `NotStarted` session.
    #[must_use]
    pub fn new(log_capacity: usize) -> Self {
        Self {
            phase: RoundPhase::NotStarted,
            round: 0,
            balance: 0,
            savings_bonus_pct: 0,
            has_insurance: false,
            investments_taken: SmallVec::new(),
            optional_purchases: BTreeSet::new(),
            event_draws_remaining: 0,
            last_drawn_event: None,
            quiz: QuizRound::default(),
            cumulative_correct: 0,
            answered_questions: Vec::new(),
            log: GameLog::with_capacity(log_capacity),
            is_over: false,
            final_grade: None,
            ledger_total: 0,
            insurance_lapses: 0,
        }
    }

    #[must_use]
    pub const fn is_in_round(&self) -> bool {
        matches!(self.phase, RoundPhase::InRound(_))
    }

    #[must_use]
    pub fn has_purchased(&self, expense_id: &str) -> bool {
        self.optional_purchases.contains(expense_id)
    }

    #[must_use]
    pub fn has_taken(&self, option_id: &str) -> bool {
        self.investments_taken.iter().any(|id| id == option_id)
    }

    /// Questions answered incorrectly over the whole session, oldest first.
    pub fn missed_questions(&self) -> impl Iterator<Item = &AnsweredQuestion> {
        self.answered_questions.iter().filter(|q| !q.is_correct)
    }

    /// Quiz questions asked so far; every played round contributes its full quiz.
    #[must_use]
    pub fn total_questions(&self) -> u32 {
        u32::try_from(self.answered_questions.len()).unwrap_or(u32::MAX)
    }

    /// Apply a balance change and record it on the ledger.
    pub(crate) fn post(&mut self, delta: i64) {
        self.balance = self.balance.saturating_add(delta);
        self.ledger_total = self.ledger_total.saturating_add(delta);
    }
}
