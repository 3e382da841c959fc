//! Static reference catalogs: expenses, investment options, events and the quiz bank.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::DataError;

const DEFAULT_CATALOG_JSON: &str = include_str!("../assets/catalog.json");

/// A fixed or optional spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseItem {
    pub id: String,
    pub name: String,
    pub cost: i64,
}

/// What taking an investment option does to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentAction {
    /// Informational only
    FixedDeposit,
    /// Informational only
    Etf,
    EmergencyFund,
    Insurance,
    Course,
}

/// An entry in the investment menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestmentOption {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub action: InvestmentAction,
    #[serde(default)]
    pub cost: i64,
    /// Whether this option can only be taken once per session
    #[serde(default)]
    pub one_time: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Positive,
    Negative,
}

/// A random life event that shifts the balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomEvent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub effect: i64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: String,
    pub text: String,
}

/// A single-answer quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<QuizOption>,
    pub correct_option_id: String,
}

impl QuizQuestion {
    #[must_use]
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|opt| opt.id == option_id)
    }

    #[must_use]
    pub fn is_correct(&self, option_id: &str) -> bool {
        self.correct_option_id == option_id
    }
}

/// Container for all static catalogs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameData {
    pub necessary_expenses: Vec<ExpenseItem>,
    pub optional_expenses: Vec<ExpenseItem>,
    pub investments: Vec<InvestmentOption>,
    pub events: Vec<RandomEvent>,
    pub quiz_bank: Vec<QuizQuestion>,
}

impl GameData {
    /// Load the catalog bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded asset fails to parse or validate.
    pub fn load_default() -> Result<Self, DataError> {
        Self::from_json(DEFAULT_CATALOG_JSON)
    }

    /// Load catalog data from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or the catalog is inconsistent.
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let data: Self =
            serde_json::from_str(json).map_err(|err| DataError::Parse(err.to_string()))?;
        data.validate()?;
        Ok(data)
    }

    /// Check ids, answer keys and event signs.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), DataError> {
        unique_ids(
            "necessary_expenses",
            self.necessary_expenses.iter().map(|e| e.id.as_str()),
        )?;
        unique_ids(
            "optional_expenses",
            self.optional_expenses.iter().map(|e| e.id.as_str()),
        )?;
        unique_ids("investments", self.investments.iter().map(|o| o.id.as_str()))?;
        unique_ids("events", self.events.iter().map(|e| e.id.as_str()))?;
        unique_ids("quiz_bank", self.quiz_bank.iter().map(|q| q.id.as_str()))?;

        for question in &self.quiz_bank {
            if !question.has_option(&question.correct_option_id) {
                return Err(DataError::MissingCorrectOption {
                    question: question.id.clone(),
                    option: question.correct_option_id.clone(),
                });
            }
        }

        for event in &self.events {
            let sign_ok = match event.kind {
                EventKind::Positive => event.effect >= 0,
                EventKind::Negative => event.effect <= 0,
            };
            if !sign_ok {
                return Err(DataError::EventSignMismatch {
                    id: event.id.clone(),
                    effect: event.effect,
                });
            }
        }
        Ok(())
    }

    /// Ensure the quiz bank can fill a round of `per_round` distinct questions.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::QuizBankTooSmall`] when it cannot.
    pub fn ensure_quiz_capacity(&self, per_round: usize) -> Result<(), DataError> {
        if self.quiz_bank.len() < per_round {
            return Err(DataError::QuizBankTooSmall {
                available: self.quiz_bank.len(),
                required: per_round,
            });
        }
        Ok(())
    }

    /// Sum of the fixed expenses paid every round.
    #[must_use]
    pub fn necessary_total(&self) -> i64 {
        self.necessary_expenses.iter().map(|e| e.cost).sum()
    }

    #[must_use]
    pub fn find_optional(&self, expense_id: &str) -> Option<&ExpenseItem> {
        self.optional_expenses.iter().find(|e| e.id == expense_id)
    }

    #[must_use]
    pub fn find_investment(&self, option_id: &str) -> Option<&InvestmentOption> {
        self.investments.iter().find(|o| o.id == option_id)
    }

    /// Events that only ever add money.
    #[must_use]
    pub fn positive_events(&self) -> Vec<&RandomEvent> {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::Positive)
            .collect()
    }
}

fn unique_ids<'a>(
    catalog: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), DataError> {
    let mut seen = HashSet::new();
    let mut any = false;
    for id in ids {
        any = true;
        if !seen.insert(id) {
            return Err(DataError::DuplicateId {
                catalog,
                id: id.to_string(),
            });
        }
    }
    if any {
        Ok(())
    } else {
        Err(DataError::EmptyCatalog(catalog))
    }
}
