//! Engine tuning configuration.
use serde::{Deserialize, Serialize};

use crate::constants::{
    BASE_SALARY, COURSE_COST, COURSE_SAVINGS_BONUS_PCT, EMERGENCY_FUND_TARGET_AMOUNT,
    GAME_LOG_CAPACITY, INSURANCE_MONTHLY_PREMIUM, INSURANCE_POSITIVE_BIAS,
    MAX_EVENT_DRAWS_PER_ROUND, QUIZ_QUESTIONS_PER_ROUND, QUIZ_REWARD_PER_CORRECT_ANSWER,
    TOTAL_ROUNDS,
};
use crate::error::ConfigError;
use crate::grade::GradeConfig;

/// Largest accepted value for any money setting. Keeps round totals far from
/// `i64` overflow.
pub const MAX_MONEY_SETTING: i64 = 1_000_000_000;

/// Money and pacing values used by [`crate::FinanceEngine`].
///
/// Missing JSON fields fall back to the compiled-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub total_rounds: u8,
    pub base_salary: i64,
    pub insurance_premium: i64,
    /// Probability that an insured draw is limited to positive events.
    pub insurance_positive_bias: f64,
    pub course_cost: i64,
    /// Salary bonus granted by the course, in percent.
    pub course_bonus_pct: u8,
    pub emergency_fund_amount: i64,
    pub max_event_draws: u8,
    pub quiz_questions_per_round: usize,
    pub quiz_reward: i64,
    pub log_capacity: usize,
    pub grading: GradeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            total_rounds: TOTAL_ROUNDS,
            base_salary: BASE_SALARY,
            insurance_premium: INSURANCE_MONTHLY_PREMIUM,
            insurance_positive_bias: INSURANCE_POSITIVE_BIAS,
            course_cost: COURSE_COST,
            course_bonus_pct: COURSE_SAVINGS_BONUS_PCT,
            emergency_fund_amount: EMERGENCY_FUND_TARGET_AMOUNT,
            max_event_draws: MAX_EVENT_DRAWS_PER_ROUND,
            quiz_questions_per_round: QUIZ_QUESTIONS_PER_ROUND,
            quiz_reward: QUIZ_REWARD_PER_CORRECT_ANSWER,
            log_capacity: GAME_LOG_CAPACITY,
            grading: GradeConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON config and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check that the values can drive a game.
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_min("total_rounds", i64::from(self.total_rounds), 1)?;
        ensure_min("max_event_draws", i64::from(self.max_event_draws), 1)?;
        ensure_min(
            "quiz_questions_per_round",
            i64::try_from(self.quiz_questions_per_round).unwrap_or(i64::MAX),
            1,
        )?;
        ensure_min(
            "log_capacity",
            i64::try_from(self.log_capacity).unwrap_or(i64::MAX),
            1,
        )?;
        for (field, value) in [
            ("base_salary", self.base_salary),
            ("insurance_premium", self.insurance_premium),
            ("course_cost", self.course_cost),
            ("emergency_fund_amount", self.emergency_fund_amount),
            ("quiz_reward", self.quiz_reward),
        ] {
            ensure_min(field, value, 0)?;
            ensure_max(field, value, MAX_MONEY_SETTING)?;
        }
        if !(0.0..=1.0).contains(&self.insurance_positive_bias) {
            return Err(ConfigError::ProbabilityOutOfRange {
                field: "insurance_positive_bias",
                value: self.insurance_positive_bias,
            });
        }
        Ok(())
    }

    /// Salary credited each round, including the course bonus when active.
    #[must_use]
    pub fn round_income(&self, bonus_pct: u8) -> (i64, i64) {
        let bonus = self.base_salary.saturating_mul(i64::from(bonus_pct)) / 100;
        (self.base_salary, bonus)
    }

    /// Number of quiz questions a full game asks.
    #[must_use]
    pub fn total_quiz_questions(&self) -> u32 {
        u32::from(self.total_rounds)
            * u32::try_from(self.quiz_questions_per_round).unwrap_or(u32::MAX)
    }
}

const fn ensure_min(field: &'static str, value: i64, min: i64) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::BelowMinimum { field, min, value });
    }
    Ok(())
}

const fn ensure_max(field: &'static str, value: i64, max: i64) -> Result<(), ConfigError> {
    if value > max {
        return Err(ConfigError::AboveMaximum { field, max, value });
    }
    Ok(())
}
