//! End-of-game grading
use serde::{Deserialize, Serialize};

use crate::constants::{
    GRADE_A_MIN_BALANCE_EXCLUSIVE, GRADE_A_MIN_CORRECT, GRADE_B_MIN_BALANCE_EXCLUSIVE,
    GRADE_B_MIN_CORRECT, GRADE_S_MIN_BALANCE_EXCLUSIVE, GRADE_S_MIN_CORRECT_EXCLUSIVE,
};

/// Final grade awarded when the last round is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
}

impl Grade {
    /// Short praise shown next to the letter.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::S => "Money Master",
            Self::A => "Excellent",
            Self::B => "Pretty Good",
            Self::C => "Keep Practicing",
        }
    }

    /// Letter and label, e.g. `S (Money Master)`.
    #[must_use]
    pub fn headline(self) -> String {
        format!("{self} ({})", self.label())
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::S => write!(f, "S"),
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
        }
    }
}

/// One row of the grading table. Both bounds are checked together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeTier {
    pub grade: Grade,
    /// Correct answers must be at least this many.
    pub min_correct: u32,
    /// Balance must be strictly greater than this.
    pub balance_above: i64,
}

/// Grading thresholds, evaluated top-down; the first matching tier wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeConfig {
    pub tiers: Vec<GradeTier>,
    pub fallback: Grade,
}

impl Default for GradeConfig {
    fn default() -> Self {
        Self {
            tiers: vec![
                GradeTier {
                    grade: Grade::S,
                    min_correct: GRADE_S_MIN_CORRECT_EXCLUSIVE + 1,
                    balance_above: GRADE_S_MIN_BALANCE_EXCLUSIVE,
                },
                GradeTier {
                    grade: Grade::A,
                    min_correct: GRADE_A_MIN_CORRECT,
                    balance_above: GRADE_A_MIN_BALANCE_EXCLUSIVE,
                },
                GradeTier {
                    grade: Grade::B,
                    min_correct: GRADE_B_MIN_CORRECT,
                    balance_above: GRADE_B_MIN_BALANCE_EXCLUSIVE,
                },
            ],
            fallback: Grade::C,
        }
    }
}

/// Grade a finished game from its quiz total and closing balance.
#[must_use]
pub fn compute_grade(cfg: &GradeConfig, correct_answers: u32, balance: i64) -> Grade {
    cfg.tiers
        .iter()
        .find(|tier| correct_answers >= tier.min_correct && balance > tier.balance_above)
        .map_or(cfg.fallback, |tier| tier.grade)
}
