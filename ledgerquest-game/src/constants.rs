//! Centralized balance and tuning constants for LedgerQuest game logic.
//!
//! These values define the deterministic money math for the simulation.
//! [`crate::config::EngineConfig::default`] is built from them, so a
//! deployment can only diverge by shipping an explicit config file.

// Logging keys -------------------------------------------------------------
pub(crate) const LOG_GAME_START: &str = "log.game.start";
pub(crate) const LOG_GAME_OVER: &str = "log.game.over";
pub(crate) const LOG_ROUND_START: &str = "log.round.start";
pub(crate) const LOG_ROUND_SALARY: &str = "log.round.salary";
pub(crate) const LOG_ROUND_EXPENSES: &str = "log.round.expenses";
pub(crate) const LOG_INSURANCE_PREMIUM: &str = "log.insurance.premium";
pub(crate) const LOG_INSURANCE_LAPSE: &str = "log.insurance.lapse";
pub(crate) const LOG_PURCHASE: &str = "log.purchase";
pub(crate) const LOG_PURCHASE_DENIED: &str = "log.purchase.denied";
pub(crate) const LOG_INVEST: &str = "log.invest";
pub(crate) const LOG_INVEST_DENIED: &str = "log.invest.denied";
pub(crate) const LOG_EVENT_DRAW: &str = "log.event.draw";
pub(crate) const LOG_QUIZ_SAMPLE: &str = "log.quiz.sample";
pub(crate) const LOG_QUIZ_GRADED: &str = "log.quiz.graded";
pub(crate) const LOG_PERSIST: &str = "log.persist";
pub(crate) const LOG_COMMAND_REJECTED: &str = "log.command.rejected";

// Round economy ------------------------------------------------------------
pub const TOTAL_ROUNDS: u8 = 3;
pub const BASE_SALARY: i64 = 35_000;
pub const INSURANCE_MONTHLY_PREMIUM: i64 = 500;
pub const COURSE_COST: i64 = 1_000;
pub const COURSE_SAVINGS_BONUS_PCT: u8 = 10;
pub const EMERGENCY_FUND_TARGET_AMOUNT: i64 = 20_000;
pub const MAX_EVENT_DRAWS_PER_ROUND: u8 = 2;
pub const INSURANCE_POSITIVE_BIAS: f64 = 0.30;

// Quiz ---------------------------------------------------------------------
pub const QUIZ_QUESTIONS_PER_ROUND: usize = 2;
pub const QUIZ_REWARD_PER_CORRECT_ANSWER: i64 = 1_000;

// Session log --------------------------------------------------------------
pub const GAME_LOG_CAPACITY: usize = 15;

// Grading thresholds -------------------------------------------------------
pub(crate) const GRADE_S_MIN_CORRECT_EXCLUSIVE: u32 = 4;
pub(crate) const GRADE_S_MIN_BALANCE_EXCLUSIVE: i64 = 30_000;
pub(crate) const GRADE_A_MIN_CORRECT: u32 = 3;
pub(crate) const GRADE_A_MIN_BALANCE_EXCLUSIVE: i64 = 25_000;
pub(crate) const GRADE_B_MIN_CORRECT: u32 = 2;
pub(crate) const GRADE_B_MIN_BALANCE_EXCLUSIVE: i64 = 20_000;

// Random stream domain tags ------------------------------------------------
pub(crate) const RNG_TAG_EVENTS: &[u8] = b"events";
pub(crate) const RNG_TAG_QUIZ: &[u8] = b"quiz";
