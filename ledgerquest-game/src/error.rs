//! Error types surfaced by the engine and its collaborators.
use thiserror::Error;

/// Rejection reasons for engine commands.
///
/// Every variant leaves the session exactly as it was before the command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("no game in progress; start a game first")]
    GameNotStarted,
    #[error("the game is over; restart to play again")]
    GameOver,
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },
    #[error("{0} was already purchased this round")]
    AlreadyPurchased(String),
    #[error("{0} has already been done")]
    AlreadyActioned(String),
    #[error("no event draws remaining this round")]
    NoDrawsRemaining,
    #[error("the quiz for this round is not complete")]
    QuizIncomplete,
    #[error("the quiz for this round was already submitted")]
    QuizAlreadySubmitted,
    #[error("unknown optional expense '{0}'")]
    UnknownExpense(String),
    #[error("unknown investment option '{0}'")]
    UnknownOption(String),
    #[error("question '{0}' is not part of this round's quiz")]
    UnknownQuestion(String),
    #[error("question '{question}' has no option '{option}'")]
    UnknownAnswer { question: String, option: String },
}

/// Failures reported by a [`crate::PersistenceSink`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    /// No signed-in user, or no sink configured.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
    #[error("failed to write game summary: {0}")]
    WriteFailed(String),
}

/// Invalid engine tuning values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    BelowMinimum {
        field: &'static str,
        min: i64,
        value: i64,
    },
    #[error("{field} must be at most {max} (got {value})")]
    AboveMaximum {
        field: &'static str,
        max: i64,
        value: i64,
    },
    #[error("{field} must be between 0 and 1 (got {value:.2})")]
    ProbabilityOutOfRange { field: &'static str, value: f64 },
    #[error("failed to parse engine config: {0}")]
    Parse(String),
}

/// Catalog data that cannot drive a game.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("catalog '{0}' is empty")]
    EmptyCatalog(&'static str),
    #[error("catalog '{catalog}' has duplicate id '{id}'")]
    DuplicateId { catalog: &'static str, id: String },
    #[error("question '{question}' marks '{option}' correct but does not offer it")]
    MissingCorrectOption { question: String, option: String },
    #[error("quiz bank has {available} questions but {required} are sampled per round")]
    QuizBankTooSmall { available: usize, required: usize },
    #[error("event '{id}' effect {effect} does not match its kind")]
    EventSignMismatch { id: String, effect: i64 },
    #[error("failed to parse catalog: {0}")]
    Parse(String),
}

/// Reasons an engine cannot be built from the supplied config and catalog.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        let err = CommandError::InsufficientFunds {
            needed: 8_700,
            available: 500,
        };
        assert_eq!(err.to_string(), "insufficient funds: need 8700, have 500");

        let err = DataError::MissingCorrectOption {
            question: "q1".into(),
            option: "q1o9".into(),
        };
        assert!(err.to_string().contains("q1o9"));
    }
}
