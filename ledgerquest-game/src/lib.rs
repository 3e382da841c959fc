//! LedgerQuest Game Engine
//!
//! Platform-agnostic core logic for a round-based personal finance game:
//! salary and expenses, optional spending, one-time money moves, random
//! life events and a short quiz each round, graded at the end.
//! This crate has no UI, storage backend or identity service of its own;
//! hosts plug those in through the traits in [`collab`].

pub mod collab;
pub mod config;
pub mod constants;
pub mod data;
pub mod engine;
pub mod error;
pub mod grade;
pub mod numbers;
pub mod records;
pub mod rng;
pub mod shared;
pub mod state;

// Re-export commonly used types
pub use collab::{
    IdentityProvider, LogNotifier, Notice, NoticeBuffer, NotificationSink, PersistenceSink,
    Severity, StaticIdentity,
};
pub use config::{EngineConfig, MAX_MONEY_SETTING};
pub use data::{
    EventKind, ExpenseItem, GameData, InvestmentAction, InvestmentOption, QuizOption,
    QuizQuestion, RandomEvent,
};
pub use engine::{FinanceEngine, Outcome, PendingSaves, SessionObserver};
pub use error::{CommandError, ConfigError, DataError, PersistenceError, SetupError};
pub use grade::{Grade, GradeConfig, GradeTier, compute_grade};
pub use records::{GameSummaryRecord, JsonlRecordStore, MemoryRecordStore, RecordHistory};
pub use rng::{CountingRng, RandomSource, RngBundle, ScriptedRandom};
pub use shared::SharedEngine;
pub use state::{AnsweredQuestion, GameLog, GameSession, QuizResult, QuizRound, RoundPhase};

/// Trait for abstracting catalog and tuning loading.
/// Platform-specific implementations should provide this.
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the reference catalogs.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or fails validation.
    fn load_catalog(&self) -> Result<GameData, Self::Error>;

    /// Load engine tuning values.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read or is invalid.
    fn load_engine_config(&self) -> Result<EngineConfig, Self::Error>;

    /// Build a seeded engine from whatever this loader provides.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, or the engine's setup error converted into it.
    fn build_engine(&self, seed: u64) -> Result<FinanceEngine, Self::Error>
    where
        Self::Error: From<SetupError>,
    {
        let cfg = self.load_engine_config()?;
        let data = self.load_catalog()?;
        Ok(FinanceEngine::with_seed(cfg, data, seed)?)
    }
}

/// Loads the catalog embedded in this crate with default tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledData;

impl DataLoader for BundledData {
    type Error = SetupError;

    fn load_catalog(&self) -> Result<GameData, Self::Error> {
        Ok(GameData::load_default()?)
    }

    fn load_engine_config(&self) -> Result<EngineConfig, Self::Error> {
        Ok(EngineConfig::default())
    }
}
