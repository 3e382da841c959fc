//! Thread-safe handle for hosts that deliver commands from several places.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::{FinanceEngine, Outcome};
use crate::error::CommandError;
use crate::state::GameSession;

/// Cloneable single-writer wrapper around a [`FinanceEngine`].
///
/// Every command holds the lock for its whole run, so concurrent callers are
/// applied one after another. Summary writes run on their own threads and
/// never hold the lock. Commands never leave a half-applied session, so a
/// poisoned lock is recovered rather than propagated.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<FinanceEngine>>,
}

impl SharedEngine {
    #[must_use]
    pub fn new(engine: FinanceEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FinanceEngine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run any closure against the locked engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut FinanceEngine) -> R) -> R {
        f(&mut self.lock())
    }

    #[must_use]
    pub fn snapshot(&self) -> GameSession {
        self.lock().snapshot()
    }

    /// Block until queued summary writes finish. Waits outside the lock.
    pub fn wait_for_saves(&self) {
        let pending = self.lock().take_pending_saves();
        pending.wait();
    }

    /// # Errors
    ///
    /// See [`FinanceEngine::start_game`].
    pub fn start_game(&self) -> Result<Outcome, CommandError> {
        self.lock().start_game()
    }

    /// # Errors
    ///
    /// See [`FinanceEngine::restart`].
    pub fn restart(&self) -> Result<Outcome, CommandError> {
        self.lock().restart()
    }

    /// # Errors
    ///
    /// See [`FinanceEngine::advance_round`].
    pub fn advance_round(&self) -> Result<Outcome, CommandError> {
        self.lock().advance_round()
    }

    /// # Errors
    ///
    /// See [`FinanceEngine::purchase_optional`].
    pub fn purchase_optional(&self, expense_id: &str) -> Result<Outcome, CommandError> {
        self.lock().purchase_optional(expense_id)
    }

    /// # Errors
    ///
    /// See [`FinanceEngine::invest`].
    pub fn invest(&self, option_id: &str) -> Result<Outcome, CommandError> {
        self.lock().invest(option_id)
    }

    /// # Errors
    ///
    /// See [`FinanceEngine::draw_event`].
    pub fn draw_event(&self) -> Result<Outcome, CommandError> {
        self.lock().draw_event()
    }

    /// # Errors
    ///
    /// See [`FinanceEngine::answer_quiz`].
    pub fn answer_quiz(&self, question_id: &str, option_id: &str) -> Result<Outcome, CommandError> {
        self.lock().answer_quiz(question_id, option_id)
    }

    /// # Errors
    ///
    /// See [`FinanceEngine::submit_quiz`].
    pub fn submit_quiz(&self) -> Result<Outcome, CommandError> {
        self.lock().submit_quiz()
    }
}
