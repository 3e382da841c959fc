//! The round-based simulation engine and its command interface.
//!
//! [`FinanceEngine`] owns exactly one [`GameSession`] and mutates it only
//! through the commands below. Each command validates fully before touching
//! the session, so a rejected command leaves money, flags and counters as
//! they were (a denied purchase or investment still adds a line to the game log).
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::collab::{IdentityProvider, LogNotifier, Notice, NotificationSink, PersistenceSink};
use crate::config::EngineConfig;
use crate::constants::{
    LOG_COMMAND_REJECTED, LOG_EVENT_DRAW, LOG_GAME_OVER, LOG_GAME_START, LOG_INSURANCE_LAPSE,
    LOG_INSURANCE_PREMIUM, LOG_INVEST, LOG_INVEST_DENIED, LOG_PERSIST, LOG_PURCHASE,
    LOG_PURCHASE_DENIED, LOG_QUIZ_GRADED, LOG_QUIZ_SAMPLE, LOG_ROUND_EXPENSES, LOG_ROUND_SALARY,
    LOG_ROUND_START,
};
use crate::data::{
    EventKind, ExpenseItem, GameData, InvestmentAction, InvestmentOption, RandomEvent,
};
use crate::error::{CommandError, SetupError};
use crate::grade::{Grade, compute_grade};
use crate::numbers::format_money;
use crate::records::GameSummaryRecord;
use crate::rng::{RandomSource, RngBundle};
use crate::state::{AnsweredQuestion, GameSession, QuizResult, QuizRound, RoundPhase};

/// Receives the session after every successful command.
pub trait SessionObserver: Send {
    fn on_session_changed(&mut self, session: &GameSession);
}

impl<F> SessionObserver for F
where
    F: FnMut(&GameSession) + Send,
{
    fn on_session_changed(&mut self, session: &GameSession) {
        self(session);
    }
}

/// What a successful command did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    RoundStarted {
        round: u8,
        balance: i64,
        insurance_lapsed: bool,
    },
    GameFinished {
        grade: Grade,
        balance: i64,
        correct_answers: u32,
        /// A summary record was handed to the background writer.
        save_queued: bool,
    },
    Purchased {
        expense_id: String,
        cost: i64,
        balance: i64,
    },
    Invested {
        option_id: String,
        action: InvestmentAction,
        cost: i64,
        balance: i64,
    },
    EventDrawn {
        event: RandomEvent,
        /// The insurance bias limited this draw to positive events.
        favoured: bool,
        balance: i64,
        draws_remaining: u8,
    },
    AnswerRecorded {
        question_id: String,
        option_id: String,
        quiz_complete: bool,
    },
    QuizGraded {
        correct: usize,
        asked: usize,
        reward: i64,
        results: Vec<QuizResult>,
    },
    Restarted,
}

type SharedSink = Arc<Mutex<Box<dyn PersistenceSink>>>;

/// Summary writes still running on their writer threads.
#[derive(Debug, Default)]
#[must_use]
pub struct PendingSaves(Vec<JoinHandle<()>>);

impl PendingSaves {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Block until every write has finished and sent its notice.
    pub fn wait(self) {
        for handle in self.0 {
            if handle.join().is_err() {
                log::warn!("{LOG_PERSIST} writer thread panicked");
            }
        }
    }
}

/// Runs one play-through at a time against injected collaborators.
pub struct FinanceEngine {
    cfg: EngineConfig,
    data: GameData,
    rng: Box<dyn RandomSource>,
    session: GameSession,
    identity: Option<Box<dyn IdentityProvider>>,
    persistence: Option<SharedSink>,
    notifier: Arc<dyn NotificationSink>,
    observers: Vec<Box<dyn SessionObserver>>,
    pending_saves: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for FinanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinanceEngine")
            .field("phase", &self.session.phase)
            .field("balance", &self.session.balance)
            .field("rng", &self.rng)
            .field("has_identity", &self.identity.is_some())
            .field("has_persistence", &self.persistence.is_some())
            .field("observers", &self.observers.len())
            .field("pending_saves", &self.pending_saves.len())
            .finish_non_exhaustive()
    }
}

impl FinanceEngine {
    /// Build an engine from validated config, catalog data and a random source.
    ///
    /// Notices go to [`LogNotifier`] until [`Self::with_notifier`] replaces it.
    ///
    /// # Errors
    ///
    /// Returns an error if the config or catalog fails validation, or the quiz
    /// bank cannot fill a round.
    pub fn new(
        cfg: EngineConfig,
        data: GameData,
        rng: Box<dyn RandomSource>,
    ) -> Result<Self, SetupError> {
        cfg.validate()?;
        data.validate()?;
        data.ensure_quiz_capacity(cfg.quiz_questions_per_round)?;
        let session = GameSession::new(cfg.log_capacity);
        Ok(Self {
            cfg,
            data,
            rng,
            session,
            identity: None,
            persistence: None,
            notifier: Arc::new(LogNotifier),
            observers: Vec::new(),
            pending_saves: Vec::new(),
        })
    }

    /// Build an engine driven by a seeded [`RngBundle`].
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn with_seed(cfg: EngineConfig, data: GameData, seed: u64) -> Result<Self, SetupError> {
        Self::new(cfg, data, Box::new(RngBundle::from_user_seed(seed)))
    }

    /// Default config and bundled catalog, seeded.
    ///
    /// # Errors
    ///
    /// Returns an error only if the bundled catalog is broken.
    pub fn seeded(seed: u64) -> Result<Self, SetupError> {
        Self::with_seed(EngineConfig::default(), GameData::load_default()?, seed)
    }

    #[must_use]
    pub fn with_identity(mut self, identity: impl IdentityProvider + 'static) -> Self {
        self.identity = Some(Box::new(identity));
        self
    }

    #[must_use]
    pub fn with_persistence(mut self, sink: impl PersistenceSink + 'static) -> Self {
        let sink: Box<dyn PersistenceSink> = Box::new(sink);
        self.persistence = Some(Arc::new(Mutex::new(sink)));
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: impl NotificationSink + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Register an observer called after every successful command.
    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Hand over the summary writes still in flight, e.g. to wait on them
    /// without holding a lock around the engine.
    pub fn take_pending_saves(&mut self) -> PendingSaves {
        PendingSaves(std::mem::take(&mut self.pending_saves))
    }

    /// Block until every queued summary write has finished.
    pub fn wait_for_saves(&mut self) {
        self.take_pending_saves().wait();
    }

    /// Read-only view of the current session.
    #[must_use]
    pub const fn session(&self) -> &GameSession {
        &self.session
    }

    /// Owned copy of the current session for rendering or diffing.
    #[must_use]
    pub fn snapshot(&self) -> GameSession {
        self.session.clone()
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    #[must_use]
    pub const fn data(&self) -> &GameData {
        &self.data
    }

    /// Optional expenses on offer this round with their purchased flag.
    pub fn optional_offers(&self) -> impl Iterator<Item = (&ExpenseItem, bool)> {
        self.data
            .optional_expenses
            .iter()
            .map(|item| (item, self.session.has_purchased(&item.id)))
    }

    /// Money an investment option actually costs when taken.
    #[must_use]
    pub const fn action_cost(&self, option: &InvestmentOption) -> i64 {
        match option.action {
            InvestmentAction::Course => self.cfg.course_cost,
            InvestmentAction::EmergencyFund => self.cfg.emergency_fund_amount,
            InvestmentAction::Insurance
            | InvestmentAction::FixedDeposit
            | InvestmentAction::Etf => 0,
        }
    }

    /// Discard any session in progress and play round one.
    ///
    /// # Errors
    ///
    /// Never rejects; the `Result` keeps the command surface uniform.
    pub fn start_game(&mut self) -> Result<Outcome, CommandError> {
        self.session = GameSession::new(self.cfg.log_capacity);
        self.session
            .log
            .push(0, "A new money challenge begins. Get ready!");
        log::info!("{LOG_GAME_START} rounds={}", self.cfg.total_rounds);
        let outcome = self.begin_round(1);
        self.finish_command("start_game", Ok(outcome))
    }

    /// Reset to a fresh `NotStarted` session.
    ///
    /// # Errors
    ///
    /// Never rejects.
    pub fn restart(&mut self) -> Result<Outcome, CommandError> {
        self.session = GameSession::new(self.cfg.log_capacity);
        self.finish_command("restart", Ok(Outcome::Restarted))
    }

    /// Close the current round and open the next one, or finish the game
    /// after the last round. Advancing a game that has not started starts it.
    ///
    /// # Errors
    ///
    /// [`CommandError::QuizIncomplete`] while this round's quiz is unsubmitted,
    /// [`CommandError::GameOver`] once the game has ended.
    pub fn advance_round(&mut self) -> Result<Outcome, CommandError> {
        let phase = self.session.phase;
        let result = match phase {
            RoundPhase::NotStarted => return self.start_game(),
            RoundPhase::Over => Err(CommandError::GameOver),
            RoundPhase::InRound(_) if self.session.quiz.awaiting_submission() => {
                Err(CommandError::QuizIncomplete)
            }
            RoundPhase::InRound(round) if round >= self.cfg.total_rounds => {
                Ok(self.finish_game())
            }
            RoundPhase::InRound(round) => Ok(self.begin_round(round + 1)),
        };
        self.finish_command("advance_round", result)
    }

    /// Buy one optional expense for this round.
    ///
    /// # Errors
    ///
    /// Rejects unknown or already purchased items and purchases the balance
    /// cannot cover.
    pub fn purchase_optional(&mut self, expense_id: &str) -> Result<Outcome, CommandError> {
        let result = self.apply_purchase(expense_id);
        self.finish_command("purchase_optional", result)
    }

    /// Take an investment or one-time action.
    ///
    /// # Errors
    ///
    /// Rejects unknown options, repeats of one-time actions and actions the
    /// balance cannot cover.
    pub fn invest(&mut self, option_id: &str) -> Result<Outcome, CommandError> {
        let result = self.apply_investment(option_id);
        self.finish_command("invest", result)
    }

    /// Draw and apply one random event.
    ///
    /// # Errors
    ///
    /// [`CommandError::NoDrawsRemaining`] once this round's draws are spent.
    pub fn draw_event(&mut self) -> Result<Outcome, CommandError> {
        let result = self.apply_draw();
        self.finish_command("draw_event", result)
    }

    /// Record (or replace) the selected option for a question in this round's quiz.
    ///
    /// # Errors
    ///
    /// Rejects answers after submission and ids outside this round's quiz.
    pub fn answer_quiz(
        &mut self,
        question_id: &str,
        option_id: &str,
    ) -> Result<Outcome, CommandError> {
        let result = self.apply_answer(question_id, option_id);
        self.finish_command("answer_quiz", result)
    }

    /// Grade this round's quiz and pay the reward.
    ///
    /// # Errors
    ///
    /// [`CommandError::QuizAlreadySubmitted`] on a second submit,
    /// [`CommandError::QuizIncomplete`] unless every question is answered.
    pub fn submit_quiz(&mut self) -> Result<Outcome, CommandError> {
        let result = self.apply_submit();
        self.finish_command("submit_quiz", result)
    }

    fn finish_command(
        &mut self,
        command: &'static str,
        result: Result<Outcome, CommandError>,
    ) -> Result<Outcome, CommandError> {
        match &result {
            Ok(_) => {
                log::debug!(
                    "{command} applied round={} balance={}",
                    self.session.round,
                    self.session.balance
                );
                for observer in &mut self.observers {
                    observer.on_session_changed(&self.session);
                }
            }
            Err(err) => {
                log::debug!("{LOG_COMMAND_REJECTED} {command}: {err}");
                self.notifier.notify(rejection_notice(err));
            }
        }
        result
    }

    const fn current_round(&self) -> Result<u8, CommandError> {
        match self.session.phase {
            RoundPhase::NotStarted => Err(CommandError::GameNotStarted),
            RoundPhase::Over => Err(CommandError::GameOver),
            RoundPhase::InRound(round) => Ok(round),
        }
    }

    fn begin_round(&mut self, round: u8) -> Outcome {
        if round == 1 {
            self.session.balance = 0;
            self.session.ledger_total = 0;
        }
        self.session.round = round;
        self.session.phase = RoundPhase::InRound(round);

        let (salary, bonus) = self.cfg.round_income(self.session.savings_bonus_pct);
        self.session.post(salary);
        self.session
            .log
            .push(round, format!("Received monthly salary of {}.", format_money(salary)));
        if bonus > 0 {
            self.session.post(bonus);
            self.session.log.push(
                round,
                format!("Your finance course let you save an extra {}!", format_money(bonus)),
            );
        }
        log::debug!("{LOG_ROUND_SALARY} salary={salary} bonus={bonus}");

        let necessary = self.data.necessary_total();
        self.session.post(-necessary);
        self.session.log.push(
            round,
            format!("Paid necessary expenses totalling {}.", format_money(necessary)),
        );
        log::debug!("{LOG_ROUND_EXPENSES} total={necessary}");
        if round == 1 && self.session.balance < 0 {
            self.session.log.push(
                round,
                "Warning: your first salary does not cover the basics. Your balance is negative.",
            );
        }

        let insurance_lapsed = self.collect_premium(round);

        self.session.optional_purchases.clear();
        self.session.event_draws_remaining = self.cfg.max_event_draws;
        self.session.last_drawn_event = None;
        self.sample_quiz();

        log::info!(
            "{LOG_ROUND_START} round={round} balance={}",
            self.session.balance
        );
        Outcome::RoundStarted {
            round,
            balance: self.session.balance,
            insurance_lapsed,
        }
    }

    /// Debit the premium if insured. Returns whether the policy lapsed.
    fn collect_premium(&mut self, round: u8) -> bool {
        if !self.session.has_insurance {
            return false;
        }
        let premium = self.cfg.insurance_premium;
        if self.session.balance >= premium {
            self.session.post(-premium);
            self.session
                .log
                .push(round, format!("Paid insurance premium of {}.", format_money(premium)));
            log::debug!("{LOG_INSURANCE_PREMIUM} premium={premium}");
            return false;
        }

        self.session.has_insurance = false;
        let data = &self.data;
        self.session.investments_taken.retain(|id| {
            data.find_investment(id)
                .is_none_or(|opt| opt.action != InvestmentAction::Insurance)
        });
        self.session.insurance_lapses += 1;
        self.session.log.push(
            round,
            format!(
                "Not enough money for the {} premium. Your insurance has lapsed!",
                format_money(premium)
            ),
        );
        log::warn!(
            "{LOG_INSURANCE_LAPSE} round={round} balance={}",
            self.session.balance
        );
        self.notifier.notify(Notice::error(
            "Insurance lapsed",
            "You could not pay the premium, so your insurance has lapsed.",
        ));
        true
    }

    fn sample_quiz(&mut self) {
        let bank = &self.data.quiz_bank;
        let picks = self
            .rng
            .sample_quiz(bank.len(), self.cfg.quiz_questions_per_round);
        let questions = picks.into_iter().filter_map(|idx| bank.get(idx).cloned());
        self.session.quiz = QuizRound::with_questions(questions);
        log::debug!(
            "{LOG_QUIZ_SAMPLE} round={} questions={:?}",
            self.session.round,
            self.session
                .quiz
                .questions
                .iter()
                .map(|q| q.id.as_str())
                .collect::<Vec<_>>()
        );
    }

    fn finish_game(&mut self) -> Outcome {
        let round = self.session.round;
        let correct = self.session.cumulative_correct;
        let balance = self.session.balance;
        let grade = compute_grade(&self.cfg.grading, correct, balance);

        self.session.final_grade = Some(grade);
        self.session.is_over = true;
        self.session.phase = RoundPhase::Over;
        self.session.log.push(
            round,
            format!("Game over! Your final grade is: {}", grade.headline()),
        );
        log::info!("{LOG_GAME_OVER} grade={grade} balance={balance} correct={correct}");

        let save_queued = self.queue_summary(grade);
        Outcome::GameFinished {
            grade,
            balance,
            correct_answers: correct,
            save_queued,
        }
    }

    /// Queue a best-effort write of the finished game on a writer thread.
    /// The session is already `Over`; the write's result arrives as a notice.
    fn queue_summary(&mut self, grade: Grade) -> bool {
        let Some(user_id) = self
            .identity
            .as_ref()
            .and_then(|identity| identity.current_user_id())
        else {
            log::debug!("{LOG_PERSIST} skipped: no signed-in user");
            return false;
        };

        let Some(sink) = self.persistence.clone() else {
            log::warn!("{LOG_PERSIST} unavailable: no record store configured");
            self.notifier.notify(Notice::error(
                "Could not save record",
                "A record store must be configured to save your game.",
            ));
            return false;
        };

        let record = GameSummaryRecord {
            user_id,
            timestamp: Utc::now(),
            final_balance: self.session.balance,
            rounds_completed: self.session.round,
            grade,
            total_correct: self.session.cumulative_correct,
            total_questions: self.session.total_questions(),
        };
        let notifier = Arc::clone(&self.notifier);
        let spawned = thread::Builder::new()
            .name("ledgerquest-save".into())
            .spawn(move || write_summary(&sink, notifier.as_ref(), &record));
        match spawned {
            Ok(handle) => {
                self.pending_saves.retain(|pending| !pending.is_finished());
                self.pending_saves.push(handle);
                true
            }
            Err(err) => {
                log::warn!("{LOG_PERSIST} could not start writer: {err}");
                self.notifier.notify(Notice::error(
                    "Save failed",
                    format!("Could not save your game record: {err}"),
                ));
                false
            }
        }
    }

    fn apply_purchase(&mut self, expense_id: &str) -> Result<Outcome, CommandError> {
        let round = self.current_round()?;
        let item = self
            .data
            .find_optional(expense_id)
            .ok_or_else(|| CommandError::UnknownExpense(expense_id.to_string()))?;
        if self.session.has_purchased(&item.id) {
            return Err(CommandError::AlreadyPurchased(item.id.clone()));
        }
        if self.session.balance < item.cost {
            self.session
                .log
                .push(round, format!("Not enough money to buy {}.", item.name));
            log::debug!("{LOG_PURCHASE_DENIED} id={} cost={}", item.id, item.cost);
            return Err(CommandError::InsufficientFunds {
                needed: item.cost,
                available: self.session.balance,
            });
        }

        self.session.post(-item.cost);
        self.session.optional_purchases.insert(item.id.clone());
        self.session.log.push(
            round,
            format!("Bought {} for {}.", item.name, format_money(item.cost)),
        );
        log::debug!("{LOG_PURCHASE} id={} cost={}", item.id, item.cost);
        Ok(Outcome::Purchased {
            expense_id: item.id.clone(),
            cost: item.cost,
            balance: self.session.balance,
        })
    }

    fn apply_investment(&mut self, option_id: &str) -> Result<Outcome, CommandError> {
        let round = self.current_round()?;
        let option = self
            .data
            .find_investment(option_id)
            .ok_or_else(|| CommandError::UnknownOption(option_id.to_string()))?
            .clone();

        let already_done = (option.one_time && self.session.has_taken(&option.id))
            || (option.action == InvestmentAction::Insurance && self.session.has_insurance);
        if already_done {
            self.session
                .log
                .push(round, format!("You have already done {}.", option.name));
            log::debug!("{LOG_INVEST_DENIED} id={} reason=repeat", option.id);
            return Err(CommandError::AlreadyActioned(option.id));
        }

        let cost = self.action_cost(&option);
        if cost > 0 && self.session.balance < cost {
            self.session.log.push(
                round,
                format!(
                    "Not enough money for {}. It needs {}.",
                    option.name,
                    format_money(cost)
                ),
            );
            log::debug!("{LOG_INVEST_DENIED} id={} reason=funds cost={cost}", option.id);
            return Err(CommandError::InsufficientFunds {
                needed: cost,
                available: self.session.balance,
            });
        }

        let notice = match option.action {
            InvestmentAction::Course => {
                self.session.post(-cost);
                self.session.savings_bonus_pct = self.cfg.course_bonus_pct;
                self.session.log.push(
                    round,
                    format!(
                        "You took the finance course for {}. Monthly savings are up {}%!",
                        format_money(cost),
                        self.cfg.course_bonus_pct
                    ),
                );
                Notice::info("Course completed", "Your savings ability has improved!")
            }
            InvestmentAction::Insurance => {
                self.session.has_insurance = true;
                self.session.log.push(
                    round,
                    format!(
                        "You bought insurance. A premium of {} will be paid every round.",
                        format_money(self.cfg.insurance_premium)
                    ),
                );
                Notice::info(
                    "Insurance purchased",
                    format!(
                        "{} will be deducted from your balance every round.",
                        format_money(self.cfg.insurance_premium)
                    ),
                )
            }
            InvestmentAction::EmergencyFund => {
                self.session.post(-cost);
                self.session.log.push(
                    round,
                    format!("You set aside {} as an emergency fund.", format_money(cost)),
                );
                Notice::info(
                    "Emergency fund created",
                    format!("{} moved into your emergency fund.", format_money(cost)),
                )
            }
            InvestmentAction::FixedDeposit | InvestmentAction::Etf => {
                self.session
                    .log
                    .push(round, format!("You looked into {}.", option.name));
                Notice::info(
                    "Money move",
                    format!("You chose to learn about {}.", option.name),
                )
            }
        };

        if option.one_time {
            self.session.investments_taken.push(option.id.clone());
        }
        log::debug!("{LOG_INVEST} id={} cost={cost}", option.id);
        self.notifier.notify(notice);
        Ok(Outcome::Invested {
            option_id: option.id,
            action: option.action,
            cost,
            balance: self.session.balance,
        })
    }

    fn apply_draw(&mut self) -> Result<Outcome, CommandError> {
        let round = self.current_round()?;
        if self.session.event_draws_remaining == 0 {
            return Err(CommandError::NoDrawsRemaining);
        }

        let favoured = self.session.has_insurance
            && self.rng.roll_unit() < self.cfg.insurance_positive_bias;
        let (event, headline) = if favoured {
            let positives = self.data.positive_events();
            if positives.is_empty() {
                let event = pick(self.rng.as_mut(), &self.data.events).clone();
                let headline = format!(
                    "You drew: {} (insurance tried to help, but no favourable event exists)",
                    event.name
                );
                (event, headline)
            } else {
                let event = (*pick(self.rng.as_mut(), &positives)).clone();
                let headline = format!(
                    "Insurance paid off! You drew a favourable event: {}",
                    event.name
                );
                (event, headline)
            }
        } else {
            let event = pick(self.rng.as_mut(), &self.data.events).clone();
            let headline = format!("You drew: {}", event.name);
            (event, headline)
        };

        let before = self.session.balance;
        self.session.post(event.effect);
        self.session.event_draws_remaining -= 1;
        self.session.log.push(round, headline);
        let effect_line = match event.kind {
            EventKind::Positive => format!(
                "Effect: {}. You gain {}!",
                event.description,
                format_money(event.effect)
            ),
            EventKind::Negative => format!(
                "Effect: {}. You lose {}!",
                event.description,
                format_money(event.effect.abs())
            ),
        };
        self.session.log.push(round, effect_line);
        if before >= 0 && self.session.balance < 0 {
            self.session.log.push(
                round,
                format!("Warning: {} pushed your balance below zero!", event.name),
            );
        }
        log::debug!(
            "{LOG_EVENT_DRAW} id={} effect={} favoured={favoured}",
            event.id,
            event.effect
        );

        self.session.last_drawn_event = Some(event.clone());
        Ok(Outcome::EventDrawn {
            event,
            favoured,
            balance: self.session.balance,
            draws_remaining: self.session.event_draws_remaining,
        })
    }

    fn apply_answer(
        &mut self,
        question_id: &str,
        option_id: &str,
    ) -> Result<Outcome, CommandError> {
        self.current_round()?;
        let quiz = &mut self.session.quiz;
        if quiz.submitted {
            return Err(CommandError::QuizAlreadySubmitted);
        }
        let question = quiz
            .question(question_id)
            .ok_or_else(|| CommandError::UnknownQuestion(question_id.to_string()))?;
        if !question.has_option(option_id) {
            return Err(CommandError::UnknownAnswer {
                question: question_id.to_string(),
                option: option_id.to_string(),
            });
        }
        quiz.answers
            .insert(question_id.to_string(), option_id.to_string());
        Ok(Outcome::AnswerRecorded {
            question_id: question_id.to_string(),
            option_id: option_id.to_string(),
            quiz_complete: quiz.is_complete(),
        })
    }

    fn apply_submit(&mut self) -> Result<Outcome, CommandError> {
        let round = self.current_round()?;
        if self.session.quiz.submitted {
            return Err(CommandError::QuizAlreadySubmitted);
        }
        if !self.session.quiz.is_complete() {
            return Err(CommandError::QuizIncomplete);
        }

        let mut results = Vec::with_capacity(self.session.quiz.questions.len());
        let mut answered = Vec::with_capacity(self.session.quiz.questions.len());
        for question in &self.session.quiz.questions {
            let selected = self.session.quiz.answers.get(&question.id).cloned();
            let is_correct = selected
                .as_deref()
                .is_some_and(|choice| question.is_correct(choice));
            results.push(QuizResult {
                question_id: question.id.clone(),
                selected_option_id: selected.clone(),
                correct_option_id: question.correct_option_id.clone(),
                is_correct,
            });
            answered.push(AnsweredQuestion {
                round,
                question: question.clone(),
                selected_option_id: selected,
                is_correct,
            });
        }

        let asked = results.len();
        let correct = results.iter().filter(|r| r.is_correct).count();
        let correct_u32 = u32::try_from(correct).unwrap_or(u32::MAX);
        let reward = i64::from(correct_u32).saturating_mul(self.cfg.quiz_reward);

        self.session.post(reward);
        self.session.cumulative_correct += correct_u32;
        self.session.answered_questions.extend(answered);
        self.session.quiz.results = Some(results.clone());
        self.session.quiz.submitted = true;
        self.session.log.push(
            round,
            format!(
                "Money quiz complete! {correct} / {asked} correct, earning {}.",
                format_money(reward)
            ),
        );
        log::debug!("{LOG_QUIZ_GRADED} round={round} correct={correct} reward={reward}");
        self.notifier.notify(Notice::info(
            "Quiz results",
            format!(
                "You answered {correct} correctly and earned {}!",
                format_money(reward)
            ),
        ));

        Ok(Outcome::QuizGraded {
            correct,
            asked,
            reward,
            results,
        })
    }
}

/// Uniform pick from a non-empty slice, clamping out-of-range indices.
fn pick<'a, T>(rng: &mut dyn RandomSource, items: &'a [T]) -> &'a T {
    let last = items.len().saturating_sub(1);
    &items[rng.pick_event(items.len()).min(last)]
}

fn write_summary(
    sink: &Mutex<Box<dyn PersistenceSink>>,
    notifier: &dyn NotificationSink,
    record: &GameSummaryRecord,
) {
    let result = sink
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .submit_game_summary(record);
    match result {
        Ok(()) => {
            log::info!("{LOG_PERSIST} saved record for {}", record.user_id);
            notifier.notify(Notice::info(
                "Game record saved",
                "Your performance has been recorded!",
            ));
        }
        Err(err) => {
            log::warn!("{LOG_PERSIST} failed: {err}");
            notifier.notify(Notice::error(
                "Save failed",
                format!("Could not save your game record: {err}"),
            ));
        }
    }
}

fn rejection_notice(err: &CommandError) -> Notice {
    let title = match err {
        CommandError::InsufficientFunds { .. } => "Insufficient funds",
        CommandError::AlreadyPurchased(_)
        | CommandError::AlreadyActioned(_)
        | CommandError::NoDrawsRemaining => "Heads up",
        CommandError::QuizIncomplete | CommandError::QuizAlreadySubmitted => "Quiz",
        CommandError::GameNotStarted | CommandError::GameOver => "Not available",
        CommandError::UnknownExpense(_)
        | CommandError::UnknownOption(_)
        | CommandError::UnknownQuestion(_)
        | CommandError::UnknownAnswer { .. } => {
            return Notice::error("Unknown selection", err.to_string());
        }
    };
    Notice::info(title, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{NoticeBuffer, Severity, StaticIdentity};
    use crate::config::MAX_MONEY_SETTING;
    use crate::error::PersistenceError;
    use crate::records::MemoryRecordStore;
    use crate::rng::ScriptedRandom;

    fn engine_with(rng: ScriptedRandom) -> (FinanceEngine, NoticeBuffer) {
        let notices = NoticeBuffer::new();
        let engine = FinanceEngine::new(
            EngineConfig::default(),
            GameData::load_default().unwrap(),
            Box::new(rng),
        )
        .unwrap()
        .with_notifier(notices.clone());
        (engine, notices)
    }

    fn answer_all_correctly(engine: &mut FinanceEngine) {
        let picks: Vec<(String, String)> = engine
            .session()
            .quiz
            .questions
            .iter()
            .map(|q| (q.id.clone(), q.correct_option_id.clone()))
            .collect();
        for (question, option) in picks {
            engine.answer_quiz(&question, &option).unwrap();
        }
        engine.submit_quiz().unwrap();
    }

    fn play_out(engine: &mut FinanceEngine) {
        while !engine.session().is_over {
            answer_all_correctly(engine);
            engine.advance_round().unwrap();
        }
        engine.wait_for_saves();
    }

    #[test]
    fn start_game_opens_round_one() {
        let (mut engine, _) = engine_with(ScriptedRandom::new());
        let outcome = engine.start_game().unwrap();
        assert_eq!(
            outcome,
            Outcome::RoundStarted {
                round: 1,
                balance: 18_000,
                insurance_lapsed: false,
            }
        );
        let session = engine.session();
        assert_eq!(session.phase, RoundPhase::InRound(1));
        assert_eq!(session.event_draws_remaining, 2);
        assert_eq!(session.quiz.questions.len(), 2);
        assert_eq!(session.ledger_total, session.balance);
        assert_eq!(
            session.log.latest(),
            Some("[Round 1] Paid necessary expenses totalling 17,000.")
        );
    }

    #[test]
    fn commands_before_start_are_rejected() {
        let (mut engine, notices) = engine_with(ScriptedRandom::new());
        assert_eq!(engine.draw_event(), Err(CommandError::GameNotStarted));
        assert_eq!(
            engine.purchase_optional("concert"),
            Err(CommandError::GameNotStarted)
        );
        assert_eq!(notices.snapshot().len(), 2);
        assert_eq!(engine.session(), &GameSession::default());
    }

    #[test]
    fn purchase_debits_once_per_round() {
        let (mut engine, _) = engine_with(ScriptedRandom::new());
        engine.start_game().unwrap();
        engine.purchase_optional("concert").unwrap();
        assert_eq!(engine.session().balance, 9_300);
        assert_eq!(
            engine.purchase_optional("concert"),
            Err(CommandError::AlreadyPurchased("concert".into()))
        );
        assert_eq!(
            engine.purchase_optional("yacht"),
            Err(CommandError::UnknownExpense("yacht".into()))
        );
        assert_eq!(engine.session().balance, 9_300);
        assert!(engine.optional_offers().any(|(item, bought)| item.id == "concert" && bought));
    }

    #[test]
    fn purchase_beyond_balance_is_logged_and_refused() {
        let (mut engine, notices) = engine_with(ScriptedRandom::new());
        engine.start_game().unwrap();
        engine.purchase_optional("concert").unwrap();
        engine.purchase_optional("merch").unwrap();
        let err = engine.purchase_optional("club").unwrap_err();
        assert_eq!(
            err,
            CommandError::InsufficientFunds {
                needed: 5_000,
                available: 4_500,
            }
        );
        assert_eq!(engine.session().balance, 4_500);
        assert!(!engine.session().has_purchased("club"));
        assert_eq!(
            engine.session().log.latest(),
            Some("[Round 1] Not enough money to buy Night out clubbing.")
        );
        assert_eq!(notices.last().unwrap().title, "Insufficient funds");
    }

    #[test]
    fn course_raises_salary_from_next_round() {
        let (mut engine, notices) = engine_with(ScriptedRandom::new());
        engine.start_game().unwrap();
        engine.invest("course").unwrap();
        assert_eq!(engine.session().balance, 17_000);
        assert_eq!(engine.session().savings_bonus_pct, 10);
        assert_eq!(notices.last().unwrap().title, "Course completed");
        assert_eq!(
            engine.invest("course"),
            Err(CommandError::AlreadyActioned("course".into()))
        );

        answer_all_correctly(&mut engine);
        engine.advance_round().unwrap();
        // 17,000 + 2,000 quiz + 35,000 + 3,500 - 17,000
        assert_eq!(engine.session().balance, 40_500);
    }

    #[test]
    fn informational_options_leave_state_alone() {
        let (mut engine, notices) = engine_with(ScriptedRandom::new());
        engine.start_game().unwrap();
        let before = engine.snapshot();
        engine.invest("etf").unwrap();
        engine.invest("etf").unwrap();
        engine.invest("fixed_deposit").unwrap();
        let after = engine.session();
        assert_eq!(after.balance, before.balance);
        assert!(after.investments_taken.is_empty());
        assert_eq!(notices.last().unwrap().title, "Money move");
    }

    #[test]
    fn emergency_fund_requires_balance() {
        let (mut engine, _) = engine_with(ScriptedRandom::new());
        engine.start_game().unwrap();
        assert_eq!(
            engine.invest("emergency_fund"),
            Err(CommandError::InsufficientFunds {
                needed: 20_000,
                available: 18_000,
            })
        );
        assert!(engine.session().investments_taken.is_empty());
    }

    #[test]
    fn insurance_lapses_when_premium_unaffordable() {
        let (mut engine, notices) =
            engine_with(ScriptedRandom::new().with_events([2, 2]).with_rolls([0.9, 0.9]));
        engine.start_game().unwrap();
        engine.invest("insurance").unwrap();
        assert_eq!(
            engine.invest("insurance"),
            Err(CommandError::AlreadyActioned("insurance".into()))
        );
        engine.purchase_optional("concert").unwrap();
        engine.purchase_optional("merch").unwrap();
        engine.purchase_optional("club").unwrap_err();
        engine.purchase_optional("dinner").unwrap();
        engine.purchase_optional("books").unwrap();
        // 18,000 - 8,700 - 4,800 - 2,000 - 700 = 1,800; two broken phones
        engine.draw_event().unwrap();
        engine.draw_event().unwrap();
        assert_eq!(engine.session().balance, -6_200);
        answer_all_correctly(&mut engine);
        // -4,200 + 35,000 - 17,000 = 13,800 covers the premium
        let outcome = engine.advance_round().unwrap();
        assert!(matches!(
            outcome,
            Outcome::RoundStarted {
                insurance_lapsed: false,
                balance: 13_300,
                ..
            }
        ));
        assert!(engine.session().has_insurance);

        let (mut engine, notices_b) = engine_with(ScriptedRandom::new());
        engine.start_game().unwrap();
        engine.invest("insurance").unwrap();
        engine.session.balance = -20_000;
        engine.session.ledger_total = -20_000;
        answer_all_correctly(&mut engine);
        let outcome = engine.advance_round().unwrap();
        assert!(matches!(
            outcome,
            Outcome::RoundStarted {
                insurance_lapsed: true,
                ..
            }
        ));
        let session = engine.session();
        assert!(!session.has_insurance);
        assert!(!session.has_taken("insurance"));
        assert_eq!(session.insurance_lapses, 1);
        assert!(
            notices_b
                .snapshot()
                .iter()
                .any(|n| n.title == "Insurance lapsed" && n.severity == Severity::Error)
        );
        assert!(notices.snapshot().iter().all(|n| n.title != "Insurance lapsed"));
        // Can be bought again after lapsing.
        assert!(engine.invest("insurance").is_ok());
    }

    #[test]
    fn insured_draw_can_be_limited_to_positive_events() {
        let (mut engine, _) =
            engine_with(ScriptedRandom::new().with_rolls([0.1]).with_events([1]));
        engine.start_game().unwrap();
        engine.invest("insurance").unwrap();
        let outcome = engine.draw_event().unwrap();
        match outcome {
            Outcome::EventDrawn {
                event, favoured, ..
            } => {
                assert!(favoured);
                assert_eq!(event.id, "found_wallet");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn draws_stop_at_zero() {
        let (mut engine, _) = engine_with(ScriptedRandom::new().with_events([0, 1]));
        engine.start_game().unwrap();
        engine.draw_event().unwrap();
        engine.draw_event().unwrap();
        assert_eq!(engine.session().event_draws_remaining, 0);
        assert_eq!(engine.draw_event(), Err(CommandError::NoDrawsRemaining));
        assert_eq!(engine.session().balance, 24_000);
    }

    #[test]
    fn negative_crossing_is_warned() {
        let (mut engine, _) = engine_with(ScriptedRandom::new().with_events([2]));
        engine.start_game().unwrap();
        engine.purchase_optional("concert").unwrap();
        engine.purchase_optional("merch").unwrap();
        engine.purchase_optional("dinner").unwrap();
        engine.purchase_optional("books").unwrap();
        engine.draw_event().unwrap();
        assert_eq!(engine.session().balance, -2_200);
        assert_eq!(
            engine.session().log.latest(),
            Some("[Round 1] Warning: Broken phone pushed your balance below zero!")
        );
    }

    #[test]
    fn quiz_gate_blocks_advance_until_submitted() {
        let (mut engine, _) = engine_with(ScriptedRandom::new().with_quizzes([vec![0, 1]]));
        engine.start_game().unwrap();
        assert_eq!(engine.advance_round(), Err(CommandError::QuizIncomplete));
        engine.answer_quiz("q1", "q1o1").unwrap();
        assert_eq!(engine.submit_quiz(), Err(CommandError::QuizIncomplete));
        assert_eq!(
            engine.answer_quiz("q7", "q7o1"),
            Err(CommandError::UnknownQuestion("q7".into()))
        );
        assert_eq!(
            engine.answer_quiz("q2", "q1o1"),
            Err(CommandError::UnknownAnswer {
                question: "q2".into(),
                option: "q1o1".into(),
            })
        );
        engine.answer_quiz("q1", "q1o2").unwrap();
        engine.answer_quiz("q2", "q2o1").unwrap();
        let graded = engine.submit_quiz().unwrap();
        assert!(matches!(
            graded,
            Outcome::QuizGraded {
                correct: 1,
                asked: 2,
                reward: 1_000,
                ..
            }
        ));
        assert_eq!(engine.submit_quiz(), Err(CommandError::QuizAlreadySubmitted));
        assert_eq!(
            engine.answer_quiz("q1", "q1o1"),
            Err(CommandError::QuizAlreadySubmitted)
        );
        assert_eq!(engine.session().cumulative_correct, 1);
        assert_eq!(engine.session().missed_questions().count(), 1);
        assert!(engine.advance_round().is_ok());
    }

    #[test]
    fn finished_game_is_graded_and_frozen() {
        let (mut engine, _) = engine_with(ScriptedRandom::new());
        engine.start_game().unwrap();
        play_out(&mut engine);
        let session = engine.session();
        assert_eq!(session.phase, RoundPhase::Over);
        assert_eq!(session.round, 3);
        assert_eq!(session.cumulative_correct, 6);
        // 3 x 18,000 + 6 x 1,000
        assert_eq!(session.balance, 60_000);
        assert_eq!(session.final_grade, Some(Grade::S));
        assert_eq!(session.total_questions(), 6);
        assert_eq!(engine.draw_event(), Err(CommandError::GameOver));
        assert_eq!(engine.advance_round(), Err(CommandError::GameOver));
        assert!(engine.restart().is_ok());
        assert_eq!(engine.session(), &GameSession::default());
    }

    #[test]
    fn summary_is_saved_for_signed_in_user() {
        let store = MemoryRecordStore::new();
        let (engine, notices) = engine_with(ScriptedRandom::new());
        let mut engine = engine
            .with_identity(StaticIdentity::signed_in("player-1"))
            .with_persistence(store.clone());
        engine.start_game().unwrap();
        play_out(&mut engine);
        assert!(engine.take_pending_saves().is_empty());
        let records = store.all();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, "player-1");
        assert_eq!(records[0].total_questions, 6);
        assert_eq!(records[0].rounds_completed, 3);
        assert_eq!(records[0].grade, Grade::S);
        assert_eq!(notices.last().unwrap().title, "Game record saved");
    }

    #[test]
    fn anonymous_games_are_not_saved() {
        let store = MemoryRecordStore::new();
        let (engine, notices) = engine_with(ScriptedRandom::new());
        let mut engine = engine
            .with_identity(StaticIdentity::anonymous())
            .with_persistence(store.clone());
        engine.start_game().unwrap();
        play_out(&mut engine);
        assert!(store.is_empty());
        assert!(notices.snapshot().iter().all(|n| n.severity == Severity::Info));
    }

    #[test]
    fn missing_store_is_reported() {
        let (engine, notices) = engine_with(ScriptedRandom::new());
        let mut engine = engine.with_identity(StaticIdentity::signed_in("p"));
        engine.start_game().unwrap();
        play_out(&mut engine);
        let last = notices.last().unwrap();
        assert_eq!(last.severity, Severity::Error);
        assert_eq!(last.title, "Could not save record");
        assert!(engine.session().is_over);
    }

    #[test]
    fn largest_money_settings_play_to_the_end() {
        let cfg = EngineConfig {
            base_salary: MAX_MONEY_SETTING,
            quiz_reward: MAX_MONEY_SETTING,
            ..EngineConfig::default()
        };
        let mut engine = FinanceEngine::new(
            cfg,
            GameData::load_default().unwrap(),
            Box::new(ScriptedRandom::new()),
        )
        .unwrap()
        .with_notifier(NoticeBuffer::new());
        engine.start_game().unwrap();
        engine.invest("course").unwrap();
        play_out(&mut engine);
        let session = engine.session();
        assert!(session.is_over);
        assert!(session.balance > MAX_MONEY_SETTING);
        assert_eq!(session.ledger_total, session.balance);
    }

    struct FailingSink;

    impl PersistenceSink for FailingSink {
        fn submit_game_summary(&self, _: &GameSummaryRecord) -> Result<(), PersistenceError> {
            Err(PersistenceError::WriteFailed("disk full".into()))
        }
    }

    #[test]
    fn failed_write_keeps_game_over() {
        let (engine, notices) = engine_with(ScriptedRandom::new());
        let mut engine = engine
            .with_identity(StaticIdentity::signed_in("p"))
            .with_persistence(FailingSink);
        engine.start_game().unwrap();
        while !engine.session().is_over {
            answer_all_correctly(&mut engine);
            let outcome = engine.advance_round().unwrap();
            if let Outcome::GameFinished { save_queued, .. } = outcome {
                assert!(save_queued);
            }
        }
        assert_eq!(engine.session().phase, RoundPhase::Over);
        engine.wait_for_saves();
        assert_eq!(notices.last().unwrap().title, "Save failed");
    }

    #[test]
    fn observers_see_each_successful_command() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let (mut engine, _) = engine_with(ScriptedRandom::new());
        engine.subscribe(move |session: &GameSession| {
            sink.lock().unwrap().push(session.balance);
        });
        engine.start_game().unwrap();
        engine.purchase_optional("books").unwrap();
        engine.purchase_optional("books").unwrap_err();
        assert_eq!(*seen.lock().unwrap(), vec![18_000, 17_300]);
    }

    #[test]
    fn advance_from_not_started_starts_the_game() {
        let (mut engine, _) = engine_with(ScriptedRandom::new());
        let outcome = engine.advance_round().unwrap();
        assert!(matches!(outcome, Outcome::RoundStarted { round: 1, .. }));
    }

    #[test]
    fn start_mid_game_resets_progress() {
        let (mut engine, _) = engine_with(ScriptedRandom::new());
        engine.start_game().unwrap();
        engine.invest("course").unwrap();
        answer_all_correctly(&mut engine);
        engine.advance_round().unwrap();
        engine.start_game().unwrap();
        let session = engine.session();
        assert_eq!(session.round, 1);
        assert_eq!(session.balance, 18_000);
        assert_eq!(session.savings_bonus_pct, 0);
        assert!(session.investments_taken.is_empty());
        assert_eq!(session.cumulative_correct, 0);
    }
}
