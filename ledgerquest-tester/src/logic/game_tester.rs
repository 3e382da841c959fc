use std::fs;
use std::hash::Hasher;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use ledgerquest_game::numbers::format_money;
use ledgerquest_game::{
    CommandError, DataLoader, EngineConfig, FinanceEngine, GameData, GameSession,
    JsonlRecordStore, Notice, NoticeBuffer, Outcome, SetupError, StaticIdentity,
};
use twox_hash::XxHash64;

use crate::logic::policy::{GameplayStrategy, PlayerPolicy};

/// Catalog and tuning shared by every simulated game.
#[derive(Debug, Clone)]
pub struct TesterAssets {
    cfg: EngineConfig,
    data: GameData,
}

impl TesterAssets {
    /// The catalog embedded in the engine crate with default tuning.
    pub fn bundled() -> Result<Self> {
        let data = GameData::load_default().context("bundled catalog failed to load")?;
        Ok(Self {
            cfg: EngineConfig::default(),
            data,
        })
    }

    /// Bundled catalog with tuning read from a JSON file when one is given.
    pub fn from_config_path(path: Option<&Path>) -> Result<Self> {
        let mut assets = Self::bundled()?;
        if let Some(path) = path {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read engine config {}", path.display()))?;
            assets.cfg = EngineConfig::from_json(&json)
                .with_context(|| format!("invalid engine config {}", path.display()))?;
            assets
                .data
                .ensure_quiz_capacity(assets.cfg.quiz_questions_per_round)
                .context("engine config asks for more quiz questions than the bank holds")?;
        }
        Ok(assets)
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Copy of these assets with a tuning tweak applied.
    #[must_use]
    pub fn tuned(&self, setup: fn(&mut EngineConfig)) -> Self {
        let mut tuned = self.clone();
        setup(&mut tuned.cfg);
        tuned
    }
}

impl DataLoader for TesterAssets {
    type Error = SetupError;

    fn load_catalog(&self) -> Result<GameData, Self::Error> {
        Ok(self.data.clone())
    }

    fn load_engine_config(&self) -> Result<EngineConfig, Self::Error> {
        Ok(self.cfg.clone())
    }
}

/// Declarative plan for running a simulation session.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    pub strategy: GameplayStrategy,
    pub setup: Option<fn(&mut EngineConfig)>,
    pub replay: bool,
    pub expectations: Vec<SimulationExpectation>,
}

impl SimulationPlan {
    #[must_use]
    pub fn new(strategy: GameplayStrategy) -> Self {
        Self {
            strategy,
            setup: None,
            replay: false,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_setup(mut self, setup: fn(&mut EngineConfig)) -> Self {
        self.setup = Some(setup);
        self
    }

    /// Play every seed a second time and keep the replay's fingerprint.
    #[must_use]
    pub const fn with_replay(mut self) -> Self {
        self.replay = true;
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SimulationExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Assertion hook run after a simulation completes.
type SimulationExpectationFn =
    Arc<dyn Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SimulationExpectation(SimulationExpectationFn);

impl std::fmt::Debug for SimulationExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationExpectation").finish()
    }
}

impl SimulationExpectation {
    pub fn evaluate(&self, summary: &SimulationSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SimulationExpectation
where
    F: Fn(&SimulationSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// A command the engine turned down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub command: &'static str,
    pub error: CommandError,
}

/// Complete record of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub seed: u64,
    pub strategy: GameplayStrategy,
    pub final_session: GameSession,
    pub notices: Vec<Notice>,
    /// Outcomes of every applied command, in order.
    pub commands: Vec<Outcome>,
    pub rejected: Vec<Rejection>,
    pub fingerprint: u64,
    pub replay_fingerprint: Option<u64>,
}

impl SimulationSummary {
    #[must_use]
    pub fn rejections_of(&self, command: &str) -> usize {
        self.rejected.iter().filter(|r| r.command == command).count()
    }

    #[must_use]
    pub fn has_notice(&self, title: &str) -> bool {
        self.notices.iter().any(|n| n.title == title)
    }
}

/// Where finished games are recorded, and for whom.
#[derive(Debug, Clone)]
struct RecordTarget {
    store: JsonlRecordStore,
    user: String,
}

/// Headless deterministic runner for the core game logic.
#[derive(Debug, Clone)]
pub struct GameTester {
    assets: Arc<TesterAssets>,
    verbose: bool,
    records: Option<RecordTarget>,
}

struct Playthrough {
    engine: FinanceEngine,
    commands: Vec<Outcome>,
    rejected: Vec<Rejection>,
}

impl Playthrough {
    fn apply(
        &mut self,
        command: &'static str,
        f: impl FnOnce(&mut FinanceEngine) -> Result<Outcome, CommandError>,
    ) {
        match f(&mut self.engine) {
            Ok(outcome) => self.commands.push(outcome),
            Err(error) => {
                log::debug!("tester command {command} rejected: {error}");
                self.rejected.push(Rejection { command, error });
            }
        }
    }
}

impl GameTester {
    #[must_use]
    pub fn new(assets: Arc<TesterAssets>, verbose: bool) -> Self {
        Self {
            assets,
            verbose,
            records: None,
        }
    }

    /// Record every finished game in `store` under `user`.
    #[must_use]
    pub fn with_records(mut self, store: JsonlRecordStore, user: impl Into<String>) -> Self {
        self.records = Some(RecordTarget {
            store,
            user: user.into(),
        });
        self
    }

    #[must_use]
    pub fn assets(&self) -> &TesterAssets {
        &self.assets
    }

    pub fn run_plan(&self, plan: &SimulationPlan, seed: u64) -> Result<SimulationSummary> {
        let mut summary = self.play(plan, seed, self.records.as_ref())?;
        if plan.replay {
            let replay = self.play(plan, seed, None)?;
            summary.replay_fingerprint = Some(replay.fingerprint);
        }
        Ok(summary)
    }

    fn build_engine(&self, plan: &SimulationPlan, seed: u64) -> Result<FinanceEngine> {
        let engine = match plan.setup {
            Some(setup) => self.assets.tuned(setup).build_engine(seed),
            None => self.assets.build_engine(seed),
        };
        engine.with_context(|| format!("failed to build engine for seed {seed}"))
    }

    fn play(
        &self,
        plan: &SimulationPlan,
        seed: u64,
        records: Option<&RecordTarget>,
    ) -> Result<SimulationSummary> {
        let notices = NoticeBuffer::new();
        let mut engine = self.build_engine(plan, seed)?.with_notifier(notices.clone());
        if let Some(target) = records {
            engine = engine
                .with_identity(StaticIdentity::signed_in(target.user.clone()))
                .with_persistence(target.store.clone());
        }

        if self.verbose {
            println!(
                "🎮 Starting simulation | seed:{seed} policy:{}",
                plan.strategy.label()
            );
        }

        let mut policy = plan.strategy.create_policy(seed);
        let mut run = Playthrough {
            engine,
            commands: Vec::new(),
            rejected: Vec::new(),
        };
        run.apply("start_game", FinanceEngine::start_game);

        let round_budget = usize::from(run.engine.config().total_rounds);
        for _ in 0..round_budget {
            self.play_round(&mut run, policy.as_mut());
            run.apply("advance_round", FinanceEngine::advance_round);
            if run.engine.session().is_over {
                break;
            }
        }
        if !run.engine.session().is_over {
            bail!(
                "game for seed {seed} did not finish after {round_budget} rounds ({} rejections)",
                run.rejected.len()
            );
        }

        run.engine.wait_for_saves();
        let final_session = run.engine.snapshot();
        if self.verbose {
            log_final_state(&final_session);
        }
        Ok(SimulationSummary {
            seed,
            strategy: plan.strategy,
            fingerprint: session_fingerprint(&final_session)?,
            final_session,
            notices: notices.snapshot(),
            commands: run.commands,
            rejected: run.rejected,
            replay_fingerprint: None,
        })
    }

    fn play_round(&self, run: &mut Playthrough, policy: &mut (dyn PlayerPolicy + Send)) {
        let moves = policy.money_moves(run.engine.session(), run.engine.data());
        for id in moves {
            run.apply("invest", |engine| engine.invest(&id));
        }

        let purchases = policy.purchases(run.engine.session(), run.engine.data());
        for id in purchases {
            run.apply("purchase_optional", |engine| engine.purchase_optional(&id));
        }

        let draws = policy.event_draws(run.engine.session());
        for _ in 0..draws {
            run.apply("draw_event", FinanceEngine::draw_event);
        }

        let questions = run.engine.session().quiz.questions.clone();
        for question in &questions {
            let decision = policy.answer(question);
            if self.verbose {
                println!(
                    "🎯 Round {}: {} -> {} ({}, {})",
                    run.engine.session().round,
                    question.id,
                    decision.option_id,
                    policy.name(),
                    decision.rationale.as_deref().unwrap_or("-")
                );
            }
            run.apply("answer_quiz", |engine| {
                engine.answer_quiz(&question.id, &decision.option_id)
            });
        }
        run.apply("submit_quiz", FinanceEngine::submit_quiz);

        if self.verbose {
            let session = run.engine.session();
            println!(
                "📅 Round {} | Balance:{} Correct:{} Insured:{}",
                session.round,
                format_money(session.balance),
                session.cumulative_correct,
                session.has_insurance
            );
        }
    }
}

/// Stable hash of a session's serialized form.
pub fn session_fingerprint(session: &GameSession) -> Result<u64> {
    let bytes = serde_json::to_vec(session).context("failed to serialize session")?;
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&bytes);
    Ok(hasher.finish())
}

fn log_final_state(session: &GameSession) {
    let grade = session
        .final_grade
        .map_or_else(|| "-".to_string(), |g| g.headline().to_string());
    println!(
        "🏁 Simulation ended | Balance:{} Correct:{}/{} Grade:{grade}",
        format_money(session.balance),
        session.cumulative_correct,
        session.total_questions()
    );
}
