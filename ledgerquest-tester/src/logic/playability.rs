use anyhow::{Context, Result, ensure};
use ledgerquest_game::Grade;
use ledgerquest_game::numbers::{i64_to_f64, ratio};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::common::scenario::full_game::full_game_plan;
use crate::logic::game_tester::{GameTester, SimulationSummary};
use crate::logic::policy::GameplayStrategy;
use crate::logic::seeds::SeedInfo;

/// One finished game from the playability sweep.
#[derive(Debug, Clone, Serialize)]
pub struct PlayabilityRecord {
    pub strategy: GameplayStrategy,
    pub seed: u64,
    pub grade: Grade,
    pub final_balance: i64,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub insurance_lapses: u32,
    pub rejected_commands: usize,
}

impl PlayabilityRecord {
    fn from_summary(summary: &SimulationSummary) -> Result<Self> {
        let session = &summary.final_session;
        let grade = session
            .final_grade
            .with_context(|| format!("seed {} finished without a grade", summary.seed))?;
        Ok(Self {
            strategy: summary.strategy,
            seed: summary.seed,
            grade,
            final_balance: session.balance,
            correct_answers: session.cumulative_correct,
            total_questions: session.total_questions(),
            insurance_lapses: session.insurance_lapses,
            rejected_commands: summary.rejected.len(),
        })
    }
}

/// Per-strategy roll-up of [`PlayabilityRecord`]s.
#[derive(Debug, Clone, Serialize)]
pub struct PlayabilityAggregate {
    pub strategy: GameplayStrategy,
    pub iterations: usize,
    pub grade_counts: BTreeMap<Grade, usize>,
    pub mean_balance: f64,
    pub std_balance: f64,
    pub min_balance: i64,
    pub max_balance: i64,
    pub mean_correct: f64,
    pub questions_per_game: u32,
    /// Share of games with at least one insurance lapse.
    pub lapse_rate: f64,
}

impl PlayabilityAggregate {
    #[must_use]
    pub fn grade_share(&self, grade: Grade) -> f64 {
        let count = self.grade_counts.get(&grade).copied().unwrap_or(0);
        ratio(count, self.iterations)
    }
}

pub fn run_playability_analysis(
    tester: &GameTester,
    seeds: &[SeedInfo],
    iterations: usize,
) -> Result<Vec<PlayabilityRecord>> {
    let iterations = iterations.max(1);
    let mut records =
        Vec::with_capacity(seeds.len() * GameplayStrategy::ALL.len() * iterations);

    for strategy in GameplayStrategy::ALL {
        let plan = full_game_plan(strategy);
        for seed in seeds {
            for iteration in 0..iterations {
                let iteration_seed = seed
                    .seed
                    .wrapping_add(u64::try_from(iteration).unwrap_or(0));
                let context = format!(
                    "Playability run failed for strategy {strategy}, seed {} (iteration {})",
                    seed.seed,
                    iteration + 1
                );
                let summary = tester
                    .run_plan(&plan, iteration_seed)
                    .with_context(|| context.clone())?;
                for expectation in &plan.expectations {
                    expectation
                        .evaluate(&summary)
                        .with_context(|| context.clone())?;
                }
                records.push(PlayabilityRecord::from_summary(&summary)?);
            }
        }
    }

    Ok(records)
}

pub fn aggregate_playability(records: &[PlayabilityRecord]) -> Vec<PlayabilityAggregate> {
    let mut builders: Vec<AggregateBuilder> = Vec::new();
    for record in records {
        let position = builders
            .iter()
            .position(|b| b.strategy == record.strategy)
            .unwrap_or_else(|| {
                builders.push(AggregateBuilder::new(record.strategy));
                builders.len() - 1
            });
        builders[position].ingest(record);
    }
    builders.into_iter().map(AggregateBuilder::finish).collect()
}

/// Sanity targets every sweep has to meet.
pub fn validate_playability_targets(aggregates: &[PlayabilityAggregate]) -> Result<()> {
    for aggregate in aggregates {
        let graded: usize = aggregate.grade_counts.values().sum();
        ensure!(
            graded == aggregate.iterations,
            "{}: {graded} graded games out of {}",
            aggregate.strategy,
            aggregate.iterations
        );
        ensure!(
            aggregate.min_balance <= aggregate.max_balance,
            "{}: balance range is inverted",
            aggregate.strategy
        );
        if aggregate.strategy != GameplayStrategy::Random {
            ensure!(
                (aggregate.mean_correct - f64::from(aggregate.questions_per_game)).abs()
                    < f64::EPSILON,
                "{} should answer every question correctly (mean {:.2} of {})",
                aggregate.strategy,
                aggregate.mean_correct,
                aggregate.questions_per_game
            );
        }
    }
    Ok(())
}

struct AggregateBuilder {
    strategy: GameplayStrategy,
    iterations: usize,
    grade_counts: BTreeMap<Grade, usize>,
    balance: RunningStats,
    min_balance: i64,
    max_balance: i64,
    correct: RunningStats,
    questions_per_game: u32,
    lapsed_games: usize,
}

impl AggregateBuilder {
    fn new(strategy: GameplayStrategy) -> Self {
        Self {
            strategy,
            iterations: 0,
            grade_counts: BTreeMap::new(),
            balance: RunningStats::default(),
            min_balance: i64::MAX,
            max_balance: i64::MIN,
            correct: RunningStats::default(),
            questions_per_game: 0,
            lapsed_games: 0,
        }
    }

    fn ingest(&mut self, record: &PlayabilityRecord) {
        self.iterations += 1;
        *self.grade_counts.entry(record.grade).or_insert(0) += 1;
        self.balance.add(i64_to_f64(record.final_balance));
        self.min_balance = self.min_balance.min(record.final_balance);
        self.max_balance = self.max_balance.max(record.final_balance);
        self.correct.add(f64::from(record.correct_answers));
        self.questions_per_game = self.questions_per_game.max(record.total_questions);
        if record.insurance_lapses > 0 {
            self.lapsed_games += 1;
        }
    }

    fn finish(self) -> PlayabilityAggregate {
        let empty = self.iterations == 0;
        PlayabilityAggregate {
            strategy: self.strategy,
            iterations: self.iterations,
            grade_counts: self.grade_counts,
            mean_balance: self.balance.mean(),
            std_balance: self.balance.std_dev(),
            min_balance: if empty { 0 } else { self.min_balance },
            max_balance: if empty { 0 } else { self.max_balance },
            mean_correct: self.correct.mean(),
            questions_per_game: self.questions_per_game,
            lapse_rate: ratio(self.lapsed_games, self.iterations),
        }
    }
}

#[derive(Debug, Default, Clone)]
struct RunningStats {
    count: u32,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn add(&mut self, value: f64) {
        self.count += 1;
        let count = f64::from(self.count);
        let delta = value - self.mean;
        self.mean += delta / count;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    const fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    fn variance(&self) -> f64 {
        if self.count > 1 {
            self.m2 / f64::from(self.count - 1)
        } else {
            0.0
        }
    }

    fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
