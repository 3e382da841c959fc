//! Injectable randomness for event draws and quiz sampling.
use hmac::{Hmac, Mac};
use rand::rngs::SmallRng;
use rand::seq::index;
use rand::{Rng, RngCore, SeedableRng};
use sha2::Sha256;
use std::collections::VecDeque;

use crate::constants::{RNG_TAG_EVENTS, RNG_TAG_QUIZ};

/// Random decisions the engine needs.
pub trait RandomSource: Send + std::fmt::Debug {
    /// Uniform index in `0..len`. Only called with `len > 0`.
    fn pick_event(&mut self, len: usize) -> usize;

    /// Uniform value in `[0, 1)` for the insurance coin flip.
    fn roll_unit(&mut self) -> f64;

    /// `amount` distinct indices from `0..len`. Only called with `amount <= len`.
    fn sample_quiz(&mut self, len: usize, amount: usize) -> Vec<usize>;
}

/// Seeded bundle of independent streams, one per random domain.
#[derive(Debug, Clone)]
pub struct RngBundle {
    seed: u64,
    events: CountingRng<SmallRng>,
    quiz: CountingRng<SmallRng>,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            seed,
            events: CountingRng::new(derive_stream_seed(seed, RNG_TAG_EVENTS)),
            quiz: CountingRng::new(derive_stream_seed(seed, RNG_TAG_QUIZ)),
        }
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw calls made against the event stream.
    #[must_use]
    pub const fn event_draws(&self) -> u64 {
        self.events.draws()
    }

    /// Draw calls made against the quiz stream.
    #[must_use]
    pub const fn quiz_draws(&self) -> u64 {
        self.quiz.draws()
    }
}

impl RandomSource for RngBundle {
    fn pick_event(&mut self, len: usize) -> usize {
        self.events.gen_range(0..len)
    }

    fn roll_unit(&mut self) -> f64 {
        self.events.r#gen::<f64>()
    }

    fn sample_quiz(&mut self, len: usize, amount: usize) -> Vec<usize> {
        index::sample(&mut self.quiz, len, amount).into_vec()
    }
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<SmallRng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}

/// Replays queued decisions in order.
///
/// When a queue runs dry the source falls back to index 0, a roll of `1.0`
/// (never triggers a probability check) and the first `amount` questions.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    events: VecDeque<usize>,
    rolls: VecDeque<f64>,
    quizzes: VecDeque<Vec<usize>>,
}

impl ScriptedRandom {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_events(mut self, picks: impl IntoIterator<Item = usize>) -> Self {
        self.events.extend(picks);
        self
    }

    #[must_use]
    pub fn with_rolls(mut self, rolls: impl IntoIterator<Item = f64>) -> Self {
        self.rolls.extend(rolls);
        self
    }

    /// Queue the question indices sampled at each round start.
    #[must_use]
    pub fn with_quizzes(mut self, rounds: impl IntoIterator<Item = Vec<usize>>) -> Self {
        self.quizzes.extend(rounds);
        self
    }
}

impl RandomSource for ScriptedRandom {
    fn pick_event(&mut self, len: usize) -> usize {
        self.events.pop_front().unwrap_or(0).min(len.saturating_sub(1))
    }

    fn roll_unit(&mut self) -> f64 {
        self.rolls.pop_front().unwrap_or(1.0)
    }

    fn sample_quiz(&mut self, len: usize, amount: usize) -> Vec<usize> {
        match self.quizzes.pop_front() {
            Some(picks) if picks.len() == amount && picks.iter().all(|&i| i < len) => picks,
            _ => (0..amount.min(len)).collect(),
        }
    }
}
