//! Random Sources
//!
//! Every probability and range in the engine is sampled through
//! [`RandomSource`], so a session can be seeded for reproducibility or fed a
//! fixed script in tests.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// A source of uniform draws in `[0, 1)`.
///
/// The provided methods are all derived from [`RandomSource::next_f64`], so
/// the number of draws each operation consumes is fixed and documented.
pub trait RandomSource: Send {
    /// Uniform draw in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// One draw; true when it lands below `probability`.
    fn chance(&mut self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    /// One draw mapped onto `[low, high)`.
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64()
    }

    /// One draw mapped onto the integers `low..=high`.
    fn int_inclusive(&mut self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        let span = (high - low + 1) as f64;
        let offset = (self.next_f64() * span).floor() as u64;
        low + offset.min(high - low)
    }

    /// One draw mapped onto an index in `0..len`. Returns 0 for empty input.
    fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let idx = (self.next_f64() * len as f64).floor() as usize;
        idx.min(len - 1)
    }
}

/// Seeded random number generator used by live sessions
pub struct SimRng(pub SmallRng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self(SmallRng::from_entropy())
    }
}

impl RandomSource for SimRng {
    fn next_f64(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Replays a fixed sequence of draws, then repeats a fallback value.
///
/// Lets tests force specific branches: a draw of `0.0` passes every
/// probability gate and picks the low end of every range, `0.999` fails
/// every gate and picks the high end.
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    values: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedRng {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            fallback: 0.5,
        }
    }

    /// A source that always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(std::iter::empty()).with_fallback(value)
    }

    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback.clamp(0.0, 0.999_999);
        self
    }

    /// Queues more draws after the ones already scripted.
    pub fn push(&mut self, values: impl IntoIterator<Item = f64>) {
        self.values.extend(values);
    }

    /// Draws still scripted before the fallback kicks in.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl RandomSource for ScriptedRng {
    fn next_f64(&mut self) -> f64 {
        self.values.pop_front().unwrap_or(self.fallback)
    }
}
