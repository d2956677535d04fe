//! Random duration streams
//!
//! Job lengths, failure gaps, restart delays and checkpoint grace periods are
//! all drawn from exponential distributions, each from its own independently
//! seeded stream so that changing one parameter does not reshuffle the others.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rand_distr::{Distribution, Exp};

use checkpoint_core::{Result, SimError, Time, VariateSource};

/// Exponentially distributed durations with a fixed mean
pub struct ExponentialSampler {
    mean: f64,
    dist: Option<Exp<f64>>,
    rng: StdRng,
}

impl ExponentialSampler {
    /// Create a sampler with the given mean (in ticks)
    ///
    /// # Arguments
    /// * `mean` - Mean duration. `0` always yields 0; `f64::INFINITY` yields `Time::MAX`
    ///   (a process that never fires).
    /// * `seed` - Seed of this stream
    pub fn new(mean: f64, seed: u64) -> Result<Self> {
        if mean.is_nan() || mean < 0.0 {
            return Err(SimError::config(format!(
                "exponential mean must be non-negative, got {mean}"
            )));
        }

        let dist = if mean > 0.0 && mean.is_finite() {
            let exp = Exp::new(1.0 / mean)
                .map_err(|e| SimError::config(format!("exponential mean {mean}: {e}")))?;
            Some(exp)
        } else {
            None
        };

        Ok(ExponentialSampler {
            mean,
            dist,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl VariateSource for ExponentialSampler {
    fn sample(&mut self) -> Time {
        match &self.dist {
            // Float-to-int casts saturate, so huge draws land on Time::MAX
            Some(dist) => dist.sample(&mut self.rng).round() as Time,
            None if self.mean == 0.0 => 0,
            None => Time::MAX,
        }
    }

    fn mean(&self) -> f64 {
        self.mean
    }
}

/// Replays a scripted list of durations, repeating the last one forever
#[derive(Debug, Clone)]
pub struct FixedSequence {
    values: Vec<Time>,
    cursor: usize,
}

impl FixedSequence {
    /// Replay `values` in order. Fails on an empty list.
    pub fn new(values: Vec<Time>) -> Result<Self> {
        if values.is_empty() {
            return Err(SimError::config("a fixed sequence needs at least one value"));
        }
        Ok(FixedSequence { values, cursor: 0 })
    }

    pub fn constant(value: Time) -> Self {
        FixedSequence {
            values: vec![value],
            cursor: 0,
        }
    }
}

impl VariateSource for FixedSequence {
    fn sample(&mut self) -> Time {
        let value = self.values[self.cursor];
        if self.cursor + 1 < self.values.len() {
            self.cursor += 1;
        }
        value
    }

    fn mean(&self) -> f64 {
        self.values.iter().map(|&v| v as f64).sum::<f64>() / self.values.len() as f64
    }
}

/// Hands out seeds for independent streams from one master seed
pub struct SeedSplitter {
    master: StdRng,
}

impl SeedSplitter {
    pub fn new(seed: u64) -> Self {
        SeedSplitter {
            master: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_seed(&mut self) -> u64 {
        self.master.next_u64()
    }

    /// Consume the splitter, keeping the master stream for direct draws
    pub fn into_rng(self) -> StdRng {
        self.master
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_mean_is_close() {
        let mut sampler = ExponentialSampler::new(1_000.0, 42).unwrap();
        let n = 20_000;
        let total: u64 = (0..n).map(|_| sampler.sample()).sum();
        let mean = total as f64 / n as f64;

        assert!((mean - 1_000.0).abs() < 50.0, "mean was {mean}");
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = ExponentialSampler::new(300.0, 7).unwrap();
        let mut b = ExponentialSampler::new(300.0, 7).unwrap();

        for _ in 0..100 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn test_degenerate_means() {
        let mut zero = ExponentialSampler::new(0.0, 1).unwrap();
        let mut never = ExponentialSampler::new(f64::INFINITY, 1).unwrap();

        assert_eq!(zero.sample(), 0);
        assert_eq!(never.sample(), Time::MAX);
        assert!(ExponentialSampler::new(-1.0, 1).is_err());
        assert!(ExponentialSampler::new(f64::NAN, 1).is_err());
    }

    #[test]
    fn test_fixed_sequence_repeats_last() {
        let mut seq = FixedSequence::new(vec![40, 5, 9]).unwrap();
        let drawn: Vec<_> = (0..5).map(|_| seq.sample()).collect();

        assert_eq!(drawn, vec![40, 5, 9, 9, 9]);
        assert_eq!(seq.mean(), 18.0);
    }

    #[test]
    fn test_empty_fixed_sequence_rejected() {
        assert!(matches!(FixedSequence::new(Vec::new()), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_seed_splitter_is_deterministic() {
        let mut a = SeedSplitter::new(0);
        let mut b = SeedSplitter::new(0);

        let seeds_a: Vec<_> = (0..4).map(|_| a.next_seed()).collect();
        let seeds_b: Vec<_> = (0..4).map(|_| b.next_seed()).collect();
        assert_eq!(seeds_a, seeds_b);
        assert_ne!(seeds_a[0], seeds_a[1]);
    }
}
