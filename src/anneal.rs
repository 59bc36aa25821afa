//! Temperature schedule and annealed sampling.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Distance from 1 under which the temperature reciprocal snaps to exactly 1.
const EPSILON: f64 = 1e-6;

/// Annealing schedule: the temperature starts at `initial` and is lowered by
/// `decrement` after every outer iteration until it reaches `target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    initial: f64,
    decrement: f64,
    target: f64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            initial: 1.0,
            decrement: 0.1,
            target: 1.0,
        }
    }
}

impl Schedule {
    pub fn new(initial: f64, decrement: f64, target: f64) -> Result<Self> {
        let schedule = Self {
            initial,
            decrement,
            target,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn initial(&self) -> f64 {
        self.initial
    }

    pub fn decrement(&self) -> f64 {
        self.decrement
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.target > 0.0 && self.target.is_finite()) {
            return Err(Error::config("target temperature must be positive"));
        }
        if !(self.initial >= self.target && self.initial.is_finite()) {
            return Err(Error::config(
                "initial temperature must not be below the target temperature",
            ));
        }
        let fixed = self.initial == self.target && self.decrement == 0.0;
        if !fixed && !(self.decrement > 0.0 && self.decrement.is_finite()) {
            return Err(Error::config("temperature decrement must be positive"));
        }
        Ok(())
    }

    /// Number of outer iterations needed to go from `initial` to `target`
    pub fn outer_iterations(&self) -> usize {
        self.outer_iterations_from(self.initial)
    }

    /// Number of outer iterations needed to go from `temperature` to `target`
    pub fn outer_iterations_from(&self, temperature: f64) -> usize {
        let steps = ((temperature - self.target) / self.decrement).round();
        if steps > 0.0 {
            steps as usize + 1
        } else {
            1
        }
    }
}

/// Turns a vector of unnormalized scores into a sampling distribution.
pub trait Annealer {
    /// Normalize `probs` in place and return their total.
    ///
    /// If the raw scores do not have a positive finite sum, `probs` is left
    /// untouched and that sum is returned instead.
    fn anneal(&self, probs: &mut [f64]) -> f64;
}

/// Annealer that raises the normalized scores to the power `1 / temperature`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedAnnealer {
    temperature: f64,
    decrement: f64,
    reciprocal: f64,
}

impl SimulatedAnnealer {
    pub fn new(schedule: &Schedule) -> Self {
        Self::starting_at(schedule, schedule.initial)
    }

    /// Follow `schedule` from `temperature` instead of its initial temperature
    pub fn starting_at(schedule: &Schedule, temperature: f64) -> Self {
        Self {
            temperature,
            decrement: schedule.decrement,
            reciprocal: 1.0 / temperature,
        }
    }

    /// Annealer fixed at temperature 1
    pub fn unannealed() -> Self {
        Self {
            temperature: 1.0,
            decrement: 0.0,
            reciprocal: 1.0,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn reciprocal(&self) -> f64 {
        self.reciprocal
    }

    /// Snap the reciprocal to exactly 1 once it is within tolerance of it.
    pub fn stabilize(&mut self) -> bool {
        if self.reciprocal != 1.0 && (self.reciprocal - 1.0).abs() < EPSILON {
            info!(temperature = self.temperature, "temperature stabilized to 1");
            self.reciprocal = 1.0;
        }
        self.reciprocal == 1.0
    }

    /// Lower the temperature by one step
    pub fn cool(&mut self) {
        self.temperature -= self.decrement;
        self.reciprocal = 1.0 / self.temperature;
    }

    /// Undo the last `cool` so that a resumed run starts where this one ended
    pub fn finish(&mut self) {
        self.temperature += self.decrement;
        self.reciprocal = 1.0 / self.temperature;
        self.stabilize();
    }
}

impl Annealer for SimulatedAnnealer {
    fn anneal(&self, probs: &mut [f64]) -> f64 {
        let sum: f64 = probs.iter().sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return sum;
        }
        let mut total = sum;
        if self.reciprocal != 1.0 {
            total = 0.0;
            for p in probs.iter_mut() {
                *p = (*p / sum).powf(self.reciprocal);
                total += *p;
            }
            if !(total > 0.0 && total.is_finite()) {
                return total;
            }
        }
        for p in probs.iter_mut() {
            *p /= total;
        }
        1.0
    }
}

/// Zero-temperature annealer: all mass goes to the first highest score.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaximumPosterior;

impl Annealer for MaximumPosterior {
    fn anneal(&self, probs: &mut [f64]) -> f64 {
        let sum: f64 = probs.iter().sum();
        if !(sum > 0.0 && sum.is_finite()) {
            return sum;
        }
        let mut best = 0;
        for (i, &p) in probs.iter().enumerate() {
            if p > probs[best] {
                best = i;
            }
        }
        for (i, p) in probs.iter_mut().enumerate() {
            *p = if i == best { 1.0 } else { 0.0 };
        }
        1.0
    }
}

/// Draw an index from `probs` by inverse-CDF sampling.
///
/// A uniform variate in `[0, total)` is compared against the running sum;
/// the first index whose cumulative mass exceeds it is returned.
pub fn draw<R: Rng + ?Sized>(probs: &[f64], total: f64, rng: &mut R) -> usize {
    let r = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last = 0;
    for (i, &p) in probs.iter().enumerate() {
        if p > 0.0 {
            last = i;
        }
        cumulative += p;
        if cumulative > r {
            return i;
        }
    }
    // rounding left the variate just above the final cumulative sum
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_schedule_outer_iterations() {
        assert_eq!(Schedule::default().outer_iterations(), 1);
        let schedule = Schedule::new(2.0, 0.1, 1.0).unwrap();
        assert_eq!(schedule.outer_iterations(), 11);
        assert_eq!(schedule.outer_iterations_from(1.5), 6);
    }

    #[test]
    fn test_schedule_validation() {
        let err = Schedule::new(0.5, 0.1, 1.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "initial temperature must not be below the target temperature"
        );
        assert!(Schedule::new(1.0, 0.1, 0.0).is_err());
        assert!(Schedule::new(2.0, 0.0, 1.0).is_err());
        assert_eq!(Schedule::new(1.0, 0.0, 1.0).unwrap().outer_iterations(), 1);
    }

    #[test]
    fn test_anneal_identity_at_temperature_one() {
        let annealer = SimulatedAnnealer::unannealed();
        let mut probs = vec![1.0, 3.0, 4.0];
        let total = annealer.anneal(&mut probs);
        assert_eq!(total, 1.0);
        assert_eq!(probs, vec![0.125, 0.375, 0.5]);
    }

    #[test]
    fn test_anneal_normalizes() {
        let schedule = Schedule::new(3.0, 0.5, 0.5).unwrap();
        let mut annealer = SimulatedAnnealer::new(&schedule);
        for _ in 0..5 {
            let mut probs = vec![0.2, 5.0, 1e-3, 0.0, 7.5];
            annealer.anneal(&mut probs);
            let sum: f64 = probs.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
            annealer.cool();
        }
    }

    #[test]
    fn test_cold_temperature_sharpens() {
        let schedule = Schedule::new(0.5, 0.1, 0.5).unwrap();
        let annealer = SimulatedAnnealer::new(&schedule);
        let mut probs = vec![1.0, 3.0];
        annealer.anneal(&mut probs);
        assert!((probs[1] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_stabilize_and_finish() {
        let schedule = Schedule::new(1.2, 0.1, 1.0).unwrap();
        let mut annealer = SimulatedAnnealer::new(&schedule);
        assert!(!annealer.stabilize());
        annealer.cool();
        annealer.cool();
        assert!(annealer.stabilize());
        assert_eq!(annealer.reciprocal(), 1.0);
        annealer.cool();
        annealer.finish();
        assert!((annealer.temperature() - 1.0).abs() < 1e-9);
        assert_eq!(annealer.reciprocal(), 1.0);
    }

    #[test]
    fn test_degenerate_sum_is_reported() {
        let annealer = SimulatedAnnealer::unannealed();
        let mut probs = vec![0.0, 0.0];
        assert_eq!(annealer.anneal(&mut probs), 0.0);
        let mut probs = vec![f64::NAN, 1.0];
        assert!(annealer.anneal(&mut probs).is_nan());
    }

    #[test]
    fn test_maximum_posterior() {
        let mut probs = vec![0.1, 0.4, 0.4, 0.1];
        assert_eq!(MaximumPosterior.anneal(&mut probs), 1.0);
        assert_eq!(probs, vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_draw_single_nonzero() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let probs = vec![0.0, 0.0, 2.5, 0.0];
            assert_eq!(draw(&probs, 2.5, &mut rng), 2);
        }
    }

    #[test]
    fn test_draw_frequencies() {
        let mut rng = StdRng::seed_from_u64(7);
        let probs = vec![0.25, 0.75];
        let mut hits = [0usize; 2];
        for _ in 0..10_000 {
            hits[draw(&probs, 1.0, &mut rng)] += 1;
        }
        assert!(hits[1] > 7_000 && hits[1] < 8_000);
    }
}
