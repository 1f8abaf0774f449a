//! Outcome statistics shared by the randomized planning drivers.

use std::cmp::Ordering;
use std::fmt::{Display, Error, Formatter};

/// Per-choice summary of rollout outcomes, with explicit failure tracking.
///
/// The ordering contract ("which choice looks cheaper") is pairwise: a
/// counter with no successes is worse than any counter with successes, two
/// all-failure counters compare by failure count, and otherwise the
/// comparison uses the penalized mean where each failure is charged
/// `2 * max(self.max, other.max)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeCounter {
    total: f64,
    num_succeeded: u64,
    min: Option<f64>,
    max: Option<f64>,
    num_failed: u64,
}

impl OutcomeCounter {
    pub fn new() -> OutcomeCounter {
        Default::default()
    }

    /// Records the cost of one successful outcome.
    pub fn record(&mut self, outcome: f64) {
        self.total += outcome;
        self.num_succeeded += 1;
        if self.min.map_or(true, |m| m > outcome) {
            self.min = Some(outcome);
        }
        if self.max.map_or(true, |m| m < outcome) {
            self.max = Some(outcome);
        }
    }

    /// Records one dead-end outcome.
    pub fn failure(&mut self) {
        self.num_failed += 1;
    }

    pub fn num_succeeded(&self) -> u64 {
        self.num_succeeded
    }

    pub fn num_failed(&self) -> u64 {
        self.num_failed
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    /// Mean of the successful outcomes. Meaningless unless at least one
    /// outcome was recorded.
    pub fn mean(&self) -> f64 {
        self.total / self.num_succeeded as f64
    }

    /// Mean over all outcomes, counting each failure as `failure_penalty`.
    pub fn penalized_mean(&self, failure_penalty: f64) -> f64 {
        (self.total + self.num_failed as f64 * failure_penalty)
            / (self.num_succeeded + self.num_failed) as f64
    }

    /// Pairwise comparison: `Less` means `self` looks like the cheaper choice.
    pub fn order(&self, other: &OutcomeCounter) -> Ordering {
        match (self.num_succeeded, other.num_succeeded) {
            (0, 0) => self.num_failed.cmp(&other.num_failed),
            (0, _) => Ordering::Greater,
            (_, 0) => Ordering::Less,
            _ => {
                // both have at least one success, so both maxima are known
                let worst = match (self.max, other.max) {
                    (Some(a), Some(b)) => a.max(b),
                    _ => 0.0,
                };
                let penalty = 2.0 * worst;
                self.penalized_mean(penalty).total_cmp(&other.penalized_mean(penalty))
            }
        }
    }
}

impl PartialOrd for OutcomeCounter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.order(other))
    }
}

impl Display for OutcomeCounter {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        if self.num_succeeded > 0 {
            write!(
                f,
                "{:.2} [{:.2}, {:.2}] ({} ok, {} failed)",
                self.mean(),
                self.min.unwrap_or(f64::NAN),
                self.max.unwrap_or(f64::NAN),
                self.num_succeeded,
                self.num_failed
            )
        } else {
            write!(f, "no successes ({} failed)", self.num_failed)
        }
    }
}

/// Weights for ranks `0..num_ranked`, halving at each rank and normalized so
/// they sum to `budget`: rank 0 receives about half the budget, rank 1 about
/// a quarter, and so on.
pub fn rank_decay_weights(num_ranked: usize, budget: f64) -> Vec<f64> {
    let weights: Vec<f64> = (0..num_ranked)
        .map(|i| 2f64.powi((num_ranked - i - 1) as i32))
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w * budget / total).collect()
}

/// A 95% confidence interval around a sample mean.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConfidenceInterval {
    pub lo: f64,
    pub mean: f64,
    pub hi: f64,
}

impl Display for ConfidenceInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "95% confidence interval: ({:.2}, {:.2}, {:.2})",
            self.lo, self.mean, self.hi
        )
    }
}

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Two-sided 95% critical values of the Student t distribution for
/// `df = 1..=29`; larger samples fall back to the normal approximation.
const T_CRITICAL_95: [f64; 29] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179, 2.160,
    2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064, 2.060, 2.056,
    2.052, 2.048, 2.045,
];

/// 95% confidence interval for the mean of `values`, or `None` when fewer
/// than two samples are available.
pub fn confidence_interval_95(values: &[f64]) -> Option<ConfidenceInterval> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n - 1) as f64;
    let sem = (variance / n as f64).sqrt();
    let critical = if n < 30 { T_CRITICAL_95[n - 2] } else { 1.96 };
    Some(ConfidenceInterval {
        lo: m - critical * sem,
        mean: m,
        hi: m + critical * sem,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counter_bookkeeping() {
        let mut c = OutcomeCounter::new();
        for outcome in [10.0, 12.0, 14.0] {
            c.record(outcome);
        }
        c.failure();
        c.failure();
        assert_eq!(c.num_succeeded() + c.num_failed(), 5);
        assert_eq!(c.total(), 36.0);
        assert_eq!(c.min(), Some(10.0));
        assert_eq!(c.max(), Some(14.0));
        assert!(c.min().unwrap() <= c.mean() && c.mean() <= c.max().unwrap());
    }

    #[test]
    fn failure_penalty_ordering() {
        // A: successes {10, 12, 14}, no failures -> penalized mean 12.
        // B: successes {8, 9, 10}, two failures; penalty = 2 * max(14, 10) = 28
        // so B's penalized mean is (27 + 56) / 5 = 16.6 and A wins.
        let mut a = OutcomeCounter::new();
        for outcome in [10.0, 12.0, 14.0] {
            a.record(outcome);
        }
        let mut b = OutcomeCounter::new();
        for outcome in [8.0, 9.0, 10.0] {
            b.record(outcome);
        }
        b.failure();
        b.failure();
        assert_eq!(a.penalized_mean(28.0), 12.0);
        assert!((b.penalized_mean(28.0) - 16.6).abs() < 1e-9);
        assert_eq!(a.order(&b), Ordering::Less);
        assert_eq!(b.order(&a), Ordering::Greater);
    }

    #[test]
    fn all_failure_counters_compare_by_failure_count() {
        let mut a = OutcomeCounter::new();
        a.failure();
        let mut b = OutcomeCounter::new();
        b.failure();
        b.failure();
        assert_eq!(a.order(&b), Ordering::Less);
        assert_eq!(a.order(&a.clone()), Ordering::Equal);
        // any success beats any pure failure record
        let mut c = OutcomeCounter::new();
        c.record(1e6);
        assert_eq!(c.order(&a), Ordering::Less);
    }

    #[test]
    fn rank_weights_halve() {
        let w = rank_decay_weights(4, 1.0);
        let expected = [8.0 / 15.0, 4.0 / 15.0, 2.0 / 15.0, 1.0 / 15.0];
        for (got, want) in w.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
        for n in 1..=32 {
            let sum: f64 = rank_decay_weights(n, 0.75).iter().sum();
            assert!((sum - 0.75).abs() < 1e-9);
        }
    }

    #[test]
    fn confidence_interval_brackets_mean() {
        let values = [10.0, 11.0, 9.0, 10.5, 9.5];
        let ci = confidence_interval_95(&values).unwrap();
        assert!(ci.lo < ci.mean && ci.mean < ci.hi);
        assert!((ci.mean - 10.0).abs() < 1e-9);
        assert!(confidence_interval_95(&[1.0]).is_none());
        // constant samples collapse to a zero-width interval
        let ci = confidence_interval_95(&[4.0; 40]).unwrap();
        assert_eq!(ci.lo, ci.hi);
    }
}
