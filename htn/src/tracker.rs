//! Tracked random search: every nontrivial choice point samples its
//! successor from a rank-biased distribution informed by the observed
//! outcomes of earlier rollouts.

use crate::search::{improving_stream, PlanReport};
use crate::stats::{rank_decay_weights, OutcomeCounter};
use crate::{PlanStep, Planner, Task};
use hashbrown::{HashMap, HashSet};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Outcome statistics per decision point, keyed by the head task of the
/// chosen successor's remaining queue (distinct options at the same parent
/// introduce distinct head tasks).
#[derive(Default)]
pub struct ActionTracker {
    outcomes: HashMap<Task, OutcomeCounter>,
}

impl ActionTracker {
    pub fn new() -> ActionTracker {
        Default::default()
    }

    pub fn outcome(&self, key: &Task) -> Option<&OutcomeCounter> {
        self.outcomes.get(key)
    }

    /// Probability assigned to each successor.
    ///
    /// Successors whose key has recorded outcomes ("seen") collectively
    /// receive `seen/n` of the probability mass, split by rank with
    /// exponentially decaying weights (best counter first); unseen
    /// successors split the remainder equally. With at most one seen
    /// successor there is nothing to rank and the choice is uniform.
    /// The returned probabilities always sum to 1.
    pub fn distribution<S>(&self, successors: &[PlanStep<S>]) -> Vec<f64> {
        let n = successors.len();
        let ranked: Vec<(usize, &OutcomeCounter)> = successors
            .iter()
            .enumerate()
            .filter_map(|(i, s)| {
                s.tasks.front().and_then(|key| self.outcomes.get(key)).map(|c| (i, c))
            })
            .collect();
        if ranked.len() <= 1 {
            return vec![1.0 / n as f64; n];
        }
        let seen_budget = ranked.len() as f64 / n as f64;
        let mut probabilities = if ranked.len() < n {
            let unseen_share = (1.0 - seen_budget) / (n - ranked.len()) as f64;
            vec![unseen_share; n]
        } else {
            vec![0.0; n]
        };
        let mut ranking = ranked;
        // stable sort: ties keep successor order
        ranking.sort_by(|(_, a), (_, b)| a.order(b));
        let weights = rank_decay_weights(ranking.len(), seen_budget);
        for ((index, _), weight) in ranking.into_iter().zip(weights) {
            probabilities[index] = weight;
        }
        probabilities
    }

    /// Draws a successor index from [`ActionTracker::distribution`].
    pub fn sample_index<S>(&self, rng: &mut SmallRng, successors: &[PlanStep<S>]) -> usize {
        let probabilities = self.distribution(successors);
        let mut r: f64 = rng.random();
        for (index, share) in probabilities.iter().enumerate() {
            if *share > r {
                return index;
            }
            r -= share;
        }
        // floating-point residue; the last successor absorbs it
        probabilities.len() - 1
    }

    /// Charges a terminated rollout to every distinct key chosen on its
    /// path: the plan cost on success, a failure mark on a dead end.
    pub(crate) fn record_path(&mut self, keys: &[Task], outcome: Option<f64>) {
        let mut recorded: HashSet<&Task> = HashSet::new();
        for key in keys {
            if !recorded.insert(key) {
                continue;
            }
            let counter = self.outcomes.entry(key.clone()).or_default();
            match outcome {
                Some(cost) => counter.record(cost),
                None => counter.failure(),
            }
        }
    }
}

impl<S: Clone> Planner<S> {
    /// One rollout guided by `tracker`. Forced moves (a single successor)
    /// are taken without recording when `ignore_single` is set; every other
    /// choice is sampled from the rank-biased distribution and its key is
    /// remembered so the terminal outcome can be charged to it.
    pub fn tracked_rollout(
        &self,
        rng: &mut SmallRng,
        tracker: &mut ActionTracker,
        root: PlanStep<S>,
        ignore_single: bool,
    ) -> crate::Result<Option<PlanStep<S>>> {
        let mut candidate = root;
        let mut chosen: Vec<Task> = Vec::new();
        loop {
            if candidate.complete() {
                tracker.record_path(&chosen, Some(candidate.total_cost));
                return Ok(Some(candidate));
            }
            let mut options = candidate.successors(self)?;
            if options.is_empty() {
                tracker.record_path(&chosen, None);
                return Ok(None);
            }
            if ignore_single && options.len() == 1 {
                candidate = options.swap_remove(0);
                continue;
            }
            let index = if options.len() == 1 {
                0
            } else {
                tracker.sample_index(rng, &options)
            };
            candidate = options.swap_remove(index);
            if let Some(key) = candidate.tasks.front() {
                chosen.push(key.clone());
            }
        }
    }

    /// Anytime tracked random search: rollouts share one [`ActionTracker`],
    /// so later rollouts are biased towards choices that led to cheap plans
    /// and away from dead ends.
    pub fn anytime_tracked(
        &self,
        state: &S,
        tasks: &[Task],
        timeout: Duration,
        ignore_single: bool,
    ) -> crate::Result<Vec<PlanReport>> {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut tracker = ActionTracker::new();
        improving_stream(timeout, |_best| {
            let root = PlanStep::root(state.clone(), tasks.iter().cloned());
            Ok(self
                .tracked_rollout(&mut rng, &mut tracker, root, ignore_single)?
                .map(|end| (end.plan_vec(), end.total_cost)))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{task, TaskList, Value};
    use im::Vector;
    use std::sync::Arc;

    fn step_with_head(name: &str, arg: i64) -> PlanStep<()> {
        PlanStep {
            plan: Vector::new(),
            tasks: [Task::new(name, [Value::Int(arg)])].into_iter().collect(),
            state: Arc::new(()),
            current_cost: 0.0,
            total_cost: 0.0,
        }
    }

    #[test]
    fn uniform_until_two_choices_are_seen() {
        let mut tracker = ActionTracker::new();
        let successors: Vec<PlanStep<()>> =
            (0..4).map(|i| step_with_head("opt", i)).collect();
        assert_eq!(tracker.distribution(&successors), vec![0.25; 4]);
        tracker.record_path(&[task!("opt", 0)], Some(3.0));
        // one seen successor is still not rankable
        assert_eq!(tracker.distribution(&successors), vec![0.25; 4]);
    }

    #[test]
    fn all_seen_ranks_get_halving_shares() {
        let mut tracker = ActionTracker::new();
        // costs order the options: 1 < 2 < 3 < 4
        for (i, cost) in [(2i64, 30.0), (0, 10.0), (3, 40.0), (1, 20.0)] {
            tracker.record_path(&[task!("opt", i)], Some(cost));
        }
        let successors: Vec<PlanStep<()>> =
            (0..4).map(|i| step_with_head("opt", i)).collect();
        let d = tracker.distribution(&successors);
        let expected = [8.0 / 15.0, 4.0 / 15.0, 2.0 / 15.0, 1.0 / 15.0];
        for (got, want) in d.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn mixed_seen_unseen_splits_the_budget() {
        let mut tracker = ActionTracker::new();
        tracker.record_path(&[task!("opt", 0)], Some(10.0));
        tracker.record_path(&[task!("opt", 1)], Some(20.0));
        let successors: Vec<PlanStep<()>> =
            (0..4).map(|i| step_with_head("opt", i)).collect();
        let d = tracker.distribution(&successors);
        // seen budget 2/4, unseen each (1 - 0.5) / 2
        assert!((d[0] - 0.5 * (2.0 / 3.0)).abs() < 1e-12);
        assert!((d[1] - 0.5 * (1.0 / 3.0)).abs() < 1e-12);
        assert!((d[2] - 0.25).abs() < 1e-12);
        assert!((d[3] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn distribution_sums_to_one_for_any_partition() {
        let mut rng = SmallRng::seed_from_u64(42);
        for n in 1..=32usize {
            let mut tracker = ActionTracker::new();
            for i in 0..n {
                if rng.random::<bool>() {
                    if rng.random::<bool>() {
                        tracker.record_path(&[task!("opt", i as i64)], Some(rng.random::<f64>() * 50.0));
                    } else {
                        tracker.record_path(&[task!("opt", i as i64)], None);
                    }
                }
            }
            let successors: Vec<PlanStep<()>> =
                (0..n).map(|i| step_with_head("opt", i as i64)).collect();
            let sum: f64 = tracker.distribution(&successors).iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "n={n}: sum={sum}");
        }
    }

    #[test]
    fn failures_push_probability_mass_away() {
        let mut tracker = ActionTracker::new();
        tracker.record_path(&[task!("opt", 0)], Some(10.0));
        for _ in 0..5 {
            tracker.record_path(&[task!("opt", 1)], None);
        }
        let successors: Vec<PlanStep<()>> =
            (0..2).map(|i| step_with_head("opt", i)).collect();
        let d = tracker.distribution(&successors);
        assert!(d[0] > d[1]);
    }

    #[test]
    fn duplicate_keys_on_a_path_are_charged_once() {
        let mut tracker = ActionTracker::new();
        tracker.record_path(&[task!("opt", 0), task!("opt", 0)], Some(4.0));
        let counter = tracker.outcome(&task!("opt", 0)).unwrap();
        assert_eq!(counter.num_succeeded(), 1);
    }

    #[test]
    fn tracked_search_converges_to_the_cheap_route() {
        let mut p: Planner<i64> = Planner::new();
        p.set_seed(7);
        p.declare_operator("step", |state: &mut i64, _| {
            *state += 1;
            true
        });
        p.declare_operator("vault", |state: &mut i64, _| {
            *state += 1;
            true
        });
        p.set_cost_fn(|_, task| if task.name.as_str() == "vault" { 5.0 } else { 1.0 });
        p.declare_method("climb", |state: &i64, args| {
            let target = args[0].int().unwrap_or(0);
            if *state >= target {
                TaskList::Completed
            } else {
                TaskList::of(vec![
                    vec![task!("step"), task!("climb", target)],
                    vec![task!("vault"), task!("climb", target)],
                ])
            }
        });
        let reports = p
            .anytime_tracked(&0, &[task!("climb", 4)], Duration::from_millis(60), true)
            .unwrap();
        assert!(!reports.is_empty());
        for pair in reports.windows(2) {
            assert!(pair[1].cost < pair[0].cost);
        }
        for report in &reports {
            let states = p.plan_states(&0, &report.plan).unwrap();
            assert_eq!(*states.last().unwrap(), 4);
        }
    }
}
