//! Incremental-prefix random search: find first actions whose rollouts
//! reliably lead to cheap plans, commit them as an immovable prefix, then
//! keep exploring from the state the prefix reaches.

use crate::search::PlanReport;
use crate::stats::OutcomeCounter;
use crate::{PlanStep, Planner, Task};
use hashbrown::HashMap;
use im::Vector;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

fn double(threshold: f64) -> f64 {
    threshold * 2.0
}

/// Tuning of [`Planner::anytime_incremental`].
#[derive(Debug, Copy, Clone)]
pub struct IncrementalOptions {
    /// Commit a prefix step once the episode has gathered at least this
    /// many samples per distinct first action.
    pub min_avg_samples: f64,
    /// Growth applied to the sample threshold after a dead-end reset; the
    /// threshold is never decreased. Defaults to doubling.
    pub growth: fn(f64) -> f64,
}

impl Default for IncrementalOptions {
    fn default() -> Self {
        IncrementalOptions {
            min_avg_samples: 3.0,
            growth: double,
        }
    }
}

/// Per-episode bookkeeping, keyed by the first action of each rollout.
struct PrefixTracker<S> {
    start_state: Arc<S>,
    start_tasks: Vector<Task>,
    plan_prefix: Vec<Task>,
    prefix_cost: f64,
    state: Arc<S>,
    tasks: Vector<Task>,
    outcomes: HashMap<Task, OutcomeCounter>,
    forward_state: HashMap<Task, Arc<S>>,
    forward_cost: HashMap<Task, f64>,
    forward_tasks: HashMap<Task, Vector<Task>>,
    episode_samples: usize,
    num_resets: u64,
}

impl<S> PrefixTracker<S> {
    fn new(state: S, tasks: &[Task]) -> PrefixTracker<S> {
        let state = Arc::new(state);
        let tasks: Vector<Task> = tasks.iter().cloned().collect();
        PrefixTracker {
            start_state: state.clone(),
            start_tasks: tasks.clone(),
            plan_prefix: Vec::new(),
            prefix_cost: 0.0,
            state,
            tasks,
            outcomes: HashMap::new(),
            forward_state: HashMap::new(),
            forward_cost: HashMap::new(),
            forward_tasks: HashMap::new(),
            episode_samples: 0,
            num_resets: 0,
        }
    }

    /// Drops the committed prefix and restores the original state/tasks.
    fn full_reset(&mut self) {
        self.num_resets += 1;
        self.plan_prefix.clear();
        self.prefix_cost = 0.0;
        self.state = self.start_state.clone();
        self.tasks = self.start_tasks.clone();
        self.partial_reset();
    }

    /// Starts a fresh sampling episode, keeping the committed prefix.
    fn partial_reset(&mut self) {
        self.outcomes.clear();
        self.forward_state.clear();
        self.forward_cost.clear();
        self.forward_tasks.clear();
        self.episode_samples = 0;
    }

    /// Folds a successful rollout chain into the episode statistics and
    /// caches the one-step-forward snapshot of its first action.
    fn record(&mut self, chain: &[PlanStep<S>]) {
        let terminal = &chain[chain.len() - 1];
        let Some(first) = terminal.plan.front().cloned() else {
            return;
        };
        if !self.outcomes.contains_key(&first) {
            // the step whose head is the first action is immediately
            // followed by the step that applied it
            if let Some(after) = chain
                .windows(2)
                .find(|pair| pair[0].tasks.front() == Some(&first))
                .map(|pair| &pair[1])
            {
                self.forward_state.insert(first.clone(), after.state.clone());
                self.forward_cost.insert(first.clone(), after.current_cost);
                self.forward_tasks.insert(first.clone(), after.tasks.clone());
            }
            self.outcomes.insert(first.clone(), OutcomeCounter::new());
        }
        if let Some(counter) = self.outcomes.get_mut(&first) {
            counter.record(terminal.total_cost + self.prefix_cost);
        }
        self.episode_samples += 1;
    }

    fn ready_to_commit(&self, threshold: f64) -> bool {
        !self.outcomes.is_empty()
            && self.episode_samples as f64 / self.outcomes.len() as f64 >= threshold
    }

    /// Appends the first action with the lowest mean outcome to the prefix
    /// and advances the episode state to its cached snapshot. Equal means
    /// break ties by task order, keeping the commit deterministic.
    fn commit_best(&mut self) {
        let best = self
            .outcomes
            .iter()
            .filter(|(_, counter)| counter.num_succeeded() > 0)
            .min_by(|(task_a, a), (task_b, b)| {
                a.mean().total_cmp(&b.mean()).then_with(|| task_a.cmp(task_b))
            })
            .map(|(task, _)| task.clone());
        let Some(task) = best else { return };
        let (Some(state), Some(cost), Some(tasks)) = (
            self.forward_state.get(&task).cloned(),
            self.forward_cost.get(&task).copied(),
            self.forward_tasks.get(&task).cloned(),
        ) else {
            return;
        };
        debug!(action = %task, cost, "committing prefix step");
        self.plan_prefix.push(task);
        self.prefix_cost += cost;
        self.state = state;
        self.tasks = tasks;
        self.partial_reset();
    }
}

impl<S: Clone> Planner<S> {
    /// Anytime random search with incremental prefix commitment.
    ///
    /// Rollouts run from the committed-prefix state. A dead end (or a
    /// rollout producing no action at all) triggers a full reset and grows
    /// the sample threshold through `options.growth`: the domain is harder
    /// than assumed, so more evidence is required before committing.
    pub fn anytime_incremental(
        &self,
        state: &S,
        tasks: &[Task],
        timeout: Duration,
        options: &IncrementalOptions,
    ) -> crate::Result<Vec<PlanReport>> {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let mut tracker = PrefixTracker::new(state.clone(), tasks);
        let mut threshold = options.min_avg_samples;
        let start = Instant::now();
        let mut best: Option<f64> = None;
        let mut reports = Vec::new();
        while start.elapsed() < timeout {
            let root = PlanStep {
                plan: Vector::new(),
                tasks: tracker.tasks.clone(),
                state: tracker.state.clone(),
                current_cost: 0.0,
                total_cost: 0.0,
            };
            let chain = self.rollout_steps_from(&mut rng, root)?;
            let elapsed = start.elapsed();
            match chain {
                Some(chain) if !chain[chain.len() - 1].plan.is_empty() => {
                    tracker.record(&chain);
                    let terminal = &chain[chain.len() - 1];
                    let cost = tracker.prefix_cost + terminal.total_cost;
                    if best.map_or(true, |b| cost < b) {
                        let mut plan = tracker.plan_prefix.clone();
                        plan.extend(terminal.plan.iter().cloned());
                        debug!(cost, prefix = tracker.plan_prefix.len(), "improving plan");
                        reports.push(PlanReport { plan, cost, elapsed });
                        best = Some(cost);
                    }
                    if tracker.ready_to_commit(threshold) {
                        tracker.commit_best();
                    }
                }
                _ => {
                    threshold = (options.growth)(threshold);
                    debug!(
                        threshold,
                        resets = tracker.num_resets + 1,
                        "dead end; resetting prefix and raising sample threshold"
                    );
                    tracker.full_reset();
                }
            }
        }
        Ok(reports)
    }
}
