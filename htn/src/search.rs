use crate::frontier::{Frontier, SearchStack};
use crate::{PlanStep, Planner, Task};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::fmt::{Display, Error, Formatter};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// One emitted solution of an anytime search.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanReport {
    pub plan: Vec<Task>,
    pub cost: f64,
    /// Wall-clock time from the start of the search to this emission.
    pub elapsed: Duration,
}

impl PlanReport {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

impl Display for PlanReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "{} actions, cost {:.2}, found after {:.3}s",
            self.plan.len(),
            self.cost,
            self.elapsed_secs()
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnytimeOptions {
    /// Wall-clock budget; `None` runs until the frontier is exhausted.
    pub timeout: Option<Duration>,
    /// Disables branch-and-bound pruning, so the search revisits nodes that
    /// can no longer improve on the best known cost.
    pub disable_branch_and_bound: bool,
}

impl AnytimeOptions {
    pub fn with_timeout(timeout: Duration) -> AnytimeOptions {
        AnytimeOptions {
            timeout: Some(timeout),
            ..Default::default()
        }
    }
}

/// Branch-and-bound anytime search over a pluggable frontier.
///
/// Iterating yields complete plans with strictly decreasing `total_cost`.
/// Iteration ends when the frontier is exhausted (the last plan emitted is
/// then a global optimum for exhaustive frontiers) or when the deadline
/// passes; the deadline is only checked between node expansions.
pub struct AnytimeSearch<'p, S, F> {
    planner: &'p Planner<S>,
    frontier: F,
    best_cost: Option<f64>,
    disable_bb: bool,
    start: Instant,
    deadline: Option<Instant>,
    expansions: u64,
    done: bool,
}

impl<'p, S: Clone, F: Frontier<S>> AnytimeSearch<'p, S, F> {
    pub fn new(
        planner: &'p Planner<S>,
        mut frontier: F,
        root: PlanStep<S>,
        options: &AnytimeOptions,
    ) -> crate::Result<AnytimeSearch<'p, S, F>> {
        let start = Instant::now();
        frontier.enqueue_all(vec![root])?;
        Ok(AnytimeSearch {
            planner,
            frontier,
            best_cost: None,
            disable_bb: options.disable_branch_and_bound,
            start,
            deadline: options.timeout.map(|t| start + t),
            expansions: 0,
            done: false,
        })
    }

    /// Number of nodes popped from the frontier so far.
    pub fn expansions(&self) -> u64 {
        self.expansions
    }
}

impl<S: Clone, F: Frontier<S>> Iterator for AnytimeSearch<'_, S, F> {
    type Item = crate::Result<PlanReport>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(expansions = self.expansions, "anytime search: deadline reached");
                self.done = true;
                return None;
            }
            let Some(step) = self.frontier.dequeue() else {
                debug!(expansions = self.expansions, "anytime search: frontier exhausted");
                self.done = true;
                return None;
            };
            self.expansions += 1;
            if !self.disable_bb && self.best_cost.is_some_and(|best| step.total_cost >= best) {
                continue;
            }
            if step.complete() {
                self.best_cost = Some(step.total_cost);
                let report = PlanReport {
                    plan: step.plan_vec(),
                    cost: step.total_cost,
                    elapsed: self.start.elapsed(),
                };
                debug!(
                    cost = report.cost,
                    actions = report.plan.len(),
                    expansions = self.expansions,
                    "anytime search: improving plan"
                );
                return Some(Ok(report));
            }
            trace!(depth = step.depth(), remaining = step.tasks.len(), "expanding");
            match step.successors(self.planner) {
                Ok(successors) => {
                    if let Err(e) = self.frontier.enqueue_all(successors) {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<S: Clone> Planner<S> {
    /// First complete plan found by depth-first search, or `None` when the
    /// whole decomposition tree is exhausted without one.
    pub fn first_plan(&self, state: &S, tasks: &[Task]) -> crate::Result<Option<PlanReport>> {
        let root = PlanStep::root(state.clone(), tasks.iter().cloned());
        let mut search =
            AnytimeSearch::new(self, SearchStack::new(), root, &AnytimeOptions::default())?;
        search.next().transpose()
    }

    /// Anytime branch-and-bound with the default LIFO frontier. Returns the
    /// emitted plans in discovery order, costs strictly decreasing; given
    /// enough time the last one is a global minimum.
    pub fn anytime(
        &self,
        state: &S,
        tasks: &[Task],
        options: &AnytimeOptions,
    ) -> crate::Result<Vec<PlanReport>> {
        self.anytime_with_frontier(state, tasks, options, SearchStack::new())
    }

    /// Anytime branch-and-bound over a caller-chosen frontier.
    pub fn anytime_with_frontier<F: Frontier<S>>(
        &self,
        state: &S,
        tasks: &[Task],
        options: &AnytimeOptions,
        frontier: F,
    ) -> crate::Result<Vec<PlanReport>> {
        let root = PlanStep::root(state.clone(), tasks.iter().cloned());
        AnytimeSearch::new(self, frontier, root, options)?.collect()
    }

    /// Anytime random search: keeps rolling until the budget expires and
    /// emits every rollout that beats the best cost so far. With
    /// `use_max_cost`, the current best is passed to the rollout as a cap
    /// so overshooting trajectories abort early.
    pub fn anytime_random(
        &self,
        state: &S,
        tasks: &[Task],
        timeout: Duration,
        use_max_cost: bool,
    ) -> crate::Result<Vec<PlanReport>> {
        let mut rng = SmallRng::seed_from_u64(self.seed);
        improving_stream(timeout, |best| {
            let cap = if use_max_cost { best } else { None };
            let root = PlanStep::root(state.clone(), tasks.iter().cloned());
            Ok(self
                .rollout_from(&mut rng, root, cap)?
                .map(|end| (end.plan_vec(), end.total_cost)))
        })
    }
}

/// Shared outer loop of the single-shot strategies: run `shot` until the
/// budget expires, keep every result that improves on the best cost so far.
/// `shot` receives the current best cost (usable as a pruning cap).
pub(crate) fn improving_stream<E>(
    timeout: Duration,
    mut shot: impl FnMut(Option<f64>) -> Result<Option<(Vec<Task>, f64)>, E>,
) -> Result<Vec<PlanReport>, E> {
    let start = Instant::now();
    let mut best: Option<f64> = None;
    let mut reports = Vec::new();
    while start.elapsed() < timeout {
        let outcome = shot(best)?;
        let elapsed = start.elapsed();
        if let Some((plan, cost)) = outcome {
            if best.map_or(true, |b| cost < b) {
                debug!(cost, elapsed = ?elapsed, "improving rollout");
                reports.push(PlanReport { plan, cost, elapsed });
                best = Some(cost);
            }
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frontier::HybridQueue;
    use crate::{task, DomainError, TaskList};

    /// Two-route domain: reach the target by unit bumps or by a single
    /// expensive leap, so the search has a cheap and a costly plan.
    fn planner() -> Planner<i64> {
        let mut p = Planner::new();
        p.declare_operator("bump", |state: &mut i64, _| {
            *state += 1;
            true
        });
        p.declare_operator("leap", |state: &mut i64, args| {
            *state += args[0].int().unwrap_or(0);
            true
        });
        p.set_cost_fn(|_, task| match task.name.as_str() {
            "leap" => 10.0,
            _ => 1.0,
        });
        p.declare_method("reach", |state: &i64, args| {
            let target = args[0].int().unwrap_or(0);
            if *state >= target {
                TaskList::Completed
            } else {
                TaskList::of(vec![
                    vec![task!("bump"), task!("reach", target)],
                    vec![task!("leap", target - *state)],
                ])
            }
        });
        p
    }

    #[test]
    fn first_plan_is_the_depth_first_one() {
        let p = planner();
        let report = p.first_plan(&0, &[task!("reach", 3)]).unwrap().unwrap();
        // the stack pops the last option first, so the leap route comes out
        assert_eq!(report.plan, vec![task!("leap", 3)]);
        assert_eq!(report.cost, 10.0);
    }

    #[test]
    fn anytime_costs_strictly_decrease_and_end_at_the_optimum() {
        let p = planner();
        let reports = p
            .anytime(&0, &[task!("reach", 3)], &AnytimeOptions::default())
            .unwrap();
        assert!(!reports.is_empty());
        for pair in reports.windows(2) {
            assert!(pair[1].cost < pair[0].cost);
        }
        assert_eq!(reports.last().unwrap().cost, 3.0);
        assert_eq!(
            reports.last().unwrap().plan,
            vec![task!("bump"), task!("bump"), task!("bump")]
        );
    }

    #[test]
    fn disabling_branch_and_bound_still_terminates() {
        let p = planner();
        let options = AnytimeOptions {
            disable_branch_and_bound: true,
            ..Default::default()
        };
        let reports = p.anytime(&0, &[task!("reach", 2)], &options).unwrap();
        // without pruning, non-improving plans are re-emitted only if
        // complete nodes survive; the final plan is still the optimum
        assert_eq!(reports.last().unwrap().cost, 2.0);
    }

    #[test]
    fn hybrid_frontier_finds_the_same_optimum() {
        let p = planner();
        let reports = p
            .anytime_with_frontier(
                &0,
                &[task!("reach", 3)],
                &AnytimeOptions::default(),
                HybridQueue::new(),
            )
            .unwrap();
        assert_eq!(reports.last().unwrap().cost, 3.0);
    }

    #[test]
    fn unresolved_task_surfaces_as_error() {
        let p = planner();
        let err = p.anytime(&0, &[task!("warp")], &AnytimeOptions::default());
        assert_eq!(err, Err(DomainError::UnresolvedTask(task!("warp"))));
    }

    #[test]
    fn anytime_random_improves_monotonically() {
        let p = planner();
        let reports = p
            .anytime_random(&0, &[task!("reach", 3)], Duration::from_millis(50), true)
            .unwrap();
        assert!(!reports.is_empty());
        for pair in reports.windows(2) {
            assert!(pair[1].cost < pair[0].cost);
        }
        // every emitted plan replays to its announced cost
        for report in &reports {
            let states = p.plan_states(&0, &report.plan).unwrap();
            assert_eq!(states.len(), report.plan.len() + 1);
        }
    }
}
