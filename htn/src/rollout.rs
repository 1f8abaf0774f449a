use crate::{PlanStep, Planner, Task};
use rand::rngs::SmallRng;
use rand::Rng;

impl<S: Clone> Planner<S> {
    /// One random descent from `(state, tasks)` to a terminal node.
    ///
    /// At every step one successor is drawn uniformly. Returns `None` on a
    /// dead end, or — when `max_cost` is set — as soon as the accumulated
    /// cost can no longer beat it.
    pub fn random_rollout(
        &self,
        rng: &mut SmallRng,
        state: &S,
        tasks: &[Task],
        max_cost: Option<f64>,
    ) -> crate::Result<Option<PlanStep<S>>> {
        self.rollout_from(rng, PlanStep::root(state.clone(), tasks.iter().cloned()), max_cost)
    }

    /// Like [`Planner::random_rollout`] but returns the entire node chain
    /// from the root to the terminal node, for prefix extraction.
    pub fn random_rollout_steps(
        &self,
        rng: &mut SmallRng,
        state: &S,
        tasks: &[Task],
    ) -> crate::Result<Option<Vec<PlanStep<S>>>> {
        self.rollout_steps_from(rng, PlanStep::root(state.clone(), tasks.iter().cloned()))
    }

    pub(crate) fn rollout_from(
        &self,
        rng: &mut SmallRng,
        root: PlanStep<S>,
        max_cost: Option<f64>,
    ) -> crate::Result<Option<PlanStep<S>>> {
        let mut candidate = root;
        loop {
            if candidate.complete() {
                return Ok(Some(candidate));
            }
            let mut successors = candidate.successors(self)?;
            if successors.is_empty() || max_cost.is_some_and(|cap| candidate.total_cost >= cap) {
                return Ok(None);
            }
            let choice = rng.random_range(0..successors.len());
            candidate = successors.swap_remove(choice);
        }
    }

    pub(crate) fn rollout_steps_from(
        &self,
        rng: &mut SmallRng,
        root: PlanStep<S>,
    ) -> crate::Result<Option<Vec<PlanStep<S>>>> {
        let mut chain = vec![root];
        loop {
            let last = &chain[chain.len() - 1];
            if last.complete() {
                return Ok(Some(chain));
            }
            let mut successors = last.successors(self)?;
            if successors.is_empty() {
                return Ok(None);
            }
            let choice = rng.random_range(0..successors.len());
            let next = successors.swap_remove(choice);
            chain.push(next);
        }
    }
}
