//! Containers of pending search nodes. The discipline of the frontier
//! (LIFO, cost-ordered, Monte-Carlo-rated) is what turns the single anytime
//! driver into depth-first, cheapest-first or rollout-guided search.

use crate::stats;
use crate::{PlanStep, Planner};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub trait Frontier<S> {
    /// Admits a batch of sibling nodes, in successor order.
    fn enqueue_all(&mut self, steps: Vec<PlanStep<S>>) -> crate::Result<()>;
    /// Removes the next node to expand.
    fn dequeue(&mut self) -> Option<PlanStep<S>>;
    fn is_empty(&self) -> bool;
}

/// LIFO frontier: plain depth-first search, the default discipline.
pub struct SearchStack<S> {
    stack: Vec<PlanStep<S>>,
}

impl<S> SearchStack<S> {
    pub fn new() -> SearchStack<S> {
        SearchStack { stack: Vec::new() }
    }
}

impl<S> Default for SearchStack<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Frontier<S> for SearchStack<S> {
    fn enqueue_all(&mut self, steps: Vec<PlanStep<S>>) -> crate::Result<()> {
        self.stack.extend(steps);
        Ok(())
    }

    fn dequeue(&mut self) -> Option<PlanStep<S>> {
        self.stack.pop()
    }

    fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

/// Min-heap entry ordered by a floating-point priority (smallest first).
struct Prioritized<S> {
    step: PlanStep<S>,
    priority: f64,
}

impl<S> PartialEq for Prioritized<S> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl<S> Eq for Prioritized<S> {}
impl<S> PartialOrd for Prioritized<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<S> Ord for Prioritized<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed so that std's max-heap pops the smallest priority
        other.priority.total_cmp(&self.priority)
    }
}

/// Cost-ordered frontier with a one-slot cache: the most recently pushed
/// sibling is popped next regardless of cost, which preserves a DFS-like
/// bias down the current branch while the heap orders everything else
/// globally by `total_cost`.
pub struct HybridQueue<S> {
    heap: BinaryHeap<Prioritized<S>>,
    next_pop: Option<PlanStep<S>>,
}

impl<S> HybridQueue<S> {
    pub fn new() -> HybridQueue<S> {
        HybridQueue {
            heap: BinaryHeap::new(),
            next_pop: None,
        }
    }
}

impl<S> Default for HybridQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Frontier<S> for HybridQueue<S> {
    fn enqueue_all(&mut self, mut steps: Vec<PlanStep<S>>) -> crate::Result<()> {
        // the driver always drains the cache slot before expanding
        debug_assert!(self.next_pop.is_none());
        if let Some(last) = steps.pop() {
            for step in steps {
                let priority = step.total_cost;
                self.heap.push(Prioritized { step, priority });
            }
            self.next_pop = Some(last);
        }
        Ok(())
    }

    fn dequeue(&mut self) -> Option<PlanStep<S>> {
        self.next_pop
            .take()
            .or_else(|| self.heap.pop().map(|p| p.step))
    }

    fn is_empty(&self) -> bool {
        self.next_pop.is_none() && self.heap.is_empty()
    }
}

/// Frontier that rates every enqueued node by the mean total cost of
/// `num_samples` random rollouts launched from it, then expands nodes in
/// rating order. A node from which no rollout completes rates `+inf` and is
/// only expanded once everything with a finite rating is exhausted.
///
/// With `go_deep_first`, the cheapest-rated node of each batch bypasses the
/// heap through a preferred slot, giving the search a depth-first flavor.
pub struct MonteCarloFrontier<'p, S> {
    planner: &'p Planner<S>,
    num_samples: usize,
    go_deep_first: bool,
    preferred: Option<PlanStep<S>>,
    heap: BinaryHeap<Prioritized<S>>,
    rng: SmallRng,
}

impl<'p, S: Clone> MonteCarloFrontier<'p, S> {
    pub const DEFAULT_SAMPLES: usize = 10;

    pub fn new(planner: &'p Planner<S>, go_deep_first: bool) -> MonteCarloFrontier<'p, S> {
        Self::with_samples(planner, Self::DEFAULT_SAMPLES, go_deep_first)
    }

    pub fn with_samples(
        planner: &'p Planner<S>,
        num_samples: usize,
        go_deep_first: bool,
    ) -> MonteCarloFrontier<'p, S> {
        MonteCarloFrontier {
            planner,
            num_samples,
            go_deep_first,
            preferred: None,
            heap: BinaryHeap::new(),
            rng: SmallRng::seed_from_u64(planner.seed),
        }
    }

    fn rate(&mut self, step: &PlanStep<S>) -> crate::Result<f64> {
        let mut costs = Vec::with_capacity(self.num_samples);
        for _ in 0..self.num_samples {
            let probe = PlanStep {
                plan: im::Vector::new(),
                tasks: step.tasks.clone(),
                state: step.state.clone(),
                current_cost: 0.0,
                total_cost: 0.0,
            };
            if let Some(end) = self.planner.rollout_from(&mut self.rng, probe, None)? {
                costs.push(end.total_cost);
            }
        }
        if costs.is_empty() {
            Ok(f64::INFINITY)
        } else {
            Ok(stats::mean(&costs))
        }
    }
}

impl<S: Clone> Frontier<S> for MonteCarloFrontier<'_, S> {
    fn enqueue_all(&mut self, steps: Vec<PlanStep<S>>) -> crate::Result<()> {
        let mut rated = Vec::with_capacity(steps.len());
        for step in steps {
            let priority = self.rate(&step)?;
            rated.push(Prioritized { step, priority });
        }
        if self.go_deep_first && self.preferred.is_none() {
            if let Some(best) = rated
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.priority.total_cmp(&b.priority))
                .map(|(i, _)| i)
            {
                self.preferred = Some(rated.swap_remove(best).step);
            }
        }
        self.heap.extend(rated);
        Ok(())
    }

    fn dequeue(&mut self) -> Option<PlanStep<S>> {
        self.preferred
            .take()
            .or_else(|| self.heap.pop().map(|p| p.step))
    }

    fn is_empty(&self) -> bool {
        self.preferred.is_none() && self.heap.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::task;
    use std::sync::Arc;

    fn step(cost: f64) -> PlanStep<()> {
        PlanStep {
            plan: im::Vector::new(),
            tasks: [task!("t")].into_iter().collect(),
            state: Arc::new(()),
            current_cost: cost,
            total_cost: cost,
        }
    }

    #[test]
    fn stack_pops_most_recent_first() {
        let mut f: SearchStack<()> = SearchStack::new();
        f.enqueue_all(vec![step(1.0), step(2.0), step(3.0)]).unwrap();
        assert_eq!(f.dequeue().unwrap().total_cost, 3.0);
        assert_eq!(f.dequeue().unwrap().total_cost, 2.0);
        f.enqueue_all(vec![step(9.0)]).unwrap();
        assert_eq!(f.dequeue().unwrap().total_cost, 9.0);
        assert_eq!(f.dequeue().unwrap().total_cost, 1.0);
        assert!(f.is_empty());
    }

    #[test]
    fn hybrid_queue_caches_last_sibling_then_orders_by_cost() {
        let mut f: HybridQueue<()> = HybridQueue::new();
        f.enqueue_all(vec![step(5.0), step(1.0), step(4.0)]).unwrap();
        // the most recently pushed sibling jumps the queue
        assert_eq!(f.dequeue().unwrap().total_cost, 4.0);
        f.enqueue_all(vec![step(2.0)]).unwrap();
        assert_eq!(f.dequeue().unwrap().total_cost, 2.0);
        // the rest come out cheapest first
        assert_eq!(f.dequeue().unwrap().total_cost, 1.0);
        assert_eq!(f.dequeue().unwrap().total_cost, 5.0);
        assert!(f.is_empty());
        assert!(f.dequeue().is_none());
    }
}
