use crate::planner::TaskEntry;
use crate::{DomainError, Planner, Task, TaskList};
use im::Vector;
use std::sync::Arc;

/// A node of the decomposition search tree.
///
/// `plan` is the sequence of operator applications accumulated so far,
/// `tasks` the queue of remaining tasks (head is processed next) and
/// `state` the world snapshot reached by `plan`. Both sequences are
/// persistent vectors, so siblings share structure with their parent, and
/// the state snapshot is shared by all method successors of a node.
#[derive(Debug, PartialEq)]
pub struct PlanStep<S> {
    pub plan: Vector<Task>,
    pub tasks: Vector<Task>,
    pub state: Arc<S>,
    /// Cost of the last applied operator (0 after a method expansion).
    pub current_cost: f64,
    /// Sum of `current_cost` over the whole ancestor chain; nondecreasing
    /// along any path from the root.
    pub total_cost: f64,
}

impl<S> Clone for PlanStep<S> {
    fn clone(&self) -> Self {
        PlanStep {
            plan: self.plan.clone(),
            tasks: self.tasks.clone(),
            state: self.state.clone(),
            current_cost: self.current_cost,
            total_cost: self.total_cost,
        }
    }
}

impl<S> PlanStep<S> {
    pub fn root(state: S, tasks: impl IntoIterator<Item = Task>) -> PlanStep<S> {
        PlanStep {
            plan: Vector::new(),
            tasks: tasks.into_iter().collect(),
            state: Arc::new(state),
            current_cost: 0.0,
            total_cost: 0.0,
        }
    }

    pub fn depth(&self) -> usize {
        self.plan.len()
    }

    /// A complete node carries a full plan: its task queue is exhausted.
    pub fn complete(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn plan_vec(&self) -> Vec<Task> {
        self.plan.iter().cloned().collect()
    }
}

impl<S: Clone> PlanStep<S> {
    /// Expands this node into its successors by resolving the head task.
    ///
    /// An operator head yields at most one successor (none if the operator
    /// rejects the cloned state). A method head yields one successor per
    /// option, in the order the method returned them, all sharing this
    /// node's state and plan. The result is deterministic: repeated calls
    /// produce identical successor lists.
    pub fn successors(&self, planner: &Planner<S>) -> crate::Result<Vec<PlanStep<S>>> {
        let head = match self.tasks.front() {
            Some(task) => task.clone(),
            None => return Ok(Vec::new()),
        };
        match planner.entries.get(&head.name) {
            None => Err(DomainError::UnresolvedTask(head)),
            Some(TaskEntry::Operator(operator)) => {
                let mut next_state = (*self.state).clone();
                if !operator(&mut next_state, &head.args) {
                    return Ok(Vec::new());
                }
                let current_cost = (planner.cost)(&self.state, &head);
                let mut plan = self.plan.clone();
                plan.push_back(head);
                Ok(vec![PlanStep {
                    plan,
                    tasks: self.tasks.skip(1),
                    state: Arc::new(next_state),
                    current_cost,
                    total_cost: self.total_cost + current_cost,
                }])
            }
            Some(TaskEntry::Method(method)) => {
                let expansion = method(&self.state, &head.args);
                let tail = self.tasks.skip(1);
                match expansion {
                    TaskList::Completed => Ok(vec![PlanStep {
                        plan: self.plan.clone(),
                        tasks: tail,
                        state: self.state.clone(),
                        current_cost: 0.0,
                        total_cost: self.total_cost,
                    }]),
                    TaskList::Options(options) => Ok(options
                        .into_iter()
                        .map(|option| {
                            let mut tasks: Vector<Task> = option.into_iter().collect();
                            tasks.append(tail.clone());
                            PlanStep {
                                plan: self.plan.clone(),
                                tasks,
                                state: self.state.clone(),
                                current_cost: 0.0,
                                total_cost: self.total_cost,
                            }
                        })
                        .collect()),
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{task, TaskList};

    /// Counter domain: `bump` adds 1, `reach n` decomposes into one `bump`
    /// per remaining unit, with a binary choice between bumping now or
    /// twice later.
    fn planner() -> Planner<i64> {
        let mut p = Planner::new();
        p.declare_operator("bump", |state: &mut i64, _args| {
            *state += 1;
            true
        });
        p.declare_operator("cap", |state: &mut i64, args| {
            *state <= args[0].int().unwrap_or(0)
        });
        p.declare_method("reach", |state: &i64, args| {
            let target = args[0].int().unwrap_or(0);
            if *state >= target {
                TaskList::Completed
            } else {
                TaskList::of(vec![
                    vec![task!("bump"), task!("reach", target)],
                    vec![task!("bump"), task!("bump"), task!("reach", target)],
                ])
            }
        });
        p
    }

    #[test]
    fn operator_expansion_applies_cost_and_consumes_head() {
        let p = planner();
        let root = PlanStep::root(0i64, [task!("bump"), task!("reach", 1)]);
        let succ = root.successors(&p).unwrap();
        assert_eq!(succ.len(), 1);
        assert_eq!(*succ[0].state, 1);
        assert_eq!(succ[0].plan_vec(), vec![task!("bump")]);
        assert_eq!(succ[0].tasks.len(), 1);
        assert_eq!(succ[0].total_cost, 1.0);
        assert_eq!(succ[0].current_cost, 1.0);
    }

    #[test]
    fn rejected_operator_produces_no_successor() {
        let p = planner();
        let root = PlanStep::root(5i64, [task!("cap", 3)]);
        assert!(root.successors(&p).unwrap().is_empty());
    }

    #[test]
    fn method_options_prepend_to_queue_in_order() {
        let p = planner();
        let root = PlanStep::root(0i64, [task!("reach", 2), task!("cap", 10)]);
        let succ = root.successors(&p).unwrap();
        assert_eq!(succ.len(), 2);
        // first option: bump, reach, then the untouched tail
        let queue: Vec<Task> = succ[0].tasks.iter().cloned().collect();
        assert_eq!(queue, vec![task!("bump"), task!("reach", 2), task!("cap", 10)]);
        // method expansion costs nothing and shares the parent state
        assert_eq!(succ[0].total_cost, 0.0);
        assert!(Arc::ptr_eq(&succ[0].state, &root.state));
    }

    #[test]
    fn completed_method_consumes_head_only() {
        let p = planner();
        let root = PlanStep::root(7i64, [task!("reach", 2), task!("cap", 10)]);
        let succ = root.successors(&p).unwrap();
        assert_eq!(succ.len(), 1);
        let queue: Vec<Task> = succ[0].tasks.iter().cloned().collect();
        assert_eq!(queue, vec![task!("cap", 10)]);
        assert!(succ[0].plan.is_empty());
    }

    #[test]
    fn unresolved_head_fails_loudly() {
        let p = planner();
        let root = PlanStep::root(0i64, [task!("fly")]);
        assert_eq!(
            root.successors(&p),
            Err(DomainError::UnresolvedTask(task!("fly")))
        );
    }

    #[test]
    fn expansion_is_deterministic() {
        let p = planner();
        let root = PlanStep::root(0i64, [task!("reach", 3)]);
        let a = root.successors(&p).unwrap();
        let b = root.successors(&p).unwrap();
        assert_eq!(a, b);
    }
}
