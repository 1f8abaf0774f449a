use crate::{Task, TaskList, Value};
use arcstr::ArcStr;
use hashbrown::HashMap;
use thiserror::Error;

/// A primitive action: mutates the fresh state clone it is handed and
/// returns `true`, or returns `false` when its precondition does not hold
/// (the engine then discards the clone, so partial mutations never leak).
pub type OperatorFn<S> = Box<dyn Fn(&mut S, &[Value]) -> bool>;

/// A decomposition rule: reads the state and proposes alternative ordered
/// subtask sequences, or [`TaskList::Completed`] when nothing is left to do.
pub type MethodFn<S> = Box<dyn Fn(&S, &[Value]) -> TaskList>;

/// Cost of applying `task` in the given (pre-application) state.
pub type CostFn<S> = Box<dyn Fn(&S, &Task) -> f64>;

pub(crate) enum TaskEntry<S> {
    Operator(OperatorFn<S>),
    Method(MethodFn<S>),
}

/// Domain-definition bugs. Ordinary planning failures (inapplicable
/// operators, methods without options, exhausted search) are not errors;
/// these indicate a broken domain or an invalid replayed plan.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("task {0} does not name a declared operator or method")]
    UnresolvedTask(Task),
    #[error("plan action {0} does not name a declared operator")]
    NotAnOperator(Task),
    #[error("operator {0} rejected its input state during replay")]
    OperatorRejected(Task),
}

/// Owns the operator/method tables of a planning domain, together with the
/// cost function and the random seed used by the randomized drivers.
///
/// The state type `S` is caller-owned and opaque to the planner; its `Clone`
/// implementation is the branching hook (every operator invocation receives
/// a fresh clone of its parent's state).
pub struct Planner<S> {
    pub(crate) entries: HashMap<ArcStr, TaskEntry<S>>,
    pub(crate) cost: CostFn<S>,
    pub(crate) seed: u64,
}

impl<S> Default for Planner<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Planner<S> {
    /// A planner with no declared tasks, unit costs and seed 0.
    pub fn new() -> Planner<S> {
        Planner {
            entries: HashMap::new(),
            cost: Box::new(|_, _| 1.0),
            seed: 0,
        }
    }

    /// Declares a primitive operator.
    ///
    /// # Panics
    /// Panics if `name` is already declared; a task name must resolve to
    /// exactly one operator or method.
    pub fn declare_operator(
        &mut self,
        name: impl Into<ArcStr>,
        operator: impl Fn(&mut S, &[Value]) -> bool + 'static,
    ) -> &mut Self {
        let name = name.into();
        let previous = self
            .entries
            .insert(name.clone(), TaskEntry::Operator(Box::new(operator)));
        assert!(previous.is_none(), "task name `{name}` declared twice");
        self
    }

    /// Declares a decomposition method.
    ///
    /// # Panics
    /// Panics if `name` is already declared.
    pub fn declare_method(
        &mut self,
        name: impl Into<ArcStr>,
        method: impl Fn(&S, &[Value]) -> TaskList + 'static,
    ) -> &mut Self {
        let name = name.into();
        let previous = self
            .entries
            .insert(name.clone(), TaskEntry::Method(Box::new(method)));
        assert!(previous.is_none(), "task name `{name}` declared twice");
        self
    }

    /// Replaces the default unit cost function.
    pub fn set_cost_fn(&mut self, cost: impl Fn(&S, &Task) -> f64 + 'static) -> &mut Self {
        self.cost = Box::new(cost);
        self
    }

    /// Seed for the per-planner random generator used by the randomized
    /// drivers; fix it for reproducible searches.
    pub fn set_seed(&mut self, seed: u64) -> &mut Self {
        self.seed = seed;
        self
    }

    pub fn operator_names(&self) -> impl Iterator<Item = &ArcStr> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e, TaskEntry::Operator(_)))
            .map(|(n, _)| n)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &ArcStr> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e, TaskEntry::Method(_)))
            .map(|(n, _)| n)
    }
}

impl<S: Clone> Planner<S> {
    /// Replays `plan` from `start`, returning every intermediate state:
    /// index 0 is `start` and index `plan.len()` the terminal state.
    ///
    /// Each action must name an operator that accepts its input state;
    /// anything else is a typed error naming the offending action.
    pub fn plan_states(&self, start: &S, plan: &[Task]) -> crate::Result<Vec<S>> {
        let mut states = Vec::with_capacity(plan.len() + 1);
        states.push(start.clone());
        let mut current = start.clone();
        for action in plan {
            let operator = match self.entries.get(&action.name) {
                Some(TaskEntry::Operator(op)) => op,
                Some(TaskEntry::Method(_)) => {
                    return Err(DomainError::NotAnOperator(action.clone()))
                }
                None => return Err(DomainError::UnresolvedTask(action.clone())),
            };
            let mut next = current.clone();
            if !operator(&mut next, &action.args) {
                return Err(DomainError::OperatorRejected(action.clone()));
            }
            states.push(next.clone());
            current = next;
        }
        Ok(states)
    }
}
