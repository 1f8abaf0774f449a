//! Grounding: compiles a parsed HDDL domain/problem pair into the planner's
//! operator/method tables over a set-of-atoms state, plus a goal predicate
//! checkable on replayed states.

use crate::model::{
    parse_hddl, ActionDef, Domain, HddlFile, Literal, MethodDef, Parameter, Precondition, Problem,
    TaskRef,
};
use anyhow::{bail, Context};
use arcstr::ArcStr;
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Error, Formatter};
use std::sync::Arc;
use weaver_htn::{Planner, Task, TaskList, Value};

/// A ground atom: predicate name followed by object names.
pub type Atom = Vec<ArcStr>;

/// Closed-world state: exactly the atoms in the set hold.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroundState {
    pub atoms: BTreeSet<Atom>,
}

impl GroundState {
    pub fn holds(&self, atom: &[ArcStr]) -> bool {
        self.atoms.contains(atom)
    }
}

impl Display for GroundState {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        for atom in &self.atoms {
            write!(f, "(")?;
            let mut it = atom.iter().peekable();
            while let Some(x) = it.next() {
                write!(f, "{x}")?;
                if it.peek().is_some() {
                    write!(f, " ")?;
                }
            }
            writeln!(f, ")")?;
        }
        Ok(())
    }
}

type Binding = HashMap<String, ArcStr>;

/// Shared context captured by the generated operator and method closures.
struct Env {
    domain: Domain,
    objects: Vec<(ArcStr, String)>,
}

impl Env {
    fn objects_of<'a>(&'a self, tpe: &'a str) -> impl Iterator<Item = &'a ArcStr> + 'a {
        self.objects
            .iter()
            .filter(move |(_, t)| self.domain.is_subtype(t, tpe))
            .map(|(name, _)| name)
    }

    /// Resolves a term: variables through the binding, constants to
    /// themselves.
    fn term(&self, term: &str, binding: &Binding) -> Option<ArcStr> {
        if term.starts_with('?') {
            binding.get(term).cloned()
        } else {
            Some(ArcStr::from(term))
        }
    }

    fn ground_literal(&self, literal: &Literal, binding: &Binding) -> Option<(bool, Atom)> {
        let mut atom = Vec::with_capacity(literal.args.len() + 1);
        atom.push(ArcStr::from(literal.name.as_str()));
        for arg in &literal.args {
            atom.push(self.term(arg, binding)?);
        }
        Some((literal.positive, atom))
    }

    fn literal_holds(&self, literal: &Literal, binding: &Binding, state: &GroundState) -> bool {
        match self.ground_literal(literal, binding) {
            Some((positive, atom)) => state.holds(&atom) == positive,
            None => false,
        }
    }

    fn precondition_holds(
        &self,
        precondition: &Precondition,
        binding: &Binding,
        state: &GroundState,
    ) -> bool {
        match precondition {
            Precondition::Empty => true,
            Precondition::Literal(literal) => self.literal_holds(literal, binding, state),
            Precondition::And(literals) => literals
                .iter()
                .all(|literal| self.literal_holds(literal, binding, state)),
            Precondition::Forall { param, literal } => {
                self.objects_of(&param.tpe).all(|object| {
                    let mut extended = binding.clone();
                    extended.insert(param.name.clone(), object.clone());
                    self.literal_holds(literal, &extended, state)
                })
            }
        }
    }
}

fn bind_args(params: &[Parameter], args: &[Value]) -> Option<Binding> {
    if params.len() != args.len() {
        return None;
    }
    let mut binding = Binding::with_capacity(params.len());
    for (param, arg) in params.iter().zip(args) {
        binding.insert(param.name.clone(), ArcStr::from(arg.sym()?));
    }
    Some(binding)
}

fn instantiate_subtasks(subtasks: &[TaskRef], binding: &Binding, env: &Env) -> Option<Vec<Task>> {
    let mut tasks = Vec::with_capacity(subtasks.len());
    for subtask in subtasks {
        let mut args = Vec::with_capacity(subtask.args.len());
        for term in &subtask.args {
            args.push(Value::Sym(env.term(term, binding)?));
        }
        tasks.push(Task::new(subtask.name.as_str(), args));
    }
    Some(tasks)
}

fn declare_action(planner: &mut Planner<GroundState>, action: &ActionDef, env: &Arc<Env>) {
    let schema = action.clone();
    let env = env.clone();
    planner.declare_operator(action.name.as_str(), move |state: &mut GroundState, args| {
        let Some(binding) = bind_args(&schema.params, args) else {
            return false;
        };
        if !env.precondition_holds(&schema.precondition, &binding, state) {
            return false;
        }
        // delete effects apply before add effects
        let mut additions = Vec::new();
        for effect in &schema.effects {
            let Some((positive, atom)) = env.ground_literal(effect, &binding) else {
                return false;
            };
            if positive {
                additions.push(atom);
            } else {
                state.atoms.remove(&atom);
            }
        }
        for atom in additions {
            state.atoms.insert(atom);
        }
        true
    });
}

/// Expands one method instantiation attempt into options: the invocation's
/// arguments bind the `:task` clause, remaining parameters range over the
/// typed objects, and every binding satisfying the precondition contributes
/// its instantiated subtask sequence.
fn method_options(
    method: &MethodDef,
    args: &[Value],
    state: &GroundState,
    env: &Env,
    options: &mut Vec<Vec<Task>>,
) {
    if method.task_args.len() != args.len() {
        return;
    }
    let mut binding = Binding::new();
    for (term, arg) in method.task_args.iter().zip(args) {
        let Some(sym) = arg.sym().map(ArcStr::from) else {
            return;
        };
        if term.starts_with('?') {
            match binding.get(term) {
                Some(previous) if *previous != sym => return,
                _ => {
                    binding.insert(term.clone(), sym);
                }
            }
        } else if term.as_str() != sym.as_str() {
            return;
        }
    }
    let free: Vec<&Parameter> = method
        .params
        .iter()
        .filter(|p| !binding.contains_key(&p.name))
        .collect();
    if free.is_empty() {
        if env.precondition_holds(&method.precondition, &binding, state) {
            if let Some(tasks) = instantiate_subtasks(&method.subtasks, &binding, env) {
                options.push(tasks);
            }
        }
        return;
    }
    let candidates: Vec<Vec<ArcStr>> = free
        .iter()
        .map(|p| env.objects_of(&p.tpe).cloned().collect())
        .collect();
    for combination in candidates.into_iter().multi_cartesian_product() {
        let mut full = binding.clone();
        for (param, object) in free.iter().zip(combination) {
            full.insert(param.name.clone(), object);
        }
        if env.precondition_holds(&method.precondition, &full, state) {
            if let Some(tasks) = instantiate_subtasks(&method.subtasks, &full, env) {
                options.push(tasks);
            }
        }
    }
}

/// A grounded problem ready to plan: the planner with all tables declared,
/// the initial state and task network, and the goal as ground literals.
pub struct GroundProblem {
    pub planner: Planner<GroundState>,
    pub state: GroundState,
    pub tasks: Vec<Task>,
    pub goal: Vec<(bool, Atom)>,
}

impl GroundProblem {
    pub fn goal_satisfied(&self, state: &GroundState) -> bool {
        self.goal
            .iter()
            .all(|(positive, atom)| state.holds(atom) == *positive)
    }
}

pub fn ground(domain: &Domain, problem: &Problem) -> anyhow::Result<GroundProblem> {
    anyhow::ensure!(
        problem.domain.is_empty() || problem.domain == domain.name,
        "problem `{}` targets domain `{}`, not `{}`",
        problem.name,
        problem.domain,
        domain.name
    );
    let env = Arc::new(Env {
        domain: domain.clone(),
        objects: domain
            .constants
            .iter()
            .chain(&problem.objects)
            .map(|p| (ArcStr::from(p.name.as_str()), p.tpe.clone()))
            .collect(),
    });

    let mut planner = Planner::new();
    for action in domain.actions.values() {
        declare_action(&mut planner, action, &env);
    }
    for task_name in domain.tasks.keys() {
        let methods: Vec<MethodDef> = domain.methods_of(task_name).cloned().collect();
        let env = env.clone();
        planner.declare_method(task_name.as_str(), move |state: &GroundState, args| {
            let mut options = Vec::new();
            for method in &methods {
                method_options(method, args, state, &env, &mut options);
            }
            TaskList::of(options)
        });
    }

    let empty = Binding::new();
    let mut state = GroundState::default();
    for literal in &problem.init {
        let Some((positive, atom)) = env.ground_literal(literal, &empty) else {
            bail!("init literal ({} ...) has unbound variables", literal.name);
        };
        if positive {
            state.atoms.insert(atom);
        }
    }

    let mut goal = Vec::with_capacity(problem.goal.len());
    for literal in &problem.goal {
        match env.ground_literal(literal, &empty) {
            Some(ground) => goal.push(ground),
            None => bail!("goal literal ({} ...) has unbound variables", literal.name),
        }
    }

    let tasks = instantiate_subtasks(&problem.init_tasks, &empty, &env)
        .context("task network has unbound variables")?;

    Ok(GroundProblem {
        planner,
        state,
        tasks,
        goal,
    })
}

/// Parses and grounds a domain/problem text pair.
pub fn load(domain_text: &str, problem_text: &str) -> anyhow::Result<GroundProblem> {
    let HddlFile::Domain(domain) = parse_hddl(domain_text).context("parsing domain")? else {
        bail!("expected a domain file");
    };
    let HddlFile::Problem(problem) = parse_hddl(problem_text).context("parsing problem")? else {
        bail!("expected a problem file");
    };
    ground(&domain, &problem)
}

#[cfg(test)]
mod test {
    use super::*;

    const DOMAIN: &str = r#"
        (define (domain tower)
          (:requirements :strips :typing :hierarchy :negative-preconditions :method-preconditions)
          (:types block - object)
          (:predicates (on-table ?b - block) (on ?a - block ?b - block)
                       (clear ?b - block) (holding ?b - block) (hand-empty))
          (:task move-block :parameters (?b - block ?dest - block))
          (:method m-move
            :parameters (?b - block ?dest - block)
            :task (move-block ?b ?dest)
            :precondition (and (on-table ?b) (clear ?b) (clear ?dest) (hand-empty))
            :ordered-subtasks (and (pickup ?b) (stack ?b ?dest)))
          (:method m-already-there
            :parameters (?b - block ?dest - block)
            :task (move-block ?b ?dest)
            :precondition (and (on ?b ?dest))
            :ordered-subtasks (and))
          (:action pickup
            :parameters (?b - block)
            :precondition (and (on-table ?b) (clear ?b) (hand-empty))
            :effect (and (holding ?b) (not (on-table ?b)) (not (clear ?b)) (not (hand-empty))))
          (:action stack
            :parameters (?b - block ?dest - block)
            :precondition (and (holding ?b) (clear ?dest))
            :effect (and (on ?b ?dest) (clear ?b) (hand-empty)
                         (not (holding ?b)) (not (clear ?dest)))))
    "#;

    const PROBLEM: &str = r#"
        (define (problem tower1)
          (:domain tower)
          (:objects a b - block)
          (:htn :ordered-subtasks (and (move-block a b)))
          (:init (on-table a) (on-table b) (clear a) (clear b) (hand-empty))
          (:goal (and (on a b))))
    "#;

    fn atom(parts: &[&str]) -> Atom {
        parts.iter().map(|p| ArcStr::from(*p)).collect()
    }

    #[test]
    fn grounds_init_tasks_and_goal() {
        let problem = load(DOMAIN, PROBLEM).unwrap();
        assert!(problem.state.holds(&atom(&["on-table", "a"])));
        assert!(problem.state.holds(&atom(&["hand-empty"])));
        assert_eq!(problem.tasks.len(), 1);
        assert_eq!(problem.tasks[0].name.as_str(), "move-block");
        assert!(!problem.goal_satisfied(&problem.state));
    }

    #[test]
    fn plans_and_reaches_the_goal() {
        let problem = load(DOMAIN, PROBLEM).unwrap();
        let report = problem
            .planner
            .first_plan(&problem.state, &problem.tasks)
            .unwrap()
            .unwrap();
        let names: Vec<&str> = report.plan.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["pickup", "stack"]);
        let states = problem
            .planner
            .plan_states(&problem.state, &report.plan)
            .unwrap();
        assert!(problem.goal_satisfied(states.last().unwrap()));
    }

    #[test]
    fn achieved_tasks_decompose_to_nothing() {
        let problem = load(
            DOMAIN,
            r#"
            (define (problem tower2)
              (:domain tower)
              (:objects a b - block)
              (:htn :ordered-subtasks (and (move-block a b)))
              (:init (on a b) (clear a) (on-table b) (hand-empty))
              (:goal (and (on a b))))
        "#,
        )
        .unwrap();
        let report = problem
            .planner
            .first_plan(&problem.state, &problem.tasks)
            .unwrap()
            .unwrap();
        assert!(report.plan.is_empty());
        assert!(problem.goal_satisfied(&problem.state));
    }

    #[test]
    fn mismatched_domain_names_are_rejected() {
        let err = load(
            DOMAIN,
            r#"
            (define (problem other)
              (:domain freight)
              (:htn :ordered-subtasks (and))
              (:init))
        "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn unsatisfiable_methods_produce_no_plan() {
        // b is never clear, so move-block a b has no applicable method
        let problem = load(
            DOMAIN,
            r#"
            (define (problem tower3)
              (:domain tower)
              (:objects a b c - block)
              (:htn :ordered-subtasks (and (move-block a b)))
              (:init (on-table a) (on-table b) (on c b) (clear a) (clear c) (hand-empty))
              (:goal (and (on a b))))
        "#,
        )
        .unwrap();
        let report = problem
            .planner
            .first_plan(&problem.state, &problem.tasks)
            .unwrap();
        assert!(report.is_none());
    }
}
