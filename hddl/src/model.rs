//! Typed model of total-order HDDL domains and problems, read from
//! s-expressions. Only the fragment the planner consumes is modeled:
//! flat conjunctive preconditions (with negation and `forall`), conjunctive
//! effects, and totally ordered method subtasks.

use crate::sexpr::{parse, ParseError, SExpr};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Catch-all type of untyped parameters and objects.
pub const OBJECT: &str = "object";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub tpe: String,
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.tpe)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub name: String,
    pub params: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDef {
    pub name: String,
    pub params: Vec<Parameter>,
}

/// A possibly negated predicate application; arguments are variable names
/// (`?x`) or constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub name: String,
    pub positive: bool,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    Empty,
    Literal(Literal),
    And(Vec<Literal>),
    Forall { param: Parameter, literal: Literal },
}

/// Reference to a task or action with argument terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRef {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<Parameter>,
    /// Name of the abstract task this method refines.
    pub task: String,
    /// Terms of the `:task` clause, binding method parameters to the
    /// invocation's arguments.
    pub task_args: Vec<String>,
    pub precondition: Precondition,
    pub subtasks: Vec<TaskRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDef {
    pub name: String,
    pub params: Vec<Parameter>,
    pub precondition: Precondition,
    pub effects: Vec<Literal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Domain {
    pub name: String,
    /// Type hierarchy: child type -> parent type.
    pub types: HashMap<String, String>,
    pub constants: Vec<Parameter>,
    pub predicates: HashMap<String, Predicate>,
    pub tasks: HashMap<String, TaskDef>,
    pub methods: Vec<MethodDef>,
    pub actions: HashMap<String, ActionDef>,
}

impl Domain {
    /// Methods refining the given abstract task, in declaration order.
    pub fn methods_of(&self, task: &str) -> impl Iterator<Item = &MethodDef> + '_ {
        let task = task.to_owned();
        self.methods.iter().filter(move |m| m.task == task)
    }

    /// True when `tpe` equals `ancestor` or descends from it.
    pub fn is_subtype(&self, tpe: &str, ancestor: &str) -> bool {
        if ancestor == OBJECT || tpe == ancestor {
            return true;
        }
        let mut current = tpe;
        while let Some(parent) = self.types.get(current) {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Problem {
    pub name: String,
    pub domain: String,
    pub objects: Vec<Parameter>,
    /// Top-level task network (totally ordered).
    pub init_tasks: Vec<TaskRef>,
    pub init: Vec<Literal>,
    pub goal: Vec<Literal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HddlFile {
    Domain(Box<Domain>),
    Problem(Box<Problem>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Syntax(#[from] ParseError),
    #[error("expected ({expected} ...), found {found}")]
    UnexpectedForm { expected: String, found: String },
    #[error("unknown tag {0}")]
    UnknownTag(String),
}

type Result<T> = std::result::Result<T, ModelError>;

fn unexpected<T>(expected: &str, found: &SExpr) -> Result<T> {
    Err(ModelError::UnexpectedForm {
        expected: expected.to_owned(),
        found: found.to_string(),
    })
}

/// Parses one HDDL file (domain or problem).
pub fn parse_hddl(input: &str) -> Result<HddlFile> {
    let expr = parse(input)?;
    let items = match expr.as_list() {
        Some(items) if expr.tag() == Some("define") => items,
        _ => return unexpected("define", &expr),
    };
    let header = match items.get(1).and_then(SExpr::as_list) {
        Some([SExpr::Atom(kind), SExpr::Atom(name)]) => (kind.as_str(), name.clone()),
        _ => return unexpected("domain/problem header", &expr),
    };
    match header {
        ("domain", name) => Ok(HddlFile::Domain(Box::new(parse_domain(name, &items[2..])?))),
        ("problem", name) => Ok(HddlFile::Problem(Box::new(parse_problem(
            name,
            &items[2..],
        )?))),
        _ => unexpected("domain/problem header", &expr),
    }
}

/// Parses a typed list: names optionally followed by `- type`, repeated.
fn parse_params(items: &[SExpr]) -> Result<Vec<Parameter>> {
    let mut params = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut expect_type = false;
    for item in items {
        let Some(atom) = item.as_atom() else {
            return unexpected("name or - type", item);
        };
        if atom == "-" {
            expect_type = true;
        } else if expect_type {
            for name in pending.drain(..) {
                params.push(Parameter {
                    name,
                    tpe: atom.to_owned(),
                });
            }
            expect_type = false;
        } else {
            pending.push(atom.to_owned());
        }
    }
    for name in pending {
        params.push(Parameter {
            name,
            tpe: OBJECT.to_owned(),
        });
    }
    Ok(params)
}

fn parse_literal(expr: &SExpr) -> Result<Literal> {
    let Some(items) = expr.as_list() else {
        return unexpected("literal", expr);
    };
    if items.first().and_then(SExpr::as_atom) == Some("not") {
        let Some(negated) = items.get(1) else {
            return unexpected("negated literal", expr);
        };
        let mut inner = parse_literal(negated)?;
        inner.positive = false;
        return Ok(inner);
    }
    let mut atoms = Vec::with_capacity(items.len());
    for item in items {
        match item.as_atom() {
            Some(a) => atoms.push(a.to_owned()),
            None => return unexpected("atom", item),
        }
    }
    let Some((name, args)) = atoms.split_first() else {
        return unexpected("literal", expr);
    };
    Ok(Literal {
        name: name.clone(),
        positive: true,
        args: args.to_vec(),
    })
}

fn parse_precondition(expr: &SExpr) -> Result<Precondition> {
    let Some(items) = expr.as_list() else {
        return unexpected("precondition", expr);
    };
    if items.is_empty() {
        return Ok(Precondition::Empty);
    }
    match items[0].as_atom() {
        Some("and") => {
            let mut literals = Vec::with_capacity(items.len() - 1);
            for item in &items[1..] {
                literals.push(parse_literal(item)?);
            }
            Ok(Precondition::And(literals))
        }
        Some("forall") => {
            let params = parse_params(items.get(1).and_then(SExpr::as_list).unwrap_or(&[]))?;
            let Some(param) = params.into_iter().next() else {
                return unexpected("forall parameter", expr);
            };
            let literal = parse_literal(items.get(2).unwrap_or(expr))?;
            Ok(Precondition::Forall { param, literal })
        }
        _ => Ok(Precondition::Literal(parse_literal(expr)?)),
    }
}

fn parse_task_ref(expr: &SExpr) -> Result<TaskRef> {
    let literal = parse_literal(expr)?;
    Ok(TaskRef {
        name: literal.name,
        args: literal.args,
    })
}

/// Subtask lists come either plain `(task args)` or labeled
/// `(label (task args))` as in the IPC benchmarks.
fn parse_subtask(expr: &SExpr) -> Result<TaskRef> {
    if let Some(items) = expr.as_list() {
        if items.len() == 2 && items[0].as_atom().is_some() && items[1].as_list().is_some() {
            return parse_task_ref(&items[1]);
        }
    }
    parse_task_ref(expr)
}

fn parse_ordered_tasks(expr: &SExpr) -> Result<Vec<TaskRef>> {
    let Some(items) = expr.as_list() else {
        return unexpected("ordered tasks", expr);
    };
    if items.first().and_then(SExpr::as_atom) == Some("and") {
        items[1..].iter().map(parse_subtask).collect()
    } else if items.is_empty() {
        Ok(Vec::new())
    } else {
        Ok(vec![parse_subtask(expr)?])
    }
}

fn parse_method(items: &[SExpr]) -> Result<MethodDef> {
    let Some(name) = items.first().and_then(SExpr::as_atom) else {
        return unexpected("method name", &SExpr::List(items.to_vec()));
    };
    let mut method = MethodDef {
        name: name.to_owned(),
        params: Vec::new(),
        task: String::new(),
        task_args: Vec::new(),
        precondition: Precondition::Empty,
        subtasks: Vec::new(),
    };
    let mut i = 1;
    while i < items.len() {
        let Some(tag) = items[i].as_atom() else {
            return unexpected("method tag", &items[i]);
        };
        let Some(value) = items.get(i + 1) else {
            return unexpected("method tag value", &items[i]);
        };
        match tag {
            ":parameters" => {
                method.params = parse_params(value.as_list().unwrap_or(&[]))?;
            }
            ":task" => {
                let task = parse_task_ref(value)?;
                method.task = task.name;
                method.task_args = task.args;
            }
            ":precondition" => {
                method.precondition = parse_precondition(value)?;
            }
            ":ordered-tasks" | ":ordered-subtasks" | ":tasks" | ":subtasks" => {
                method.subtasks = parse_ordered_tasks(value)?;
            }
            other => return Err(ModelError::UnknownTag(other.to_owned())),
        }
        i += 2;
    }
    Ok(method)
}

fn parse_action(items: &[SExpr]) -> Result<ActionDef> {
    let Some(name) = items.first().and_then(SExpr::as_atom) else {
        return unexpected("action name", &SExpr::List(items.to_vec()));
    };
    let mut action = ActionDef {
        name: name.to_owned(),
        params: Vec::new(),
        precondition: Precondition::Empty,
        effects: Vec::new(),
    };
    let mut i = 1;
    while i < items.len() {
        let Some(tag) = items[i].as_atom() else {
            return unexpected("action tag", &items[i]);
        };
        let Some(value) = items.get(i + 1) else {
            return unexpected("action tag value", &items[i]);
        };
        match tag {
            ":parameters" => {
                action.params = parse_params(value.as_list().unwrap_or(&[]))?;
            }
            ":precondition" => {
                action.precondition = parse_precondition(value)?;
            }
            ":effect" => {
                action.effects = match parse_precondition(value)? {
                    Precondition::Empty => Vec::new(),
                    Precondition::Literal(l) => vec![l],
                    Precondition::And(ls) => ls,
                    Precondition::Forall { .. } => {
                        return unexpected("conjunctive effect", value)
                    }
                };
            }
            other => return Err(ModelError::UnknownTag(other.to_owned())),
        }
        i += 2;
    }
    Ok(action)
}

fn parse_task_def(items: &[SExpr]) -> Result<TaskDef> {
    let Some(name) = items.first().and_then(SExpr::as_atom) else {
        return unexpected("task name", &SExpr::List(items.to_vec()));
    };
    let mut params = Vec::new();
    let mut i = 1;
    while i < items.len() {
        if items[i].as_atom() == Some(":parameters") {
            params = parse_params(items.get(i + 1).and_then(SExpr::as_list).unwrap_or(&[]))?;
        }
        i += 2;
    }
    Ok(TaskDef {
        name: name.to_owned(),
        params,
    })
}

fn parse_domain(name: String, items: &[SExpr]) -> Result<Domain> {
    let mut domain = Domain {
        name,
        ..Default::default()
    };
    for item in items {
        let Some(list) = item.as_list() else {
            return unexpected("domain section", item);
        };
        match item.tag() {
            Some(":requirements") => {}
            Some(":types") => {
                for p in parse_params(&list[1..])? {
                    domain.types.insert(p.name, p.tpe);
                }
            }
            Some(":constants") => {
                domain.constants = parse_params(&list[1..])?;
            }
            Some(":predicates") => {
                for pred in &list[1..] {
                    let Some(pred_items) = pred.as_list() else {
                        return unexpected("predicate", pred);
                    };
                    let Some(pred_name) = pred_items.first().and_then(SExpr::as_atom) else {
                        return unexpected("predicate name", pred);
                    };
                    domain.predicates.insert(
                        pred_name.to_owned(),
                        Predicate {
                            name: pred_name.to_owned(),
                            params: parse_params(&pred_items[1..])?,
                        },
                    );
                }
            }
            Some(":task") => {
                let task = parse_task_def(&list[1..])?;
                domain.tasks.insert(task.name.clone(), task);
            }
            Some(":method") => domain.methods.push(parse_method(&list[1..])?),
            Some(":action") => {
                let action = parse_action(&list[1..])?;
                domain.actions.insert(action.name.clone(), action);
            }
            Some(other) => return Err(ModelError::UnknownTag(other.to_owned())),
            None => return unexpected("domain section", item),
        }
    }
    Ok(domain)
}

fn parse_problem(name: String, items: &[SExpr]) -> Result<Problem> {
    let mut problem = Problem {
        name,
        ..Default::default()
    };
    for item in items {
        let Some(list) = item.as_list() else {
            return unexpected("problem section", item);
        };
        match item.tag() {
            Some(":domain") => {
                if let Some(domain) = list.get(1).and_then(SExpr::as_atom) {
                    problem.domain = domain.to_owned();
                }
            }
            Some(":requirements") => {}
            Some(":objects") => {
                problem.objects = parse_params(&list[1..])?;
            }
            Some(":htn") => {
                let mut i = 1;
                while i < list.len() {
                    let tag = list[i].as_atom();
                    if let (
                        Some(":subtasks" | ":ordered-subtasks" | ":ordered-tasks" | ":tasks"),
                        Some(value),
                    ) = (tag, list.get(i + 1))
                    {
                        problem.init_tasks = parse_ordered_tasks(value)?;
                    }
                    i += 2;
                }
            }
            Some(":init") => {
                problem.init = list[1..]
                    .iter()
                    .map(parse_literal)
                    .collect::<Result<Vec<_>>>()?;
            }
            Some(":goal") => {
                problem.goal = match parse_precondition(list.get(1).unwrap_or(item))? {
                    Precondition::Empty => Vec::new(),
                    Precondition::Literal(l) => vec![l],
                    Precondition::And(ls) => ls,
                    Precondition::Forall { .. } => {
                        return unexpected("conjunctive goal", item)
                    }
                };
            }
            Some(other) => return Err(ModelError::UnknownTag(other.to_owned())),
            None => return unexpected("problem section", item),
        }
    }
    Ok(problem)
}
