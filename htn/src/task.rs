use arcstr::ArcStr;
use smallvec::SmallVec;
use std::fmt::{Display, Error, Formatter};

/// Argument of a [`Task`].
///
/// Arguments are restricted to a small algebra of hashable values so that a
/// task can serve directly as a key in the outcome trackers: two structurally
/// equal tasks always hash identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Int(i64),
    Sym(ArcStr),
    Tuple(Box<[Value]>),
}

impl Value {
    pub fn int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn sym(&self) -> Option<&str> {
        match self {
            Value::Sym(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convenience accessor for the common encoding of a 2D coordinate as a
    /// pair of integers.
    pub fn pair(&self) -> Option<(i64, i64)> {
        match self {
            Value::Tuple(items) => match items.as_ref() {
                [Value::Int(x), Value::Int(y)] => Some((*x, *y)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Sym(ArcStr::from(s))
    }
}

impl From<ArcStr> for Value {
    fn from(s: ArcStr) -> Self {
        Value::Sym(s)
    }
}

impl From<(i64, i64)> for Value {
    fn from((x, y): (i64, i64)) -> Self {
        Value::Tuple(Box::new([Value::Int(x), Value::Int(y)]))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Sym(s) => write!(f, "{s}"),
            Value::Tuple(items) => {
                write!(f, "(")?;
                let mut it = items.iter().peekable();
                while let Some(x) = it.next() {
                    write!(f, "{x}")?;
                    if it.peek().is_some() {
                        write!(f, " ")?;
                    }
                }
                write!(f, ")")
            }
        }
    }
}

/// A task instance: a name identifying either an operator or a method, plus
/// its ground arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Task {
    pub name: ArcStr,
    pub args: SmallVec<[Value; 4]>,
}

impl Task {
    pub fn new(name: impl Into<ArcStr>, args: impl IntoIterator<Item = Value>) -> Task {
        Task {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }
}

impl Display for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "({}", self.name)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        write!(f, ")")
    }
}

/// Builds a [`Task`] from a name and any arguments convertible to [`Value`].
///
/// ```
/// use weaver_htn::{task, Value};
/// let t = task!("stack", 2, "table");
/// assert_eq!(t.args[0], Value::Int(2));
/// ```
#[macro_export]
macro_rules! task {
    ($name:expr $(, $arg:expr)* $(,)?) => {
        $crate::Task::new($name, [ $($crate::Value::from($arg)),* ])
    };
}

/// Result of invoking a method on a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskList {
    /// The task is already achieved in the current state; no subtasks.
    Completed,
    /// Alternative decompositions, each an ordered sequence of subtasks.
    /// An empty set of options means the method is not applicable.
    Options(Vec<Vec<Task>>),
}

impl TaskList {
    /// A method that rejects the current state.
    pub fn failed() -> TaskList {
        TaskList::Options(Vec::new())
    }

    /// A single deterministic decomposition.
    pub fn single(tasks: Vec<Task>) -> TaskList {
        TaskList::Options(vec![tasks])
    }

    pub fn of(options: Vec<Vec<Task>>) -> TaskList {
        TaskList::Options(options)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskList::Options(options) if options.is_empty())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    #[test]
    fn display_forms() {
        let t = task!("move_one", 3, "table");
        assert_eq!(t.to_string(), "(move_one 3 table)");
        let t = task!("go", "bot", (0, 0), (1, 0));
        assert_eq!(t.to_string(), "(go bot (0 0) (1 0))");
    }

    #[test]
    fn structural_hash_is_stable() {
        let hash = |t: &Task| {
            let mut h = DefaultHasher::new();
            t.hash(&mut h);
            h.finish()
        };
        let a = task!("stack", 1, 2);
        let b = Task::new("stack", [Value::Int(1), Value::Int(2)]);
        assert_eq!(a, b);
        assert_eq!(hash(&a), hash(&b));
        assert_ne!(a, task!("stack", 2, 1));
    }

    #[test]
    fn task_list_failure_forms() {
        assert!(TaskList::failed().is_failed());
        assert!(TaskList::of(vec![]).is_failed());
        assert!(!TaskList::Completed.is_failed());
        assert!(!TaskList::single(vec![task!("noop")]).is_failed());
    }
}
