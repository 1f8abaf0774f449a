//! Grid navigation with facing: a robot moves one cell at a time in the
//! direction it faces, turns cost a step, and obstacles block specific
//! cell/facing transitions (walls between cells). The route method prunes
//! revisits through a (cell, facing) visited set carried in the state.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::fmt::{Display, Error, Formatter};
use weaver_htn::{task, Planner, Task, TaskList, Value};

pub type Pos = (i64, i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Facing {
    North,
    South,
    East,
    West,
}

impl Facing {
    pub const ALL: [Facing; 4] = [Facing::North, Facing::South, Facing::East, Facing::West];

    /// Grid offset of one step in this direction (y grows southwards).
    pub fn offset(self) -> Pos {
        match self {
            Facing::North => (0, -1),
            Facing::South => (0, 1),
            Facing::East => (1, 0),
            Facing::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Facing {
        match self {
            Facing::North => Facing::South,
            Facing::South => Facing::North,
            Facing::East => Facing::West,
            Facing::West => Facing::East,
        }
    }

    pub fn step(self, from: Pos) -> Pos {
        let (dx, dy) = self.offset();
        (from.0 + dx, from.1 + dy)
    }

    fn name(self) -> &'static str {
        match self {
            Facing::North => "north",
            Facing::South => "south",
            Facing::East => "east",
            Facing::West => "west",
        }
    }

    fn from_value(value: &Value) -> Option<Facing> {
        match value.sym()? {
            "north" => Some(Facing::North),
            "south" => Some(Facing::South),
            "east" => Some(Facing::East),
            "west" => Some(Facing::West),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridState {
    pub at: Pos,
    pub facing: Facing,
    /// (cell, facing) pairs already reached; route options avoid them.
    pub visited: HashSet<(Pos, Facing)>,
    pub width: i64,
    pub height: i64,
    /// Blocked transitions: leaving `cell` towards `facing` is impossible.
    pub obstacles: HashSet<(Pos, Facing)>,
}

impl GridState {
    pub fn in_bounds(&self, p: Pos) -> bool {
        0 <= p.0 && p.0 < self.width && 0 <= p.1 && p.1 < self.height
    }

    /// Cell reached by stepping from `at` towards `facing`, if the wall and
    /// the boundary allow it.
    pub fn projection(&self, at: Pos, facing: Facing) -> Option<Pos> {
        if self.obstacles.contains(&(at, facing)) {
            return None;
        }
        let future = facing.step(at);
        self.in_bounds(future).then_some(future)
    }
}

pub fn manhattan_distance(p1: Pos, p2: Pos) -> i64 {
    (p1.0 - p2.0).abs() + (p1.1 - p2.1).abs()
}

fn find_route(state: &GridState, args: &[Value]) -> TaskList {
    let (Some(at), Some(facing), Some(goal)) = (
        args.first().and_then(Value::pair),
        args.get(1).and_then(Facing::from_value),
        args.get(2).and_then(Value::pair),
    ) else {
        return TaskList::failed();
    };
    if at != state.at || facing != state.facing {
        return TaskList::failed();
    }
    if at == goal {
        return TaskList::Completed;
    }
    let mut options = Vec::new();
    if let Some(future) = state.projection(at, facing) {
        if !state.visited.contains(&(future, facing)) {
            options.push(vec![
                task!("move_one_step", at, facing.name()),
                task!("find_route", future, facing.name(), goal),
            ]);
        }
    }
    for f in Facing::ALL {
        if f != facing && !state.visited.contains(&(at, f)) {
            if let Some(future) = state.projection(at, f) {
                if !state.visited.contains(&(future, f)) {
                    options.push(vec![
                        task!("turn_to", f.name()),
                        task!("find_route", at, f.name(), goal),
                    ]);
                }
            }
        }
    }
    TaskList::of(options)
}

pub fn planner() -> Planner<GridState> {
    let mut p = Planner::new();
    p.declare_operator("move_one_step", |state: &mut GridState, args| {
        let (Some(at), Some(facing)) = (
            args.first().and_then(Value::pair),
            args.get(1).and_then(Facing::from_value),
        ) else {
            return false;
        };
        if state.at != at || state.facing != facing {
            return false;
        }
        match state.projection(at, facing) {
            Some(future) => {
                state.at = future;
                state.visited.insert((future, facing));
                true
            }
            None => false,
        }
    });
    p.declare_operator("turn_to", |state: &mut GridState, args| {
        let Some(facing) = args.first().and_then(Facing::from_value) else {
            return false;
        };
        state.facing = facing;
        state.visited.insert((state.at, facing));
        true
    });
    p.declare_method("find_route", |state: &GridState, args| {
        find_route(state, args)
    });
    p
}

/// The top-level task routing from the state's position to `goal`.
pub fn route_task(state: &GridState, goal: Pos) -> Vec<Task> {
    vec![task!(
        "find_route",
        state.at,
        state.facing.name(),
        goal
    )]
}

/// Random world: obstacles are walls placed between adjacent interior
/// cells, registered from both sides.
pub fn generate(
    width: i64,
    height: i64,
    start: Pos,
    start_facing: Facing,
    num_obstacles: usize,
    rng: &mut SmallRng,
) -> GridState {
    let mut candidates: Vec<(Pos, Facing)> = Vec::new();
    for x in 0..width - 1 {
        for y in 0..height - 1 {
            for f in [Facing::South, Facing::East] {
                candidates.push(((x, y), f));
            }
        }
    }
    candidates.shuffle(rng);
    let mut obstacles = HashSet::new();
    for &(cell, f) in candidates.iter().take(num_obstacles) {
        obstacles.insert((cell, f));
        obstacles.insert((f.step(cell), f.opposite()));
    }
    GridState {
        at: start,
        facing: start_facing,
        visited: HashSet::from([(start, start_facing)]),
        width,
        height,
        obstacles,
    }
}

/// Shortest path by uniform-cost search over cells (facing-free), used as a
/// reference bound by tests. Returns the path including both endpoints, or
/// `None` when the goal is unreachable.
pub fn shortest_path(state: &GridState, start: Pos, end: Pos) -> Option<Vec<Pos>> {
    use std::cmp::Reverse;
    use std::collections::{BinaryHeap, HashMap};
    let mut parents: HashMap<Pos, Option<Pos>> = HashMap::new();
    let mut frontier = BinaryHeap::new();
    frontier.push(Reverse((0i64, manhattan_distance(start, end), start, None)));
    while let Some(Reverse((cost, _, current, parent))) = frontier.pop() {
        if parents.contains_key(&current) {
            continue;
        }
        parents.insert(current, parent);
        if current == end {
            let mut path = vec![current];
            let mut cursor = current;
            while let Some(Some(prev)) = parents.get(&cursor) {
                path.push(*prev);
                cursor = *prev;
            }
            path.reverse();
            return Some(path);
        }
        for f in Facing::ALL {
            if let Some(next) = state.projection(current, f) {
                if !parents.contains_key(&next) {
                    frontier.push(Reverse((
                        cost + 1,
                        manhattan_distance(next, end),
                        next,
                        Some(current),
                    )));
                }
            }
        }
    }
    None
}

impl Display for GridState {
    /// Renders cells as `O` with `|` and `_` for the walls between them.
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        for y in 0..self.height {
            if y > 0 {
                for x in 0..self.width {
                    if self.obstacles.contains(&((x, y), Facing::North)) {
                        write!(f, "_ ")?;
                    } else {
                        write!(f, ". ")?;
                    }
                }
                writeln!(f)?;
            }
            for x in 0..self.width {
                if x > 0 {
                    if self.obstacles.contains(&((x, y), Facing::West)) {
                        write!(f, "|")?;
                    } else {
                        write!(f, ".")?;
                    }
                }
                write!(f, "O")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
