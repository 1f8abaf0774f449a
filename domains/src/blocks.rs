//! Blocks-world: a hand stacks numbered blocks on a table. The method layer
//! implements the classic block-stacking algorithm: move a block straight to
//! its final position whenever possible, otherwise park a waiting block on
//! the table (the nondeterministic part: any waiting block may be parked).

use std::collections::BTreeMap;
use weaver_htn::{task, Planner, Task, TaskList, Value};

pub type Block = u32;

/// Position of a block: on the table, in the hand, or on another block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loc {
    Table,
    Hand,
    On(Block),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlocksState {
    pub pos: BTreeMap<Block, Loc>,
    pub clear: BTreeMap<Block, bool>,
    pub holding: Option<Block>,
}

impl BlocksState {
    /// Builds a state from (block, position) pairs; clear flags and the
    /// empty hand are derived.
    pub fn from_positions(positions: impl IntoIterator<Item = (Block, Loc)>) -> BlocksState {
        let pos: BTreeMap<Block, Loc> = positions.into_iter().collect();
        let mut clear: BTreeMap<Block, bool> = pos.keys().map(|&b| (b, true)).collect();
        for loc in pos.values() {
            if let Loc::On(below) = loc {
                clear.insert(*below, false);
            }
        }
        BlocksState {
            pos,
            clear,
            holding: None,
        }
    }
}

/// A goal assigns final positions (table or a support block) to some of the
/// blocks; unmentioned blocks may end up anywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Goal {
    pub pos: BTreeMap<Block, Loc>,
}

impl Goal {
    pub fn from_positions(positions: impl IntoIterator<Item = (Block, Loc)>) -> Goal {
        Goal {
            pos: positions.into_iter().collect(),
        }
    }
}

/// A block is done when it and everything below it already matches the goal.
fn is_done(b: Block, state: &BlocksState, goal: &Goal) -> bool {
    if let Some(want) = goal.pos.get(&b) {
        if state.pos.get(&b) != Some(want) {
            return false;
        }
    }
    match state.pos.get(&b) {
        Some(Loc::On(below)) => is_done(*below, state, goal),
        _ => true,
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Status {
    Done,
    Inaccessible,
    MoveToTable,
    MoveToBlock,
    Waiting,
}

fn status(b: Block, state: &BlocksState, goal: &Goal) -> Status {
    if is_done(b, state, goal) {
        return Status::Done;
    }
    if !state.clear.get(&b).copied().unwrap_or(false) {
        return Status::Inaccessible;
    }
    match goal.pos.get(&b) {
        None | Some(Loc::Table) | Some(Loc::Hand) => Status::MoveToTable,
        Some(Loc::On(dest)) => {
            if is_done(*dest, state, goal) && state.clear.get(dest).copied().unwrap_or(false) {
                Status::MoveToBlock
            } else {
                Status::Waiting
            }
        }
    }
}

fn move_blocks(state: &BlocksState, goal: &Goal) -> TaskList {
    let all_blocks = || state.clear.keys().copied();
    if all_blocks().all(|b| status(b, state, goal) == Status::Done) {
        return TaskList::Completed;
    }
    for b in all_blocks() {
        match status(b, state, goal) {
            Status::MoveToTable => {
                return TaskList::single(vec![task!("move_one", b, "table"), task!("move_blocks")])
            }
            Status::MoveToBlock => {
                let dest = match goal.pos.get(&b) {
                    Some(Loc::On(dest)) => *dest,
                    _ => continue,
                };
                return TaskList::single(vec![task!("move_one", b, dest), task!("move_blocks")]);
            }
            _ => {}
        }
    }
    // no block can reach its final position yet: park any waiting block
    TaskList::of(
        all_blocks()
            .filter(|&b| {
                status(b, state, goal) == Status::Waiting && state.pos.get(&b) != Some(&Loc::Table)
            })
            .map(|b| vec![task!("move_one", b, "table"), task!("move_blocks")])
            .collect(),
    )
}

fn destination(value: &Value) -> Option<Loc> {
    match value {
        Value::Sym(s) if s.as_str() == "table" => Some(Loc::Table),
        Value::Int(b) => Some(Loc::On(*b as Block)),
        _ => None,
    }
}

fn move_one(state: &BlocksState, args: &[Value]) -> TaskList {
    let (Some(b), Some(dest)) = (args.first().and_then(Value::int), args.get(1)) else {
        return TaskList::failed();
    };
    let b = b as Block;
    let Some(dest) = destination(dest) else {
        return TaskList::failed();
    };
    if state.pos.get(&b) == Some(&dest) {
        return TaskList::failed();
    }
    TaskList::single(vec![task!("get", b), task!("put", b, dest_value(dest))])
}

fn dest_value(dest: Loc) -> Value {
    match dest {
        Loc::On(b) => Value::Int(b as i64),
        _ => Value::from("table"),
    }
}

fn get(state: &BlocksState, args: &[Value]) -> TaskList {
    let Some(b) = args.first().and_then(Value::int).map(|b| b as Block) else {
        return TaskList::failed();
    };
    if !state.clear.get(&b).copied().unwrap_or(false) {
        return TaskList::failed();
    }
    match state.pos.get(&b) {
        Some(Loc::Table) => TaskList::single(vec![task!("pickup", b)]),
        Some(Loc::On(c)) => TaskList::single(vec![task!("unstack", b, *c)]),
        _ => TaskList::failed(),
    }
}

fn put(state: &BlocksState, args: &[Value]) -> TaskList {
    let (Some(b), Some(dest)) = (args.first().and_then(Value::int), args.get(1)) else {
        return TaskList::failed();
    };
    let b = b as Block;
    if state.holding != Some(b) {
        return TaskList::failed();
    }
    match destination(dest) {
        Some(Loc::Table) => TaskList::single(vec![task!("putdown", b)]),
        Some(Loc::On(c)) => TaskList::single(vec![task!("stack", b, c)]),
        _ => TaskList::failed(),
    }
}

pub fn planner(goal: &Goal) -> Planner<BlocksState> {
    let mut p = Planner::new();
    p.declare_operator("pickup", |state: &mut BlocksState, args| {
        let Some(b) = args.first().and_then(Value::int).map(|b| b as Block) else {
            return false;
        };
        if state.pos.get(&b) == Some(&Loc::Table)
            && state.clear.get(&b).copied().unwrap_or(false)
            && state.holding.is_none()
        {
            state.pos.insert(b, Loc::Hand);
            state.clear.insert(b, false);
            state.holding = Some(b);
            true
        } else {
            false
        }
    });
    p.declare_operator("putdown", |state: &mut BlocksState, args| {
        let Some(b) = args.first().and_then(Value::int).map(|b| b as Block) else {
            return false;
        };
        if state.pos.get(&b) == Some(&Loc::Hand) {
            state.pos.insert(b, Loc::Table);
            state.clear.insert(b, true);
            state.holding = None;
            true
        } else {
            false
        }
    });
    p.declare_operator("unstack", |state: &mut BlocksState, args| {
        let (Some(b), Some(c)) = (
            args.first().and_then(Value::int).map(|b| b as Block),
            args.get(1).and_then(Value::int).map(|c| c as Block),
        ) else {
            return false;
        };
        if state.pos.get(&b) == Some(&Loc::On(c))
            && state.clear.get(&b).copied().unwrap_or(false)
            && state.holding.is_none()
        {
            state.pos.insert(b, Loc::Hand);
            state.clear.insert(b, false);
            state.holding = Some(b);
            state.clear.insert(c, true);
            true
        } else {
            false
        }
    });
    p.declare_operator("stack", |state: &mut BlocksState, args| {
        let (Some(b), Some(c)) = (
            args.first().and_then(Value::int).map(|b| b as Block),
            args.get(1).and_then(Value::int).map(|c| c as Block),
        ) else {
            return false;
        };
        if state.pos.get(&b) == Some(&Loc::Hand) && state.clear.get(&c).copied().unwrap_or(false) {
            state.pos.insert(b, Loc::On(c));
            state.clear.insert(b, true);
            state.holding = None;
            state.clear.insert(c, false);
            true
        } else {
            false
        }
    });
    let goal = goal.clone();
    p.declare_method("move_blocks", move |state: &BlocksState, _args| {
        move_blocks(state, &goal)
    });
    p.declare_method("move_one", |state: &BlocksState, args| move_one(state, args));
    p.declare_method("get", |state: &BlocksState, args| get(state, args));
    p.declare_method("put", |state: &BlocksState, args| put(state, args));
    p
}

/// The top-level task list solving a blocks problem.
pub fn tasks() -> Vec<Task> {
    vec![task!("move_blocks")]
}

/// True when every block satisfies the goal.
pub fn goal_reached(state: &BlocksState, goal: &Goal) -> bool {
    state.clear.keys().all(|&b| is_done(b, state, goal))
}

/// The canonical 19-block benchmark (`bw_large_d`): three tall towers to be
/// rebuilt into two.
pub fn bw_large_d() -> (BlocksState, Goal) {
    let state = BlocksState::from_positions([
        (1, Loc::On(12)),
        (12, Loc::On(13)),
        (13, Loc::Table),
        (11, Loc::On(10)),
        (10, Loc::On(5)),
        (5, Loc::On(4)),
        (4, Loc::On(14)),
        (14, Loc::On(15)),
        (15, Loc::Table),
        (9, Loc::On(8)),
        (8, Loc::On(7)),
        (7, Loc::On(6)),
        (6, Loc::Table),
        (19, Loc::On(18)),
        (18, Loc::On(17)),
        (17, Loc::On(16)),
        (16, Loc::On(3)),
        (3, Loc::On(2)),
        (2, Loc::Table),
    ]);
    let goal = Goal::from_positions([
        (15, Loc::On(13)),
        (13, Loc::On(8)),
        (8, Loc::On(9)),
        (9, Loc::On(4)),
        (4, Loc::Table),
        (12, Loc::On(2)),
        (2, Loc::On(3)),
        (3, Loc::On(16)),
        (16, Loc::On(11)),
        (11, Loc::On(7)),
        (7, Loc::On(6)),
        (6, Loc::Table),
    ]);
    (state, goal)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn derived_clear_flags() {
        let state =
            BlocksState::from_positions([(1, Loc::On(2)), (2, Loc::Table), (3, Loc::Table)]);
        assert_eq!(state.clear[&1], true);
        assert_eq!(state.clear[&2], false);
        assert_eq!(state.clear[&3], true);
        assert_eq!(state.holding, None);
    }

    #[test]
    fn status_drives_the_stacking_algorithm() {
        // a on b, both on their way to goal {b on a, a on table}
        let state =
            BlocksState::from_positions([(1, Loc::On(2)), (2, Loc::Table), (3, Loc::Table)]);
        let goal = Goal::from_positions([(3, Loc::On(2)), (2, Loc::On(1)), (1, Loc::Table)]);
        assert_eq!(status(1, &state, &goal), Status::MoveToTable);
        assert_eq!(status(2, &state, &goal), Status::Inaccessible);
        assert!(!goal_reached(&state, &goal));
    }
}
