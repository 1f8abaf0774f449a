//! Warehouse delivery: robots move one grid cell at a time, pick items up
//! and put them down. The route method descends the Manhattan distance, so
//! route options always make progress towards the target cell.

use arcstr::ArcStr;
use std::collections::BTreeMap;
use weaver_htn::{task, Planner, Task, TaskList, Value};

pub type Pos = (i64, i64);

/// Where an entity is: on a grid cell or carried by a robot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    At(Pos),
    Carried(ArcStr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseState {
    pub robots: Vec<ArcStr>,
    pub loc: BTreeMap<ArcStr, Location>,
}

impl WarehouseState {
    pub fn occupied(&self, position: Pos) -> bool {
        self.robots
            .iter()
            .any(|robot| self.loc.get(robot) == Some(&Location::At(position)))
    }
}

pub fn manhattan_distance(p1: Pos, p2: Pos) -> i64 {
    (p1.0 - p2.0).abs() + (p1.1 - p2.1).abs()
}

pub fn manhattan_neighbors(p: Pos) -> [Pos; 4] {
    [
        (p.0 - 1, p.1),
        (p.0 + 1, p.1),
        (p.0, p.1 - 1),
        (p.0, p.1 + 1),
    ]
}

fn entity(value: Option<&Value>) -> Option<ArcStr> {
    value.and_then(|v| v.sym()).map(ArcStr::from)
}

fn find_route(_state: &WarehouseState, args: &[Value]) -> TaskList {
    let (Some(who), Some(start), Some(end)) = (
        entity(args.first()),
        args.get(1).and_then(Value::pair),
        args.get(2).and_then(Value::pair),
    ) else {
        return TaskList::failed();
    };
    let current_distance = manhattan_distance(start, end);
    if start == end {
        return TaskList::Completed;
    }
    if current_distance == 1 {
        return TaskList::single(vec![task!("go", who, start, end)]);
    }
    TaskList::of(
        manhattan_neighbors(start)
            .into_iter()
            .filter(|&neighbor| manhattan_distance(neighbor, end) < current_distance)
            .map(|neighbor| {
                vec![
                    task!("go", who.clone(), start, neighbor),
                    task!("find_route", who.clone(), neighbor, end),
                ]
            })
            .collect(),
    )
}

fn deliver(state: &WarehouseState, args: &[Value]) -> TaskList {
    let (Some(item), Some(end)) = (entity(args.first()), args.get(1).and_then(Value::pair)) else {
        return TaskList::failed();
    };
    if state.loc.get(&item) == Some(&Location::At(end)) {
        return TaskList::Completed;
    }
    let Some(robot) = state.robots.first().cloned() else {
        return TaskList::failed();
    };
    let (Some(Location::At(robot_at)), Some(Location::At(item_at))) =
        (state.loc.get(&robot), state.loc.get(&item))
    else {
        return TaskList::failed();
    };
    TaskList::single(vec![
        task!("find_route", robot.clone(), *robot_at, *item_at),
        task!("pick_up", robot.clone(), item.clone()),
        task!("find_route", robot.clone(), *item_at, end),
        task!("put_down", robot, item),
    ])
}

pub fn planner() -> Planner<WarehouseState> {
    let mut p = Planner::new();
    p.declare_operator("go", |state: &mut WarehouseState, args| {
        let (Some(who), Some(start), Some(end)) = (
            entity(args.first()),
            args.get(1).and_then(Value::pair),
            args.get(2).and_then(Value::pair),
        ) else {
            return false;
        };
        if state.loc.get(&who) == Some(&Location::At(start)) && manhattan_distance(start, end) == 1
        {
            state.loc.insert(who, Location::At(end));
            true
        } else {
            false
        }
    });
    p.declare_operator("pick_up", |state: &mut WarehouseState, args| {
        let (Some(bot), Some(item)) = (entity(args.first()), entity(args.get(1))) else {
            return false;
        };
        if state.loc.get(&bot) == state.loc.get(&item) {
            state.loc.insert(item, Location::Carried(bot));
            true
        } else {
            false
        }
    });
    p.declare_operator("put_down", |state: &mut WarehouseState, args| {
        let (Some(bot), Some(item)) = (entity(args.first()), entity(args.get(1))) else {
            return false;
        };
        if state.loc.get(&item) == Some(&Location::Carried(bot.clone())) {
            let Some(bot_at) = state.loc.get(&bot).cloned() else {
                return false;
            };
            state.loc.insert(item, bot_at);
            true
        } else {
            false
        }
    });
    p.declare_method("find_route", |state: &WarehouseState, args| {
        find_route(state, args)
    });
    p.declare_method("deliver", |state: &WarehouseState, args| deliver(state, args));
    p
}

pub fn deliver_task(item: &str, end: Pos) -> Vec<Task> {
    vec![task!("deliver", item, end)]
}

/// Independent validity check of a delivery plan: every step must respect
/// the movement rules (including robot collisions, which the operators do
/// not track) and every delivery must be satisfied at the end.
pub fn plan_valid(start: &WarehouseState, plan: &[Task], deliveries: &[(ArcStr, Pos)]) -> bool {
    let mut current = start.clone();
    for step in plan {
        let previous = current.clone();
        let applied = match step.name.as_str() {
            "go" => {
                let (Some(who), Some(from), Some(to)) = (
                    entity(step.args.first()),
                    step.args.get(1).and_then(Value::pair),
                    step.args.get(2).and_then(Value::pair),
                ) else {
                    return false;
                };
                if previous.occupied(to)
                    || previous.loc.get(&who) != Some(&Location::At(from))
                    || manhattan_distance(from, to) != 1
                {
                    return false;
                }
                current.loc.insert(who, Location::At(to));
                true
            }
            "pick_up" => {
                let (Some(bot), Some(item)) = (entity(step.args.first()), entity(step.args.get(1)))
                else {
                    return false;
                };
                if previous.loc.get(&bot) != previous.loc.get(&item) {
                    return false;
                }
                current.loc.insert(item, Location::Carried(bot));
                true
            }
            "put_down" => {
                let (Some(bot), Some(item)) = (entity(step.args.first()), entity(step.args.get(1)))
                else {
                    return false;
                };
                if previous.loc.get(&item) != Some(&Location::Carried(bot.clone())) {
                    return false;
                }
                let Some(bot_at) = previous.loc.get(&bot).cloned() else {
                    return false;
                };
                current.loc.insert(item, bot_at);
                true
            }
            _ => false,
        };
        if !applied {
            return false;
        }
    }
    deliveries
        .iter()
        .all(|(item, end)| current.loc.get(item) == Some(&Location::At(*end)))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;
    use weaver_htn::AnytimeOptions;

    fn floor() -> WarehouseState {
        WarehouseState {
            robots: vec![ArcStr::from("robot1")],
            loc: BTreeMap::from([
                (ArcStr::from("robot1"), Location::At((0, 0))),
                (ArcStr::from("package1"), Location::At((-2, 1))),
                (ArcStr::from("package2"), Location::At((-1, 1))),
            ]),
        }
    }

    #[test]
    fn delivery_plans_are_valid_and_optimal_in_length() {
        let p = planner();
        let state = floor();
        let reports = p
            .anytime(
                &state,
                &deliver_task("package1", (0, 0)),
                &AnytimeOptions::with_timeout(Duration::from_secs(2)),
            )
            .unwrap();
        let best = reports.last().unwrap();
        assert!(plan_valid(
            &state,
            &best.plan,
            &[(ArcStr::from("package1"), (0, 0))]
        ));
        // 3 cells out, pick up, 3 cells back, put down
        assert_eq!(best.plan.len(), 8);
        assert_eq!(best.cost, 8.0);
    }

    #[test]
    fn validity_checker_rejects_teleports() {
        let state = floor();
        let bogus = vec![task!("go", "robot1", (0, 0), (2, 0))];
        assert!(!plan_valid(&state, &bogus, &[]));
    }

    #[test]
    fn already_delivered_items_need_no_plan() {
        let p = planner();
        let state = floor();
        let report = p
            .first_plan(&state, &deliver_task("package1", (-2, 1)))
            .unwrap()
            .unwrap();
        assert!(report.plan.is_empty());
        assert_eq!(report.cost, 0.0);
    }
}
