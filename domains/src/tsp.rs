//! Euclidean travelling salesman as an HTN domain: the tour method offers a
//! nondeterministic choice among the unvisited cities, and the cost function
//! charges the travel distance of each move.

use crate::graph::Graph;
use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::HashSet;
use weaver_htn::{task, Planner, Task, TaskList, Value};

pub fn euclidean_distance(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    ((p2.0 - p1.0).powi(2) + (p2.1 - p1.1).powi(2)).sqrt()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TspState {
    pub locations: Vec<(f64, f64)>,
    pub at: usize,
    pub visited: HashSet<usize>,
}

impl TspState {
    pub fn new(locations: Vec<(f64, f64)>) -> TspState {
        TspState {
            locations,
            at: 0,
            visited: HashSet::new(),
        }
    }
}

fn complete_tour_from(state: &TspState, args: &[Value]) -> TaskList {
    let Some(home) = args.first().and_then(Value::int).map(|h| h as usize) else {
        return TaskList::failed();
    };
    if state.visited.len() == state.locations.len() {
        return TaskList::Completed;
    }
    let options: Vec<Vec<Task>> = (0..state.locations.len())
        .filter(|&city| city != home && !state.visited.contains(&city))
        .map(|city| {
            vec![
                task!("move", city as i64),
                task!("complete_tour_from", home as i64),
            ]
        })
        .collect();
    if options.is_empty() {
        // every other city has been visited: close the tour
        TaskList::single(vec![task!("move", home as i64)])
    } else {
        TaskList::of(options)
    }
}

pub fn planner() -> Planner<TspState> {
    let mut p = Planner::new();
    p.declare_operator("move", |state: &mut TspState, args| {
        let Some(city) = args.first().and_then(Value::int).map(|c| c as usize) else {
            return false;
        };
        if city >= state.locations.len() || state.visited.contains(&city) {
            return false;
        }
        state.visited.insert(city);
        state.at = city;
        true
    });
    p.declare_method("complete_tour_from", |state: &TspState, args| {
        complete_tour_from(state, args)
    });
    p.set_cost_fn(|state: &TspState, task: &Task| {
        match task.args.first().and_then(Value::int) {
            Some(city) => {
                euclidean_distance(state.locations[state.at], state.locations[city as usize])
            }
            None => 0.0,
        }
    });
    p
}

pub fn tour_tasks(home: usize) -> Vec<Task> {
    vec![task!("complete_tour_from", home as i64)]
}

fn random_coordinate(bound: f64, rng: &mut SmallRng) -> f64 {
    rng.random::<f64>() * bound - bound / 2.0
}

pub fn random_instance(num_cities: usize, width: f64, height: f64, rng: &mut SmallRng) -> TspState {
    let locations = (0..num_cities)
        .map(|_| (random_coordinate(width, rng), random_coordinate(height, rng)))
        .collect();
    TspState::new(locations)
}

/// Minimum-spanning-tree cost over the complete city graph: a lower bound
/// on any tour's cost.
pub fn mst_lower_bound(state: &TspState) -> f64 {
    let mut graph = Graph::new();
    for &location in &state.locations {
        graph.add_node(location);
    }
    graph.add_all_possible_edges();
    graph.minimum_spanning_tree();
    graph.mst_cost()
}
