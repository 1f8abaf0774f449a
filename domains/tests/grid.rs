use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::time::Duration;
use weaver_domains::grid::{self, Facing, GridState};
use weaver_htn::AnytimeOptions;

fn open_grid(width: i64, height: i64, start: (i64, i64), facing: Facing) -> GridState {
    GridState {
        at: start,
        facing,
        visited: HashSet::from([(start, facing)]),
        width,
        height,
        obstacles: HashSet::new(),
    }
}

#[test]
fn routes_across_an_open_grid() {
    let state = open_grid(3, 3, (0, 0), Facing::North);
    let goal = (2, 2);
    let planner = grid::planner();
    let reports = planner
        .anytime(
            &state,
            &grid::route_task(&state, goal),
            &AnytimeOptions::with_timeout(Duration::from_secs(5)),
        )
        .unwrap();
    assert!(!reports.is_empty());
    let best = reports.last().unwrap();
    let states = planner.plan_states(&state, &best.plan).unwrap();
    assert_eq!(states.last().unwrap().at, goal);
    // 4 moves plus 2 turns is the minimum starting faced away from the goal
    assert_eq!(best.cost, 6.0);
    assert_eq!(best.plan.len(), 6);
}

#[test]
fn first_plan_replays_to_the_goal() {
    let state = open_grid(4, 4, (1, 0), Facing::South);
    let goal = (3, 3);
    let planner = grid::planner();
    let report = planner
        .first_plan(&state, &grid::route_task(&state, goal))
        .unwrap()
        .unwrap();
    let states = planner.plan_states(&state, &report.plan).unwrap();
    assert_eq!(states.last().unwrap().at, goal);
    assert_eq!(states.len(), report.plan.len() + 1);
}

#[test]
fn obstacle_worlds_agree_with_the_reference_search() {
    let mut rng = SmallRng::seed_from_u64(12);
    let state = grid::generate(5, 5, (0, 0), Facing::East, 6, &mut rng);
    let goal = (4, 4);
    let reference = grid::shortest_path(&state, (0, 0), goal);
    let planner = grid::planner();
    let reports = planner
        .anytime(
            &state,
            &grid::route_task(&state, goal),
            &AnytimeOptions::with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
    match reference {
        Some(path) => {
            // the planner must reach the goal, and can never use fewer
            // moves than the shortest cell path (turns only add steps)
            let best = reports.last().expect("reachable goal must be planned");
            let states = planner.plan_states(&state, &best.plan).unwrap();
            assert_eq!(states.last().unwrap().at, goal);
            let moves = best
                .plan
                .iter()
                .filter(|t| t.name.as_str() == "move_one_step")
                .count();
            assert!(moves >= path.len() - 1);
        }
        None => assert!(reports.is_empty()),
    }
}

#[test]
fn unreachable_goals_produce_no_plans() {
    // wall off the start cell completely
    let mut state = open_grid(3, 1, (0, 0), Facing::East);
    state.obstacles.insert(((0, 0), Facing::East));
    let planner = grid::planner();
    let reports = planner
        .anytime(
            &state,
            &grid::route_task(&state, (2, 0)),
            &AnytimeOptions::with_timeout(Duration::from_secs(1)),
        )
        .unwrap();
    assert!(reports.is_empty());
}
