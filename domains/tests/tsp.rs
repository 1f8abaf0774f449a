use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::time::Duration;
use weaver_domains::tsp::{self, TspState};
use weaver_htn::{AnytimeOptions, HybridQueue, IncrementalOptions};

/// Four cities on a 3x4 rectangle: the optimal tour is the perimeter.
fn rectangle() -> TspState {
    TspState::new(vec![(0.0, 0.0), (3.0, 0.0), (3.0, 4.0), (0.0, 4.0)])
}

#[test]
fn exhaustive_search_finds_the_perimeter_tour() {
    let planner = tsp::planner();
    let state = rectangle();
    let reports = planner
        .anytime(
            &state,
            &tsp::tour_tasks(0),
            &AnytimeOptions::with_timeout(Duration::from_secs(1)),
        )
        .unwrap();
    let best = reports.last().unwrap();
    assert!((best.cost - 14.0).abs() < 1e-9);
    for pair in reports.windows(2) {
        assert!(pair[1].cost < pair[0].cost);
    }
}

#[test]
fn hybrid_frontier_agrees_on_the_optimum() {
    let planner = tsp::planner();
    let state = rectangle();
    let reports = planner
        .anytime_with_frontier(
            &state,
            &tsp::tour_tasks(0),
            &AnytimeOptions::with_timeout(Duration::from_secs(1)),
            HybridQueue::new(),
        )
        .unwrap();
    assert!((reports.last().unwrap().cost - 14.0).abs() < 1e-9);
}

#[test]
fn emitted_costs_match_replayed_travel_distance() {
    let planner = tsp::planner();
    let state = rectangle();
    let report = planner
        .first_plan(&state, &tsp::tour_tasks(0))
        .unwrap()
        .unwrap();
    let states = planner.plan_states(&state, &report.plan).unwrap();
    assert_eq!(states.len(), report.plan.len() + 1);
    let mut travelled = 0.0;
    for (before, step) in states.iter().zip(&report.plan) {
        let city = step.args[0].int().unwrap() as usize;
        travelled +=
            tsp::euclidean_distance(before.locations[before.at], before.locations[city]);
    }
    assert!((travelled - report.cost).abs() < 1e-9);
    // a full tour visits every city exactly once
    assert_eq!(report.plan.len(), state.locations.len());
}

#[test]
fn tracked_search_improves_monotonically_on_ten_cities() {
    let mut rng = SmallRng::seed_from_u64(2024);
    let state = tsp::random_instance(10, 200.0, 200.0, &mut rng);
    let mut planner = tsp::planner();
    planner.set_seed(77);
    let reports = planner
        .anytime_tracked(&state, &tsp::tour_tasks(0), Duration::from_millis(400), true)
        .unwrap();
    assert!(!reports.is_empty());
    for pair in reports.windows(2) {
        assert!(pair[1].cost < pair[0].cost);
    }
    // no tour can undercut the spanning-tree bound
    let bound = tsp::mst_lower_bound(&state);
    assert!(reports.last().unwrap().cost >= bound - 1e-9);
}

#[test]
fn incremental_search_improves_monotonically() {
    let mut rng = SmallRng::seed_from_u64(99);
    let state = tsp::random_instance(8, 150.0, 150.0, &mut rng);
    let mut planner = tsp::planner();
    planner.set_seed(13);
    let reports = planner
        .anytime_incremental(
            &state,
            &tsp::tour_tasks(0),
            Duration::from_millis(300),
            &IncrementalOptions::default(),
        )
        .unwrap();
    assert!(!reports.is_empty());
    for pair in reports.windows(2) {
        assert!(pair[1].cost < pair[0].cost);
    }
    for report in &reports {
        let states = planner.plan_states(&state, &report.plan).unwrap();
        assert_eq!(states.last().unwrap().visited.len(), state.locations.len());
    }
}

#[test]
fn unbounded_random_matches_bounded_on_validity() {
    let planner = tsp::planner();
    let state = rectangle();
    let reports = planner
        .anytime_random(&state, &tsp::tour_tasks(0), Duration::from_millis(100), false)
        .unwrap();
    assert!(!reports.is_empty());
    for report in &reports {
        let states = planner.plan_states(&state, &report.plan).unwrap();
        assert_eq!(states.last().unwrap().visited.len(), 4);
    }
}
