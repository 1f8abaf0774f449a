use std::str::FromStr;
use std::time::Duration;
use weaver_hddl::GroundProblem;
use weaver_htn::{
    AnytimeOptions, HybridQueue, IncrementalOptions, MonteCarloFrontier, PlanReport, SearchStack,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Anytime branch-and-bound over a frontier.
    Dfs,
    /// Uniform random rollouts with branch-and-bound cost caps.
    Random,
    /// Random rollouts with incremental prefix commitment.
    Incremental,
    /// Random rollouts with rank-biased tracked choices.
    Tracked,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "dfs" => Ok(Strategy::Dfs),
            "2" | "rand" | "random" => Ok(Strategy::Random),
            "3" | "inc" | "incremental" => Ok(Strategy::Incremental),
            "4" | "tracked" => Ok(Strategy::Tracked),
            _ => Err(format!("Unknown strategy: {s}")),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::Dfs => "dfs",
            Strategy::Random => "random",
            Strategy::Incremental => "incremental",
            Strategy::Tracked => "tracked",
        };
        write!(f, "{name}")
    }
}

pub const ALL_STRATEGIES: [Strategy; 4] = [
    Strategy::Dfs,
    Strategy::Random,
    Strategy::Incremental,
    Strategy::Tracked,
];

/// Frontier used by the [`Strategy::Dfs`] search.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrontierKind {
    Stack,
    Hybrid,
    MonteCarlo,
}

impl FromStr for FrontierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stack" => Ok(FrontierKind::Stack),
            "hybrid" | "heap" => Ok(FrontierKind::Hybrid),
            "mc" | "montecarlo" | "monte-carlo" => Ok(FrontierKind::MonteCarlo),
            _ => Err(format!("Unknown frontier: {s}")),
        }
    }
}

impl std::fmt::Display for FrontierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FrontierKind::Stack => "stack",
            FrontierKind::Hybrid => "hybrid",
            FrontierKind::MonteCarlo => "montecarlo",
        };
        write!(f, "{name}")
    }
}

/// Runs the chosen strategy on a grounded problem under a wall-clock budget.
pub fn run(
    problem: &GroundProblem,
    strategy: Strategy,
    frontier: FrontierKind,
    timeout: Duration,
) -> weaver_htn::Result<Vec<PlanReport>> {
    let planner = &problem.planner;
    match strategy {
        Strategy::Dfs => {
            let options = AnytimeOptions::with_timeout(timeout);
            match frontier {
                FrontierKind::Stack => planner.anytime_with_frontier(
                    &problem.state,
                    &problem.tasks,
                    &options,
                    SearchStack::new(),
                ),
                FrontierKind::Hybrid => planner.anytime_with_frontier(
                    &problem.state,
                    &problem.tasks,
                    &options,
                    HybridQueue::new(),
                ),
                FrontierKind::MonteCarlo => planner.anytime_with_frontier(
                    &problem.state,
                    &problem.tasks,
                    &options,
                    MonteCarloFrontier::new(planner, true),
                ),
            }
        }
        Strategy::Random => planner.anytime_random(&problem.state, &problem.tasks, timeout, true),
        Strategy::Incremental => planner.anytime_incremental(
            &problem.state,
            &problem.tasks,
            timeout,
            &IncrementalOptions::default(),
        ),
        Strategy::Tracked => planner.anytime_tracked(&problem.state, &problem.tasks, timeout, true),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strategy_names_round_trip() {
        for strategy in ALL_STRATEGIES {
            assert_eq!(strategy.to_string().parse::<Strategy>(), Ok(strategy));
        }
        assert!("warp".parse::<Strategy>().is_err());
        assert_eq!("heap".parse::<FrontierKind>(), Ok(FrontierKind::Hybrid));
    }
}
