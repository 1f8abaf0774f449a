//! Batch-experiment harness: run a generator-produced set of problems
//! through deterministic planners once and randomized planners several
//! times, and report final plan costs with 95% confidence intervals.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use weaver_htn::stats::{confidence_interval_95, mean};
use weaver_htn::{PlanReport, Task};

/// A planning strategy under test: state and tasks in, improving plans out.
pub type StrategyFn<'a, S> =
    Box<dyn Fn(&S, &[Task], Duration) -> weaver_htn::Result<Vec<PlanReport>> + 'a>;

/// Final cost of one strategy on one problem; `margin` is the half-width of
/// the confidence interval (0 for deterministic strategies).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostSummary {
    pub mean: f64,
    pub margin: f64,
}

pub type ProblemSummary = BTreeMap<String, CostSummary>;

fn report_one(label: &str, reports: &[PlanReport]) -> Option<f64> {
    println!("{label}");
    println!("{} plans", reports.len());
    let last = reports.last()?;
    println!("cost: {:.2} ({:.2}s)", last.cost, last.elapsed_secs());
    println!();
    Some(last.cost)
}

/// Runs every strategy on `num_problems` generated instances (randomized
/// strategies `runs_per_problem` times each) and returns one summary row
/// per problem. Strategies that find no plan on a problem are absent from
/// that problem's row.
pub fn experiment<S>(
    num_problems: usize,
    runs_per_problem: usize,
    timeout: Duration,
    mut generate: impl FnMut(usize) -> (S, Vec<Task>),
    deterministic: &[(&str, StrategyFn<S>)],
    randomized: &[(&str, StrategyFn<S>)],
) -> weaver_htn::Result<Vec<ProblemSummary>> {
    let start = Instant::now();
    let mut summaries = Vec::with_capacity(num_problems);
    for index in 0..num_problems {
        println!("Problem {}", index + 1);
        let (state, tasks) = generate(index);
        let mut summary = ProblemSummary::new();

        for (name, strategy) in deterministic {
            let reports = strategy(&state, &tasks, timeout)?;
            if let Some(cost) = report_one(name, &reports) {
                summary.insert((*name).to_owned(), CostSummary { mean: cost, margin: 0.0 });
            }
        }

        for (name, strategy) in randomized {
            let mut costs = Vec::with_capacity(runs_per_problem);
            for run in 0..runs_per_problem {
                println!("Run {}", run + 1);
                let reports = strategy(&state, &tasks, timeout)?;
                if let Some(cost) = report_one(name, &reports) {
                    costs.push(cost);
                }
            }
            if costs.is_empty() {
                continue;
            }
            let entry = match confidence_interval_95(&costs) {
                Some(ci) => {
                    println!("{name}: {ci}");
                    CostSummary {
                        mean: ci.mean,
                        margin: ci.hi - ci.mean,
                    }
                }
                None => CostSummary {
                    mean: mean(&costs),
                    margin: 0.0,
                },
            };
            summary.insert((*name).to_owned(), entry);
        }

        println!();
        summaries.push(summary);
    }
    println!("Duration: {:.2}s", start.elapsed().as_secs_f64());
    Ok(summaries)
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use weaver_domains::tsp::{self, TspState};
    use weaver_htn::AnytimeOptions;

    #[test]
    fn experiment_summarizes_every_strategy() {
        let mut rng = SmallRng::seed_from_u64(8);
        let deterministic: Vec<(&str, StrategyFn<TspState>)> = vec![(
            "dfs",
            Box::new(|state, tasks, timeout| {
                tsp::planner().anytime(state, tasks, &AnytimeOptions::with_timeout(timeout))
            }),
        )];
        let randomized: Vec<(&str, StrategyFn<TspState>)> = vec![(
            "random",
            Box::new(|state, tasks, timeout| {
                tsp::planner().anytime_random(state, tasks, timeout, true)
            }),
        )];
        let summaries = experiment(
            2,
            2,
            Duration::from_millis(50),
            |_| {
                (
                    tsp::random_instance(5, 100.0, 100.0, &mut rng),
                    tsp::tour_tasks(0),
                )
            },
            &deterministic,
            &randomized,
        )
        .unwrap();
        assert_eq!(summaries.len(), 2);
        for summary in &summaries {
            let dfs = summary.get("dfs").expect("dfs always finds a tour");
            assert_eq!(dfs.margin, 0.0);
            let random = summary.get("random").expect("random finds tours too");
            assert!(random.mean > 0.0);
            assert!(random.margin >= 0.0);
        }
    }
}
