use anyhow::{ensure, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use weaver_planners::strategy::{run, FrontierKind, Strategy};

/// Anytime HTN planning over total-order HDDL inputs.
///
/// Prints every improving plan found within the budget; exits with status 0
/// iff at least one plan was found.
#[derive(Debug, Parser)]
#[command(name = "weaver", rename_all = "kebab-case")]
struct Opt {
    domain: PathBuf,
    problem: PathBuf,
    /// Wall-clock planning budget in seconds.
    max_seconds: f64,
    /// Planning strategy: dfs, random, incremental or tracked.
    #[arg(short = 'p', long, default_value = "dfs")]
    strategy: Strategy,
    /// Frontier of the dfs strategy: stack, hybrid or montecarlo.
    #[arg(short = 'q', long, default_value = "stack")]
    frontier: FrontierKind,
    /// Increase verbosity (-v: info, -vv: debug, -vvv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let level = match opt.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    ensure!(
        opt.domain.exists(),
        "Domain file {} does not exist",
        opt.domain.display()
    );
    ensure!(
        opt.problem.exists(),
        "Problem file {} does not exist",
        opt.problem.display()
    );
    let domain_text = std::fs::read_to_string(&opt.domain)
        .with_context(|| format!("reading {}", opt.domain.display()))?;
    let problem_text = std::fs::read_to_string(&opt.problem)
        .with_context(|| format!("reading {}", opt.problem.display()))?;
    let problem = weaver_hddl::load(&domain_text, &problem_text)?;

    let timeout = Duration::from_secs_f64(opt.max_seconds);
    let start = std::time::Instant::now();
    let reports = run(&problem, opt.strategy, opt.frontier, timeout)?;
    let runtime = start.elapsed();

    for report in &reports {
        println!(
            "[{:7.3}s] cost {:8.2} ({} actions)",
            report.elapsed_secs(),
            report.cost,
            report.plan.len()
        );
    }
    match reports.last() {
        Some(best) => {
            println!("=============");
            for action in &best.plan {
                println!("{action}");
            }
            if !problem.goal.is_empty() {
                let states = problem.planner.plan_states(&problem.state, &best.plan)?;
                let satisfied = problem.goal_satisfied(states.last().unwrap_or(&problem.state));
                println!("goal satisfied: {satisfied}");
            }
            println!(
                "[summary] plans:{} best:{:.2} runtime:{}ms",
                reports.len(),
                best.cost,
                runtime.as_millis()
            );
            Ok(())
        }
        None => {
            println!("[summary] no plan found within {:.2}s", opt.max_seconds);
            std::process::exit(1);
        }
    }
}
