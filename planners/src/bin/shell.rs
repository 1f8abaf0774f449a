//! Line-oriented planning shell: load HDDL files, run any strategy under a
//! time budget, inspect the last plan found.

use anyhow::{anyhow, bail, Result};
use std::io::{BufRead, Write};
use std::time::Duration;
use weaver_hddl::{ground, parse_hddl, Domain, HddlFile, Problem};
use weaver_htn::PlanReport;
use weaver_planners::strategy::{run, FrontierKind, Strategy, ALL_STRATEGIES};

const COMMANDS: [(&str, &str); 11] = [
    ("help", "see this message"),
    ("quit/exit", "exit planning shell"),
    ("dir/ls", "list current files"),
    ("cd [dir]", "change directories"),
    ("pwd", "see present working directory"),
    ("hddl [filename]", "load HDDL problem/domain"),
    ("current", "see current HDDL problem/domain"),
    ("planners", "list all planners"),
    ("see_plan", "show last plan, along with cost and time of discovery"),
    ("see_plan_stats", "show last plan cost and time of discovery"),
    (
        "plan [planner] [time_limit]",
        "find a plan using the given planner within the time limit",
    ),
];

#[derive(Default)]
struct Session {
    domain: Option<Domain>,
    problem: Option<Problem>,
    last: Option<PlanReport>,
}

impl Session {
    fn load_hddl(&mut self, filename: &str) -> Result<String> {
        let text = std::fs::read_to_string(filename)?;
        match parse_hddl(&text)? {
            HddlFile::Domain(domain) => {
                let name = domain.name.clone();
                self.domain = Some(*domain);
                Ok(format!("loaded domain {name}"))
            }
            HddlFile::Problem(problem) => {
                let name = problem.name.clone();
                self.problem = Some(*problem);
                Ok(format!("loaded problem {name}"))
            }
        }
    }

    fn plan(&mut self, args: &[&str]) -> Result<String> {
        let (Some(domain), Some(problem)) = (&self.domain, &self.problem) else {
            bail!("load a domain and a problem first");
        };
        let strategy: Strategy = args
            .first()
            .ok_or_else(|| anyhow!("usage: plan [planner] [time_limit]"))?
            .parse()
            .map_err(|e: String| anyhow!(e))?;
        let seconds: f64 = args
            .get(1)
            .ok_or_else(|| anyhow!("usage: plan [planner] [time_limit]"))?
            .parse()?;
        let grounded = ground(domain, problem)?;
        let start = std::time::Instant::now();
        let reports = run(
            &grounded,
            strategy,
            FrontierKind::Stack,
            Duration::from_secs_f64(seconds),
        )?;
        let duration = start.elapsed();
        self.last = reports.last().cloned();
        Ok(format!(
            "{} plans in {:.2}s",
            reports.len(),
            duration.as_secs_f64()
        ))
    }
}

fn execute(session: &mut Session, line: &str) -> Result<Option<String>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&command) = parts.first() else {
        return Ok(None);
    };
    let response = match command {
        "help" => {
            let width = COMMANDS.iter().map(|(c, _)| c.len()).max().unwrap_or(0);
            COMMANDS
                .iter()
                .map(|(cmd, description)| format!("{cmd}{}  {description}", " ".repeat(width - cmd.len())))
                .collect::<Vec<_>>()
                .join("\n")
        }
        "dir" | "ls" => {
            let mut entries: Vec<String> = std::fs::read_dir(".")?
                .filter_map(|e| Some(e.ok()?.file_name().to_string_lossy().into_owned()))
                .collect();
            entries.sort();
            entries.join("\n")
        }
        "pwd" => std::env::current_dir()?.display().to_string(),
        "cd" => {
            let target = parts.get(1).ok_or_else(|| anyhow!("usage: cd [dir]"))?;
            std::env::set_current_dir(target)?;
            std::env::current_dir()?.display().to_string()
        }
        "current" => format!(
            "Domain:  {}\nProblem: {}",
            session.domain.as_ref().map_or("None", |d| d.name.as_str()),
            session.problem.as_ref().map_or("None", |p| p.name.as_str()),
        ),
        "planners" => ALL_STRATEGIES
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("\n"),
        "hddl" => {
            let filename = parts.get(1).ok_or_else(|| anyhow!("usage: hddl [filename]"))?;
            session.load_hddl(filename)?
        }
        "plan" => session.plan(&parts[1..])?,
        "see_plan" => match &session.last {
            Some(report) => report
                .plan
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
            None => "No plan yet found".to_owned(),
        },
        "see_plan_stats" => match &session.last {
            Some(report) => format!(
                "Last cost: {:.2}; discovered after {:.2}s",
                report.cost,
                report.elapsed_secs()
            ),
            None => "No plan yet found".to_owned(),
        },
        other => format!("Did not recognize: '{other}'"),
    };
    Ok(Some(response))
}

fn main() -> Result<()> {
    let stdin = std::io::stdin();
    let mut session = Session::default();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim();
        if line == "quit" || line == "exit" {
            return Ok(());
        }
        match execute(&mut session, line) {
            Ok(Some(response)) => println!("{response}"),
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
    }
}
