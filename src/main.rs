mod common;
mod config;
mod geometry;
mod map;
mod policy;
mod solver;
mod stat;
mod task;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Cli, Config};
use map::Roadmap;
use solver::{Solver, CCBS};
use task::Task;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {path}"))?;
            Config::from_yaml_str(&raw)?
        }
        None => Config::default(),
    };
    let config = config.override_from_command_line(&cli)?;

    let map = Roadmap::from_file(&config.map_path)
        .with_context(|| format!("loading roadmap {}", config.map_path))?;
    let task = match cli.generate_task {
        Some(num_agents) => {
            let mut rng = StdRng::from_entropy();
            let task = Task::generate_random(&map, num_agents, config.agent_size, &mut rng)
                .map_err(|message| anyhow::anyhow!(message))?;
            task.write_to_yaml("generated_task.yaml")?;
            task
        }
        None => Task::load_from_yaml(&config.task_path)
            .with_context(|| format!("loading task {}", config.task_path))?,
    };
    let agents = task.to_agents(&map, config.agent_size)?;
    info!(
        "solving {} agents on {} vertices (r = {})",
        agents.len(),
        map.num_vertices(),
        config.agent_size
    );

    let mut solver = CCBS::new(agents, &map, config);
    let solution = solver.solve()?;

    if solution.found {
        info!(
            "solution: flowtime {:.6} makespan {:.6} time {:.3}s high-level {} low-level {}",
            solution.flowtime,
            solution.makespan,
            solution.time,
            solution.high_level_expanded,
            solution.low_level_expanded
        );
        solution.log_solution();
    } else {
        info!(
            "no solution ({:?}) after {:.3}s, high-level {} low-level {}",
            solution.reason,
            solution.time,
            solution.high_level_expanded,
            solution.low_level_expanded
        );
    }
    Ok(())
}
