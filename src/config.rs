use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "Rust CCBS",
    about = "Continuous-time conflict-based search for roadmap MAPF.",
    version = "0.1"
)]
pub struct Cli {
    #[arg(long, short, help = "Path to the YAML config file")]
    pub config: Option<String>,

    #[arg(long, help = "Path to the roadmap graph file (overrides config)")]
    pub map: Option<String>,

    #[arg(long, help = "Path to the YAML task file (overrides config)")]
    pub task: Option<String>,

    #[arg(long, help = "Wall-clock budget in seconds (overrides config)")]
    pub timelimit: Option<f64>,

    #[arg(
        long,
        help = "Generate this many random agents instead of loading the task file"
    )]
    pub generate_task: Option<usize>,
}

#[derive(Serialize, Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub map_path: String,
    pub task_path: String,
    /// Disk radius of every agent, in (0, 0.5].
    pub agent_size: f64,
    /// Bisection precision for collision-interval endpoints.
    pub precision: f64,
    /// Wall-clock budget in seconds.
    pub timelimit: f64,
    /// High-level heuristic: 0 none, 1 LP relaxation, 2 greedy matching.
    pub hlh_type: u8,
    pub use_precalculated_heuristic: bool,
    pub use_disjoint_splitting: bool,
    pub use_cardinal: bool,
    pub use_corridor_symmetry: bool,
    pub use_target_symmetry: bool,
    /// Cap on high-level expansions, 0 means unlimited.
    pub max_expansions: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            map_path: "map_file/test/test.graph".to_string(),
            task_path: "map_file/test/test_task.yaml".to_string(),
            agent_size: 0.4,
            precision: 1e-6,
            timelimit: 30.0,
            hlh_type: 0,
            use_precalculated_heuristic: true,
            use_disjoint_splitting: false,
            use_cardinal: true,
            use_corridor_symmetry: false,
            use_target_symmetry: false,
            max_expansions: 0,
        }
    }
}

impl Config {
    pub fn from_yaml_str(config_str: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(config_str)?;
        config.validate()
    }

    pub fn override_from_command_line(mut self, cli: &Cli) -> anyhow::Result<Self> {
        if let Some(map) = &cli.map {
            self.map_path = map.clone();
        }
        if let Some(task) = &cli.task {
            self.task_path = task.clone();
        }
        if let Some(timelimit) = cli.timelimit {
            self.timelimit = timelimit;
        }
        self.validate()
    }

    pub fn validate(self) -> anyhow::Result<Self> {
        if !(self.agent_size > 0.0 && self.agent_size <= 0.5) {
            anyhow::bail!("agent_size must lie in (0, 0.5], got {}", self.agent_size);
        }
        if self.precision <= 0.0 {
            anyhow::bail!("precision must be positive, got {}", self.precision);
        }
        if self.timelimit <= 0.0 {
            anyhow::bail!("timelimit must be positive, got {}", self.timelimit);
        }
        if self.hlh_type > 2 {
            anyhow::bail!("hlh_type must be 0, 1 or 2, got {}", self.hlh_type);
        }
        Ok(self)
    }
}
