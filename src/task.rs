use anyhow::Result;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Write};
use tracing::info;

use crate::common::{Agent, SolverError};
use crate::map::Roadmap;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub start: usize,
    pub goal: usize,
}

impl TaskRecord {
    pub fn to_agent(&self, id: usize) -> Agent {
        Agent {
            id,
            start: self.start,
            goal: self.goal,
        }
    }
}

/// The agent roster of one problem instance.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Task {
    pub agents: Vec<TaskRecord>,
}

impl Task {
    pub fn load_from_yaml(path: &str) -> Result<Task> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let task = serde_yaml::from_reader(reader)?;
        Ok(task)
    }

    pub fn write_to_yaml(&self, path: &str) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = io::BufWriter::new(file);
        let yaml_data = serde_yaml::to_string(self)?;
        writer.write_all(yaml_data.as_bytes())?;
        Ok(())
    }

    /// Checked conversion into solver agents. All `InvalidInput` conditions
    /// are surfaced here, before any search runs.
    pub fn to_agents(&self, map: &Roadmap, radius: f64) -> Result<Vec<Agent>, SolverError> {
        let agents: Vec<Agent> = self
            .agents
            .iter()
            .enumerate()
            .map(|(id, record)| record.to_agent(id))
            .collect();
        validate_instance(map, &agents, radius)?;
        Ok(agents)
    }

    /// Draw a random solvable-looking roster: distinct starts and goals
    /// with pairwise clearance of at least 2r.
    pub fn generate_random<R: Rng + ?Sized>(
        map: &Roadmap,
        num_agents: usize,
        radius: f64,
        rng: &mut R,
    ) -> Result<Task, String> {
        let mut vertices: Vec<usize> = (0..map.num_vertices()).collect();
        let separation = 2.0 * radius;

        let mut pick = |taken: &mut Vec<usize>, rng: &mut R| -> Option<usize> {
            vertices.shuffle(rng);
            for &candidate in vertices.iter() {
                if taken
                    .iter()
                    .all(|&occupied| map.euclidean(candidate, occupied) >= separation)
                {
                    taken.push(candidate);
                    return Some(candidate);
                }
            }
            None
        };

        let mut starts = Vec::new();
        let mut goals = Vec::new();
        let mut records = Vec::new();
        for _ in 0..num_agents {
            let start = pick(&mut starts, rng).ok_or("not enough clearance for starts")?;
            let goal = pick(&mut goals, rng).ok_or("not enough clearance for goals")?;
            records.push(TaskRecord { start, goal });
        }

        let task = Task { agents: records };
        info!("Generated task: {task:?}");
        Ok(task)
    }
}

/// Problem-instance validation shared by file loading and programmatic
/// construction.
pub(crate) fn validate_instance(
    map: &Roadmap,
    agents: &[Agent],
    radius: f64,
) -> Result<(), SolverError> {
    if !(radius > 0.0 && radius <= 0.5) {
        return Err(SolverError::InvalidInput(format!(
            "agent radius {radius} outside (0, 0.5]"
        )));
    }

    for agent in agents {
        if !agent.verify(map) {
            return Err(SolverError::InvalidInput(format!(
                "agent {} references a vertex outside the roadmap",
                agent.id
            )));
        }
    }

    // Two disks parked at the same instant must never overlap: that holds
    // for every pair of starts (t=0) and every pair of goals (both dwell
    // forever eventually).
    let separation = 2.0 * radius;
    for i in 0..agents.len() {
        for j in (i + 1)..agents.len() {
            if map.euclidean(agents[i].start, agents[j].start) < separation {
                return Err(SolverError::InvalidInput(format!(
                    "agents {i} and {j} start closer than 2r"
                )));
            }
            if map.euclidean(agents[i].goal, agents[j].goal) < separation {
                return Err(SolverError::InvalidInput(format!(
                    "agents {i} and {j} share overlapping goals"
                )));
            }
        }
    }
    Ok(())
}
