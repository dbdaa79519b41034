use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

use ordered_float::OrderedFloat;

use crate::common::{Agent, EPSILON};

/// A roadmap vertex: planar coordinates plus the adjacency list.
/// Neighbors are kept sorted ascending so low-level expansions have a
/// stable tie-break order.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub neighbors: Vec<usize>,
}

/// Weighted undirected roadmap with 2-D vertex coordinates. Edge durations
/// equal Euclidean length at unit speed. Immutable once heuristics are
/// precomputed, so a single instance can back many solver runs.
#[derive(Debug, Clone)]
pub struct Roadmap {
    pub vertices: Vec<Vertex>,
    /// Per-agent table of shortest-path distances to that agent's goal.
    pub heuristic: Vec<Vec<f64>>,
}

impl Roadmap {
    pub fn new(coords: Vec<(f64, f64)>, edges: &[(usize, usize)]) -> io::Result<Self> {
        let mut vertices: Vec<Vertex> = coords
            .into_iter()
            .map(|(x, y)| Vertex {
                x,
                y,
                neighbors: Vec::new(),
            })
            .collect();

        for i in 0..vertices.len() {
            for j in (i + 1)..vertices.len() {
                let dx = vertices[i].x - vertices[j].x;
                let dy = vertices[i].y - vertices[j].y;
                if (dx * dx + dy * dy).sqrt() < EPSILON {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("vertices {i} and {j} coincide"),
                    ));
                }
            }
        }

        for &(u, v) in edges {
            if u >= vertices.len() || v >= vertices.len() || u == v {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("bad edge ({u}, {v})"),
                ));
            }
            if !vertices[u].neighbors.contains(&v) {
                vertices[u].neighbors.push(v);
                vertices[v].neighbors.push(u);
            }
        }
        for vertex in &mut vertices {
            vertex.neighbors.sort_unstable();
        }

        Ok(Roadmap {
            vertices,
            heuristic: Vec::new(),
        })
    }

    /// Plain-text graph format:
    /// ```text
    /// vertices <n>
    /// <x> <y>          (n lines)
    /// edges <m>
    /// <u> <v>          (m lines)
    /// ```
    pub fn from_file(path: &str) -> io::Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let parse_count = |line: Option<io::Result<String>>| -> io::Result<usize> {
            line.ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "truncated graph"))??
                .split_whitespace()
                .last()
                .and_then(|count| count.parse::<usize>().ok())
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad count line"))
        };

        let num_vertices = parse_count(lines.next())?;
        let mut coords = Vec::with_capacity(num_vertices);
        for _ in 0..num_vertices {
            let line = lines.next().ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "missing vertex line")
            })??;
            let mut parts = line.split_whitespace();
            let x = parts
                .next()
                .and_then(|part| part.parse::<f64>().ok())
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad vertex line"))?;
            let y = parts
                .next()
                .and_then(|part| part.parse::<f64>().ok())
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad vertex line"))?;
            coords.push((x, y));
        }

        let num_edges = parse_count(lines.next())?;
        let mut edges = Vec::with_capacity(num_edges);
        for _ in 0..num_edges {
            let line = lines
                .next()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "missing edge line"))??;
            let mut parts = line.split_whitespace();
            let u = parts
                .next()
                .and_then(|part| part.parse::<usize>().ok())
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad edge line"))?;
            let v = parts
                .next()
                .and_then(|part| part.parse::<usize>().ok())
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad edge line"))?;
            edges.push((u, v));
        }

        Self::new(coords, &edges)
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn contains(&self, vertex: usize) -> bool {
        vertex < self.vertices.len()
    }

    pub fn coord(&self, vertex: usize) -> (f64, f64) {
        (self.vertices[vertex].x, self.vertices[vertex].y)
    }

    pub fn neighbors(&self, vertex: usize) -> &[usize] {
        &self.vertices[vertex].neighbors
    }

    pub fn degree(&self, vertex: usize) -> usize {
        self.vertices[vertex].neighbors.len()
    }

    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.vertices[u].neighbors.binary_search(&v).is_ok()
    }

    pub fn edge_duration(&self, u: usize, v: usize) -> f64 {
        let (ux, uy) = self.coord(u);
        let (vx, vy) = self.coord(v);
        ((ux - vx).powi(2) + (uy - vy).powi(2)).sqrt()
    }

    pub fn euclidean(&self, u: usize, v: usize) -> f64 {
        self.edge_duration(u, v)
    }

    /// Reverse Dijkstra from each agent's goal, one distance table per agent
    /// id. Unreachable vertices keep +inf.
    pub fn precompute_heuristics(&mut self, agents: &[Agent]) {
        self.heuristic = agents
            .iter()
            .map(|agent| self.distances_from(agent.goal))
            .collect();
    }

    /// Dijkstra distances from one vertex to every other.
    pub(crate) fn distances_from(&self, goal: usize) -> Vec<f64> {
        self.distances_avoiding(goal, &[])
    }

    /// Dijkstra distances that never pass through the banned vertices
    /// (the source itself is always allowed).
    pub(crate) fn distances_avoiding(&self, goal: usize, banned: &[usize]) -> Vec<f64> {
        let mut dist = vec![f64::INFINITY; self.vertices.len()];
        let mut heap = BinaryHeap::new();
        dist[goal] = 0.0;
        heap.push(Reverse((OrderedFloat(0.0), goal)));

        while let Some(Reverse((OrderedFloat(d), vertex))) = heap.pop() {
            if d > dist[vertex] + EPSILON {
                continue;
            }
            for &next in self.neighbors(vertex) {
                if banned.contains(&next) {
                    continue;
                }
                let candidate = d + self.edge_duration(vertex, next);
                if candidate + EPSILON < dist[next] {
                    dist[next] = candidate;
                    heap.push(Reverse((OrderedFloat(candidate), next)));
                }
            }
        }
        dist
    }

    /// Admissible goal-distance lower bound for one agent: the precomputed
    /// table when available, straight-line distance otherwise.
    pub fn goal_heuristic(&self, agent: &Agent, vertex: usize) -> f64 {
        match self.heuristic.get(agent.id) {
            Some(table) => table[vertex],
            None => self.euclidean(vertex, agent.goal),
        }
    }
}
