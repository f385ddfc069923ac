//! Incremental grid-accelerated spring embedder.
//!
//! [`SpringEmbedder::process`] applies a [`ChangeBatch`] to the private model, sizes the
//! simulation from the weighted median node size, runs a fixed number of cooling iterations and
//! writes the resulting positions back to the client graph.

use crate::algo::Config;
use crate::algo::median::weighted_median;
use crate::error::{Error, Result};
use crate::graph::{ChangeBatch, LayoutGraph, ModelHandle, Outcome, Point, Size};
use rustc_hash::FxHashMap;
use serde::Serialize;

mod force;
mod grid;
mod model;
mod pool;
mod rng;

use force::{Body, Simulation, Spring};
use grid::Grid;
use model::Model;
use rng::XorShift64Star;

/// Parameters of one run, derived from [`Config`] and the current graph.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Params {
    /// Ideal edge length.
    pub k: f64,
    pub k2: f64,
    pub t0: f64,
    pub cell_size: f64,
    /// Squared cutoff for repulsion between neighbouring cells.
    pub radius2: f64,
    pub rep_factor: f64,
    pub att_factor: f64,
    pub num_iters: usize,
    pub use_grid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RunStats {
    /// Iterations that moved nodes.
    pub iterations: usize,
    /// Iterations skipped because their temperature was not positive.
    pub skipped_iterations: usize,
    /// Repulsion evaluations over the whole run.
    pub repulsions: u64,
    /// Jitter draws spent separating coincident nodes.
    pub jitters: u64,
    /// Largest number of occupied grid cells in any iteration.
    pub max_cells: usize,
    pub params: Params,
}

#[derive(Debug, Default, Clone)]
struct ProcessTimings {
    total: std::time::Duration,
    apply_changes: std::time::Duration,
    sizing: std::time::Duration,
    iterations: std::time::Duration,
    write_back: std::time::Duration,
}

/// Persistent layout state for one client graph.
pub struct SpringEmbedder<G: LayoutGraph> {
    config: Config,
    // `t0`/`cell_size` derived by an earlier run; reused until `reset_tuning`.
    tuned_t0: Option<f64>,
    tuned_cell_size: Option<f64>,
    params: Params,
    model: Model<G::NodeId, G::EdgeId>,
    grid: Grid,
}

impl<G: LayoutGraph> Default for SpringEmbedder<G> {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl<G: LayoutGraph> SpringEmbedder<G> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            tuned_t0: None,
            tuned_cell_size: None,
            params: Params::default(),
            model: Model::default(),
            grid: Grid::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Parameters used by the most recent run.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Forgets the derived initial temperature and cell size so the next run derives them again.
    pub fn reset_tuning(&mut self) {
        self.tuned_t0 = None;
        self.tuned_cell_size = None;
    }

    pub fn node_count(&self) -> usize {
        self.model.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.model.edge_count()
    }

    /// Current model position of a mapped client node.
    pub fn position(&self, graph: &G, node: G::NodeId) -> Option<Point> {
        let h = graph.node_handle(node)?;
        self.model
            .node(h)
            .filter(|n| n.external == node)
            .map(|n| Point::new(n.x, n.y))
    }

    /// Applies `batch`, runs the simulation and writes positions back into `graph`.
    ///
    /// The batch is applied in order: inserted nodes, inserted edges, moved nodes, deleted edges,
    /// deleted nodes. An empty graph turns the call into a no-op after the batch is applied.
    pub fn process(
        &mut self,
        graph: &mut G,
        batch: &ChangeBatch<G::NodeId, G::EdgeId>,
    ) -> Result<Outcome<G::NodeId>> {
        self.config.validate()?;
        if self.config.use_comp {
            tracing::warn!("component-wise layout is not supported; laying out the whole graph");
        }

        let timing_enabled = tracing::enabled!(tracing::Level::DEBUG);
        let mut timings = ProcessTimings::default();
        let total_start = timing_enabled.then(std::time::Instant::now);

        let apply_start = timing_enabled.then(std::time::Instant::now);
        self.apply_changes(graph, batch)?;
        if let Some(s) = apply_start {
            timings.apply_changes = s.elapsed();
        }

        let nodes = graph.node_ids();
        if nodes.is_empty() {
            tracing::debug!("empty graph; nothing to lay out");
            return Ok(Outcome::default());
        }

        let sizing_start = timing_enabled.then(std::time::Instant::now);
        let handles = self.refresh_snapshot(graph, &nodes)?;
        let median = self.median_size(&handles);
        self.params = self.derive_params(median, nodes.len());
        if let Some(s) = sizing_start {
            timings.sizing = s.elapsed();
        }
        tracing::debug!(
            nodes = nodes.len(),
            edges = self.model.edge_count(),
            k = self.params.k,
            t0 = self.params.t0,
            cell_size = self.params.cell_size,
            use_grid = self.params.use_grid,
            "running spring embedder"
        );

        let iterations_start = timing_enabled.then(std::time::Instant::now);
        let stats = self.run();
        if let Some(s) = iterations_start {
            timings.iterations = s.elapsed();
        }

        let write_back_start = timing_enabled.then(std::time::Instant::now);
        let mut moved = Vec::with_capacity(nodes.len());
        for (&node, &h) in nodes.iter().zip(&handles) {
            if let Some(m) = self.model.node(h) {
                graph.set_position(node, Point::new(m.x, m.y));
                moved.push(node);
            }
        }
        if let Some(s) = write_back_start {
            timings.write_back = s.elapsed();
        }

        if let Some(s) = total_start {
            timings.total = s.elapsed();
            tracing::debug!(
                total = ?timings.total,
                apply_changes = ?timings.apply_changes,
                sizing = ?timings.sizing,
                iterations = ?timings.iterations,
                write_back = ?timings.write_back,
                repulsions = stats.repulsions,
                jitters = stats.jitters,
                "spring embedder timings"
            );
        }

        Ok(Outcome { moved, stats })
    }

    fn apply_changes(
        &mut self,
        graph: &mut G,
        batch: &ChangeBatch<G::NodeId, G::EdgeId>,
    ) -> Result<()> {
        for &node in &batch.inserted_nodes {
            if graph
                .node_handle(node)
                .is_some_and(|h| self.model.contains_node(h))
            {
                return Err(Error::inconsistency(format!(
                    "node {node:?} inserted twice"
                )));
            }
            let at = graph.position(node).unwrap_or(Point::ORIGIN);
            let h = self.model.insert_node(node, at);
            graph.set_node_handle(node, Some(h));
        }

        for &edge in &batch.inserted_edges {
            if graph
                .edge_handle(edge)
                .is_some_and(|h| self.model.contains_edge(h))
            {
                return Err(Error::inconsistency(format!(
                    "edge {edge:?} inserted twice"
                )));
            }
            let Some((tail, head)) = graph.endpoints(edge) else {
                return Err(Error::inconsistency(format!(
                    "edge {edge:?} has no endpoints in the client graph"
                )));
            };
            let tail = self.model.require_node(tail, graph.node_handle(tail))?;
            let head = self.model.require_node(head, graph.node_handle(head))?;
            let h = self.model.insert_edge(edge, tail, head)?;
            graph.set_edge_handle(edge, Some(h));
        }

        for (&node, change) in &batch.modified_nodes {
            if !change.moved {
                continue;
            }
            let h = self.model.require_node(node, graph.node_handle(node))?;
            if let (Some(at), Some(m)) = (graph.position(node), self.model.node_mut(h)) {
                m.x = at.x;
                m.y = at.y;
            }
        }

        for &edge in &batch.deleted_edges {
            let h = self.model.require_edge(edge, graph.edge_handle(edge))?;
            self.model.remove_edge(h);
            graph.set_edge_handle(edge, None);
        }

        for &node in &batch.deleted_nodes {
            let h = self.model.require_node(node, graph.node_handle(node))?;
            self.model.remove_node(h)?;
            graph.set_node_handle(node, None);
        }

        Ok(())
    }

    /// Re-reads sizes and pinned flags, and checks that the model mirrors exactly `nodes`.
    fn refresh_snapshot(&mut self, graph: &G, nodes: &[G::NodeId]) -> Result<Vec<ModelHandle>> {
        if nodes.len() != self.model.node_count() {
            return Err(Error::inconsistency(format!(
                "client graph has {} nodes but the model has {}",
                nodes.len(),
                self.model.node_count()
            )));
        }
        let mut handles = Vec::with_capacity(nodes.len());
        for &node in nodes {
            let h = self.model.require_node(node, graph.node_handle(node))?;
            if let Some(m) = self.model.node_mut(h) {
                m.size = graph.size(node);
                m.pinned = graph.is_pinned(node);
            }
            handles.push(h);
        }
        Ok(handles)
    }

    fn median_size(&self, handles: &[ModelHandle]) -> Size {
        let (widths, heights): (Vec<f64>, Vec<f64>) = handles
            .iter()
            .filter_map(|&h| self.model.node(h))
            .map(|n| {
                let s = n.size.unwrap_or_default();
                (s.width, s.height)
            })
            .unzip();
        Size::new(
            weighted_median(&widths).unwrap_or(0.0),
            weighted_median(&heights).unwrap_or(0.0),
        )
    }

    fn derive_params(&mut self, median: Size, node_count: usize) -> Params {
        let mut k = median.width.max(median.height);
        if k.is_nan() || k <= 0.0 {
            k = 1.0;
        }

        let t0 = if self.config.t0 > 0.0 {
            self.config.t0
        } else {
            *self
                .tuned_t0
                .get_or_insert(k * (node_count as f64).sqrt() / 5.0)
        };

        let cell_size = if !self.config.use_grid || self.config.cell_size > 0.0 {
            self.config.cell_size
        } else {
            *self.tuned_cell_size.get_or_insert(3.0 * k)
        };

        Params {
            k,
            k2: k * k,
            t0,
            cell_size,
            radius2: cell_size * cell_size,
            rep_factor: self.config.rep_factor,
            att_factor: self.config.att_factor,
            num_iters: self.config.num_iters,
            use_grid: self.config.use_grid,
        }
    }

    /// Runs `num_iters` iterations on a dense copy of the model, then commits the result.
    fn run(&mut self) -> RunStats {
        let params = self.params;
        let mut stats = RunStats {
            params,
            ..Default::default()
        };

        let mut dense: FxHashMap<ModelHandle, usize> = FxHashMap::default();
        dense.reserve(self.model.node_count());
        let mut order: Vec<ModelHandle> = Vec::with_capacity(self.model.node_count());
        let mut sim = Simulation::default();
        for (h, n) in self.model.nodes() {
            dense.insert(h, sim.bodies.len());
            order.push(h);
            sim.bodies.push(Body {
                x: n.x,
                y: n.y,
                dx: 0.0,
                dy: 0.0,
                pinned: n.pinned,
                size: n.size,
                out_springs: Vec::new(),
            });
        }
        for (_, e) in self.model.edges() {
            let (Some(&tail), Some(&head)) = (dense.get(&e.tail), dense.get(&e.head)) else {
                continue;
            };
            sim.bodies[tail].out_springs.push(sim.springs.len());
            sim.springs.push(Spring { tail, head });
        }

        let mut rng = XorShift64Star::new(self.config.random_seed);
        for i in 0..params.num_iters {
            let temp = force::temperature(&params, i);
            if temp <= 0.0 {
                stats.skipped_iterations += 1;
                continue;
            }
            let step = sim.step(&mut self.grid, &params, temp, &mut rng);
            stats.iterations += 1;
            stats.repulsions += step.repulsions;
            stats.jitters += step.jitters;
            stats.max_cells = stats.max_cells.max(step.cells);
            tracing::trace!(
                iteration = i,
                temperature = temp,
                repulsions = step.repulsions,
                cells = step.cells,
                pooled_cells = self.grid.pooled_cells(),
                "spring embedder iteration"
            );
        }

        for (h, body) in order.into_iter().zip(sim.bodies) {
            if let Some(m) = self.model.node_mut(h) {
                m.x = body.x;
                m.y = body.y;
            }
        }

        stats
    }
}
