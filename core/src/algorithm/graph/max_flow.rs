//! Maximum Flow / Minimum Cut with Dynamic Capacity Updates
//!
//! This module implements the two-terminal max-flow oracle used by the
//! certification and expansion stages. The source and sink are implicit:
//! every node carries a single net terminal residual (positive values are
//! residual capacity from the source, negative values residual capacity to
//! the sink), and pairwise arcs live in a flat arena with sister arcs.
//!
//! # Dynamic Updates
//! Capacities may be rewritten after a solve. Terminal changes are absorbed
//! into the net residual directly. When a lowered arc capacity falls below
//! the flow it carries, the surplus is rerouted through the endpoints'
//! terminal arcs (adding the same amount to both terminal arcs of a node
//! shifts every cut by a constant), so the next `maxflow` continues from the
//! previous flow instead of starting over.
//!
//! # Algorithm
//! Dinic's blocking-flow method with an iterative DFS. The reported source
//! segment is the set of nodes reachable from the source in the final
//! residual graph, i.e. the minimal source side over all minimum cuts.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::VecDeque;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::algorithm::traits::EnergyError;

/// Flow capacity type
pub type Capacity = f64;

/// Flow value type
pub type Flow = f64;

/// Index of an undirected edge (a pair of sister arcs)
pub type EdgeIndex = usize;

/// Residuals at or below this value count as saturated
pub const EPSILON: Capacity = 1e-10;

const NO_ARC: usize = usize::MAX;
const UNREACHED: usize = usize::MAX;

/// Side of the minimum cut a node ends up on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalSide {
    Source,
    Sink,
}

/// Directed arc with residual capacity tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowArc {
    /// Target vertex
    pub head: usize,
    /// Configured capacity
    pub capacity: Capacity,
    /// Current residual capacity
    pub residual: Capacity,
    /// Reverse arc index
    pub sister: usize,
    /// Next arc leaving the same tail
    next: usize,
}

/// Flow algorithm performance metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowMetrics {
    /// Completed `maxflow` calls
    pub solves: usize,
    /// Level-graph phases across all solves
    pub phases: usize,
    /// Augmenting paths across all solves
    pub augmentations: usize,
    /// Arc updates that needed rerouting of excess flow
    pub reparameterizations: usize,
}

/// Flow algorithm errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    #[error("Invalid vertex {0}")]
    InvalidVertex(usize),
    #[error("Invalid edge {0}")]
    InvalidEdge(usize),
    #[error("Capacity {0} must be finite and non-negative")]
    InvalidCapacity(Capacity),
    #[error("Self-loop on vertex {0}")]
    SelfLoop(usize),
}

impl From<FlowError> for EnergyError {
    fn from(err: FlowError) -> Self {
        EnergyError::InvalidModel(format!("flow network: {}", err))
    }
}

/// Capacitated network with implicit source and sink
#[derive(Debug, Clone)]
pub struct FlowNetwork {
    node_count: usize,
    first: Vec<usize>,
    arcs: Vec<FlowArc>,
    /// Configured (source, sink) capacities per node
    terminal: Vec<(Capacity, Capacity)>,
    /// Residual source->i minus residual i->sink
    terminal_residual: Vec<Capacity>,
    level: Vec<usize>,
    current_arc: Vec<usize>,
    source_side: Vec<bool>,
    metrics: FlowMetrics,
}

impl FlowNetwork {
    /// Create new flow network with specified vertex count
    pub fn new(node_count: usize) -> Self {
        Self::with_capacity(node_count, 0)
    }

    /// Create new flow network reserving room for `edge_hint` edges
    pub fn with_capacity(node_count: usize, edge_hint: usize) -> Self {
        Self {
            node_count,
            first: vec![NO_ARC; node_count],
            arcs: Vec::with_capacity(2 * edge_hint),
            terminal: vec![(0.0, 0.0); node_count],
            terminal_residual: vec![0.0; node_count],
            level: vec![UNREACHED; node_count],
            current_arc: vec![NO_ARC; node_count],
            source_side: vec![false; node_count],
            metrics: FlowMetrics::default(),
        }
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.arcs.len() / 2
    }

    pub fn metrics(&self) -> &FlowMetrics {
        &self.metrics
    }

    /// Add edge with capacities in both directions
    pub fn add_edge(
        &mut self,
        from: usize,
        to: usize,
        capacity: Capacity,
        reverse_capacity: Capacity,
    ) -> Result<EdgeIndex, FlowError> {
        self.check_vertex(from)?;
        self.check_vertex(to)?;
        if from == to {
            return Err(FlowError::SelfLoop(from));
        }
        check_capacity(capacity)?;
        check_capacity(reverse_capacity)?;

        let forward = self.arcs.len();
        let backward = forward + 1;
        self.arcs.push(FlowArc {
            head: to,
            capacity,
            residual: capacity,
            sister: backward,
            next: self.first[from],
        });
        self.arcs.push(FlowArc {
            head: from,
            capacity: reverse_capacity,
            residual: reverse_capacity,
            sister: forward,
            next: self.first[to],
        });
        self.first[from] = forward;
        self.first[to] = backward;

        Ok(forward / 2)
    }

    /// Set source and sink capacities of a node
    pub fn set_terminal_weights(
        &mut self,
        node: usize,
        source: Capacity,
        sink: Capacity,
    ) -> Result<(), FlowError> {
        self.check_vertex(node)?;
        check_capacity(source)?;
        check_capacity(sink)?;

        let (old_source, old_sink) = self.terminal[node];
        self.terminal_residual[node] += (source - old_source) - (sink - old_sink);
        self.terminal[node] = (source, sink);
        Ok(())
    }

    /// Configured (source, sink) capacities of a node
    pub fn terminal_weights(&self, node: usize) -> (Capacity, Capacity) {
        self.terminal[node]
    }

    /// Rewrite both arc capacities of an edge, keeping prior flow
    pub fn set_edge_capacity(
        &mut self,
        edge: EdgeIndex,
        capacity: Capacity,
        reverse_capacity: Capacity,
    ) -> Result<(), FlowError> {
        if edge >= self.edge_count() {
            return Err(FlowError::InvalidEdge(edge));
        }
        check_capacity(capacity)?;
        check_capacity(reverse_capacity)?;

        let (forward, backward) = (2 * edge, 2 * edge + 1);
        let tail = self.arcs[backward].head;
        let head = self.arcs[forward].head;

        let mut forward_residual =
            self.arcs[forward].residual + capacity - self.arcs[forward].capacity;
        let mut backward_residual =
            self.arcs[backward].residual + reverse_capacity - self.arcs[backward].capacity;

        if forward_residual < 0.0 {
            // tail -> head carries more than allowed: return the surplus
            // to the sink at the tail and draw it from the source at the head
            let excess = -forward_residual;
            forward_residual = 0.0;
            backward_residual -= excess;
            self.terminal_residual[tail] += excess;
            self.terminal_residual[head] -= excess;
            self.metrics.reparameterizations += 1;
        } else if backward_residual < 0.0 {
            let excess = -backward_residual;
            backward_residual = 0.0;
            forward_residual -= excess;
            self.terminal_residual[head] += excess;
            self.terminal_residual[tail] -= excess;
            self.metrics.reparameterizations += 1;
        }

        self.arcs[forward].capacity = capacity;
        self.arcs[forward].residual = forward_residual.max(0.0);
        self.arcs[backward].capacity = reverse_capacity;
        self.arcs[backward].residual = backward_residual.max(0.0);
        Ok(())
    }

    /// Configured (forward, reverse) capacities of an edge
    pub fn edge_capacity(&self, edge: EdgeIndex) -> (Capacity, Capacity) {
        (self.arcs[2 * edge].capacity, self.arcs[2 * edge + 1].capacity)
    }

    /// Discard all flow, keeping topology and capacities
    pub fn reset(&mut self) {
        for arc in &mut self.arcs {
            arc.residual = arc.capacity;
        }
        for (residual, &(source, sink)) in self.terminal_residual.iter_mut().zip(&self.terminal) {
            *residual = source - sink;
        }
        self.source_side.fill(false);
    }

    /// Compute the maximum flow, continuing from any existing flow
    ///
    /// Returns the value of the minimum cut under the current capacities.
    pub fn maxflow(&mut self) -> Flow {
        let mut phases = 0;
        while self.build_levels() {
            let pushed = self.blocking_flow();
            phases += 1;
            if pushed <= EPSILON {
                break;
            }
        }
        self.mark_source_side();
        self.metrics.solves += 1;
        self.metrics.phases += phases;

        let cut = self.cut_value();
        trace!(
            "maxflow: {} nodes, {} edges, {} phases, cut {}",
            self.node_count,
            self.edge_count(),
            phases,
            cut
        );
        cut
    }

    /// Whether `node` lies on the source side of the last computed cut
    #[inline]
    pub fn is_source_side(&self, node: usize) -> bool {
        self.source_side[node]
    }

    /// Cut side of `node` after the last `maxflow`
    pub fn segment(&self, node: usize) -> TerminalSide {
        if self.source_side[node] {
            TerminalSide::Source
        } else {
            TerminalSide::Sink
        }
    }

    /// Value of the current source/sink partition under configured capacities
    pub fn cut_value(&self) -> Flow {
        let mut cut = 0.0;
        for node in 0..self.node_count {
            let (source, sink) = self.terminal[node];
            if self.source_side[node] {
                cut += sink;
                let mut arc = self.first[node];
                while arc != NO_ARC {
                    let a = &self.arcs[arc];
                    if !self.source_side[a.head] {
                        cut += a.capacity;
                    }
                    arc = a.next;
                }
            } else {
                cut += source;
            }
        }
        cut
    }

    fn check_vertex(&self, node: usize) -> Result<(), FlowError> {
        if node >= self.node_count {
            Err(FlowError::InvalidVertex(node))
        } else {
            Ok(())
        }
    }

    /// BFS level graph from every node with source residual
    fn build_levels(&mut self) -> bool {
        self.level.fill(UNREACHED);
        let mut queue = VecDeque::new();
        for node in 0..self.node_count {
            if self.terminal_residual[node] > EPSILON {
                self.level[node] = 0;
                queue.push_back(node);
            }
        }

        let mut reaches_sink = false;
        while let Some(node) = queue.pop_front() {
            if self.terminal_residual[node] < -EPSILON {
                reaches_sink = true;
            }
            let mut arc = self.first[node];
            while arc != NO_ARC {
                let a = &self.arcs[arc];
                if a.residual > EPSILON && self.level[a.head] == UNREACHED {
                    self.level[a.head] = self.level[node] + 1;
                    queue.push_back(a.head);
                }
                arc = a.next;
            }
        }
        reaches_sink
    }

    /// Saturate every shortest augmenting path of the current level graph
    fn blocking_flow(&mut self) -> Flow {
        self.current_arc.copy_from_slice(&self.first);
        let mut total = 0.0;
        let mut path: Vec<usize> = Vec::new();

        for root in 0..self.node_count {
            if self.level[root] != 0 {
                continue;
            }
            path.clear();

            while self.terminal_residual[root] > EPSILON {
                let tip = path.last().map_or(root, |&arc| self.arcs[arc].head);

                if self.terminal_residual[tip] < -EPSILON {
                    let mut bottleneck =
                        self.terminal_residual[root].min(-self.terminal_residual[tip]);
                    for &arc in &path {
                        bottleneck = bottleneck.min(self.arcs[arc].residual);
                    }
                    for &arc in &path {
                        let sister = self.arcs[arc].sister;
                        self.arcs[arc].residual -= bottleneck;
                        self.arcs[sister].residual += bottleneck;
                    }
                    self.terminal_residual[root] -= bottleneck;
                    self.terminal_residual[tip] += bottleneck;
                    total += bottleneck;
                    self.metrics.augmentations += 1;

                    let saturated = path
                        .iter()
                        .position(|&arc| self.arcs[arc].residual <= EPSILON);
                    if let Some(pos) = saturated {
                        path.truncate(pos);
                    }
                    continue;
                }

                let mut advanced = false;
                while self.current_arc[tip] != NO_ARC {
                    let arc = self.current_arc[tip];
                    let a = &self.arcs[arc];
                    if a.residual > EPSILON
                        && self.level[a.head] != UNREACHED
                        && self.level[a.head] == self.level[tip] + 1
                    {
                        path.push(arc);
                        advanced = true;
                        break;
                    }
                    self.current_arc[tip] = a.next;
                }

                if !advanced {
                    self.level[tip] = UNREACHED;
                    if path.pop().is_none() {
                        break;
                    }
                }
            }
        }
        total
    }

    fn mark_source_side(&mut self) {
        self.source_side.fill(false);
        let mut queue = VecDeque::new();
        for node in 0..self.node_count {
            if self.terminal_residual[node] > EPSILON {
                self.source_side[node] = true;
                queue.push_back(node);
            }
        }
        while let Some(node) = queue.pop_front() {
            let mut arc = self.first[node];
            while arc != NO_ARC {
                let a = &self.arcs[arc];
                if a.residual > EPSILON && !self.source_side[a.head] {
                    self.source_side[a.head] = true;
                    queue.push_back(a.head);
                }
                arc = a.next;
            }
        }
    }
}

fn check_capacity(capacity: Capacity) -> Result<(), FlowError> {
    if capacity.is_finite() && capacity >= 0.0 {
        Ok(())
    } else {
        Err(FlowError::InvalidCapacity(capacity))
    }
}
