//! Graph topology helpers: CSR adjacency and raster grid builders
//!
//! `Neighbourhood` is the compressed adjacency the message-passing solvers
//! iterate over. `GridGraph` enumerates the Potts edges of a 4- or
//! 8-connected raster with row-major node numbering `y * width + x`.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};

use crate::algorithm::traits::{Cost, EnergyError, NodeIndex};
use crate::data_structures::energy::PottsEdge;

/// One edge as seen from one of its endpoints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Incidence {
    pub neighbour: NodeIndex,
    pub edge: usize,
    pub weight: Cost,
}

/// Compressed sparse row adjacency
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbourhood {
    offsets: Vec<usize>,
    entries: Vec<Incidence>,
}

impl Neighbourhood {
    pub fn build(num_nodes: usize, edges: &[PottsEdge]) -> Self {
        let mut offsets = vec![0usize; num_nodes + 1];
        for edge in edges {
            offsets[edge.a + 1] += 1;
            offsets[edge.b + 1] += 1;
        }
        for node in 0..num_nodes {
            offsets[node + 1] += offsets[node];
        }

        let mut cursor = offsets.clone();
        let incidence = |neighbour, edge, weight| Incidence {
            neighbour,
            edge,
            weight,
        };
        let mut entries = vec![incidence(0, 0, 0.0); offsets[num_nodes]];
        for (index, edge) in edges.iter().enumerate() {
            entries[cursor[edge.a]] = incidence(edge.b, index, edge.weight);
            cursor[edge.a] += 1;
            entries[cursor[edge.b]] = incidence(edge.a, index, edge.weight);
            cursor[edge.b] += 1;
        }

        Self { offsets, entries }
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn neighbours(&self, node: NodeIndex) -> &[Incidence] {
        &self.entries[self.offsets[node]..self.offsets[node + 1]]
    }

    #[inline]
    pub fn degree(&self, node: NodeIndex) -> usize {
        self.offsets[node + 1] - self.offsets[node]
    }
}

/// Pixel connectivity of a raster grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    Four,
    #[default]
    Eight,
}

/// Rectangular grid topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridGraph {
    pub width: usize,
    pub height: usize,
    pub connectivity: Connectivity,
}

impl GridGraph {
    pub fn new(
        width: usize,
        height: usize,
        connectivity: Connectivity,
    ) -> Result<Self, EnergyError> {
        if width == 0 || height == 0 {
            return Err(EnergyError::InvalidModel(format!(
                "grid dimensions {}x{} must be positive",
                width, height
            )));
        }
        Ok(Self { width, height, connectivity })
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn node_index(&self, x: usize, y: usize) -> NodeIndex {
        y * self.width + x
    }

    /// Closed-form edge count
    pub fn edge_count(&self) -> usize {
        let (w, h) = (self.width, self.height);
        let straight = h * (w - 1) + (h - 1) * w;
        match self.connectivity {
            Connectivity::Four => straight,
            Connectivity::Eight => straight + 2 * (w - 1) * (h - 1),
        }
    }

    /// Unordered neighbour pairs, each listed once
    pub fn pairs(&self) -> Vec<(NodeIndex, NodeIndex)> {
        let mut pairs = Vec::with_capacity(self.edge_count());
        for y in 0..self.height {
            for x in 0..self.width {
                let here = self.node_index(x, y);
                if x + 1 < self.width {
                    pairs.push((here, self.node_index(x + 1, y)));
                }
                if y + 1 < self.height {
                    pairs.push((here, self.node_index(x, y + 1)));
                }
                if self.connectivity == Connectivity::Eight && y + 1 < self.height {
                    if x + 1 < self.width {
                        pairs.push((here, self.node_index(x + 1, y + 1)));
                    }
                    if x > 0 {
                        pairs.push((here, self.node_index(x - 1, y + 1)));
                    }
                }
            }
        }
        pairs
    }

    /// Potts edges with weights from `weight(a, b)`
    pub fn edges_with<F>(&self, mut weight: F) -> Vec<PottsEdge>
    where
        F: FnMut(NodeIndex, NodeIndex) -> Cost,
    {
        self.pairs()
            .into_iter()
            .map(|(a, b)| PottsEdge::new(a, b, weight(a, b)))
            .collect()
    }
}
