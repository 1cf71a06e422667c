//! Alpha-expansion for Potts energies
//!
//! Starting from the unary arg-min, each move lets any subset of nodes
//! switch to a label α. The move energy is a binary submodular function
//! (Potts is a metric), minimized exactly by one cut; the move is kept only
//! if it strictly lowers the total energy. One flow network is reused for
//! all moves: capacities are rewritten in place and the solver continues
//! from the previous flow.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::{debug, trace};

use crate::algorithm::graph::{Capacity, FlowNetwork};
use crate::algorithm::traits::{Cost, EnergyError, FallbackSolution, LabelIndex, MultiLabelSolver};
use crate::data_structures::energy::EnergyModel;

/// Minimum energy decrease for a move to count as an improvement
const IMPROVEMENT_TOLERANCE: Cost = 1e-9;

/// Iterative expansion-move solver
#[derive(Debug, Clone)]
pub struct AlphaExpansion {
    max_passes: usize,
}

impl AlphaExpansion {
    pub fn new(max_passes: usize) -> Self {
        Self { max_passes }
    }

    /// Loads the expansion move for `alpha` around `labels` into `network`
    fn configure_move(
        network: &mut FlowNetwork,
        model: &EnergyModel,
        labels: &[LabelIndex],
        alpha: LabelIndex,
    ) -> Result<(), EnergyError> {
        // x_i = 1 (source side) switches to alpha
        let mut keep: Vec<Cost> = labels
            .iter()
            .enumerate()
            .map(|(node, &label)| model.unary_cost(node, label))
            .collect();
        let mut switch: Vec<Cost> = (0..model.num_nodes())
            .map(|node| model.unary_cost(node, alpha))
            .collect();

        for (index, edge) in model.edges().iter().enumerate() {
            let (la, lb) = (labels[edge.a], labels[edge.b]);
            let stay = edge.cost(la, lb);
            let b_moves = edge.cost(la, alpha);
            let a_moves = edge.cost(alpha, lb);

            // E(x_a, x_b) = stay + (a_moves - stay) x_a - a_moves x_b
            //             + (b_moves + a_moves - stay) (1 - x_a) x_b
            switch[edge.a] += a_moves - stay;
            switch[edge.b] -= a_moves;
            let coupling: Capacity = (b_moves + a_moves - stay).max(0.0);
            network.set_edge_capacity(index, 0.0, coupling)?;
        }

        for node in 0..model.num_nodes() {
            let floor = keep[node].min(switch[node]);
            keep[node] -= floor;
            switch[node] -= floor;
            network.set_terminal_weights(node, keep[node], switch[node])?;
        }
        Ok(())
    }
}

impl Default for AlphaExpansion {
    fn default() -> Self {
        Self::new(10)
    }
}

impl MultiLabelSolver for AlphaExpansion {
    fn name(&self) -> &'static str {
        "alpha-expansion"
    }

    fn minimize(&mut self, model: &EnergyModel) -> Result<FallbackSolution, EnergyError> {
        if model.is_empty() {
            return Ok(FallbackSolution {
                labels: Vec::new(),
                energy: 0.0,
                iterations: 0,
                lower_bound: None,
            });
        }

        let mut labels = model.argmin_labels();
        let mut energy = model.energy(&labels)?;

        let mut network = FlowNetwork::with_capacity(model.num_nodes(), model.num_edges());
        for edge in model.edges() {
            network.add_edge(edge.a, edge.b, 0.0, 0.0)?;
        }

        let mut passes = 0;
        while passes < self.max_passes {
            passes += 1;
            let mut improved = false;

            for alpha in 0..model.num_labels() {
                Self::configure_move(&mut network, model, &labels, alpha)?;
                network.maxflow();

                let candidate: Vec<LabelIndex> = labels
                    .iter()
                    .enumerate()
                    .map(|(node, &label)| if network.is_source_side(node) { alpha } else { label })
                    .collect();
                let candidate_energy = model.energy(&candidate)?;
                if candidate_energy < energy - IMPROVEMENT_TOLERANCE {
                    trace!("Expansion on {}: energy {} -> {}", alpha, energy, candidate_energy);
                    labels = candidate;
                    energy = candidate_energy;
                    improved = true;
                }
            }

            if !improved {
                break;
            }
        }

        debug!(
            "Alpha-expansion finished after {} pass(es) on {} nodes: energy {}",
            passes,
            model.num_nodes(),
            energy
        );

        Ok(FallbackSolution {
            labels,
            energy,
            iterations: passes,
            lower_bound: None,
        })
    }
}
