//! Kovtun's one-against-all persistency test
//!
//! For a label ℓ the energy is bounded by an auxiliary binary problem:
//! a node either takes ℓ (cost `θ_i(ℓ)`) or "anything else" (cost
//! `min_{k≠ℓ} θ_i(k)`), and every Potts edge charges its weight when the
//! two ends disagree. The auxiliary problem is submodular, so its minimum
//! is a minimum s-t cut. Every node on the minimal source side takes ℓ in
//! every global optimum of the original energy.
//!
//! # Graph Strategies
//! - `PerLabel`: a fresh network per label, dropped after the cut
//! - `Shared`: one network over the original node set; per label only the
//!   terminal capacities are rewritten and the previous flow is kept, and
//!   eliminated nodes are disconnected in place
//!
//! Both strategies certify identical node sets.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::algorithm::graph::{Capacity, Flow, FlowNetwork};
use crate::algorithm::traits::{Cost, EnergyError, LabelIndex, NodeIndex};
use crate::data_structures::energy::{EnergyModel, PottsEdge};
use crate::data_structures::graph::Neighbourhood;
use crate::data_structures::labeling::Labeling;

/// Flow network lifetime policy across labels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphStrategy {
    /// One network per label
    PerLabel,
    /// One network reconfigured for every label
    #[default]
    Shared,
}

/// Result of one persistency test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    pub label: LabelIndex,
    /// Newly certified nodes, original indices in ascending order
    pub certified: Vec<NodeIndex>,
    /// Minimum value of the auxiliary binary energy (up to a constant)
    pub cut_value: Flow,
}

/// Network over the original node set reused across labels
#[derive(Debug, Clone)]
struct SharedNetwork {
    network: FlowNetwork,
    incident: Neighbourhood,
}

impl SharedNetwork {
    fn build(model: &EnergyModel, num_original: usize) -> Result<Self, EnergyError> {
        let mut network = FlowNetwork::with_capacity(num_original, model.num_edges());
        let mut original_edges = Vec::with_capacity(model.num_edges());
        for edge in model.edges() {
            let (a, b) = (model.original_index(edge.a), model.original_index(edge.b));
            network.add_edge(a, b, edge.weight, edge.weight)?;
            original_edges.push(PottsEdge::new(a, b, edge.weight));
        }
        Ok(Self {
            network,
            incident: Neighbourhood::build(num_original, &original_edges),
        })
    }

    /// Rewrites the terminal capacities of every live node for `label`
    fn reset_capacities(
        &mut self,
        model: &EnergyModel,
        label: LabelIndex,
    ) -> Result<(), EnergyError> {
        let weights = terminal_weights(model, label);
        for (node, &(source, sink)) in weights.iter().enumerate() {
            self.network
                .set_terminal_weights(model.original_index(node), source, sink)?;
        }
        Ok(())
    }

    /// Removes every trace of `node` from the cut function
    fn disconnect(&mut self, node: NodeIndex) -> Result<(), EnergyError> {
        self.network.set_terminal_weights(node, 0.0, 0.0)?;
        for incidence in self.incident.neighbours(node) {
            self.network.set_edge_capacity(incidence.edge, 0.0, 0.0)?;
        }
        Ok(())
    }
}

/// Per-label persistency engine
#[derive(Debug, Clone)]
pub struct PersistencyEngine {
    strategy: GraphStrategy,
    shared: Option<SharedNetwork>,
    rounds: usize,
}

impl PersistencyEngine {
    pub fn new(strategy: GraphStrategy) -> Self {
        Self {
            strategy,
            shared: None,
            rounds: 0,
        }
    }

    pub fn strategy(&self) -> GraphStrategy {
        self.strategy
    }

    /// Allocates the shared network when the strategy needs one
    ///
    /// `num_original` is the size of the original node set the model's
    /// `origin` table points into.
    pub fn prepare(&mut self, model: &EnergyModel, num_original: usize) -> Result<(), EnergyError> {
        if self.strategy == GraphStrategy::Shared {
            self.shared = Some(SharedNetwork::build(model, num_original)?);
            debug!(
                "Allocated shared flow network: {} nodes, {} edges",
                num_original,
                model.num_edges()
            );
        }
        Ok(())
    }

    /// Certifies every node of `model` that takes `label` in all optima
    ///
    /// Certified nodes are written into `labeling` (original indices). A
    /// node already certified for another label is a fatal
    /// `InconsistentCertification`.
    pub fn find_persistent(
        &mut self,
        model: &EnergyModel,
        label: LabelIndex,
        labeling: &mut Labeling,
    ) -> Result<Certification, EnergyError> {
        if label >= model.num_labels() {
            return Err(EnergyError::InvalidModel(format!(
                "label {} outside [0, {})",
                label,
                model.num_labels()
            )));
        }
        self.rounds += 1;

        let (local, cut_value) = if model.is_empty() {
            (Vec::new(), 0.0)
        } else if model.num_labels() == 1 {
            // no alternative label exists
            ((0..model.num_nodes()).collect(), 0.0)
        } else {
            match self.strategy {
                GraphStrategy::PerLabel => solve_fresh(model, label)?,
                GraphStrategy::Shared => self.solve_shared(model, label)?,
            }
        };

        let mut certified = Vec::with_capacity(local.len());
        for node in local {
            let original = model.original_index(node);
            if labeling.certify(original, label)? {
                certified.push(original);
            }
        }
        certified.sort_unstable();

        debug!(
            "Label {}: certified {} of {} live nodes (cut {})",
            label,
            certified.len(),
            model.num_nodes(),
            cut_value
        );

        Ok(Certification {
            label,
            certified,
            cut_value,
        })
    }

    /// Zeroes the influence of eliminated original nodes on the shared network
    pub fn eliminate(&mut self, nodes: &[NodeIndex]) -> Result<(), EnergyError> {
        if let Some(shared) = self.shared.as_mut() {
            for &node in nodes {
                shared.disconnect(node)?;
            }
            trace!("Disconnected {} node(s) from the shared network", nodes.len());
        }
        Ok(())
    }

    /// Drops any flow network still held
    pub fn release(&mut self) {
        if let Some(shared) = self.shared.take() {
            let metrics = shared.network.metrics();
            debug!(
                "Released shared network after {} rounds: {} solves, {} augmentations, \
                 {} reparameterizations",
                self.rounds, metrics.solves, metrics.augmentations, metrics.reparameterizations
            );
        }
    }

    fn solve_shared(
        &mut self,
        model: &EnergyModel,
        label: LabelIndex,
    ) -> Result<(Vec<NodeIndex>, Flow), EnergyError> {
        let shared = self.shared.as_mut().ok_or_else(|| {
            EnergyError::InvalidModel("shared flow network requested before prepare()".into())
        })?;
        if model.origin().iter().any(|&o| o >= shared.network.node_count()) {
            return Err(EnergyError::InvalidModel(
                "model references nodes outside the shared flow network".into(),
            ));
        }

        shared.reset_capacities(model, label)?;
        shared.network.maxflow();

        let certified = (0..model.num_nodes())
            .filter(|&node| shared.network.is_source_side(model.original_index(node)))
            .collect();
        // the shared cut also counts disconnected nodes; report the live part
        let cut_value = live_cut_value(model, label, &|node| {
            shared.network.is_source_side(model.original_index(node))
        });
        Ok((certified, cut_value))
    }
}

/// Builds, solves and drops a network for one label
fn solve_fresh(
    model: &EnergyModel,
    label: LabelIndex,
) -> Result<(Vec<NodeIndex>, Flow), EnergyError> {
    let mut network = FlowNetwork::with_capacity(model.num_nodes(), model.num_edges());
    for (node, (source, sink)) in terminal_weights(model, label).into_iter().enumerate() {
        network.set_terminal_weights(node, source, sink)?;
    }
    for edge in model.edges() {
        network.add_edge(edge.a, edge.b, edge.weight, edge.weight)?;
    }
    let cut_value = network.maxflow();
    let certified = (0..model.num_nodes())
        .filter(|&node| network.is_source_side(node))
        .collect();
    Ok((certified, cut_value))
}

/// Normalized (source, sink) capacities for every node of `model`
///
/// Source side means "take `label`": a source-side node pays its sink
/// capacity `θ_i(ℓ)`, a sink-side node its source capacity
/// `min_{k≠ℓ} θ_i(k)`. The smaller of the two is subtracted.
pub fn terminal_weights(model: &EnergyModel, label: LabelIndex) -> Vec<(Capacity, Capacity)> {
    model
        .unary_table()
        .par_chunks(model.num_labels())
        .map(|row| {
            let own = row[label];
            let other = best_alternative(row, label);
            let floor = own.min(other);
            (other - floor, own - floor)
        })
        .collect()
}

/// Smallest cost over labels other than `label`
fn best_alternative(row: &[Cost], label: LabelIndex) -> Cost {
    row.iter()
        .enumerate()
        .filter(|&(k, _)| k != label)
        .map(|(_, &c)| c)
        .fold(Cost::INFINITY, Cost::min)
}

/// Auxiliary cut value restricted to the live model
fn live_cut_value(
    model: &EnergyModel,
    label: LabelIndex,
    in_source: &dyn Fn(NodeIndex) -> bool,
) -> Flow {
    let terminal: Flow = terminal_weights(model, label)
        .iter()
        .enumerate()
        .map(|(node, &(source, sink))| if in_source(node) { sink } else { source })
        .sum();
    let pairwise: Flow = model
        .edges()
        .iter()
        .filter(|e| in_source(e.a) != in_source(e.b))
        .map(|e| e.weight)
        .sum();
    terminal + pairwise
}
