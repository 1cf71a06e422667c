//! Sequential tree-reweighted message passing and loopy belief propagation
//!
//! Both algorithms exchange min-sum messages along the Potts edges of the
//! model. Potts messages are computed in O(L): for a sender vector `h`,
//! the normalized message is `min(h[k] - min(h), w)`.
//!
//! TRW-S sweeps the nodes forward then backward in index order, scaling the
//! sender's belief by `1 / max(#lower neighbours, #upper neighbours)`. Any
//! set of messages is a reparameterization of the energy, so the sum of the
//! per-node and per-edge minima of the reparameterized terms is a lower
//! bound on the optimum; the best bound seen is kept.
//!
//! Both runs stop after a fixed number of iterations, converged or not.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::debug;
use serde::{Deserialize, Serialize};

use crate::algorithm::traits::{
    Cost, EnergyError, FallbackSolution, LabelIndex, MultiLabelSolver, NodeIndex,
};
use crate::data_structures::energy::{argmin, EnergyModel};
use crate::data_structures::graph::Neighbourhood;

/// Which candidate labeling the fallback reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateSelection {
    /// Always the TRW labeling
    #[default]
    Trw,
    /// Always the BP labeling
    Bp,
    /// Whichever has the lower energy, TRW on ties
    LowerEnergy,
}

/// Both candidate labelings and the TRW lower bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrwBpOutcome {
    pub trw_labels: Vec<LabelIndex>,
    pub bp_labels: Vec<LabelIndex>,
    pub trw_energy: Cost,
    pub bp_energy: Cost,
    pub lower_bound: Cost,
}

/// Directed messages stored flat: `(edge, direction, label)`
///
/// Direction 0 carries `a -> b`, direction 1 carries `b -> a`.
#[derive(Debug, Clone)]
struct MessageStore {
    num_labels: usize,
    data: Vec<Cost>,
}

impl MessageStore {
    fn new(num_edges: usize, num_labels: usize) -> Self {
        Self {
            num_labels,
            data: vec![0.0; 2 * num_edges * num_labels],
        }
    }

    #[inline]
    fn offset(&self, edge: usize, towards_b: bool) -> usize {
        (2 * edge + usize::from(!towards_b)) * self.num_labels
    }

    /// Message arriving at `node` along `edge`
    #[inline]
    fn incoming(&self, model: &EnergyModel, edge: usize, node: NodeIndex) -> &[Cost] {
        let start = self.offset(edge, model.edges()[edge].b == node);
        &self.data[start..start + self.num_labels]
    }

    /// Message leaving `node` along `edge`
    #[inline]
    fn outgoing_mut(&mut self, model: &EnergyModel, edge: usize, node: NodeIndex) -> &mut [Cost] {
        let start = self.offset(edge, model.edges()[edge].a == node);
        let end = start + self.num_labels;
        &mut self.data[start..end]
    }
}

/// TRW-S + BP fallback solver
#[derive(Debug, Clone)]
pub struct TrwBp {
    trw_iterations: usize,
    bp_iterations: usize,
    selection: CandidateSelection,
    last_outcome: Option<TrwBpOutcome>,
}

impl TrwBp {
    pub fn new(trw_iterations: usize, bp_iterations: usize, selection: CandidateSelection) -> Self {
        Self {
            trw_iterations,
            bp_iterations,
            selection,
            last_outcome: None,
        }
    }

    /// Outcome of the most recent `minimize`
    pub fn last_outcome(&self) -> Option<&TrwBpOutcome> {
        self.last_outcome.as_ref()
    }

    /// Runs both algorithms and returns both candidates
    pub fn run(&self, model: &EnergyModel) -> Result<TrwBpOutcome, EnergyError> {
        if model.is_empty() {
            return Ok(TrwBpOutcome {
                trw_labels: Vec::new(),
                bp_labels: Vec::new(),
                trw_energy: 0.0,
                bp_energy: 0.0,
                lower_bound: 0.0,
            });
        }
        let neighbourhood = model.neighbourhood();

        let (trw_labels, lower_bound) = run_trws(model, &neighbourhood, self.trw_iterations);
        let bp_labels = run_bp(model, &neighbourhood, self.bp_iterations);
        let trw_energy = model.energy(&trw_labels)?;
        let bp_energy = model.energy(&bp_labels)?;

        debug!(
            "TRW-S: energy {} (bound {}), BP: energy {} after {}/{} iterations",
            trw_energy, lower_bound, bp_energy, self.trw_iterations, self.bp_iterations
        );

        Ok(TrwBpOutcome {
            trw_labels,
            bp_labels,
            trw_energy,
            bp_energy,
            lower_bound,
        })
    }
}

impl Default for TrwBp {
    fn default() -> Self {
        Self::new(70, 70, CandidateSelection::default())
    }
}

impl MultiLabelSolver for TrwBp {
    fn name(&self) -> &'static str {
        "trw-bp"
    }

    fn minimize(&mut self, model: &EnergyModel) -> Result<FallbackSolution, EnergyError> {
        let outcome = self.run(model)?;
        let use_bp = match self.selection {
            CandidateSelection::Trw => false,
            CandidateSelection::Bp => true,
            CandidateSelection::LowerEnergy => outcome.bp_energy < outcome.trw_energy,
        };
        let (labels, energy) = if use_bp {
            (outcome.bp_labels.clone(), outcome.bp_energy)
        } else {
            (outcome.trw_labels.clone(), outcome.trw_energy)
        };
        let lower_bound = Some(outcome.lower_bound);
        self.last_outcome = Some(outcome);

        Ok(FallbackSolution {
            labels,
            energy,
            iterations: self.trw_iterations + self.bp_iterations,
            lower_bound,
        })
    }
}

/// Normalized Potts message from a sender vector `h`
#[inline]
fn potts_message(h: &[Cost], weight: Cost, out: &mut [Cost]) {
    let floor = h.iter().copied().fold(Cost::INFINITY, Cost::min);
    for (o, &v) in out.iter_mut().zip(h) {
        *o = (v - floor).min(weight);
    }
}

/// Unary costs plus every incoming message
fn belief(
    model: &EnergyModel,
    nb: &Neighbourhood,
    messages: &MessageStore,
    node: NodeIndex,
    out: &mut [Cost],
) {
    out.copy_from_slice(model.unary_costs(node));
    for inc in nb.neighbours(node) {
        for (o, &m) in out.iter_mut().zip(messages.incoming(model, inc.edge, node)) {
            *o += m;
        }
    }
}

fn run_trws(model: &EnergyModel, nb: &Neighbourhood, iterations: usize) -> (Vec<LabelIndex>, Cost) {
    let n = model.num_nodes();
    let l = model.num_labels();
    let mut messages = MessageStore::new(model.num_edges(), l);

    let gamma: Vec<Cost> = (0..n)
        .map(|node| {
            let lower = nb.neighbours(node).iter().filter(|inc| inc.neighbour < node).count();
            let upper = nb.degree(node) - lower;
            1.0 / lower.max(upper).max(1) as Cost
        })
        .collect();

    let mut theta = vec![0.0; l];
    let mut h = vec![0.0; l];
    let mut best_bound = Cost::NEG_INFINITY;

    let mut sweep = |node: NodeIndex, forward: bool, messages: &mut MessageStore| {
        belief(model, nb, messages, node, &mut theta);
        for inc in nb.neighbours(node) {
            if (inc.neighbour > node) != forward {
                continue;
            }
            let incoming = messages.incoming(model, inc.edge, node);
            for ((hv, &t), &m) in h.iter_mut().zip(&theta).zip(incoming) {
                *hv = gamma[node] * t - m;
            }
            potts_message(&h, inc.weight, messages.outgoing_mut(model, inc.edge, node));
        }
    };

    for _ in 0..iterations {
        for node in 0..n {
            sweep(node, true, &mut messages);
        }
        for node in (0..n).rev() {
            sweep(node, false, &mut messages);
        }
        best_bound = best_bound.max(reparameterized_bound(model, nb, &messages));
    }
    if iterations == 0 {
        best_bound = reparameterized_bound(model, nb, &messages);
    }

    // sequential conditioning on the already chosen lower neighbours
    let mut labels = vec![0; n];
    let mut costs = vec![0.0; l];
    for node in 0..n {
        costs.copy_from_slice(model.unary_costs(node));
        for inc in nb.neighbours(node) {
            if inc.neighbour < node {
                let fixed = labels[inc.neighbour];
                for (k, c) in costs.iter_mut().enumerate() {
                    if k != fixed {
                        *c += inc.weight;
                    }
                }
            } else {
                for (c, &m) in costs.iter_mut().zip(messages.incoming(model, inc.edge, node)) {
                    *c += m;
                }
            }
        }
        labels[node] = argmin(&costs);
    }

    (labels, best_bound)
}

/// Σ min of reparameterized unaries + Σ (under-estimated) min of reparameterized edges
fn reparameterized_bound(model: &EnergyModel, nb: &Neighbourhood, messages: &MessageStore) -> Cost {
    let mut theta = vec![0.0; model.num_labels()];
    let mut bound = 0.0;
    for node in 0..model.num_nodes() {
        belief(model, nb, messages, node, &mut theta);
        bound += theta.iter().copied().fold(Cost::INFINITY, Cost::min);
    }
    for (index, edge) in model.edges().iter().enumerate() {
        let to_a = messages.incoming(model, index, edge.a);
        let to_b = messages.incoming(model, index, edge.b);
        let agree = to_a
            .iter()
            .zip(to_b)
            .map(|(x, y)| -x - y)
            .fold(Cost::INFINITY, Cost::min);
        let max_a = to_a.iter().copied().fold(Cost::NEG_INFINITY, Cost::max);
        let max_b = to_b.iter().copied().fold(Cost::NEG_INFINITY, Cost::max);
        bound += agree.min(edge.weight - max_a - max_b);
    }
    bound
}

fn run_bp(model: &EnergyModel, nb: &Neighbourhood, iterations: usize) -> Vec<LabelIndex> {
    let n = model.num_nodes();
    let l = model.num_labels();
    let mut messages = MessageStore::new(model.num_edges(), l);
    let mut theta = vec![0.0; l];
    let mut h = vec![0.0; l];

    for _ in 0..iterations {
        for node in 0..n {
            belief(model, nb, &messages, node, &mut theta);
            for inc in nb.neighbours(node) {
                let incoming = messages.incoming(model, inc.edge, node);
                for ((hv, &t), &m) in h.iter_mut().zip(&theta).zip(incoming) {
                    *hv = t - m;
                }
                potts_message(&h, inc.weight, messages.outgoing_mut(model, inc.edge, node));
            }
        }
    }

    (0..n)
        .map(|node| {
            belief(model, nb, &messages, node, &mut theta);
            argmin(&theta)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::energy::PottsEdge;

    fn brute_force_optimum(model: &EnergyModel) -> Cost {
        let (n, l) = (model.num_nodes(), model.num_labels());
        let mut best = Cost::INFINITY;
        let mut labels = vec![0; n];
        for code in 0..l.pow(n as u32) {
            let mut rest = code;
            for label in labels.iter_mut() {
                *label = rest % l;
                rest /= l;
            }
            best = best.min(model.energy(&labels).unwrap());
        }
        best
    }

    fn loopy_model() -> EnergyModel {
        let rows = vec![
            vec![2.0, 0.0, 1.0],
            vec![0.0, 2.0, 2.0],
            vec![1.0, 1.0, 0.0],
            vec![3.0, 0.0, 1.0],
            vec![0.0, 1.0, 2.0],
        ];
        let edges = vec![
            PottsEdge::new(0, 1, 1.5),
            PottsEdge::new(1, 2, 0.5),
            PottsEdge::new(2, 3, 2.0),
            PottsEdge::new(3, 4, 1.0),
            PottsEdge::new(0, 4, 1.0),
            PottsEdge::new(1, 3, 0.7),
        ];
        EnergyModel::from_rows(&rows, edges).unwrap()
    }

    #[test]
    fn test_potts_message() {
        let mut out = vec![0.0; 3];
        potts_message(&[4.0, 1.0, 9.0], 2.0, &mut out);
        assert_eq!(out, vec![2.0, 0.0, 2.0]);
    }

    #[test]
    fn test_chain_is_solved_exactly() {
        let model = EnergyModel::from_rows(
            &[vec![0.0, 4.0], vec![1.5, 0.0], vec![3.0, 0.0], vec![0.0, 0.5]],
            vec![PottsEdge::new(0, 1, 1.0), PottsEdge::new(1, 2, 1.0), PottsEdge::new(2, 3, 1.0)],
        )
        .unwrap();
        let outcome = TrwBp::default().run(&model).unwrap();
        let optimum = brute_force_optimum(&model);

        assert_eq!(outcome.trw_labels, vec![0, 1, 1, 1]);
        assert_eq!(outcome.trw_energy, optimum);
        assert_eq!(outcome.bp_energy, optimum);
        assert!(outcome.lower_bound <= optimum + 1e-9);
    }

    #[test]
    fn test_lower_bound_is_valid_on_loopy_graph() {
        let model = loopy_model();
        let outcome = TrwBp::new(30, 30, CandidateSelection::Trw).run(&model).unwrap();
        let optimum = brute_force_optimum(&model);

        assert_eq!(outcome.trw_labels.len(), 5);
        assert_eq!(outcome.bp_labels.len(), 5);
        assert!(outcome.lower_bound <= optimum + 1e-9);
        assert!(outcome.trw_energy >= optimum - 1e-9);
        assert!(outcome.bp_energy >= optimum - 1e-9);
    }

    #[test]
    fn test_candidate_selection() {
        let model = loopy_model();
        let mut trw = TrwBp::new(10, 10, CandidateSelection::Trw);
        let mut bp = TrwBp::new(10, 10, CandidateSelection::Bp);
        let mut best = TrwBp::new(10, 10, CandidateSelection::LowerEnergy);

        let from_trw = trw.minimize(&model).unwrap();
        let from_bp = bp.minimize(&model).unwrap();
        let from_best = best.minimize(&model).unwrap();

        let outcome = trw.last_outcome().unwrap().clone();
        assert_eq!(from_trw.labels, outcome.trw_labels);
        assert_eq!(from_bp.labels, outcome.bp_labels);
        assert_eq!(from_best.energy, outcome.trw_energy.min(outcome.bp_energy));
        assert_eq!(from_trw.iterations, 20);
        assert_eq!(from_trw.lower_bound, Some(outcome.lower_bound));
    }

    #[test]
    fn test_zero_iterations_still_label() {
        let model = loopy_model();
        let outcome = TrwBp::new(0, 0, CandidateSelection::Trw).run(&model).unwrap();
        assert_eq!(outcome.trw_labels.len(), 5);
        assert_eq!(outcome.bp_labels, model.argmin_labels());
        assert!(outcome.lower_bound <= brute_force_optimum(&model));
    }
}
