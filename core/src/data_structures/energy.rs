//! Pairwise Potts energy model with projection
//!
//! The model stores a dense unary table (one row of `num_labels` costs per
//! node) and a list of Potts edges. Projection folds every certified node
//! into the unary costs of its uncertified neighbours and renumbers the
//! survivors; `origin` keeps the way back to the original node indices.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::HashSet;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::algorithm::traits::{Cost, EnergyError, LabelIndex, NodeIndex};
use crate::data_structures::graph::Neighbourhood;
use crate::data_structures::labeling::Labeling;

/// Potts interaction: zero when both ends agree, `weight` otherwise
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PottsEdge {
    pub a: NodeIndex,
    pub b: NodeIndex,
    pub weight: Cost,
}

impl PottsEdge {
    pub fn new(a: NodeIndex, b: NodeIndex, weight: Cost) -> Self {
        Self { a, b, weight }
    }

    /// Pairwise cost for the given label pair
    #[inline]
    pub fn cost(&self, la: LabelIndex, lb: LabelIndex) -> Cost {
        if la == lb {
            0.0
        } else {
            self.weight
        }
    }
}

/// Unary table plus Potts edges over a (possibly reduced) node set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyModel {
    num_labels: usize,
    /// Row-major `num_nodes x num_labels`
    unary: Vec<Cost>,
    edges: Vec<PottsEdge>,
    /// Local node index -> original node index
    origin: Vec<NodeIndex>,
}

impl EnergyModel {
    /// Builds a validated model over nodes `0..num_nodes`
    pub fn new(
        num_nodes: usize,
        num_labels: usize,
        unary: Vec<Cost>,
        edges: Vec<PottsEdge>,
    ) -> Result<Self, EnergyError> {
        if num_nodes == 0 {
            return Err(EnergyError::InvalidModel("the number of nodes is not positive".into()));
        }
        if num_labels == 0 {
            return Err(EnergyError::InvalidModel("the number of labels is not positive".into()));
        }
        if unary.len() != num_nodes * num_labels {
            return Err(EnergyError::InvalidModel(format!(
                "unary table holds {} values, expected {} nodes x {} labels",
                unary.len(),
                num_nodes,
                num_labels
            )));
        }
        if let Some(pos) = unary.iter().position(|c| !c.is_finite()) {
            return Err(EnergyError::InvalidModel(format!(
                "unary cost of node {} label {} is not finite",
                pos / num_labels,
                pos % num_labels
            )));
        }

        let mut seen = HashSet::with_capacity(edges.len());
        for (index, edge) in edges.iter().enumerate() {
            if edge.a >= num_nodes || edge.b >= num_nodes {
                return Err(EnergyError::InvalidModel(format!(
                    "edge {} references node outside [0, {})",
                    index, num_nodes
                )));
            }
            if edge.a == edge.b {
                return Err(EnergyError::InvalidModel(format!(
                    "edge {} is a self-loop on node {}",
                    index, edge.a
                )));
            }
            if !edge.weight.is_finite() || edge.weight < 0.0 {
                return Err(EnergyError::InvalidModel(format!(
                    "Potts weight {} of edge {} must be finite and non-negative",
                    edge.weight, index
                )));
            }
            if !seen.insert((edge.a.min(edge.b), edge.a.max(edge.b))) {
                return Err(EnergyError::InvalidModel(format!(
                    "duplicate edge between nodes {} and {}",
                    edge.a, edge.b
                )));
            }
        }

        Ok(Self {
            num_labels,
            unary,
            edges,
            origin: (0..num_nodes).collect(),
        })
    }

    /// Builds a model from one unary row per node
    pub fn from_rows(rows: &[Vec<Cost>], edges: Vec<PottsEdge>) -> Result<Self, EnergyError> {
        let num_labels = rows.first().map(Vec::len).unwrap_or(0);
        if let Some(node) = rows.iter().position(|row| row.len() != num_labels) {
            return Err(EnergyError::InvalidModel(format!(
                "unary row of node {} has {} labels, expected {}",
                node,
                rows[node].len(),
                num_labels
            )));
        }
        let unary = rows.iter().flatten().copied().collect();
        Self::new(rows.len(), num_labels, unary, edges)
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.origin.len()
    }

    #[inline]
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// True once every node has been projected away
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.origin.is_empty()
    }

    pub fn edges(&self) -> &[PottsEdge] {
        &self.edges
    }

    pub fn origin(&self) -> &[NodeIndex] {
        &self.origin
    }

    #[inline]
    pub fn original_index(&self, node: NodeIndex) -> NodeIndex {
        self.origin[node]
    }

    #[inline]
    pub fn unary_costs(&self, node: NodeIndex) -> &[Cost] {
        let start = node * self.num_labels;
        &self.unary[start..start + self.num_labels]
    }

    #[inline]
    pub fn unary_cost(&self, node: NodeIndex, label: LabelIndex) -> Cost {
        self.unary[node * self.num_labels + label]
    }

    #[inline]
    pub fn pairwise_cost(&self, edge: usize) -> Cost {
        self.edges[edge].weight
    }

    /// The whole unary table, row-major
    pub fn unary_table(&self) -> &[Cost] {
        &self.unary
    }

    /// CSR adjacency over the local node numbering
    pub fn neighbourhood(&self) -> Neighbourhood {
        Neighbourhood::build(self.num_nodes(), &self.edges)
    }

    /// Total energy of a complete labeling in local numbering
    pub fn energy(&self, labels: &[LabelIndex]) -> Result<Cost, EnergyError> {
        if labels.len() != self.num_nodes() {
            return Err(EnergyError::InvalidModel(format!(
                "labeling covers {} nodes, model has {}",
                labels.len(),
                self.num_nodes()
            )));
        }
        if let Some(node) = labels.iter().position(|&l| l >= self.num_labels) {
            return Err(EnergyError::InvalidModel(format!(
                "label {} of node {} is out of range",
                labels[node], node
            )));
        }

        let unary: Cost = labels
            .iter()
            .enumerate()
            .map(|(node, &label)| self.unary_cost(node, label))
            .sum();
        let pairwise: Cost = self
            .edges
            .iter()
            .map(|e| e.cost(labels[e.a], labels[e.b]))
            .sum();
        Ok(unary + pairwise)
    }

    /// Per-node unary arg-min, lowest label on ties
    pub fn argmin_labels(&self) -> Vec<LabelIndex> {
        self.unary
            .chunks(self.num_labels)
            .map(argmin)
            .collect()
    }

    /// Reduced model over the nodes `labeling` leaves uncertified
    ///
    /// `labeling` is indexed by original node indices. Certified neighbours
    /// of a surviving node add their realized Potts cost to each candidate
    /// label of that node; edges touching a certified node are dropped.
    pub fn project(&self, labeling: &Labeling) -> Result<EnergyModel, EnergyError> {
        if let Some(&max) = self.origin.iter().max() {
            if max >= labeling.len() {
                return Err(EnergyError::InvalidModel(format!(
                    "labeling covers {} nodes, model references original node {}",
                    labeling.len(),
                    max
                )));
            }
        }

        let fixed: Vec<Option<LabelIndex>> = self
            .origin
            .iter()
            .map(|&original| labeling.certified(original))
            .collect();

        let mut remap = vec![usize::MAX; self.num_nodes()];
        let mut origin = Vec::new();
        let mut unary = Vec::new();
        for (node, state) in fixed.iter().enumerate() {
            if state.is_none() {
                remap[node] = origin.len();
                origin.push(self.origin[node]);
                unary.extend_from_slice(self.unary_costs(node));
            }
        }

        let num_labels = self.num_labels;
        let mut fold = |node: NodeIndex, fixed_label: LabelIndex, weight: Cost| {
            let row = &mut unary[remap[node] * num_labels..(remap[node] + 1) * num_labels];
            for (label, cost) in row.iter_mut().enumerate() {
                if label != fixed_label {
                    *cost += weight;
                }
            }
        };

        let mut edges = Vec::new();
        for edge in &self.edges {
            match (fixed[edge.a], fixed[edge.b]) {
                (None, None) => {
                    edges.push(PottsEdge::new(remap[edge.a], remap[edge.b], edge.weight))
                }
                (Some(label), None) => fold(edge.b, label, edge.weight),
                (None, Some(label)) => fold(edge.a, label, edge.weight),
                (Some(_), Some(_)) => {}
            }
        }

        trace!(
            "Projected model: {} -> {} nodes, {} -> {} edges",
            self.num_nodes(),
            origin.len(),
            self.edges.len(),
            edges.len()
        );

        Ok(EnergyModel {
            num_labels,
            unary,
            edges,
            origin,
        })
    }
}

/// Index of the smallest cost, lowest index on ties
pub(crate) fn argmin(costs: &[Cost]) -> LabelIndex {
    let mut best = 0;
    for (label, &cost) in costs.iter().enumerate().skip(1) {
        if cost < costs[best] {
            best = label;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_model() -> EnergyModel {
        EnergyModel::from_rows(
            &[vec![0.0, 5.0], vec![2.0, 2.0], vec![5.0, 0.0]],
            vec![PottsEdge::new(0, 1, 1.0), PottsEdge::new(1, 2, 1.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_model_creation() {
        let model = chain_model();
        assert_eq!(model.num_nodes(), 3);
        assert_eq!(model.num_labels(), 2);
        assert_eq!(model.num_edges(), 2);
        assert_eq!(model.unary_cost(2, 0), 5.0);
        assert_eq!(model.pairwise_cost(1), 1.0);
        assert_eq!(model.origin(), &[0, 1, 2]);
    }

    #[test]
    fn test_invalid_models_rejected() {
        let invalid = |result: Result<EnergyModel, EnergyError>| {
            matches!(result, Err(EnergyError::InvalidModel(_)))
        };
        assert!(invalid(EnergyModel::new(0, 2, vec![], vec![])));
        assert!(invalid(EnergyModel::new(1, 0, vec![], vec![])));
        assert!(invalid(EnergyModel::new(2, 2, vec![0.0; 3], vec![])));

        let negative = vec![PottsEdge::new(0, 1, -0.5)];
        assert!(invalid(EnergyModel::new(2, 2, vec![0.0; 4], negative)));

        let self_loop = vec![PottsEdge::new(1, 1, 1.0)];
        assert!(EnergyModel::new(2, 2, vec![0.0; 4], self_loop).is_err());

        let duplicate = vec![PottsEdge::new(0, 1, 1.0), PottsEdge::new(1, 0, 2.0)];
        assert!(EnergyModel::new(2, 2, vec![0.0; 4], duplicate).is_err());

        let out_of_range = vec![PottsEdge::new(0, 2, 1.0)];
        assert!(EnergyModel::new(2, 2, vec![0.0; 4], out_of_range).is_err());

        assert!(EnergyModel::new(1, 2, vec![0.0, f64::NAN], vec![]).is_err());
    }

    #[test]
    fn test_energy_evaluation() {
        let model = chain_model();
        assert_eq!(model.energy(&[0, 0, 1]).unwrap(), 0.0 + 2.0 + 0.0 + 1.0);
        assert_eq!(model.energy(&[0, 1, 1]).unwrap(), 0.0 + 2.0 + 0.0 + 1.0);
        assert_eq!(model.energy(&[1, 1, 1]).unwrap(), 5.0 + 2.0);
        assert!(model.energy(&[0, 0]).is_err());
        assert!(model.energy(&[0, 0, 2]).is_err());
    }

    #[test]
    fn test_argmin_prefers_lowest_label_on_ties() {
        let model = chain_model();
        assert_eq!(model.argmin_labels(), vec![0, 0, 1]);
    }

    #[test]
    fn test_projection_folds_certified_neighbours() {
        let model = chain_model();
        let mut labeling = Labeling::new(3);
        labeling.certify(0, 0).unwrap();

        let projected = model.project(&labeling).unwrap();
        assert_eq!(projected.num_nodes(), 2);
        assert_eq!(projected.origin(), &[1, 2]);
        assert_eq!(projected.unary_costs(0), &[2.0, 3.0]);
        assert_eq!(projected.unary_costs(1), &[5.0, 0.0]);
        assert_eq!(projected.edges(), &[PottsEdge::new(0, 1, 1.0)]);
    }

    #[test]
    fn test_projection_drops_edges_between_certified_nodes() {
        let model = chain_model();
        let mut labeling = Labeling::new(3);
        labeling.certify(0, 0).unwrap();
        labeling.certify(1, 1).unwrap();

        let projected = model.project(&labeling).unwrap();
        assert_eq!(projected.origin(), &[2]);
        assert_eq!(projected.unary_costs(0), &[6.0, 0.0]);
        assert_eq!(projected.num_edges(), 0);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let model = chain_model();
        let mut labeling = Labeling::new(3);
        labeling.certify(2, 1).unwrap();

        let once = model.project(&labeling).unwrap();
        let twice = once.project(&labeling).unwrap();
        assert_eq!(once, twice);

        let untouched = model.project(&Labeling::new(3)).unwrap();
        assert_eq!(untouched, model);
    }

    #[test]
    fn test_projection_ignores_tentative_labels() {
        let model = chain_model();
        let mut labeling = Labeling::new(3);
        labeling.assign_tentative(1, 0).unwrap();
        assert_eq!(model.project(&labeling).unwrap(), model);
    }

    #[test]
    fn test_projection_rejects_short_labeling() {
        let model = chain_model();
        assert!(model.project(&Labeling::new(2)).is_err());
    }
}
