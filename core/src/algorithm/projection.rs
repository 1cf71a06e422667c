//! Energy projection between certification rounds
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::debug;
use serde::{Deserialize, Serialize};

use crate::algorithm::graph::Flow;
use crate::algorithm::kovtun::{Certification, PersistencyEngine};
use crate::algorithm::traits::{EnergyError, LabelIndex};
use crate::data_structures::energy::EnergyModel;
use crate::data_structures::labeling::Labeling;

/// Bookkeeping for one certify-then-project round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundReport {
    pub label: LabelIndex,
    pub newly_certified: usize,
    pub live_nodes_before: usize,
    pub live_nodes_after: usize,
    pub live_edges_before: usize,
    pub live_edges_after: usize,
    pub cut_value: Flow,
}

/// Live problem threaded through the certify loop
///
/// `model` is always the projection of the original energy onto the nodes
/// `labeling` leaves uncertified.
#[derive(Debug, Clone)]
pub struct CertificationState {
    pub model: EnergyModel,
    pub labeling: Labeling,
    pub rounds: Vec<RoundReport>,
}

impl CertificationState {
    pub fn new(model: EnergyModel) -> Self {
        let num_original = model.origin().iter().max().map_or(0, |&m| m + 1);
        Self {
            model,
            labeling: Labeling::new(num_original),
            rounds: Vec::new(),
        }
    }

    #[inline]
    pub fn live_nodes(&self) -> usize {
        self.model.num_nodes()
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.model.is_empty()
    }
}

/// Shrinks the live problem after each certification round
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectionReducer;

impl ProjectionReducer {
    /// Projects the certified nodes out of `state` and `engine`
    pub fn reduce(
        &self,
        state: &mut CertificationState,
        engine: &mut PersistencyEngine,
        certification: &Certification,
    ) -> Result<RoundReport, EnergyError> {
        let live_nodes_before = state.model.num_nodes();
        let live_edges_before = state.model.num_edges();

        let projected = if certification.certified.is_empty() {
            None
        } else {
            Some(state.model.project(&state.labeling)?)
        };
        engine.eliminate(&certification.certified)?;
        if let Some(projected) = projected {
            state.model = projected;
        }

        let live_nodes_after = state.model.num_nodes();
        if live_nodes_before - live_nodes_after != certification.certified.len() {
            return Err(EnergyError::InvalidModel(format!(
                "projection removed {} nodes but {} were certified",
                live_nodes_before - live_nodes_after,
                certification.certified.len()
            )));
        }

        let report = RoundReport {
            label: certification.label,
            newly_certified: certification.certified.len(),
            live_nodes_before,
            live_nodes_after,
            live_edges_before,
            live_edges_after: state.model.num_edges(),
            cut_value: certification.cut_value,
        };
        debug!(
            "Round label {}: {} -> {} live nodes, {} -> {} live edges",
            report.label,
            report.live_nodes_before,
            report.live_nodes_after,
            report.live_edges_before,
            report.live_edges_after
        );
        state.rounds.push(report.clone());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::kovtun::GraphStrategy;
    use crate::data_structures::energy::PottsEdge;

    #[test]
    fn test_reduce_after_certification() {
        let model = EnergyModel::from_rows(
            &[vec![0.0, 5.0], vec![2.0, 2.0], vec![5.0, 0.0]],
            vec![PottsEdge::new(0, 1, 1.0), PottsEdge::new(1, 2, 1.0)],
        )
        .unwrap();
        let mut state = CertificationState::new(model);
        let mut engine = PersistencyEngine::new(GraphStrategy::Shared);
        engine.prepare(&state.model, 3).unwrap();

        let cert = engine.find_persistent(&state.model, 0, &mut state.labeling).unwrap();
        let report = ProjectionReducer.reduce(&mut state, &mut engine, &cert).unwrap();

        assert_eq!(report.newly_certified, 1);
        assert_eq!((report.live_nodes_before, report.live_nodes_after), (3, 2));
        assert_eq!((report.live_edges_before, report.live_edges_after), (2, 1));
        assert_eq!(state.model.origin(), &[1, 2]);
        assert_eq!(state.model.unary_costs(0), &[2.0, 3.0]);
        assert_eq!(state.rounds.len(), 1);
    }

    #[test]
    fn test_reduce_without_certification_keeps_model() {
        let edges = vec![PottsEdge::new(0, 1, 1.0)];
        let model = EnergyModel::from_rows(&[vec![1.0, 1.0], vec![1.0, 1.0]], edges).unwrap();
        let mut state = CertificationState::new(model.clone());
        let mut engine = PersistencyEngine::new(GraphStrategy::PerLabel);

        let cert = engine.find_persistent(&state.model, 0, &mut state.labeling).unwrap();
        assert!(cert.certified.is_empty());
        let report = ProjectionReducer.reduce(&mut state, &mut engine, &cert).unwrap();
        assert_eq!(report.live_nodes_after, 2);
        assert_eq!(state.model, model);
    }
}
