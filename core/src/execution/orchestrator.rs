//! Pipeline driver: certify every label, project, fall back, assemble
//!
//! The run advances through explicit phases
//! `Init -> CertifyLoop -> Fallback -> Assemble -> Done`. With
//! certification disabled `CertifyLoop` is skipped and the fallback labels
//! the whole model. All per-run state lives in a `CertificationState` owned
//! by the call; flow networks are released before `run` returns.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::algorithm::expansion::AlphaExpansion;
use crate::algorithm::kovtun::PersistencyEngine;
use crate::algorithm::projection::{CertificationState, ProjectionReducer, RoundReport};
use crate::algorithm::traits::{
    Cost, EnergyError, FallbackSolution, LabelIndex, MultiLabelSolver,
};
use crate::algorithm::trwbp::TrwBp;
use crate::config::{FallbackKind, SolverConfig};
use crate::data_structures::energy::EnergyModel;
use crate::data_structures::labeling::Labeling;

/// Pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Init,
    CertifyLoop { label: LabelIndex },
    Fallback,
    Assemble,
    Done,
}

/// Diagnostics of the fallback stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackReport {
    pub solver: String,
    pub live_nodes: usize,
    /// Energy of the fallback labels on the residual model
    pub residual_energy: Cost,
    pub lower_bound: Option<Cost>,
    pub iterations: usize,
}

/// Result of one pipeline run
///
/// A labeling with unresolved nodes is a valid partial result; `complete`
/// turns it into a full assignment or reports `IncompleteLabeling`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub labeling: Labeling,
    pub rounds: Vec<RoundReport>,
    pub residual_nodes: usize,
    pub residual_edges: usize,
    pub fallback: Option<FallbackReport>,
    /// Energy of the final labeling on the original model, when complete
    pub energy: Option<Cost>,
}

impl Outcome {
    pub fn certified_count(&self) -> usize {
        self.labeling.certified_count()
    }

    pub fn complete(&self) -> Result<Vec<LabelIndex>, EnergyError> {
        self.labeling.complete()
    }

    pub fn to_json(&self) -> Result<String, EnergyError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EnergyError::Io(format!("Failed to encode outcome: {e}")))
    }
}

/// Drives a run over one energy model
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: SolverConfig,
    phase: Phase,
}

impl Orchestrator {
    pub fn new(config: SolverConfig) -> Result<Self, EnergyError> {
        config.validate()?;
        Ok(Self {
            config,
            phase: Phase::Init,
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Phase reached by the last run
    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    pub fn run(&mut self, model: &EnergyModel) -> Result<Outcome, EnergyError> {
        self.phase = Phase::Init;
        info!(
            "Starting run: {} nodes, {} labels, {} edges, strategy {:?}, fallback {:?}",
            model.num_nodes(),
            model.num_labels(),
            model.num_edges(),
            self.config.graph_strategy,
            self.config.fallback
        );

        let mut state = if self.config.certify {
            self.certify(model)?
        } else {
            info!(
                "Certification disabled; the fallback labels all {} nodes",
                model.num_nodes()
            );
            CertificationState::new(model.clone())
        };

        let residual_nodes = state.live_nodes();
        let residual_edges = state.model.num_edges();
        let fallback = if state.is_resolved() || self.config.fallback == FallbackKind::None {
            None
        } else {
            self.enter(Phase::Fallback);
            Some(self.fall_back(&mut state)?)
        };

        self.enter(Phase::Assemble);
        let energy = match state.labeling.complete() {
            Ok(labels) => Some(model.energy(&labels)?),
            Err(EnergyError::IncompleteLabeling { unresolved }) => {
                info!("Partial labeling: {} node(s) unresolved", unresolved);
                None
            }
            Err(e) => return Err(e),
        };
        self.enter(Phase::Done);

        info!(
            "Run finished: {}/{} certified, energy {:?}",
            state.labeling.certified_count(),
            state.labeling.len(),
            energy
        );

        Ok(Outcome {
            labeling: state.labeling,
            rounds: state.rounds,
            residual_nodes,
            residual_edges,
            fallback,
            energy,
        })
    }

    /// `Init` and `CertifyLoop`: returns the state after the last round
    pub fn certify(&mut self, model: &EnergyModel) -> Result<CertificationState, EnergyError> {
        let mut state = CertificationState::new(model.clone());
        let mut engine = PersistencyEngine::new(self.config.graph_strategy);
        engine.prepare(&state.model, state.labeling.len())?;

        for label in 0..model.num_labels() {
            if self.config.stop_when_resolved && state.is_resolved() {
                debug!("All nodes certified before label {}", label);
                break;
            }
            self.enter(Phase::CertifyLoop { label });
            let certification = engine.find_persistent(&state.model, label, &mut state.labeling)?;
            ProjectionReducer.reduce(&mut state, &mut engine, &certification)?;
        }
        engine.release();

        info!(
            "Certification finished: {} certified, {} live nodes, {} live edges",
            state.labeling.certified_count(),
            state.model.num_nodes(),
            state.model.num_edges()
        );
        Ok(state)
    }

    fn fall_back(&self, state: &mut CertificationState) -> Result<FallbackReport, EnergyError> {
        let mut solver: Box<dyn MultiLabelSolver> = match self.config.fallback {
            FallbackKind::AlphaExpansion => {
                Box::new(AlphaExpansion::new(self.config.expansion_max_passes))
            }
            FallbackKind::TrwBp => Box::new(TrwBp::new(
                self.config.trw_iterations,
                self.config.bp_iterations,
                self.config.candidate_selection,
            )),
            FallbackKind::None => {
                return Err(EnergyError::Config("no fallback solver configured".to_string()))
            }
        };

        let solution = solver.minimize(&state.model)?;
        merge_fallback(&state.model, &solution, &mut state.labeling)?;
        info!(
            "Fallback {} labelled {} residual node(s): energy {}, bound {:?}",
            solver.name(),
            solution.labels.len(),
            solution.energy,
            solution.lower_bound
        );

        Ok(FallbackReport {
            solver: solver.name().to_string(),
            live_nodes: state.live_nodes(),
            residual_energy: solution.energy,
            lower_bound: solution.lower_bound,
            iterations: solution.iterations,
        })
    }
}

/// Writes fallback labels back to original indices as tentative labels
pub fn merge_fallback(
    residual: &EnergyModel,
    solution: &FallbackSolution,
    labeling: &mut Labeling,
) -> Result<(), EnergyError> {
    if solution.labels.len() != residual.num_nodes() {
        return Err(EnergyError::InvalidModel(format!(
            "fallback returned {} labels for {} live nodes",
            solution.labels.len(),
            residual.num_nodes()
        )));
    }
    for (node, &label) in solution.labels.iter().enumerate() {
        labeling.assign_tentative(residual.original_index(node), label)?;
    }
    Ok(())
}

/// Runs `Init` and `CertifyLoop` only
pub fn run_certification(
    model: &EnergyModel,
    config: SolverConfig,
) -> Result<CertificationState, EnergyError> {
    Orchestrator::new(config)?.certify(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::energy::PottsEdge;
    use crate::data_structures::labeling::NodeState;

    fn chain() -> EnergyModel {
        EnergyModel::from_rows(
            &[vec![0.0, 5.0], vec![2.0, 2.0], vec![5.0, 0.0]],
            vec![PottsEdge::new(0, 1, 1.0), PottsEdge::new(1, 2, 1.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_partial_run_without_fallback() {
        let mut orchestrator = Orchestrator::new(SolverConfig::default()).unwrap();
        let outcome = orchestrator.run(&chain()).unwrap();

        assert_eq!(orchestrator.phase(), Phase::Done);
        assert_eq!(outcome.labeling.state(0), NodeState::Certified(0));
        assert_eq!(outcome.labeling.state(1), NodeState::Unassigned);
        assert_eq!(outcome.labeling.state(2), NodeState::Certified(1));
        assert_eq!(outcome.rounds.len(), 2);
        assert_eq!(outcome.residual_nodes, 1);
        assert!(outcome.fallback.is_none());
        assert!(outcome.energy.is_none());
        assert_eq!(
            outcome.complete(),
            Err(EnergyError::IncompleteLabeling { unresolved: 1 })
        );
    }

    #[test]
    fn test_fallback_completes_labeling() {
        for fallback in [FallbackKind::AlphaExpansion, FallbackKind::TrwBp] {
            let config = SolverConfig::default().with_fallback(fallback);
            let outcome = Orchestrator::new(config).unwrap().run(&chain()).unwrap();
            let labels = outcome.complete().unwrap();

            assert_eq!(labels[0], 0);
            assert_eq!(labels[2], 1);
            assert!(matches!(outcome.labeling.state(1), NodeState::Tentative(_)));
            assert_eq!(outcome.energy, Some(3.0));
            assert_eq!(outcome.fallback.as_ref().unwrap().live_nodes, 1);
        }
    }

    #[test]
    fn test_fallback_only_run_leaves_nothing_certified() {
        for fallback in [FallbackKind::AlphaExpansion, FallbackKind::TrwBp] {
            let config = SolverConfig::default()
                .with_fallback(fallback)
                .without_certification();
            let mut orchestrator = Orchestrator::new(config).unwrap();
            let outcome = orchestrator.run(&chain()).unwrap();

            assert_eq!(orchestrator.phase(), Phase::Done);
            assert_eq!(outcome.certified_count(), 0);
            assert!(outcome.rounds.is_empty());
            assert_eq!(outcome.residual_nodes, 3);
            assert_eq!(outcome.complete().unwrap().len(), 3);
            assert!(outcome
                .labeling
                .states()
                .iter()
                .all(|s| matches!(s, NodeState::Tentative(_))));
            assert_eq!(outcome.energy, Some(3.0));
            assert_eq!(outcome.fallback.as_ref().unwrap().live_nodes, 3);
        }
    }

    #[test]
    fn test_merge_rejects_wrong_length() {
        let model = chain();
        let solution = FallbackSolution {
            labels: vec![0],
            energy: 0.0,
            iterations: 0,
            lower_bound: None,
        };
        let mut labeling = Labeling::new(3);
        assert!(matches!(
            merge_fallback(&model, &solution, &mut labeling),
            Err(EnergyError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SolverConfig::default().with_fallback(FallbackKind::AlphaExpansion);
        config.expansion_max_passes = 0;
        assert!(matches!(Orchestrator::new(config), Err(EnergyError::Config(_))));
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = Orchestrator::new(SolverConfig::default())
            .unwrap()
            .run(&chain())
            .unwrap();
        let json = outcome.to_json().unwrap();
        let back: Outcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }
}
