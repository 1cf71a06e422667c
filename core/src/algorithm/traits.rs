//! Core trait and error definitions for the labeling pipeline
//!
//! This module establishes the shared vocabulary of the solver stack: cost
//! and index aliases, the error taxonomy surfaced by every stage, and the
//! `MultiLabelSolver` trait implemented by the fallback solvers.
//!
//! # Error Taxonomy
//! - `InvalidModel`: malformed costs or sizes; fatal, reported before any work
//! - `InconsistentCertification`: a node certified for two labels; fatal
//! - `IncompleteLabeling`: partial output; recoverable by the caller
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::data_structures::energy::EnergyModel;

/// Unary and pairwise cost values
pub type Cost = f64;

/// Label identifier in `[0, num_labels)`
pub type LabelIndex = usize;

/// Node identifier in `[0, num_nodes)`
pub type NodeIndex = usize;

/// Comprehensive error types for pipeline operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnergyError {
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error(
        "Inconsistent certification: node {node} already certified for label {existing}, \
         attempted label {attempted}"
    )]
    InconsistentCertification {
        node: NodeIndex,
        existing: LabelIndex,
        attempted: LabelIndex,
    },

    #[error("Incomplete labeling: {unresolved} node(s) hold no label")]
    IncompleteLabeling { unresolved: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl EnergyError {
    /// Whether the error aborts the pipeline
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EnergyError::IncompleteLabeling { .. })
    }
}

/// Labeling produced by a fallback solver over a model's local numbering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackSolution {
    /// One label per live node of the solved model
    pub labels: Vec<LabelIndex>,
    /// Energy of `labels` on the solved model
    pub energy: Cost,
    /// Iterations or passes actually executed
    pub iterations: usize,
    /// Lower bound on the optimum, when the solver maintains one
    pub lower_bound: Option<Cost>,
}

/// Approximate multi-label solver operating on the live nodes of a model
///
/// # Invariants
/// - Returns exactly one label per node of the given model
/// - Terminates within its configured iteration budget
/// - Deterministic for a given model
pub trait MultiLabelSolver: Debug {
    /// Returns the solver's descriptive name
    fn name(&self) -> &'static str;

    /// Computes a complete labeling of `model` in its local numbering
    fn minimize(&mut self, model: &EnergyModel) -> Result<FallbackSolution, EnergyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EnergyError::InvalidModel("x".into()).is_fatal());
        let conflict = EnergyError::InconsistentCertification {
            node: 0,
            existing: 0,
            attempted: 1,
        };
        assert!(conflict.is_fatal());
        assert!(!EnergyError::IncompleteLabeling { unresolved: 3 }.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = EnergyError::IncompleteLabeling { unresolved: 2 };
        assert_eq!(err.to_string(), "Incomplete labeling: 2 node(s) hold no label");
    }
}
