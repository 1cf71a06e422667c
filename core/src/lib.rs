//! partopt: partial optimality for multi-label Potts energies
//!
//! Certifies, label by label, the nodes that take that label in every
//! optimal labeling (Kovtun's one-against-all test), projects them out of
//! the energy, and optionally labels the residual problem with
//! alpha-expansion or TRW-S/BP. Certified labels are never overwritten.
//!
//! ```no_run
//! use partopt_core::{EnergyModel, FallbackKind, Orchestrator, PottsEdge, SolverConfig};
//!
//! let model = EnergyModel::from_rows(
//!     &[vec![0.0, 5.0], vec![2.0, 2.0], vec![5.0, 0.0]],
//!     vec![PottsEdge::new(0, 1, 1.0), PottsEdge::new(1, 2, 1.0)],
//! )?;
//! let config = SolverConfig::default().with_fallback(FallbackKind::AlphaExpansion);
//! let outcome = Orchestrator::new(config)?.run(&model)?;
//! let labels = outcome.complete()?;
//! assert_eq!(labels.len(), 3);
//! # Ok::<(), partopt_core::EnergyError>(())
//! ```
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod algorithm;
pub mod config;
pub mod data_structures;
pub mod execution;
pub mod io;

pub use crate::algorithm::{
    AlphaExpansion, CandidateSelection, Certification, Cost, EnergyError, FallbackSolution,
    GraphStrategy, LabelIndex, MultiLabelSolver, NodeIndex, PersistencyEngine, RoundReport, TrwBp,
};
pub use crate::config::{FallbackKind, RunConfig, SegmentationConfig, SolverConfig};
pub use crate::data_structures::{
    Connectivity, EnergyModel, GridGraph, Labeling, NodeState, PottsEdge,
};
pub use crate::execution::{run_certification, Orchestrator, Outcome};
pub use crate::io::{host_labels, HostProblem};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
