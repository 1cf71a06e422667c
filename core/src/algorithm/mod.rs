//! Persistency, projection and fallback solvers for Potts energies
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod traits;
pub mod graph;
pub mod kovtun;
pub mod projection;
pub mod expansion;
pub mod trwbp;

pub use self::traits::*;
pub use self::graph::*;
pub use self::kovtun::{Certification, GraphStrategy, PersistencyEngine};
pub use self::projection::{CertificationState, ProjectionReducer, RoundReport};
pub use self::expansion::AlphaExpansion;
pub use self::trwbp::{CandidateSelection, TrwBp, TrwBpOutcome};
