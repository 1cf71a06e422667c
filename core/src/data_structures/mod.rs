//! Energy model, labeling and graph storage
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod energy;
pub mod labeling;
pub mod graph;

pub use self::energy::{EnergyModel, PottsEdge};
pub use self::labeling::{Labeling, NodeState};
pub use self::graph::{Connectivity, GridGraph, Incidence, Neighbourhood};
