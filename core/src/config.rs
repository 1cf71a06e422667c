//! Solver and run configuration
//!
//! `SolverConfig` drives the pipeline; `RunConfig` adds the file paths and
//! image parameters used by the segmentation binary. Both load from JSON
//! and fill missing fields with their defaults.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::algorithm::kovtun::GraphStrategy;
use crate::algorithm::traits::{Cost, EnergyError};
use crate::algorithm::trwbp::CandidateSelection;
use crate::data_structures::graph::Connectivity;

/// Solver used for the nodes left after certification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackKind {
    /// Leave residual nodes unresolved
    #[default]
    None,
    AlphaExpansion,
    TrwBp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub graph_strategy: GraphStrategy,
    pub fallback: FallbackKind,
    pub expansion_max_passes: usize,
    pub trw_iterations: usize,
    pub bp_iterations: usize,
    pub candidate_selection: CandidateSelection,
    /// Skip the remaining labels once every node is certified
    pub stop_when_resolved: bool,
    /// Run the certify loop; when off the fallback labels the whole model
    pub certify: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            graph_strategy: GraphStrategy::default(),
            fallback: FallbackKind::default(),
            expansion_max_passes: 10,
            trw_iterations: 70,
            bp_iterations: 70,
            candidate_selection: CandidateSelection::default(),
            stop_when_resolved: true,
            certify: true,
        }
    }
}

impl SolverConfig {
    pub fn with_fallback(mut self, fallback: FallbackKind) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_strategy(mut self, strategy: GraphStrategy) -> Self {
        self.graph_strategy = strategy;
        self
    }

    /// Fallback only, on the unprojected model
    pub fn without_certification(mut self) -> Self {
        self.certify = false;
        self
    }

    pub fn validate(&self) -> Result<(), EnergyError> {
        match self.fallback {
            FallbackKind::None if !self.certify => Err(EnergyError::Config(
                "a fallback solver is required when certification is off".to_string(),
            )),
            FallbackKind::AlphaExpansion if self.expansion_max_passes == 0 => Err(
                EnergyError::Config("expansion_max_passes must be at least 1".to_string()),
            ),
            FallbackKind::TrwBp if self.trw_iterations == 0 && self.bp_iterations == 0 => {
                Err(EnergyError::Config(
                    "trw_iterations and bp_iterations cannot both be 0".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Parameters of the grayscale segmentation energy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub num_labels: usize,
    /// Label intensities; evenly spread over [0, 255] when absent
    pub intensities: Option<Vec<Cost>>,
    pub smoothness: Cost,
    pub connectivity: Connectivity,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            num_labels: 4,
            intensities: None,
            smoothness: 10.0,
            connectivity: Connectivity::Eight,
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<(), EnergyError> {
        if self.num_labels == 0 {
            return Err(EnergyError::Config("num_labels must be positive".to_string()));
        }
        if let Some(intensities) = &self.intensities {
            if intensities.len() != self.num_labels {
                return Err(EnergyError::Config(format!(
                    "{} intensities given for {} labels",
                    intensities.len(),
                    self.num_labels
                )));
            }
        }
        if !self.smoothness.is_finite() || self.smoothness < 0.0 {
            return Err(EnergyError::Config(format!(
                "smoothness must be finite and non-negative, got {}",
                self.smoothness
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub input: PathBuf,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    pub output: RunOutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutputConfig {
    pub labels_image: PathBuf,
    pub outcome_json: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<RunConfig, EnergyError> {
    let data = fs::read_to_string(path)
        .map_err(|e| EnergyError::Io(format!("Failed to read config {}: {e}", path.display())))?;
    let config: RunConfig = serde_json::from_str(&data).map_err(|e| {
        EnergyError::Config(format!("Failed to parse config {}: {e}", path.display()))
    })?;
    config.solver.validate()?;
    config.segmentation.validate()?;
    Ok(config)
}
