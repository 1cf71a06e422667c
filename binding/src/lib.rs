//! partopt Python bindings
//!
//! Hosts pass a node-major unary table and a symmetric sparse weight
//! matrix in compressed-column form (`col_ptr`, `row_idx`, `values`).
//! Labels come back 1-based, with `0` for nodes left unresolved.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::debug;
use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyValueError};
use pyo3::prelude::*;

use partopt_core::{
    host_labels, EnergyError, FallbackKind, HostProblem, Orchestrator, Outcome, SolverConfig,
};

create_exception!(partopt, PartoptError, PyException);
create_exception!(partopt, IncompleteLabelingError, PartoptError);

/// Failures at the host boundary
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Energy(#[from] EnergyError),

    #[error("Unknown fallback solver '{0}', expected 'none', 'expansion' or 'trwbp'")]
    UnknownFallback(String),

    #[error("Column pointer must hold num_nodes + 1 >= 2 entries")]
    EmptyColumnPointer,
}

impl From<HostError> for PyErr {
    fn from(err: HostError) -> PyErr {
        match err {
            HostError::Energy(EnergyError::IncompleteLabeling { .. }) => {
                IncompleteLabelingError::new_err(err.to_string())
            }
            HostError::Energy(_) => PartoptError::new_err(err.to_string()),
            HostError::UnknownFallback(_) | HostError::EmptyColumnPointer => {
                PyValueError::new_err(err.to_string())
            }
        }
    }
}

fn parse_fallback(name: &str) -> Result<FallbackKind, HostError> {
    match name.to_ascii_lowercase().as_str() {
        "none" => Ok(FallbackKind::None),
        "expansion" | "alpha-expansion" => Ok(FallbackKind::AlphaExpansion),
        "trwbp" | "trw-bp" => Ok(FallbackKind::TrwBp),
        _ => Err(HostError::UnknownFallback(name.to_string())),
    }
}

fn run(
    unary: &[f64],
    num_labels: usize,
    col_ptr: &[usize],
    row_idx: &[usize],
    values: &[f64],
    config: SolverConfig,
) -> Result<Outcome, HostError> {
    if col_ptr.len() < 2 {
        return Err(HostError::EmptyColumnPointer);
    }
    let num_nodes = col_ptr.len() - 1;
    let problem = HostProblem::from_csc(unary, num_labels, num_nodes, col_ptr, row_idx, values)?;
    debug!(
        "Host problem: {} nodes, {} labels, {} edges",
        num_nodes,
        num_labels,
        problem.model.num_edges()
    );
    Ok(Orchestrator::new(config)?.run(&problem.model)?)
}

/// Certified labels only: 1-based, `0` where no label is certified
#[pyfunction]
fn partial_optimality(
    py: Python<'_>,
    unary: Vec<f64>,
    num_labels: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<f64>,
) -> PyResult<Vec<f64>> {
    let config = SolverConfig::default();
    let outcome =
        py.allow_threads(|| run(&unary, num_labels, &col_ptr, &row_idx, &values, config))?;
    Ok(host_labels(&outcome.labeling))
}

/// Full labeling with a fallback solver; returns `(labels, certified_mask, energy)`
///
/// With `certify=False` the fallback labels the unprojected energy and no
/// node is reported as certified.
#[pyfunction]
#[pyo3(signature = (
    unary, num_labels, col_ptr, row_idx, values, fallback = "expansion", certify = true
))]
fn solve(
    py: Python<'_>,
    unary: Vec<f64>,
    num_labels: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<f64>,
    fallback: &str,
    certify: bool,
) -> PyResult<(Vec<f64>, Vec<bool>, Option<f64>)> {
    let mut config = SolverConfig::default().with_fallback(parse_fallback(fallback)?);
    if !certify {
        config = config.without_certification();
    }
    let outcome =
        py.allow_threads(|| run(&unary, num_labels, &col_ptr, &row_idx, &values, config))?;
    let certified = (0..outcome.labeling.len())
        .map(|node| outcome.labeling.certified(node).is_some())
        .collect();
    Ok((host_labels(&outcome.labeling), certified, outcome.energy))
}

#[pymodule]
fn partopt(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("PartoptError", m.py().get_type_bound::<PartoptError>())?;
    m.add("IncompleteLabelingError", m.py().get_type_bound::<IncompleteLabelingError>())?;
    m.add_function(wrap_pyfunction!(partial_optimality, m)?)?;
    m.add_function(wrap_pyfunction!(solve, m)?)?;
    m.add("__version__", partopt_core::VERSION)?;
    Ok(())
}
