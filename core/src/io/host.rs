//! Host-facing problem layout
//!
//! Hosts hand over a node-major unary table and a symmetric sparse weight
//! matrix in compressed-column form. Only the strict upper triangle
//! (`row < col`) is read; each entry becomes the edge `(col, row)`.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use crate::algorithm::traits::{Cost, EnergyError};
use crate::data_structures::energy::{EnergyModel, PottsEdge};
use crate::data_structures::labeling::Labeling;

/// Energy decoded from host buffers
#[derive(Debug, Clone, PartialEq)]
pub struct HostProblem {
    pub model: EnergyModel,
}

impl HostProblem {
    /// `unary[node * num_labels + label]`; CSC matrix of size `num_nodes x num_nodes`
    pub fn from_csc(
        unary: &[Cost],
        num_labels: usize,
        num_nodes: usize,
        col_ptr: &[usize],
        row_idx: &[usize],
        values: &[Cost],
    ) -> Result<Self, EnergyError> {
        if col_ptr.len() != num_nodes + 1 {
            return Err(EnergyError::InvalidModel(format!(
                "column pointer has {} entries, expected {}",
                col_ptr.len(),
                num_nodes + 1
            )));
        }
        if row_idx.len() != values.len() {
            return Err(EnergyError::InvalidModel(format!(
                "{} row indices for {} values",
                row_idx.len(),
                values.len()
            )));
        }
        if col_ptr[0] != 0 || col_ptr[num_nodes] != values.len() {
            return Err(EnergyError::InvalidModel(
                "column pointer must start at 0 and end at the number of entries".to_string(),
            ));
        }
        if col_ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(EnergyError::InvalidModel("column pointer is not monotone".to_string()));
        }

        let mut edges = Vec::new();
        for col in 0..num_nodes {
            for entry in col_ptr[col]..col_ptr[col + 1] {
                let row = row_idx[entry];
                if row >= num_nodes {
                    return Err(EnergyError::InvalidModel(format!(
                        "row index {} outside [0, {})",
                        row, num_nodes
                    )));
                }
                if row < col {
                    if values[entry] < 0.0 {
                        return Err(EnergyError::InvalidModel(format!(
                            "negative Potts weight {} between {} and {}",
                            values[entry], col, row
                        )));
                    }
                    edges.push(PottsEdge::new(col, row, values[entry]));
                }
            }
        }

        let model = EnergyModel::new(num_nodes, num_labels, unary.to_vec(), edges)?;
        Ok(Self { model })
    }
}

/// 1-based labels per node, `0` where no label is held
pub fn host_labels(labeling: &Labeling) -> Vec<f64> {
    (0..labeling.len())
        .map(|node| labeling.label(node).map_or(0.0, |label| (label + 1) as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // symmetric 3x3: w(0,1) = 2, w(1,2) = 0.5, diagonal ignored
    fn csc() -> (Vec<usize>, Vec<usize>, Vec<Cost>) {
        (
            vec![0, 2, 5, 7],
            vec![0, 1, 0, 1, 2, 1, 2],
            vec![9.0, 2.0, 2.0, 9.0, 0.5, 0.5, 9.0],
        )
    }

    #[test]
    fn test_from_csc_reads_upper_triangle() {
        let (col_ptr, row_idx, values) = csc();
        let unary = vec![0.0, 1.0, 1.0, 0.0, 0.5, 0.5];
        let problem = HostProblem::from_csc(&unary, 2, 3, &col_ptr, &row_idx, &values).unwrap();

        assert_eq!(problem.model.num_edges(), 2);
        assert_eq!(problem.model.edges()[0], PottsEdge::new(1, 0, 2.0));
        assert_eq!(problem.model.edges()[1], PottsEdge::new(2, 1, 0.5));
        assert_eq!(problem.model.unary_costs(1), &[1.0, 0.0]);
    }

    #[test]
    fn test_from_csc_validation() {
        let (col_ptr, row_idx, mut values) = csc();
        let unary = vec![0.0; 6];
        assert!(HostProblem::from_csc(&unary, 2, 3, &col_ptr[..3], &row_idx, &values).is_err());
        assert!(HostProblem::from_csc(&unary, 2, 3, &[0, 3, 2, 7], &row_idx, &values).is_err());
        let bad_rows = [0, 1, 0, 1, 2, 1, 7];
        assert!(HostProblem::from_csc(&unary, 2, 3, &col_ptr, &bad_rows, &values).is_err());
        assert!(HostProblem::from_csc(&unary[..5], 2, 3, &col_ptr, &row_idx, &values).is_err());
        values[2] = -1.0;
        assert!(matches!(
            HostProblem::from_csc(&unary, 2, 3, &col_ptr, &row_idx, &values),
            Err(EnergyError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_host_labels_are_one_based() {
        let mut labeling = Labeling::new(3);
        labeling.certify(0, 1).unwrap();
        labeling.assign_tentative(2, 0).unwrap();
        assert_eq!(host_labels(&labeling), vec![2.0, 0.0, 1.0]);
    }
}
