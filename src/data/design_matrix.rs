//! Design matrix construction for a single categorical factor.

use crate::error::{CodaError, Result};
use nalgebra::DMatrix;
use std::collections::BTreeSet;

/// A design matrix for linear modeling.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// The design matrix (rows × coefficients).
    matrix: DMatrix<f64>,
    /// Names of the coefficients (columns).
    coefficient_names: Vec<String>,
    /// Factor levels, sorted; the first is the reference level.
    levels: Vec<String>,
}

impl DesignMatrix {
    /// Create a design matrix directly from components.
    pub fn from_matrix(matrix: DMatrix<f64>, coefficient_names: Vec<String>) -> Self {
        Self {
            matrix,
            coefficient_names,
            levels: Vec::new(),
        }
    }

    /// Intercept-only design (the null model of a one-way layout).
    pub fn intercept_only(n_rows: usize) -> Self {
        Self::from_matrix(
            DMatrix::from_element(n_rows, 1, 1.0),
            vec!["(Intercept)".to_string()],
        )
    }

    /// Dummy-coded design for a categorical factor with an intercept.
    ///
    /// The reference level is the alphabetically first level; every other
    /// level gets an indicator column named `group<level>`.
    pub fn from_labels(labels: &[String]) -> Result<Self> {
        if labels.is_empty() {
            return Err(CodaError::EmptyData(
                "Cannot build a design matrix without rows".to_string(),
            ));
        }

        let levels: Vec<String> = labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let n_rows = labels.len();
        let n_coef = levels.len();
        let mut matrix = DMatrix::zeros(n_rows, n_coef);
        let mut coefficient_names = vec!["(Intercept)".to_string()];

        for row in 0..n_rows {
            matrix[(row, 0)] = 1.0;
        }
        for (col, level) in levels.iter().enumerate().skip(1) {
            coefficient_names.push(format!("group{}", level));
            for (row, label) in labels.iter().enumerate() {
                if label == level {
                    matrix[(row, col)] = 1.0;
                }
            }
        }

        Ok(Self {
            matrix,
            coefficient_names,
            levels,
        })
    }

    /// Get the underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Get coefficient names.
    pub fn coefficient_names(&self) -> &[String] {
        &self.coefficient_names
    }

    /// Factor levels (empty for designs built from a raw matrix).
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Reference level of the factor, if any.
    pub fn reference_level(&self) -> Option<&str> {
        self.levels.first().map(String::as_str)
    }

    /// Number of rows.
    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of coefficients.
    pub fn n_coefficients(&self) -> usize {
        self.matrix.ncols()
    }

    /// Residual degrees of freedom (n - p).
    pub fn df_residual(&self) -> usize {
        self.n_samples().saturating_sub(self.n_coefficients())
    }

    /// (X'X)^-1, or `RankDeficientDesign` if X'X is singular.
    pub fn xtx_inverse(&self) -> Result<DMatrix<f64>> {
        let x = &self.matrix;
        (x.transpose() * x).try_inverse().ok_or_else(|| {
            CodaError::RankDeficientDesign(
                "design matrix is singular (X'X not invertible)".to_string(),
            )
        })
    }
}
