//! Linear model fitting via OLS, applied column-wise to ILR coordinates.

use crate::data::DesignMatrix;
use crate::error::{CodaError, Result};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Results from fitting a linear model to a single coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmFitSingle {
    /// Coordinate name.
    pub coordinate: String,
    /// Estimated coefficients.
    pub coefficients: Vec<f64>,
    /// Standard errors of coefficients.
    pub std_errors: Vec<f64>,
    /// Residuals, one per row.
    #[serde(skip)]
    pub residuals: Vec<f64>,
    /// Residual standard error (sigma).
    pub sigma: f64,
    /// R-squared.
    pub r_squared: f64,
    /// Degrees of freedom (residual).
    pub df_residual: usize,
}

impl LmFitSingle {
    /// Calculate t-statistic for a coefficient.
    pub fn t_statistic(&self, index: usize) -> Option<f64> {
        let coef = self.coefficients.get(index)?;
        let se = self.std_errors.get(index)?;
        if *se > 0.0 {
            Some(coef / se)
        } else {
            None
        }
    }
}

/// Results from fitting linear models to all coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmFit {
    /// Individual fits for each coordinate.
    pub fits: Vec<LmFitSingle>,
    /// Coefficient names from the design matrix.
    pub coefficient_names: Vec<String>,
    /// Number of rows.
    pub n_samples: usize,
}

impl LmFit {
    /// Get the fit for a coordinate by name.
    pub fn get_coordinate(&self, name: &str) -> Option<&LmFitSingle> {
        self.fits.iter().find(|f| f.coordinate == name)
    }

    /// Number of coordinates.
    pub fn n_coordinates(&self) -> usize {
        self.fits.len()
    }

    /// Residuals as a (rows × coordinates) matrix.
    pub fn residual_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n_samples, self.fits.len(), |i, j| {
            self.fits[j].residuals[i]
        })
    }
}

/// Fit OLS regressions of every column of `y` against the design matrix.
///
/// # Arguments
/// * `y` - Response matrix (rows × coordinates)
/// * `coordinate_names` - One name per column of `y`
/// * `design` - Design matrix with the same number of rows
///
/// # Errors
/// `DimensionMismatch` on shape disagreement; `RankDeficientDesign` when the
/// model is saturated or X'X is singular.
pub fn model_lm(
    y: &DMatrix<f64>,
    coordinate_names: &[String],
    design: &DesignMatrix,
) -> Result<LmFit> {
    let (n_samples, n_coordinates) = y.shape();
    let n_coef = design.n_coefficients();

    if design.n_samples() != n_samples {
        return Err(CodaError::DimensionMismatch {
            expected: n_samples,
            actual: design.n_samples(),
        });
    }
    if coordinate_names.len() != n_coordinates {
        return Err(CodaError::DimensionMismatch {
            expected: n_coordinates,
            actual: coordinate_names.len(),
        });
    }

    let df_residual = design.df_residual();
    if df_residual == 0 {
        return Err(CodaError::RankDeficientDesign(format!(
            "model is saturated ({} rows, {} coefficients)",
            n_samples, n_coef
        )));
    }

    let x = design.matrix();
    let xtx_inv = design.xtx_inverse()?;

    let fits: Vec<LmFitSingle> = (0..n_coordinates)
        .into_par_iter()
        .map(|j| {
            let column: Vec<f64> = y.column(j).iter().cloned().collect();
            fit_single(&column, &coordinate_names[j], x, &xtx_inv, df_residual)
        })
        .collect();

    Ok(LmFit {
        fits,
        coefficient_names: design.coefficient_names().to_vec(),
        n_samples,
    })
}

/// Fit a single response using pre-computed (X'X)^-1.
fn fit_single(
    y: &[f64],
    coordinate: &str,
    x: &DMatrix<f64>,
    xtx_inv: &DMatrix<f64>,
    df_residual: usize,
) -> LmFitSingle {
    let y_vec = DVector::from_column_slice(y);

    // beta = (X'X)^-1 X'y
    let beta = xtx_inv * (x.transpose() * &y_vec);
    let coefficients: Vec<f64> = beta.iter().cloned().collect();

    let residuals_vec = &y_vec - x * &beta;
    let residuals: Vec<f64> = residuals_vec.iter().cloned().collect();

    let rss: f64 = residuals.iter().map(|e| e * e).sum();
    let sigma = (rss / df_residual as f64).sqrt();

    // SE = sigma * sqrt(diag((X'X)^-1))
    let std_errors: Vec<f64> = (0..coefficients.len())
        .map(|j| sigma * xtx_inv[(j, j)].sqrt())
        .collect();

    let y_mean = y.iter().sum::<f64>() / y.len() as f64;
    let tss: f64 = y.iter().map(|yi| (yi - y_mean).powi(2)).sum();
    let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };

    LmFitSingle {
        coordinate: coordinate.to_string(),
        coefficients,
        std_errors,
        residuals,
        sigma,
        r_squared,
        df_residual,
    }
}

/// Coordinates with a categorical factor's fitted group means removed.
#[derive(Debug, Clone)]
pub struct ResidualMatrix {
    /// Residuals (rows × coordinates), same row order as the input.
    pub data: DMatrix<f64>,
    /// Group label of each row.
    pub labels: Vec<String>,
}

impl ResidualMatrix {
    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of coordinates.
    pub fn n_coordinates(&self) -> usize {
        self.data.ncols()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Mean residual of each coordinate within one group.
    pub fn group_means(&self, label: &str) -> Option<Vec<f64>> {
        let rows: Vec<usize> = self
            .labels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.as_str() == label)
            .map(|(i, _)| i)
            .collect();
        if rows.is_empty() {
            return None;
        }
        Some(
            (0..self.n_coordinates())
                .map(|j| rows.iter().map(|&i| self.data[(i, j)]).sum::<f64>() / rows.len() as f64)
                .collect(),
        )
    }
}

/// Remove a categorical factor from every coordinate by OLS.
///
/// Each column is regressed on an intercept plus dummy-coded `labels`; the
/// residual (observed minus fitted) is kept. With this saturated one-way
/// design the residuals average to zero within every group.
pub fn residualize(coords: &DMatrix<f64>, labels: &[String]) -> Result<ResidualMatrix> {
    if labels.len() != coords.nrows() {
        return Err(CodaError::DimensionMismatch {
            expected: coords.nrows(),
            actual: labels.len(),
        });
    }

    let design = DesignMatrix::from_labels(labels)?;
    let names: Vec<String> = (1..=coords.ncols()).map(|k| format!("ilr{}", k)).collect();
    let fit = model_lm(coords, &names, &design)?;

    tracing::debug!(
        rows = coords.nrows(),
        groups = design.levels().len(),
        "residualized coordinates"
    );

    Ok(ResidualMatrix {
        data: fit.residual_matrix(),
        labels: labels.to_vec(),
    })
}

/// Residual sums-of-squares-and-cross-products matrix E = R'R for a design.
pub fn residual_sscp(y: &DMatrix<f64>, design: &DesignMatrix) -> Result<DMatrix<f64>> {
    if design.n_samples() != y.nrows() {
        return Err(CodaError::DimensionMismatch {
            expected: y.nrows(),
            actual: design.n_samples(),
        });
    }
    let x = design.matrix();
    let beta = design.xtx_inverse()? * (x.transpose() * y);
    let residuals = y - x * beta;
    Ok(residuals.transpose() * residuals)
}
