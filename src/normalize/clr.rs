//! Centered log-ratio (CLR) transform and related simplex helpers.

use crate::error::{CodaError, Result};
use nalgebra::DMatrix;

/// Check that every part is strictly positive and finite.
pub(crate) fn check_positive(x: &[f64]) -> Result<()> {
    if x.is_empty() {
        return Err(CodaError::EmptyData("Empty composition".to_string()));
    }
    for (i, &v) in x.iter().enumerate() {
        if !(v > 0.0 && v.is_finite()) {
            return Err(CodaError::InvalidComposition(format!(
                "log-ratio transforms require positive values; found {} at part {}",
                v, i
            )));
        }
    }
    Ok(())
}

/// Rescale a positive vector to sum to one.
pub fn closure(x: &[f64]) -> Result<Vec<f64>> {
    check_positive(x)?;
    let total: f64 = x.iter().sum();
    Ok(x.iter().map(|v| v / total).collect())
}

/// Geometric mean of positive values: exp(mean(ln x)).
pub fn geometric_mean(x: &[f64]) -> Result<f64> {
    check_positive(x)?;
    Ok(mean_log(x).exp())
}

/// Mean of natural logs. Callers guarantee positive input.
pub(crate) fn mean_log(x: &[f64]) -> f64 {
    x.iter().map(|v| v.ln()).sum::<f64>() / x.len() as f64
}

/// Apply CLR to one composition.
///
/// # Formula
/// CLR(x_i) = ln(x_i) - mean(ln(x)), i.e. ln(x_i / geometric_mean(x)).
///
/// The result sums to zero and does not change when `x` is multiplied by
/// a positive constant.
pub fn clr(x: &[f64]) -> Result<Vec<f64>> {
    check_positive(x)?;
    let log_gm = mean_log(x);
    Ok(x.iter().map(|v| v.ln() - log_gm).collect())
}

/// Apply CLR to every row of a (compositions × parts) matrix.
pub fn clr_matrix(data: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let (n_rows, n_parts) = data.shape();
    if n_rows == 0 || n_parts == 0 {
        return Err(CodaError::EmptyData(
            "Cannot apply CLR to empty matrix".to_string(),
        ));
    }

    let mut out = DMatrix::zeros(n_rows, n_parts);
    for i in 0..n_rows {
        let row: Vec<f64> = data.row(i).iter().cloned().collect();
        for (j, v) in clr(&row)?.into_iter().enumerate() {
            out[(i, j)] = v;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clr_sums_to_zero() {
        let result = clr(&[10.5, 30.5, 5.5]).unwrap();
        assert_relative_eq!(result.iter().sum::<f64>(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_clr_manual_calculation() {
        // geometric mean of (1, 4) is 2
        let result = clr(&[1.0, 4.0]).unwrap();
        assert_relative_eq!(result[0], -2.0_f64.ln(), epsilon = 1e-10);
        assert_relative_eq!(result[1], 2.0_f64.ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_geometric_mean() {
        let expected = (10.5_f64 * 30.5 * 5.5).powf(1.0 / 3.0);
        assert_relative_eq!(
            geometric_mean(&[10.5, 30.5, 5.5]).unwrap(),
            expected,
            epsilon = 1e-10
        );
    }

    #[test]
    fn test_closure() {
        let closed = closure(&[2.0, 6.0]).unwrap();
        assert_relative_eq!(closed[0], 0.25);
        assert_relative_eq!(closed[1], 0.75);
    }

    #[test]
    fn test_clr_rejects_zero_and_negative() {
        assert!(matches!(
            clr(&[1.0, 0.0]),
            Err(CodaError::InvalidComposition(_))
        ));
        assert!(clr(&[1.0, -1.0]).is_err());
        assert!(clr(&[]).is_err());
    }

    #[test]
    fn test_clr_matrix_rows() {
        let data = DMatrix::from_row_slice(2, 2, &[1.0, 4.0, 4.0, 1.0]);
        let out = clr_matrix(&data).unwrap();
        assert_relative_eq!(out[(0, 1)], 2.0_f64.ln(), epsilon = 1e-10);
        assert_relative_eq!(out[(1, 1)], -2.0_f64.ln(), epsilon = 1e-10);
    }
}
