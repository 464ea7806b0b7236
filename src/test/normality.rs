//! Multivariate normality tests for residual coordinate vectors.
//!
//! Two tests are provided:
//!
//! - **Henze-Zirkler**: a weighted L2 distance between the empirical and the
//!   normal characteristic function, with a lognormal approximation of its
//!   null distribution.
//! - **Mardia**: multivariate skewness (chi-squared) and kurtosis (normal)
//!   statistics.
//!
//! Both only report; neither fails on non-normal data.

use crate::error::{CodaError, Result};
use crate::test::moments::{centered, covariance, rank_tolerance};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, LogNormal, Normal};

/// Result of the Henze-Zirkler test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalityResult {
    /// HZ statistic.
    pub statistic: f64,
    /// P-value from the lognormal approximation.
    pub p_value: f64,
    /// Whether normality is not rejected at `alpha`.
    pub normal: bool,
    /// Significance level used for `normal`.
    pub alpha: f64,
    /// Number of rows.
    pub n: usize,
    /// Number of dimensions.
    pub dims: usize,
}

/// Result of Mardia's skewness and kurtosis tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MardiaResult {
    /// Multivariate skewness b1,p.
    pub skewness: f64,
    /// n * b1,p / 6, chi-squared under normality.
    pub skewness_statistic: f64,
    /// Degrees of freedom p(p+1)(p+2)/6.
    pub skewness_df: f64,
    pub skewness_p_value: f64,
    /// Multivariate kurtosis b2,p.
    pub kurtosis: f64,
    /// Standardized kurtosis, standard normal under normality.
    pub kurtosis_statistic: f64,
    /// Two-sided p-value.
    pub kurtosis_p_value: f64,
}

fn check_sample(x: &DMatrix<f64>) -> Result<(usize, usize)> {
    let (n, p) = x.shape();
    if p == 0 {
        return Err(CodaError::EmptyData("No coordinates to test".to_string()));
    }
    if n < p + 1 {
        return Err(CodaError::InsufficientSample {
            group: "all".to_string(),
            rows: n,
            required: p + 1,
        });
    }
    Ok((n, p))
}

/// Biased covariance, its pseudo-inverse, and whether it has full rank.
fn inverse_covariance(x: &DMatrix<f64>) -> Result<(DMatrix<f64>, bool)> {
    let s = covariance(x, 0);
    let tol = rank_tolerance(&s);
    let full_rank = s.rank(tol) == s.ncols();
    let s_inv = s
        .pseudo_inverse(tol)
        .map_err(|e| CodaError::Numerical(format!("covariance pseudo-inverse failed: {}", e)))?;
    Ok((s_inv, full_rank))
}

/// Henze-Zirkler test of multivariate normality.
///
/// # Arguments
/// * `x` - Data (rows × dims), e.g. residual ILR coordinates
/// * `alpha` - Significance level for the `normal` flag
///
/// When the sample covariance is singular the statistic is set to `4n`,
/// which drives the p-value towards zero.
pub fn test_henze_zirkler(x: &DMatrix<f64>, alpha: f64) -> Result<NormalityResult> {
    let (n, p) = check_sample(x)?;
    let nf = n as f64;
    let pf = p as f64;

    let (s_inv, full_rank) = inverse_covariance(x)?;
    let d = centered(x);

    // Squared Mahalanobis distance of each row from the mean
    let dj: Vec<f64> = (0..n)
        .map(|j| {
            let row = d.row(j);
            (&row * &s_inv * row.transpose())[(0, 0)]
        })
        .collect();

    let b = (1.0 / 2.0_f64.sqrt())
        * ((2.0 * pf + 1.0) / 4.0).powf(1.0 / (pf + 4.0))
        * nf.powf(1.0 / (pf + 4.0));
    let b2 = b * b;

    let statistic = if full_rank {
        let mut pair_sum = 0.0;
        for j in 0..n {
            for k in 0..n {
                let diff = x.row(j) - x.row(k);
                let djk = (&diff * &s_inv * diff.transpose())[(0, 0)];
                pair_sum += (-b2 / 2.0 * djk).exp();
            }
        }
        let single_sum: f64 = dj
            .iter()
            .map(|&v| (-(b2 / (2.0 * (1.0 + b2))) * v).exp())
            .sum();

        nf * (pair_sum / (nf * nf) - 2.0 * (1.0 + b2).powf(-pf / 2.0) * single_sum / nf
            + (1.0 + 2.0 * b2).powf(-pf / 2.0))
    } else {
        nf * 4.0
    };

    // Lognormal approximation of the null distribution
    let wb = (1.0 + b2) * (1.0 + 3.0 * b2);
    let a = 1.0 + 2.0 * b2;
    let b4 = b2 * b2;
    let b8 = b4 * b4;
    let mu = 1.0 - a.powf(-pf / 2.0) * (1.0 + pf * b2 / a + pf * (pf + 2.0) * b4 / (2.0 * a * a));
    let si2 = 2.0 * (1.0 + 4.0 * b2).powf(-pf / 2.0)
        + 2.0 * a.powf(-pf)
            * (1.0 + 2.0 * pf * b4 / (a * a) + 3.0 * pf * (pf + 2.0) * b8 / (4.0 * a.powi(4)))
        - 4.0 * wb.powf(-pf / 2.0)
            * (1.0 + 3.0 * pf * b4 / (2.0 * wb) + pf * (pf + 2.0) * b8 / (2.0 * wb * wb));

    let pmu = (mu.powi(4) / (si2 + mu * mu)).sqrt().ln();
    let psi = ((si2 + mu * mu) / (mu * mu)).ln().sqrt();

    let lognormal = LogNormal::new(pmu, psi)
        .map_err(|e| CodaError::Numerical(format!("lognormal approximation: {}", e)))?;
    let p_value = if statistic > 0.0 {
        lognormal.sf(statistic)
    } else {
        1.0
    };

    Ok(NormalityResult {
        statistic,
        p_value,
        normal: p_value > alpha,
        alpha,
        n,
        dims: p,
    })
}

/// Mardia's multivariate skewness and kurtosis tests.
pub fn test_mardia(x: &DMatrix<f64>) -> Result<MardiaResult> {
    let (n, p) = check_sample(x)?;
    let nf = n as f64;
    let pf = p as f64;

    let (s_inv, _) = inverse_covariance(x)?;
    let d = centered(x);
    // G[i, j] = d_i' S^-1 d_j
    let g = &d * &s_inv * d.transpose();

    let skewness = g.iter().map(|v| v.powi(3)).sum::<f64>() / (nf * nf);
    let kurtosis = (0..n).map(|i| g[(i, i)].powi(2)).sum::<f64>() / nf;

    let skewness_statistic = nf * skewness / 6.0;
    let skewness_df = pf * (pf + 1.0) * (pf + 2.0) / 6.0;
    let chi_sq = ChiSquared::new(skewness_df)
        .map_err(|e| CodaError::Numerical(format!("chi-squared distribution: {}", e)))?;
    let skewness_p_value = chi_sq.sf(skewness_statistic.max(0.0));

    let kurtosis_statistic =
        (kurtosis - pf * (pf + 2.0)) / (8.0 * pf * (pf + 2.0) / nf).sqrt();
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| CodaError::Numerical(format!("normal distribution: {}", e)))?;
    let kurtosis_p_value = 2.0 * normal.sf(kurtosis_statistic.abs());

    Ok(MardiaResult {
        skewness,
        skewness_statistic,
        skewness_df,
        skewness_p_value,
        kurtosis,
        kurtosis_statistic,
        kurtosis_p_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Deterministic, roughly Gaussian sample via Box-Muller on an LCG.
    fn gaussian_sample(n: usize, p: usize, seed: u64) -> DMatrix<f64> {
        let mut state = seed;
        let mut uniform = || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 11) as f64 + 0.5) / (1u64 << 53) as f64
        };
        DMatrix::from_fn(n, p, |_, _| {
            let (u1, u2) = (uniform(), uniform());
            (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
        })
    }

    #[test]
    fn test_hz_reports_valid_probability() {
        let x = gaussian_sample(80, 3, 7);
        let result = test_henze_zirkler(&x, 0.05).unwrap();
        assert!(result.statistic.is_finite());
        assert!(result.statistic >= 0.0);
        assert!((0.0..=1.0).contains(&result.p_value));
        assert_eq!(result.n, 80);
        assert_eq!(result.dims, 3);
        assert_eq!(result.normal, result.p_value > 0.05);
    }

    #[test]
    fn test_hz_rejects_bimodal() {
        // Two tight clusters: far from any Gaussian
        let x = DMatrix::from_fn(60, 2, |i, j| {
            let side = if i % 2 == 0 { -3.0 } else { 3.0 };
            let jitter = ((i * 7 + j * 3) % 11) as f64 * 0.01;
            if j == 0 { side + jitter } else { jitter - side * 0.5 }
        });
        let result = test_henze_zirkler(&x, 0.05).unwrap();
        assert!(result.p_value < 0.05);
        assert!(!result.normal);
    }

    #[test]
    fn test_hz_singular_covariance() {
        // Second column is twice the first
        let x = DMatrix::from_fn(10, 2, |i, j| (i as f64) * (j as f64 + 1.0));
        let result = test_henze_zirkler(&x, 0.05).unwrap();
        assert_relative_eq!(result.statistic, 40.0);
        assert!(result.p_value < 1e-6);
    }

    #[test]
    fn test_insufficient_sample() {
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 5.0]);
        assert!(matches!(
            test_henze_zirkler(&x, 0.05),
            Err(CodaError::InsufficientSample { rows: 2, required: 3, .. })
        ));
        assert!(test_mardia(&x).is_err());
    }

    #[test]
    fn test_mardia_univariate_symmetric() {
        // Symmetric sample: skewness is exactly zero
        let x = DMatrix::from_column_slice(6, 1, &[-3.0, -2.0, -1.0, 1.0, 2.0, 3.0]);
        let result = test_mardia(&x).unwrap();
        assert_relative_eq!(result.skewness, 0.0, epsilon = 1e-12);
        assert_relative_eq!(result.skewness_df, 1.0);
        assert_relative_eq!(result.skewness_p_value, 1.0, epsilon = 1e-6);

        // Univariate b2 is m4 / m2^2
        let m2 = (9.0 + 4.0 + 1.0) * 2.0 / 6.0;
        let m4 = (81.0 + 16.0 + 1.0) * 2.0 / 6.0;
        assert_relative_eq!(result.kurtosis, m4 / (m2 * m2), epsilon = 1e-10);
        assert!((0.0..=1.0).contains(&result.kurtosis_p_value));
    }
}
