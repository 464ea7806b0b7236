//! Sum-preserving zero replacement for closed compositions.

use crate::data::CompositionTable;
use crate::error::{CodaError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for zero replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZeroConfig {
    /// Value given to each exact zero.
    pub epsilon: f64,
    /// Allowed deviation of an input composition's sum from 1.
    pub sum_tolerance: f64,
    /// Reject compositions that do not sum to 1 within `sum_tolerance`.
    pub require_closed: bool,
}

impl Default for ZeroConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-4,
            sum_tolerance: 1e-6,
            require_closed: true,
        }
    }
}

impl ZeroConfig {
    /// Default configuration with a different epsilon.
    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            epsilon,
            ..Default::default()
        }
    }
}

/// Replace exact zeros in a composition while preserving its total.
///
/// Every zero becomes `epsilon`; every nonzero entry loses
/// `epsilon * n_zero / n_nonzero`, so the sum is unchanged and all parts
/// are strictly positive afterwards.
///
/// # Errors
/// - `DegenerateComposition` if every entry is zero.
/// - `InvalidComposition` for negative or non-finite entries, or if the
///   offset would drive a nonzero entry to zero or below.
/// - `InvalidParameter` if `epsilon` is not positive and finite.
pub fn adjust_zeros(values: &[f64], epsilon: f64) -> Result<Vec<f64>> {
    if !(epsilon > 0.0 && epsilon.is_finite()) {
        return Err(CodaError::InvalidParameter(format!(
            "zero replacement epsilon must be positive, got {}",
            epsilon
        )));
    }
    if values.is_empty() {
        return Err(CodaError::EmptyData("Empty composition".to_string()));
    }
    if let Some((idx, v)) = values
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(CodaError::InvalidComposition(format!(
            "entry {} is {}; proportions must be finite and non-negative",
            idx, v
        )));
    }

    let n_zero = values.iter().filter(|&&v| v == 0.0).count();
    let n_nonzero = values.len() - n_zero;
    if n_nonzero == 0 {
        return Err(CodaError::DegenerateComposition(format!(
            "all {} parts are zero",
            values.len()
        )));
    }
    if n_zero == 0 {
        return Ok(values.to_vec());
    }

    let offset = epsilon * n_zero as f64 / n_nonzero as f64;
    values
        .iter()
        .enumerate()
        .map(|(idx, &v)| {
            if v == 0.0 {
                Ok(epsilon)
            } else if v - offset > 0.0 {
                Ok(v - offset)
            } else {
                Err(CodaError::InvalidComposition(format!(
                    "entry {} ({}) is too small to absorb a zero-replacement offset of {}",
                    idx, v, offset
                )))
            }
        })
        .collect()
}

/// Zero-adjust a single composition under a configuration.
///
/// An all-zero composition is reported as degenerate before closure is checked.
pub fn adjust_composition(values: &[f64], config: &ZeroConfig) -> Result<Vec<f64>> {
    let adjusted = adjust_zeros(values, config.epsilon)?;
    if config.require_closed {
        let total: f64 = values.iter().sum();
        if (total - 1.0).abs() > config.sum_tolerance {
            return Err(CodaError::InvalidComposition(format!(
                "composition sums to {}, expected 1 (tolerance {})",
                total, config.sum_tolerance
            )));
        }
    }
    Ok(adjusted)
}

/// Zero-adjust every group of a composition table.
///
/// The number of replaced zeros is `table.n_zeros()`.
pub fn adjust_table(table: &CompositionTable, config: &ZeroConfig) -> Result<CompositionTable> {
    table.try_map_parts(|group| {
        adjust_composition(&group.parts, config).map_err(|e| match e {
            CodaError::DegenerateComposition(msg) => {
                CodaError::DegenerateComposition(format!("{}: {}", group.key(), msg))
            }
            CodaError::InvalidComposition(msg) => {
                CodaError::InvalidComposition(format!("{}: {}", group.key(), msg))
            }
            other => other,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CompositionGroup;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_adjust_single_zero() {
        let adjusted = adjust_zeros(&[0.5, 0.3, 0.2, 0.0], 1e-4).unwrap();

        assert_relative_eq!(adjusted[0], 0.5 - 1e-4 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(adjusted[1], 0.299967, epsilon = 1e-6);
        assert_relative_eq!(adjusted[2], 0.199967, epsilon = 1e-6);
        assert_relative_eq!(adjusted[3], 0.0001, epsilon = 1e-12);
        assert_relative_eq!(adjusted.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_no_zeros_unchanged() {
        let values = [0.1, 0.2, 0.7];
        assert_eq!(adjust_zeros(&values, 1e-4).unwrap(), values.to_vec());
    }

    #[test]
    fn test_all_zero_is_degenerate() {
        assert!(matches!(
            adjust_zeros(&[0.0, 0.0, 0.0], 1e-4),
            Err(CodaError::DegenerateComposition(_))
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(adjust_zeros(&[0.5, -0.1, 0.6], 1e-4).is_err());
        assert!(adjust_zeros(&[0.5, f64::NAN], 1e-4).is_err());
        assert!(adjust_zeros(&[0.5, 0.5], 0.0).is_err());
        assert!(adjust_zeros(&[0.5, 0.5], -1.0).is_err());
    }

    #[test]
    fn test_offset_too_large() {
        // Three zeros share an offset larger than the only nonzero part can absorb
        let result = adjust_zeros(&[1e-5, 0.0, 0.0, 0.0], 1e-4);
        assert!(matches!(result, Err(CodaError::InvalidComposition(_))));
    }

    #[test]
    fn test_require_closed() {
        let config = ZeroConfig::default();
        assert!(matches!(
            adjust_composition(&[0.5, 0.4], &config),
            Err(CodaError::InvalidComposition(_))
        ));
        assert!(matches!(
            adjust_composition(&[0.0, 0.0], &config),
            Err(CodaError::DegenerateComposition(_))
        ));

        let open = ZeroConfig {
            require_closed: false,
            ..Default::default()
        };
        assert!(adjust_composition(&[0.5, 0.4], &open).is_ok());
    }

    #[test]
    fn test_adjust_table_names_group() {
        let table = CompositionTable::new(
            vec!["L2".into(), "L4".into()],
            vec![
                CompositionGroup::new("human", "V1", vec![1.0, 0.0]),
                CompositionGroup::new("mouse", "V1", vec![0.0, 0.0]),
            ],
        )
        .unwrap();
        let config = ZeroConfig {
            require_closed: false,
            ..Default::default()
        };
        match adjust_table(&table, &config) {
            Err(CodaError::DegenerateComposition(msg)) => assert!(msg.contains("mouse/V1")),
            other => panic!("expected DegenerateComposition, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_sum_preserved(
            raw in prop::collection::vec(prop_oneof![Just(0.0), 0.01f64..1.0], 2..8)
        ) {
            prop_assume!(raw.iter().any(|&v| v > 0.0));
            let total: f64 = raw.iter().sum();
            let closed: Vec<f64> = raw.iter().map(|v| v / total).collect();

            let adjusted = adjust_zeros(&closed, 1e-4).unwrap();
            let before: f64 = closed.iter().sum();
            let after: f64 = adjusted.iter().sum();
            prop_assert!((before - after).abs() < 1e-9);
            prop_assert!(adjusted.iter().all(|&v| v > 0.0));
        }
    }
}
