//! Bootstrap log-ratio effect sizes between two groups, per stratum.
//!
//! For each stratum (a cortical layer, typically) the statistic is
//!
//! ```text
//! ln( geometric_mean(A) / geometric_mean(B) ) = mean(ln A) - mean(ln B)
//! ```
//!
//! computed on resamples drawn with replacement from the stratum's rows.
//! The point estimate is the mean of the resampled statistics and the
//! interval is their empirical [α/2, 1-α/2] percentile range.
//!
//! # Missing resamples
//!
//! A resample that contains no row for one of the two labels has no
//! geometric mean for that label and is dropped. Drops are counted per
//! stratum; a stratum where every resample was dropped reports NaN for its
//! estimate and bounds while the other strata are unaffected.

use crate::data::{CompositionTable, Factor};
use crate::error::{CodaError, Result};
use crate::normalize::clr::check_positive;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Configuration for bootstrap estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Number of resamples per stratum.
    pub n_resamples: usize,
    /// Confidence level of the percentile interval.
    pub confidence: f64,
    /// Random seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
    /// Whether to run strata in parallel.
    pub parallel: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_resamples: 5000,
            confidence: 0.95,
            seed: None,
            parallel: true,
        }
    }
}

impl BootstrapConfig {
    /// Create a quick configuration for testing (fewer resamples).
    pub fn quick() -> Self {
        Self {
            n_resamples: 500,
            ..Default::default()
        }
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_resamples == 0 {
            return Err(CodaError::InvalidParameter(
                "n_resamples must be at least 1".to_string(),
            ));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(CodaError::InvalidParameter(format!(
                "confidence must lie in (0, 1), got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Rows of one stratum: a proportion and a group label each.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stratum {
    pub name: String,
    pub values: Vec<f64>,
    pub labels: Vec<String>,
}

impl Stratum {
    pub fn new(name: impl Into<String>, values: Vec<f64>, labels: Vec<String>) -> Result<Self> {
        if values.len() != labels.len() {
            return Err(CodaError::DimensionMismatch {
                expected: values.len(),
                actual: labels.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            values,
            labels,
        })
    }

    /// Number of rows carrying `label`.
    pub fn count(&self, label: &str) -> usize {
        self.labels.iter().filter(|l| l.as_str() == label).count()
    }
}

/// Bootstrap result for one stratum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratumEffect {
    /// Stratum name.
    pub stratum: String,
    /// Mean of the resampled log-ratios (NaN if none were valid).
    pub estimate: f64,
    /// Lower percentile bound.
    pub lower: f64,
    /// Upper percentile bound.
    pub upper: f64,
    /// Log-ratio on the original rows.
    pub observed: f64,
    /// Resamples that produced a statistic.
    pub n_valid: usize,
    /// Resamples dropped for lacking one of the labels.
    pub n_dropped: usize,
    /// Rows labelled A in the original stratum.
    pub n_a: usize,
    /// Rows labelled B in the original stratum.
    pub n_b: usize,
}

impl StratumEffect {
    /// Whether the stratum produced no valid resample.
    pub fn is_missing(&self) -> bool {
        self.n_valid == 0
    }

    /// Whether the interval excludes zero.
    pub fn excludes_zero(&self) -> bool {
        !self.is_missing() && (self.lower > 0.0 || self.upper < 0.0)
    }

    /// Ratio of geometric means, exp(estimate).
    pub fn fold_change(&self) -> f64 {
        self.estimate.exp()
    }
}

/// Bootstrap results across strata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapSummary {
    /// Numerator label.
    pub label_a: String,
    /// Denominator label.
    pub label_b: String,
    pub confidence: f64,
    pub n_resamples: usize,
    /// Seed used, if any.
    pub seed: Option<u64>,
    /// One entry per stratum, in input order.
    pub effects: Vec<StratumEffect>,
}

impl BootstrapSummary {
    /// Number of strata.
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Get the result for a stratum.
    pub fn get(&self, stratum: &str) -> Option<&StratumEffect> {
        self.effects.iter().find(|e| e.stratum == stratum)
    }

    /// Write results to TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "stratum\testimate\tlower\tupper\tobserved\tn_valid\tn_dropped"
        )?;
        for e in &self.effects {
            writeln!(
                writer,
                "{}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{}\t{}",
                e.stratum, e.estimate, e.lower, e.upper, e.observed, e.n_valid, e.n_dropped
            )?;
        }

        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for BootstrapSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ln({} / {}) by stratum, {} resamples, {:.0}% CI",
            self.label_a,
            self.label_b,
            self.n_resamples,
            self.confidence * 100.0
        )?;
        for e in &self.effects {
            if e.is_missing() {
                writeln!(f, "  {:<12} missing", e.stratum)?;
            } else {
                writeln!(
                    f,
                    "  {:<12} {:>8.4}  [{:.4}, {:.4}]{}",
                    e.stratum,
                    e.estimate,
                    e.lower,
                    e.upper,
                    if e.excludes_zero() { " *" } else { "" }
                )?;
            }
        }
        Ok(())
    }
}

/// Percentile of sorted data with linear interpolation between ranks.
///
/// `q` is in [0, 100]; returns NaN for empty input.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Mean and percentile interval of bootstrap statistics.
fn summarize(mut stats: Vec<f64>, confidence: f64) -> (f64, f64, f64) {
    if stats.is_empty() {
        return (f64::NAN, f64::NAN, f64::NAN);
    }
    let mean = stats.iter().sum::<f64>() / stats.len() as f64;
    stats.sort_by(|a, b| a.total_cmp(b));
    let alpha = 1.0 - confidence;
    (
        mean,
        percentile(&stats, 100.0 * alpha / 2.0),
        percentile(&stats, 100.0 * (1.0 - alpha / 2.0)),
    )
}

/// Row indices and log-values of the two labels in one stratum.
struct PreparedStratum<'a> {
    name: &'a str,
    log_values: Vec<f64>,
    /// true for label A, false for label B.
    is_a: Vec<bool>,
    n_a: usize,
    n_b: usize,
}

fn prepare<'a>(stratum: &'a Stratum, label_a: &str, label_b: &str) -> Result<PreparedStratum<'a>> {
    let mut log_values = Vec::new();
    let mut is_a = Vec::new();
    for (value, label) in stratum.values.iter().zip(&stratum.labels) {
        let a = label == label_a;
        if a || label == label_b {
            check_positive(&[*value]).map_err(|_| {
                CodaError::InvalidComposition(format!(
                    "stratum '{}' has non-positive proportion {}; zero-adjust first",
                    stratum.name, value
                ))
            })?;
            log_values.push(value.ln());
            is_a.push(a);
        }
    }

    let n_a = is_a.iter().filter(|&&a| a).count();
    let n_b = is_a.len() - n_a;
    for (label, count) in [(label_a, n_a), (label_b, n_b)] {
        if count == 0 {
            return Err(CodaError::MissingStratumLabel {
                stratum: stratum.name.clone(),
                label: label.to_string(),
            });
        }
    }

    Ok(PreparedStratum {
        name: &stratum.name,
        log_values,
        is_a,
        n_a,
        n_b,
    })
}

/// Mean log of each label over the selected rows; `None` if a label is absent.
fn log_ratio(prepared: &PreparedStratum, rows: impl Iterator<Item = usize>) -> Option<f64> {
    let (mut sum_a, mut n_a, mut sum_b, mut n_b) = (0.0, 0usize, 0.0, 0usize);
    for i in rows {
        if prepared.is_a[i] {
            sum_a += prepared.log_values[i];
            n_a += 1;
        } else {
            sum_b += prepared.log_values[i];
            n_b += 1;
        }
    }
    if n_a == 0 || n_b == 0 {
        None
    } else {
        Some(sum_a / n_a as f64 - sum_b / n_b as f64)
    }
}

fn bootstrap_stratum<R: Rng>(
    prepared: &PreparedStratum,
    config: &BootstrapConfig,
    rng: &mut R,
) -> StratumEffect {
    let n = prepared.log_values.len();
    let mut stats = Vec::with_capacity(config.n_resamples);
    let mut n_dropped = 0;

    for _ in 0..config.n_resamples {
        let draw: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
        match log_ratio(prepared, draw.into_iter()) {
            Some(stat) => stats.push(stat),
            None => n_dropped += 1,
        }
    }

    let n_valid = stats.len();
    if n_dropped * 10 > config.n_resamples {
        tracing::warn!(
            stratum = prepared.name,
            dropped = n_dropped,
            resamples = config.n_resamples,
            "many resamples lacked one label"
        );
    }

    let (estimate, lower, upper) = summarize(stats, config.confidence);
    let observed = log_ratio(prepared, 0..n).unwrap_or(f64::NAN);

    StratumEffect {
        stratum: prepared.name.to_string(),
        estimate,
        lower,
        upper,
        observed,
        n_valid,
        n_dropped,
        n_a: prepared.n_a,
        n_b: prepared.n_b,
    }
}

fn stratum_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s.wrapping_add(index as u64)),
        None => StdRng::from_entropy(),
    }
}

/// Bootstrap the log-ratio of geometric means between two labels in every stratum.
///
/// Rows carrying neither label are ignored. With a seed, stratum `i` uses
/// its own generator seeded with `seed + i`, so serial and parallel runs
/// give identical results.
///
/// # Errors
/// - `MissingStratumLabel` if a stratum has no rows for either label.
/// - `InvalidComposition` for non-positive proportions.
/// - `InvalidParameter` for an invalid configuration or identical labels.
pub fn bootstrap_log_ratio(
    strata: &[Stratum],
    label_a: &str,
    label_b: &str,
    config: &BootstrapConfig,
) -> Result<BootstrapSummary> {
    config.validate()?;
    if label_a == label_b {
        return Err(CodaError::InvalidParameter(format!(
            "contrast labels must differ, both are '{}'",
            label_a
        )));
    }
    if strata.is_empty() {
        return Err(CodaError::EmptyData("No strata to bootstrap".to_string()));
    }

    let prepared = strata
        .iter()
        .map(|s| prepare(s, label_a, label_b))
        .collect::<Result<Vec<_>>>()?;

    let effects: Vec<StratumEffect> = if config.parallel {
        prepared
            .par_iter()
            .enumerate()
            .map(|(i, p)| bootstrap_stratum(p, config, &mut stratum_rng(config.seed, i)))
            .collect()
    } else {
        prepared
            .iter()
            .enumerate()
            .map(|(i, p)| bootstrap_stratum(p, config, &mut stratum_rng(config.seed, i)))
            .collect()
    };

    tracing::debug!(
        strata = effects.len(),
        resamples = config.n_resamples,
        "bootstrapped log-ratios"
    );

    Ok(BootstrapSummary {
        label_a: label_a.to_string(),
        label_b: label_b.to_string(),
        confidence: config.confidence,
        n_resamples: config.n_resamples,
        seed: config.seed,
        effects,
    })
}

/// One stratum per part (layer) of a composition table, labelled by a
/// group-level factor.
pub fn strata_from_table(table: &CompositionTable, label_factor: Factor) -> Result<Vec<Stratum>> {
    let labels = table.labels(label_factor)?;
    table
        .part_labels()
        .iter()
        .enumerate()
        .map(|(j, part)| {
            let values = table.groups().iter().map(|g| g.parts[j]).collect();
            Stratum::new(part.clone(), values, labels.clone())
        })
        .collect()
}
