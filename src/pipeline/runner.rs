//! Analysis configuration and the pipeline that runs it end to end.

use crate::data::{AnalysisReport, CompositionTable, Dataset, DiagnosticsReport, Factor};
use crate::effect::{bootstrap_log_ratio, strata_from_table, BootstrapConfig, BootstrapSummary};
use crate::error::{CodaError, Result};
use crate::model::residualize;
use crate::normalize::{transform_table, IlrTable};
use crate::test::{test_box_m, test_henze_zirkler, test_manova, test_mardia, ManovaResult};
use crate::zero::{adjust_table, ZeroConfig};
use serde::{Deserialize, Serialize};

/// The two labels compared by the bootstrap, as ln(A / B).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contrast {
    pub label_a: String,
    pub label_b: String,
}

/// Configuration of a full analysis, serializable to YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Name of the analysis.
    pub name: String,
    /// Zero replacement.
    pub zero: ZeroConfig,
    /// Factor removed by residualization and compared by Box's M.
    pub group_factor: Factor,
    /// Factor tested by MANOVA.
    pub manova_factor: Factor,
    /// Factor whose labels the bootstrap compares.
    pub contrast_factor: Factor,
    /// Labels to compare; `None` uses the two levels of `contrast_factor`.
    pub contrast: Option<Contrast>,
    pub bootstrap: BootstrapConfig,
    /// Significance level for the diagnostic flags.
    pub alpha: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            name: "cortex-coda".to_string(),
            zero: ZeroConfig::default(),
            group_factor: Factor::Species,
            manova_factor: Factor::Species,
            contrast_factor: Factor::Species,
            contrast: None,
            bootstrap: BootstrapConfig::default(),
            alpha: 0.05,
        }
    }
}

impl AnalysisConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(CodaError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(CodaError::from)
    }
}

/// Builder for configuring and running an analysis.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: AnalysisConfig,
}

impl Pipeline {
    /// Create a pipeline with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a config.
    pub fn from_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// The configuration this pipeline will run.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Set the analysis name.
    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    /// Set the zero-replacement constant.
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.zero.epsilon = epsilon;
        self
    }

    /// Set the factor removed before the diagnostics.
    pub fn group_by(mut self, factor: Factor) -> Self {
        self.config.group_factor = factor;
        self
    }

    /// Set the factor tested by MANOVA.
    pub fn manova_factor(mut self, factor: Factor) -> Self {
        self.config.manova_factor = factor;
        self
    }

    /// Compare `label_a` against `label_b` of `factor` in the bootstrap.
    pub fn contrast(mut self, factor: Factor, label_a: &str, label_b: &str) -> Self {
        self.config.contrast_factor = factor;
        self.config.contrast = Some(Contrast {
            label_a: label_a.to_string(),
            label_b: label_b.to_string(),
        });
        self
    }

    /// Set the number of bootstrap resamples.
    pub fn resamples(mut self, n: usize) -> Self {
        self.config.bootstrap.n_resamples = n;
        self
    }

    /// Set the bootstrap confidence level.
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.config.bootstrap.confidence = confidence;
        self
    }

    /// Seed the bootstrap.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.bootstrap.seed = Some(seed);
        self
    }

    /// Set the significance level of the diagnostic flags.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.config.alpha = alpha;
        self
    }

    /// Run every stage on a dataset.
    pub fn run(&self, data: &Dataset) -> Result<AnalysisReport> {
        let config = &self.config;

        let raw = CompositionTable::from_dataset(data)?;
        let zeros_replaced = raw.n_zeros();
        tracing::info!(
            groups = raw.n_groups(),
            parts = raw.n_parts(),
            "built compositions"
        );

        let adjusted = adjust_table(&raw, &config.zero)?;
        tracing::info!(zeros_replaced, epsilon = config.zero.epsilon, "replaced zeros");

        let ilr = transform_table(&adjusted)?;
        tracing::info!(coordinates = ilr.n_coordinates(), "ILR transformed");

        let group_labels = adjusted.labels(config.group_factor)?;
        let diagnostics = run_diagnostics(&ilr, &group_labels, config.alpha)?;
        tracing::info!(
            assumptions_hold = diagnostics.assumptions_hold(),
            skipped = diagnostics.skipped.len(),
            "residual diagnostics"
        );

        let manova = run_manova(&ilr, &adjusted.labels(config.manova_factor)?)?;
        if let Some(pillai) = manova.pillai() {
            tracing::info!(pillai = pillai.value, p_value = pillai.p_value, "MANOVA");
        }

        let contrast =
            resolve_contrast(&adjusted, config.contrast_factor, config.contrast.as_ref())?;
        let bootstrap = run_bootstrap(
            &adjusted,
            config.contrast_factor,
            &contrast,
            &config.bootstrap,
        )?;
        tracing::info!(
            strata = bootstrap.len(),
            resamples = config.bootstrap.n_resamples,
            "bootstrap"
        );

        Ok(AnalysisReport {
            name: config.name.clone(),
            n_observations: data.len(),
            n_groups: adjusted.n_groups(),
            part_labels: adjusted.part_labels().to_vec(),
            zeros_replaced,
            group_factor: config.group_factor,
            manova_factor: config.manova_factor,
            coordinate_names: ilr.coordinate_names.clone(),
            ilr: ilr.records(),
            diagnostics,
            manova,
            bootstrap,
        })
    }
}

/// Residualize ILR coordinates against `labels` and run the assumption checks.
///
/// Tests that cannot be computed for this sample are recorded as skipped;
/// any other error propagates.
pub fn run_diagnostics(
    ilr: &IlrTable,
    labels: &[String],
    alpha: f64,
) -> Result<DiagnosticsReport> {
    let residuals = residualize(ilr.matrix(), labels)?;
    let mut report = DiagnosticsReport::default();

    match test_henze_zirkler(residuals.matrix(), alpha) {
        Ok(result) => report.normality = Some(result),
        Err(e) => skip(&mut report, "Henze-Zirkler", e)?,
    }
    match test_mardia(residuals.matrix()) {
        Ok(result) => report.mardia = Some(result),
        Err(e) => skip(&mut report, "Mardia", e)?,
    }
    match test_box_m(residuals.matrix(), labels, alpha) {
        Ok(result) => report.box_m = Some(result),
        Err(e) => skip(&mut report, "Box's M", e)?,
    }

    Ok(report)
}

fn skip(report: &mut DiagnosticsReport, check: &str, error: CodaError) -> Result<()> {
    match error {
        CodaError::InsufficientSample { .. } | CodaError::Numerical(_) => {
            tracing::warn!(check, error = %error, "diagnostic skipped");
            report.skipped.push(format!("{}: {}", check, error));
            Ok(())
        }
        other => Err(other),
    }
}

/// One-way MANOVA of the ILR coordinates on `labels`.
pub fn run_manova(ilr: &IlrTable, labels: &[String]) -> Result<ManovaResult> {
    test_manova(ilr.matrix(), labels)
}

/// Pick the bootstrap labels: the configured pair, or the two levels of the
/// factor when it has exactly two.
pub fn resolve_contrast(
    table: &CompositionTable,
    factor: Factor,
    contrast: Option<&Contrast>,
) -> Result<Contrast> {
    if let Some(c) = contrast {
        return Ok(c.clone());
    }
    let mut levels = table.labels(factor)?;
    levels.sort();
    levels.dedup();
    match levels.as_slice() {
        [a, b] => Ok(Contrast {
            label_a: a.clone(),
            label_b: b.clone(),
        }),
        _ => Err(CodaError::InvalidParameter(format!(
            "{} has {} levels; set the contrast labels explicitly",
            factor,
            levels.len()
        ))),
    }
}

/// Bootstrap ln(A / B) per layer on zero-adjusted proportions.
pub fn run_bootstrap(
    table: &CompositionTable,
    factor: Factor,
    contrast: &Contrast,
    config: &BootstrapConfig,
) -> Result<BootstrapSummary> {
    let strata = strata_from_table(table, factor)?;
    bootstrap_log_ratio(&strata, &contrast.label_a, &contrast.label_b, config)
}
