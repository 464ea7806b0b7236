//! Result types for a full compositional analysis.

use crate::data::Factor;
use crate::effect::BootstrapSummary;
use crate::error::Result;
use crate::normalize::IlrRecord;
use crate::test::{BoxMResult, ManovaResult, MardiaResult, NormalityResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Assumption checks on residual ILR coordinates.
///
/// A test that could not be computed (too few rows, singular covariance)
/// is left empty and its reason recorded in `skipped`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub normality: Option<NormalityResult>,
    pub mardia: Option<MardiaResult>,
    pub box_m: Option<BoxMResult>,
    pub skipped: Vec<String>,
}

impl DiagnosticsReport {
    /// Whether every computed test is consistent with MANOVA assumptions.
    pub fn assumptions_hold(&self) -> bool {
        self.normality.as_ref().map_or(true, |r| r.normal)
            && self.box_m.as_ref().map_or(true, |r| r.equal_cov)
    }
}

/// Everything produced by one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Analysis name from the configuration.
    pub name: String,
    /// Input rows.
    pub n_observations: usize,
    /// Compositions (Species × Cortex groups).
    pub n_groups: usize,
    /// Layer labels, in part order.
    pub part_labels: Vec<String>,
    /// Zero entries replaced before transformation.
    pub zeros_replaced: usize,
    /// Factor used for residualization and Box's M.
    pub group_factor: Factor,
    /// Factor tested by MANOVA.
    pub manova_factor: Factor,
    pub coordinate_names: Vec<String>,
    pub ilr: Vec<IlrRecord>,
    pub diagnostics: DiagnosticsReport,
    pub manova: ManovaResult,
    pub bootstrap: BootstrapSummary,
}

impl AnalysisReport {
    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the ILR coordinates as TSV: species, cortex, ilr1..
    pub fn write_ilr_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "species\tcortex\t{}", self.coordinate_names.join("\t"))?;
        for record in &self.ilr {
            write!(writer, "{}\t{}", record.species, record.cortex)?;
            for v in &record.coordinates {
                write!(writer, "\t{:.6}", v)?;
            }
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Write the JSON report to a file.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

fn verdict(pass: bool) -> &'static str {
    if pass {
        "not rejected"
    } else {
        "rejected"
    }
}

impl fmt::Display for DiagnosticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(hz) = &self.normality {
            writeln!(
                f,
                "Henze-Zirkler: HZ = {:.4}, p = {:.4e} (normality {})",
                hz.statistic,
                hz.p_value,
                verdict(hz.normal)
            )?;
        }
        if let Some(m) = &self.mardia {
            writeln!(
                f,
                "Mardia: skewness p = {:.4e}, kurtosis p = {:.4e}",
                m.skewness_p_value, m.kurtosis_p_value
            )?;
        }
        if let Some(b) = &self.box_m {
            writeln!(
                f,
                "Box's M: M = {:.4}, chi2({}) = {:.4}, p = {:.4e} (equal covariance {})",
                b.m,
                b.df,
                b.statistic,
                b.p_value,
                verdict(b.equal_cov)
            )?;
        }
        for reason in &self.skipped {
            writeln!(f, "skipped: {}", reason)?;
        }
        Ok(())
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analysis: {}", self.name)?;
        writeln!(
            f,
            "{} observations, {} compositions of {} parts ({} zeros replaced)",
            self.n_observations,
            self.n_groups,
            self.part_labels.len(),
            self.zeros_replaced
        )?;
        writeln!(f)?;
        writeln!(f, "Residual diagnostics (grouped by {})", self.group_factor)?;
        write!(f, "{}", self.diagnostics)?;
        writeln!(f)?;
        writeln!(f, "MANOVA on {}", self.manova_factor)?;
        write!(f, "{}", self.manova)?;
        writeln!(f)?;
        write!(f, "{}", self.bootstrap)
    }
}
