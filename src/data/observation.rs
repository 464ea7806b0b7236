//! Typed input rows and the dataset they form.

use crate::error::{CodaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Column names the loader requires in the input header.
pub const REQUIRED_COLUMNS: [&str; 4] = ["Species", "Cortex", "Layer", "Prop_Ctx"];

/// A categorical field of an [`Observation`].
///
/// Grouping is chosen from this enum when a pipeline is configured, rather
/// than by looking columns up by name at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Species,
    Cortex,
    Layer,
}

impl Factor {
    /// Column name of this factor in the input table.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Species => "Species",
            Self::Cortex => "Cortex",
            Self::Layer => "Layer",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// One input row: a (Species, Cortex, Layer) key and the layer's share of
/// the cortex population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(rename = "Species")]
    pub species: String,
    #[serde(rename = "Cortex")]
    pub cortex: String,
    #[serde(rename = "Layer")]
    pub layer: String,
    #[serde(rename = "Prop_Ctx")]
    pub prop: f64,
}

impl Observation {
    pub fn new(
        species: impl Into<String>,
        cortex: impl Into<String>,
        layer: impl Into<String>,
        prop: f64,
    ) -> Self {
        Self {
            species: species.into(),
            cortex: cortex.into(),
            layer: layer.into(),
            prop,
        }
    }

    /// Value of a categorical field.
    pub fn label(&self, factor: Factor) -> &str {
        match factor {
            Factor::Species => &self.species,
            Factor::Cortex => &self.cortex,
            Factor::Layer => &self.layer,
        }
    }
}

/// An ordered, validated collection of observations.
#[derive(Debug, Clone)]
pub struct Dataset {
    observations: Vec<Observation>,
}

impl Dataset {
    /// Build a dataset from in-memory rows.
    ///
    /// Proportions must be finite and lie in `[0, 1]`.
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        if observations.is_empty() {
            return Err(CodaError::EmptyData("Dataset has no rows".to_string()));
        }

        for (row, obs) in observations.iter().enumerate() {
            if !obs.prop.is_finite() || obs.prop < 0.0 || obs.prop > 1.0 {
                return Err(CodaError::InvalidComposition(format!(
                    "proportion {} at row {} ({}/{}/{}) is outside [0, 1]",
                    obs.prop, row, obs.species, obs.cortex, obs.layer
                )));
            }
        }

        Ok(Self { observations })
    }

    /// Load a delimited text table with a header row.
    ///
    /// The header must contain `Species`, `Cortex`, `Layer` and `Prop_Ctx`;
    /// any other columns are ignored.
    pub fn from_delimited<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        for required in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == required) {
                return Err(CodaError::MissingColumn(required.to_string()));
            }
        }

        let mut observations = Vec::new();
        for record in reader.deserialize() {
            let obs: Observation = record?;
            observations.push(obs);
        }

        tracing::debug!(rows = observations.len(), "loaded observations");
        Self::new(observations)
    }

    /// Load a tab-separated table.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b'\t')
    }

    /// Load a comma-separated table.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b',')
    }

    /// Load a table, choosing the delimiter from the file extension
    /// (`.csv` is comma-separated, anything else tab-separated).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let is_csv = path
            .as_ref()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            Self::from_csv(path)
        } else {
            Self::from_tsv(path)
        }
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Distinct levels of a factor, sorted lexicographically.
    pub fn levels(&self, factor: Factor) -> Vec<String> {
        self.observations
            .iter()
            .map(|o| o.label(factor).to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Rows whose factor equals `level`, or `None` if no row matches.
    pub fn subset(&self, factor: Factor, level: &str) -> Option<Dataset> {
        let observations: Vec<Observation> = self
            .observations
            .iter()
            .filter(|o| o.label(factor) == level)
            .cloned()
            .collect();
        if observations.is_empty() {
            None
        } else {
            Some(Dataset { observations })
        }
    }
}
