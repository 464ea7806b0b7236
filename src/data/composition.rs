//! Compositions: the layer proportions of one (Species, Cortex) group.

use crate::data::{Dataset, Factor};
use crate::error::{CodaError, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The parts of one (Species, Cortex) group, ordered by layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionGroup {
    pub species: String,
    pub cortex: String,
    /// One proportion per layer, in the table's part order.
    pub parts: Vec<f64>,
}

impl CompositionGroup {
    pub fn new(species: impl Into<String>, cortex: impl Into<String>, parts: Vec<f64>) -> Self {
        Self {
            species: species.into(),
            cortex: cortex.into(),
            parts,
        }
    }

    /// Identifier used in messages and logs.
    pub fn key(&self) -> String {
        format!("{}/{}", self.species, self.cortex)
    }

    /// Group-level label for a factor. Layer is a part, not a group label.
    pub fn label(&self, factor: Factor) -> Option<&str> {
        match factor {
            Factor::Species => Some(&self.species),
            Factor::Cortex => Some(&self.cortex),
            Factor::Layer => None,
        }
    }

    /// Number of exactly-zero parts.
    pub fn n_zeros(&self) -> usize {
        self.parts.iter().filter(|&&p| p == 0.0).count()
    }
}

/// All compositions of a dataset, sharing one ordered set of part labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionTable {
    part_labels: Vec<String>,
    groups: Vec<CompositionGroup>,
}

impl CompositionTable {
    /// Create a table, checking every group has one value per part.
    pub fn new(part_labels: Vec<String>, groups: Vec<CompositionGroup>) -> Result<Self> {
        if groups.is_empty() {
            return Err(CodaError::EmptyData("No composition groups".to_string()));
        }
        for group in &groups {
            if group.parts.len() != part_labels.len() {
                return Err(CodaError::DimensionMismatch {
                    expected: part_labels.len(),
                    actual: group.parts.len(),
                });
            }
        }
        Ok(Self {
            part_labels,
            groups,
        })
    }

    /// Group a dataset by (Species, Cortex), ordering parts by sorted layer.
    ///
    /// Every group must contain exactly one row for every layer level seen
    /// anywhere in the dataset.
    pub fn from_dataset(data: &Dataset) -> Result<Self> {
        let layers = data.levels(Factor::Layer);
        let layer_index: BTreeMap<&str, usize> = layers
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        let mut grouped: BTreeMap<(String, String), Vec<Option<f64>>> = BTreeMap::new();
        for obs in data.observations() {
            let slots = grouped
                .entry((obs.species.clone(), obs.cortex.clone()))
                .or_insert_with(|| vec![None; layers.len()]);
            let idx = layer_index[obs.layer.as_str()];
            if slots[idx].is_some() {
                return Err(CodaError::InvalidParameter(format!(
                    "duplicate row for {}/{} layer {}",
                    obs.species, obs.cortex, obs.layer
                )));
            }
            slots[idx] = Some(obs.prop);
        }

        let mut groups = Vec::with_capacity(grouped.len());
        for ((species, cortex), slots) in grouped {
            let mut parts = Vec::with_capacity(slots.len());
            for (idx, slot) in slots.into_iter().enumerate() {
                let value = slot.ok_or_else(|| {
                    CodaError::InvalidParameter(format!(
                        "{}/{} has no row for layer {}",
                        species, cortex, layers[idx]
                    ))
                })?;
                parts.push(value);
            }
            groups.push(CompositionGroup::new(species, cortex, parts));
        }

        tracing::debug!(
            groups = groups.len(),
            parts = layers.len(),
            "built composition table"
        );
        Self::new(layers, groups)
    }

    pub fn part_labels(&self) -> &[String] {
        &self.part_labels
    }

    pub fn groups(&self) -> &[CompositionGroup] {
        &self.groups
    }

    /// Number of groups (rows).
    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    /// Number of parts per composition.
    pub fn n_parts(&self) -> usize {
        self.part_labels.len()
    }

    /// Exactly-zero parts across every group.
    pub fn n_zeros(&self) -> usize {
        self.groups.iter().map(|g| g.n_zeros()).sum()
    }

    /// Group labels for a factor, one per row.
    pub fn labels(&self, factor: Factor) -> Result<Vec<String>> {
        self.groups
            .iter()
            .map(|g| {
                g.label(factor).map(str::to_string).ok_or_else(|| {
                    CodaError::InvalidParameter(format!(
                        "{} varies within a composition and cannot label groups",
                        factor
                    ))
                })
            })
            .collect()
    }

    /// Parts as a dense matrix (groups × parts).
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n_groups(), self.n_parts(), |i, j| {
            self.groups[i].parts[j]
        })
    }

    /// Apply a fallible transformation to every group's parts.
    pub fn try_map_parts<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&CompositionGroup) -> Result<Vec<f64>>,
    {
        let groups = self
            .groups
            .iter()
            .map(|g| Ok(CompositionGroup::new(g.species.clone(), g.cortex.clone(), f(g)?)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(self.part_labels.clone(), groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Observation;

    fn dataset() -> Dataset {
        Dataset::new(vec![
            Observation::new("mouse", "V1", "L4", 0.3),
            Observation::new("mouse", "V1", "L2", 0.7),
            Observation::new("human", "V1", "L2", 0.4),
            Observation::new("human", "V1", "L4", 0.6),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_dataset_orders_groups_and_parts() {
        let table = CompositionTable::from_dataset(&dataset()).unwrap();
        assert_eq!(table.part_labels(), &["L2".to_string(), "L4".to_string()]);
        assert_eq!(table.n_groups(), 2);
        assert_eq!(table.groups()[0].species, "human");
        assert_eq!(table.groups()[1].parts, vec![0.7, 0.3]);
        assert_eq!(table.labels(Factor::Species).unwrap(), vec!["human", "mouse"]);
    }

    #[test]
    fn test_missing_layer() {
        let data = Dataset::new(vec![
            Observation::new("human", "V1", "L2", 0.4),
            Observation::new("human", "V1", "L4", 0.6),
            Observation::new("mouse", "V1", "L2", 1.0),
        ])
        .unwrap();
        assert!(matches!(
            CompositionTable::from_dataset(&data),
            Err(CodaError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_duplicate_layer() {
        let data = Dataset::new(vec![
            Observation::new("human", "V1", "L2", 0.4),
            Observation::new("human", "V1", "L2", 0.6),
        ])
        .unwrap();
        assert!(CompositionTable::from_dataset(&data).is_err());
    }

    #[test]
    fn test_layer_is_not_a_group_label() {
        let table = CompositionTable::from_dataset(&dataset()).unwrap();
        assert!(table.labels(Factor::Layer).is_err());
    }

    #[test]
    fn test_n_zeros() {
        let table = CompositionTable::new(
            vec!["L2".into(), "L4".into(), "L5".into()],
            vec![
                CompositionGroup::new("human", "V1", vec![0.0, 0.4, 0.6]),
                CompositionGroup::new("mouse", "V1", vec![0.0, 0.0, 1.0]),
            ],
        )
        .unwrap();
        assert_eq!(table.groups()[1].n_zeros(), 2);
        assert_eq!(table.n_zeros(), 3);
        assert_eq!(CompositionTable::from_dataset(&dataset()).unwrap().n_zeros(), 0);
    }

    #[test]
    fn test_to_matrix() {
        let table = CompositionTable::from_dataset(&dataset()).unwrap();
        let m = table.to_matrix();
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m[(0, 1)], 0.6);
    }
}
