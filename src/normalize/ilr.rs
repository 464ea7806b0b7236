//! Isometric log-ratio (ILR) transformation for compositional data.
//!
//! ILR maps an m-part composition on the open simplex to m-1 unconstrained
//! real coordinates through an orthonormal contrast basis V ((m-1) × m):
//!
//! ```text
//! ilr(x)     = clr(x) · Vᵀ
//! ilr⁻¹(z)   = closure(exp(z · V))
//! ```
//!
//! The basis is the Gram-Schmidt (Helmert-type) basis: row j contrasts the
//! first j+1 parts against part j+1.

use crate::data::CompositionTable;
use crate::error::{CodaError, Result};
use crate::normalize::clr::{check_positive, clr};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Orthonormal ILR contrast basis for `n_parts` parts, shape (m-1) × m.
///
/// Row j has `sqrt((j+1)/(j+2)) / (j+1)` on parts `0..=j`,
/// `-sqrt((j+1)/(j+2))` on part `j+1` and zero elsewhere.
pub fn ilr_basis(n_parts: usize) -> Result<DMatrix<f64>> {
    if n_parts < 2 {
        return Err(CodaError::InvalidParameter(format!(
            "ILR needs at least 2 parts, got {}",
            n_parts
        )));
    }

    let mut basis = DMatrix::zeros(n_parts - 1, n_parts);
    for j in 0..n_parts - 1 {
        let k = (j + 1) as f64;
        let scale = (k / (k + 1.0)).sqrt();
        for i in 0..=j {
            basis[(j, i)] = scale / k;
        }
        basis[(j, j + 1)] = -scale;
    }
    Ok(basis)
}

/// ILR coordinates of one composition with a precomputed basis.
pub fn ilr_with_basis(x: &[f64], basis: &DMatrix<f64>) -> Result<Vec<f64>> {
    if x.len() != basis.ncols() {
        return Err(CodaError::DimensionMismatch {
            expected: basis.ncols(),
            actual: x.len(),
        });
    }
    let centered = clr(x)?;
    Ok(basis
        .row_iter()
        .map(|row| row.iter().zip(&centered).map(|(b, c)| b * c).sum::<f64>())
        .collect())
}

/// ILR coordinates of one positive composition.
///
/// Input need not be closed; any positive multiple gives the same result.
pub fn ilr(x: &[f64]) -> Result<Vec<f64>> {
    check_positive(x)?;
    let basis = ilr_basis(x.len())?;
    ilr_with_basis(x, &basis)
}

/// Invert ILR coordinates back to a closed composition of `z.len() + 1` parts.
pub fn ilr_inv(z: &[f64]) -> Result<Vec<f64>> {
    if let Some(v) = z.iter().find(|v| !v.is_finite()) {
        return Err(CodaError::Numerical(format!(
            "ILR coordinate {} is not finite",
            v
        )));
    }
    let basis = ilr_basis(z.len() + 1)?;

    let clr_values: Vec<f64> = (0..basis.ncols())
        .map(|i| z.iter().enumerate().map(|(j, zj)| zj * basis[(j, i)]).sum::<f64>())
        .collect();

    // clr values are centred, so subtracting the max only guards exp overflow
    let max = clr_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let expd: Vec<f64> = clr_values.iter().map(|c| (c - max).exp()).collect();
    let total: f64 = expd.iter().sum();
    Ok(expd.into_iter().map(|e| e / total).collect())
}

/// ILR coordinates for every composition of a table.
///
/// Serializes its labels only; the coordinates are written through
/// [`IlrTable::to_tsv`] or [`IlrTable::records`].
#[derive(Debug, Clone, Serialize)]
pub struct IlrTable {
    /// Coordinates (compositions × m-1).
    #[serde(skip)]
    pub data: DMatrix<f64>,
    /// Species of each row.
    pub species: Vec<String>,
    /// Cortex of each row.
    pub cortex: Vec<String>,
    /// Coordinate column names (`ilr1`, `ilr2`, ...).
    pub coordinate_names: Vec<String>,
    /// Part labels of the source compositions.
    pub part_labels: Vec<String>,
}

impl IlrTable {
    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of coordinates (m-1).
    pub fn n_coordinates(&self) -> usize {
        self.data.ncols()
    }

    /// Get a row as a vector.
    pub fn row(&self, index: usize) -> Vec<f64> {
        self.data.row(index).iter().cloned().collect()
    }

    /// Get a coordinate column as a vector.
    pub fn column(&self, coordinate: usize) -> Vec<f64> {
        self.data.column(coordinate).iter().cloned().collect()
    }

    /// Get reference to the underlying matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Rows as (species, cortex, coordinates) records.
    pub fn records(&self) -> Vec<IlrRecord> {
        (0..self.n_rows())
            .map(|i| IlrRecord {
                species: self.species[i].clone(),
                cortex: self.cortex[i].clone(),
                coordinates: self.row(i),
            })
            .collect()
    }

    /// Write the table as TSV: `species`, `cortex`, then one column per coordinate.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "species\tcortex")?;
        for name in &self.coordinate_names {
            write!(writer, "\t{}", name)?;
        }
        writeln!(writer)?;

        for i in 0..self.n_rows() {
            write!(writer, "{}\t{}", self.species[i], self.cortex[i])?;
            for v in self.data.row(i).iter() {
                write!(writer, "\t{:.6}", v)?;
            }
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// One row of an [`IlrTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IlrRecord {
    pub species: String,
    pub cortex: String,
    pub coordinates: Vec<f64>,
}

/// Transform every composition of a zero-adjusted table to ILR coordinates.
///
/// # Note
/// Input must have no zeros (zero-adjust first).
pub fn transform_table(table: &CompositionTable) -> Result<IlrTable> {
    let n_parts = table.n_parts();
    let basis = ilr_basis(n_parts)?;

    let rows: Vec<Vec<f64>> = table
        .groups()
        .par_iter()
        .map(|group| {
            ilr_with_basis(&group.parts, &basis).map_err(|e| match e {
                CodaError::InvalidComposition(msg) => {
                    CodaError::InvalidComposition(format!("{}: {}", group.key(), msg))
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let n_coord = n_parts - 1;
    let data = DMatrix::from_fn(rows.len(), n_coord, |i, j| rows[i][j]);

    Ok(IlrTable {
        data,
        species: table.groups().iter().map(|g| g.species.clone()).collect(),
        cortex: table.groups().iter().map(|g| g.cortex.clone()).collect(),
        coordinate_names: (1..=n_coord).map(|k| format!("ilr{}", k)).collect(),
        part_labels: table.part_labels().to_vec(),
    })
}
