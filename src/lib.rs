//! Compositional analysis of cell-population proportions
//!
//! This library analyses the share of each cortical layer in a cell
//! population, per species and cortical region, as compositional data.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (Dataset, CompositionTable, DesignMatrix, AnalysisReport)
//! - **zero**: Sum-preserving zero replacement
//! - **normalize**: Log-ratio transforms (CLR, ILR and its inverse)
//! - **model**: Linear models and residualization
//! - **test**: Multivariate diagnostics (Henze-Zirkler, Mardia, Box's M) and MANOVA
//! - **effect**: Bootstrap log-ratio effect sizes
//! - **pipeline**: Configuration and end-to-end execution
//!
//! # Example
//!
//! ```no_run
//! use cortex_coda::prelude::*;
//!
//! let data = Dataset::from_tsv("proportions.tsv").unwrap();
//!
//! let report = Pipeline::new()
//!     .epsilon(1e-4)
//!     .group_by(Factor::Species)
//!     .manova_factor(Factor::Species)
//!     .contrast(Factor::Species, "human", "mouse")
//!     .resamples(5000)
//!     .seed(42)
//!     .run(&data)
//!     .unwrap();
//!
//! println!("{}", report);
//! ```

pub mod data;
pub mod effect;
pub mod error;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod test;
pub mod zero;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::data::{
        AnalysisReport, CompositionGroup, CompositionTable, Dataset, DesignMatrix,
        DiagnosticsReport, Factor, Observation,
    };
    pub use crate::effect::{
        bootstrap_log_ratio, strata_from_table, BootstrapConfig, BootstrapSummary, Stratum,
        StratumEffect,
    };
    pub use crate::error::{CodaError, Result};
    pub use crate::model::{model_lm, residualize, LmFit, ResidualMatrix};
    pub use crate::normalize::{clr, ilr, ilr_basis, ilr_inv, transform_table, IlrTable};
    pub use crate::pipeline::{AnalysisConfig, Contrast, Pipeline};
    pub use crate::test::{
        test_box_m, test_henze_zirkler, test_manova, test_mardia, BoxMResult, ManovaResult,
        ManovaStatistic, MardiaResult, NormalityResult,
    };
    pub use crate::zero::{adjust_table, adjust_zeros, ZeroConfig};
}
