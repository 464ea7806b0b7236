//! Multivariate hypothesis tests on ILR coordinates.
//!
//! - **normality**: Henze-Zirkler and Mardia tests
//! - **homogeneity**: Box's M test of equal group covariances
//! - **manova**: one-way MANOVA with the four classical statistics

pub mod normality;

pub use homogeneity::{test_box_m, BoxMResult};
pub use manova::{test_manova, ManovaResult, ManovaStatistic, ManovaTest};
pub use normality::{test_henze_zirkler, test_mardia, MardiaResult, NormalityResult};
