//! Linear models over ILR coordinates.

pub mod lm;

pub use lm::{model_lm, residual_sscp, residualize, LmFit, LmFitSingle, ResidualMatrix};
