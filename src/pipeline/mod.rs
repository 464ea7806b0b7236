//! Pipeline composition and execution for compositional analysis.

mod runner;

pub use runner::{
    resolve_contrast, run_bootstrap, run_diagnostics, run_manova, AnalysisConfig, Contrast,
    Pipeline,
};
