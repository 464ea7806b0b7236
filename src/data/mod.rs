//! Data structures for compositional analysis.

mod composition;
mod design_matrix;
mod observation;
mod result;

pub use composition::{CompositionGroup, CompositionTable};
pub use design_matrix::DesignMatrix;
pub use observation::{Dataset, Factor, Observation, REQUIRED_COLUMNS};
pub use result::{AnalysisReport, DiagnosticsReport};
