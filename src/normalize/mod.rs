//! Log-ratio transforms for compositional data.
//!
//! - **CLR**: centered log-ratio, plus closure and geometric mean helpers
//! - **ILR**: isometric log-ratio with a fixed orthonormal basis, and its inverse

pub mod clr;
pub mod ilr;

pub use clr::{closure, clr, clr_matrix, geometric_mean};
pub use ilr::{ilr, ilr_basis, ilr_inv, ilr_with_basis, transform_table, IlrRecord, IlrTable};
