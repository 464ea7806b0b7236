//! Zero handling for compositions ahead of log-ratio transforms.

pub mod replacement;

pub use replacement::{adjust_composition, adjust_table, adjust_zeros, ZeroConfig};
