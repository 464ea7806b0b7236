//! Effect-size estimation between groups.

pub mod bootstrap;

pub use bootstrap::{
    bootstrap_log_ratio, percentile, strata_from_table, BootstrapConfig, BootstrapSummary,
    Stratum, StratumEffect,
};
