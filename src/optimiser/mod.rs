//! Hedge optimisation
//!
//! Chooses per-instrument positions that optimise a Greek (minimum gamma or
//! maximum theta) subject to limits on the others, as an LP or MIP solved
//! through `good_lp`.

pub mod config;
pub mod model;
pub mod optimizer;

pub use config::*;
pub use model::*;
pub use optimizer::*;
