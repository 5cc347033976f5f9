//! # Sigma Options - Option Analytics and Greeks Hedging
//!
//! Black-Scholes analytics, implied volatility and a Greeks-constrained hedge
//! optimiser for European options.
//!
//! ## Key Components
//!
//! - **Normal distribution**: CDF accurate deep in the tail, AS241 quantile
//! - **Rational cubic**: Shape-preserving interpolation used by the IV solver
//! - **Black-Scholes**: Price and Greeks up to third order, with dividend yield
//! - **Implied volatility**: Safeguarded Newton with an interpolated fallback
//! - **Hedge optimiser**: LP / MIP over per-instrument Greeks via `good_lp`
//! - **Portfolio**: Strike × expiry option grid tying the pipeline together
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sigma_options::prelude::*;
//!
//! let inputs = ValuationInputs::new(100.0, 100.0, 1.0, 0.2, 0.05, 0.0, OptionSide::Call);
//! let greeks = bs_greeks(inputs).unwrap();
//!
//! let solver = ImpliedVolatilitySolver::new();
//! let iv = solver
//!     .solve(greeks.price, 100.0, 100.0, 1.0, 0.05, 0.0, OptionSide::Call)
//!     .unwrap();
//!
//! let hedge = HedgeOptimizer::run(
//!     vec![HedgeInstrument::from_greeks(1, &greeks, 5.0)],
//!     &HedgePolicy::default(),
//! );
//! ```
//!
//! ## Logging
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod core;
pub mod models;
pub mod optimiser;

/// Prelude with commonly used types
pub mod prelude {
    // Core types
    pub use crate::core::{
        Greeks, GreeksSnapshot, MarketQuote, MarketTick, OptionContract, OptionSide, Portfolio,
        PortfolioEntry, SigmaError, SigmaResult, TickField,
    };

    // Models
    pub use crate::models::{
        greeks as bs_greeks, inverse_norm_cdf, norm_cdf, norm_pdf, price as bs_price,
        ImpliedVolResult, ImpliedVolatilitySolver, OptionAnalytics, RationalCubic, SolverConfig,
        ValuationInputs,
    };

    // Hedging
    pub use crate::optimiser::{
        HedgeInstrument, HedgeObjective, HedgeOptimizer, HedgePolicy, HedgeSolution,
        TargetPosition, TradeDirection,
    };
}

// Re-export main types at crate root
pub use crate::core::{SigmaError, SigmaResult};
pub use crate::models::{ImpliedVolatilitySolver, OptionAnalytics};
pub use crate::optimiser::HedgeOptimizer;
