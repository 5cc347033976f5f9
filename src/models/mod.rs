//! Pricing models
//!
//! - Standard normal distribution (CDF with asymptotic tail, AS241 quantile)
//! - Rational cubic interpolation (shape-preserving control parameters)
//! - Black-Scholes analytics with dividend yield and higher-order Greeks
//! - Implied volatility solver

pub mod black_scholes;
pub mod implied_vol;
pub mod normal;
pub mod rational_cubic;

pub use black_scholes::*;
pub use implied_vol::*;
pub use normal::*;
pub use rational_cubic::*;
