//! Core data types for sigma options
//!
//! Defines fundamental types:
//! - OptionContract: Strike, expiry, side (call/put)
//! - MarketQuote / MarketTick: Market state and its updates
//! - Greeks: Price and sensitivities
//! - Portfolio: Option grid on one underlying with positions

pub mod error;
pub mod greeks;
pub mod option;
pub mod portfolio;
pub mod quote;

pub use error::*;
pub use greeks::*;
pub use option::*;
pub use portfolio::*;
pub use quote::*;
