//! Option contract definitions
//!
//! Vanilla European options identified by an integer id within a portfolio.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Option side (Call or Put)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionSide {
    Call,
    Put,
}

impl OptionSide {
    /// Intrinsic value at given spot
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionSide::Call => (spot - strike).max(0.0),
            OptionSide::Put => (strike - spot).max(0.0),
        }
    }
}

impl fmt::Display for OptionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionSide::Call => write!(f, "CALL"),
            OptionSide::Put => write!(f, "PUT"),
        }
    }
}

/// Option contract specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    /// Identifier, unique within the owning portfolio
    pub id: i64,
    /// Underlying symbol (e.g., "CL")
    pub symbol: String,
    /// Listing exchange (e.g., "NYMEX")
    pub exchange: String,
    /// Expiration date
    pub expiry: NaiveDate,
    /// Strike price
    pub strike: f64,
    /// Call or put
    pub side: OptionSide,
}

impl OptionContract {
    pub fn new(
        id: i64,
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        expiry: NaiveDate,
        strike: f64,
        side: OptionSide,
    ) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            exchange: exchange.into(),
            expiry,
            strike,
            side,
        }
    }

    /// Time to expiry in years from given date (ACT/365.25)
    pub fn time_to_expiry(&self, from: NaiveDate) -> f64 {
        let days = (self.expiry - from).num_days();
        days as f64 / 365.25
    }
}

impl fmt::Display for OptionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} ({})",
            self.symbol,
            self.expiry.format("%Y%m%d"),
            self.strike,
            self.side,
            self.exchange
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_side() {
        assert_eq!(OptionSide::Call.intrinsic(110.0, 100.0), 10.0);
        assert_eq!(OptionSide::Put.intrinsic(90.0, 100.0), 10.0);
        assert_eq!(OptionSide::Call.intrinsic(90.0, 100.0), 0.0);

        assert_eq!(OptionSide::Call.to_string(), "CALL");
        assert_eq!(OptionSide::Put.to_string(), "PUT");
    }

    #[test]
    fn test_time_to_expiry() {
        let expiry = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();

        let opt = OptionContract::new(0, "CL", "NYMEX", expiry, 50.0, OptionSide::Call);
        let tte = opt.time_to_expiry(today);

        // ~5 months = ~0.41 years
        assert!(tte > 0.4 && tte < 0.42);
        // Expired contracts give non-positive time
        assert!(opt.time_to_expiry(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()) < 0.0);
    }
}
