//! Configuration for the hedge optimiser

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{SigmaError, SigmaResult};

/// What the hedge optimises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HedgeObjective {
    /// Minimise net gamma
    MinimiseGamma,
    /// Maximise net theta (time decay collected)
    MaximiseTheta,
}

/// Whether target positions are bought or sold
///
/// Selling negates every Greek coefficient; quantities come back negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn sign(&self) -> f64 {
        match self {
            TradeDirection::Buy => 1.0,
            TradeDirection::Sell => -1.0,
        }
    }
}

/// Limits and objective for one hedge solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgePolicy {
    /// Net delta must stay within ±delta_limit
    /// Default: Some(0.9)
    pub delta_limit: Option<f64>,

    /// Floor on net theta, per calendar day
    /// Default: Some(-0.2)
    pub theta_floor_per_day: Option<f64>,

    /// Cap on net gamma
    /// Default: None
    pub gamma_ceiling: Option<f64>,

    /// Cap on the total quantity held
    /// Default: None
    pub max_open_positions: Option<u32>,

    /// The hedge must hold at least this many contracts
    /// Default: 1.0
    pub min_total_quantity: f64,

    /// Per-instrument position cap, applied on top of each instrument's own
    /// Default: 5.0
    pub max_position: f64,

    /// Integer quantities (branch-and-bound) instead of the LP relaxation
    /// Default: true
    pub solve_as_mip: bool,

    pub objective: HedgeObjective,

    pub direction: TradeDirection,
}

impl Default for HedgePolicy {
    fn default() -> Self {
        Self {
            delta_limit: Some(0.9),
            theta_floor_per_day: Some(-0.2),
            gamma_ceiling: None,
            max_open_positions: None,
            min_total_quantity: 1.0,
            max_position: 5.0,
            solve_as_mip: true,
            objective: HedgeObjective::MinimiseGamma,
            direction: TradeDirection::Buy,
        }
    }
}

impl HedgePolicy {
    /// Tight delta band, small positions
    pub fn conservative() -> Self {
        Self {
            delta_limit: Some(0.25),
            theta_floor_per_day: Some(-0.05),
            max_open_positions: Some(10),
            max_position: 2.0,
            ..Default::default()
        }
    }

    /// Sell options to collect theta, gamma kept under a ceiling
    pub fn short_premium() -> Self {
        Self {
            theta_floor_per_day: None,
            gamma_ceiling: Some(0.05),
            objective: HedgeObjective::MaximiseTheta,
            direction: TradeDirection::Sell,
            ..Default::default()
        }
    }

    /// Parse a policy from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> SigmaResult<Self> {
        let policy: Self = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Load a policy from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> SigmaResult<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading hedge policy from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject limits that cannot describe a hedge
    pub fn validate(&self) -> SigmaResult<()> {
        let finite = |v: Option<f64>| v.map_or(true, f64::is_finite);
        if !(finite(self.delta_limit)
            && finite(self.theta_floor_per_day)
            && finite(self.gamma_ceiling))
        {
            return Err(SigmaError::invalid_input("Non-finite hedge limit"));
        }
        if let Some(limit) = self.delta_limit {
            if limit < 0.0 {
                return Err(SigmaError::invalid_input(format!(
                    "Negative delta limit: {limit}"
                )));
            }
        }
        if !(self.max_position.is_finite() && self.max_position >= 0.0) {
            return Err(SigmaError::invalid_input(format!(
                "Invalid max position: {}",
                self.max_position
            )));
        }
        if !(self.min_total_quantity.is_finite() && self.min_total_quantity >= 0.0) {
            return Err(SigmaError::invalid_input(format!(
                "Invalid min total quantity: {}",
                self.min_total_quantity
            )));
        }
        Ok(())
    }
}
