//! Option Greeks
//!
//! First, second and third order sensitivities for one option at one point
//! in time. Time sensitivities are per year of calendar time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Option price and sensitivities
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// Model price
    pub price: f64,
    /// Delta: dV/dS
    pub delta: f64,
    /// Gamma: d²V/dS²
    pub gamma: f64,
    /// Vega: dV/dσ (per unit vol, not per 1%)
    pub vega: f64,
    /// Theta: dV/dt
    pub theta: f64,
    /// Charm: dΔ/dt (delta decay)
    pub charm: f64,
    /// Thega: dΘ/dt
    pub thega: f64,
    /// Color: dΓ/dt
    pub color: f64,
    /// Speed: dΓ/dS
    pub speed: f64,
}

impl Greeks {
    /// Theta per calendar day
    pub fn theta_per_day(&self) -> f64 {
        self.theta / 365.0
    }

    /// Scale Greeks by a factor (e.g., position size)
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            price: self.price * factor,
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            vega: self.vega * factor,
            theta: self.theta * factor,
            charm: self.charm * factor,
            thega: self.thega * factor,
            color: self.color * factor,
            speed: self.speed * factor,
        }
    }

    /// Add two Greeks (for portfolio)
    pub fn add(&self, other: &Greeks) -> Self {
        Self {
            price: self.price + other.price,
            delta: self.delta + other.delta,
            gamma: self.gamma + other.gamma,
            vega: self.vega + other.vega,
            theta: self.theta + other.theta,
            charm: self.charm + other.charm,
            thega: self.thega + other.thega,
            color: self.color + other.color,
            speed: self.speed + other.speed,
        }
    }
}

/// Greeks record handed to a storage layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreeksSnapshot {
    pub timestamp: DateTime<Utc>,
    pub instrument_id: i64,
    pub greeks: Greeks,
}
