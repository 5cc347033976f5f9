//! Market quote data
//!
//! Market state for an option or its underlying, updated tick by tick by
//! the market-data feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest market state for one instrument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    /// Reference price (last trade or close)
    pub price: Option<f64>,
    /// Bid price
    pub bid: Option<f64>,
    /// Ask price
    pub ask: Option<f64>,
    /// Last traded price
    pub last: Option<f64>,
    /// Bid size
    pub bid_size: Option<f64>,
    /// Ask size
    pub ask_size: Option<f64>,
    /// Time of the most recent update
    pub updated: Option<DateTime<Utc>>,
}

/// Field carried by a market-data tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickField {
    Bid,
    Ask,
    Last,
    Close,
    BidSize,
    AskSize,
}

/// Single market-data update `{instrument_id, field, value}`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketTick {
    pub instrument_id: i64,
    pub field: TickField,
    pub value: f64,
}

impl MarketTick {
    pub fn new(instrument_id: i64, field: TickField, value: f64) -> Self {
        Self {
            instrument_id,
            field,
            value,
        }
    }
}

impl MarketQuote {
    /// Quote with only a reference price
    pub fn with_price(price: f64) -> Self {
        Self {
            price: Some(price),
            ..Default::default()
        }
    }

    /// Apply a tick to this quote
    pub fn apply(&mut self, field: TickField, value: f64) {
        match field {
            TickField::Bid => self.bid = Some(value),
            TickField::Ask => self.ask = Some(value),
            TickField::Last => {
                self.last = Some(value);
                self.price = Some(value);
            }
            TickField::Close => self.price = Some(value),
            TickField::BidSize => self.bid_size = Some(value),
            TickField::AskSize => self.ask_size = Some(value),
        }
        self.updated = Some(Utc::now());
    }

    /// Mid price from bid/ask
    pub fn mid(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(b), Some(a)) if b > 0.0 && a >= b => Some((b + a) / 2.0),
            _ => None,
        }
    }

    /// Get the best available price (mid > price > last > bid)
    pub fn best_price(&self) -> Option<f64> {
        self.mid().or(self.price).or(self.last).or(self.bid)
    }
}
