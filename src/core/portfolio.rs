//! Option portfolio
//!
//! A call and a put for every strike × expiry, with the market state,
//! implied volatility, Greeks and hedge position of each. Every expiry has
//! its own underlying instrument (one futures contract per month), quoted
//! separately. Drives the pipeline ticks → implied vols → Greeks → hedge.

use chrono::{DateTime, NaiveDate, Utc};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{
    Greeks, GreeksSnapshot, MarketQuote, MarketTick, OptionContract, OptionSide, SigmaError,
    SigmaResult,
};
use crate::models::{ImpliedVolatilitySolver, OptionAnalytics, ValuationInputs};
use crate::optimiser::{HedgeInstrument, HedgeSolution};

/// One option with its market and model state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub contract: OptionContract,
    /// Instrument id of the underlying for this contract's expiry
    pub underlying_id: i64,
    /// Option market state
    pub quote: MarketQuote,
    /// Underlying market state
    pub underlying: MarketQuote,
    /// Last successfully solved implied volatility
    pub implied_vol: Option<f64>,
    /// Last computed Greeks
    pub greeks: Option<Greeks>,
    /// Hedge position (negative when short)
    pub position: f64,
}

impl PortfolioEntry {
    pub fn new(contract: OptionContract, underlying_id: i64) -> Self {
        Self {
            contract,
            underlying_id,
            quote: MarketQuote::default(),
            underlying: MarketQuote::default(),
            implied_vol: None,
            greeks: None,
            position: 0.0,
        }
    }

    pub fn id(&self) -> i64 {
        self.contract.id
    }

    pub fn spot(&self) -> SigmaResult<f64> {
        self.underlying.best_price().ok_or_else(|| {
            SigmaError::invalid_input(format!(
                "No price for underlying {} of {}",
                self.underlying_id, self.contract
            ))
        })
    }

    /// Solve the implied volatility from the option's best price
    pub fn solve_implied_vol(
        &self,
        as_of: NaiveDate,
        rate: f64,
        dividend_yield: f64,
        solver: &ImpliedVolatilitySolver,
    ) -> SigmaResult<f64> {
        let price = self.quote.best_price().ok_or_else(|| {
            SigmaError::invalid_input(format!("No option price for {}", self.contract))
        })?;
        solver
            .solve(
                price,
                self.spot()?,
                self.contract.strike,
                self.contract.time_to_expiry(as_of),
                rate,
                dividend_yield,
                self.contract.side,
            )?
            .into_volatility()
    }

    /// Valuation inputs at the last implied volatility
    pub fn valuation_inputs(
        &self,
        as_of: NaiveDate,
        rate: f64,
        dividend_yield: f64,
    ) -> SigmaResult<ValuationInputs> {
        let vol = self.implied_vol.ok_or_else(|| {
            SigmaError::invalid_state(format!("No implied volatility for {}", self.contract))
        })?;
        Ok(ValuationInputs::new(
            self.spot()?,
            self.contract.strike,
            self.contract.time_to_expiry(as_of),
            vol,
            rate,
            dividend_yield,
            self.contract.side,
        ))
    }

    pub fn compute_greeks(
        &self,
        as_of: NaiveDate,
        rate: f64,
        dividend_yield: f64,
    ) -> SigmaResult<Greeks> {
        let inputs = self.valuation_inputs(as_of, rate, dividend_yield)?;
        Ok(OptionAnalytics::new(inputs)?.greeks())
    }
}

/// Options on one symbol, laid out expiry-major then strike, call before put
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    pub symbol: String,
    pub exchange: String,
    /// Underlying instrument id per expiry, parallel to `expiries`
    pub underlying_ids: Vec<i64>,
    pub strikes: Vec<f64>,
    pub expiries: Vec<NaiveDate>,
    pub rate: f64,
    pub dividend_yield: f64,
    entries: Vec<PortfolioEntry>,
}

impl Portfolio {
    /// A call and a put for every strike × expiry
    ///
    /// Expiry `j` trades against underlying `first_underlying_id + j`. Option
    /// ids continue sequentially after the last underlying id.
    #[allow(clippy::too_many_arguments)]
    pub fn from_grid(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        first_underlying_id: i64,
        strikes: Vec<f64>,
        expiries: Vec<NaiveDate>,
        rate: f64,
        dividend_yield: f64,
    ) -> SigmaResult<Self> {
        if strikes.is_empty() || expiries.is_empty() {
            return Err(SigmaError::invalid_input("Empty strike or expiry grid"));
        }
        if let Some(k) = strikes.iter().find(|k| !(k.is_finite() && **k > 0.0)) {
            return Err(SigmaError::invalid_input(format!("Invalid strike: {k}")));
        }
        if !(rate.is_finite() && dividend_yield.is_finite()) {
            return Err(SigmaError::invalid_input("Non-finite rate or dividend yield"));
        }

        let symbol = symbol.into();
        let exchange = exchange.into();
        let underlying_ids: Vec<i64> = (first_underlying_id..)
            .take(expiries.len())
            .collect();
        let mut next_id = first_underlying_id + expiries.len() as i64;
        let mut entries = Vec::with_capacity(strikes.len() * expiries.len() * 2);
        for (&expiry, &underlying_id) in expiries.iter().zip(&underlying_ids) {
            for &strike in &strikes {
                for side in [OptionSide::Call, OptionSide::Put] {
                    let contract =
                        OptionContract::new(next_id, &symbol, &exchange, expiry, strike, side);
                    entries.push(PortfolioEntry::new(contract, underlying_id));
                    next_id += 1;
                }
            }
        }
        tracing::info!(
            "Created {} options on {} ({} strikes × {} expiries)",
            entries.len(),
            symbol,
            strikes.len(),
            expiries.len()
        );

        Ok(Self {
            symbol,
            exchange,
            underlying_ids,
            strikes,
            expiries,
            rate,
            dividend_yield,
            entries,
        })
    }

    pub fn entries(&self) -> &[PortfolioEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: i64) -> Option<&PortfolioEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn entry_mut(&mut self, id: i64) -> Option<&mut PortfolioEntry> {
        self.entries.iter_mut().find(|e| e.id() == id)
    }

    /// Entry for one grid cell
    pub fn entry_at(&self, strike_idx: usize, expiry_idx: usize, side: OptionSide) -> Option<&PortfolioEntry> {
        if strike_idx >= self.strikes.len() || expiry_idx >= self.expiries.len() {
            return None;
        }
        let side_idx = match side {
            OptionSide::Call => 0,
            OptionSide::Put => 1,
        };
        self.entries
            .get((expiry_idx * self.strikes.len() + strike_idx) * 2 + side_idx)
    }

    /// Route a market-data tick; returns the number of entries updated
    ///
    /// An underlying tick reaches only the options of its own expiry.
    pub fn apply_tick(&mut self, tick: &MarketTick) -> usize {
        if self.underlying_ids.contains(&tick.instrument_id) {
            let mut updated = 0;
            for entry in self
                .entries
                .iter_mut()
                .filter(|e| e.underlying_id == tick.instrument_id)
            {
                entry.underlying.apply(tick.field, tick.value);
                updated += 1;
            }
            return updated;
        }
        match self.entry_mut(tick.instrument_id) {
            Some(entry) => {
                entry.quote.apply(tick.field, tick.value);
                1
            }
            None => {
                tracing::debug!("Ignoring tick for unknown instrument {}", tick.instrument_id);
                0
            }
        }
    }

    /// Price of the underlying for one expiry, if quoted
    pub fn spot(&self, expiry_idx: usize) -> Option<f64> {
        self.entry_at(0, expiry_idx, OptionSide::Call)
            .and_then(|e| e.underlying.best_price())
    }

    /// Solve implied volatilities; failures are isolated and returned per id
    pub fn compute_implied_vols(
        &mut self,
        as_of: NaiveDate,
        solver: &ImpliedVolatilitySolver,
    ) -> Vec<(i64, SigmaError)> {
        let (rate, div) = (self.rate, self.dividend_yield);
        let mut failures = Vec::new();
        for entry in &mut self.entries {
            match entry.solve_implied_vol(as_of, rate, div, solver) {
                Ok(vol) => entry.implied_vol = Some(vol),
                Err(e) => {
                    tracing::warn!("Implied vol failed for {}: {}", entry.contract, e);
                    entry.implied_vol = None;
                    entry.greeks = None;
                    failures.push((entry.id(), e));
                }
            }
        }
        tracing::info!(
            "Implied vols: {} solved, {} failed",
            self.entries.len() - failures.len(),
            failures.len()
        );
        failures
    }

    /// Greeks at the last implied vols; failures are isolated and returned per id
    pub fn compute_greeks(&mut self, as_of: NaiveDate) -> Vec<(i64, SigmaError)> {
        let (rate, div) = (self.rate, self.dividend_yield);
        let results: Vec<SigmaResult<Greeks>> = self
            .entries
            .iter()
            .map(|e| e.compute_greeks(as_of, rate, div))
            .collect();
        self.store_greeks(results)
    }

    /// Same as [`Portfolio::compute_greeks`], one rayon task per option
    pub fn compute_greeks_par(&mut self, as_of: NaiveDate) -> Vec<(i64, SigmaError)> {
        let (rate, div) = (self.rate, self.dividend_yield);
        let results: Vec<SigmaResult<Greeks>> = self
            .entries
            .par_iter()
            .map(|e| e.compute_greeks(as_of, rate, div))
            .collect();
        self.store_greeks(results)
    }

    fn store_greeks(&mut self, results: Vec<SigmaResult<Greeks>>) -> Vec<(i64, SigmaError)> {
        let mut failures = Vec::new();
        for (entry, result) in self.entries.iter_mut().zip(results) {
            match result {
                Ok(g) => entry.greeks = Some(g),
                Err(e) => {
                    tracing::debug!("Greeks failed for {}: {}", entry.contract, e);
                    entry.greeks = None;
                    failures.push((entry.id(), e));
                }
            }
        }
        failures
    }

    /// Optimizer input for every entry with Greeks
    pub fn hedge_instruments(&self, max_position: f64) -> Vec<HedgeInstrument> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.greeks
                    .as_ref()
                    .map(|g| HedgeInstrument::from_greeks(e.id(), g, max_position))
            })
            .collect()
    }

    /// Write target positions onto their entries
    ///
    /// All ids are checked first; on error no position changes.
    pub fn apply_solution(&mut self, solution: &HedgeSolution) -> SigmaResult<()> {
        if let Some(p) = solution.positions.iter().find(|p| self.entry(p.id).is_none()) {
            return Err(SigmaError::invalid_input(format!(
                "Solution references unknown instrument {}",
                p.id
            )));
        }
        for target in &solution.positions {
            if let Some(entry) = self.entry_mut(target.id) {
                entry.position = target.quantity;
            }
        }
        Ok(())
    }

    /// Position-weighted sum of entry Greeks
    pub fn net_greeks(&self) -> Greeks {
        self.entries
            .iter()
            .filter(|e| e.position != 0.0)
            .filter_map(|e| e.greeks.map(|g| g.scale(e.position)))
            .fold(Greeks::default(), |acc, g| acc.add(&g))
    }

    /// Implied vols on the strike × expiry grid
    ///
    /// Calls at or above the expiry's underlying price, puts below; NaN where
    /// no vol is known.
    pub fn implied_vol_grid(&self) -> Array2<f64> {
        let mut grid = Array2::from_elem((self.strikes.len(), self.expiries.len()), f64::NAN);
        for j in 0..self.expiries.len() {
            let spot = self.spot(j);
            for (i, &strike) in self.strikes.iter().enumerate() {
                let side = match spot {
                    Some(s) if strike < s => OptionSide::Put,
                    _ => OptionSide::Call,
                };
                if let Some(vol) = self.entry_at(i, j, side).and_then(|e| e.implied_vol) {
                    grid[[i, j]] = vol;
                }
            }
        }
        grid
    }

    /// Greeks records for every entry that has them
    pub fn snapshots(&self, timestamp: DateTime<Utc>) -> Vec<GreeksSnapshot> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.greeks.map(|greeks| GreeksSnapshot {
                    timestamp,
                    instrument_id: e.id(),
                    greeks,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TickField;
    use crate::optimiser::{HedgeOptimizer, HedgePolicy, TargetPosition};

    const VOL: f64 = 0.2;
    /// Underlying price per expiry (ids 100 and 101)
    const FORWARDS: [f64; 2] = [100.0, 104.0];

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn grid() -> Portfolio {
        Portfolio::from_grid(
            "CL",
            "NYMEX",
            100,
            vec![90.0, 100.0, 110.0],
            vec![
                NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            ],
            0.03,
            0.01,
        )
        .unwrap()
    }

    /// Grid with one underlying price per expiry and every option quoted at
    /// the flat-vol price against its own underlying
    fn quoted_grid() -> Portfolio {
        let mut p = grid();
        for (id, forward) in [100, 101].into_iter().zip(FORWARDS) {
            p.apply_tick(&MarketTick::new(id, TickField::Last, forward));
        }

        let ticks: Vec<MarketTick> = p
            .entries()
            .iter()
            .map(|e| {
                let inputs = ValuationInputs::new(
                    FORWARDS[(e.underlying_id - 100) as usize],
                    e.contract.strike,
                    e.contract.time_to_expiry(as_of()),
                    VOL,
                    0.03,
                    0.01,
                    e.contract.side,
                );
                let price = OptionAnalytics::new(inputs).unwrap().price();
                MarketTick::new(e.id(), TickField::Close, price)
            })
            .collect();
        for tick in &ticks {
            p.apply_tick(tick);
        }
        p
    }

    #[test]
    fn test_grid_layout() {
        let p = grid();
        assert_eq!(p.len(), 12);

        assert_eq!(p.underlying_ids, vec![100, 101]);
        let ids: Vec<i64> = p.entries().iter().map(|e| e.id()).collect();
        assert_eq!(ids, (102..=113).collect::<Vec<_>>());

        let e = p.entry_at(1, 1, OptionSide::Put).unwrap();
        assert_eq!(e.contract.strike, 100.0);
        assert_eq!(e.contract.side, OptionSide::Put);
        assert_eq!(e.contract.expiry, p.expiries[1]);
        assert_eq!(e.underlying_id, 101);
        assert_eq!(p.entry_at(2, 0, OptionSide::Call).unwrap().underlying_id, 100);
        assert!(p.entry_at(3, 0, OptionSide::Call).is_none());

        assert!(Portfolio::from_grid("CL", "NYMEX", 0, vec![], vec![as_of()], 0.0, 0.0).is_err());
        assert!(
            Portfolio::from_grid("CL", "NYMEX", 0, vec![-1.0], vec![as_of()], 0.0, 0.0).is_err()
        );
    }

    #[test]
    fn test_tick_routing() {
        let mut p = grid();
        assert_eq!(p.apply_tick(&MarketTick::new(100, TickField::Bid, 99.5)), 6);
        for e in p.entries() {
            let expected = if e.contract.expiry == p.expiries[0] { Some(99.5) } else { None };
            assert_eq!(e.underlying.bid, expected, "{}", e.contract);
        }
        assert_eq!(p.spot(0), None);

        assert_eq!(p.apply_tick(&MarketTick::new(103, TickField::Ask, 4.2)), 1);
        assert_eq!(p.entry(103).unwrap().quote.ask, Some(4.2));
        assert_eq!(p.entry(104).unwrap().quote.ask, None);

        assert_eq!(p.apply_tick(&MarketTick::new(999, TickField::Bid, 1.0)), 0);
    }

    #[test]
    fn test_implied_vols_recover_flat_surface() {
        let mut p = quoted_grid();
        let failures = p.compute_implied_vols(as_of(), &ImpliedVolatilitySolver::new());
        assert!(failures.is_empty());

        for e in p.entries() {
            assert!((e.implied_vol.unwrap() - VOL).abs() < 1e-6, "{}", e.contract);
        }

        let grid = p.implied_vol_grid();
        assert_eq!(grid.dim(), (3, 2));
        assert!(grid.iter().all(|v| (v - VOL).abs() < 1e-6));
    }

    #[test]
    fn test_underlying_per_expiry() {
        let mut p = quoted_grid();
        assert_eq!(p.spot(0), Some(100.0));
        assert_eq!(p.spot(1), Some(104.0));
        assert_eq!(p.spot(2), None);

        // Each month solves against its own underlying
        let failures = p.compute_implied_vols(as_of(), &ImpliedVolatilitySolver::new());
        assert!(failures.is_empty());
        let near = p.entry_at(1, 0, OptionSide::Call).unwrap();
        let far = p.entry_at(1, 1, OptionSide::Call).unwrap();
        assert!((near.implied_vol.unwrap() - VOL).abs() < 1e-6);
        assert!((far.implied_vol.unwrap() - VOL).abs() < 1e-6);

        // Moving the far underlying leaves the near month alone
        assert_eq!(p.apply_tick(&MarketTick::new(101, TickField::Last, 110.0)), 6);
        assert_eq!(p.spot(0), Some(100.0));
        assert_eq!(p.spot(1), Some(110.0));
        p.compute_implied_vols(as_of(), &ImpliedVolatilitySolver::new());
        let near = p.entry_at(1, 0, OptionSide::Call).unwrap();
        assert!((near.implied_vol.unwrap() - VOL).abs() < 1e-6);
        // Same price against a higher underlying means a lower call vol
        let far_call = p.entry_at(2, 1, OptionSide::Call).unwrap();
        assert!(far_call.implied_vol.unwrap() < VOL);

        // A month whose underlying was never quoted fails on its own
        let quoted = quoted_grid();
        let mut p = grid();
        p.apply_tick(&MarketTick::new(100, TickField::Last, 100.0));
        for e in quoted.entries() {
            p.apply_tick(&MarketTick::new(e.id(), TickField::Close, e.quote.price.unwrap()));
        }
        let failures = p.compute_implied_vols(as_of(), &ImpliedVolatilitySolver::new());
        assert_eq!(failures.len(), 6);
        for (id, e) in &failures {
            assert_eq!(p.entry(*id).unwrap().underlying_id, 101);
            assert!(matches!(e, SigmaError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_failures_are_isolated() {
        let mut p = quoted_grid();
        // Above the discounted spot: no implied vol exists
        p.apply_tick(&MarketTick::new(102, TickField::Close, 150.0));

        let failures = p.compute_implied_vols(as_of(), &ImpliedVolatilitySolver::new());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, 102);
        assert!(matches!(failures[0].1, SigmaError::Domain(_)));
        assert!(p.entry(102).unwrap().implied_vol.is_none());
        assert!(p.entry(103).unwrap().implied_vol.is_some());

        let failures = p.compute_greeks(as_of());
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].1, SigmaError::InvalidState(_)));
        assert_eq!(p.hedge_instruments(5.0).len(), 11);
        assert_eq!(p.snapshots(Utc::now()).len(), 11);
    }

    #[test]
    fn test_missing_market_data() {
        let mut p = grid();
        let failures = p.compute_implied_vols(as_of(), &ImpliedVolatilitySolver::new());
        assert_eq!(failures.len(), 12);
        assert!(failures
            .iter()
            .all(|(_, e)| matches!(e, SigmaError::InvalidInput(_))));
        assert!(p.implied_vol_grid().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_parallel_greeks_match_sequential() {
        let mut seq = quoted_grid();
        seq.compute_implied_vols(as_of(), &ImpliedVolatilitySolver::new());
        let mut par = seq.clone();

        assert!(seq.compute_greeks(as_of()).is_empty());
        assert!(par.compute_greeks_par(as_of()).is_empty());

        for (a, b) in seq.entries().iter().zip(par.entries()) {
            assert_eq!(a.greeks, b.greeks);
        }

        // Same strike and expiry: identical gamma for call and put
        let call = seq.entry_at(0, 1, OptionSide::Call).unwrap().greeks.unwrap();
        let put = seq.entry_at(0, 1, OptionSide::Put).unwrap().greeks.unwrap();
        assert!((call.gamma - put.gamma).abs() < 1e-9);
    }

    #[test]
    fn test_hedge_pipeline() {
        let mut p = quoted_grid();
        p.compute_implied_vols(as_of(), &ImpliedVolatilitySolver::new());
        p.compute_greeks(as_of());

        let instruments = p.hedge_instruments(5.0);
        assert_eq!(instruments.len(), 12);

        let solution = HedgeOptimizer::run(instruments, &HedgePolicy::default()).unwrap();
        p.apply_solution(&solution).unwrap();

        for target in &solution.positions {
            assert_eq!(p.entry(target.id).unwrap().position, target.quantity);
        }

        let expected = p
            .entries()
            .iter()
            .map(|e| e.greeks.unwrap().gamma * e.position)
            .sum::<f64>();
        assert!((p.net_greeks().gamma - expected).abs() < 1e-9);
        assert!((p.net_greeks().gamma - solution.objective_value).abs() < 1e-6);
    }

    #[test]
    fn test_failed_solve_leaves_positions() {
        let mut p = quoted_grid();
        p.compute_implied_vols(as_of(), &ImpliedVolatilitySolver::new());
        p.compute_greeks(as_of());

        let policy = HedgePolicy {
            max_open_positions: Some(0),
            ..Default::default()
        };
        let result = HedgeOptimizer::run(p.hedge_instruments(5.0), &policy);
        assert!(matches!(result, Err(SigmaError::InfeasibleModel(_))));
        assert!(p.entries().iter().all(|e| e.position == 0.0));

        // Unknown ids are rejected before anything is written
        let bogus = HedgeSolution {
            objective_value: 0.0,
            positions: vec![
                TargetPosition {
                    id: 102,
                    quantity: 2.0,
                },
                TargetPosition {
                    id: 999,
                    quantity: 1.0,
                },
            ],
        };
        assert!(p.apply_solution(&bogus).is_err());
        assert_eq!(p.entry(102).unwrap().position, 0.0);
    }
}
