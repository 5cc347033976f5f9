//! Sigma Options CLI
//!
//! Runs the full pipeline on a synthetic option grid: quotes → implied vols →
//! Greeks → hedge. Pass a policy JSON path as the first argument to override
//! the default hedge policy. Log level comes from `RUST_LOG`.

use chrono::{Days, NaiveDate, Utc};
use sigma_options::prelude::*;
use tracing_subscriber::EnvFilter;

/// Id of the front-month future; later months follow sequentially
const FIRST_UNDERLYING_ID: i64 = 1000;
const FRONT_PRICE: f64 = 78.50;
/// Contango per contract month
const MONTHLY_CARRY: f64 = 0.35;
const RATE: f64 = 0.05;
const DIV: f64 = 0.0;

/// Smile used to quote the synthetic grid
fn market_vol(strike: f64, forward: f64, time: f64) -> f64 {
    let m = (strike / forward).ln();
    0.30 + 0.4 * m * m - 0.05 * m + 0.02 * time.sqrt()
}

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run() -> SigmaResult<()> {
    let policy = match std::env::args().nth(1) {
        Some(path) => HedgePolicy::from_json_file(path)?,
        None => HedgePolicy::default(),
    };

    println!("Sigma Options Hedging");
    println!("=====================\n");

    let as_of = Utc::now().date_naive();
    let expiries: Vec<NaiveDate> = [30, 60, 90]
        .iter()
        .filter_map(|&d| as_of.checked_add_days(Days::new(d)))
        .collect();
    let strikes: Vec<f64> = (0..9).map(|i| 70.0 + 2.0 * i as f64).collect();

    let mut portfolio =
        Portfolio::from_grid("CL", "NYMEX", FIRST_UNDERLYING_ID, strikes, expiries, RATE, DIV)?;

    // Quote one future per month, then the grid off the smile
    let forward_of = |underlying_id: i64| {
        FRONT_PRICE + MONTHLY_CARRY * (underlying_id - FIRST_UNDERLYING_ID) as f64
    };
    let mut ticks: Vec<MarketTick> = portfolio
        .underlying_ids
        .iter()
        .map(|&id| MarketTick::new(id, TickField::Last, forward_of(id)))
        .collect();
    for entry in portfolio.entries() {
        let c = &entry.contract;
        let time = c.time_to_expiry(as_of);
        let forward = forward_of(entry.underlying_id);
        let inputs = ValuationInputs::new(
            forward,
            c.strike,
            time,
            market_vol(c.strike, forward, time),
            RATE,
            DIV,
            c.side,
        );
        let price = bs_price(inputs)?;
        ticks.push(MarketTick::new(c.id, TickField::Bid, price * 0.99));
        ticks.push(MarketTick::new(c.id, TickField::Ask, price * 1.01));
    }
    for tick in &ticks {
        portfolio.apply_tick(tick);
    }

    let failures = portfolio.compute_implied_vols(as_of, &ImpliedVolatilitySolver::new());
    for (id, e) in &failures {
        println!("  IV failed for {id}: {e}");
    }

    println!("Implied vol grid (strike × expiry):");
    let grid = portfolio.implied_vol_grid();
    for (strike, row) in portfolio.strikes.iter().zip(grid.rows()) {
        let cells: Vec<String> = row.iter().map(|v| format!("{:6.2}%", v * 100.0)).collect();
        println!("  {:7.2}  {}", strike, cells.join("  "));
    }

    portfolio.compute_greeks_par(as_of);

    let instruments = portfolio.hedge_instruments(policy.max_position);
    println!(
        "\nHedging over {} instruments ({:?}, {:?}, {})",
        instruments.len(),
        policy.objective,
        policy.direction,
        if policy.solve_as_mip { "MIP" } else { "LP" }
    );

    match HedgeOptimizer::run(instruments, &policy) {
        Ok(solution) => {
            portfolio.apply_solution(&solution)?;
            println!("Objective: {:.6}", solution.objective_value);
            for target in solution.open_positions() {
                if let Some(entry) = portfolio.entry(target.id) {
                    println!("  {:>8.2}  {}", target.quantity, entry.contract);
                }
            }

            let net = portfolio.net_greeks();
            println!("\nNet Greeks:");
            println!("  Delta: {:.4}", net.delta);
            println!("  Gamma: {:.6}", net.gamma);
            println!("  Theta/day: {:.4}", net.theta_per_day());
            println!("  Vega: {:.4}", net.vega);

            let snapshots = portfolio.snapshots(Utc::now());
            tracing::debug!("{} Greeks snapshots ready", snapshots.len());
        }
        Err(SigmaError::InfeasibleModel(msg)) => {
            println!("No feasible hedge: {msg}");
        }
        Err(e) => return Err(e),
    }

    println!("\n--- Done ---");
    Ok(())
}
