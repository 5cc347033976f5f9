//! Example: Basic options pricing with Black-Scholes
//!
//! Run with: cargo run --example basic_pricing

use sigma_options::prelude::*;

fn main() -> SigmaResult<()> {
    // Option parameters
    let spot = 500.0;
    let strike = 505.0;
    let time = 0.25; // 3 months
    let rate = 0.05; // 5% risk-free rate
    let div = 0.01; // 1% dividend yield
    let vol = 0.20; // 20% volatility

    println!("=== Black-Scholes Pricing ===\n");
    println!("Spot:     ${:.2}", spot);
    println!("Strike:   ${:.2}", strike);
    println!("Time:     {:.2} years ({:.0} days)", time, time * 365.0);
    println!("Rate:     {:.1}%", rate * 100.0);
    println!("Div:      {:.1}%", div * 100.0);
    println!("Vol:      {:.1}%\n", vol * 100.0);

    let call = ValuationInputs::new(spot, strike, time, vol, rate, div, OptionSide::Call);
    let put = call.with_side(OptionSide::Put);

    let call_price = bs_price(call)?;
    let put_price = bs_price(put)?;
    println!("Call Price: ${:.4}", call_price);
    println!("Put Price:  ${:.4}", put_price);

    // Put-call parity: C - P = S*e^(-qT) - K*e^(-rT)
    let parity_lhs = call_price - put_price;
    let parity_rhs = spot * (-div * time).exp() - strike * (-rate * time).exp();
    println!("\nPut-Call Parity Check:");
    println!("  C - P = {:.4}", parity_lhs);
    println!("  S*e^(-qT) - K*e^(-rT) = {:.4}", parity_rhs);
    println!("  Difference: {:.2e}", (parity_lhs - parity_rhs).abs());

    println!("\n=== Greeks (Call) ===\n");
    let greeks = bs_greeks(call)?;
    println!("Delta:  {:.4}", greeks.delta);
    println!("Gamma:  {:.6}", greeks.gamma);
    println!("Vega:   {:.4}", greeks.vega);
    println!("Theta:  {:.4} (per day: {:.4})", greeks.theta, greeks.theta_per_day());
    println!("Charm:  {:.4}", greeks.charm);
    println!("Thega:  {:.4}", greeks.thega);
    println!("Color:  {:.6}", greeks.color);
    println!("Speed:  {:.6}", greeks.speed);

    println!("\n=== Implied Volatility ===\n");
    let solver = ImpliedVolatilitySolver::new();
    let market_price = call_price + 0.50; // Simulated market price
    let iv = solver.solve(market_price, spot, strike, time, rate, div, OptionSide::Call)?;
    if iv.converged {
        println!(
            "Market price ${:.4} implies vol: {:.2}% ({} iterations)",
            market_price,
            iv.volatility * 100.0,
            iv.iterations
        );
    } else {
        println!("IV did not converge, last estimate {:.2}%", iv.volatility * 100.0);
    }

    // Far tail of the normal distribution
    println!("\n=== Normal Tail ===\n");
    for z in [-5.0, -10.0, -20.0] {
        let p = norm_cdf(z);
        println!("N({:>5.1}) = {:.6e}, inverse = {:.6}", z, p, inverse_norm_cdf(p));
    }

    Ok(())
}
