//! Implied volatility solver
//!
//! Works on the time value (price less discounted forward intrinsic), which
//! is evaluated from the out-of-the-money side so it keeps full relative
//! precision in the wings. Newton steps are taken on `ln(time value)`, which
//! is close to linear in volatility far from the money where the raw price
//! is flat. The volatility is kept inside a bracket `[lo, hi]` whose time
//! values straddle the target. A Newton step is only accepted if it lands
//! inside the bracket and is at most half the step before last; otherwise the
//! next guess comes from a shape-preserving rational cubic through the
//! bracket ends (volatility as a function of time value, slopes `1/vega`),
//! restricted to the inner part of the bracket. If the bracket has not halved
//! in two iterations the solver bisects.

use serde::{Deserialize, Serialize};

use super::black_scholes::{OptionAnalytics, ValuationInputs};
use super::rational_cubic::{minimum_control_parameter, RationalCubic};
use crate::core::{OptionSide, SigmaError, SigmaResult};

/// Fraction of the bracket width an interpolated guess must keep from either end
const INTERPOLATION_MARGIN: f64 = 0.05;

/// Halvings tried when looking for a priced lower bracket end
const LOWER_BRACKET_SEARCH: usize = 30;

/// Solver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Iteration cap for the refinement loop
    /// Default: 100
    pub max_iterations: usize,

    /// Absolute price tolerance for convergence. Quotes whose time value is
    /// at or below it carry no volatility information and are rejected.
    /// Default: 1e-10
    pub price_tolerance: f64,

    /// Relative tolerance on the time value; the effective tolerance is the
    /// smaller of this times the target time value and `price_tolerance`
    /// Default: 1e-9
    pub relative_tolerance: f64,

    /// First upper bracket guess, doubled until it prices above the target
    /// Default: 1.0
    pub initial_upper_vol: f64,

    /// Largest volatility the solver will consider
    /// Default: 10.0
    pub max_vol: f64,

    /// Below this vega per unit of time value a Newton step is not attempted
    /// Default: 1e-12
    pub vega_floor: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            price_tolerance: 1e-10,
            relative_tolerance: 1e-9,
            initial_upper_vol: 1.0,
            max_vol: 10.0,
            vega_floor: 1e-12,
        }
    }
}

/// Outcome of one implied volatility solve
///
/// A non-converged result is a normal outcome; callers must check the flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpliedVolResult {
    /// Best volatility estimate
    pub volatility: f64,
    /// Whether the price residual reached the tolerance
    pub converged: bool,
    /// Refinement iterations used
    pub iterations: usize,
}

impl ImpliedVolResult {
    /// Volatility if converged, convergence error otherwise
    pub fn into_volatility(self) -> SigmaResult<f64> {
        if self.converged {
            Ok(self.volatility)
        } else {
            Err(SigmaError::convergence(format!(
                "Implied vol did not converge after {} iterations (last estimate {:.6})",
                self.iterations, self.volatility
            )))
        }
    }
}

/// A bracket end: volatility, its time value and vega
#[derive(Debug, Clone, Copy)]
struct BracketPoint {
    vol: f64,
    time_value: f64,
    vega: f64,
}

/// No-arbitrage price band for one quote
#[derive(Debug, Clone, Copy)]
struct PriceBounds {
    /// Discounted forward intrinsic
    lower: f64,
    /// Discounted asset (calls) or discounted strike (puts)
    upper: f64,
}

impl PriceBounds {
    fn new(spot: f64, strike: f64, time: f64, rate: f64, div: f64, side: OptionSide) -> Self {
        let spot_leg = spot * (-div * time).exp();
        let strike_leg = strike * (-rate * time).exp();
        let upper = match side {
            OptionSide::Call => spot_leg,
            OptionSide::Put => strike_leg,
        };
        Self {
            lower: side.intrinsic(spot_leg, strike_leg),
            upper,
        }
    }
}

/// Implied volatility solver
#[derive(Debug, Clone, Default)]
pub struct ImpliedVolatilitySolver {
    config: SolverConfig,
}

impl ImpliedVolatilitySolver {
    /// Create a solver with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom settings
    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Invert `market_price` to a Black-Scholes volatility
    ///
    /// Prices outside the no-arbitrage band `(lower, upper)` have no implied
    /// volatility and are rejected with a domain error before iterating, as
    /// are prices whose time value is within `price_tolerance` of zero.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &self,
        market_price: f64,
        spot: f64,
        strike: f64,
        time: f64,
        rate: f64,
        div: f64,
        side: OptionSide,
    ) -> SigmaResult<ImpliedVolResult> {
        if !market_price.is_finite() || market_price < 0.0 {
            return Err(SigmaError::domain(format!(
                "Invalid option price: {market_price}"
            )));
        }
        if !(time.is_finite() && rate.is_finite() && div.is_finite()) {
            return Err(SigmaError::domain("Non-finite valuation input"));
        }
        if time <= 0.0 {
            return Err(SigmaError::domain("Non-positive time to expiry"));
        }
        if !(spot > 0.0 && strike > 0.0 && spot.is_finite() && strike.is_finite()) {
            return Err(SigmaError::domain("Non-positive spot or strike"));
        }

        let bounds = PriceBounds::new(spot, strike, time, rate, div, side);
        if market_price <= bounds.lower {
            return Err(SigmaError::domain(format!(
                "Price {market_price} at or below intrinsic value {}",
                bounds.lower
            )));
        }
        if market_price >= bounds.upper {
            return Err(SigmaError::domain(format!(
                "Price {market_price} at or above upper bound {}",
                bounds.upper
            )));
        }

        let target = market_price - bounds.lower;
        if target <= self.config.price_tolerance {
            return Err(SigmaError::domain(format!(
                "Time value {target:e} within price tolerance {:e}",
                self.config.price_tolerance
            )));
        }
        let tol = self
            .config
            .price_tolerance
            .min(self.config.relative_tolerance * target);

        // Template inputs; the vol is replaced on every evaluation
        let inputs = ValuationInputs::new(spot, strike, time, 1.0, rate, div, side);

        let mut lo = BracketPoint {
            vol: 0.0,
            time_value: 0.0,
            vega: 0.0,
        };
        let mut hi = self.evaluate(&inputs, self.config.initial_upper_vol.min(self.config.max_vol))?;
        while hi.time_value < target && hi.vol < self.config.max_vol {
            lo = hi;
            hi = self.evaluate(&inputs, (hi.vol * 2.0).min(self.config.max_vol))?;
        }
        if hi.time_value < target - tol {
            tracing::warn!(
                "Price {:.6} needs vol above {:.2}, returning cap",
                market_price,
                self.config.max_vol
            );
            return Ok(ImpliedVolResult {
                volatility: hi.vol,
                converged: false,
                iterations: 0,
            });
        }

        // Replace the zero-vol end with a priced point so both ends carry vega
        if lo.vol == 0.0 {
            let mut vol = (0.5 * hi.vol).min(0.01);
            for _ in 0..LOWER_BRACKET_SEARCH {
                let point = self.evaluate(&inputs, vol)?;
                if point.time_value < target {
                    lo = point;
                    break;
                }
                hi = point;
                vol *= 0.5;
            }
        }

        // Brenner-Subrahmanyam style starting point
        let atm_scale = 0.4 * spot * (-div * time).exp() * time.sqrt();
        let mut vol = target / atm_scale;
        if !(vol > lo.vol && vol < hi.vol) {
            vol = interpolated_guess(&lo, &hi, target);
        }

        let mut step = hi.vol - lo.vol;
        let mut step_before = step;
        let mut width_before = step;
        let mut width_last = step;
        let mut iterations = 0;
        while iterations < self.config.max_iterations {
            iterations += 1;

            let point = self.evaluate(&inputs, vol)?;
            let diff = point.time_value - target;
            if diff.abs() <= tol {
                tracing::debug!("Implied vol {:.8} after {} iterations", vol, iterations);
                return Ok(ImpliedVolResult {
                    volatility: vol,
                    converged: true,
                    iterations,
                });
            }

            if diff < 0.0 {
                lo = point;
            } else {
                hi = point;
            }
            let width = hi.vol - lo.vol;
            if width <= 4.0 * f64::EPSILON * hi.vol {
                break;
            }

            let newton = if point.time_value > 0.0
                && point.vega > self.config.vega_floor * point.time_value
            {
                let log_gap = point.time_value.ln() - target.ln();
                Some(vol - log_gap * point.time_value / point.vega)
            } else {
                None
            };
            let next = match newton {
                Some(next)
                    if next > lo.vol
                        && next < hi.vol
                        && (next - vol).abs() <= 0.5 * step_before.abs() =>
                {
                    next
                }
                _ if width > 0.5 * width_before => lo.vol + 0.5 * width,
                _ => interpolated_guess(&lo, &hi, target),
            };

            width_before = width_last;
            width_last = width;
            step_before = step;
            step = next - vol;
            vol = next;
        }

        tracing::warn!(
            "Implied vol not converged after {} iterations (estimate {:.6})",
            iterations,
            vol
        );
        Ok(ImpliedVolResult {
            volatility: vol,
            converged: false,
            iterations,
        })
    }

    fn evaluate(&self, inputs: &ValuationInputs, vol: f64) -> SigmaResult<BracketPoint> {
        let bs = OptionAnalytics::new(inputs.with_vol(vol))?;
        Ok(BracketPoint {
            vol,
            time_value: bs.time_value(),
            vega: bs.vega(),
        })
    }
}

/// Next guess from the rational cubic through the bracket, bisection if the
/// interpolant lands outside the inner part of the bracket
fn interpolated_guess(lo: &BracketPoint, hi: &BracketPoint, target: f64) -> f64 {
    let width = hi.vol - lo.vol;
    let bisection = lo.vol + 0.5 * width;
    let dp = hi.time_value - lo.time_value;
    if !(dp > 0.0) {
        return bisection;
    }

    let secant = width / dp;
    let slope = |vega: f64| if vega > 0.0 { 1.0 / vega } else { secant };
    let segment = RationalCubic::new(
        lo.time_value,
        hi.time_value,
        lo.vol,
        hi.vol,
        slope(lo.vega),
        slope(hi.vega),
    );
    let r = minimum_control_parameter(segment.d_l, segment.d_r, secant, true);
    let guess = segment.interpolate(target, r);

    let margin = INTERPOLATION_MARGIN * width;
    if guess.is_finite() && guess > lo.vol + margin && guess < hi.vol - margin {
        guess
    } else {
        bisection
    }
}
