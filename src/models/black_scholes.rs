//! Black-Scholes Model
//!
//! Provides:
//! - European option pricing with a continuous dividend yield
//! - First, second and third order Greeks
//!
//! Inputs are validated once, up front: every formula divides by `σ√t`, so
//! a non-positive time or volatility is a domain error rather than a NaN.
//! Time sensitivities (theta, charm, thega, color) are derivatives with
//! respect to calendar time, per year.

use serde::{Deserialize, Serialize};

use super::normal::{norm_cdf, norm_pdf};
use crate::core::{Greeks, OptionSide, SigmaError, SigmaResult};

/// Everything needed to value one option
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationInputs {
    /// Underlying spot price
    pub spot: f64,
    /// Strike price
    pub strike: f64,
    /// Time to expiry in years
    pub time: f64,
    /// Volatility (annualised)
    pub vol: f64,
    /// Risk-free rate (continuous)
    pub rate: f64,
    /// Dividend yield (continuous)
    pub div: f64,
    /// Call or put
    pub side: OptionSide,
}

impl ValuationInputs {
    pub fn new(
        spot: f64,
        strike: f64,
        time: f64,
        vol: f64,
        rate: f64,
        div: f64,
        side: OptionSide,
    ) -> Self {
        Self {
            spot,
            strike,
            time,
            vol,
            rate,
            div,
            side,
        }
    }

    /// Same inputs with a different volatility
    pub fn with_vol(&self, vol: f64) -> Self {
        Self { vol, ..*self }
    }

    /// Same inputs on the opposite side
    pub fn with_side(&self, side: OptionSide) -> Self {
        Self { side, ..*self }
    }

    /// Check the model domain
    pub fn validate(&self) -> SigmaResult<()> {
        let all_finite = [self.spot, self.strike, self.time, self.vol, self.rate, self.div]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(SigmaError::domain("Non-finite valuation input"));
        }
        if self.time <= 0.0 {
            return Err(SigmaError::domain(format!(
                "Non-positive time to expiry: {}",
                self.time
            )));
        }
        if self.vol <= 0.0 {
            return Err(SigmaError::domain(format!(
                "Non-positive volatility: {}",
                self.vol
            )));
        }
        if self.spot <= 0.0 || self.strike <= 0.0 {
            return Err(SigmaError::domain("Non-positive spot or strike"));
        }
        Ok(())
    }
}

/// Black-Scholes analytics for a single option
///
/// Pure function of its inputs; the shared intermediate quantities are
/// computed once on construction.
#[derive(Debug, Clone, Copy)]
pub struct OptionAnalytics {
    inputs: ValuationInputs,
    sqrt_t: f64,
    sigma_tau: f64,
    d1: f64,
    d2: f64,
    /// e^{-rt}
    df_rate: f64,
    /// e^{-dt}
    df_div: f64,
    /// φ(d1)
    pdf_d1: f64,
}

impl OptionAnalytics {
    pub fn new(inputs: ValuationInputs) -> SigmaResult<Self> {
        inputs.validate()?;

        let ValuationInputs {
            spot,
            strike,
            time,
            vol,
            rate,
            div,
            ..
        } = inputs;

        let sqrt_t = time.sqrt();
        let sigma_tau = vol * sqrt_t;
        let d1 = ((spot / strike).ln() + time * (rate - div + 0.5 * vol * vol)) / sigma_tau;
        let d2 = d1 - sigma_tau;

        Ok(Self {
            inputs,
            sqrt_t,
            sigma_tau,
            d1,
            d2,
            df_rate: (-rate * time).exp(),
            df_div: (-div * time).exp(),
            pdf_d1: norm_pdf(d1),
        })
    }

    pub fn inputs(&self) -> &ValuationInputs {
        &self.inputs
    }

    pub fn d1(&self) -> f64 {
        self.d1
    }

    pub fn d2(&self) -> f64 {
        self.d2
    }

    /// σ√t
    pub fn sigma_tau(&self) -> f64 {
        self.sigma_tau
    }

    /// ∂d1/∂τ (τ = time to expiry)
    fn d1_dtau(&self) -> f64 {
        let ValuationInputs {
            time,
            vol,
            rate,
            div,
            ..
        } = self.inputs;
        (rate - div + 0.5 * vol * vol) / self.sigma_tau - self.d1 / (2.0 * time)
    }

    /// ∂d2/∂τ
    fn d2_dtau(&self) -> f64 {
        self.d1_dtau() - 0.5 * self.inputs.vol / self.sqrt_t
    }

    pub fn call_price(&self) -> f64 {
        let s = self.inputs.spot;
        let k = self.inputs.strike;
        s * self.df_div * norm_cdf(self.d1) - k * self.df_rate * norm_cdf(self.d2)
    }

    /// Put from put-call parity, consistent with the call by construction
    pub fn put_price(&self) -> f64 {
        self.call_price() - self.inputs.spot * self.df_div + self.inputs.strike * self.df_rate
    }

    /// Price less the discounted forward intrinsic
    ///
    /// Computed as the out-of-the-money option's price, which is the same for
    /// both sides and keeps full relative precision deep in the wings where
    /// `price - intrinsic` would cancel.
    pub fn time_value(&self) -> f64 {
        let spot_leg = self.inputs.spot * self.df_div;
        let strike_leg = self.inputs.strike * self.df_rate;
        if strike_leg >= spot_leg {
            spot_leg * norm_cdf(self.d1) - strike_leg * norm_cdf(self.d2)
        } else {
            strike_leg * norm_cdf(-self.d2) - spot_leg * norm_cdf(-self.d1)
        }
    }

    pub fn price(&self) -> f64 {
        match self.inputs.side {
            OptionSide::Call => self.call_price(),
            OptionSide::Put => self.put_price(),
        }
    }

    pub fn delta(&self) -> f64 {
        match self.inputs.side {
            OptionSide::Call => self.df_div * norm_cdf(self.d1),
            OptionSide::Put => -self.df_div * norm_cdf(-self.d1),
        }
    }

    /// Same for call and put
    pub fn gamma(&self) -> f64 {
        self.df_div * self.pdf_d1 / (self.inputs.spot * self.sigma_tau)
    }

    /// Same for call and put, per unit of volatility
    pub fn vega(&self) -> f64 {
        self.inputs.spot * self.df_div * self.pdf_d1 * self.sqrt_t
    }

    pub fn theta(&self) -> f64 {
        let ValuationInputs {
            spot: s,
            strike: k,
            vol,
            rate: r,
            div: q,
            side,
            ..
        } = self.inputs;
        let decay = -s * self.df_div * self.pdf_d1 * vol / (2.0 * self.sqrt_t);
        match side {
            OptionSide::Call => {
                decay - r * k * self.df_rate * norm_cdf(self.d2)
                    + q * s * self.df_div * norm_cdf(self.d1)
            }
            OptionSide::Put => {
                decay + r * k * self.df_rate * norm_cdf(-self.d2)
                    - q * s * self.df_div * norm_cdf(-self.d1)
            }
        }
    }

    pub fn charm(&self) -> f64 {
        let q = self.inputs.div;
        let drift = self.df_div * self.pdf_d1 * self.d1_dtau();
        match self.inputs.side {
            OptionSide::Call => q * self.df_div * norm_cdf(self.d1) - drift,
            OptionSide::Put => -q * self.df_div * norm_cdf(-self.d1) - drift,
        }
    }

    pub fn thega(&self) -> f64 {
        let ValuationInputs {
            spot: s,
            strike: k,
            time,
            vol,
            rate: r,
            div: q,
            side,
        } = self.inputs;
        let d1_dtau = self.d1_dtau();
        let d2_dtau = self.d2_dtau();
        let pdf_d2 = norm_pdf(self.d2);

        // ∂/∂τ of each theta term
        let decay = s * self.df_div * self.pdf_d1 * vol / (2.0 * self.sqrt_t)
            * (q + self.d1 * d1_dtau + 0.5 / time);
        let (carry, dividend) = match side {
            OptionSide::Call => (
                r * k * self.df_rate * (r * norm_cdf(self.d2) - pdf_d2 * d2_dtau),
                q * s * self.df_div * (self.pdf_d1 * d1_dtau - q * norm_cdf(self.d1)),
            ),
            OptionSide::Put => (
                -r * k * self.df_rate * (r * norm_cdf(-self.d2) + pdf_d2 * d2_dtau),
                q * s * self.df_div * (q * norm_cdf(-self.d1) + self.pdf_d1 * d1_dtau),
            ),
        };
        -(decay + carry + dividend)
    }

    /// Same for call and put
    pub fn color(&self) -> f64 {
        let q = self.inputs.div;
        self.gamma() * (q + self.d1 * self.d1_dtau() + 0.5 / self.inputs.time)
    }

    /// Same for call and put
    pub fn speed(&self) -> f64 {
        -self.gamma() / self.inputs.spot * (1.0 + self.d1 / self.sigma_tau)
    }

    /// Price and all Greeks
    pub fn greeks(&self) -> Greeks {
        Greeks {
            price: self.price(),
            delta: self.delta(),
            gamma: self.gamma(),
            vega: self.vega(),
            theta: self.theta(),
            charm: self.charm(),
            thega: self.thega(),
            color: self.color(),
            speed: self.speed(),
        }
    }
}

/// Black-Scholes European option price
pub fn price(inputs: ValuationInputs) -> SigmaResult<f64> {
    Ok(OptionAnalytics::new(inputs)?.price())
}

/// Black-Scholes price and Greeks
pub fn greeks(inputs: ValuationInputs) -> SigmaResult<Greeks> {
    Ok(OptionAnalytics::new(inputs)?.greeks())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atm_call() -> ValuationInputs {
        ValuationInputs::new(100.0, 100.0, 1.0, 0.20, 0.05, 0.0, OptionSide::Call)
    }

    fn analytics(inputs: ValuationInputs) -> OptionAnalytics {
        OptionAnalytics::new(inputs).unwrap()
    }

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * b.abs().max(1.0)
    }

    #[test]
    fn test_bs_reference_values() {
        let bs = analytics(atm_call());

        assert!((bs.price() - 10.4506).abs() < 1e-4);
        assert!((bs.delta() - 0.6368).abs() < 1e-4);
        assert!((bs.gamma() - 0.0188).abs() < 1e-4);
        assert!((bs.d1() - 0.35).abs() < 1e-12);
        assert!((bs.sigma_tau() - 0.2).abs() < 1e-15);
    }

    #[test]
    fn test_put_call_parity() {
        let strikes = [60.0, 90.0, 100.0, 115.0, 180.0];
        let times = [0.02, 0.5, 3.0];
        let vols = [0.05, 0.3, 1.5];

        for &k in &strikes {
            for &t in &times {
                for &v in &vols {
                    let call_in = ValuationInputs::new(100.0, k, t, v, 0.03, 0.0, OptionSide::Call);
                    let call = analytics(call_in).price();
                    let put = analytics(call_in.with_side(OptionSide::Put)).price();
                    let parity = call - 100.0 + k * (-0.03 * t).exp();
                    assert!((put - parity).abs() < 1e-9, "k={k} t={t} v={v}");
                }
            }
        }

        // With dividends the spot leg is discounted at the yield
        let with_div = ValuationInputs::new(100.0, 95.0, 0.75, 0.25, 0.04, 0.02, OptionSide::Call);
        let call = analytics(with_div).price();
        let put = analytics(with_div.with_side(OptionSide::Put)).price();
        let rhs = call - 100.0 * (-0.02f64 * 0.75).exp() + 95.0 * (-0.04f64 * 0.75).exp();
        assert!((put - rhs).abs() < 1e-9);
    }

    #[test]
    fn test_put_formula_matches_direct() {
        let put_in = ValuationInputs::new(100.0, 110.0, 0.5, 0.3, 0.05, 0.01, OptionSide::Put);
        let bs = analytics(put_in);
        let direct = 110.0 * (-0.05f64 * 0.5).exp() * norm_cdf(-bs.d2())
            - 100.0 * (-0.01f64 * 0.5).exp() * norm_cdf(-bs.d1());
        assert!((bs.price() - direct).abs() < 1e-10);
    }

    #[test]
    fn test_time_value() {
        for (strike, side) in [(80.0, OptionSide::Call), (120.0, OptionSide::Put), (105.0, OptionSide::Call)] {
            let inputs = ValuationInputs::new(100.0, strike, 0.5, 0.3, 0.03, 0.01, side);
            let bs = analytics(inputs);
            let intrinsic = side.intrinsic(100.0 * (-0.01f64 * 0.5).exp(), strike * (-0.03f64 * 0.5).exp());
            assert!((bs.time_value() - (bs.price() - intrinsic)).abs() < 1e-10, "k={strike}");
            assert_eq!(bs.time_value(), analytics(inputs.with_side(OptionSide::Put)).time_value());
        }

        // Far wing: the put via parity loses everything, the time value does not
        let wing = analytics(ValuationInputs::new(100.0, 40.0, 0.1, 0.2, 0.0, 0.0, OptionSide::Put));
        assert!(wing.time_value() > 0.0 && wing.time_value() < 1e-30);
    }

    #[test]
    fn test_side_independent_greeks() {
        let call_in = ValuationInputs::new(100.0, 105.0, 0.75, 0.25, 0.04, 0.01, OptionSide::Call);
        let call = analytics(call_in);
        let put = analytics(call_in.with_side(OptionSide::Put));

        assert_eq!(call.gamma(), put.gamma());
        assert_eq!(call.vega(), put.vega());
        assert_eq!(call.color(), put.color());
        assert_eq!(call.speed(), put.speed());
        // Delta differs by the discounted unit
        assert!((call.delta() - put.delta() - (-0.01f64 * 0.75).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_domain_errors() {
        let bad_time = ValuationInputs { time: 0.0, ..atm_call() };
        assert!(matches!(OptionAnalytics::new(bad_time), Err(SigmaError::Domain(_))));

        let bad_vol = atm_call().with_vol(0.0);
        assert!(matches!(OptionAnalytics::new(bad_vol), Err(SigmaError::Domain(_))));

        let negative_vol = atm_call().with_vol(-0.1);
        assert!(matches!(price(negative_vol), Err(SigmaError::Domain(_))));

        let nan_spot = ValuationInputs { spot: f64::NAN, ..atm_call() };
        assert!(matches!(greeks(nan_spot), Err(SigmaError::Domain(_))));
    }

    fn bumped_time(inputs: ValuationInputs, dt: f64) -> OptionAnalytics {
        analytics(ValuationInputs {
            time: inputs.time + dt,
            ..inputs
        })
    }

    fn bumped_spot(inputs: ValuationInputs, ds: f64) -> OptionAnalytics {
        analytics(ValuationInputs {
            spot: inputs.spot + ds,
            ..inputs
        })
    }

    fn check_against_finite_differences(inputs: ValuationInputs) {
        let bs = analytics(inputs);
        let h = 1e-4;

        // Calendar time runs against time to expiry: d/dt = -d/dτ
        let up = bumped_time(inputs, h);
        let dn = bumped_time(inputs, -h);
        let theta_fd = -(up.price() - dn.price()) / (2.0 * h);
        let charm_fd = -(up.delta() - dn.delta()) / (2.0 * h);
        let thega_fd = -(up.theta() - dn.theta()) / (2.0 * h);
        let color_fd = -(up.gamma() - dn.gamma()) / (2.0 * h);

        let ds = 1e-4 * inputs.spot;
        let s_up = bumped_spot(inputs, ds);
        let s_dn = bumped_spot(inputs, -ds);
        let delta_fd = (s_up.price() - s_dn.price()) / (2.0 * ds);
        let gamma_fd = (s_up.delta() - s_dn.delta()) / (2.0 * ds);
        let speed_fd = (s_up.gamma() - s_dn.gamma()) / (2.0 * ds);

        let dv = 1e-5;
        let vega_fd = (analytics(inputs.with_vol(inputs.vol + dv)).price()
            - analytics(inputs.with_vol(inputs.vol - dv)).price())
            / (2.0 * dv);

        let label = format!("{:?}", inputs);
        assert!(close(bs.theta(), theta_fd, 1e-6), "theta {label}");
        assert!(close(bs.charm(), charm_fd, 1e-6), "charm {label}");
        assert!(close(bs.thega(), thega_fd, 1e-5), "thega {label}");
        assert!(close(bs.color(), color_fd, 1e-6), "color {label}");
        assert!(close(bs.delta(), delta_fd, 1e-6), "delta {label}");
        assert!(close(bs.gamma(), gamma_fd, 1e-6), "gamma {label}");
        assert!(close(bs.speed(), speed_fd, 1e-6), "speed {label}");
        assert!(close(bs.vega(), vega_fd, 1e-6), "vega {label}");
    }

    #[test]
    fn test_greeks_match_finite_differences() {
        for side in [OptionSide::Call, OptionSide::Put] {
            check_against_finite_differences(ValuationInputs::new(
                100.0, 105.0, 0.75, 0.25, 0.04, 0.01, side,
            ));
            check_against_finite_differences(ValuationInputs::new(
                50.0, 45.0, 0.3, 0.4, 0.02, 0.0, side,
            ));
            check_against_finite_differences(ValuationInputs::new(
                100.0, 100.0, 2.0, 0.15, 0.0, 0.03, side,
            ));
        }
    }

    #[test]
    fn test_greeks_bundle() {
        let g = greeks(atm_call()).unwrap();
        let bs = analytics(atm_call());

        assert_eq!(g.price, bs.price());
        assert_eq!(g.thega, bs.thega());
        assert!(g.delta > 0.5 && g.delta < 0.7);
        assert!(g.gamma > 0.0);
        assert!(g.theta < 0.0);
        assert!(g.vega > 0.0);
    }
}
