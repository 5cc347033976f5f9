//! Rational cubic interpolation
//!
//! Delbourgo-Gregory style rational cubic on a single segment. The control
//! parameter `r` blends between the standard cubic Hermite interpolant
//! (`r = 3`) and linear interpolation (`r → ∞`), which lets the implied
//! volatility solver keep its fallback guesses monotone and convex where the
//! price-to-vol map is.

/// Control values at or above this are treated as linear interpolation
pub const MAXIMUM_CONTROL_PARAMETER: f64 = 2.0 / (f64::EPSILON * f64::EPSILON);

/// The rational cubic needs r > -1
pub fn minimum_control_parameter_value() -> f64 {
    -(1.0 - f64::EPSILON.sqrt())
}

#[inline]
fn is_zero(x: f64) -> bool {
    x.abs() < f64::MIN_POSITIVE
}

/// One interpolation segment: positions, values and first derivatives at
/// both ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RationalCubic {
    pub x_l: f64,
    pub x_r: f64,
    pub y_l: f64,
    pub y_r: f64,
    pub d_l: f64,
    pub d_r: f64,
}

impl RationalCubic {
    pub fn new(x_l: f64, x_r: f64, y_l: f64, y_r: f64, d_l: f64, d_r: f64) -> Self {
        Self {
            x_l,
            x_r,
            y_l,
            y_r,
            d_l,
            d_r,
        }
    }

    /// Secant slope across the segment
    pub fn secant(&self) -> f64 {
        (self.y_r - self.y_l) / (self.x_r - self.x_l)
    }

    /// Evaluate the interpolant at `x` with control parameter `r`
    pub fn interpolate(&self, x: f64, r: f64) -> f64 {
        let h = self.x_r - self.x_l;
        if h.abs() <= 0.0 {
            return 0.5 * (self.y_l + self.y_r);
        }
        // r > -1 is not asserted so that NaN propagates
        let t = (x - self.x_l) / h;
        if !(r >= MAXIMUM_CONTROL_PARAMETER) {
            let omt = 1.0 - t;
            let t2 = t * t;
            let omt2 = omt * omt;
            let numerator = self.y_r * t2 * t
                + (r * self.y_r - h * self.d_r) * t2 * omt
                + (r * self.y_l + h * self.d_l) * t * omt2
                + self.y_l * omt2 * omt;
            return numerator / (1.0 + (r - 3.0) * t * omt);
        }
        // Linear, without over- or underflow
        self.y_r * t + self.y_l * (1.0 - t)
    }

    /// Control parameter matching a prescribed second derivative at `x_l`
    pub fn control_parameter_for_left_second_derivative(&self, second_derivative_l: f64) -> f64 {
        let h = self.x_r - self.x_l;
        let numerator = 0.5 * h * second_derivative_l + (self.d_r - self.d_l);
        if is_zero(numerator) {
            return 0.0;
        }
        let denominator = (self.y_r - self.y_l) / h - self.d_l;
        if is_zero(denominator) {
            return if numerator > 0.0 {
                MAXIMUM_CONTROL_PARAMETER
            } else {
                minimum_control_parameter_value()
            };
        }
        numerator / denominator
    }

    /// Control parameter matching a prescribed second derivative at `x_r`
    pub fn control_parameter_for_right_second_derivative(&self, second_derivative_r: f64) -> f64 {
        let h = self.x_r - self.x_l;
        let numerator = 0.5 * h * second_derivative_r + (self.d_r - self.d_l);
        if is_zero(numerator) {
            return 0.0;
        }
        let denominator = self.d_r - (self.y_r - self.y_l) / h;
        if is_zero(denominator) {
            return if numerator > 0.0 {
                MAXIMUM_CONTROL_PARAMETER
            } else {
                minimum_control_parameter_value()
            };
        }
        numerator / denominator
    }

    /// Smallest control parameter that keeps this segment shape-preserving
    pub fn minimum_shape_preserving_control(&self, prefer_shape_preservation: bool) -> f64 {
        minimum_control_parameter(self.d_l, self.d_r, self.secant(), prefer_shape_preservation)
    }

    /// Second-derivative fit at `x_l`, floored to stay shape-preserving
    pub fn convex_control_parameter_for_left_second_derivative(
        &self,
        second_derivative_l: f64,
        prefer_shape_preservation: bool,
    ) -> f64 {
        let r = self.control_parameter_for_left_second_derivative(second_derivative_l);
        let r_min = self.minimum_shape_preserving_control(prefer_shape_preservation);
        r.max(r_min)
    }

    /// Second-derivative fit at `x_r`, floored to stay shape-preserving
    pub fn convex_control_parameter_for_right_second_derivative(
        &self,
        second_derivative_r: f64,
        prefer_shape_preservation: bool,
    ) -> f64 {
        let r = self.control_parameter_for_right_second_derivative(second_derivative_r);
        let r_min = self.minimum_shape_preserving_control(prefer_shape_preservation);
        r.max(r_min)
    }
}

/// Minimum control parameter for slopes `d_l`, `d_r` and secant `s`
///
/// Monotone segments need `r >= (d_l + d_r)/s`; convex or concave segments
/// need `r >= max(|Δd/(d_r - s)|, |Δd/(s - d_l)|)`. A segment that is none of
/// these falls back to the standard cubic.
pub fn minimum_control_parameter(
    d_l: f64,
    d_r: f64,
    s: f64,
    prefer_shape_preservation: bool,
) -> f64 {
    let monotonic = d_l * s >= 0.0 && d_r * s >= 0.0;
    let convex = d_l <= s && s <= d_r;
    let concave = d_l >= s && s >= d_r;
    if !monotonic && !convex && !concave {
        return minimum_control_parameter_value();
    }

    let d_r_m_d_l = d_r - d_l;
    let d_r_m_s = d_r - s;
    let s_m_d_l = s - d_l;
    let mut r1 = -f64::MAX;
    let mut r2 = r1;

    if monotonic {
        if !is_zero(s) {
            r1 = (d_r + d_l) / s;
        } else if prefer_shape_preservation {
            r1 = MAXIMUM_CONTROL_PARAMETER;
        }
    }

    if convex || concave {
        if !(is_zero(s_m_d_l) || is_zero(d_r_m_s)) {
            r2 = (d_r_m_d_l / d_r_m_s).abs().max((d_r_m_d_l / s_m_d_l).abs());
        } else if prefer_shape_preservation {
            r2 = MAXIMUM_CONTROL_PARAMETER;
        }
    } else if monotonic && prefer_shape_preservation {
        // e.g. a flat segment with negative slopes at both ends
        r2 = MAXIMUM_CONTROL_PARAMETER;
    }

    minimum_control_parameter_value().max(r1.max(r2))
}
