//! Standard normal distribution
//!
//! Stateless density, cumulative distribution and quantile functions.
//! The CDF switches to the Abramowitz-Stegun asymptotic expansion (26.2.12)
//! deep in the lower tail, where `1 - cdf(-z)` would cancel catastrophically.
//! The quantile is Wichura's AS241 (PPND16).

use statrs::function::erf::erfc;

const ONE_OVER_SQRT_TWO: f64 = std::f64::consts::FRAC_1_SQRT_2;
const ONE_OVER_SQRT_TWO_PI: f64 = 0.398_942_280_401_432_677_939_946_059_934_381_868_5;

/// Below this the asymptotic expansion replaces erfc
const ASYMPTOTIC_EXPANSION_FIRST_THRESHOLD: f64 = -10.0;

/// -1/sqrt(eps): below this the series is exactly 1 in double precision
fn asymptotic_expansion_second_threshold() -> f64 {
    -1.0 / f64::EPSILON.sqrt()
}

/// Standard normal PDF
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    ONE_OVER_SQRT_TWO_PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF
pub fn norm_cdf(z: f64) -> f64 {
    if z <= ASYMPTOTIC_EXPANSION_FIRST_THRESHOLD {
        let mut sum = 1.0;
        if z >= asymptotic_expansion_second_threshold() {
            let zsqr = z * z;
            let mut i = 1.0;
            let mut g = 1.0;
            let mut a = f64::MAX;
            loop {
                let last_a = a;
                let x = (4.0 * i - 3.0) / zsqr;
                let y = x * ((4.0 * i - 1.0) / zsqr);
                a = g * (x - y);
                sum -= a;
                g *= y;
                i += 1.0;
                a = a.abs();
                if !(last_a > a && a >= (sum * f64::EPSILON).abs()) {
                    break;
                }
            }
        }
        return -norm_pdf(z) * sum / z;
    }
    0.5 * erfc(-z * ONE_OVER_SQRT_TWO)
}

// AS241 coefficients, p close to 0.5
const A: [f64; 8] = [
    3.387_132_872_796_366_608_0E0,
    1.331_416_678_917_843_774_5E2,
    1.971_590_950_306_551_442_7E3,
    1.373_169_376_550_946_112_5E4,
    4.592_195_393_154_987_145_7E4,
    6.726_577_092_700_870_085_3E4,
    3.343_057_558_358_812_810_5E4,
    2.509_080_928_730_122_672_7E3,
];
const B: [f64; 8] = [
    1.0,
    4.231_333_070_160_091_125_2E1,
    6.871_870_074_920_579_083_0E2,
    5.394_196_021_424_751_107_7E3,
    2.121_379_430_158_659_586_7E4,
    3.930_789_580_009_271_061_0E4,
    2.872_908_573_572_194_267_4E4,
    5.226_495_278_852_854_561_0E3,
];
// p not close to 0, 0.5 or 1
const C: [f64; 8] = [
    1.423_437_110_749_683_577_34E0,
    4.630_337_846_156_545_295_90E0,
    5.769_497_221_460_691_405_50E0,
    3.647_848_324_763_204_605_04E0,
    1.270_458_252_452_368_382_58E0,
    2.417_807_251_774_506_117_70E-1,
    2.272_384_498_926_918_458_33E-2,
    7.745_450_142_783_414_076_40E-4,
];
const D: [f64; 8] = [
    1.0,
    2.053_191_626_637_758_821_87E0,
    1.676_384_830_183_803_849_40E0,
    6.897_673_349_851_000_045_50E-1,
    1.481_039_764_274_800_745_90E-1,
    1.519_866_656_361_645_719_66E-2,
    5.475_938_084_995_344_946_00E-4,
    1.050_750_071_644_416_843_24E-9,
];
// p very close to 0 or 1
const E: [f64; 8] = [
    6.657_904_643_501_103_777_20E0,
    5.463_784_911_164_114_369_90E0,
    1.784_826_539_917_291_335_80E0,
    2.965_605_718_285_048_912_30E-1,
    2.653_218_952_657_612_309_30E-2,
    1.242_660_947_388_078_438_60E-3,
    2.711_555_568_743_487_578_15E-5,
    2.010_334_399_292_288_132_65E-7,
];
const F: [f64; 8] = [
    1.0,
    5.998_322_065_558_879_376_90E-1,
    1.369_298_809_227_358_053_10E-1,
    1.487_536_129_085_061_485_25E-2,
    7.868_691_311_456_132_591_00E-4,
    1.846_318_317_510_054_681_80E-5,
    1.421_511_758_316_445_888_70E-7,
    2.044_263_103_389_939_785_64E-15,
];

const SPLIT1: f64 = 0.425;
const SPLIT2: f64 = 5.0;
const CONST1: f64 = 0.180625;
const CONST2: f64 = 1.6;

/// Horner evaluation, coefficients in ascending order
#[inline]
fn poly(c: &[f64; 8], x: f64) -> f64 {
    c.iter().rev().fold(0.0, |acc, &ci| acc * x + ci)
}

/// Inverse standard normal CDF (AS241)
///
/// Accurate to about 1 part in 10^16. Outside (0, 1) returns `ln(u)` or
/// `ln(1-u)`, i.e. -inf/NaN sentinels instead of panicking.
pub fn inverse_norm_cdf(u: f64) -> f64 {
    if u <= 0.0 {
        return u.ln();
    }
    if u >= 1.0 {
        return (1.0 - u).ln();
    }

    let q = u - 0.5;
    if q.abs() <= SPLIT1 {
        let r = CONST1 - q * q;
        return q * poly(&A, r) / poly(&B, r);
    }

    let mut r = if q < 0.0 { u } else { 1.0 - u };
    r = (-r.ln()).sqrt();
    let ret = if r < SPLIT2 {
        let r = r - CONST2;
        poly(&C, r) / poly(&D, r)
    } else {
        let r = r - SPLIT2;
        poly(&E, r) / poly(&F, r)
    };
    if q < 0.0 {
        -ret
    } else {
        ret
    }
}
