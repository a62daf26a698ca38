// Small numeric helpers shared by the analyzer, profiler and anomaly detector

use nalgebra::DVector;

use crate::contract::{Trend, TrendDirection};

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1); zero below two observations
pub fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    variance.sqrt()
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let count = sorted.len();
    Some(if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    })
}

pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mean_x = x.iter().take(n).sum::<f64>() / n as f64;
    let mean_y = y.iter().take(n).sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut denom_x = 0.0;
    let mut denom_y = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        num += dx * dy;
        denom_x += dx * dx;
        denom_y += dy * dy;
    }
    if denom_x == 0.0 || denom_y == 0.0 {
        0.0
    } else {
        num / (denom_x.sqrt() * denom_y.sqrt())
    }
}

/// Slopes this small relative to the data's magnitude are rounding noise
const NEGLIGIBLE_SLOPE: f64 = 1e-10;

/// Ordinary least squares of `y` on `[1, x]` from centered sums.
/// Returns (intercept, slope, r2, ss_res); `None` when x has no spread.
pub fn ols_line(x: &[f64], y: &[f64]) -> Option<(f64, f64, f64, f64)> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    let mean_x = mean(x);
    let mean_y = mean(y);
    let xc = DVector::from_iterator(n, x.iter().map(|v| v - mean_x));
    let yc = DVector::from_iterator(n, y.iter().map(|v| v - mean_y));
    let sxx = xc.dot(&xc);
    if sxx <= 0.0 {
        return None;
    }
    let ss_tot = yc.dot(&yc);
    let slope = if ss_tot > 0.0 { xc.dot(&yc) / sxx } else { 0.0 };
    let intercept = mean_y - slope * mean_x;
    if !intercept.is_finite() || !slope.is_finite() {
        return None;
    }

    let residuals = &yc - &xc * slope;
    let ss_res = residuals.dot(&residuals);
    let r2 = if ss_tot > 0.0 { 1.0 - (ss_res / ss_tot) } else { 0.0 };
    Some((intercept, slope, r2.clamp(0.0, 1.0), ss_res))
}

/// Linear trend of `y` against `x` with a two-sided p-value for the slope.
/// Degenerate input (fewer than two points, constant x or y) yields a flat, stable trend.
pub fn linear_trend(x: &[f64], y: &[f64]) -> Trend {
    let Some((_, slope, r2, ss_res)) = ols_line(x, y) else {
        return Trend::flat();
    };
    if is_negligible(slope, x, y) {
        return Trend::flat();
    }

    let n = x.len() as f64;
    let df = n - 2.0;
    let mean_x = mean(x);
    let sxx = x.iter().map(|v| (v - mean_x).powi(2)).sum::<f64>();

    let p_value = if df <= 0.0 {
        1.0
    } else {
        let std_err = (ss_res / df / sxx).sqrt();
        if std_err == 0.0 {
            0.0
        } else {
            student_t_two_sided(slope / std_err, df)
        }
    };

    Trend {
        slope,
        r2,
        p_value,
        direction: TrendDirection::from_slope(slope),
    }
}

/// Change across the whole x range is below rounding error for values of this size
fn is_negligible(slope: f64, x: &[f64], y: &[f64]) -> bool {
    let (lo, hi) = x
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let scale = y.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    slope.abs() * (hi - lo) <= NEGLIGIBLE_SLOPE * scale
}

/// Two-sided tail probability of Student's t with `df` degrees of freedom
pub fn student_t_two_sided(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    let x = df / (df + t * t);
    regularized_incomplete_beta(x, df / 2.0, 0.5).clamp(0.0, 1.0)
}

fn ln_gamma(x: f64) -> f64 {
    // Lanczos approximation, g = 7
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut acc = COEFFS[0];
    let t = x + 7.5;
    for (i, c) in COEFFS.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}

fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(x, a, b) / a
    } else {
        1.0 - front * beta_continued_fraction(1.0 - x, b, a) / b
    }
}

// Modified Lentz evaluation of the incomplete beta continued fraction
fn beta_continued_fraction(x: f64, a: f64, b: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}
