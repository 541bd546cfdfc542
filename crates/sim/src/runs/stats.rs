//! Two-sample Welch's t-test used by the run-count experiments.

use std::f64::consts::PI;

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEFFICIENTS: [f64; 9] = [
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

const CONTINUED_FRACTION_MAX_ITER: usize = 300;
const CONTINUED_FRACTION_EPS: f64 = 3.0e-16;
const FLOAT_MIN: f64 = 1.0e-300;

/// Outcome of a Welch's t-test between sample `a` and sample `b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchTest {
    pub mean_a: f64,
    pub mean_b: f64,
    /// Two-sided p-value; NaN when both samples have zero variance
    pub p_value: f64,
}

impl WelchTest {
    /// NaN p-values never count as significant.
    #[inline]
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

fn mean_and_variance(sample: &[f64]) -> (f64, f64) {
    let n = sample.len() as f64;
    let (sum, sum_sq) = sample
        .iter()
        .fold((0.0, 0.0), |(s, sq), &x| (s + x, sq + x * x));
    let mean = sum / n;
    // Population variance; clamp rounding noise below zero
    let variance = (sum_sq / n - mean * mean).max(0.0);
    (mean, variance)
}

/// Welch's unequal-variance t-test. Both samples must be non-empty; a
/// sample with a single value contributes zero variance.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> WelchTest {
    if a.is_empty() || b.is_empty() {
        return WelchTest {
            mean_a: f64::NAN,
            mean_b: f64::NAN,
            p_value: f64::NAN,
        };
    }

    let (mean_a, var_a) = mean_and_variance(a);
    let (mean_b, var_b) = mean_and_variance(b);
    let (n_a, n_b) = (a.len() as f64, b.len() as f64);

    if var_a + var_b == 0.0 || n_a < 2.0 || n_b < 2.0 {
        return WelchTest {
            mean_a,
            mean_b,
            p_value: f64::NAN,
        };
    }

    let se_a = var_a / n_a;
    let se_b = var_b / n_b;
    let t = (mean_a - mean_b) / (se_a + se_b).sqrt();
    let df = (se_a + se_b).powi(2) / (se_a * se_a / (n_a - 1.0) + se_b * se_b / (n_b - 1.0));

    WelchTest {
        mean_a,
        mean_b,
        p_value: student_t_two_sided_p(t, df),
    }
}

/// `P(|T| > |t|)` for Student's t with `df` degrees of freedom.
pub fn student_t_two_sided_p(t: f64, df: f64) -> f64 {
    if t.is_nan() || !(df > 0.0) {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    regularized_incomplete_beta(df / 2.0, 0.5, df / (df + t * t))
}

fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let series = LANCZOS_COEFFICIENTS
        .iter()
        .enumerate()
        .skip(1)
        .fold(LANCZOS_COEFFICIENTS[0], |acc, (i, &c)| acc + c / (x + i as f64));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}

/// `I_x(a, b)`, the regularized incomplete beta function.
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front =
        ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    let clamp = |v: f64| if v.abs() < FLOAT_MIN { FLOAT_MIN } else { v };

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 / clamp(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=CONTINUED_FRACTION_MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / clamp(1.0 + aa * d);
        c = clamp(1.0 + aa / c);
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / clamp(1.0 + aa * d);
        c = clamp(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < CONTINUED_FRACTION_EPS {
            break;
        }
    }

    h
}
