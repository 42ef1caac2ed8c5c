// Two-sample comparison of strategy outcomes
use statrs::function::beta::checked_beta_reg;

/// Result of an independent two-sample t-test
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TTestResult {
    pub statistic: f64,
    pub p_value: f64,
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample variance (n - 1 denominator)
fn variance(xs: &[f64], mean: f64) -> f64 {
    xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (xs.len() as f64 - 1.0)
}

/// Two-sided tail probability of Student's t with `df` degrees of freedom
fn two_sided_p(t: f64, df: f64) -> f64 {
    if t.is_nan() {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    // P(|T| > |t|) = I_{df / (df + t^2)}(df / 2, 1 / 2)
    let x = df / (df + t * t);
    checked_beta_reg(df / 2.0, 0.5, x).unwrap_or(f64::NAN)
}

/// Independent two-sample t-test assuming equal population variances
///
/// Degenerate inputs follow IEEE arithmetic the way scipy's `ttest_ind`
/// does: fewer than one degree of freedom gives NaN, zero pooled variance
/// gives NaN for equal means and an infinite statistic (p = 0) otherwise.
pub fn ttest_ind(a: &[f64], b: &[f64]) -> TTestResult {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let df = n1 + n2 - 2.0;
    if a.is_empty() || b.is_empty() || df <= 0.0 {
        return TTestResult {
            statistic: f64::NAN,
            p_value: f64::NAN,
        };
    }

    let (m1, m2) = (mean(a), mean(b));
    // A single observation contributes no spread
    let ss1 = if a.len() > 1 { variance(a, m1) * (n1 - 1.0) } else { 0.0 };
    let ss2 = if b.len() > 1 { variance(b, m2) * (n2 - 1.0) } else { 0.0 };
    let pooled = (ss1 + ss2) / df;
    let denom = (pooled * (1.0 / n1 + 1.0 / n2)).sqrt();

    let statistic = (m1 - m2) / denom;
    TTestResult {
        statistic,
        p_value: two_sided_p(statistic, df),
    }
}
