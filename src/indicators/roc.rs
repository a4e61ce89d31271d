// =============================================================================
// Rate of Change — Guarded day-over-day percentage helpers
// =============================================================================
//
//   change% = ((current - prior) / prior) * 100
//
// A prior value of zero yields 0.0 instead of a non-finite result.

/// Percentage change from `prior` to `current`.
pub fn pct_change(prior: f64, current: f64) -> f64 {
    if prior == 0.0 || !prior.is_finite() || !current.is_finite() {
        return 0.0;
    }
    (current - prior) * 100.0 / prior
}

/// Mean of the last `window` values of `series`, or `None` when `series` is
/// empty or `window` is zero.
pub fn trailing_mean(series: &[f64], window: usize) -> Option<f64> {
    if window == 0 || series.is_empty() {
        return None;
    }
    let start = series.len().saturating_sub(window);
    let tail = &series[start..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}
