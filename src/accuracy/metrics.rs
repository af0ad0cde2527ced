//! Statistical error metrics over matched (predicted, actual) pairs.
//!
//! All functions are pure, take slices of `(predicted, actual)` tuples,
//! and guard their own degenerate cases so the evaluator can compose
//! them without pre-checks.

// ---------------------------------------------------------------------------
// Error metrics
// ---------------------------------------------------------------------------

/// Mean absolute error, in price units.
pub fn mean_absolute_error(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let sum: f64 = pairs.iter().map(|(p, a)| (a - p).abs()).sum();
    sum / pairs.len() as f64
}

/// Root mean squared error, in price units.
pub fn root_mean_squared_error(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let sum: f64 = pairs.iter().map(|(p, a)| (a - p).powi(2)).sum();
    (sum / pairs.len() as f64).sqrt()
}

/// Mean absolute percentage error (0–100+).
///
/// Pairs with a zero actual are excluded from the mean. When every pair
/// is excluded the percentage error is unknowable, which is reported as
/// the worst case (100.0) rather than a flattering zero.
pub fn mean_absolute_percentage_error(pairs: &[(f64, f64)]) -> f64 {
    let qualifying: Vec<f64> = pairs
        .iter()
        .filter(|(_, a)| *a != 0.0)
        .map(|(p, a)| ((a - p) / a).abs())
        .collect();

    if qualifying.is_empty() {
        return 100.0;
    }
    qualifying.iter().sum::<f64>() / qualifying.len() as f64 * 100.0
}

/// Fraction of variance in actuals explained by the predictions.
///
/// 0.0 when there are fewer than 2 samples or the actuals have no
/// variance. Can go negative for predictions worse than the mean.
pub fn r_squared(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return 0.0;
    }
    let mean_actual = pairs.iter().map(|(_, a)| a).sum::<f64>() / pairs.len() as f64;
    let ss_tot: f64 = pairs.iter().map(|(_, a)| (a - mean_actual).powi(2)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = pairs.iter().map(|(p, a)| (a - p).powi(2)).sum();
    1.0 - ss_res / ss_tot
}

/// Percentage of pairs whose predicted direction of movement matched the
/// realized direction.
///
/// The baseline for each pair is the previous pair's realized close, so
/// the first pair has nothing to compare against and comparisons run
/// over `n - 1` pairs. Returns 0.0 with fewer than 2 pairs.
pub fn directional_accuracy(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return 0.0;
    }

    let matches = pairs
        .windows(2)
        .filter(|w| {
            let previous = w[0].1;
            let (predicted, actual) = w[1];
            sign(actual - previous) == sign(predicted - previous)
        })
        .count();

    matches as f64 / (pairs.len() - 1) as f64 * 100.0
}

fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// Composite confidence
// ---------------------------------------------------------------------------

/// Composite confidence score (0–100) blending absolute error,
/// percentage error, and variance explained.
pub fn confidence_score(mae: f64, mape: f64, r_squared: f64) -> f64 {
    let mae_component = 0.3 * (100.0 - mae * 5.0).max(0.0);
    let mape_component = 0.4 * (100.0 - mape * 2.0).max(0.0);
    let fit_component = 0.3 * (r_squared * 100.0);
    (mae_component + mape_component + fit_component).clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
