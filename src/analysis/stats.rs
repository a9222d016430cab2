//! Shared numeric helpers for trajectory analysis.

/// Arithmetic mean.
pub fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population variance.
pub fn variance(xs: &[f64]) -> f64 {
    let m = mean(xs);
    xs.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64
}

/// Percentile with linear interpolation between order statistics
/// (`numpy.percentile` convention), `p` in [0, 100].
pub fn percentile(xs: &[f64], p: f64) -> f64 {
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_of_sorted(&sorted, p)
}

/// Same as `percentile`, for data already sorted ascending.
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = p / 100.0 * (n - 1) as f64;
    let lo = h.floor() as usize;
    let frac = h - lo as f64;
    if lo + 1 == n {
        sorted[lo]
    } else {
        sorted[lo] + frac * (sorted[lo + 1] - sorted[lo])
    }
}

/// Smooth, saturating compression of values outside `[lo, hi]`.
///
/// After recentering on `med`, a value past a bound `b` is remapped to
/// `b·(1 + ln((1 + (x/b)²)/2))`: continuous at the bound and growing only
/// logarithmically beyond it, so extreme outliers are tamed without being
/// discarded. Returns the clipped values and the (below, above) clip counts.
pub fn log_clip(xs: &[f64], med: f64, lo: f64, hi: f64) -> (Vec<f64>, (usize, usize)) {
    let a = lo - med;
    let b = hi - med;
    let mut n_below = 0;
    let mut n_above = 0;
    let clipped = xs
        .iter()
        .map(|&v| {
            let x = v - med;
            let x = if x < a {
                n_below += 1;
                a * (1.0 + ((1.0 + (x / a).powi(2)) / 2.0).ln())
            } else if x > b {
                n_above += 1;
                b * (1.0 + ((1.0 + (x / b).powi(2)) / 2.0).ln())
            } else {
                x
            };
            med + x
        })
        .collect();
    (clipped, (n_below, n_above))
}

/// Estimate the integrated autocorrelation time from the initial positive
/// sequence of the autocorrelation function.
pub fn autocorrelation_time(xs: &[f64]) -> f64 {
    let n = xs.len();
    let m = mean(xs);
    let var = variance(xs);
    if var == 0.0 {
        return 1.0;
    }
    let mut autocorr = 1.0;
    for t in 1..n / 2 {
        let auto_t: f64 = xs[..n - t]
            .iter()
            .zip(xs[t..].iter())
            .map(|(&x, &y)| (x - m) * (y - m))
            .sum::<f64>()
            / ((n - t) as f64 * var);
        if auto_t < 0.0 {
            break;
        }
        autocorr += 2.0 * auto_t;
    }
    autocorr
}

/// Standard error of the mean of a correlated series, by blocking with a
/// block size of twice the autocorrelation time.
pub fn blocking_error(xs: &[f64], autocorrelation_time: f64) -> f64 {
    let block_size = (2.0 * autocorrelation_time).ceil() as usize;
    let n_blocks = xs.len() / block_size;
    if n_blocks < 2 {
        return 0.0;
    }
    let block_means: Vec<f64> = (0..n_blocks)
        .map(|i| {
            let start = i * block_size;
            mean(&xs[start..start + block_size])
        })
        .collect();
    let m = mean(&block_means);
    let var = block_means.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / (n_blocks - 1) as f64;
    (var / n_blocks as f64).sqrt()
}
