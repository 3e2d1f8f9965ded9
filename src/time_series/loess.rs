//! Locally weighted regression on equally spaced points
//!
//! Points sit at positions `0..n`. Every fit uses tricube distance weights over a
//! window of `len` neighbours, optionally multiplied by robustness weights, and a
//! local polynomial of degree 0 or 1.

/// Degree of the local polynomial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoessDegree {
    /// Weighted local mean
    Constant,
    /// Weighted local line
    Linear,
}

/// Estimate the smoothed value at position `x` from `y[left..=right]`.
///
/// `len` is the nominal window length; when it exceeds the series length the
/// bandwidth is widened accordingly. Returns `None` when every weight in the
/// window is zero.
pub fn loess_estimate(
    y: &[f64],
    len: usize,
    degree: LoessDegree,
    x: f64,
    left: usize,
    right: usize,
    robustness: Option<&[f64]>,
) -> Option<f64> {
    let n = y.len();
    if n == 0 || left > right || right >= n {
        return None;
    }

    let span = (n - 1) as f64;
    let mut h = (x - left as f64).max(right as f64 - x);
    if len > n {
        h += ((len - n) / 2) as f64;
    }
    let h9 = 0.999 * h;
    let h1 = 0.001 * h;

    let mut weights = vec![0.0; right - left + 1];
    let mut total = 0.0;
    for (k, j) in (left..=right).enumerate() {
        let r = (j as f64 - x).abs();
        if r <= h9 {
            let mut w = if r <= h1 {
                1.0
            } else {
                (1.0 - (r / h).powi(3)).powi(3)
            };
            if let Some(rw) = robustness {
                w *= rw[j];
            }
            weights[k] = w;
            total += w;
        }
    }
    if total <= 0.0 {
        return None;
    }
    for w in &mut weights {
        *w /= total;
    }

    if h > 0.0 && degree == LoessDegree::Linear {
        let center: f64 = (left..=right)
            .zip(&weights)
            .map(|(j, w)| w * j as f64)
            .sum();
        let spread: f64 = (left..=right)
            .zip(&weights)
            .map(|(j, w)| w * (j as f64 - center).powi(2))
            .sum();
        if spread.sqrt() > 0.001 * span {
            let slope = (x - center) / spread;
            for (j, w) in (left..=right).zip(weights.iter_mut()) {
                *w *= slope * (j as f64 - center) + 1.0;
            }
        }
    }

    Some((left..=right).zip(&weights).map(|(j, w)| w * y[j]).sum())
}

/// Smooth a whole series with a sliding window of `len` neighbours.
///
/// Points where the fit is undefined keep their input value.
pub fn loess_smooth(
    y: &[f64],
    len: usize,
    degree: LoessDegree,
    robustness: Option<&[f64]>,
) -> Vec<f64> {
    let n = y.len();
    if n < 2 {
        return y.to_vec();
    }

    let mut out = Vec::with_capacity(n);
    if len >= n {
        for i in 0..n {
            let fit = loess_estimate(y, len, degree, i as f64, 0, n - 1, robustness);
            out.push(fit.unwrap_or(y[i]));
        }
        return out;
    }

    let half = (len + 1) / 2;
    let mut left = 0;
    let mut right = len - 1;
    for i in 0..n {
        if i + 1 > half && right != n - 1 {
            left += 1;
            right += 1;
        }
        let fit = loess_estimate(y, len, degree, i as f64, left, right, robustness);
        out.push(fit.unwrap_or(y[i]));
    }
    out
}

/// Bisquare robustness weights from residuals, scaled by six times the median
/// absolute residual
pub fn bisquare_weights(residuals: &[f64]) -> Vec<f64> {
    let mut abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
    if abs.is_empty() {
        return Vec::new();
    }
    let mut sorted = abs.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let h = 6.0 * median;
    let low = 0.001 * h;
    let high = 0.999 * h;
    for r in &mut abs {
        *r = if *r <= low {
            1.0
        } else if *r <= high {
            (1.0 - (*r / h).powi(2)).powi(2)
        } else {
            0.0
        };
    }
    abs
}
