//! Seasonal Decomposition Module
//!
//! This module splits a regularly sampled series into trend, seasonal and
//! residual components. The default method is a robust STL (Seasonal and Trend
//! decomposition using Loess); a classical moving-average decomposition is
//! kept for quick looks at short series.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::{Error, Result};
use crate::time_series::loess::{bisquare_weights, loess_estimate, loess_smooth, LoessDegree};

/// Seasonal decomposition methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecompositionMethod {
    /// STL with robustness iterations
    Stl,
    /// Additive decomposition around a moving-average trend
    Classical,
}

impl DecompositionMethod {
    /// Decomposer with default parameters for this method
    pub fn decomposer(&self) -> Box<dyn Decomposer> {
        match self {
            DecompositionMethod::Stl => Box::new(StlDecomposer::default()),
            DecompositionMethod::Classical => Box::new(ClassicalDecomposer),
        }
    }
}

impl FromStr for DecompositionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "stl" => Ok(DecompositionMethod::Stl),
            "classical" | "additive" => Ok(DecompositionMethod::Classical),
            other => Err(Error::InvalidInput(format!(
                "Unknown decomposition method: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DecompositionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecompositionMethod::Stl => write!(f, "stl"),
            DecompositionMethod::Classical => write!(f, "classical"),
        }
    }
}

/// Result of seasonal decomposition.
///
/// All four series have the same length and `trend + seasonal + residual`
/// reproduces `observed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decomposition {
    pub observed: Vec<f64>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    /// Seasonal period used
    pub period: usize,
}

/// Decomposition quality metrics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecompositionMetrics {
    /// `1 - Var(residual) / Var(trend + residual)`, clamped at zero
    pub trend_strength: f64,
    /// `1 - Var(residual) / Var(seasonal + residual)`, clamped at zero
    pub seasonal_strength: f64,
}

impl Decomposition {
    fn from_components(observed: &[f64], trend: Vec<f64>, seasonal: Vec<f64>, period: usize) -> Self {
        let residual = observed
            .iter()
            .zip(trend.iter().zip(&seasonal))
            .map(|(y, (t, s))| y - t - s)
            .collect();
        Decomposition {
            observed: observed.to_vec(),
            trend,
            seasonal,
            residual,
            period,
        }
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    /// Reconstruct the original series from components
    pub fn reconstruct(&self) -> Vec<f64> {
        self.trend
            .iter()
            .zip(&self.seasonal)
            .zip(&self.residual)
            .map(|((t, s), r)| t + s + r)
            .collect()
    }

    /// Strength of trend and seasonality
    pub fn metrics(&self) -> DecompositionMetrics {
        let residual_var = variance(&self.residual);
        let strength = |component: &[f64]| {
            let combined: Vec<f64> = component
                .iter()
                .zip(&self.residual)
                .map(|(c, r)| c + r)
                .collect();
            let total = variance(&combined);
            if total > 0.0 {
                (1.0 - residual_var / total).max(0.0)
            } else {
                0.0
            }
        };

        DecompositionMetrics {
            trend_strength: strength(&self.trend),
            seasonal_strength: strength(&self.seasonal),
        }
    }
}

/// A numeric seasonal decomposition algorithm
pub trait Decomposer {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Decompose `values` with the given seasonal period
    fn decompose(&self, values: &[f64], period: usize) -> Result<Decomposition>;
}

/// STL decomposition
#[derive(Debug, Clone)]
pub struct StlDecomposer {
    seasonal: usize,
    trend: Option<usize>,
    low_pass: Option<usize>,
    inner_iter: usize,
    outer_iter: usize,
    robust: bool,
}

impl Default for StlDecomposer {
    fn default() -> Self {
        Self {
            seasonal: 7,
            trend: None,
            low_pass: None,
            inner_iter: 2,
            outer_iter: 15,
            robust: true,
        }
    }
}

impl StlDecomposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the seasonal smoother length (odd, at least 3)
    pub fn with_seasonal(mut self, seasonal: usize) -> Self {
        self.seasonal = seasonal;
        self
    }

    /// Set the trend smoother length (odd, greater than the period)
    pub fn with_trend(mut self, trend: usize) -> Self {
        self.trend = Some(trend);
        self
    }

    /// Toggle robustness iterations
    pub fn with_robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    fn trend_length(&self, period: usize) -> usize {
        self.trend.unwrap_or_else(|| {
            let raw = (1.5 * period as f64 / (1.0 - 1.5 / self.seasonal as f64)).ceil() as usize;
            next_odd(raw)
        })
    }

    fn low_pass_length(&self, period: usize) -> usize {
        self.low_pass.unwrap_or_else(|| next_odd(period + 1))
    }

    fn validate(&self, values: &[f64], period: usize) -> Result<(usize, usize)> {
        if period < 2 {
            return Err(Error::InvalidInput(
                "period must be a positive integer >= 2".to_string(),
            ));
        }
        if values.len() < 2 * period {
            return Err(Error::InsufficientData(format!(
                "STL needs at least {} observations for period {}, got {}",
                2 * period,
                period,
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(
                "STL requires finite values without gaps".to_string(),
            ));
        }
        if self.seasonal < 3 || self.seasonal % 2 == 0 {
            return Err(Error::InvalidInput(
                "seasonal must be an odd positive integer >= 3".to_string(),
            ));
        }

        let trend = self.trend_length(period);
        let low_pass = self.low_pass_length(period);
        if trend <= period || trend % 2 == 0 {
            return Err(Error::InvalidInput(
                "trend must be an odd positive integer > period".to_string(),
            ));
        }
        if low_pass <= period || low_pass % 2 == 0 {
            return Err(Error::InvalidInput(
                "low_pass must be an odd positive integer > period".to_string(),
            ));
        }
        Ok((trend, low_pass))
    }

    /// One pass of the inner loop: update seasonal, then trend
    fn inner_loop(
        &self,
        y: &[f64],
        period: usize,
        lengths: (usize, usize),
        robustness: Option<&[f64]>,
        trend: &mut Vec<f64>,
        seasonal: &mut [f64],
    ) {
        let (trend_len, low_pass_len) = lengths;
        for _ in 0..self.inner_iter {
            let detrended: Vec<f64> = y.iter().zip(trend.iter()).map(|(v, t)| v - t).collect();
            let cycle = cycle_subseries(&detrended, period, self.seasonal, robustness);

            let low = moving_average(&moving_average(&moving_average(&cycle, period), period), 3);
            let low = loess_smooth(&low, low_pass_len, LoessDegree::Linear, None);

            for (i, s) in seasonal.iter_mut().enumerate() {
                *s = cycle[period + i] - low[i];
            }

            let deseasonalized: Vec<f64> = y.iter().zip(seasonal.iter()).map(|(v, s)| v - s).collect();
            *trend = loess_smooth(&deseasonalized, trend_len, LoessDegree::Linear, robustness);
        }
    }
}

impl Decomposer for StlDecomposer {
    fn name(&self) -> &'static str {
        "stl"
    }

    fn decompose(&self, values: &[f64], period: usize) -> Result<Decomposition> {
        let lengths = self.validate(values, period)?;
        let n = values.len();

        let mut trend = vec![0.0; n];
        let mut seasonal = vec![0.0; n];
        let mut weights: Option<Vec<f64>> = None;
        let outer = if self.robust { self.outer_iter } else { 0 };

        for pass in 0..=outer {
            self.inner_loop(values, period, lengths, weights.as_deref(), &mut trend, &mut seasonal);
            if pass == outer {
                break;
            }
            let residual: Vec<f64> = values
                .iter()
                .zip(trend.iter().zip(&seasonal))
                .map(|(y, (t, s))| y - t - s)
                .collect();
            weights = Some(bisquare_weights(&residual));
        }

        log::debug!(
            "stl decomposition of {} points, period {}, trend {}, low pass {}",
            n,
            period,
            lengths.0,
            lengths.1
        );

        Ok(Decomposition::from_components(values, trend, seasonal, period))
    }
}

/// Classical additive decomposition around a moving-average trend
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicalDecomposer;

impl Decomposer for ClassicalDecomposer {
    fn name(&self) -> &'static str {
        "classical"
    }

    fn decompose(&self, values: &[f64], period: usize) -> Result<Decomposition> {
        if period < 2 {
            return Err(Error::InvalidInput(
                "period must be a positive integer >= 2".to_string(),
            ));
        }
        if values.len() < 2 * period {
            return Err(Error::InsufficientData(format!(
                "Need at least {} observations for period {}",
                2 * period,
                period
            )));
        }

        // Centred window, truncated at the edges
        let half = period / 2;
        let trend: Vec<f64> = (0..values.len())
            .map(|i| {
                let start = i.saturating_sub(half);
                let end = (i + half + 1).min(values.len());
                let window: Vec<f64> = values[start..end].iter().copied().filter(|v| v.is_finite()).collect();
                if window.is_empty() {
                    f64::NAN
                } else {
                    window.iter().sum::<f64>() / window.len() as f64
                }
            })
            .collect();

        let mut pattern = vec![0.0; period];
        let mut counts = vec![0usize; period];
        for (i, (v, t)) in values.iter().zip(&trend).enumerate() {
            let d = v - t;
            if d.is_finite() {
                pattern[i % period] += d;
                counts[i % period] += 1;
            }
        }
        for (p, c) in pattern.iter_mut().zip(&counts) {
            if *c > 0 {
                *p /= *c as f64;
            }
        }

        // Seasonal component sums to zero over one period
        let mean = pattern.iter().sum::<f64>() / period as f64;
        for p in &mut pattern {
            *p -= mean;
        }

        let seasonal = (0..values.len()).map(|i| pattern[i % period]).collect();
        Ok(Decomposition::from_components(values, trend, seasonal, period))
    }
}

/// Smooth each cycle-subseries and extend it by one period on both ends.
///
/// The result has `n + 2 * period` points; position `period + i` lines up with
/// input position `i`.
fn cycle_subseries(
    w: &[f64],
    period: usize,
    seasonal_len: usize,
    robustness: Option<&[f64]>,
) -> Vec<f64> {
    let n = w.len();
    let mut out = vec![0.0; n + 2 * period];

    for j in 0..period {
        let sub: Vec<f64> = (j..n).step_by(period).map(|i| w[i]).collect();
        let sub_weights: Option<Vec<f64>> =
            robustness.map(|rw| (j..n).step_by(period).map(|i| rw[i]).collect());
        let k = sub.len();
        if k == 0 {
            continue;
        }

        let smoothed = loess_smooth(&sub, seasonal_len, LoessDegree::Linear, sub_weights.as_deref());
        let right = seasonal_len.min(k) - 1;
        let before = loess_estimate(
            &sub,
            seasonal_len,
            LoessDegree::Linear,
            -1.0,
            0,
            right,
            sub_weights.as_deref(),
        )
        .unwrap_or(smoothed[0]);
        let left = k.saturating_sub(seasonal_len);
        let after = loess_estimate(
            &sub,
            seasonal_len,
            LoessDegree::Linear,
            k as f64,
            left,
            k - 1,
            sub_weights.as_deref(),
        )
        .unwrap_or(smoothed[k - 1]);

        out[j] = before;
        for (m, v) in smoothed.iter().enumerate() {
            out[(m + 1) * period + j] = *v;
        }
        out[(k + 1) * period + j] = after;
    }

    out
}

/// Trailing moving average of window `len`; output has `n - len + 1` points
fn moving_average(x: &[f64], len: usize) -> Vec<f64> {
    if len == 0 || x.len() < len {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(x.len() - len + 1);
    let mut sum: f64 = x[..len].iter().sum();
    out.push(sum / len as f64);
    for i in len..x.len() {
        sum += x[i] - x[i - len];
        out.push(sum / len as f64);
    }
    out
}

fn next_odd(v: usize) -> usize {
    if v % 2 == 0 {
        v + 1
    } else {
        v
    }
}

fn variance(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / finite.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn create_test_seasonal_series(n: usize, period: usize) -> Vec<f64> {
        (0..n)
            .map(|t| {
                let noise = 0.01 * (((t * 7919) % 13) as f64 - 6.0) / 6.0;
                10.0 + 0.1 * t as f64 + 3.0 * (2.0 * PI * t as f64 / period as f64).sin() + noise
            })
            .collect()
    }

    #[test]
    fn test_stl_components_sum_to_observed() {
        let values = create_test_seasonal_series(120, 12);
        let result = StlDecomposer::default().decompose(&values, 12).unwrap();

        assert_eq!(result.len(), 120);
        for (y, r) in values.iter().zip(result.reconstruct()) {
            assert!((y - r).abs() < 1e-9);
        }
    }

    #[test]
    fn test_stl_recovers_seasonality() {
        let values = create_test_seasonal_series(120, 12);
        let result = StlDecomposer::default().decompose(&values, 12).unwrap();

        let max_residual = result.residual.iter().fold(0.0f64, |m, r| m.max(r.abs()));
        assert!(max_residual < 0.5, "residual too large: {}", max_residual);

        let max_seasonal = result.seasonal.iter().fold(f64::MIN, |m, s| m.max(*s));
        assert!((max_seasonal - 3.0).abs() < 0.5);

        let metrics = result.metrics();
        assert!(metrics.seasonal_strength > 0.9);
        assert!(metrics.trend_strength > 0.9);
    }

    #[test]
    fn test_stl_parameter_defaults() {
        let stl = StlDecomposer::default();
        // ceil(1.5 * 7 / (1 - 1.5 / 7)) = 14 -> 15
        assert_eq!(stl.trend_length(7), 15);
        assert_eq!(stl.low_pass_length(7), 9);
        assert_eq!(stl.low_pass_length(12), 13);
    }

    #[test]
    fn test_stl_rejects_bad_input() {
        let stl = StlDecomposer::default();
        let values = create_test_seasonal_series(30, 12);

        assert!(matches!(stl.decompose(&values, 1), Err(Error::InvalidInput(_))));
        assert!(matches!(
            stl.decompose(&values[..20], 12),
            Err(Error::InsufficientData(_))
        ));

        let mut gappy = values.clone();
        gappy[3] = f64::NAN;
        assert!(stl.decompose(&gappy, 12).is_err());
    }

    #[test]
    fn test_classical_decomposition() {
        let values = create_test_seasonal_series(48, 12);
        let result = ClassicalDecomposer.decompose(&values, 12).unwrap();

        let seasonal_sum: f64 = result.seasonal[..12].iter().sum();
        assert!(seasonal_sum.abs() < 1e-9);
        for (y, r) in values.iter().zip(result.reconstruct()) {
            assert!((y - r).abs() < 1e-9);
        }
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(
            "STL".parse::<DecompositionMethod>().unwrap(),
            DecompositionMethod::Stl
        );
        assert_eq!(DecompositionMethod::Classical.decomposer().name(), "classical");
        assert!("x13".parse::<DecompositionMethod>().is_err());
    }
}
