//! Numeric primitives shared by the profiling functions.
//!
//! Quantiles use linear interpolation between closest ranks, so
//! `quantile(&[1, 2, 3, 4], 0.25) == 1.75`.

use polars::prelude::*;

/// Multiplier applied to the IQR to place the Tukey fences.
pub const FENCE_FACTOR: f64 = 1.5;

pub fn chunked(values: &[f64]) -> Float64Chunked {
    Float64Chunked::from_slice(PlSmallStr::EMPTY, values)
}

pub fn quantile(ca: &Float64Chunked, q: f64) -> Option<f64> {
    ca.quantile(q, QuantileMethod::Linear).ok().flatten()
}

/// Quartiles and Tukey fences of a non-empty sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fences {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Fences {
    pub fn of(values: &[f64]) -> Option<Self> {
        let ca = chunked(values);
        let q1 = quantile(&ca, 0.25)?;
        let median = quantile(&ca, 0.5)?;
        let q3 = quantile(&ca, 0.75)?;
        let iqr = q3 - q1;
        Some(Self {
            q1,
            median,
            q3,
            iqr,
            lower: q1 - FENCE_FACTOR * iqr,
            upper: q3 + FENCE_FACTOR * iqr,
        })
    }

    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }

    pub fn count_outliers(&self, values: &[f64]) -> usize {
        values.iter().filter(|&&v| self.is_outlier(v)).count()
    }

    /// Extremes of the values strictly between the fences.
    ///
    /// When no value lies strictly inside, the sample's own min/max are
    /// returned.
    pub fn whiskers(&self, values: &[f64]) -> Option<(f64, f64)> {
        min_max(
            values
                .iter()
                .copied()
                .filter(|&v| v > self.lower && v < self.upper),
        )
        .or_else(|| min_max(values.iter().copied()))
    }
}

pub fn min_max(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    values.into_iter().fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Equal-width histogram with `bins + 1` edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Bins finite values over `[min, max]`; the last bin is closed on the right.
///
/// An empty sample spans `[0, 1]` and a constant one `[v - 0.5, v + 0.5]`.
pub fn histogram(values: &[f64], bins: usize) -> Histogram {
    let bins = bins.max(1);
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (lo, hi) = match min_max(finite.iter().copied()) {
        None => (0.0, 1.0),
        Some((lo, hi)) if is_constant(lo, hi) => (lo - 0.5, hi + 0.5),
        Some(range) => range,
    };

    let step = (hi - lo) / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|i| lo + step * i as f64).collect();
    edges.push(hi);

    let mut counts = vec![0usize; bins];
    for v in finite {
        let mut idx = (((v - lo) / (hi - lo)) * bins as f64) as usize;
        idx = idx.min(bins - 1);
        // Floating-point error can land a value one bin off its edges
        if idx > 0 && edges.get(idx).is_some_and(|&e| v < e) {
            idx -= 1;
        } else if idx + 1 < bins && edges.get(idx + 1).is_some_and(|&e| v >= e) {
            idx += 1;
        }
        if let Some(count) = counts.get_mut(idx) {
            *count += 1;
        }
    }

    Histogram { edges, counts }
}

#[expect(clippy::float_cmp)]
fn is_constant(lo: f64, hi: f64) -> bool {
    lo == hi
}

/// Moments and percentiles reported by `describe`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Description {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub p05: Option<f64>,
    pub p25: Option<f64>,
    pub p50: Option<f64>,
    pub p75: Option<f64>,
    pub p95: Option<f64>,
    pub max: Option<f64>,
}

impl Description {
    pub fn of(values: &[f64]) -> Self {
        let ca = chunked(values);
        let count = values.len();
        Self {
            count,
            mean: ca.mean(),
            // Sample standard deviation is undefined below two values
            std: if count < 2 { None } else { ca.std(1) },
            min: ca.min(),
            p05: quantile(&ca, 0.05),
            p25: quantile(&ca, 0.25),
            p50: quantile(&ca, 0.5),
            p75: quantile(&ca, 0.75),
            p95: quantile(&ca, 0.95),
            max: ca.max(),
        }
    }

    /// Statistics in report order, after `count`.
    pub fn values(&self) -> [Option<f64>; 9] {
        [
            self.mean, self.std, self.min, self.p05, self.p25, self.p50, self.p75, self.p95,
            self.max,
        ]
    }
}
