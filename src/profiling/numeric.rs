//! Statistics over numeric columns: IQR outliers, boxplots, histograms and
//! percentile descriptions.

use super::ByColumn;
use super::stats::{self, Description, Fences};
use crate::dataset::Table;
use crate::error::{Result, TabulaError};
use crate::utils;
use serde::Serialize;
use serde_json::{Value, json};

/// Decimal places kept by `describe`.
pub const DESCRIBE_PRECISION: i32 = 6;

/// Header row of the `describe` report.
pub const DESCRIBE_HEADER: [&str; 11] = [
    "column", "count", "mean", "std", "min", "5%", "25%", "50%", "75%", "95%", "max",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnOutliers {
    pub column: String,
    pub outliers: usize,
}

/// Values outside the Tukey fences per numeric column, most first.
pub fn outliers(table: &Table) -> Result<Vec<ColumnOutliers>> {
    let mut out = table
        .numeric_columns()
        .map(|c| {
            let values = c.non_null_f64()?;
            let outliers = Fences::of(&values).map_or(0, |f| f.count_outliers(&values));
            Ok(ColumnOutliers {
                column: c.name().to_owned(),
                outliers,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    out.sort_by(|a, b| b.outliers.cmp(&a.outliers));
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Boxplot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub iqr: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
    /// Values outside the fences, in row order
    pub outliers: Vec<f64>,
}

impl Boxplot {
    fn from_values(column: Option<&str>, values: &[f64]) -> Option<Self> {
        let fences = Fences::of(values)?;
        let (min, max) = stats::min_max(values.iter().copied())?;
        let (whisker_low, whisker_high) = fences.whiskers(values)?;
        Some(Self {
            column: column.map(str::to_owned),
            count: values.len(),
            min,
            q1: fences.q1,
            median: fences.median,
            q3: fences.q3,
            max,
            iqr: fences.iqr,
            lower_fence: fences.lower,
            upper_fence: fences.upper,
            whisker_low,
            whisker_high,
            outliers: values
                .iter()
                .copied()
                .filter(|&v| fences.is_outlier(v))
                .collect(),
        })
    }
}

/// Boxplot of one column.
///
/// Fails with `ColumnNotFound` for an unknown name and `NonNumericColumn` for
/// a column that is not numeric or holds no values.
pub fn boxplot(table: &Table, column: &str) -> Result<Boxplot> {
    let values = table.column(column)?.non_null_f64()?;
    Boxplot::from_values(Some(column), &values)
        .ok_or_else(|| TabulaError::NonNumericColumn(column.to_owned()))
}

/// Boxplots of every numeric column that has values, keyed by column.
pub fn boxplots(table: &Table) -> Result<ByColumn<Boxplot>> {
    let mut out = Vec::new();
    for c in table.numeric_columns() {
        if let Some(plot) = Boxplot::from_values(None, &c.non_null_f64()?) {
            out.push((c.name().to_owned(), plot));
        }
    }
    Ok(out.into_iter().collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBins {
    /// `freq.len() + 1` edges
    pub bins: Vec<f64>,
    pub freq: Vec<usize>,
}

/// Histogram of every numeric column, keyed by column; `bins` is clamped like
/// `distribution`.
pub fn histograms(table: &Table, bins: usize) -> Result<ByColumn<HistogramBins>> {
    let bins = super::clamp_bins(bins);
    table
        .numeric_columns()
        .map(|c| {
            let hist = stats::histogram(&c.non_null_f64()?, bins);
            Ok((
                c.name().to_owned(),
                HistogramBins {
                    bins: hist.edges,
                    freq: hist.counts,
                },
            ))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescribeReport {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Count, moments and percentiles per numeric column.
///
/// Undefined statistics are `null`; a table without numeric columns yields
/// an empty header and no rows.
pub fn describe_numeric(table: &Table) -> Result<DescribeReport> {
    let rows = table
        .numeric_columns()
        .map(|c| {
            let d = Description::of(&c.non_null_f64()?);
            let mut row = vec![json!(c.name()), json!(d.count)];
            row.extend(
                d.values()
                    .into_iter()
                    .map(|v| json!(utils::round_opt(v, DESCRIBE_PRECISION))),
            );
            Ok(row)
        })
        .collect::<Result<Vec<_>>>()?;

    let columns = if rows.is_empty() {
        Vec::new()
    } else {
        DESCRIBE_HEADER.iter().map(|s| (*s).to_owned()).collect()
    };
    Ok(DescribeReport { columns, rows })
}
