//! Profiling engine.
//!
//! Every function takes the current [`Table`] and returns a serializable
//! payload. Nothing is cached between calls and tables are never mutated.
//!
//! ```
//! use polars::prelude::*;
//! use tabula::dataset::Table;
//! use tabula::profiling;
//!
//! # fn main() -> anyhow::Result<()> {
//! let table = Table::new(df!("x" => &[1.0, 2.0, 3.0, 40.0])?);
//! let outliers = profiling::outliers(&table)?;
//! assert_eq!(outliers[0].outliers, 1);
//! # Ok(())
//! # }
//! ```

pub mod categorical;
pub mod numeric;
pub mod overview;
pub mod stats;


pub use categorical::{Distribution, TopValues, distribution, topk};
pub use numeric::{
    Boxplot, ColumnOutliers, DescribeReport, HistogramBins, boxplot, boxplots, describe_numeric,
    histograms, outliers,
};
pub use overview::{
    ColumnCardinality, ColumnNulls, Duplicates, KindCount, NumericColumns, Summary, cardinality,
    duplicates, nulls_per_column, numeric_columns, summary, types,
};

use crate::dataset::Table;
use crate::error::{Result, TabulaError};
use serde::{Serialize, Serializer};
use serde_json::Value;

pub const DEFAULT_BINS: usize = 20;
pub const DEFAULT_TOP: usize = 50;
pub const DEFAULT_K: usize = 10;

pub fn clamp_bins(bins: usize) -> usize {
    bins.clamp(5, 100)
}

pub fn clamp_top(top: usize) -> usize {
    top.clamp(5, 50)
}

pub fn clamp_k(k: usize) -> usize {
    k.clamp(1, 50)
}

/// Per-column results in table column order, serialized as a JSON object
/// keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct ByColumn<T>(Vec<(String, T)>);

impl<T> ByColumn<T> {
    pub fn get(&self, column: &str) -> Option<&T> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(name, v)| (name.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> FromIterator<(String, T)> for ByColumn<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T: Serialize> Serialize for ByColumn<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, v)| (name, v)))
    }
}

/// Every statistic the engine can compute, named as on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Statistic {
    Summary,
    NullsPerColumn,
    Cardinality,
    Outliers,
    Distribution,
    Types,
    Duplicates,
    NumericColumns,
    Boxplot,
    Describe,
    Histograms,
    Boxplots,
    Topk,
}

/// Optional arguments; only some statistics read them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params {
    pub column: Option<String>,
    pub bins: usize,
    pub top: usize,
    pub k: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            column: None,
            bins: DEFAULT_BINS,
            top: DEFAULT_TOP,
            k: DEFAULT_K,
        }
    }
}

impl Params {
    fn required_column(&self) -> Result<&str> {
        self.column
            .as_deref()
            .ok_or_else(|| TabulaError::BadRequest("a column is required".to_owned()))
    }
}

impl Statistic {
    /// Computes the statistic and serializes it.
    pub fn evaluate(self, table: &Table, params: &Params) -> Result<Value> {
        let value = match self {
            Self::Summary => serde_json::to_value(summary(table)?)?,
            Self::NullsPerColumn => serde_json::to_value(nulls_per_column(table))?,
            Self::Cardinality => serde_json::to_value(cardinality(table)?)?,
            Self::Outliers => serde_json::to_value(outliers(table)?)?,
            Self::Distribution => serde_json::to_value(distribution(
                table,
                params.required_column()?,
                params.bins,
                params.top,
            )?)?,
            Self::Types => serde_json::to_value(types(table))?,
            Self::Duplicates => serde_json::to_value(duplicates(table)?)?,
            Self::NumericColumns => serde_json::to_value(numeric_columns(table))?,
            Self::Boxplot => serde_json::to_value(boxplot(table, params.required_column()?)?)?,
            Self::Describe => serde_json::to_value(describe_numeric(table)?)?,
            Self::Histograms => serde_json::to_value(histograms(table, params.bins)?)?,
            Self::Boxplots => serde_json::to_value(boxplots(table)?)?,
            Self::Topk => serde_json::to_value(topk(table, params.k)?)?,
        };
        Ok(value)
    }
}
