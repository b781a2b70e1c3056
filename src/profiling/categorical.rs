//! Frequency-based statistics: the per-column `distribution` view and top-k
//! counts for non-numeric columns.

use super::{ByColumn, stats};
use crate::dataset::{ColumnRef, Kind, Table};
use crate::error::Result;
use polars::prelude::*;
use serde::Serialize;

/// Label used for the null category.
pub const NULL_LABEL: &str = "null";

const VALUE_FIELD: &str = "value";
const COUNT_FIELD: &str = "counts";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Distribution {
    Numeric {
        bins: Vec<f64>,
        counts: Vec<usize>,
        numeric: bool,
    },
    Categorical {
        labels: Vec<String>,
        counts: Vec<usize>,
        numeric: bool,
        /// Every listed value occurs at most once
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        unique_like: bool,
    },
}

impl Distribution {
    pub fn is_unique_like(&self) -> bool {
        matches!(self, Self::Categorical { unique_like: true, .. })
    }
}

/// Histogram for numeric columns, top-`top` value counts otherwise.
///
/// `bins` is clamped to `[5, 100]` and `top` to `[5, 50]`.
pub fn distribution(table: &Table, column: &str, bins: usize, top: usize) -> Result<Distribution> {
    let column = table.column(column)?;
    if column.kind() == Kind::Numeric {
        let hist = stats::histogram(&column.non_null_f64()?, super::clamp_bins(bins));
        return Ok(Distribution::Numeric {
            bins: hist.edges,
            counts: hist.counts,
            numeric: true,
        });
    }

    let (labels, counts) = value_counts(column, super::clamp_top(top))?;
    let unique_like = counts.iter().max().is_some_and(|&max| max <= 1);
    Ok(Distribution::Categorical {
        labels,
        counts,
        numeric: false,
        unique_like,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopValues {
    pub labels: Vec<String>,
    pub counts: Vec<usize>,
}

/// The `k` most frequent values (clamped to `[1, 50]`) of every non-numeric
/// column, keyed by column.
pub fn topk(table: &Table, k: usize) -> Result<ByColumn<TopValues>> {
    let k = super::clamp_k(k);
    table
        .columns()
        .filter(|c| c.kind() != Kind::Numeric)
        .map(|c| {
            let (labels, counts) = value_counts(c, k)?;
            Ok((c.name().to_owned(), TopValues { labels, counts }))
        })
        .collect()
}

/// Most frequent values with their counts, ties ordered by value and null
/// last.
fn value_counts(column: ColumnRef<'_>, limit: usize) -> Result<(Vec<String>, Vec<usize>)> {
    let values = match column.kind() {
        Kind::Other => labels_of(column.series()),
        _ => column.series().clone(),
    }
    .with_name(VALUE_FIELD.into());

    let ranked = values
        .value_counts(false, false, COUNT_FIELD.into(), false)?
        .sort(
            [COUNT_FIELD, VALUE_FIELD],
            SortMultipleOptions::default()
                .with_order_descending_multi([true, false])
                .with_nulls_last(true)
                .with_maintain_order(true),
        )?
        .head(Some(limit));

    let labels = labels_of(ranked.column(VALUE_FIELD)?.as_materialized_series());
    let labels = labels
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or(NULL_LABEL).to_owned())
        .collect();
    let counts = ranked
        .column(COUNT_FIELD)?
        .as_materialized_series()
        .cast(&DataType::UInt64)?;
    let counts = counts
        .u64()?
        .into_iter()
        .map(|n| n.map_or(0, |n| n as usize))
        .collect();
    Ok((labels, counts))
}

/// Values as a string series, nulls kept.
fn labels_of(series: &Series) -> Series {
    if let Ok(cast) = series.cast(&DataType::String) {
        return cast;
    }
    let labels: Vec<Option<String>> = series
        .iter()
        .map(|v| (!v.is_null()).then(|| v.to_string()))
        .collect();
    Series::new(series.name().clone(), labels)
}
