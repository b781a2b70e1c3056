//! Table-wide statistics: shape, nulls, cardinality, kinds and duplicates.

use crate::dataset::{Kind, Table};
use crate::error::Result;
use crate::utils;
use serde::Serialize;
use serde_json::{Map, Value};

/// Rows included in the duplicates sample.
pub const DUPLICATE_SAMPLE_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub rows: usize,
    pub cols: usize,
    pub null_cells: usize,
    pub null_pct: f64,
    /// Repeats beyond the first occurrence of each distinct row
    pub dup_rows: usize,
}

pub fn summary(table: &Table) -> Result<Summary> {
    let rows = table.height();
    let cols = table.width();
    let null_cells = table.null_cells();
    let null_pct = if rows == 0 || cols == 0 {
        0.0
    } else {
        utils::round_to(null_cells as f64 / (rows * cols) as f64 * 100.0, 2)
    };

    Ok(Summary {
        rows,
        cols,
        null_cells,
        null_pct,
        dup_rows: rows - distinct_rows(table)?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnNulls {
    pub column: String,
    pub nulls: usize,
}

pub fn nulls_per_column(table: &Table) -> Vec<ColumnNulls> {
    let mut out: Vec<ColumnNulls> = table
        .columns()
        .map(|c| ColumnNulls {
            column: c.name().to_owned(),
            nulls: c.null_count(),
        })
        .collect();
    out.sort_by(|a, b| b.nulls.cmp(&a.nulls));
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnCardinality {
    pub column: String,
    pub unique: usize,
}

/// Distinct values per column, counting null as one more value.
pub fn cardinality(table: &Table) -> Result<Vec<ColumnCardinality>> {
    let mut out = table
        .columns()
        .map(|c| {
            Ok(ColumnCardinality {
                column: c.name().to_owned(),
                unique: c.n_unique()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    out.sort_by(|a, b| b.unique.cmp(&a.unique));
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindCount {
    pub dtype: Kind,
    pub columns: usize,
}

/// Columns per kind, most common kind first.
pub fn types(table: &Table) -> Vec<KindCount> {
    let mut out: Vec<KindCount> = Vec::new();
    for &kind in table.kinds() {
        match out.iter_mut().find(|k| k.dtype == kind) {
            Some(entry) => entry.columns += 1,
            None => out.push(KindCount {
                dtype: kind,
                columns: 1,
            }),
        }
    }
    out.sort_by(|a, b| b.columns.cmp(&a.columns));
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumericColumns {
    pub columns: Vec<String>,
}

pub fn numeric_columns(table: &Table) -> NumericColumns {
    NumericColumns {
        columns: table
            .numeric_columns()
            .map(|c| c.name().to_owned())
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Duplicates {
    /// Rows that have at least one identical row elsewhere (all occurrences)
    pub dup_rows: usize,
    pub unique_rows: usize,
    pub total: usize,
    pub sample: Vec<Map<String, Value>>,
}

pub fn duplicates(table: &Table) -> Result<Duplicates> {
    let total = table.height();
    let duplicated: Vec<usize> = if table.width() == 0 || total == 0 {
        Vec::new()
    } else {
        table
            .frame()
            .is_duplicated()?
            .into_iter()
            .enumerate()
            .filter_map(|(row, dup)| dup.unwrap_or(false).then_some(row))
            .collect()
    };

    let columns: Vec<_> = table.columns().collect();
    let sample = duplicated
        .iter()
        .take(DUPLICATE_SAMPLE_ROWS)
        .map(|&row| {
            columns
                .iter()
                .map(|c| Ok((c.name().to_owned(), c.json_value(row)?)))
                .collect::<Result<Map<String, Value>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Duplicates {
        dup_rows: duplicated.len(),
        unique_rows: total - duplicated.len(),
        total,
        sample,
    })
}

/// Number of distinct rows across every column.
fn distinct_rows(table: &Table) -> Result<usize> {
    if table.width() == 0 || table.height() == 0 {
        return Ok(table.height());
    }
    let frame = table.frame();
    Ok(frame
        .group_by(frame.get_column_names_owned())?
        .get_groups()
        .len())
}
