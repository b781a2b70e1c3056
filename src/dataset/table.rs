//! In-memory table model.
//!
//! A [`Table`] wraps a polars `DataFrame` and pins a [`Kind`] to every column
//! at construction time. Profiling code reads columns through [`ColumnRef`],
//! which exposes the few typed views the statistics need (the series, floats,
//! JSON cells) without handing out mutable access to the frame.

use crate::error::{Result, TabulaError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Semantic category of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Numeric,
    Boolean,
    Text,
    Temporal,
    Other,
}

impl Kind {
    /// Maps a polars dtype onto a kind.
    pub fn of(dtype: &DataType) -> Self {
        if dtype.is_bool() {
            Self::Boolean
        } else if dtype.is_primitive_numeric() {
            Self::Numeric
        } else if dtype.is_temporal() {
            Self::Temporal
        } else if dtype.is_string() || dtype.is_categorical() {
            Self::Text
        } else {
            Self::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Text => "text",
            Self::Temporal => "temporal",
            Self::Other => "other",
        }
    }
}

/// Immutable table with per-column kinds.
#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
    kinds: Vec<Kind>,
}

impl Table {
    pub fn new(frame: DataFrame) -> Self {
        let kinds = frame
            .get_columns()
            .iter()
            .map(|c| Kind::of(c.dtype()))
            .collect();
        Self { frame, kinds }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn kinds(&self) -> &[Kind] {
        &self.kinds
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().map(|c| c.name().to_owned()).collect()
    }

    /// Columns in table order.
    pub fn columns(&self) -> impl Iterator<Item = ColumnRef<'_>> {
        self.frame
            .get_columns()
            .iter()
            .zip(self.kinds.iter().copied())
            .map(|(column, kind)| ColumnRef { column, kind })
    }

    /// Columns whose kind is [`Kind::Numeric`], in table order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = ColumnRef<'_>> {
        self.columns().filter(|c| c.kind() == Kind::Numeric)
    }

    /// Looks a column up by name.
    pub fn column(&self, name: &str) -> Result<ColumnRef<'_>> {
        self.columns()
            .find(|c| c.name() == name)
            .ok_or_else(|| TabulaError::ColumnNotFound(name.to_owned()))
    }

    /// Total null cells across every column.
    pub fn null_cells(&self) -> usize {
        self.columns().map(|c| c.null_count()).sum()
    }
}

/// Borrowed view of one column plus its kind.
#[derive(Clone, Copy)]
pub struct ColumnRef<'a> {
    column: &'a Column,
    kind: Kind,
}

impl<'a> ColumnRef<'a> {
    pub fn name(&self) -> &'a str {
        self.column.name().as_str()
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn dtype(&self) -> &'a DataType {
        self.column.dtype()
    }

    pub fn len(&self) -> usize {
        self.column.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column.len() == 0
    }

    pub fn null_count(&self) -> usize {
        self.column.null_count()
    }

    pub fn series(&self) -> &'a Series {
        self.column.as_materialized_series()
    }

    /// Distinct values, null counted as one more value.
    pub fn n_unique(&self) -> Result<usize> {
        Ok(self.series().n_unique()?)
    }

    /// Values as floats, nulls preserved in place.
    ///
    /// Fails with `NonNumericColumn` unless the column kind is numeric.
    pub fn f64_values(&self) -> Result<Vec<Option<f64>>> {
        if self.kind != Kind::Numeric {
            return Err(TabulaError::NonNumericColumn(self.name().to_owned()));
        }
        let cast = self
            .column
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let ca = cast.f64()?;
        Ok(ca
            .into_iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect())
    }

    /// Non-null float values in their original relative order.
    pub fn non_null_f64(&self) -> Result<Vec<f64>> {
        Ok(self.f64_values()?.into_iter().flatten().collect())
    }

    /// One cell as JSON; nulls and non-finite floats become `null`.
    pub fn json_value(&self, row: usize) -> Result<Value> {
        Ok(any_value_to_json(self.column.get(row)?))
    }
}

fn any_value_to_json(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::String(s) => Value::String(s.to_owned()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => finite_number(f64::from(v)),
        AnyValue::Float64(v) => finite_number(v),
        other => Value::String(other.to_string()),
    }
}

fn finite_number(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn sample() -> Result<Table> {
        let df = df!(
            "id" => &[1i64, 2, 3],
            "price" => &[Some(1.5), None, Some(f64::NAN)],
            "name" => &[Some("a"), None, Some("c")],
            "flag" => &[true, false, true]
        )?;
        Ok(Table::new(df))
    }

    #[test]
    fn test_kinds_assigned_at_construction() -> Result<()> {
        let table = sample()?;
        assert_eq!(
            table.kinds(),
            &[Kind::Numeric, Kind::Numeric, Kind::Text, Kind::Boolean]
        );
        Ok(())
    }

    #[test]
    fn test_column_not_found() -> Result<()> {
        let table = sample()?;
        assert!(matches!(
            table.column("missing"),
            Err(TabulaError::ColumnNotFound(name)) if name == "missing"
        ));
        Ok(())
    }

    #[test]
    fn test_f64_values_treat_nan_as_missing() -> Result<()> {
        let table = sample()?;
        let values = table.column("price")?.f64_values()?;
        assert_eq!(values, vec![Some(1.5), None, None]);
        Ok(())
    }

    #[test]
    fn test_f64_values_reject_text() -> Result<()> {
        let table = sample()?;
        assert!(matches!(
            table.column("name")?.f64_values(),
            Err(TabulaError::NonNumericColumn(_))
        ));
        Ok(())
    }

    #[test]
    fn test_n_unique_counts_null_once() -> Result<()> {
        let table = sample()?;
        assert_eq!(table.column("name")?.n_unique()?, 3);
        assert_eq!(table.column("flag")?.n_unique()?, 2);
        Ok(())
    }

    #[test]
    fn test_categorical_is_text() -> Result<()> {
        let series = Series::new("c".into(), &["x", "y", "x"])
            .cast(&DataType::Categorical(None, CategoricalOrdering::Physical))?;
        let table = Table::new(DataFrame::new(vec![Column::from(series)])?);
        assert_eq!(table.kinds(), &[Kind::Text]);
        Ok(())
    }

    #[test]
    fn test_json_value_null_marker() -> Result<()> {
        let table = sample()?;
        let name = table.column("name")?;
        assert_eq!(name.json_value(0)?, Value::String("a".to_owned()));
        assert_eq!(name.json_value(1)?, Value::Null);
        assert_eq!(table.column("price")?.json_value(2)?, Value::Null);
        assert_eq!(table.column("id")?.json_value(2)?, Value::from(3i64));
        Ok(())
    }
}
