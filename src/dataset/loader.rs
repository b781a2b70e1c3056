//! Turns file bytes into a [`Table`].
//!
//! Delimited text and Excel sheets arrive as grids of strings and go through
//! the same cell normalisation: null tokens become nulls, then each column is
//! typed by the first kind every non-null value parses as (integer, float,
//! boolean, date, datetime, text). Parquet and JSON keep the types their
//! readers produce, with string columns promoted to temporal when every value
//! casts to a date or timestamp.

use super::delimited;
use super::format::Format;
use super::table::Table;
use crate::config::DEFAULT_SNIFF_SAMPLE_BYTES;
use crate::error::{Result, TabulaError};
use anyhow::Context as _;
use calamine::{Data, DataType as _, Reader as _};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

/// Cell values read as missing in text-based formats.
pub const NULL_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone, Copy)]
pub struct TableLoader {
    sniff_sample_bytes: usize,
}

impl Default for TableLoader {
    fn default() -> Self {
        Self::new(DEFAULT_SNIFF_SAMPLE_BYTES)
    }
}

impl TableLoader {
    pub fn new(sniff_sample_bytes: usize) -> Self {
        Self { sniff_sample_bytes }
    }

    /// Loads uploaded bytes; the extension of `file_name` must be one of
    /// [`Format::UPLOAD_EXTENSIONS`].
    pub fn load_bytes(&self, file_name: &str, bytes: &[u8]) -> Result<Table> {
        let format = Format::detect_upload(file_name)?;
        self.parse(format, bytes)
    }

    /// Loads the configured dataset file.
    ///
    /// Unlike uploads, a path without a recognised extension is read as
    /// delimited text.
    pub fn load_path(&self, path: &Path) -> Result<Table> {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let format = Format::detect(name).unwrap_or_else(|e| {
            tracing::debug!("{e}; reading {} as delimited text", path.display());
            Format::Csv
        });
        let bytes = std::fs::read(path).map_err(|e| {
            TabulaError::UnreadableSource(format!("{}: {e}", path.display()))
        })?;
        self.parse(format, &bytes)
    }

    pub fn parse(&self, format: Format, bytes: &[u8]) -> Result<Table> {
        let frame = match format {
            Format::Csv => {
                let grid = delimited::read_delimited(bytes, self.sniff_sample_bytes)?;
                if grid.skipped_rows > 0 {
                    tracing::info!(
                        "Skipped {} malformed rows (expected {} fields)",
                        grid.skipped_rows,
                        grid.headers.len()
                    );
                }
                frame_from_text(&grid.headers, grid.rows)?
            }
            Format::Excel => {
                let (headers, rows) = read_excel(bytes).map_err(unreadable)?;
                frame_from_text(&headers, rows)?
            }
            Format::Parquet => finalize_frame(read_parquet(bytes).map_err(unreadable)?)?,
            Format::Json => finalize_frame(read_json(bytes).map_err(unreadable)?)?,
        };

        tracing::info!(
            "Loaded {:?} table: {} rows x {} columns",
            format,
            frame.height(),
            frame.width()
        );
        Ok(Table::new(frame))
    }
}

fn unreadable(err: anyhow::Error) -> TabulaError {
    TabulaError::UnreadableSource(format!("{err:#}"))
}

/// First worksheet, first row as header.
fn read_excel(bytes: &[u8]) -> anyhow::Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .context("Failed to open workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .context("Workbook has no sheets")?
        .context("Failed to read first sheet")?;

    let mut rows = range.rows();
    let headers = rows
        .next()
        .context("Sheet is empty")?
        .iter()
        .map(excel_cell_text)
        .collect();
    let body = rows
        .map(|row| row.iter().map(excel_cell_text).collect())
        .collect();
    Ok((headers, body))
}

fn excel_cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt: NaiveDateTime| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

fn read_parquet(bytes: &[u8]) -> anyhow::Result<DataFrame> {
    ParquetReader::new(Cursor::new(bytes.to_vec()))
        .finish()
        .context("Failed to read Parquet")
}

/// JSON Lines first, then a single JSON document.
fn read_json(bytes: &[u8]) -> anyhow::Result<DataFrame> {
    match JsonReader::new(Cursor::new(bytes.to_vec()))
        .with_json_format(JsonFormat::JsonLines)
        .finish()
    {
        Ok(df) => Ok(df),
        Err(e) => {
            tracing::debug!("Not JSON Lines ({e}); trying a JSON document");
            JsonReader::new(Cursor::new(bytes.to_vec()))
                .with_json_format(JsonFormat::Json)
                .finish()
                .context("Failed to read JSON")
        }
    }
}

/// Builds a typed frame from a header row and same-width text rows.
pub fn frame_from_text(headers: &[String], rows: Vec<Vec<String>>) -> Result<DataFrame> {
    let names = unique_headers(headers);
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(rows.len()); names.len()];
    for row in rows {
        for (slot, value) in cells.iter_mut().zip(row) {
            slot.push(normalize_cell(value));
        }
    }

    let columns = names
        .iter()
        .zip(cells)
        .map(|(name, values)| infer_column(name, &values))
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

/// Blank headers become `Unnamed: <index>`; repeats get `.1`, `.2`, ...
pub fn unique_headers(headers: &[String]) -> Vec<String> {
    let mut used = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let base = if raw.trim().is_empty() {
                format!("Unnamed: {i}")
            } else {
                raw.clone()
            };
            let mut name = base.clone();
            let mut n = 0;
            while used.contains(&name) {
                n += 1;
                name = format!("{base}.{n}");
            }
            used.insert(name.clone());
            name
        })
        .collect()
}

fn normalize_cell(value: String) -> Option<String> {
    if NULL_TOKENS.contains(&value.trim()) {
        None
    } else {
        Some(value)
    }
}

/// Types a column of optional strings.
///
/// Trimmed values are strictly cast to each candidate type in turn; the
/// first cast that turns no value into null wins.
pub fn infer_column(name: &str, values: &[Option<String>]) -> Result<Column> {
    let name = PlSmallStr::from(name);
    if values.iter().all(Option::is_none) {
        return Ok(Series::new(name, vec![None::<f64>; values.len()]).into());
    }

    let trimmed: Vec<Option<&str>> = values
        .iter()
        .map(|v| v.as_deref().map(str::trim))
        .collect();
    let text = Series::new(name.clone(), &trimmed);

    if let Ok(ints) = text.strict_cast(&DataType::Int64) {
        return Ok(ints.into());
    }
    if let Ok(floats) = text.strict_cast(&DataType::Float64) {
        return Ok(nan_to_null(&floats)?.into());
    }
    if let Some(bools) = parse_bools(text.str()?) {
        return Ok(Series::new(name, bools).into());
    }
    if let Some(temporal) = promote_temporal(&text)? {
        return Ok(temporal.into());
    }
    Ok(Series::new(name, values.to_vec()).into())
}

/// Date, then millisecond datetime, if every non-null value casts.
fn promote_temporal(text: &Series) -> Result<Option<Series>> {
    if let Ok(dates) = text.strict_cast(&DataType::Date) {
        return Ok(Some(dates));
    }
    let iso: Vec<Option<String>> = text
        .str()?
        .into_iter()
        .map(|v| v.map(iso_separator))
        .collect();
    Ok(Series::new(text.name().clone(), iso)
        .strict_cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .ok())
}

/// `2024-01-31 10:00:00` becomes `2024-01-31T10:00:00`.
fn iso_separator(s: &str) -> String {
    match (s.get(..10), s.get(11..)) {
        (Some(date), Some(time)) if s.as_bytes().get(10) == Some(&b' ') => {
            format!("{date}T{time}")
        }
        _ => s.to_owned(),
    }
}

fn parse_bools(text: &StringChunked) -> Option<Vec<Option<bool>>> {
    text.into_iter()
        .map(|v| match v {
            None => Some(None),
            Some(s) => parse_bool(s).map(Some),
        })
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn nan_to_null(floats: &Series) -> Result<Series> {
    let cast = floats.cast(&DataType::Float64)?;
    let values: Vec<Option<f64>> = cast
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(Series::new(floats.name().clone(), values))
}

/// Normalises frames produced by the binary/JSON readers: float NaN becomes
/// null and fully temporal string columns are promoted.
fn finalize_frame(df: DataFrame) -> Result<DataFrame> {
    let columns = df
        .get_columns()
        .iter()
        .map(finalize_column)
        .collect::<Result<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

fn finalize_column(column: &Column) -> Result<Column> {
    let dtype = column.dtype();
    if dtype.is_float() {
        return Ok(nan_to_null(column.as_materialized_series())?.into());
    }
    if dtype.is_string()
        && column.null_count() < column.len()
        && let Some(promoted) = promote_temporal(column.as_materialized_series())?
    {
        return Ok(promoted.into());
    }
    Ok(column.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::table::Kind;
    use anyhow::Result;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_unique_headers() {
        let headers = strings(&["a", "", "a", "b", "a"]);
        assert_eq!(
            unique_headers(&headers),
            vec!["a", "Unnamed: 1", "a.1", "b", "a.2"]
        );
    }

    #[test]
    fn test_infer_column_kinds() -> Result<()> {
        let ints = infer_column("n", &[Some("1".into()), None, Some(" 3".into())])?;
        assert_eq!(ints.dtype(), &DataType::Int64);

        let floats = infer_column("f", &[Some("1".into()), Some("2.5".into())])?;
        assert_eq!(floats.dtype(), &DataType::Float64);

        let bools = infer_column("b", &[Some("True".into()), Some("false".into())])?;
        assert_eq!(bools.dtype(), &DataType::Boolean);

        let dates = infer_column("d", &[Some("2024-01-31".into()), None])?;
        assert_eq!(dates.dtype(), &DataType::Date);

        let stamps = infer_column("t", &[Some("2024-01-31 10:00:00".into())])?;
        assert_eq!(
            stamps.dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );

        let iso = infer_column("t", &[Some("2024-01-31T10:00:00.250".into()), None])?;
        assert_eq!(iso.dtype(), &DataType::Datetime(TimeUnit::Milliseconds, None));

        let text = infer_column("s", &[Some("1".into()), Some("x".into())])?;
        assert_eq!(text.dtype(), &DataType::String);
        Ok(())
    }

    #[test]
    fn test_infer_column_casts_are_strict() -> Result<()> {
        // One value that does not cast keeps the whole column as text
        let mixed = infer_column("m", &[Some("1".into()), Some("2".into()), Some("3a".into())])?;
        assert_eq!(mixed.dtype(), &DataType::String);
        assert_eq!(mixed.null_count(), 0);

        let floats = infer_column("f", &[Some(" 1e3 ".into()), Some("-0.5".into())])?;
        assert_eq!(floats.dtype(), &DataType::Float64);

        let dates = infer_column("d", &[Some("2024-02-30".into())])?;
        assert_eq!(dates.dtype(), &DataType::String, "impossible date stays text");
        Ok(())
    }

    #[test]
    fn test_all_null_column_is_float() -> Result<()> {
        let column = infer_column("empty", &[None, None])?;
        assert_eq!(column.dtype(), &DataType::Float64);
        assert_eq!(column.null_count(), 2);
        Ok(())
    }

    #[test]
    fn test_null_tokens() -> Result<()> {
        let df = frame_from_text(
            &strings(&["a", "b"]),
            vec![strings(&["NA", "x"]), strings(&["1", "null"]), strings(&["", "n/a"])],
        )?;
        assert_eq!(df.column("a")?.null_count(), 2);
        assert_eq!(df.column("a")?.dtype(), &DataType::Int64);
        assert_eq!(df.column("b")?.null_count(), 2);
        Ok(())
    }

    #[test]
    fn test_load_bytes_csv() -> Result<()> {
        let table = TableLoader::default().load_bytes(
            "sales.csv",
            b"region;units;price\nnorth;3;1,5\nsouth;x;y;z\nwest;5;2\n",
        )?;
        assert_eq!(table.height(), 2);
        assert_eq!(table.column_names(), vec!["region", "units", "price"]);
        assert_eq!(table.column("units")?.kind(), Kind::Numeric);
        Ok(())
    }

    #[test]
    fn test_load_bytes_json_lines() -> Result<()> {
        let table = TableLoader::default()
            .load_bytes("events.json", b"{\"a\":1,\"b\":\"x\"}\n{\"a\":2,\"b\":\"y\"}\n")?;
        assert_eq!(table.height(), 2);
        assert_eq!(table.column("a")?.kind(), Kind::Numeric);
        Ok(())
    }

    #[test]
    fn test_load_bytes_parquet() -> Result<()> {
        let mut df = df!(
            "x" => &[Some(1.0), Some(f64::NAN), None],
            "when" => &["2024-01-01", "2024-01-02", "2024-01-03"]
        )?;
        let mut buf = Vec::new();
        ParquetWriter::new(&mut buf).finish(&mut df)?;

        let table = TableLoader::default().load_bytes("x.parquet", &buf)?;
        assert_eq!(table.column("x")?.null_count(), 2);
        assert_eq!(table.column("when")?.kind(), Kind::Temporal);
        Ok(())
    }

    #[test]
    fn test_load_bytes_rejects_unknown_extension() {
        assert!(matches!(
            TableLoader::default().load_bytes("notes.txt", b"a,b\n1,2\n"),
            Err(TabulaError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_bytes_only_takes_upload_extensions() {
        for name in ["data.tsv", "data.jsonl", "data.ndjson"] {
            assert!(
                matches!(
                    TableLoader::default().load_bytes(name, b"a\tb\n1\t2\n"),
                    Err(TabulaError::UnsupportedFormat(_))
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_load_bytes_corrupt_parquet_is_unreadable() {
        assert!(matches!(
            TableLoader::default().load_bytes("bad.parquet", b"not parquet"),
            Err(TabulaError::UnreadableSource(_))
        ));
    }

    #[test]
    fn test_load_path_missing_file_is_unreadable() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(matches!(
            TableLoader::default().load_path(&dir.path().join("missing.csv")),
            Err(TabulaError::UnreadableSource(_))
        ));
        Ok(())
    }
}
