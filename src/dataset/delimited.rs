//! Delimited-text parsing for files of unknown dialect and encoding.
//!
//! Parsing is expressed as an ordered list of [`ParseStrategy`] values. Each
//! strategy is a pure function of the input bytes; [`read_delimited`] walks the
//! chain and returns the first grid that parses:
//!
//! 1. every candidate encoding with a structurally inferred separator
//! 2. (separator sniffed from a bounded prefix, or counted on the first line)
//! 3. every candidate encoding with that separator, strict then lenient rows
//! 4. one last comma/UTF-8 attempt whose error is surfaced as-is
//!
//! Rows whose field count differs from the header are skipped at every stage.

use crate::error::{Result as TabulaResult, TabulaError};
use anyhow::{Context as _, Result, anyhow, bail};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::borrow::Cow;

/// Separators considered by inference and sniffing.
pub const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Tie-break order when several separators are equally consistent.
const SNIFF_PREFERENCE: [u8; 4] = [b',', b'\t', b';', b'|'];

/// Order used when counting raw occurrences on the first line.
const FIRST_LINE_ORDER: [u8; 4] = [b',', b';', b'|', b'\t'];

/// Records inspected when inferring a separator from column-count consistency.
const INFER_SAMPLE_RECORDS: usize = 100;

/// Minimum share of sampled rows that must match the header width.
const MIN_INFER_CONSISTENCY: f64 = 0.5;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf8Sig,
    Latin1,
}

impl TextEncoding {
    /// Encodings tried, in order.
    pub const CANDIDATES: [Self; 3] = [Self::Utf8, Self::Utf8Sig, Self::Latin1];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf8Sig => "utf-8-sig",
            Self::Latin1 => "latin-1",
        }
    }

    /// Decodes without replacement; only Latin-1 accepts every byte sequence.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>> {
        match self {
            Self::Utf8 => {
                let text = encoding_rs::UTF_8
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .ok_or_else(|| anyhow!("input is not valid UTF-8"))?;
                // A stray BOM would otherwise end up in the first header name
                Ok(match text {
                    Cow::Borrowed(s) => Cow::Borrowed(s.trim_start_matches('\u{feff}')),
                    Cow::Owned(s) => Cow::Owned(s.trim_start_matches('\u{feff}').to_owned()),
                })
            }
            Self::Utf8Sig => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                encoding_rs::UTF_8
                    .decode_without_bom_handling_and_without_replacement(body)
                    .ok_or_else(|| anyhow!("input is not valid UTF-8 (BOM stripped)"))
            }
            // WHATWG maps the latin-1 label onto windows-1252
            Self::Latin1 => Ok(encoding_rs::WINDOWS_1252
                .decode_without_bom_handling(bytes)
                .0),
        }
    }
}

/// How the field separator is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// Picked per attempt from column-count consistency
    Inferred,
    Fixed(u8),
}

/// How strictly rows are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// RFC 4180 quoting; fails if no data row fits the header
    Strict,
    /// Quotes are literal text and fields are trimmed
    Lenient,
}

/// Header plus data rows, all as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows dropped because their width differed from the header
    pub skipped_rows: usize,
    pub delimiter: u8,
}

/// One step of the delimited-text fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseStrategy {
    pub encoding: TextEncoding,
    pub separator: Separator,
    pub shape: RowShape,
}

impl ParseStrategy {
    pub fn inferred(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            separator: Separator::Inferred,
            shape: RowShape::Strict,
        }
    }

    pub fn strict(encoding: TextEncoding, delimiter: u8) -> Self {
        Self {
            encoding,
            separator: Separator::Fixed(delimiter),
            shape: RowShape::Strict,
        }
    }

    pub fn lenient(encoding: TextEncoding, delimiter: u8) -> Self {
        Self {
            encoding,
            separator: Separator::Fixed(delimiter),
            shape: RowShape::Lenient,
        }
    }

    /// Comma-separated UTF-8 with default quoting.
    pub fn fallback() -> Self {
        Self::strict(TextEncoding::Utf8, b',')
    }

    pub fn attempt(&self, bytes: &[u8]) -> Result<RawGrid> {
        let text = self.encoding.decode(bytes)?;
        let delimiter = match self.separator {
            Separator::Inferred => infer_delimiter(&text)?,
            Separator::Fixed(d) => d,
        };
        parse_grid(&text, delimiter, self.shape)
    }

    pub fn describe(&self) -> String {
        let separator = match self.separator {
            Separator::Inferred => "inferred".to_owned(),
            Separator::Fixed(d) => format!("{:?}", d as char),
        };
        format!(
            "{} / {separator} / {:?}",
            self.encoding.label(),
            self.shape
        )
    }
}

/// Strategies of the first pass: every encoding, separator inferred.
pub fn inference_pass() -> Vec<ParseStrategy> {
    TextEncoding::CANDIDATES
        .into_iter()
        .map(ParseStrategy::inferred)
        .collect()
}

/// Strategies once a separator is resolved: per encoding, strict then lenient.
pub fn resolved_pass(delimiter: u8) -> Vec<ParseStrategy> {
    TextEncoding::CANDIDATES
        .into_iter()
        .flat_map(|enc| {
            [
                ParseStrategy::strict(enc, delimiter),
                ParseStrategy::lenient(enc, delimiter),
            ]
        })
        .collect()
}

/// Runs the whole fallback chain over `bytes`.
///
/// Individual strategy failures are logged at debug level and never surfaced;
/// only the final attempt's error becomes `UnreadableSource`.
pub fn read_delimited(bytes: &[u8], sniff_sample_bytes: usize) -> TabulaResult<RawGrid> {
    if let Some(grid) = first_success(inference_pass(), bytes) {
        return Ok(grid);
    }

    let delimiter = sniff_delimiter(bytes, sniff_sample_bytes);
    tracing::debug!("Sniffed delimiter {:?}", delimiter as char);
    if let Some(grid) = first_success(resolved_pass(delimiter), bytes) {
        return Ok(grid);
    }

    ParseStrategy::fallback()
        .attempt(bytes)
        .map_err(|e| TabulaError::UnreadableSource(format!("{e:#}")))
}

fn first_success(strategies: Vec<ParseStrategy>, bytes: &[u8]) -> Option<RawGrid> {
    strategies.into_iter().find_map(|strategy| match strategy.attempt(bytes) {
        Ok(grid) => {
            tracing::debug!(
                "Parsed delimited text with {} ({} rows, {} skipped)",
                strategy.describe(),
                grid.rows.len(),
                grid.skipped_rows
            );
            Some(grid)
        }
        Err(e) => {
            tracing::debug!("Strategy {} failed: {e:#}", strategy.describe());
            None
        }
    })
}

/// Picks the candidate separator that splits the sample most consistently.
///
/// The header must split into at least two fields, and at least half of the
/// sampled rows must have the header's width.
pub fn infer_delimiter(text: &str) -> Result<u8> {
    let mut best: Option<(u8, usize, f64)> = None;

    for delimiter in CANDIDATE_DELIMITERS {
        let widths = sample_widths(text, delimiter);
        let Some((&header, body)) = widths.split_first() else {
            continue;
        };
        if header < 2 {
            continue;
        }
        let score = if body.is_empty() {
            1.0
        } else {
            body.iter().filter(|&&w| w == header).count() as f64 / body.len() as f64
        };
        let better = match best {
            None => true,
            Some((_, best_width, best_score)) => {
                score > best_score + f64::EPSILON
                    || ((score - best_score).abs() <= f64::EPSILON && header > best_width)
            }
        };
        if better {
            best = Some((delimiter, header, score));
        }
    }

    best.filter(|&(_, _, score)| score >= MIN_INFER_CONSISTENCY)
        .map(|(delimiter, _, _)| delimiter)
        .ok_or_else(|| anyhow!("could not determine delimiter"))
}

fn sample_widths(text: &str, delimiter: u8) -> Vec<usize> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes())
        .records()
        .filter_map(std::result::Result::ok)
        .filter(|r| !is_blank(r))
        .take(INFER_SAMPLE_RECORDS)
        .map(|r| r.len())
        .collect()
}

/// Sniffs a separator from the first `sample_bytes` bytes.
///
/// Frequency analysis runs first; if no candidate is consistent enough, the
/// candidate occurring most often on the first line wins (comma on a tie).
pub fn sniff_delimiter(bytes: &[u8], sample_bytes: usize) -> u8 {
    let truncated = bytes.len() > sample_bytes;
    let sample = String::from_utf8_lossy(bytes.get(..sample_bytes).unwrap_or(bytes));
    match sniff_consistent(&sample, truncated) {
        Ok(delimiter) => delimiter,
        Err(e) => {
            tracing::debug!("Structural sniffing failed ({e}); counting first-line separators");
            first_line_majority(&sample)
        }
    }
}

/// Frequency-table sniffing: a separator qualifies when the same per-line
/// count (the mode, which must be non-zero) appears on enough lines. The
/// consistency bar starts at 100% and relaxes to 90%.
pub fn sniff_consistent(sample: &str, truncated: bool) -> Result<u8> {
    let mut lines: Vec<&str> = sample.lines().filter(|l| !l.trim().is_empty()).collect();
    if truncated && lines.len() > 1 {
        // The last line of a truncated sample is probably cut mid-record
        lines.pop();
    }
    if lines.is_empty() {
        bail!("sample has no lines");
    }

    let consistency: Vec<(u8, f64)> = CANDIDATE_DELIMITERS
        .into_iter()
        .filter_map(|delimiter| {
            let counts: Vec<usize> = lines
                .iter()
                .map(|line| count_outside_quotes(line, delimiter))
                .collect();
            let mode = mode_of(&counts)?;
            (mode > 0).then(|| {
                let hits = counts.iter().filter(|&&c| c == mode).count();
                (delimiter, hits as f64 / counts.len() as f64)
            })
        })
        .collect();

    let mut threshold = 1.0;
    while threshold >= 0.9 - f64::EPSILON {
        let qualified: Vec<u8> = consistency
            .iter()
            .filter(|&&(_, c)| c >= threshold - f64::EPSILON)
            .map(|&(d, _)| d)
            .collect();
        if let Some(&delimiter) = SNIFF_PREFERENCE.iter().find(|d| qualified.contains(d)) {
            return Ok(delimiter);
        }
        threshold -= 0.01;
    }

    bail!("no separator is consistent across the sample")
}

/// Most frequent value; ties go to the larger value.
fn mode_of(counts: &[usize]) -> Option<usize> {
    let mut freq: Vec<(usize, usize)> = Vec::new();
    for &c in counts {
        match freq.iter_mut().find(|(value, _)| *value == c) {
            Some((_, n)) => *n += 1,
            None => freq.push((c, 1)),
        }
    }
    freq.into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(value, _)| value)
}

fn count_outside_quotes(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for &b in line.as_bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Candidate with the most raw occurrences on the first line; the earliest
/// candidate wins ties, so a line without any separator yields a comma.
pub fn first_line_majority(sample: &str) -> u8 {
    let first = sample.lines().next().unwrap_or("");
    let mut best = (FIRST_LINE_ORDER[0], 0);
    for delimiter in FIRST_LINE_ORDER {
        let count = first.bytes().filter(|&b| b == delimiter).count();
        if count > best.1 {
            best = (delimiter, count);
        }
    }
    best.0
}

/// Parses decoded text into a header plus rows of matching width.
pub fn parse_grid(text: &str, delimiter: u8, shape: RowShape) -> Result<RawGrid> {
    let mut builder = ReaderBuilder::new();
    builder.delimiter(delimiter).has_headers(false).flexible(true);
    if shape == RowShape::Lenient {
        builder.quoting(false).trim(Trim::All);
    }
    let mut reader = builder.from_reader(text.as_bytes());
    let mut records = reader.records();

    let headers: Vec<String> = loop {
        match records.next() {
            None => bail!("no columns to parse from input"),
            Some(record) => {
                let record = record.context("failed to read header row")?;
                if !is_blank(&record) {
                    break record.iter().map(str::to_owned).collect();
                }
            }
        }
    };
    let width = headers.len();

    let mut rows = Vec::new();
    let mut skipped_rows = 0;
    for record in records {
        let record = match record {
            Ok(record) => record,
            Err(e) if shape == RowShape::Lenient => {
                tracing::trace!("Skipping unreadable row: {e}");
                skipped_rows += 1;
                continue;
            }
            Err(e) => return Err(e).context("malformed delimited text"),
        };
        if is_blank(&record) {
            continue;
        }
        if record.len() != width {
            skipped_rows += 1;
            continue;
        }
        rows.push(record.iter().map(str::to_owned).collect());
    }

    if shape == RowShape::Strict && rows.is_empty() && skipped_rows > 0 {
        bail!("none of the {skipped_rows} rows match the {width}-column header");
    }

    Ok(RawGrid {
        headers,
        rows,
        skipped_rows,
        delimiter,
    })
}

fn is_blank(record: &StringRecord) -> bool {
    record.len() == 1 && record.get(0).is_some_and(|f| f.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_strips_bom() -> Result<()> {
        let text = TextEncoding::Utf8.decode(b"\xEF\xBB\xBFa,b\n1,2\n")?;
        assert!(text.starts_with("a,b"), "BOM should not reach the header");
        Ok(())
    }

    #[test]
    fn test_decode_utf8_rejects_latin1_bytes() {
        assert!(TextEncoding::Utf8.decode(b"caf\xE9").is_err(), "0xE9 alone is invalid UTF-8");
        assert!(TextEncoding::Utf8Sig.decode(b"caf\xE9").is_err(), "same for utf-8-sig");
    }

    #[test]
    fn test_decode_latin1_accepts_anything() -> Result<()> {
        let text = TextEncoding::Latin1.decode(b"caf\xE9")?;
        assert_eq!(text, "café");
        Ok(())
    }

    #[test]
    fn test_infer_delimiter_semicolon() -> Result<()> {
        let text = "a;b;c\n1;2,5;3\n4;5,5;6\n7;8;9\n";
        assert_eq!(infer_delimiter(text)?, b';');
        Ok(())
    }

    #[test]
    fn test_infer_delimiter_tab_and_pipe() -> Result<()> {
        assert_eq!(infer_delimiter("a\tb\n1\t2\n")?, b'\t');
        assert_eq!(infer_delimiter("a|b|c\n1|2|3\n")?, b'|');
        Ok(())
    }

    #[test]
    fn test_infer_delimiter_fails_for_single_column() {
        assert!(infer_delimiter("value\n1\n2\n").is_err(), "nothing to split on");
    }

    #[test]
    fn test_sniff_consistent_prefers_consistent_separator() -> Result<()> {
        // Commas appear, but only semicolons are consistent on every line
        let sample = "name;city;note\nAna;Lima;a, b\nLuis;Quito;c\nEva;Cusco;d, e, f\n";
        assert_eq!(sniff_consistent(sample, false)?, b';');
        Ok(())
    }

    #[test]
    fn test_sniff_consistent_ignores_quoted_separators() -> Result<()> {
        let sample = "a,b\n\"x;y\",1\n\"z;w\",2\n";
        assert_eq!(sniff_consistent(sample, false)?, b',');
        Ok(())
    }

    #[test]
    fn test_first_line_majority() {
        assert_eq!(first_line_majority("a|b|c;d\n"), b'|');
        assert_eq!(first_line_majority("single\n"), b',');
        assert_eq!(first_line_majority("a\tb;c\n"), b';');
    }

    #[test]
    fn test_sniff_delimiter_falls_back_to_first_line() {
        // Inconsistent counts everywhere, so only the first line decides
        let bytes = b"a;b;c\nx\ny;z\n1;2;3;4;5\n";
        assert_eq!(sniff_delimiter(bytes, 1024), b';');
    }

    #[test]
    fn test_parse_grid_skips_malformed_rows() -> Result<()> {
        let grid = parse_grid("a,b\n1,2\n3,4,5\n6\n7,8\n", b',', RowShape::Strict)?;
        assert_eq!(grid.headers, vec!["a", "b"]);
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.skipped_rows, 2);
        Ok(())
    }

    #[test]
    fn test_parse_grid_ignores_blank_lines() -> Result<()> {
        let grid = parse_grid("\n\na,b\n1,2\n\n3,4\n", b',', RowShape::Strict)?;
        assert_eq!(grid.rows, vec![vec!["1", "2"], vec!["3", "4"]]);
        Ok(())
    }

    #[test]
    fn test_strict_fails_when_no_row_fits() {
        // An unbalanced quote swallows the rest of the file into one field
        let text = "a,b\n\"1,2\n3,4\n5,6\n";
        assert!(parse_grid(text, b',', RowShape::Strict).is_err(), "strict should give up");
    }

    #[test]
    fn test_lenient_treats_quotes_as_text() -> Result<()> {
        let text = "a,b\n\"1,2\n3,4\n5,6\n";
        let grid = parse_grid(text, b',', RowShape::Lenient)?;
        assert_eq!(grid.rows.len(), 3);
        assert_eq!(grid.rows.first().map(|r| r[0].as_str()), Some("\"1"));
        Ok(())
    }

    #[test]
    fn test_parse_grid_empty_input_fails() {
        assert!(parse_grid("", b',', RowShape::Strict).is_err(), "no header");
        assert!(parse_grid("\n \n", b',', RowShape::Lenient).is_err(), "blank only");
    }

    #[test]
    fn test_resolved_pass_order() {
        let pass = resolved_pass(b';');
        assert_eq!(pass.len(), 6);
        assert_eq!(pass[0], ParseStrategy::strict(TextEncoding::Utf8, b';'));
        assert_eq!(pass[1], ParseStrategy::lenient(TextEncoding::Utf8, b';'));
        assert_eq!(pass[5], ParseStrategy::lenient(TextEncoding::Latin1, b';'));
    }

    #[test]
    fn test_read_delimited_semicolon_with_malformed_row() -> anyhow::Result<()> {
        let text = "id;name;score\n1;Ana;9,5\n2;Luis;7\n3;Eva;8;extra\n4;Sol;6\n";
        let grid = read_delimited(text.as_bytes(), 131_072)?;
        assert_eq!(grid.delimiter, b';');
        assert_eq!(grid.rows.len(), 3);
        assert_eq!(grid.skipped_rows, 1);
        Ok(())
    }

    #[test]
    fn test_read_delimited_latin1() -> anyhow::Result<()> {
        let grid = read_delimited(b"ciudad,valor\nSal\xF3n,1\nLe\xF3n,2\n", 131_072)?;
        assert_eq!(grid.rows[0][0], "Salón");
        Ok(())
    }

    #[test]
    fn test_read_delimited_single_column_uses_resolved_pass() -> anyhow::Result<()> {
        let grid = read_delimited(b"value\n1\n2\n3\n", 131_072)?;
        assert_eq!(grid.headers, vec!["value"]);
        assert_eq!(grid.rows.len(), 3);
        Ok(())
    }

    #[test]
    fn test_read_delimited_empty_is_unreadable() {
        assert!(matches!(
            read_delimited(b"", 131_072),
            Err(TabulaError::UnreadableSource(_))
        ));
    }
}
