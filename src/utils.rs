/// Strips surrounding whitespace and one layer of `"`/`'` quoting from a path
/// setting. Returns `None` when nothing is left.
pub fn normalize_path_setting(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// Rounds to `places` decimal places, half away from zero.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Rounds a possibly-undefined statistic; non-finite values become `None`.
pub fn round_opt(value: Option<f64>, places: i32) -> Option<f64> {
    value.filter(|v| v.is_finite()).map(|v| round_to(v, places))
}

/// Lowercased extension of a file name, or an empty string.
pub fn extension_of(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}
