/// Placeholder written for missing dates.
pub const MISSING_DATE: &str = "N/A";

/// True for columns whose values are compact `YYYYMMDD` dates.
pub fn is_date_column(name: &str) -> bool {
    name.contains("Date")
}

/// Rewrite a compact `YYYYMMDD` date as `YYYY-MM-DD`.
///
/// Slicing is positional and forgiving: anything after the eighth character
/// (such as a trailing `.0` from a float export) is dropped, and short values
/// yield short pieces instead of failing.
pub fn clean_date(value: Option<&str>) -> String {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return MISSING_DATE.to_owned();
    };

    format!(
        "{}-{}-{}",
        slice(raw, 0, 4),
        slice(raw, 4, 6),
        slice(raw, 6, 8)
    )
}

fn slice(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end - start).collect()
}
