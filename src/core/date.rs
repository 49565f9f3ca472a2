use crate::types::{PipelineError, PipelineResult};
use chrono::NaiveDate;
use std::path::Path;

/// Delimiter between fields of a Sentinel-1 product name
const TOKEN_DELIMITER: char = '_';

/// Extract the acquisition date from a scene identifier.
///
/// The identifier may be a bare product name or a path; only the file name is
/// inspected. Tokens are scanned in order for the first one that is at least 9
/// characters long, starts with `2` and contains `T`, and whose first 8
/// characters form a valid `YYYYMMDD` calendar date.
///
/// `S1A_IW_SLC__1SDV_20240720T004052_...` -> 2024-07-20
pub fn extract_acquisition_date(identifier: &str) -> PipelineResult<NaiveDate> {
    let name = Path::new(identifier)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(identifier);

    name.split(TOKEN_DELIMITER)
        .filter(|token| token.chars().count() >= 9 && token.starts_with('2') && token.contains('T'))
        .find_map(|token| parse_compact_date(token.get(..8)?))
        .ok_or_else(|| PipelineError::DateFormat(identifier.to_string()))
}

/// Acquisition date formatted as `YYYY-MM-DD`
pub fn extract_date(identifier: &str) -> PipelineResult<String> {
    Ok(extract_acquisition_date(identifier)?.format("%Y-%m-%d").to_string())
}

/// Acquisition date of a scene file, formatted as `YYYY-MM-DD`
pub fn scene_date(path: &Path) -> PipelineResult<String> {
    extract_date(&path.to_string_lossy())
}

fn parse_compact_date(digits: &str) -> Option<NaiveDate> {
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = digits[0..4].parse().ok()?;
    let month: u32 = digits[4..6].parse().ok()?;
    let day: u32 = digits[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
