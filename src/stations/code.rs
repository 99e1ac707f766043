//! BSS station codes: normalization, detection in uploaded tables, sample validation.

use crate::stations::source::StationSource;
use log::{debug, error, info, warn};
use polars::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// New national format, `BSS` followed by seven alphanumerics.
const NEW_FORMAT: &str = r"(BSS[0-9A-Z]{7})";
/// Legacy format such as `07548X0009/F`.
const OLD_FORMAT: &str = r"(\d{4,5}[X-Z]\d{3,4}(?:/[A-Z0-9]+)?)";

static NEW_FORMAT_RE: OnceLock<Option<Regex>> = OnceLock::new();
static OLD_FORMAT_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// Column name fragments marking a code column, in priority order.
const COLUMN_PRIORITY: [&str; 5] = ["code_bss", "bss_id", "bss", "code_station", "code"];
const COLUMN_HINTS: [&str; 4] = ["bss", "code", "station", "piezo"];
const NULL_MARKERS: [&str; 3] = ["nan", "none", "null"];

fn first_match<'t>(
    cell: &OnceLock<Option<Regex>>,
    pattern: &str,
    text: &'t str,
) -> Option<&'t str> {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()?
        .find(text)
        .map(|m| m.as_str())
}

/// Extracts a BSS code embedded in `raw`.
///
/// A new-format code wins over a legacy one. Legacy suffixes longer than two characters
/// (e.g. `/2013`) are not accepted by the API and are dropped. Input matching neither format
/// comes back trimmed.
///
/// ```
/// use piezo_dataset::normalize_code;
///
/// assert_eq!(normalize_code(" 07548X0009/F "), "07548X0009/F");
/// assert_eq!(normalize_code("00471X0095/2013"), "00471X0095");
/// assert_eq!(normalize_code("station BSS000AUZM (Paris)"), "BSS000AUZM");
/// ```
pub fn normalize_code(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if let Some(code) = first_match(&NEW_FORMAT_RE, NEW_FORMAT, trimmed) {
        return code.to_string();
    }
    if let Some(code) = first_match(&OLD_FORMAT_RE, OLD_FORMAT, trimmed) {
        return match code.split_once('/') {
            Some((root, suffix)) if suffix.len() > 2 => root.to_string(),
            _ => code.to_string(),
        };
    }
    trimmed.to_string()
}

/// Picks the column most likely to hold station codes.
fn code_column(df: &DataFrame) -> Option<String> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    if names.len() == 1 {
        return names.into_iter().next();
    }
    let candidates: Vec<&String> = names
        .iter()
        .filter(|name| {
            let lower = name.to_lowercase();
            COLUMN_HINTS.iter().any(|hint| lower.contains(*hint))
        })
        .collect();
    for pattern in COLUMN_PRIORITY {
        if let Some(found) = candidates
            .iter()
            .find(|name| name.to_lowercase().contains(pattern))
        {
            info!("Selected column '{}' (matched '{}')", found, pattern);
            return Some(found.to_string());
        }
    }
    if let Some(first) = candidates.first() {
        info!("Using first candidate column '{}'", first);
        return Some(first.to_string());
    }
    let first = names.into_iter().next();
    if let Some(name) = &first {
        warn!(
            "No column mentions bss/code/station; defaulting to first column '{}'",
            name
        );
    }
    first
}

/// Unique normalized station codes of an uploaded table, in order of first appearance.
pub fn extract_station_codes(df: &DataFrame) -> PolarsResult<Vec<String>> {
    if df.height() == 0 {
        warn!("Station table is empty");
        return Ok(Vec::new());
    }
    let Some(column) = code_column(df) else {
        return Ok(Vec::new());
    };
    let values = df.column(&column)?.cast(&DataType::String)?;

    let mut seen = HashSet::new();
    let mut codes = Vec::new();
    let mut rejected = 0;
    for value in values.str()?.into_iter() {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            rejected += 1;
            continue;
        };
        if NULL_MARKERS.iter().any(|marker| value.eq_ignore_ascii_case(marker)) {
            rejected += 1;
            continue;
        }
        let code = normalize_code(value);
        if !code.is_empty() && seen.insert(code.clone()) {
            codes.push(code);
        }
    }
    if rejected > 0 {
        warn!("Filtered out {} empty or invalid codes", rejected);
    }
    info!("Extracted {} station codes from column '{}'", codes.len(), column);
    Ok(codes)
}

/// Checks the first `sample_size` codes against `source`, returning `(valid, invalid)`.
///
/// A source failure marks the whole sample invalid.
pub async fn validate_codes<S: StationSource>(
    source: &S,
    codes: &[String],
    sample_size: usize,
) -> (Vec<String>, Vec<String>) {
    let sample = &codes[..sample_size.min(codes.len())];
    if sample.is_empty() {
        return (Vec::new(), Vec::new());
    }
    debug!("Validating {} sample codes out of {}", sample.len(), codes.len());
    let found: HashSet<String> = match source.get_attributes(sample).await {
        Ok(stations) => stations
            .into_iter()
            .map(|s| s.code_bss.trim().to_string())
            .collect(),
        Err(e) => {
            error!("Station code validation failed: {}", e);
            return (Vec::new(), sample.to_vec());
        }
    };
    let (valid, invalid): (Vec<String>, Vec<String>) =
        sample.iter().cloned().partition(|code| found.contains(code));
    info!("Validation: {}/{} codes valid", valid.len(), sample.len());
    (valid, invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stations::error::StationSourceError;
    use crate::types::date_range::DateRange;
    use crate::types::station::{Observation, Station};

    #[test]
    fn test_normalize_code_formats() {
        assert_eq!(normalize_code("BSS000AUZM"), "BSS000AUZM");
        assert_eq!(normalize_code("xxBSS001ABCDyy"), "BSS001ABCD");
        assert_eq!(normalize_code("07548X0009/F"), "07548X0009/F");
        assert_eq!(normalize_code("0754X009"), "0754X009");
        assert_eq!(normalize_code("00471X0095/2013"), "00471X0095");
        assert_eq!(normalize_code("01234Y0001/PZ"), "01234Y0001/PZ");
        assert_eq!(normalize_code("  unknown id "), "unknown id");
        assert_eq!(normalize_code("   "), "");
    }

    #[test]
    fn test_extract_prefers_code_bss_column() -> PolarsResult<()> {
        let df = DataFrame::new(vec![
            Column::new("name".into(), vec!["a", "b", "c", "d"]),
            Column::new("station".into(), vec!["s1", "s2", "s3", "s4"]),
            Column::new(
                "Code_BSS".into(),
                vec![
                    Some(" 07548X0009/F"),
                    None,
                    Some("NaN"),
                    Some("07548X0009/F"),
                ],
            ),
        ])?;
        assert_eq!(extract_station_codes(&df)?, vec!["07548X0009/F"]);
        Ok(())
    }

    #[test]
    fn test_extract_falls_back_to_first_column() -> PolarsResult<()> {
        let df = DataFrame::new(vec![
            Column::new("id".into(), vec!["BSS000AUZM", "BSS000AUZN"]),
            Column::new("comment".into(), vec!["x", "y"]),
        ])?;
        assert_eq!(
            extract_station_codes(&df)?,
            vec!["BSS000AUZM", "BSS000AUZN"]
        );

        let single = DataFrame::new(vec![Column::new("whatever".into(), vec![1234i64])])?;
        assert_eq!(extract_station_codes(&single)?, vec!["1234"]);
        Ok(())
    }

    struct KnownCodes(Vec<&'static str>);

    impl StationSource for KnownCodes {
        async fn get_attributes(
            &self,
            codes: &[String],
        ) -> Result<Vec<Station>, StationSourceError> {
            if self.0.is_empty() {
                return Err(StationSourceError::Unavailable("down".to_string()));
            }
            Ok(codes
                .iter()
                .filter(|c| self.0.contains(&c.as_str()))
                .map(|c| Station::new(c.as_str()))
                .collect())
        }

        async fn get_series(
            &self,
            _codes: &[String],
            _range: DateRange,
        ) -> Result<Vec<Observation>, StationSourceError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_validate_codes_on_sample() {
        let codes: Vec<String> = ["A", "B", "C", "D"].map(String::from).to_vec();
        let (valid, invalid) = validate_codes(&KnownCodes(vec!["A", "C", "D"]), &codes, 3).await;
        assert_eq!(valid, vec!["A", "C"]);
        assert_eq!(invalid, vec!["B"]);

        let (valid, invalid) = validate_codes(&KnownCodes(vec![]), &codes, 2).await;
        assert!(valid.is_empty());
        assert_eq!(invalid, vec!["A", "B"]);
    }
}
