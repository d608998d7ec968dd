//! Historical CSV ingest and normalization.
//!
//! This module turns a macro-series CSV into a clean, date-ordered list of
//! [`Observation`]s that are safe to fit.
//!
//! Design goals:
//! - **Strict schema**: every required column must be present (after alias
//!   resolution) before any row is read; all missing names are reported at once
//! - **Row-level validation**: rows with missing or unparseable values are
//!   dropped and reported, never fatal
//! - **Deterministic ordering**: rows are sorted by date (stable on ties)

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::Observation;
use crate::error::ForecastError;

/// Canonical column names, in the order they are reported when missing.
pub const REQUIRED_COLUMNS: [&str; 5] = ["date", "cpi", "inflation", "rate", "bank_rate"];

/// Min/max/mean of one column over the ingested rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl ColumnStats {
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut n = 0usize;
        for v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            n += 1;
        }
        (n > 0).then(|| Self {
            min,
            max,
            mean: sum / n as f64,
        })
    }
}

/// Summary stats about the rows actually kept.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_rows: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub cpi: ColumnStats,
    pub inflation: ColumnStats,
    pub rate: ColumnStats,
    pub bank_rate: ColumnStats,
}

/// A row dropped during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: ordered observations + stats + dropped rows.
#[derive(Debug, Clone)]
pub struct HistoricalData {
    pub observations: Vec<Observation>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl HistoricalData {
    pub fn rows_used(&self) -> usize {
        self.observations.len()
    }

    pub fn last_date(&self) -> NaiveDate {
        self.stats.last_date
    }
}

/// Load and normalize a historical CSV file.
pub fn load_history(path: &Path) -> Result<HistoricalData, ForecastError> {
    let file = File::open(path)
        .map_err(|e| ForecastError::io(format!("Failed to open CSV '{}'", path.display()), e))?;
    let data = read_history(file)?;
    tracing::info!(
        path = %path.display(),
        rows_read = data.rows_read,
        rows_used = data.rows_used(),
        first = %data.stats.first_date,
        last = %data.stats.last_date,
        "loaded historical data"
    );
    Ok(data)
}

/// Read historical rows from any CSV source.
pub fn read_history<R: Read>(source: R) -> Result<HistoricalData, ForecastError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader
        .headers()
        .map_err(|e| ForecastError::InvalidInput(format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(&header_map)?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_row(&record, &header_map));
        match parsed {
            Ok(obs) => observations.push(obs),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if !row_errors.is_empty() {
        tracing::warn!(dropped = row_errors.len(), "dropped rows with missing or invalid values");
        for e in row_errors.iter().take(5) {
            tracing::debug!(line = e.line, reason = %e.message, "dropped row");
        }
    }

    observations.sort_by_key(|o| o.date);

    let stats = compute_stats(&observations)
        .ok_or_else(|| ForecastError::EmptyDataset("no valid rows remain after cleaning".to_string()))?;

    Ok(HistoricalData {
        observations,
        stats,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<&'static str, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        if let Some(canonical) = canonical_column(name) {
            // First occurrence wins if a file carries both an alias and the canonical name.
            map.entry(canonical).or_insert(idx);
        }
    }
    map
}

/// Map a raw header to its canonical column, if it is one we use.
fn canonical_column(name: &str) -> Option<&'static str> {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase();
    match name.as_str() {
        "date" | "observation_date" => Some("date"),
        "cpi" | "monthly_cpi" => Some("cpi"),
        "inflation" | "monthly_inflation" => Some("inflation"),
        "rate" | "monthly_rate" => Some("rate"),
        "bank_rate" | "bankrate" | "bank rate" => Some("bank_rate"),
        _ => None,
    }
}

fn ensure_required_columns_exist(header_map: &HashMap<&'static str, usize>) -> Result<(), ForecastError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !header_map.contains_key(*c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ForecastError::Schema { missing })
    }
}

fn parse_row(record: &StringRecord, header_map: &HashMap<&'static str, usize>) -> Result<Observation, String> {
    Ok(Observation {
        date: parse_date(get_required(record, header_map, "date")?)?,
        cpi: parse_f64(record, header_map, "cpi")?,
        inflation: parse_f64(record, header_map, "inflation")?,
        rate: parse_f64(record, header_map, "rate")?,
        bank_rate: parse_f64(record, header_map, "bank_rate")?,
    })
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<&'static str, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("nan") && *s != ".")
        .ok_or_else(|| format!("Missing value: `{name}`"))
}

fn parse_f64(record: &StringRecord, header_map: &HashMap<&'static str, usize>, name: &str) -> Result<f64, String> {
    let raw = get_required(record, header_map, name)?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("Invalid number '{raw}' in `{name}`")),
    }
}

/// Parse a date in one of a small set of common export formats.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%Y-%m-%d %H:%M:%S"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY, YYYY/MM/DD."
    ))
}

fn compute_stats(observations: &[Observation]) -> Option<DatasetStats> {
    let first = observations.first()?;
    let last = observations.last()?;
    Some(DatasetStats {
        n_rows: observations.len(),
        first_date: first.date,
        last_date: last.date,
        cpi: ColumnStats::from_values(observations.iter().map(|o| o.cpi))?,
        inflation: ColumnStats::from_values(observations.iter().map(|o| o.inflation))?,
        rate: ColumnStats::from_values(observations.iter().map(|o| o.rate))?,
        bank_rate: ColumnStats::from_values(observations.iter().map(|o| o.bank_rate))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL_HEADERS: &str = "observation_date,Monthly_CPI,Monthly_Inflation,Monthly_Rate,Bank Rate\n";

    #[test]
    fn renames_aliases_and_sorts_by_date() {
        let csv = format!(
            "{ORIGINAL_HEADERS}2024-02-01,130.5,3.1,4.9,5.25\n2024-01-01,130.0,3.4,5.0,5.25\n"
        );
        let data = read_history(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_used(), 2);
        assert_eq!(data.observations[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(data.observations[1].cpi, 130.5);
        assert_eq!(data.last_date(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn missing_bank_rate_is_schema_error() {
        let csv = "date,cpi,inflation,rate\n2024-01-01,1,2,3\n";
        match read_history(csv.as_bytes()).unwrap_err() {
            ForecastError::Schema { missing } => assert_eq!(missing, vec!["bank_rate".to_string()]),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn drops_rows_with_missing_values() {
        let csv = format!(
            "{ORIGINAL_HEADERS}2024-01-01,130.0,3.4,5.0,5.25\n2024-02-01,,3.1,4.9,5.25\n2024-03-01,131.0,NaN,4.8,5.0\nbad-date,1,1,1,1\n"
        );
        let data = read_history(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_read, 4);
        assert_eq!(data.rows_used(), 1);
        assert_eq!(data.row_errors.len(), 3);
        assert_eq!(data.row_errors[0].line, 3);
    }

    #[test]
    fn all_rows_invalid_is_empty_dataset() {
        let csv = format!("{ORIGINAL_HEADERS}2024-01-01,,,,\n");
        assert!(matches!(read_history(csv.as_bytes()), Err(ForecastError::EmptyDataset(_))));
    }

    #[test]
    fn bom_prefixed_header_is_recognized() {
        let csv = "\u{feff}date,cpi,inflation,rate,bankRate\n01/02/2024,1,2,3,4\n";
        let data = read_history(csv.as_bytes()).unwrap();
        assert_eq!(data.observations[0].date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(data.observations[0].bank_rate, 4.0);
    }

    #[test]
    fn stats_cover_kept_rows() {
        let csv = "date,cpi,inflation,rate,bank_rate\n2024-01-01,100,1,2,3\n2024-02-01,110,3,4,5\n";
        let data = read_history(csv.as_bytes()).unwrap();
        assert_eq!(data.stats.cpi.min, 100.0);
        assert_eq!(data.stats.cpi.max, 110.0);
        assert_eq!(data.stats.inflation.mean, 2.0);
    }
}
