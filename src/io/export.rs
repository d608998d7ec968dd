//! Export forecasts to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream
//! scripts; the column set matches the forecast table the dashboard reads.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::ForecastStep;
use crate::error::ForecastError;

pub const FORECAST_CSV_HEADER: &str = "date,predicted_inflation,cpi,rate,bankRate";

/// Write forecast steps to a CSV file.
pub fn write_forecast_csv(path: &Path, steps: &[ForecastStep]) -> Result<(), ForecastError> {
    let file = File::create(path)
        .map_err(|e| ForecastError::io(format!("Failed to create forecast CSV '{}'", path.display()), e))?;
    let mut out = BufWriter::new(file);
    write_forecast(&mut out, steps)
        .and_then(|_| out.flush())
        .map_err(|e| ForecastError::io(format!("Failed to write forecast CSV '{}'", path.display()), e))?;
    tracing::info!(path = %path.display(), rows = steps.len(), "wrote forecast CSV");
    Ok(())
}

/// Write forecast steps as CSV to any writer.
pub fn write_forecast<W: Write>(out: &mut W, steps: &[ForecastStep]) -> std::io::Result<()> {
    writeln!(out, "{FORECAST_CSV_HEADER}")?;
    for s in steps {
        writeln!(
            out,
            "{},{:.6},{:.6},{:.6},{:.6}",
            s.date, s.predicted_inflation, s.cpi, s.rate, s.bank_rate
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn step(day: u32, p: f64) -> ForecastStep {
        ForecastStep {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            predicted_inflation: p,
            cpi: 102.0,
            rate: 3.9,
            bank_rate: 4.85,
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let mut buf = Vec::new();
        write_forecast(&mut buf, &[step(1, 2.0), step(31, 2.5)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], FORECAST_CSV_HEADER);
        assert_eq!(lines[1], "2024-03-01,2.000000,102.000000,3.900000,4.850000");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn file_export_round_trips_through_csv_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future_predictions.csv");
        write_forecast_csv(&path, &[step(1, 2.0)]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.get(4), Some("bankRate"));
        assert_eq!(reader.records().count(), 1);
    }
}
