//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::app::pipeline::{ForecastRun, RepairEntry, RepairStatus, RetrainReport};
use crate::domain::{FeedbackMode, ForecastStep};
use crate::io::artifact::RepairOutcome;
use crate::io::ingest::{ColumnStats, HistoricalData};

/// Format the dataset section shared by `forecast` and `retrain`.
pub fn format_dataset_summary(history: &HistoricalData) -> String {
    let stats = &history.stats;
    let mut out = String::new();
    out.push_str(&format!(
        "Data: n={} (read {}, dropped {}) | {} .. {}\n",
        stats.n_rows,
        history.rows_read,
        history.row_errors.len(),
        stats.first_date,
        stats.last_date,
    ));
    out.push_str(&fmt_column("CPI", &stats.cpi));
    out.push_str(&fmt_column("Inflation", &stats.inflation));
    out.push_str(&fmt_column("Rate", &stats.rate));
    out.push_str(&fmt_column("Bank Rate", &stats.bank_rate));
    out
}

fn fmt_column(label: &str, c: &ColumnStats) -> String {
    format!("  {label:<10} min={:>9.3} max={:>9.3} mean={:>9.3}\n", c.min, c.max, c.mean)
}

/// Format the header of an `infl forecast` run.
pub fn format_forecast_summary(run: &ForecastRun, mode: FeedbackMode) -> String {
    let mut out = String::new();
    out.push_str("=== infl - Inflation Forecast ===\n");
    out.push_str(&format_dataset_summary(&run.history));
    out.push_str(&format!(
        "Window: {} rows | steps: {} | feedback: {}\n",
        run.window_len,
        run.steps.len(),
        mode_name(mode),
    ));
    out
}

/// Format forecast steps as a fixed-width table.
pub fn format_forecast_table(steps: &[ForecastStep]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<10} {:>10} {:>12} {:>8} {:>9}",
            "date", "inflation", "cpi", "rate", "bank_rate"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!("{:-<10} {:-<10} {:-<12} {:-<8} {:-<9}\n", "", "", "", "", ""));

    for s in steps {
        out.push_str(&format!(
            "{:<10} {:>10.3} {:>12.3} {:>8.3} {:>9.3}\n",
            s.date.to_string(),
            s.predicted_inflation,
            s.cpi,
            s.rate,
            s.bank_rate,
        ));
    }
    out
}

/// Format the outcome of `infl retrain`.
pub fn format_retrain_summary(report: &RetrainReport) -> String {
    let mut out = String::new();
    out.push_str("=== infl - Retrain ===\n");
    out.push_str(&format_dataset_summary(&report.history));

    out.push_str("\nModels:\n");
    out.push_str(&format!(
        "- boosted regressor: {} trees | train RMSE={:.4}\n",
        report.n_trees, report.train_rmse
    ));
    let origin = if report.refit_sequence_models { "refit" } else { "kept" };
    for (channel, kind) in &report.sequence_models {
        out.push_str(&format!("- {} sequence model: {kind} ({origin})\n", channel.display_name()));
    }

    out.push_str("\nVerification:\n");
    for (name, outcome) in &report.verification {
        out.push_str(&format!("- {:<32} {}\n", name.file_name(), outcome_detail(*outcome)));
    }

    out.push_str(&format!(
        "\nSample forecast ({} months) -> {}\n",
        report.forecast.len(),
        report.forecast_path.display()
    ));
    out.push_str(&format_forecast_table(&report.forecast));
    out
}

/// One status line per artifact.
pub fn format_repair_report(entries: &[RepairEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        let (tag, detail) = match &e.status {
            RepairStatus::Done(RepairOutcome::Verified) => ("ok", outcome_detail(RepairOutcome::Verified).to_string()),
            RepairStatus::Done(o @ RepairOutcome::Repaired) => ("repaired", outcome_detail(*o).to_string()),
            RepairStatus::Done(o @ RepairOutcome::RestoredFromBackup) => ("restored", outcome_detail(*o).to_string()),
            RepairStatus::Missing => ("warning", "missing".to_string()),
            RepairStatus::Failed(msg) => ("error", msg.clone()),
        };
        out.push_str(&format!("[{tag:<8}] {:<32} {detail}\n", e.name.file_name()));
    }
    out
}

fn outcome_detail(outcome: RepairOutcome) -> &'static str {
    match outcome {
        RepairOutcome::Verified => "verified",
        RepairOutcome::Repaired => "rewritten in canonical form",
        RepairOutcome::RestoredFromBackup => "restored from backup",
    }
}

fn mode_name(mode: FeedbackMode) -> &'static str {
    match mode {
        FeedbackMode::Static => "static",
        FeedbackMode::Rolling => "rolling",
        FeedbackMode::Direct => "direct",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::artifact::ArtifactName;
    use chrono::NaiveDate;

    #[test]
    fn forecast_table_has_header_rule_and_rows() {
        let steps = vec![ForecastStep {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            predicted_inflation: 2.0,
            cpi: 102.0,
            rate: 3.9,
            bank_rate: 4.85,
        }];
        let table = format_forecast_table(&steps);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0].split_whitespace().collect::<Vec<_>>(),
            vec!["date", "inflation", "cpi", "rate", "bank_rate"]
        );
        assert!(lines[1].chars().all(|c| c == '-' || c == ' '));
        assert_eq!(
            lines[2].split_whitespace().collect::<Vec<_>>(),
            vec!["2024-03-01", "2.000", "102.000", "3.900", "4.850"]
        );
    }

    #[test]
    fn repair_report_tags_each_status() {
        let entries = vec![
            RepairEntry {
                name: ArtifactName::BoostedModel,
                status: RepairStatus::Done(RepairOutcome::Verified),
            },
            RepairEntry {
                name: ArtifactName::TargetScaler,
                status: RepairStatus::Missing,
            },
            RepairEntry {
                name: ArtifactName::FeatureScaler,
                status: RepairStatus::Failed("bad bytes".to_string()),
            },
        ];
        let txt = format_repair_report(&entries);
        let lines: Vec<&str> = txt.lines().collect();
        assert!(lines[0].starts_with("[ok      ] boosted_model.json"));
        assert!(lines[1].starts_with("[warning ] target_scaler.json"));
        assert!(lines[1].ends_with("missing"));
        assert!(lines[2].ends_with("bad bytes"));
    }
}
