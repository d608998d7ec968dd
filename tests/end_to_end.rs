use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use inflation_forecast::app::pipeline::{self, RepairStatus};
use inflation_forecast::domain::{FeedbackMode, PredictConfig, RetrainConfig};
use inflation_forecast::fit::BoostParams;
use inflation_forecast::io::{ArtifactName, RepairOutcome};

fn write_history(dir: &Path) -> PathBuf {
    let mut csv = String::from("observation_date,Monthly_CPI,Monthly_Inflation,Monthly_Rate,Bank Rate\n");
    let start = NaiveDate::from_ymd_opt(2012, 1, 1).unwrap();
    for i in 0..60 {
        let t = i as f64;
        let date = start + chrono::Duration::days(30 * i);
        writeln!(
            csv,
            "{date},{:.4},{:.4},{:.4},{:.4}",
            100.0 + 0.25 * t + 0.5 * (t * 0.5).sin(),
            2.0 + 0.7 * (t * 0.3).sin(),
            2.5 + 0.4 * (t * 0.2).cos(),
            0.75 + 0.25 * (t * 0.1).sin(),
        )
        .unwrap();
    }
    // One unusable row; it is dropped, not fatal.
    csv.push_str("2017-06-01,,2.0,2.0,0.5\n");
    let path = dir.join("Inflation _ data.csv");
    fs::write(&path, csv).unwrap();
    path
}

#[test]
fn retrain_then_predict_then_repair() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    let csv = write_history(dir.path());

    let report = pipeline::run_retrain(&RetrainConfig {
        models_dir: models.clone(),
        csv_path: csv,
        months: 12,
        window: 12,
        feedback: FeedbackMode::Direct,
        keep_sequence_models: false,
        sequence_lags: 3,
        boost: BoostParams {
            n_estimators: 40,
            ..BoostParams::default()
        },
    })
    .unwrap();
    assert_eq!(report.history.rows_used(), 60);
    assert_eq!(report.history.row_errors.len(), 1);
    assert_eq!(report.forecast.len(), 12);

    let exported = fs::read_to_string(models.join(pipeline::FUTURE_PREDICTIONS_FILE)).unwrap();
    assert!(exported.starts_with("date,predicted_inflation,cpi,rate,bankRate\n"));
    assert_eq!(exported.lines().count(), 13);

    let input = r#"[
        {"cpi": 113.0, "inflation": 2.1, "rate": 2.4, "bankRate": 0.8},
        {"cpi": 113.4, "inflation": 2.3, "rate": 2.5, "bankRate": 0.8},
        {"cpi": 113.9, "inflation": 2.6, "rate": 2.6, "bankRate": 0.9, "date": "2024-01-31"}
    ]"#;
    let predict = |feedback| {
        pipeline::run_predict(&PredictConfig {
            models_dir: models.clone(),
            input_json: input.to_string(),
            steps: 12,
            feedback,
        })
        .unwrap()
    };
    let first = predict(FeedbackMode::Static);
    assert_eq!(first.len(), 12);
    assert_eq!(first[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    assert!(first.iter().all(|s| s.predicted_inflation.is_finite()));
    assert_eq!(first, predict(FeedbackMode::Static));
    assert_eq!(predict(FeedbackMode::Rolling).len(), 12);

    // Damage one artifact the way a Windows checkout would.
    let scaler_path = models.join(ArtifactName::TargetScaler.file_name());
    let canonical = fs::read_to_string(&scaler_path).unwrap();
    fs::write(&scaler_path, canonical.replace('\n', "\r\n")).unwrap();

    let entries = pipeline::run_repair(&models);
    for e in &entries {
        let expected = if e.name == ArtifactName::TargetScaler {
            RepairOutcome::Repaired
        } else {
            RepairOutcome::Verified
        };
        assert_eq!(e.status, RepairStatus::Done(expected), "{}", e.name.file_name());
    }
    assert_eq!(fs::read_to_string(&scaler_path).unwrap(), canonical);

    // Predictions are unchanged by the repair.
    assert_eq!(first, predict(FeedbackMode::Static));
}

#[test]
fn keep_sequence_models_requires_existing_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    let csv = write_history(dir.path());

    let err = pipeline::run_retrain(&RetrainConfig {
        models_dir: models.clone(),
        csv_path: csv,
        months: 3,
        window: 12,
        feedback: FeedbackMode::Static,
        keep_sequence_models: true,
        sequence_lags: 3,
        boost: BoostParams::default(),
    })
    .unwrap_err();
    assert_eq!(err.exit_code(), 4);
    assert!(!models.join(ArtifactName::BoostedModel.file_name()).exists());
}
