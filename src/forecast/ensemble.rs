//! Ensemble inference: channel sequence models -> boosted regressor.
//!
//! ```text
//! window ──► cpi model ──┐
//!        ──► rate model ─┼─► (cpi, rate, bank_rate) ─► feature scaler ─► booster ─► target⁻¹ ─► forecast
//!        ──► bank model ─┘
//! ```
//!
//! The predictor is a pure function of its inputs and the loaded models.

use std::sync::Arc;

use tracing::Span;

use crate::domain::{Channel, FeatureVector, SequenceWindow};
use crate::error::ForecastError;
use crate::io::artifact::{ArtifactName, ArtifactStore};
use crate::models::{BoostedRegressor, MinMaxScaler, Regressor, ScalerPair, SequenceModel, SequenceRegressor};

pub struct EnsemblePredictor {
    cpi: Box<dyn SequenceRegressor>,
    rate: Box<dyn SequenceRegressor>,
    bank_rate: Box<dyn SequenceRegressor>,
    booster: Box<dyn Regressor>,
    scalers: Arc<ScalerPair>,
    span: Span,
}

impl std::fmt::Debug for EnsemblePredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsemblePredictor")
            .field("scalers", &self.scalers)
            .finish_non_exhaustive()
    }
}

impl EnsemblePredictor {
    pub fn new(
        cpi: Box<dyn SequenceRegressor>,
        rate: Box<dyn SequenceRegressor>,
        bank_rate: Box<dyn SequenceRegressor>,
        booster: Box<dyn Regressor>,
        scalers: Arc<ScalerPair>,
    ) -> Self {
        Self {
            cpi,
            rate,
            bank_rate,
            booster,
            scalers,
            span: tracing::info_span!("ensemble"),
        }
    }

    /// Load all six artifacts from `store`.
    pub fn load(store: &ArtifactStore) -> Result<Self, ForecastError> {
        let scalers = Arc::new(load_scalers(store)?);
        let booster: BoostedRegressor = store.load(ArtifactName::BoostedModel.file_name())?;

        let load_channel = |channel: Channel| -> Result<Box<dyn SequenceRegressor>, ForecastError> {
            let model: SequenceModel = store.load(ArtifactName::for_channel(channel).file_name())?;
            tracing::info!(
                channel = channel.display_name(),
                model = model.kind_name(),
                "loaded sequence model"
            );
            Ok(Box::new(model))
        };
        let cpi = load_channel(Channel::Cpi)?;
        let rate = load_channel(Channel::Rate)?;
        let bank_rate = load_channel(Channel::BankRate)?;

        tracing::info!(trees = booster.n_trees(), "loaded boosted regressor");
        Ok(Self::new(cpi, rate, bank_rate, Box::new(booster), scalers))
    }

    pub fn scalers(&self) -> &ScalerPair {
        &self.scalers
    }

    /// Steps 1-2: run each channel model and concatenate their outputs.
    pub fn channel_outputs(&self, window: &SequenceWindow) -> Result<FeatureVector, ForecastError> {
        let run = |channel: Channel, model: &dyn SequenceRegressor| {
            model
                .predict_window(window)
                .map_err(|e| as_inference(&format!("{} sequence model", channel.display_name()), e))
        };
        Ok(FeatureVector::new(
            run(Channel::Cpi, self.cpi.as_ref())?,
            run(Channel::Rate, self.rate.as_ref())?,
            run(Channel::BankRate, self.bank_rate.as_ref())?,
        ))
    }

    /// Steps 3-5: scale, run the booster, inverse-scale.
    pub fn predict_from_features(&self, features: FeatureVector) -> Result<f64, ForecastError> {
        let scaled = self
            .scalers
            .scale_features(features)
            .map_err(|e| as_inference("feature scaling", e))?;
        let scaled_pred = self
            .booster
            .predict(&scaled)
            .map_err(|e| as_inference("boosted regressor", e))?;
        self.scalers
            .unscale_target(scaled_pred)
            .map_err(|e| as_inference("target scaling", e))
    }

    /// Full ensemble prediction for one window.
    pub fn predict_one(&self, window: &SequenceWindow) -> Result<f64, ForecastError> {
        let _guard = self.span.enter();
        let features = self.channel_outputs(window)?;
        let pred = self.predict_from_features(features)?;
        tracing::debug!(
            window = window.len(),
            cpi = features.cpi,
            rate = features.rate,
            bank_rate = features.bank_rate,
            prediction = pred,
            "ensemble prediction"
        );
        Ok(pred)
    }
}

/// Load the feature and target scalers as a validated pair.
pub fn load_scalers(store: &ArtifactStore) -> Result<ScalerPair, ForecastError> {
    let features: MinMaxScaler = store.load(ArtifactName::FeatureScaler.file_name())?;
    let target: MinMaxScaler = store.load(ArtifactName::TargetScaler.file_name())?;
    ScalerPair::new(features, target).map_err(|e| ForecastError::ArtifactCorrupt {
        name: "scalers".to_string(),
        reason: e.to_string(),
    })
}

/// Keep inference errors as they are; wrap anything else with its stage.
fn as_inference(stage: &str, err: ForecastError) -> ForecastError {
    match err {
        ForecastError::Inference { .. } => err,
        other => ForecastError::inference(stage, other),
    }
}
