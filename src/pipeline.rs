use std::collections::HashSet;

use crate::aggregate::{aggregate_fingerprints, ssid_directory};
use crate::classifier::Classifier;
use crate::conditioning::ScalingStrategy;
use crate::config::PredictionConfig;
use crate::error::LocalizationResult;
use crate::features::FeatureMatrix;
use crate::impute::impute_missing;
use crate::models::{LiveScan, Prediction, RawReading};

/// Everything one prediction needs, already fetched from storage.
#[derive(Debug, Clone)]
pub struct LocalizationRequest<'a> {
    pub readings: &'a [RawReading],
    pub scan: &'a LiveScan,
    pub config: &'a PredictionConfig,
    pub excluded: &'a HashSet<i32>,
}

pub fn predict_room(request: &LocalizationRequest<'_>) -> LocalizationResult<Prediction> {
    let config = request.config;
    let classifier = Classifier::from_config(config)?;

    let records = aggregate_fingerprints(request.readings, request.excluded);
    let ssids = ssid_directory(request.readings);
    let records = config.filter_chain().apply(records, request.scan, &ssids);

    let matrix = FeatureMatrix::build(&records)?;
    let query = matrix.query_vector(request.scan);

    let training = impute_missing(&matrix, &query, config.missing_value_strategy());
    let mut conditioner = config.conditioner();
    if classifier.requires_non_negative() && conditioner.scaling == ScalingStrategy::None {
        log::warn!("{} needs non-negative values, shifting by the weakest rssi", config.algorithm);
        conditioner.scaling = ScalingStrategy::Positive;
    }
    let (training, query) = conditioner.apply(training, &query)?;

    let prediction = classifier.predict(&training, &query, &matrix.labels)?;
    log::info!(
        "predicted room {} with distance {:.4} using {} ({} samples, {} routers)",
        prediction.room_id,
        prediction.distance,
        config.algorithm,
        matrix.rows(),
        matrix.columns()
    );
    Ok(prediction)
}
