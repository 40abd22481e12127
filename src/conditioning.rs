use ndarray::{Array1, Array2};

use crate::error::{LocalizationError, LocalizationResult};
use crate::features::QueryVector;
use crate::impute::MISSING_RSSI;

const EXPONENTIAL_ALPHA: f64 = 24.0;
const POWED_BETA: f64 = std::f64::consts::E;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingStrategy {
    None,
    /// Shift so the weakest observed value becomes zero.
    Positive,
    Exponential,
    Powed,
}

impl ScalingStrategy {
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "none" | "" => Self::None,
            "positive" => Self::Positive,
            "exponential" => Self::Exponential,
            "powed" => Self::Powed,
            other => {
                log::warn!("unknown value scaling strategy {other}, leaving values unscaled");
                Self::None
            }
        }
    }

    fn scale(self, value: f64, min_rssi_value: f64) -> f64 {
        let positive = value - min_rssi_value;
        match self {
            Self::None => value,
            Self::Positive => positive,
            Self::Exponential => {
                (positive / EXPONENTIAL_ALPHA).exp() / (-min_rssi_value / EXPONENTIAL_ALPHA).exp()
            }
            Self::Powed => {
                let base = (-min_rssi_value).max(f64::EPSILON);
                positive.powf(POWED_BETA) / base.powf(POWED_BETA)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SignalConditioner {
    pub rssi_threshold: f64,
    pub scaling: ScalingStrategy,
}

impl SignalConditioner {
    /// Resolves unheard query cells, then applies the threshold and scaling to
    /// both sides with the same parameters.
    pub fn apply(
        &self,
        training: Array2<f64>,
        query: &QueryVector,
    ) -> LocalizationResult<(Array2<f64>, Array1<f64>)> {
        if query.heard_count() == 0 {
            return Err(LocalizationError::EmptyQueryData);
        }

        let query = query.cells.mapv(|cell| cell.unwrap_or(MISSING_RSSI));
        let min_rssi_value = training
            .iter()
            .chain(query.iter())
            .copied()
            .fold(f64::INFINITY, f64::min);

        let training = apply_threshold(training, self.rssi_threshold);
        let query = apply_threshold(query, self.rssi_threshold);

        log::debug!(
            "scaling with {:?} relative to min rssi {min_rssi_value}",
            self.scaling
        );
        let scaling = self.scaling;
        Ok((
            training.mapv(|value| scaling.scale(value, min_rssi_value)),
            query.mapv(|value| scaling.scale(value, min_rssi_value)),
        ))
    }
}

/// Raises every value weaker than `threshold` to it.
pub fn apply_threshold<D: ndarray::Dimension>(
    values: ndarray::Array<f64, D>,
    threshold: f64,
) -> ndarray::Array<f64, D> {
    values.mapv_into(|value| value.max(threshold))
}
