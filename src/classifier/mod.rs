//! Room classifiers.
//!
//! Every strategy is trained from scratch on each call, because the training
//! matrix depends on the per-request filters and imputation.

use ndarray::{Array1, Array2};

use crate::config::PredictionConfig;
use crate::error::{LocalizationError, LocalizationResult};
use crate::models::Prediction;

mod forest;
mod knn;
mod svm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Sorensen,
    Euclidean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteWeights {
    Uniform,
    /// Each neighbor votes with `1 / (distance + ε)`.
    Distance,
}

impl VoteWeights {
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "distance" => Self::Distance,
            _ => Self::Uniform,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    Linear,
    Rbf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classifier {
    Knn {
        metric: Metric,
        k: usize,
        weights: VoteWeights,
    },
    RandomForest {
        n_estimators: usize,
        max_depth: Option<usize>,
        seed: u64,
    },
    Svm {
        kernel: Kernel,
        c: f64,
        gamma: f64,
    },
}

impl Classifier {
    pub fn from_config(config: &PredictionConfig) -> LocalizationResult<Self> {
        let weights = VoteWeights::from_name(&config.weights);
        match config.algorithm.as_str() {
            "knn_sorensen" => Ok(Self::Knn {
                metric: Metric::Sorensen,
                k: config.k_value,
                weights,
            }),
            "knn_euclidean" => Ok(Self::Knn {
                metric: Metric::Euclidean,
                k: config.k_value,
                weights,
            }),
            "random_forest" => Ok(Self::RandomForest {
                n_estimators: config.n_estimators,
                max_depth: config.max_depth,
                seed: config.random_seed,
            }),
            "svm_linear" => Ok(Self::Svm {
                kernel: Kernel::Linear,
                c: config.c_value,
                gamma: config.gamma_value,
            }),
            "svm_rbf" => Ok(Self::Svm {
                kernel: Kernel::Rbf,
                c: config.c_value,
                gamma: config.gamma_value,
            }),
            other => Err(LocalizationError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Sørensen overlap is only meaningful on non-negative signal values.
    pub fn requires_non_negative(&self) -> bool {
        matches!(
            self,
            Self::Knn {
                metric: Metric::Sorensen,
                ..
            }
        )
    }

    pub fn predict(
        &self,
        training: &Array2<f64>,
        query: &Array1<f64>,
        labels: &[i32],
    ) -> LocalizationResult<Prediction> {
        if training.nrows() == 0 || training.nrows() != labels.len() {
            return Err(LocalizationError::EmptyTrainingData);
        }
        if query.len() != training.ncols() {
            return Err(LocalizationError::EmptyQueryData);
        }

        match self {
            Self::Knn { metric, k, weights } => {
                Ok(knn::predict(training, query, labels, *metric, *k, *weights))
            }
            Self::RandomForest {
                n_estimators,
                max_depth,
                seed,
            } => forest::predict(training, query, labels, *n_estimators, *max_depth, *seed),
            Self::Svm { kernel, c, gamma } => svm::predict(training, query, labels, *kernel, *c, *gamma),
        }
    }
}

/// Sorted distinct room ids, used as class indices by the trained models.
fn class_list(labels: &[i32]) -> Vec<i32> {
    let mut classes = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names_map_to_variants() {
        let mut config = PredictionConfig::default();
        for (name, expected) in [
            ("knn_sorensen", true),
            ("knn_euclidean", true),
            ("random_forest", true),
            ("svm_linear", true),
            ("svm_rbf", true),
            ("unknown_algo", false),
        ] {
            config.algorithm = name.to_string();
            assert_eq!(Classifier::from_config(&config).is_ok(), expected, "{name}");
        }
    }

    #[test]
    fn unknown_algorithm_reports_its_name() {
        let config = PredictionConfig {
            algorithm: "unknown_algo".to_string(),
            ..PredictionConfig::default()
        };
        assert_eq!(
            Classifier::from_config(&config),
            Err(LocalizationError::UnsupportedAlgorithm("unknown_algo".to_string()))
        );
    }

    #[test]
    fn class_list_is_sorted_and_unique() {
        assert_eq!(class_list(&[102, 101, 102, 103]), vec![101, 102, 103]);
    }
}
