use linfa::dataset::Pr;
use linfa::prelude::*;
use linfa_svm::Svm;
use ndarray::{Array1, Array2, Axis};

use super::{class_list, Kernel};
use crate::error::{LocalizationError, LocalizationResult};
use crate::models::Prediction;

/// Platt-calibrated one-vs-rest output for one room.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ClassScore {
    probability: f64,
    margin: f64,
}

fn effective_gamma(gamma: f64) -> f64 {
    if gamma > 0.0 {
        gamma
    } else {
        log::warn!("non-positive svm gamma {gamma}, using 1.0");
        1.0
    }
}

fn train_binary(
    training: &Array2<f64>,
    targets: Array1<bool>,
    kernel: Kernel,
    c: f64,
    gamma: f64,
) -> LocalizationResult<Svm<f64, Pr>> {
    let dataset = Dataset::new(training.clone(), targets);
    let params = Svm::<f64, Pr>::params().pos_neg_weights(c, c);
    match kernel {
        Kernel::Linear => params.linear_kernel().fit(&dataset),
        // linfa's gaussian kernel is exp(-‖x-y‖² / eps)
        Kernel::Rbf => params.gaussian_kernel(1.0 / gamma).fit(&dataset),
    }
    .map_err(|e| LocalizationError::Training(e.to_string()))
}

/// Trains one model per class and normalises the calibrated probabilities
/// so they sum to one across classes.
fn class_scores(
    training: &Array2<f64>,
    query: &Array1<f64>,
    labels: &[i32],
    classes: &[i32],
    kernel: Kernel,
    c: f64,
    gamma: f64,
) -> LocalizationResult<Vec<ClassScore>> {
    let sample = query.clone().insert_axis(Axis(0));
    let mut scores = Vec::with_capacity(classes.len());
    for class in classes {
        let targets = Array1::from_iter(labels.iter().map(|label| label == class));
        let model = train_binary(training, targets, kernel, c, gamma)?;
        let probability = model
            .predict(&sample)
            .iter()
            .map(|p| f64::from(**p))
            .next()
            .unwrap_or(0.0);
        scores.push(ClassScore {
            probability: probability.clamp(0.0, 1.0),
            margin: model.weighted_sum(query) - model.rho,
        });
    }

    let total: f64 = scores.iter().map(|score| score.probability).sum();
    let uniform = 1.0 / scores.len() as f64;
    for score in scores.iter_mut() {
        score.probability = if total > 0.0 {
            score.probability / total
        } else {
            uniform
        };
    }
    Ok(scores)
}

pub(super) fn predict(
    training: &Array2<f64>,
    query: &Array1<f64>,
    labels: &[i32],
    kernel: Kernel,
    c: f64,
    gamma: f64,
) -> LocalizationResult<Prediction> {
    let classes = class_list(labels);
    if classes.len() == 1 {
        return Ok(Prediction {
            room_id: classes[0],
            distance: 0.0,
            optional_value: Some(0.0),
        });
    }
    let gamma = effective_gamma(gamma);

    let scores = class_scores(training, query, labels, &classes, kernel, c, gamma)?;

    // ties keep the smaller room id
    let mut best = 0;
    for (index, score) in scores.iter().enumerate() {
        if score.probability > scores[best].probability {
            best = index;
        }
    }
    log::debug!("svm {:?} class scores {:?}", kernel, scores);

    Ok(Prediction {
        room_id: classes[best],
        distance: 1.0 - scores[best].probability,
        optional_value: Some(scores[best].margin),
    })
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn separated_rooms() -> (Array2<f64>, Vec<i32>) {
        let training = array![
            [6.0, 1.5],
            [5.8, 1.2],
            [6.2, 1.0],
            [1.2, 6.0],
            [1.0, 5.9],
            [1.5, 6.2]
        ];
        (training, vec![101, 101, 101, 102, 102, 102])
    }

    #[test]
    fn probabilities_are_normalised_and_pick_the_prediction() {
        let (training, labels) = separated_rooms();
        let classes = class_list(&labels);
        let query = array![5.9, 1.3];

        let scores =
            class_scores(&training, &query, &labels, &classes, Kernel::Linear, 1.0, 1.0).expect("svm");
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(&s.probability)));
        assert!((scores.iter().map(|s| s.probability).sum::<f64>() - 1.0).abs() < 1e-9);

        let prediction = predict(&training, &query, &labels, Kernel::Linear, 1.0, 1.0).expect("svm");
        let predicted = classes
            .iter()
            .position(|room| *room == prediction.room_id)
            .expect("predicted room is a class");
        let largest = scores.iter().map(|s| s.probability).fold(f64::MIN, f64::max);
        assert_eq!(scores[predicted].probability, largest);
        assert!((prediction.distance - (1.0 - largest)).abs() < 1e-12);
        assert_eq!(prediction.optional_value, Some(scores[predicted].margin));
    }

    #[test]
    fn linear_kernel_separates_rooms() {
        let (training, labels) = separated_rooms();
        let prediction =
            predict(&training, &array![5.9, 1.3], &labels, Kernel::Linear, 1.0, 1.0).expect("svm");
        assert_eq!(prediction.room_id, 101);
        assert!(prediction.distance <= 0.5);
        assert!(prediction.optional_value.is_some());
    }

    #[test]
    fn rbf_kernel_separates_rooms() {
        let (training, labels) = separated_rooms();
        let prediction =
            predict(&training, &array![1.1, 6.1], &labels, Kernel::Rbf, 1.0, 0.5).expect("svm");
        assert_eq!(prediction.room_id, 102);
        assert!(prediction.distance <= 0.5);
    }

    #[test]
    fn non_positive_gamma_falls_back_to_one() {
        assert_eq!(effective_gamma(0.0), 1.0);
        assert_eq!(effective_gamma(-2.0), 1.0);
        assert_eq!(effective_gamma(0.25), 0.25);

        let (training, labels) = separated_rooms();
        let prediction =
            predict(&training, &array![1.1, 6.1], &labels, Kernel::Rbf, 1.0, 0.0).expect("svm");
        assert!((0.0..=1.0).contains(&prediction.distance));
    }

    #[test]
    fn single_room_needs_no_training() {
        let training = array![[1.0, 2.0]];
        let prediction = predict(&training, &array![1.0, 2.0], &[101], Kernel::Rbf, 1.0, 1.0).expect("svm");
        assert_eq!(prediction.room_id, 101);
        assert_eq!(prediction.distance, 0.0);
        assert_eq!(prediction.optional_value, Some(0.0));
    }
}
