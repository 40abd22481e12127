use linfa::prelude::*;
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::class_list;
use crate::error::{LocalizationError, LocalizationResult};
use crate::models::Prediction;

/// Bagged decision trees, each fitted on a bootstrap sample of the rows and a
/// random subset of `ceil(sqrt(columns))` routers.
pub(super) fn predict(
    training: &Array2<f64>,
    query: &Array1<f64>,
    labels: &[i32],
    n_estimators: usize,
    max_depth: Option<usize>,
    seed: u64,
) -> LocalizationResult<Prediction> {
    let classes = class_list(labels);
    let targets: Vec<usize> = labels
        .iter()
        .map(|label| classes.binary_search(label).unwrap_or_default())
        .collect();

    let n_rows = training.nrows();
    let n_columns = training.ncols();
    let subspace = ((n_columns as f64).sqrt().ceil() as usize).clamp(1, n_columns);
    let n_estimators = n_estimators.max(1);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut votes = vec![0usize; classes.len()];

    for _ in 0..n_estimators {
        let rows: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
        let mut columns = rand::seq::index::sample(&mut rng, n_columns, subspace).into_vec();
        columns.sort_unstable();

        let records = training.select(Axis(0), &rows).select(Axis(1), &columns);
        let sample_targets = Array1::from_iter(rows.iter().map(|row| targets[*row]));
        let dataset = Dataset::new(records, sample_targets);

        let tree = DecisionTree::params()
            .max_depth(max_depth)
            .fit(&dataset)
            .map_err(|e| LocalizationError::Training(e.to_string()))?;

        let sample = query.select(Axis(0), &columns).insert_axis(Axis(0));
        let predicted: Array1<usize> = tree.predict(&sample);
        if let Some(class) = predicted.get(0) {
            votes[*class] += 1;
        }
    }

    // Ties go to the lowest room id.
    let mut best = 0;
    for (class, count) in votes.iter().enumerate() {
        if *count > votes[best] {
            best = class;
        }
    }
    let probability = votes[best] as f64 / n_estimators as f64;

    log::debug!(
        "random forest voted {}/{} for room {}",
        votes[best],
        n_estimators,
        classes[best]
    );

    Ok(Prediction {
        room_id: classes[best],
        distance: 1.0 - probability,
        optional_value: None,
    })
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn separated_rooms() -> (Array2<f64>, Vec<i32>) {
        let training = array![
            [-40.0, -85.0],
            [-42.0, -88.0],
            [-38.0, -90.0],
            [-45.0, -86.0],
            [-88.0, -41.0],
            [-90.0, -39.0],
            [-86.0, -44.0],
            [-89.0, -42.0]
        ];
        let labels = vec![101, 101, 101, 101, 102, 102, 102, 102];
        (training, labels)
    }

    #[test]
    fn predicts_room_of_matching_pattern() {
        let (training, labels) = separated_rooms();
        let prediction = predict(&training, &array![-41.0, -87.0], &labels, 50, None, 7).expect("forest");
        assert_eq!(prediction.room_id, 101);
        assert!(prediction.distance >= 0.0 && prediction.distance < 0.5);
        assert_eq!(prediction.optional_value, None);

        let prediction = predict(&training, &array![-87.0, -40.0], &labels, 50, Some(3), 7).expect("forest");
        assert_eq!(prediction.room_id, 102);
    }

    #[test]
    fn same_seed_gives_same_prediction() {
        let (training, labels) = separated_rooms();
        let query = array![-60.0, -60.0];
        let first = predict(&training, &query, &labels, 25, None, 11).expect("forest");
        let second = predict(&training, &query, &labels, 25, None, 11).expect("forest");
        assert_eq!(first, second);
    }

    #[test]
    fn single_room_is_certain() {
        let training = array![[-40.0, -60.0], [-42.0, -61.0]];
        let prediction = predict(&training, &array![-41.0, -60.0], &[101, 101], 10, None, 1).expect("forest");
        assert_eq!(prediction.room_id, 101);
        assert_eq!(prediction.distance, 0.0);
    }
}
