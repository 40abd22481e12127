use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView1};

use super::{Metric, VoteWeights};
use crate::models::Prediction;

const WEIGHT_EPSILON: f64 = 1e-9;

/// `1 - 2·Σmin(x, y) / Σ(x + y)` over non-negative vectors.
pub fn sorensen_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let mut overlap = 0.0;
    let mut total = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        if *x == 0.0 && *y == 0.0 {
            continue;
        }
        overlap += x.min(*y);
        total += x + y;
    }

    if total == 0.0 {
        0.0
    } else {
        1.0 - 2.0 * overlap / total
    }
}

pub fn euclidean_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[derive(Debug, Default)]
struct Tally {
    votes: f64,
    distance_sum: f64,
}

pub(super) fn predict(
    training: &Array2<f64>,
    query: &Array1<f64>,
    labels: &[i32],
    metric: Metric,
    k: usize,
    weights: VoteWeights,
) -> Prediction {
    if metric == Metric::Sorensen && query.iter().chain(training.iter()).any(|v| *v < 0.0) {
        log::warn!("sorensen distance on negative values, results are not bounded to [0, 1]");
    }

    let mut neighbors: Vec<(usize, f64)> = training
        .rows()
        .into_iter()
        .enumerate()
        .map(|(row, values)| {
            let distance = match metric {
                Metric::Sorensen => sorensen_distance(values, query.view()),
                Metric::Euclidean => euclidean_distance(values, query.view()),
            };
            (row, distance)
        })
        .collect();
    neighbors.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    neighbors.truncate(k.clamp(1, labels.len()));

    let mut tallies: BTreeMap<i32, Tally> = BTreeMap::new();
    for (row, distance) in &neighbors {
        let tally = tallies.entry(labels[*row]).or_default();
        tally.votes += match weights {
            VoteWeights::Uniform => 1.0,
            VoteWeights::Distance => 1.0 / (distance + WEIGHT_EPSILON),
        };
        tally.distance_sum += distance;
    }

    // Most votes, then smallest distance sum, then smallest room id.
    let mut best: Option<(i32, &Tally)> = None;
    for (room_id, tally) in &tallies {
        let better = match best {
            None => true,
            Some((_, current)) => {
                tally.votes > current.votes
                    || (tally.votes == current.votes && tally.distance_sum < current.distance_sum)
            }
        };
        if better {
            best = Some((*room_id, tally));
        }
    }

    let room_id = best.map(|(room_id, _)| room_id).unwrap_or(labels[neighbors[0].0]);
    let distance = neighbors.iter().map(|(_, d)| d).sum::<f64>() / neighbors.len() as f64;

    Prediction {
        room_id,
        distance,
        optional_value: None,
    }
}
