use ndarray::Array2;

use crate::features::{FeatureMatrix, QueryVector};

/// Signal assumed for a router that was not heard.
pub const MISSING_RSSI: f64 = -100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingValueStrategy {
    /// Borrow the live reading for the router when the device hears it.
    UseReceived,
    WeakSignal,
}

impl MissingValueStrategy {
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "use_received" => Self::UseReceived,
            _ => Self::WeakSignal,
        }
    }
}

pub fn impute_missing(
    matrix: &FeatureMatrix,
    query: &QueryVector,
    strategy: MissingValueStrategy,
) -> Array2<f64> {
    let filled = Array2::from_shape_fn(matrix.cells.dim(), |(row, col)| {
        match matrix.cells[[row, col]] {
            Some(value) => value,
            None => match strategy {
                MissingValueStrategy::UseReceived => query.cells[col].unwrap_or(MISSING_RSSI),
                MissingValueStrategy::WeakSignal => MISSING_RSSI,
            },
        }
    });

    log::debug!(
        "filled {} missing training cells with {:?}",
        matrix.cells.iter().filter(|cell| cell.is_none()).count(),
        strategy
    );
    filled
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array1};

    use super::*;

    fn sample() -> (FeatureMatrix, QueryVector) {
        let matrix = FeatureMatrix {
            mac_address_list: vec!["AA".to_string(), "BB".to_string(), "CC".to_string()],
            cells: array![
                [Some(-40.0), None, None],
                [None, Some(-45.0), Some(-70.0)]
            ],
            labels: vec![101, 102],
        };
        let query = QueryVector {
            cells: Array1::from(vec![Some(-42.0), Some(-58.0), None]),
        };
        (matrix, query)
    }

    #[test]
    fn use_received_borrows_live_values() {
        let (matrix, query) = sample();
        let filled = impute_missing(&matrix, &query, MissingValueStrategy::UseReceived);
        assert_eq!(filled, array![[-40.0, -58.0, MISSING_RSSI], [-42.0, -45.0, -70.0]]);
    }

    #[test]
    fn weak_signal_ignores_live_scan() {
        let (matrix, query) = sample();
        let filled = impute_missing(&matrix, &query, MissingValueStrategy::WeakSignal);
        assert_eq!(
            filled,
            array![[-40.0, MISSING_RSSI, MISSING_RSSI], [MISSING_RSSI, -45.0, -70.0]]
        );
    }

    #[test]
    fn every_strategy_fills_every_cell() {
        let (matrix, query) = sample();
        for strategy in [MissingValueStrategy::UseReceived, MissingValueStrategy::WeakSignal] {
            let filled = impute_missing(&matrix, &query, strategy);
            assert_eq!(filled.dim(), matrix.cells.dim());
            assert!(filled.iter().all(|value| value.is_finite()));
        }
    }

    #[test]
    fn unknown_names_fall_back_to_weak_signal() {
        assert_eq!(MissingValueStrategy::from_name("use_received"), MissingValueStrategy::UseReceived);
        assert_eq!(MissingValueStrategy::from_name("mean"), MissingValueStrategy::WeakSignal);
        assert_eq!(MissingValueStrategy::from_name(""), MissingValueStrategy::WeakSignal);
    }
}
