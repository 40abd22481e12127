use std::collections::BTreeSet;

use ndarray::{Array1, Array2};

use crate::error::{LocalizationError, LocalizationResult};
use crate::models::{FingerprintRecord, LiveScan};

/// Training fingerprints laid out over a fixed router column order.
/// `None` cells are routers a sample did not hear.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub mac_address_list: Vec<String>,
    pub cells: Array2<Option<f64>>,
    pub labels: Vec<i32>,
}

/// The live scan over the same columns as a [`FeatureMatrix`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryVector {
    pub cells: Array1<Option<f64>>,
}

impl QueryVector {
    pub fn heard_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }
}

impl FeatureMatrix {
    pub fn build(records: &[FingerprintRecord]) -> LocalizationResult<Self> {
        let mac_address_list: Vec<String> = records
            .iter()
            .flat_map(|record| record.signals.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if records.is_empty() || mac_address_list.is_empty() {
            return Err(LocalizationError::EmptyTrainingData);
        }

        let cells = Array2::from_shape_fn((records.len(), mac_address_list.len()), |(row, col)| {
            records[row]
                .signals
                .get(&mac_address_list[col])
                .map(|signal| f64::from(*signal))
        });
        let labels = records.iter().map(|record| record.room_id).collect();

        log::debug!(
            "built feature matrix with {} samples over {} routers",
            records.len(),
            mac_address_list.len()
        );

        Ok(Self {
            mac_address_list,
            cells,
            labels,
        })
    }

    pub fn query_vector(&self, scan: &LiveScan) -> QueryVector {
        let cells = self
            .mac_address_list
            .iter()
            .map(|bssid| scan.signal(bssid).map(f64::from))
            .collect();
        QueryVector { cells }
    }

    pub fn rows(&self) -> usize {
        self.cells.nrows()
    }

    pub fn columns(&self) -> usize {
        self.mac_address_list.len()
    }
}
