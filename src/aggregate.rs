use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{FingerprintRecord, RawReading};

/// Groups readings into one record per measurement, ordered by measurement id.
pub fn aggregate_fingerprints(
    readings: &[RawReading],
    excluded: &HashSet<i32>,
) -> Vec<FingerprintRecord> {
    let mut records: BTreeMap<i32, FingerprintRecord> = BTreeMap::new();

    for reading in readings {
        if excluded.contains(&reading.measurement_id) {
            continue;
        }

        let record = records
            .entry(reading.measurement_id)
            .or_insert_with(|| FingerprintRecord {
                measurement_id: reading.measurement_id,
                room_id: reading.room_id,
                signals: BTreeMap::new(),
            });
        record
            .signals
            .insert(reading.bssid.clone(), reading.signal_strength);
    }

    records.into_values().collect()
}

/// Network name of every router seen in the readings.
pub fn ssid_directory(readings: &[RawReading]) -> HashMap<String, String> {
    readings
        .iter()
        .map(|reading| (reading.bssid.clone(), reading.ssid.clone()))
        .collect()
}
