use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One stored reading: a router heard during a measurement in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub measurement_id: i32,
    pub room_id: i32,
    pub bssid: String,
    pub ssid: String,
    pub signal_strength: i32,
}

/// One router as reported by a device scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub bssid: String,
    #[serde(default)]
    pub ssid: String,
    pub signal_strength: i32,
}

/// The scan of the device being located, keyed by bssid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveScan {
    entries: BTreeMap<String, ScanEntry>,
}

impl LiveScan {
    /// Builds a scan keeping the strongest reading when a bssid repeats.
    pub fn from_entries(entries: impl IntoIterator<Item = ScanEntry>) -> Self {
        let mut map: BTreeMap<String, ScanEntry> = BTreeMap::new();
        for entry in entries {
            let stronger = map
                .get(&entry.bssid)
                .map_or(true, |existing| existing.signal_strength < entry.signal_strength);
            if stronger {
                map.insert(entry.bssid.clone(), entry);
            }
        }
        Self { entries: map }
    }

    pub fn signal(&self, bssid: &str) -> Option<i32> {
        self.entries.get(bssid).map(|entry| entry.signal_strength)
    }

    pub fn contains(&self, bssid: &str) -> bool {
        self.entries.contains_key(bssid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All readings of one measurement. Routers missing from `signals` were not heard.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintRecord {
    pub measurement_id: i32,
    pub room_id: i32,
    pub signals: BTreeMap<String, i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub room_id: i32,
    pub distance: f64,
    pub optional_value: Option<f64>,
}

/// Output value used when a classifier has no auxiliary score.
pub const NOT_APPLICABLE: f64 = -1.0;

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub room_name: String,
    pub room_id: i32,
    pub distance: f64,
    pub optional_value: f64,
}

impl PredictionResponse {
    pub fn new(prediction: &Prediction, room_name: Option<String>) -> Self {
        Self {
            room_name: room_name.unwrap_or_else(|| "Unknown".to_string()),
            room_id: prediction.room_id,
            distance: prediction.distance,
            optional_value: prediction.optional_value.unwrap_or(NOT_APPLICABLE),
        }
    }
}

/// A measurement submitted for storage.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMeasurement {
    pub room_name: String,
    pub device_id: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub routers: Vec<ScanEntry>,
}

#[derive(Debug, Clone)]
pub struct MeasurementSummary {
    pub measurement_id: i32,
    pub timestamp: NaiveDateTime,
    pub device_id: String,
    pub room_id: i32,
    pub room_name: String,
    pub routers: Vec<ScanEntry>,
}

#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub measurement_id: i32,
    pub actual_room: String,
    pub predicted_room: String,
    pub distance: f64,
}

impl EvaluationOutcome {
    pub fn is_correct(&self) -> bool {
        self.actual_room == self.predicted_room
    }
}

#[derive(Debug, Clone)]
pub struct RoomAccuracy {
    pub room_name: String,
    pub total: usize,
    pub correct: usize,
}

impl RoomAccuracy {
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(bssid: &str, signal_strength: i32) -> ScanEntry {
        ScanEntry {
            bssid: bssid.to_string(),
            ssid: "eduroam".to_string(),
            signal_strength,
        }
    }

    #[test]
    fn live_scan_keeps_strongest_duplicate() {
        let scan = LiveScan::from_entries(vec![entry("AA", -70), entry("AA", -50), entry("BB", -60)]);
        assert_eq!(scan.len(), 2);
        assert_eq!(scan.signal("AA"), Some(-50));
        assert_eq!(scan.signal("CC"), None);
    }

    #[test]
    fn response_uses_sentinels() {
        let prediction = Prediction {
            room_id: 7,
            distance: 0.25,
            optional_value: None,
        };
        let response = PredictionResponse::new(&prediction, None);
        assert_eq!(response.room_name, "Unknown");
        assert_eq!(response.optional_value, NOT_APPLICABLE);
    }
}
