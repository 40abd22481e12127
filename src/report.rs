use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;

use crate::config::PredictionConfig;
use crate::error::LocalizationError;
use crate::models::{EvaluationOutcome, LiveScan, RawReading, RoomAccuracy, ScanEntry};
use crate::pipeline::{predict_room, LocalizationRequest};

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub outcomes: Vec<EvaluationOutcome>,
    /// Measurements the pipeline refused, with the reason.
    pub failures: Vec<(i32, LocalizationError)>,
}

/// Leave-one-out run: each measurement is replayed as a live scan against
/// all other measurements.
pub fn evaluate(
    readings: &[RawReading],
    room_names: &HashMap<i32, String>,
    config: &PredictionConfig,
) -> Evaluation {
    let mut scans: BTreeMap<i32, (i32, Vec<ScanEntry>)> = BTreeMap::new();
    for reading in readings {
        scans
            .entry(reading.measurement_id)
            .or_insert_with(|| (reading.room_id, Vec::new()))
            .1
            .push(ScanEntry {
                bssid: reading.bssid.clone(),
                ssid: reading.ssid.clone(),
                signal_strength: reading.signal_strength,
            });
    }

    let room_name = |room_id: i32| {
        room_names
            .get(&room_id)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string())
    };

    let mut evaluation = Evaluation::default();
    for (measurement_id, (room_id, entries)) in scans {
        let scan = LiveScan::from_entries(entries);
        let excluded: HashSet<i32> = [measurement_id].into_iter().collect();
        let request = LocalizationRequest {
            readings,
            scan: &scan,
            config,
            excluded: &excluded,
        };

        match predict_room(&request) {
            Ok(prediction) => evaluation.outcomes.push(EvaluationOutcome {
                measurement_id,
                actual_room: room_name(room_id),
                predicted_room: room_name(prediction.room_id),
                distance: prediction.distance,
            }),
            Err(err) => {
                log::warn!("measurement {measurement_id} could not be evaluated: {err}");
                evaluation.failures.push((measurement_id, err));
            }
        }
    }

    evaluation
}

pub fn accuracy_by_room(outcomes: &[EvaluationOutcome]) -> Vec<RoomAccuracy> {
    let mut map: HashMap<String, (usize, usize)> = HashMap::new();

    for outcome in outcomes {
        let entry = map.entry(outcome.actual_room.clone()).or_insert((0, 0));
        entry.0 += 1;
        if outcome.is_correct() {
            entry.1 += 1;
        }
    }

    let mut rooms: Vec<RoomAccuracy> = map
        .into_iter()
        .map(|(room_name, (total, correct))| RoomAccuracy {
            room_name,
            total,
            correct,
        })
        .collect();

    rooms.sort_by(|a, b| a.room_name.cmp(&b.room_name));
    rooms
}

pub fn build_report(config: &PredictionConfig, evaluation: &Evaluation) -> String {
    let outcomes = &evaluation.outcomes;
    let rooms = accuracy_by_room(outcomes);
    let correct = outcomes.iter().filter(|o| o.is_correct()).count();

    let mut output = String::new();

    let _ = writeln!(output, "# Room Localization Evaluation");
    let _ = writeln!(
        output,
        "Leave-one-out run with `{}` (scaling `{}`, missing values `{}`, routers `{}`)",
        config.algorithm,
        config.value_scaling_strategy,
        config.handle_missing_values_strategy,
        config.router_selection
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    if outcomes.is_empty() {
        let _ = writeln!(output, "No measurements could be evaluated.");
    } else {
        let mean_distance =
            outcomes.iter().map(|o| o.distance).sum::<f64>() / outcomes.len() as f64;
        let _ = writeln!(
            output,
            "- Accuracy: {}/{} ({:.1}%)",
            correct,
            outcomes.len(),
            100.0 * correct as f64 / outcomes.len() as f64
        );
        let _ = writeln!(output, "- Mean distance: {:.4}", mean_distance);
    }
    if !evaluation.failures.is_empty() {
        let _ = writeln!(output, "- Not evaluated: {}", evaluation.failures.len());
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Accuracy by Room");

    if rooms.is_empty() {
        let _ = writeln!(output, "No rooms evaluated.");
    } else {
        for room in rooms.iter() {
            let _ = writeln!(
                output,
                "- {}: {}/{} ({:.1}%)",
                room.room_name,
                room.correct,
                room.total,
                100.0 * room.rate()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Misclassified Measurements");

    let mut misses: Vec<&EvaluationOutcome> = outcomes.iter().filter(|o| !o.is_correct()).collect();
    misses.sort_by(|a, b| a.distance.total_cmp(&b.distance));

    if misses.is_empty() {
        let _ = writeln!(output, "None.");
    } else {
        for outcome in misses {
            let _ = writeln!(
                output,
                "- measurement {}: {} predicted as {} (distance {:.4})",
                outcome.measurement_id,
                outcome.actual_room,
                outcome.predicted_room,
                outcome.distance
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(measurement_id: i32, room_id: i32, bssid: &str, signal_strength: i32) -> RawReading {
        RawReading {
            measurement_id,
            room_id,
            bssid: bssid.to_string(),
            ssid: "eduroam".to_string(),
            signal_strength,
        }
    }

    fn rooms() -> HashMap<i32, String> {
        [(101, "A-101".to_string()), (102, "A-102".to_string())]
            .into_iter()
            .collect()
    }

    fn readings() -> Vec<RawReading> {
        vec![
            reading(1, 101, "AA", -40),
            reading(1, 101, "BB", -60),
            reading(2, 101, "AA", -43),
            reading(2, 101, "BB", -62),
            reading(3, 102, "AA", -80),
            reading(3, 102, "BB", -45),
            reading(4, 102, "AA", -78),
            reading(4, 102, "BB", -47),
        ]
    }

    #[test]
    fn leave_one_out_finds_sibling_samples() {
        let config = PredictionConfig {
            k_value: 1,
            ..PredictionConfig::default()
        };

        let evaluation = evaluate(&readings(), &rooms(), &config);
        assert_eq!(evaluation.outcomes.len(), 4);
        assert!(evaluation.failures.is_empty());
        assert!(evaluation.outcomes.iter().all(|o| o.is_correct()));
    }

    #[test]
    fn single_sample_rooms_are_reported_as_misses() {
        let readings = vec![reading(1, 101, "AA", -40), reading(2, 102, "AA", -80)];
        let evaluation = evaluate(&readings, &rooms(), &PredictionConfig::default());
        assert_eq!(evaluation.outcomes.len(), 2);
        assert!(evaluation.outcomes.iter().all(|o| !o.is_correct()));
    }

    #[test]
    fn report_lists_accuracy_and_misses() {
        let evaluation = Evaluation {
            outcomes: vec![
                EvaluationOutcome {
                    measurement_id: 1,
                    actual_room: "A-101".to_string(),
                    predicted_room: "A-101".to_string(),
                    distance: 1.5,
                },
                EvaluationOutcome {
                    measurement_id: 2,
                    actual_room: "A-102".to_string(),
                    predicted_room: "A-101".to_string(),
                    distance: 4.0,
                },
            ],
            failures: vec![(3, LocalizationError::EmptyTrainingData)],
        };

        let report = build_report(&PredictionConfig::default(), &evaluation);
        assert!(report.contains("- Accuracy: 1/2 (50.0%)"));
        assert!(report.contains("- A-102: 0/1 (0.0%)"));
        assert!(report.contains("measurement 2: A-102 predicted as A-101"));
        assert!(report.contains("- Not evaluated: 1"));
    }
}
