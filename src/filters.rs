use std::collections::HashMap;

use crate::models::{FingerprintRecord, LiveScan};

/// Which routers take part according to their network name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterSelection {
    All,
    Network(String),
}

impl RouterSelection {
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "" | "all" => Self::All,
            network => Self::Network(network.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouterFilterChain {
    pub remove_unreceived: bool,
    pub selection: RouterSelection,
    pub presence_threshold: f64,
}

impl RouterFilterChain {
    /// Runs the enabled stages: unseen routers, network name, then rarity.
    pub fn apply(
        &self,
        records: Vec<FingerprintRecord>,
        scan: &LiveScan,
        ssids: &HashMap<String, String>,
    ) -> Vec<FingerprintRecord> {
        let mut records = records;

        if self.remove_unreceived {
            records = remove_unreceived_bssids(records, scan);
        }

        if let RouterSelection::Network(network) = &self.selection {
            records = keep_network(records, ssids, network);
        }

        if self.presence_threshold > 0.0 {
            records = remove_rare_routers(records, self.presence_threshold);
        }

        records
    }
}

pub fn remove_unreceived_bssids(
    mut records: Vec<FingerprintRecord>,
    scan: &LiveScan,
) -> Vec<FingerprintRecord> {
    for record in records.iter_mut() {
        record.signals.retain(|bssid, _| scan.contains(bssid));
    }
    log::debug!("kept routers heard in the live scan ({} scan entries)", scan.len());
    records
}

pub fn keep_network(
    mut records: Vec<FingerprintRecord>,
    ssids: &HashMap<String, String>,
    network: &str,
) -> Vec<FingerprintRecord> {
    for record in records.iter_mut() {
        record
            .signals
            .retain(|bssid, _| ssids.get(bssid).is_some_and(|ssid| ssid == network));
    }
    log::debug!("kept routers of network {network}");
    records
}

/// Share of records in which each router was heard.
pub fn presence_fractions(records: &[FingerprintRecord]) -> HashMap<String, f64> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        for bssid in record.signals.keys() {
            *counts.entry(bssid.clone()).or_insert(0) += 1;
        }
    }

    let total = records.len().max(1) as f64;
    counts
        .into_iter()
        .map(|(bssid, count)| (bssid, count as f64 / total))
        .collect()
}

pub fn remove_rare_routers(
    mut records: Vec<FingerprintRecord>,
    threshold: f64,
) -> Vec<FingerprintRecord> {
    let fractions = presence_fractions(&records);
    let rare = fractions
        .values()
        .filter(|fraction| **fraction < threshold)
        .count();

    for record in records.iter_mut() {
        record
            .signals
            .retain(|bssid, _| fractions.get(bssid).is_some_and(|fraction| *fraction >= threshold));
    }
    log::debug!("dropped {rare} routers present in less than {threshold} of the samples");
    records
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::models::ScanEntry;

    fn record(measurement_id: i32, room_id: i32, signals: &[(&str, i32)]) -> FingerprintRecord {
        FingerprintRecord {
            measurement_id,
            room_id,
            signals: signals
                .iter()
                .map(|(bssid, signal)| (bssid.to_string(), *signal))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn scan(bssids: &[&str]) -> LiveScan {
        LiveScan::from_entries(bssids.iter().map(|bssid| ScanEntry {
            bssid: bssid.to_string(),
            ssid: String::new(),
            signal_strength: -50,
        }))
    }

    #[test]
    fn selection_parses_names() {
        assert_eq!(RouterSelection::from_name("all"), RouterSelection::All);
        assert_eq!(
            RouterSelection::from_name("eduroam"),
            RouterSelection::Network("eduroam".to_string())
        );
    }

    #[test]
    fn unseen_filter_keeps_live_routers() {
        let records = vec![record(1, 101, &[("AA", -40), ("BB", -60)])];
        let live = scan(&["AA"]);

        let filtered = remove_unreceived_bssids(records, &live);
        assert_eq!(filtered[0].signals.len(), 1);
        assert!(filtered[0].signals.contains_key("AA"));
        assert!(live.contains("AA"));
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn network_filter_uses_ssid_directory() {
        let records = vec![record(1, 101, &[("AA", -40), ("BB", -60), ("CC", -70)])];
        let ssids: HashMap<String, String> = [
            ("AA".to_string(), "eduroam".to_string()),
            ("BB".to_string(), "guest".to_string()),
        ]
        .into_iter()
        .collect();

        let filtered = keep_network(records, &ssids, "eduroam");
        assert_eq!(filtered[0].signals.keys().collect::<Vec<_>>(), vec!["AA"]);
    }

    #[test]
    fn rarity_filter_drops_below_threshold() {
        let records = vec![
            record(1, 101, &[("AA", -40), ("BB", -60)]),
            record(2, 102, &[("AA", -80)]),
        ];

        let filtered = remove_rare_routers(records, 1.0);
        assert!(filtered.iter().all(|r| !r.signals.contains_key("BB")));
        assert!(filtered.iter().all(|r| r.signals.contains_key("AA")));
    }

    #[test]
    fn rarity_threshold_is_inclusive() {
        let records = vec![
            record(1, 101, &[("AA", -40), ("BB", -60)]),
            record(2, 102, &[("AA", -80)]),
        ];

        let filtered = remove_rare_routers(records, 0.5);
        assert!(filtered[0].signals.contains_key("BB"));
    }

    #[test]
    fn chain_with_everything_disabled_is_a_no_op() {
        let records = vec![record(1, 101, &[("AA", -40), ("BB", -60)])];
        let chain = RouterFilterChain {
            remove_unreceived: false,
            selection: RouterSelection::All,
            presence_threshold: 0.0,
        };

        let filtered = chain.apply(records.clone(), &LiveScan::default(), &HashMap::new());
        assert_eq!(filtered, records);
    }
}
