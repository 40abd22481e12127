use clap::{ArgAction, Args};
use serde::Deserialize;

use crate::conditioning::{ScalingStrategy, SignalConditioner};
use crate::filters::{RouterFilterChain, RouterSelection};
use crate::impute::MissingValueStrategy;

/// Per-request options of the prediction pipeline.
#[derive(Debug, Clone, Args, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Only use routers the device hears right now
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub use_remove_unreceived_bssids: bool,

    /// `use_received` or any other name for a fixed weak-signal fill
    #[arg(long, default_value = "use_received")]
    pub handle_missing_values_strategy: String,

    /// `all` or the network name (ssid) to keep, e.g. `eduroam`
    #[arg(long, default_value = "all")]
    pub router_selection: String,

    /// Minimum share of samples a router must appear in
    #[arg(long, default_value_t = 0.0)]
    pub router_presence_threshold: f64,

    /// `none`, `positive`, `exponential` or `powed`
    #[arg(long, default_value = "none")]
    pub value_scaling_strategy: String,

    #[arg(long, default_value_t = -100, allow_hyphen_values = true)]
    pub router_rssi_threshold: i32,

    /// `knn_sorensen`, `knn_euclidean`, `random_forest`, `svm_linear` or `svm_rbf`
    #[arg(long, default_value = "knn_euclidean")]
    pub algorithm: String,

    #[arg(long, default_value_t = 5)]
    pub k_value: usize,

    /// `uniform` or `distance`
    #[arg(long, default_value = "uniform")]
    pub weights: String,

    #[arg(long, default_value_t = 300)]
    pub n_estimators: usize,

    #[arg(long)]
    pub max_depth: Option<usize>,

    #[arg(long, default_value_t = 1.0)]
    pub c_value: f64,

    #[arg(long, default_value_t = 1.0)]
    pub gamma_value: f64,

    /// Seed for the bootstrap sampling of the random forest
    #[arg(long, default_value_t = 42)]
    pub random_seed: u64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            use_remove_unreceived_bssids: true,
            handle_missing_values_strategy: "use_received".to_string(),
            router_selection: "all".to_string(),
            router_presence_threshold: 0.0,
            value_scaling_strategy: "none".to_string(),
            router_rssi_threshold: -100,
            algorithm: "knn_euclidean".to_string(),
            k_value: 5,
            weights: "uniform".to_string(),
            n_estimators: 300,
            max_depth: None,
            c_value: 1.0,
            gamma_value: 1.0,
            random_seed: 42,
        }
    }
}

impl PredictionConfig {
    pub fn filter_chain(&self) -> RouterFilterChain {
        RouterFilterChain {
            remove_unreceived: self.use_remove_unreceived_bssids,
            selection: RouterSelection::from_name(&self.router_selection),
            presence_threshold: self.router_presence_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn missing_value_strategy(&self) -> MissingValueStrategy {
        MissingValueStrategy::from_name(&self.handle_missing_values_strategy)
    }

    pub fn conditioner(&self) -> SignalConditioner {
        SignalConditioner {
            rssi_threshold: f64::from(self.router_rssi_threshold),
            scaling: ScalingStrategy::from_name(&self.value_scaling_strategy),
        }
    }
}
