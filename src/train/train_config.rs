use serde::{Deserialize, Serialize};

use crate::cost::CostFunction;

/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `epochs`         — total number of full passes over the training suite
/// - `minibatch_size` — examples per gradient computation; use `1` for online SGD
/// - `cost`           — error strategy seeding backpropagation
/// - `shuffle`        — reorder the suite before every epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub minibatch_size: usize,
    pub cost: CostFunction,
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
}

fn default_shuffle() -> bool {
    true
}

impl TrainConfig {
    pub fn new(epochs: usize, minibatch_size: usize, cost: CostFunction) -> Self {
        TrainConfig { epochs, minibatch_size, cost, shuffle: true }
    }
}
