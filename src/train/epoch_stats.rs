/// What one completed epoch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Mean cost over the whole suite after the epoch's last update.
    pub mean_cost: f32,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of a `train_loop` run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingSummary {
    pub epochs: Vec<EpochStats>,
    /// True when the stop flag ended the run before `epochs` were done.
    pub stopped_early: bool,
}

impl TrainingSummary {
    pub fn epochs_completed(&self) -> usize {
        self.epochs.len()
    }

    pub fn final_cost(&self) -> Option<f32> {
        self.epochs.last().map(|e| e.mean_cost)
    }
}
