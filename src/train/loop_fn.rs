use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{info, warn};

use crate::engine::GradientEngine;
use crate::error::{GradientError, InvalidInput, Result};
use crate::network::Network;
use crate::optim::Sgd;
use crate::train::epoch_stats::{EpochStats, TrainingSummary};
use crate::train::train_config::TrainConfig;
use crate::train::training_suite::TrainingSuite;

/// Trains `network` in place for `config.epochs` epochs of minibatch SGD.
///
/// Every minibatch gradient goes through `engine`, so the same loop runs on
/// the scalar path or on a device. `stop_flag` is only looked at between
/// epochs; a running epoch always completes.
///
/// # Errors
/// Fails on an empty suite, a zero minibatch size, or any error from the
/// engine. Updates already applied to `network` are kept.
pub fn train_loop(
    engine: &mut GradientEngine,
    network: &mut Network,
    suite: &mut TrainingSuite,
    optimizer: &Sgd,
    config: &TrainConfig,
    stop_flag: Option<&AtomicBool>,
) -> Result<TrainingSummary> {
    if suite.is_empty() {
        return Err(InvalidInput::EmptyMinibatch.into());
    }
    if config.minibatch_size == 0 {
        return Err(GradientError::Config("minibatch_size must be at least 1".to_string()));
    }

    let stop_requested = || stop_flag.map_or(false, |flag| flag.load(Ordering::Relaxed));
    let mut summary = TrainingSummary::default();
    let mut rng = rand::thread_rng();

    for epoch in 1..=config.epochs {
        if stop_requested() {
            summary.stopped_early = true;
            break;
        }

        let t_start = Instant::now();
        if config.shuffle {
            suite.shuffle(&mut rng);
        }

        for range in suite.minibatch_ranges(config.minibatch_size) {
            let batch = suite.minibatch(range)?;
            let gradient = engine.compute_minibatch_gradient(network, batch, config.cost)?;
            optimizer.step(network, &gradient, batch.len());
        }

        let mean_cost = mean_cost(engine, network, suite, config)?;
        let elapsed_ms = t_start.elapsed().as_millis() as u64;
        info!(epoch, total_epochs = config.epochs, mean_cost, elapsed_ms, "epoch complete");
        summary.epochs.push(EpochStats { epoch, mean_cost, elapsed_ms });
    }

    if summary.stopped_early {
        warn!(completed = summary.epochs_completed(), requested = config.epochs, "training stopped early");
    }
    Ok(summary)
}

/// Mean cost of the current network over the whole suite.
fn mean_cost(
    engine: &mut GradientEngine,
    network: &Network,
    suite: &TrainingSuite,
    config: &TrainConfig,
) -> Result<f32> {
    let mut total = 0.0_f32;
    for example in &suite.examples {
        let output = engine.feed_forward(network, &example.input)?;
        total += config.cost.cost(&output, &example.desired_output);
    }
    Ok(total / suite.len() as f32)
}
