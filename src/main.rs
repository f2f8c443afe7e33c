use std::process::ExitCode;

use rand::{rngs::StdRng, SeedableRng};
use tracing::{error, info};

use ferrite_grad::{
    ActivationFunction, CostFunction, GradientEngine, HostDevice, Network, TrainingExample, TrainingSuite,
};

// Computes one XOR minibatch gradient on both paths and reports how far apart
// they are. Run the full training demo with:
//   cargo run --example xor
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut rng = StdRng::seed_from_u64(42);
    let network = Network::new(2, &[3, 1], ActivationFunction::Sigmoid, &mut rng);
    let suite = TrainingSuite::new(vec![
        TrainingExample::new(vec![0.0, 0.0], vec![0.0]),
        TrainingExample::new(vec![0.0, 1.0], vec![1.0]),
        TrainingExample::new(vec![1.0, 0.0], vec![1.0]),
        TrainingExample::new(vec![1.0, 1.0], vec![0.0]),
    ]);

    let mut scalar = GradientEngine::scalar();
    let mut device = match GradientEngine::with_device(Box::new(HostDevice::new())) {
        Ok(engine) => engine,
        Err(err) => {
            error!(%err, "could not attach device");
            return ExitCode::FAILURE;
        }
    };

    let scalar_grad = scalar.compute_minibatch_gradient(&network, &suite.examples, CostFunction::MeanSquared);
    let device_grad = device.compute_minibatch_gradient(&network, &suite.examples, CostFunction::MeanSquared);
    match (scalar_grad, device_grad) {
        (Ok(a), Ok(b)) => {
            let max_diff = a.to_flat().iter().zip(b.to_flat())
                .fold(0.0_f32, |m, (x, y)| m.max((x - y).abs()));
            info!(parameters = a.parameter_count(), max_abs = a.max_abs(), max_diff, "scalar and device gradients computed");
            ExitCode::SUCCESS
        }
        (Err(err), _) | (_, Err(err)) => {
            error!(%err, "gradient computation failed");
            ExitCode::FAILURE
        }
    }
}
