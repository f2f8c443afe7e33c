// Shared fixtures for the integration tests.
#![allow(dead_code)]

use approx::assert_relative_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};

use ferrite_grad::{
    ActivationFunction, GradientEngine, GradientVector, HostDevice, Layer, Network, TrainingExample,
};

pub fn random_network(seed: u64, input: usize, sizes: &[usize], activation: ActivationFunction) -> Network {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut network = Network::new(input, sizes, activation, &mut rng);
    // Non-zero biases so the bias path is exercised too.
    for layer in &mut network.layers {
        for b in &mut layer.biases {
            *b = rng.gen::<f32>() - 0.5;
        }
    }
    network
}

pub fn random_examples(seed: u64, count: usize, input: usize, output: usize) -> Vec<TrainingExample> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            TrainingExample::new(
                (0..input).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect(),
                (0..output).map(|_| rng.gen::<f32>()).collect(),
            )
        })
        .collect()
}

pub fn layer(weights: Vec<Vec<f32>>, biases: Vec<f32>) -> Layer {
    Layer::from_parts(weights, biases).unwrap()
}

pub fn device_engine() -> GradientEngine {
    GradientEngine::with_device(Box::new(HostDevice::new())).unwrap()
}

pub fn assert_gradients_close(a: &GradientVector, b: &GradientVector) {
    assert_eq!(a.layers.len(), b.layers.len());
    let (fa, fb) = (a.to_flat(), b.to_flat());
    assert_eq!(fa.len(), fb.len());
    for (x, y) in fa.iter().zip(&fb) {
        assert_relative_eq!(*x, *y, epsilon = 1e-6, max_relative = 1e-4);
    }
}
