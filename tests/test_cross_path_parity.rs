// The scalar path and the device path must agree on every shape, activation and cost.

mod common;

use approx::assert_relative_eq;
use common::{assert_gradients_close, random_examples, random_network};
use ferrite_grad::{ActivationFunction, CostFunction, GradientEngine, HostDevice};

const ACTIVATIONS: [ActivationFunction; 5] = [
    ActivationFunction::Sigmoid,
    ActivationFunction::Softsign,
    ActivationFunction::Tanh,
    ActivationFunction::ReLU,
    ActivationFunction::Identity,
];

fn check_parity(seed: u64, input: usize, sizes: &[usize], samples: usize) {
    let output = *sizes.last().unwrap();
    let examples = random_examples(seed + 1000, samples, input, output);

    for (i, activation) in ACTIVATIONS.into_iter().enumerate() {
        for cost in [CostFunction::MeanSquared, CostFunction::CrossEntropy] {
            let network = random_network(seed + i as u64, input, sizes, activation);

            let device = HostDevice::new();
            let stats = device.stats();
            let mut on_device = GradientEngine::with_device(Box::new(device)).unwrap();
            let mut on_host = GradientEngine::scalar();

            let expected = on_host.compute_minibatch_gradient(&network, &examples, cost).unwrap();
            let actual = on_device.compute_minibatch_gradient(&network, &examples, cost).unwrap();
            assert_gradients_close(&expected, &actual);

            assert_eq!(stats.dispatches(), 2 * sizes.len(), "one forward and one backward dispatch per layer");
            assert_eq!(stats.live_allocations(), 0);
        }
    }
}

#[test]
fn parity_one_sample_two_layers() {
    check_parity(1, 3, &[4, 2], 1);
}

#[test]
fn parity_batch_not_a_multiple_of_tile() {
    check_parity(2, 5, &[7, 3], 9);
}

#[test]
fn parity_deep_network() {
    check_parity(3, 4, &[6, 9, 5, 2], 17);
}

#[test]
fn parity_single_layer_network() {
    check_parity(4, 6, &[3], 5);
}

#[test]
fn parity_wide_hidden_layer() {
    check_parity(5, 2, &[33, 1], 8);
}

#[test]
fn feed_forward_matches_on_both_paths() {
    let network = random_network(11, 4, &[40, 6, 3], ActivationFunction::Tanh);
    let examples = random_examples(12, 6, 4, 3);
    let mut on_host = GradientEngine::scalar();
    let mut on_device = GradientEngine::with_device(Box::new(HostDevice::new())).unwrap();

    for example in &examples {
        let a = on_host.feed_forward(&network, &example.input).unwrap();
        let b = on_device.feed_forward(&network, &example.input).unwrap();
        assert_eq!(a.len(), 3);
        for (x, y) in a.iter().zip(&b) {
            assert_relative_eq!(*x, *y, epsilon = 1e-6);
        }
    }
}

#[test]
fn repeated_calls_reuse_pooled_memory() {
    let network = random_network(21, 3, &[5, 2], ActivationFunction::Sigmoid);
    let examples = random_examples(22, 4, 3, 2);
    let device = HostDevice::new();
    let stats = device.stats();
    let mut engine = GradientEngine::with_device(Box::new(device)).unwrap();

    let first = engine.compute_minibatch_gradient(&network, &examples, CostFunction::MeanSquared).unwrap();
    assert!(stats.pooled_allocations() > 0);
    let second = engine.compute_minibatch_gradient(&network, &examples, CostFunction::MeanSquared).unwrap();
    assert_eq!(first, second);

    engine.flush_working_cache();
    assert_eq!(stats.pooled_allocations(), 0);
    assert_eq!(stats.live_allocations(), 0);
}

#[test]
fn alternating_batch_sizes_do_not_grow_the_pool() {
    let network = random_network(31, 64, &[128, 10], ActivationFunction::Sigmoid);
    let large = random_examples(32, 32, 64, 10);
    let small = random_examples(33, 7, 64, 10);
    let device = HostDevice::new();
    let stats = device.stats();
    let mut engine = GradientEngine::with_device(Box::new(device)).unwrap();

    let mut pooled = Vec::new();
    for round in 0..6 {
        let batch = if round % 2 == 0 { &large } else { &small };
        engine.compute_minibatch_gradient(&network, batch, CostFunction::MeanSquared).unwrap();
        pooled.push(stats.pooled_allocations());
    }
    // Seven buffers per minibatch; every later call is served from the pool.
    assert_eq!(pooled, vec![7; 6]);
}
