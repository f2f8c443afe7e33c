use rand::{rngs::StdRng, SeedableRng};

use ferrite_grad::{
    ActivationFunction, CostFunction, GradientEngine, HostDevice, Network, Sgd, TrainConfig, TrainingExample,
    TrainingSuite, train_loop,
};

fn main() -> ferrite_grad::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    let mut rng = StdRng::seed_from_u64(7);
    let mut network = Network::new(2, &[4, 1], ActivationFunction::Sigmoid, &mut rng);

    let mut suite = TrainingSuite::new(vec![
        TrainingExample::new(vec![1.0, 0.0], vec![1.0]),
        TrainingExample::new(vec![1.0, 1.0], vec![0.0]),
        TrainingExample::new(vec![0.0, 1.0], vec![1.0]),
        TrainingExample::new(vec![0.0, 0.0], vec![0.0]),
    ]);

    let mut engine = GradientEngine::with_device(Box::new(HostDevice::new()))?;
    let optimizer = Sgd::new(2.0);
    let config = TrainConfig::new(2000, 4, CostFunction::CrossEntropy);

    let summary = train_loop(&mut engine, &mut network, &mut suite, &optimizer, &config, None)?;
    println!("Final cost after {} epochs: {:.6}", summary.epochs_completed(), summary.final_cost().unwrap_or(f32::NAN));

    for example in &suite.examples {
        let output = engine.feed_forward(&network, &example.input)?;
        println!("Input: {:?} -> Output: {:.4}", example.input, output[0]);
    }
    Ok(())
}
