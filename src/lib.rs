pub mod math;
pub mod activation;
pub mod cost;
pub mod layers;
pub mod network;
pub mod gradient;
pub mod device;
pub mod engine;
pub mod optim;
pub mod train;
pub mod config;
pub mod error;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use cost::cost_function::CostFunction;
pub use layers::dense::Layer;
pub use network::network::Network;
pub use gradient::{GradientVector, NeuronGradient};
pub use device::{ComputeDevice, HostDevice};
pub use engine::GradientEngine;
pub use optim::sgd::Sgd;
pub use train::{train_loop, TrainConfig, TrainingExample, TrainingSuite};
pub use config::EngineConfig;
pub use error::{GradientError, InvalidInput, Result};
