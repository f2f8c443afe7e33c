pub mod gradient_vector;

pub use gradient_vector::{GradientVector, NeuronGradient};
