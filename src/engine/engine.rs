use tracing::debug;

use crate::activation::ActivationFunction;
use crate::config::EngineConfig;
use crate::cost::CostFunction;
use crate::device::ComputeDevice;
use crate::engine::session::DeviceSession;
use crate::engine::{batched, inference, scalar};
use crate::error::{InvalidInput, Result};
use crate::gradient::GradientVector;
use crate::layers::Layer;
use crate::network::Network;
use crate::train::TrainingExample;

/// Entry point for gradient computation and inference.
///
/// Without a device every call runs the scalar reference path; with one,
/// the same calls run as device dispatches and return the same numbers.
pub struct GradientEngine {
    session: Option<DeviceSession>,
    config: EngineConfig,
}

impl GradientEngine {
    /// Engine without a device.
    pub fn scalar() -> GradientEngine {
        GradientEngine { session: None, config: EngineConfig::default() }
    }

    /// Attaches `device` with the default work-group sizes.
    pub fn with_device(device: Box<dyn ComputeDevice>) -> Result<GradientEngine> {
        GradientEngine::with_device_and_config(device, EngineConfig::default())
    }

    /// Attaches `device`, resolving its kernels up front.
    pub fn with_device_and_config(device: Box<dyn ComputeDevice>, config: EngineConfig) -> Result<GradientEngine> {
        config.validate()?;
        let session = DeviceSession::attach(device)?;
        debug!(device = session.name(), ?config, "attached compute device");
        Ok(GradientEngine { session: Some(session), config })
    }

    pub fn has_device(&self) -> bool {
        self.session.is_some()
    }

    pub fn device_name(&self) -> Option<&str> {
        self.session.as_ref().map(DeviceSession::name)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Activations of one standalone layer for one input vector.
    ///
    /// Shape errors report the layer as index 0.
    pub fn calculate_layer(&mut self, layer: &Layer, prev: &[f32], activation: ActivationFunction) -> Result<Vec<f32>> {
        self.run_layer(layer, 0, prev, activation)
    }

    fn run_layer(&mut self, layer: &Layer, index: usize, prev: &[f32], activation: ActivationFunction) -> Result<Vec<f32>> {
        match self.session.as_mut() {
            Some(session) => inference::calculate_layer_on_device(session, &self.config, layer, index, prev, activation),
            None => inference::calculate_layer_scalar(layer, index, prev, activation),
        }
    }

    /// Network output for `input`, one layer at a time.
    pub fn feed_forward(&mut self, network: &Network, input: &[f32]) -> Result<Vec<f32>> {
        network.validate()?;
        if input.len() != network.input_width() {
            return Err(InvalidInput::InputWidth { example: 0, expected: network.input_width(), actual: input.len() }.into());
        }
        let mut current = input.to_vec();
        for (index, layer) in network.layers.iter().enumerate() {
            current = self.run_layer(layer, index, &current, network.activation)?;
        }
        Ok(current)
    }

    /// Gradient summed over every example in `examples`.
    ///
    /// Uses the network's activation function and `cost` to seed the output
    /// layer. The result is not divided by the batch size.
    pub fn compute_minibatch_gradient(
        &mut self,
        network: &Network,
        examples: &[TrainingExample],
        cost: CostFunction,
    ) -> Result<GradientVector> {
        match self.session.as_mut() {
            Some(session) => batched::compute_gradient(session, &self.config, network, examples, cost),
            None => {
                debug!(samples = examples.len(), layers = network.layers.len(), "computing minibatch gradient on host");
                scalar::compute_gradient(network, examples, cost)
            }
        }
    }

    /// Releases memory the device pools between calls.
    pub fn flush_working_cache(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.flush_working_cache();
        }
    }
}

impl Default for GradientEngine {
    fn default() -> Self {
        GradientEngine::scalar()
    }
}
