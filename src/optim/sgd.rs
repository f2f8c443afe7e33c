use crate::gradient::GradientVector;
use crate::network::Network;

/// Plain gradient descent on an accumulated minibatch gradient.
pub struct Sgd {
    pub learning_rate: f32,
}

impl Sgd {
    pub fn new(learning_rate: f32) -> Sgd {
        Sgd { learning_rate }
    }

    /// `w -= learning_rate * g / batch_len` for every weight and bias.
    ///
    /// `gradient` is the sum over `batch_len` examples, as returned by the engine.
    pub fn step(&self, network: &mut Network, gradient: &GradientVector, batch_len: usize) {
        let scale = self.learning_rate / batch_len.max(1) as f32;
        for (layer, grads) in network.layers.iter_mut().zip(&gradient.layers) {
            layer.apply_gradients(grads, scale);
        }
    }
}
