use thiserror::Error;

use crate::device::DeviceError;

/// Result type alias for gradient computations.
pub type Result<T> = std::result::Result<T, GradientError>;

/// Errors surfaced by the gradient engine and its collaborators.
///
/// Shape problems are reported as `InvalidInput` and are always detected
/// before any buffer is allocated or any arithmetic is done. Anything that
/// goes wrong on the compute device aborts the whole minibatch.
#[derive(Error, Debug)]
pub enum GradientError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    #[error("device execution failed: {0}")]
    DeviceExecution(#[from] DeviceError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl GradientError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, GradientError::InvalidInput(_))
    }

    pub fn is_device_failure(&self) -> bool {
        matches!(self, GradientError::DeviceExecution(_))
    }
}

impl From<serde_json::Error> for GradientError {
    fn from(err: serde_json::Error) -> Self {
        GradientError::Config(err.to_string())
    }
}

impl From<std::io::Error> for GradientError {
    fn from(err: std::io::Error) -> Self {
        GradientError::Config(err.to_string())
    }
}

/// Dimension mismatches between a network, its layers and the examples fed to it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidInput {
    #[error("network has no layers")]
    EmptyNetwork,

    #[error("layer {layer} expects {expected} inputs but its weight matrix has {actual} columns")]
    LayerShape { layer: usize, expected: usize, actual: usize },

    #[error("layer {layer} has {neurons} neurons but {biases} biases")]
    BiasLength { layer: usize, neurons: usize, biases: usize },

    #[error("example {example} has {actual} inputs, network expects {expected}")]
    InputWidth { example: usize, expected: usize, actual: usize },

    #[error("example {example} has {actual} desired outputs, network produces {expected}")]
    OutputWidth { example: usize, expected: usize, actual: usize },

    #[error("layer expects {expected} input activations, got {actual}")]
    ActivationLength { expected: usize, actual: usize },

    #[error("minibatch contains no examples")]
    EmptyMinibatch,

    #[error("range {begin}..{end} is out of bounds for {len} examples")]
    RangeOutOfBounds { begin: usize, end: usize, len: usize },

    #[error("matrix rows have differing lengths")]
    RaggedMatrix,

    #[error("layer {layer} declares {rows}x{cols} weights but stores {stored}")]
    WeightStorage { layer: usize, rows: usize, cols: usize, stored: usize },

    #[error("{what} of {value} does not fit a 32-bit device word")]
    DeviceWordOverflow { what: &'static str, value: usize },
}
