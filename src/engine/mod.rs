pub mod batched;
pub mod engine;
pub mod inference;
pub mod layout;
pub mod scalar;
pub mod session;

pub use engine::GradientEngine;
pub use scalar::{forward_pass, ForwardTrace};
