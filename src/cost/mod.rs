pub mod cost_function;

pub use cost_function::CostFunction;
