pub mod matrix;
pub mod work_size;

pub use matrix::Matrix;
pub use work_size::round_up;
