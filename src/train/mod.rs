pub mod epoch_stats;
pub mod loop_fn;
pub mod train_config;
pub mod training_suite;

pub use epoch_stats::{EpochStats, TrainingSummary};
pub use loop_fn::train_loop;
pub use train_config::TrainConfig;
pub use training_suite::{TrainingExample, TrainingSuite};
