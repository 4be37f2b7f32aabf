// Position rollover workflow
pub mod executor;
pub mod sizing;

pub use executor::{ExecutionError, Executor, RolloverReport, Step};
pub use sizing::{position_size, SizingParams, SAFETY_HAIRCUT};
