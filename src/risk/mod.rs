// Risk management module: position sizing and breakeven stops
pub mod breakeven;
pub mod sizing;

pub use breakeven::breakeven_stop;
pub use sizing::{position_size, snap_to_step, stop_distance, SizingError};
