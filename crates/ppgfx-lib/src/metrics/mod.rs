pub mod shape;
pub mod stats;
pub mod vpg;

pub use shape::{pulse_shape, PulseShape};
pub use stats::{column_stats, summarize};
pub use vpg::{vpg_phase, VpgPhase};
