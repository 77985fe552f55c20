//! The Vigil engine: deduplication, history buffers, the detection cycle and
//! the sandbox for runtime functions.

pub mod control;
pub mod cycle;
pub mod dedup;
pub mod history;
pub mod last_seen;
pub mod rhai;

pub use control::{ControlHandle, ControlRequest, Mutation, MutationError, StatusSnapshot};
pub use cycle::{CycleChannels, CycleOptions, DetectionCycle};
pub use dedup::{Counters, DedupEngine, DetectionOutcome};
pub use history::HistoryBuffer;
pub use last_seen::LastSeen;
