//! Toolkit-independent display state: the per-cycle frame and the
//! addressable elements.

pub mod elements;
pub mod frame;
pub mod sink;

pub use elements::{ElementError, ElementKind, ElementRegistry};
pub use frame::{DisplayFrame, FrameInputs};
pub use sink::{DisplaySink, WatchDisplaySink};
