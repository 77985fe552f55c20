//! Adapters for the external recognition pipeline.

pub mod spool;
pub mod traits;

pub use spool::{SpoolSource, parse_detection_lines};
#[cfg(test)]
pub use traits::MockRecognitionSource;
pub use traits::{Frame, RecognitionSource, SourceError};
