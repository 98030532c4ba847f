//! Progress extraction from the external process's diagnostic output.
//!
//! [`ProgressExtractor`] consumes raw stderr chunks and maintains a
//! [`ProgressSnapshot`]; the controller publishes copies of it.

mod extractor;
mod snapshot;

pub use extractor::{parse_timestamp, ProgressExtractor};
pub use snapshot::ProgressSnapshot;
