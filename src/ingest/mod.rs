//! Frame ingestion sources.
//!
//! The camera grab is an external collaborator. This module only provides a
//! synthetic source so the daemon and tests can drive the pipeline end to end.
//!
//! Sources are responsible for:
//! - Producing `Frame` instances stamped with the engine clock
//! - Assigning monotonic sequence numbers
//!
//! Sources MUST NOT retain frames after handing them to the pipeline.

pub mod synthetic;

pub use synthetic::{SourceStats, SyntheticSource};
