mod backend;
mod backends;
mod result;

pub use backend::DetectorBackend;
pub use backends::{Scenario, ScriptedBackend, WalkerBackend};
pub use result::{BoundingBox, RawDetection, PERSON_LABEL};
