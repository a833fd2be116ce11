pub mod scripted;
pub mod walker;

pub use scripted::ScriptedBackend;
pub use walker::{Scenario, WalkerBackend};
