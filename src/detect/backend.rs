use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// Stands in for the external person detector. Backends run on the detection
/// worker thread and receive each dispatched frame by reference; the frame is
/// dropped once `detect` returns.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// An `Err` is treated by the worker as "no detections this cycle".
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook, called once on the worker thread before the
    /// first job.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
