//! Captured frame container.
//!
//! A `Frame` is moved into the detection worker by value. The render thread
//! keeps no reference to it, so a dropped frame is simply freed.

use crate::Millis;

/// One captured camera frame (RGB24, row-major).
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Capture time on the engine clock. Tracking uses this, not the time
    /// the worker gets around to the job.
    pub captured_at_ms: Millis,
    /// Monotonic capture counter assigned by the source.
    pub sequence: u64,
}

impl Frame {
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        captured_at_ms: Millis,
        sequence: u64,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            captured_at_ms,
            sequence,
        }
    }

    /// Read-only pixel access for detector backends.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Byte length of the pixel buffer.
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at_ms", &self.captured_at_ms)
            .field("sequence", &self.sequence)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_exposes_metadata_and_pixels() {
        let frame = Frame::new(vec![1, 2, 3], 1, 1, 40, 7);
        assert_eq!(frame.pixels(), &[1, 2, 3]);
        assert_eq!(frame.byte_len(), 3);
        assert_eq!(frame.captured_at_ms, 40);
        assert_eq!(frame.sequence, 7);
    }

    #[test]
    fn debug_output_omits_pixel_data() {
        let frame = Frame::new(vec![9; 12], 2, 2, 0, 1);
        let dbg = format!("{:?}", frame);
        assert!(dbg.contains("bytes: 12"));
        assert!(!dbg.contains("[9"));
    }
}
