//! Synthetic frame source.
//!
//! Generates a moving gradient at the configured size. Pixel content is
//! irrelevant to the synthetic detector backends; it only has to be a
//! correctly sized RGB24 buffer.

use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::Millis;

/// Statistics for a frame source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub width: u32,
    pub height: u32,
}

pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "synthetic source size must be non-zero (got {}x{})",
                width,
                height
            ));
        }
        Ok(Self {
            width,
            height,
            frame_count: 0,
        })
    }

    /// Capture the next frame, stamped with `now`.
    pub fn next_frame(&mut self, now: Millis) -> Result<Frame> {
        self.frame_count += 1;
        let pixels = self.generate_pixels()?;
        Ok(Frame::new(
            pixels,
            self.width,
            self.height,
            now,
            self.frame_count,
        ))
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            width: self.width,
            height: self.height,
        }
    }

    fn generate_pixels(&self) -> Result<Vec<u8>> {
        let len = self
            .width
            .checked_mul(self.height)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("synthetic frame dimensions overflow"))? as usize;
        let mut pixels = vec![0u8; len];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        Ok(pixels)
    }
}
