//! Audio Buffer implementation

use super::MAX_FRAMES;
use crate::dsp::Dsp;

/// Mono audio buffer with a fixed, pre-allocated capacity
///
/// Allocation happens once at construction (control domain); every method
/// used from the render callback works in place.
pub struct AudioBuffer {
    data: Box<[f32; MAX_FRAMES]>,
    valid_frames: usize,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self {
            data: Box::new([0.0; MAX_FRAMES]),
            valid_frames: 0,
        }
    }

    /// Clear the buffer (fill with zeros)
    pub fn clear(&mut self, frames: usize) {
        let frames = frames.min(MAX_FRAMES);
        Dsp::clear(&mut self.data[..frames]);
        self.valid_frames = frames;
    }

    /// Get the number of valid frames
    pub fn valid_frames(&self) -> usize {
        self.valid_frames
    }

    /// Set the number of valid frames
    pub fn set_valid_frames(&mut self, frames: usize) {
        self.valid_frames = frames.min(MAX_FRAMES);
    }

    /// Get samples as a slice
    pub fn samples(&self) -> &[f32] {
        &self.data[..self.valid_frames]
    }

    /// Get samples as a mutable slice
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.data[..self.valid_frames]
    }

    /// Mix from another buffer with gain: self += source * gain
    pub fn mix_from(&mut self, source: &AudioBuffer, gain: f32) {
        let frames = self.valid_frames.min(source.valid_frames);
        if frames > 0 && gain.abs() > 0.0001 {
            Dsp::mix_add(&source.data[..frames], gain, &mut self.data[..frames]);
        }
    }

    /// Copy from another buffer
    pub fn copy_from(&mut self, source: &AudioBuffer) {
        let frames = self.valid_frames.min(source.valid_frames);
        self.data[..frames].copy_from_slice(&source.data[..frames]);
    }

    /// Apply gain in-place
    pub fn apply_gain(&mut self, gain: f32) {
        Dsp::apply_gain(&mut self.data[..self.valid_frames], gain);
    }

    /// Write raw samples directly into the buffer
    pub fn write_samples(&mut self, samples: &[f32]) {
        let frames = samples.len().min(MAX_FRAMES);
        self.data[..frames].copy_from_slice(&samples[..frames]);
        self.valid_frames = frames;
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new()
    }
}
