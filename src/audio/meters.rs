//! Metering types
//!
//! The render side only copies samples into a [`MeterTap`]; level math runs
//! on the channel's meter worker through [`MeterSample::measure`].

use crate::capture::TapSender;
use crate::dsp::{Dsp, METER_FLOOR_DB};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Level of one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterSample {
    /// RMS level in dB, floored at -80
    pub level_db: f32,
    /// Linear peak
    pub peak: f32,
}

impl MeterSample {
    pub fn measure(samples: &[f32]) -> Self {
        Self {
            level_db: Dsp::to_meter_db(Dsp::rms(samples)),
            peak: Dsp::peak(samples),
        }
    }

    pub fn silent() -> Self {
        Self {
            level_db: METER_FLOOR_DB,
            peak: 0.0,
        }
    }
}

/// Regroups tapped samples into fixed-size metering blocks
///
/// Lives on the worker side, so render callbacks of any size produce one
/// measurement per `block_size` samples.
pub struct BlockAccumulator {
    pending: Vec<f32>,
    block_size: usize,
}

impl BlockAccumulator {
    pub fn new(block_size: usize) -> Self {
        let block_size = block_size.max(1);
        Self {
            pending: Vec::with_capacity(block_size),
            block_size,
        }
    }

    /// Feed samples; `on_block` runs once for every completed block
    pub fn push(&mut self, mut samples: &[f32], mut on_block: impl FnMut(&[f32])) {
        while !samples.is_empty() {
            if self.pending.is_empty() && samples.len() >= self.block_size {
                let (block, rest) = samples.split_at(self.block_size);
                on_block(block);
                samples = rest;
                continue;
            }
            let take = (self.block_size - self.pending.len()).min(samples.len());
            self.pending.extend_from_slice(&samples[..take]);
            samples = &samples[take..];
            if self.pending.len() == self.block_size {
                on_block(&self.pending);
                self.pending.clear();
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Non-destructive read point on a node's output
pub struct MeterTap {
    sender: TapSender,
    /// When set, samples are only forwarded while the flag is true
    gate: Option<Arc<AtomicBool>>,
}

impl MeterTap {
    pub fn new(sender: TapSender) -> Self {
        Self { sender, gate: None }
    }

    pub fn gated(sender: TapSender, gate: Arc<AtomicBool>) -> Self {
        Self {
            sender,
            gate: Some(gate),
        }
    }

    /// Render-domain entry
    #[inline]
    pub fn observe(&self, samples: &[f32]) {
        if let Some(gate) = &self.gate {
            if !gate.load(Ordering::Acquire) {
                return;
            }
        }
        if !samples.is_empty() {
            self.sender.offer(samples);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tap_queue;

    #[test]
    fn test_measure_full_scale_and_silence() {
        let loud = MeterSample::measure(&[1.0, -1.0, 1.0, -1.0]);
        assert!(loud.level_db.abs() < 1e-4);
        assert_eq!(loud.peak, 1.0);

        assert_eq!(MeterSample::measure(&[0.0; 64]), MeterSample::silent());
    }

    #[test]
    fn test_small_callbacks_fill_whole_blocks() {
        let mut acc = BlockAccumulator::new(1024);
        let mut blocks = Vec::new();
        for _ in 0..9 {
            acc.push(&[0.25; 256], |block| blocks.push(block.len()));
        }
        assert_eq!(blocks, vec![1024, 1024]);
        assert_eq!(acc.pending(), 256);

        acc.push(&[0.25; 3000], |block| blocks.push(block.len()));
        assert_eq!(blocks, vec![1024; 5]);
        assert_eq!(acc.pending(), 184);
    }

    #[test]
    fn test_gate_blocks_samples() {
        let (tx, rx) = tap_queue(4, 16);
        let gate = Arc::new(AtomicBool::new(false));
        let tap = MeterTap::gated(tx, gate.clone());

        tap.observe(&[0.5; 16]);
        assert!(rx.receiver().try_recv().is_err());

        gate.store(true, Ordering::Release);
        tap.observe(&[0.5; 16]);
        assert_eq!(rx.receiver().try_recv().unwrap().len(), 16);
    }
}
