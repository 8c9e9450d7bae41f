//! Pooled block queue between the render/capture domain and a worker
//!
//! Blocks are allocated once up front. The producer side takes an empty
//! block from the pool, fills it and sends it; the consumer hands it back
//! after use. Both directions use `try_*` on bounded channels, so the
//! producer never allocates or blocks.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One mono block of samples
pub struct TapBlock {
    samples: Vec<f32>,
}

impl TapBlock {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Producer half. Cheap to share behind an `Arc`.
pub struct TapSender {
    tx: Sender<TapBlock>,
    pool: Receiver<TapBlock>,
    recycle: Sender<TapBlock>,
    block_size: usize,
    dropped: Arc<AtomicU64>,
}

/// Consumer half, owned by the worker
pub struct TapReceiver {
    rx: Receiver<TapBlock>,
    recycle: Sender<TapBlock>,
    dropped: Arc<AtomicU64>,
}

/// Create a queue holding `depth` blocks of up to `block_size` samples
pub fn tap_queue(depth: usize, block_size: usize) -> (TapSender, TapReceiver) {
    let depth = depth.max(1);
    let block_size = block_size.max(1);
    let (tx, rx) = bounded(depth);
    let (recycle, pool) = bounded(depth);
    for _ in 0..depth {
        // pool has exactly `depth` slots
        let _ = recycle.try_send(TapBlock::with_capacity(block_size));
    }
    let dropped = Arc::new(AtomicU64::new(0));

    (
        TapSender {
            tx,
            pool,
            recycle: recycle.clone(),
            block_size,
            dropped: dropped.clone(),
        },
        TapReceiver {
            rx,
            recycle,
            dropped,
        },
    )
}

impl TapSender {
    /// Offer samples to the worker, split into pool-sized blocks
    ///
    /// Returns the number of samples queued. When the pool is empty
    /// (worker behind) the rest is dropped and counted.
    pub fn offer(&self, samples: &[f32]) -> usize {
        let mut queued = 0;
        for chunk in samples.chunks(self.block_size) {
            if !self.offer_with(|buf| buf.extend_from_slice(chunk)) {
                self.dropped
                    .fetch_add((samples.len() - queued) as u64, Ordering::Relaxed);
                break;
            }
            queued += chunk.len();
        }
        queued
    }

    /// Fill one block through `fill` and queue it
    ///
    /// `fill` receives a cleared buffer with `block_size` capacity and must
    /// not push beyond it.
    pub fn offer_with(&self, fill: impl FnOnce(&mut Vec<f32>)) -> bool {
        let Ok(mut block) = self.pool.try_recv() else {
            return false;
        };
        block.samples.clear();
        fill(&mut block.samples);
        match self.tx.try_send(block) {
            Ok(()) => true,
            Err(TrySendError::Full(block)) | Err(TrySendError::Disconnected(block)) => {
                let _ = self.recycle.try_send(block);
                false
            }
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl TapReceiver {
    pub fn receiver(&self) -> &Receiver<TapBlock> {
        &self.rx
    }

    /// Return a used block to the pool
    pub fn recycle(&self, block: TapBlock) {
        let _ = self.recycle.try_send(block);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_splits_into_blocks() {
        let (tx, rx) = tap_queue(4, 256);
        let samples = vec![0.25_f32; 600];
        assert_eq!(tx.offer(&samples), 600);

        let sizes: Vec<usize> = rx.receiver().try_iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![256, 256, 88]);
    }

    #[test]
    fn test_exhausted_pool_drops_instead_of_allocating() {
        let (tx, rx) = tap_queue(2, 8);
        assert_eq!(tx.offer(&[1.0; 24]), 16);
        assert_eq!(tx.dropped(), 8);

        // returning a block makes room again
        let block = rx.receiver().try_recv().unwrap();
        rx.recycle(block);
        assert_eq!(tx.offer(&[1.0; 8]), 8);
    }
}
