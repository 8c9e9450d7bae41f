//! Relay ring for mic capture
//!
//! Single-producer/single-consumer `ringbuf` ring carrying mono samples from
//! the relay worker into the render-side relay player node.

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::Arc;

/// Relay ring size (frames). 16384 frames at 48kHz is ~341ms.
pub const RELAY_RING_SIZE: usize = 16384;

/// Writer half, shared between successive relay workers of one channel
#[derive(Clone)]
pub struct RelayWriter {
    inner: Arc<Mutex<HeapProd<f32>>>,
}

/// Reader half, owned by the render domain
pub struct RelayReader {
    inner: HeapCons<f32>,
}

pub fn relay_ring(capacity: usize) -> (RelayWriter, RelayReader) {
    let (prod, cons) = HeapRb::<f32>::new(capacity.max(1)).split();
    (
        RelayWriter {
            inner: Arc::new(Mutex::new(prod)),
        },
        RelayReader { inner: cons },
    )
}

impl RelayWriter {
    /// Push samples; returns how many fit. Overflow is dropped.
    pub fn write(&self, samples: &[f32]) -> usize {
        self.inner.lock().push_slice(samples)
    }

    pub fn free(&self) -> usize {
        self.inner.lock().vacant_len()
    }
}

impl RelayReader {
    /// Fill `out` from the ring, zero-padding on underrun. Returns samples read.
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        let read = self.inner.pop_slice(out);
        out[read..].fill(0.0);
        read
    }

    /// Drop everything buffered
    pub fn flush(&mut self) -> usize {
        self.inner.clear()
    }

    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_write_read() {
        let (writer, mut reader) = relay_ring(1024);

        let samples: Vec<f32> = (0..256).map(|i| i as f32 / 256.0).collect();
        assert_eq!(writer.write(&samples), 256);

        let mut output = vec![1.0f32; 300];
        assert_eq!(reader.read(&mut output), 256);
        assert!((output[255] - 255.0 / 256.0).abs() < 0.0001);
        assert!(output[256..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_relay_overflow_is_dropped() {
        let (writer, mut reader) = relay_ring(100);

        let samples: Vec<f32> = (0..150).map(|i| i as f32).collect();
        assert_eq!(writer.write(&samples), 100);
        assert_eq!(writer.free(), 0);

        assert_eq!(reader.flush(), 100);
        assert_eq!(reader.available(), 0);
    }
}
