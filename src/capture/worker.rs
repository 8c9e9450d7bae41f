//! Per-channel background queue
//!
//! A named thread draining one [`TapReceiver`]. Shutdown is synchronous:
//! after [`BackgroundQueue::cancel`] returns, the handler is not running and
//! will never run again.

use super::tap_queue::TapReceiver;
use crossbeam_channel::{bounded, select, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct BackgroundQueue {
    label: String,
    cancelled: Arc<AtomicBool>,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundQueue {
    /// Spawn a worker calling `handler` for every block, in queue order
    pub fn spawn<F>(label: impl Into<String>, queue: TapReceiver, mut handler: F) -> std::io::Result<Self>
    where
        F: FnMut(&[f32]) + Send + 'static,
    {
        let label = label.into();
        let cancelled = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let flag = cancelled.clone();
        let handle = thread::Builder::new()
            .name(label.clone())
            .spawn(move || loop {
                select! {
                    recv(queue.receiver()) -> msg => {
                        let Ok(block) = msg else { break };
                        if flag.load(Ordering::Acquire) {
                            break;
                        }
                        handler(block.samples());
                        queue.recycle(block);
                    }
                    recv(shutdown_rx) -> _ => break,
                }
            })?;

        log::debug!("[BackgroundQueue] Started {}", label);

        Ok(Self {
            label,
            cancelled,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop the worker and wait for an in-flight handler call to finish
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        // dropping the sender wakes the select
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                log::error!("[BackgroundQueue] Worker {} panicked", self.label);
            }
            log::debug!("[BackgroundQueue] Stopped {}", self.label);
        }
    }
}

impl Drop for BackgroundQueue {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tap_queue::tap_queue;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    #[test]
    fn test_blocks_are_handled_in_order() {
        let (tx, rx) = tap_queue(8, 4);
        let (seen_tx, seen_rx) = unbounded();
        let mut worker = BackgroundQueue::spawn("test.order", rx, move |samples| {
            let _ = seen_tx.send(samples[0]);
        })
        .unwrap();

        for i in 0..5 {
            tx.offer(&[i as f32; 4]);
        }
        let seen: Vec<f32> = (0..5)
            .map(|_| seen_rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(seen, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        worker.cancel();
    }

    #[test]
    fn test_cancel_drops_queued_blocks() {
        let (tx, rx) = tap_queue(8, 4);
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let (seen_tx, seen_rx) = unbounded();
        let mut worker = BackgroundQueue::spawn("test.cancel", rx, move |samples| {
            // hold the first block until released
            let _ = gate_rx.recv_timeout(Duration::from_millis(200));
            let _ = seen_tx.send(samples[0]);
        })
        .unwrap();

        tx.offer(&[1.0; 4]);
        tx.offer(&[2.0; 4]);
        tx.offer(&[3.0; 4]);
        // the worker is parked inside the first handler call
        std::thread::sleep(Duration::from_millis(50));
        worker.cancel();

        let seen: Vec<f32> = seen_rx.try_iter().collect();
        assert_eq!(seen, vec![1.0]);
        assert!(worker.is_cancelled());
        drop(gate_tx);
    }
}
