//! Capture Module - render/capture domain to worker handoff

mod ring_buffer;
mod tap_queue;
mod worker;

pub use ring_buffer::{relay_ring, RelayReader, RelayWriter, RELAY_RING_SIZE};
pub use tap_queue::{tap_queue, TapBlock, TapReceiver, TapSender};
pub use worker::BackgroundQueue;
