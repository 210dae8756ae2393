//! Bounded block transport between capture callbacks and writer threads.
//!
//! One queue per capture stream, one producer (the platform callback
//! thread) and one consumer (the writer thread). The capture side never
//! blocks: a full queue drops the incoming block and increments a shared
//! counter. The writer side pops with a bounded timeout so a stop signal
//! is observed promptly even when no audio is arriving.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::models::block::PcmBlock;

/// Default capacity in blocks — about five seconds of 1024-frame blocks
/// at 48 kHz.
pub const DEFAULT_CAPACITY: usize = 256;

/// Create a bounded queue, returning the two ends.
pub fn block_queue(capacity: usize) -> (BlockProducer, BlockConsumer) {
    let (tx, rx) = bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        BlockProducer {
            tx,
            dropped: Arc::clone(&dropped),
        },
        BlockConsumer { rx, dropped },
    )
}

/// Capture-callback end. Exactly one producer per queue.
pub struct BlockProducer {
    tx: Sender<PcmBlock>,
    dropped: Arc<AtomicU64>,
}

impl BlockProducer {
    /// Push without blocking. Returns `false` when the queue was full (or
    /// the consumer is gone) and the block was dropped and counted.
    pub fn try_push(&self, block: PcmBlock) -> bool {
        match self.tx.try_send(block) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Shared handle to the overflow counter, for surfacing drops in the
    /// session stats after the producer has moved into a callback.
    pub fn drop_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }
}

/// Writer-thread end. Exactly one consumer per queue.
pub struct BlockConsumer {
    rx: Receiver<PcmBlock>,
    dropped: Arc<AtomicU64>,
}

impl BlockConsumer {
    /// Wait up to `timeout` for the next block.
    pub fn pop(&self, timeout: Duration) -> Option<PcmBlock> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Blocks dropped on the producer side so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
