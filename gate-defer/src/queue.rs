use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::BinarySemaphore;

/// Default maximum number of resident deferred packets.
pub const DEFAULT_CAPACITY: usize = 256;

/// Returned by [`DeferredPackets::process`] once the queue is being torn
/// down. A normal termination signal for worker loops, not a fault.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("deferred packet queue is shut down")]
pub struct Shutdown;

/// Decodes one deferred packet. The node's real decoder (decrypt, classify,
/// consult trust, filter) lives behind this seam; this crate only needs to
/// know that decoding can fail.
pub trait Decoder<P> {
    /// Decode failure. Failures are logged and swallowed by the worker
    /// loop; a malformed packet must never take the loop down.
    type Error: std::error::Error;

    /// Consumes and decodes a single packet.
    fn decode(&self, packet: P) -> Result<(), Self::Error>;
}

/// A capacity-bounded queue of not-yet-decoded inbound packets.
///
/// Producers call [`enqueue`](Self::enqueue), which never blocks: a full
/// queue is a backpressure point and the packet is refused rather than
/// buffered without bound. Workers loop on [`process`](Self::process),
/// blocking on a [`BinarySemaphore`] while the queue is empty. Entries are
/// moved out under the queue guard, so no packet is ever handed to two
/// workers.
#[derive(Debug)]
pub struct DeferredPackets<P> {
    inner: Mutex<Inner<P>>,
    /// Wakes one worker per enqueue. Coalescing: workers re-check queue
    /// state after every wake instead of trusting the signal count.
    available: BinarySemaphore,
    /// Signaled whenever a worker leaves the parked state; `shutdown`
    /// waits on it until no worker is still parked.
    idle: Condvar,
    capacity: usize,
}

#[derive(Debug)]
struct Inner<P> {
    queue: VecDeque<P>,
    waiting: usize,
    shutdown: bool,
}

impl<P> DeferredPackets<P> {
    /// Creates a queue with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a queue bounded at `capacity` resident packets.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                waiting: 0,
                shutdown: false,
            }),
            available: BinarySemaphore::new(),
            idle: Condvar::new(),
            capacity,
        }
    }

    /// Number of packets currently resident.
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Whether no packets are resident.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// Hands a packet to the worker pool. Never blocks.
    ///
    /// A full (or shut down) queue refuses the packet and returns it to
    /// the caller, who decides whether to drop or retry.
    pub fn enqueue(&self, packet: P) -> Result<(), P> {
        {
            let mut inner = self.inner.lock();
            if inner.shutdown || inner.queue.len() >= self.capacity {
                return Err(packet);
            }
            inner.queue.push_back(packet);
        }
        self.available.post();
        Ok(())
    }

    /// Takes one packet off the queue and runs it through `decoder`.
    /// Worker-loop body: call in a loop until it returns [`Shutdown`].
    ///
    /// Blocks while the queue is empty. The packet is removed under the
    /// queue guard, so exactly one worker sees it; the decode itself runs
    /// outside the guard. Decode failures are logged and swallowed.
    pub fn process<D: Decoder<P>>(&self, decoder: &D) -> Result<usize, Shutdown> {
        let mut inner = self.inner.lock();
        let packet = loop {
            if inner.shutdown {
                return Err(Shutdown);
            }
            if let Some(packet) = inner.queue.pop_front() {
                break packet;
            }

            inner.waiting += 1;
            drop(inner);
            self.available.wait();
            inner = self.inner.lock();
            inner.waiting -= 1;
            self.idle.notify_all();
            // Shutdown can race the wake, so the loop re-checks the flag
            // before touching the queue.
        };
        drop(inner);

        if let Err(e) = decoder.decode(packet) {
            tracing::warn!("dropping undecodable deferred packet: {}", e);
        }
        Ok(1)
    }

    /// Tears the queue down.
    ///
    /// All blocked and all future [`process`](Self::process) calls return
    /// [`Shutdown`]. Does not return until every worker parked on the
    /// semaphore has woken and observed the flag, so no thread is left
    /// permanently blocked. Packets still resident are dropped.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.shutdown = true;
        while inner.waiting > 0 {
            // One post wakes at most one parked worker; re-post until the
            // last of them has reported back in.
            self.available.post();
            self.idle.wait(&mut inner);
        }
    }
}

impl<P> Default for DeferredPackets<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Drop for DeferredPackets<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
