//! Deferred processing of inbound packets.
//!
//! The network I/O thread deposits raw packets into a [`DeferredPackets`]
//! queue without ever blocking; a pool of worker threads drains it through
//! [`DeferredPackets::process`], where the expensive decode and
//! verification work happens. Consumer blocking is built on a coalescing
//! [`BinarySemaphore`], so workers always re-check queue state after a
//! wake.

mod queue;
mod semaphore;

pub use queue::{Decoder, DeferredPackets, Shutdown, DEFAULT_CAPACITY};
pub use semaphore::BinarySemaphore;
