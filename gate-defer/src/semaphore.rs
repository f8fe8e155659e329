use parking_lot::{Condvar, Mutex};

/// A two-state blocking handoff primitive.
///
/// [`post`](Self::post) leaves a signal pending and wakes at most one
/// waiter; [`wait`](Self::wait) blocks until a signal is pending, then
/// consumes it. Signals are coalesced, never counted: any number of posts
/// before a wait leaves exactly one pending signal, so N posts do not
/// guarantee N waits unblock. Multi-consumer callers must re-check their
/// own state after every wake.
#[derive(Debug, Default)]
pub struct BinarySemaphore {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl BinarySemaphore {
    /// Creates an unsignaled semaphore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks the calling thread until a signal is pending, then consumes
    /// it.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.condvar.wait(&mut signaled);
        }
        *signaled = false;
    }

    /// Leaves a signal pending and wakes one waiter, if any. Cannot fail.
    pub fn post(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_one();
    }
}
