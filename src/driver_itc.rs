//! Driver inter-thread communication.
//!
//! Cards whose driver runs on a background thread (the I²C RH/T sensor)
//! never share mutable state directly with the chassis thread. Instead
//! every transition is a request/response envelope, and IO transfer is a
//! mutex-protected double-buffer the driver thread publishes into and the
//! chassis thread reads from (and vice versa for outputs).
//!
//! The sequence-number coalescing scheme here allows at most one request
//! in flight per direction; a new snapshot published while a request is
//! outstanding does not queue a second request, it just updates what the
//! *next* request (once the current one is acked) will carry.

use std::sync::Mutex;

/// A mutex-protected double-buffer of the latest `T` a driver thread (or
/// chassis thread) has produced. `write`/`read` never block the hot path
/// on anything but a short-held lock — no channel backpressure, no
/// allocation on the common path.
pub struct DoubleBuffer<T> {
    inner: Mutex<T>,
}

impl<T: Clone> DoubleBuffer<T> {
    pub fn new(initial: T) -> Self {
        DoubleBuffer { inner: Mutex::new(initial) }
    }

    pub fn write(&self, value: T) {
        *self.inner.lock().expect("double-buffer mutex poisoned") = value;
    }

    pub fn read(&self) -> T {
        self.inner.lock().expect("double-buffer mutex poisoned").clone()
    }
}

/// Tracks the two sequence numbers for one direction of ITC traffic (e.g.
/// chassis -> driver IoFlush, or driver -> chassis IoScan): `local_seq`
/// is bumped every time the producer side publishes
/// a new snapshot; `acked_seq` is the last sequence number the consumer
/// has confirmed processing. A request is owed exactly when the two
/// diverge.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceCoalescer {
    local_seq: u64,
    acked_seq: u64,
}

impl SequenceCoalescer {
    pub fn new() -> Self {
        SequenceCoalescer::default()
    }

    /// Call when a new snapshot is available to send. Returns the
    /// sequence number to tag it with.
    pub fn publish(&mut self) -> u64 {
        self.local_seq += 1;
        self.local_seq
    }

    /// True when the most recently published snapshot has not yet been
    /// acknowledged — i.e. a request is owed to the peer.
    pub fn request_owed(&self) -> bool {
        self.local_seq != self.acked_seq
    }

    pub fn current_seq(&self) -> u64 {
        self.local_seq
    }

    /// Call on receiving a response acknowledging `acked`. If a newer
    /// snapshot was published while the request was in flight,
    /// `request_owed()` remains true and the caller should send again.
    pub fn on_response(&mut self, acked: u64) {
        if acked > self.acked_seq {
            self.acked_seq = acked;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_buffer_round_trips() {
        let buf = DoubleBuffer::new(vec![0u8; 4]);
        buf.write(vec![1, 2, 3, 4]);
        assert_eq!(buf.read(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn coalescer_no_request_owed_initially() {
        let c = SequenceCoalescer::new();
        assert!(!c.request_owed());
    }

    #[test]
    fn coalescer_owes_request_after_publish_until_acked() {
        let mut c = SequenceCoalescer::new();
        let seq = c.publish();
        assert!(c.request_owed());
        c.on_response(seq);
        assert!(!c.request_owed());
    }

    #[test]
    fn coalescer_collapses_republish_during_flight() {
        let mut c = SequenceCoalescer::new();
        let first = c.publish();
        let _second = c.publish(); // published again before first acked
        c.on_response(first);
        // newer snapshot still outstanding
        assert!(c.request_owed());
    }
}
