//! Mailbox: the cooperative thread-server primitive shared by every
//! chassis thread and every card's background driver thread.
//!
//! A mailbox is a FIFO of boxed closures ("messages") that the owning
//! thread drains on its own schedule — at its periodic timer, or
//! whenever `drain` is called. Nothing outside the owning thread ever
//! touches chassis/component/card state directly; everything crosses
//! threads as a message posted here.

use crossbeam_channel::{Receiver, Sender, TryRecvError};

pub type Message<T> = Box<dyn FnOnce(&mut T) + Send>;

/// The sending half: cheap to clone, handed out to any thread that needs
/// to post work onto the owner's mailbox.
#[derive(Clone)]
pub struct MailboxHandle<T> {
    tx: Sender<Message<T>>,
}

impl<T> MailboxHandle<T> {
    pub fn post(&self, f: impl FnOnce(&mut T) + Send + 'static) {
        // A closed receiver means the owning thread has already exited;
        // posting past that point is a programming error the caller
        // should have avoided by checking `is_started`/join status first.
        let _ = self.tx.send(Box::new(f));
    }
}

/// The receiving half, owned by exactly one thread.
pub struct Mailbox<T> {
    rx: Receiver<Message<T>>,
    tx: Sender<Message<T>>,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Mailbox { rx, tx }
    }

    pub fn handle(&self) -> MailboxHandle<T> {
        MailboxHandle { tx: self.tx.clone() }
    }

    /// Drains every message currently queued, applying each to `state` in
    /// FIFO order. Non-blocking: returns immediately once the queue is
    /// empty, which is what lets the chassis thread interleave mailbox
    /// draining with its periodic tick.
    pub fn drain(&self, state: &mut T) {
        loop {
            match self.rx.try_recv() {
                Ok(msg) => msg(state),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Blocks until at least one message arrives or `timeout` elapses,
    /// then drains everything queued. Used by the chassis thread to wait
    /// out the remainder of its fundamental tick period while still being
    /// responsive to mailbox traffic.
    pub fn drain_wait(&self, state: &mut T, timeout: std::time::Duration) {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => msg(state),
            Err(_) => return,
        }
        self.drain(state);
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posted_messages_apply_in_order() {
        let mailbox: Mailbox<Vec<i32>> = Mailbox::new();
        let handle = mailbox.handle();
        handle.post(|v| v.push(1));
        handle.post(|v| v.push(2));
        let mut state = Vec::new();
        mailbox.drain(&mut state);
        assert_eq!(state, vec![1, 2]);
    }

    #[test]
    fn drain_on_empty_mailbox_is_noop() {
        let mailbox: Mailbox<Vec<i32>> = Mailbox::new();
        let mut state = Vec::new();
        mailbox.drain(&mut state);
        assert!(state.is_empty());
    }

    #[test]
    fn cross_thread_post_is_observed_after_join() {
        let mailbox: Mailbox<Vec<i32>> = Mailbox::new();
        let handle = mailbox.handle();
        let t = std::thread::spawn(move || {
            handle.post(|v| v.push(42));
        });
        t.join().unwrap();
        let mut state = Vec::new();
        mailbox.drain(&mut state);
        assert_eq!(state, vec![42]);
    }
}
