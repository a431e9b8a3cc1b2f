//! Chassis scheduler: the fixed-rate server that drives scanners then
//! execution sets (scan -> execute -> flush, totally ordered within a
//! tick).
//!
//! **Concurrency note.** Conceptually the point database is one
//! process-wide table with no per-point locking, relying on the
//! invariant that each chassis thread only ever touches the points that
//! belong to it. Rust's borrow checker can't see that disjointness, so
//! this crate shares the database behind an `Arc<Mutex<PointDatabase>>`
//! and each chassis locks it only for the duration of its own tick (scan
//! + execute + flush) rather than for the whole inter-tick sleep. Since
//! ticks across chassis are otherwise uncoupled, lock contention in
//! practice is limited to the rare case of two chassis ticks landing at
//! the same instant.
//!
//! **Mailbox.** The chassis thread is a cooperative mailbox server that
//! suspends only at its periodic timer and at its mailbox drain. The
//! chassis's own control plane (currently just
//! `stop`) is a [`crate::mailbox::Mailbox`] of closures over `Chassis`
//! rather than a bare atomic flag: `Node::stop` posts a message that sets
//! `requested_stop`, and the inter-tick wait is `Mailbox::drain_wait`
//! rather than a plain `thread::sleep`, so the thread wakes immediately
//! on a posted message instead of only at the next tick boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::FxtError;
use crate::execution_set::ExecutionSet;
use crate::mailbox::Mailbox;
use crate::point_db::PointDatabase;
use crate::scanner::Scanner;

pub struct Chassis {
    id: u32,
    fer_us: u64,
    scanners: Vec<Scanner>,
    execution_sets: Vec<ExecutionSet>,
    shared_point_ids: Vec<u32>,
    started: bool,
    requested_stop: bool,
    error: FxtError,
}

impl Chassis {
    pub fn new(id: u32, fer_us: u64, scanners: Vec<Scanner>, execution_sets: Vec<ExecutionSet>, shared_point_ids: Vec<u32>) -> Result<Self, FxtError> {
        if fer_us == 0 {
            return Err(FxtError::chassis(1, 1)); // CHASSIS:SCHEDULE:DEADLINE_MISSED (degenerate rate)
        }
        Ok(Chassis { id, fer_us, scanners, execution_sets, shared_point_ids, started: false, requested_stop: false, error: FxtError::SUCCESS })
    }

    /// Mailbox message target: marks the chassis thread's run loop to
    /// exit and perform its own shutdown at the next drain point. Posted
    /// by `Node::stop` via a `MailboxHandle<Chassis>`; never called
    /// directly by the chassis thread itself.
    pub(crate) fn request_stop(&mut self) {
        self.requested_stop = true;
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn shared_point_ids(&self) -> &[u32] {
        &self.shared_point_ids
    }

    pub fn error_code(&self) -> FxtError {
        self.error
    }

    /// Resolves every component's input/output references against
    /// `point_db`. The node factory calls this once, after every chassis
    /// in the node has been built, so a component may reference a point
    /// owned by any card, shared-point block or logic chain in the whole
    /// node rather than only ones declared earlier in the same chain.
    pub fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError> {
        for set in &mut self.execution_sets {
            set.resolve_references(point_db)?;
        }
        Ok(())
    }

    /// Re-initializes every scanner's IO registers from setters and
    /// starts every execution set. Idempotent: re-entering `start` while
    /// already started simply re-runs the same initialization.
    pub fn start(&mut self, point_db: &mut PointDatabase, current_time_us: u64) -> bool {
        self.error = FxtError::SUCCESS;
        let mut ok = true;
        for scanner in &mut self.scanners {
            ok &= scanner.start(point_db, current_time_us);
        }
        for set in &mut self.execution_sets {
            if let Err(e) = set.start(point_db, current_time_us) {
                self.error = e;
                ok = false;
            }
        }
        self.started = ok;
        ok
    }

    pub fn stop(&mut self, point_db: &mut PointDatabase) {
        for scanner in &mut self.scanners {
            scanner.stop(point_db);
        }
        self.started = false;
    }

    /// A chassis is stopped only once every one of its cards reports
    /// stopped — relevant for async cards whose stop completes
    /// asynchronously.
    pub fn is_stopped(&self) -> bool {
        self.scanners.iter().all(|s| s.is_stopped())
    }

    /// Runs exactly one fundamental tick: scan due scanners, execute due
    /// execution sets, flush due scanners — in that order, with every
    /// scan completing before any execute and every execute completing
    /// before any flush.
    pub fn tick(&mut self, point_db: &mut PointDatabase, tick_index: u64, current_time_us: u64) -> FxtError {
        for scanner in &mut self.scanners {
            if scanner.is_due(tick_index) {
                if !scanner.scan_inputs(point_db, current_time_us) {
                    self.error = FxtError::chassis(2, 1); // CHASSIS:RUNTIME:SCANNER_FAILED
                }
            }
        }
        for set in &mut self.execution_sets {
            if set.is_due(tick_index) {
                if let Err(e) = set.execute(point_db, current_time_us) {
                    self.error = e;
                }
            }
        }
        for scanner in &mut self.scanners {
            if scanner.is_due(tick_index) {
                if !scanner.flush_outputs(point_db, current_time_us) {
                    self.error = FxtError::chassis(2, 1); // CHASSIS:RUNTIME:SCANNER_FAILED
                }
            }
        }
        self.error
    }

    /// Drives ticks on the fundamental rate until `stop` is set, then
    /// performs its own shutdown, publishes final status, and hands `self`
    /// back to the caller. Returning (rather than dropping) the chassis
    /// lets `Node::start` reclaim it from a finished thread and re-spawn
    /// it, which is what makes stop-then-start idempotent: the same
    /// `Chassis` object, with its setters and configuration intact, simply
    /// gets a fresh thread and a fresh `start()` call. Missed deadlines are
    /// logged and surfaced as a chassis error, but the loop continues
    /// rather than aborting.
    pub fn run_forever(mut self, point_db: Arc<Mutex<PointDatabase>>, mailbox: Mailbox<Chassis>, status: Arc<ChassisStatus>) -> Self {
        let period = Duration::from_micros(self.fer_us);
        let mut tick_index: u64 = 0;
        let mut current_time_us: u64 = 0;
        loop {
            mailbox.drain(&mut self);
            if self.requested_stop {
                break;
            }
            let tick_start = Instant::now();
            {
                let mut db = point_db.lock().expect("point database mutex poisoned");
                self.tick(&mut db, tick_index, current_time_us);
            }
            status.set_error(self.error);
            let elapsed = tick_start.elapsed();
            if elapsed > period {
                log::error!("chassis {} missed its deadline: {:?} over {:?}", self.id, elapsed - period, period);
                self.error = FxtError::chassis(1, 1); // CHASSIS:SCHEDULE:DEADLINE_MISSED
                status.set_error(self.error);
            } else {
                mailbox.drain_wait(&mut self, period - elapsed);
            }
            tick_index = tick_index.wrapping_add(1);
            current_time_us = current_time_us.saturating_add(self.fer_us);
        }
        {
            let mut db = point_db.lock().expect("point database mutex poisoned");
            self.stop(&mut db);
        }
        status.set_stopped(self.is_stopped());
        self
    }
}

/// Shared status a running chassis thread publishes to, so its owning
/// `Node` can observe error/stopped state without holding the `Chassis`
/// object (which the thread has taken ownership of for its lifetime).
#[derive(Default)]
pub struct ChassisStatus {
    error: Mutex<FxtError>,
    stopped: AtomicBool,
}

impl ChassisStatus {
    pub fn new() -> Self {
        ChassisStatus { error: Mutex::new(FxtError::SUCCESS), stopped: AtomicBool::new(false) }
    }

    pub fn error(&self) -> FxtError {
        *self.error.lock().expect("chassis status mutex poisoned")
    }

    fn set_error(&self, e: FxtError) {
        *self.error.lock().expect("chassis status mutex poisoned") = e;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn set_stopped(&self, stopped: bool) {
        self.stopped.store(stopped, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_fer_rejected() {
        assert!(Chassis::new(1, 0, vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn empty_chassis_ticks_without_error() {
        let mut chassis = Chassis::new(1, 1_000, vec![], vec![], vec![]).unwrap();
        let mut db = PointDatabase::new();
        let err = chassis.tick(&mut db, 0, 0);
        assert!(err.is_success());
    }

    #[test]
    fn empty_chassis_reports_stopped() {
        let chassis = Chassis::new(1, 1_000, vec![], vec![], vec![]).unwrap();
        assert!(chassis.is_stopped());
    }
}
