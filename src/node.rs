//! Node: the top-level object a configuration load produces — a type
//! GUID, an id, the three arenas, one point database, and the list of
//! chassis, each run on its own OS thread.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::arena::Arenas;
use crate::chassis::{Chassis, ChassisStatus};
use crate::error::FxtError;
use crate::mailbox::{Mailbox, MailboxHandle};
use crate::point_db::PointDatabase;

struct RunningChassis {
    mailbox_handle: MailboxHandle<Chassis>,
    status: Arc<ChassisStatus>,
    handle: JoinHandle<Chassis>,
}

pub struct Node {
    type_guid: &'static str,
    id: u32,
    arenas: Arenas,
    point_db: Arc<Mutex<PointDatabase>>,
    pending: Vec<Chassis>,
    running: Vec<RunningChassis>,
    started: bool,
    error: FxtError,
}

impl Node {
    pub fn new(type_guid: &'static str, id: u32, arenas: Arenas, point_db: PointDatabase, chassis: Vec<Chassis>) -> Self {
        Node {
            type_guid,
            id,
            arenas,
            point_db: Arc::new(Mutex::new(point_db)),
            pending: chassis,
            running: Vec::new(),
            started: false,
            error: FxtError::SUCCESS,
        }
    }

    pub fn type_guid(&self) -> &'static str {
        self.type_guid
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn arenas(&self) -> &Arenas {
        &self.arenas
    }

    pub fn point_db(&self) -> &Arc<Mutex<PointDatabase>> {
        &self.point_db
    }

    pub fn error_code(&self) -> FxtError {
        self.error
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Spawns one thread per chassis and runs its scheduler loop. Safe to
    /// call repeatedly: each call re-initializes every chassis's IO
    /// registers from setters before the background loop is (re)started,
    /// and is idempotent if already started.
    ///
    /// A prior `stop()` leaves its chassis threads winding down rather than
    /// removed; before spawning anything this reclaims every thread that
    /// has already reached `is_stopped()` (joining it to recover the
    /// `Chassis` object `run_forever` hands back) and queues it for a fresh
    /// start, so stop-then-start reinitializes IO registers rather than
    /// leaving the node with no chassis at all.
    pub fn start(&mut self) -> bool {
        self.error = FxtError::SUCCESS;

        let mut still_running = Vec::new();
        for running in self.running.drain(..) {
            if running.status.is_stopped() {
                if let Ok(chassis) = running.handle.join() {
                    self.pending.push(chassis);
                }
            } else {
                still_running.push(running);
            }
        }
        self.running = still_running;

        // First run (or restart): hand each pending chassis to its own thread.
        for chassis in self.pending.drain(..) {
            let mailbox: Mailbox<Chassis> = Mailbox::new();
            let mailbox_handle = mailbox.handle();
            let status = Arc::new(ChassisStatus::new());
            let point_db = Arc::clone(&self.point_db);
            let thread_status = Arc::clone(&status);

            let mut chassis = chassis;
            let started_ok = {
                let mut db = point_db.lock().expect("point database mutex poisoned");
                chassis.start(&mut db, 0)
            };
            if !started_ok {
                self.error = chassis.error_code();
            }

            let handle = std::thread::spawn(move || chassis.run_forever(point_db, mailbox, thread_status));

            self.running.push(RunningChassis { mailbox_handle, status, handle });
        }

        self.started = self.error.is_success();
        self.started
    }

    /// Requests every chassis stop by posting a `request_stop` message to
    /// its mailbox; does not block for threads to join. `is_started() ==
    /// false` is the observed completion signal, not a synchronous return.
    pub fn stop(&mut self) {
        for running in &self.running {
            running.mailbox_handle.post(|c| c.request_stop());
        }
        self.started = false;
    }

    /// A node is fully stopped only once every chassis thread has
    /// observed all of its own cards stopped.
    pub fn is_stopped(&self) -> bool {
        self.running.iter().all(|r| r.status.is_stopped())
    }

    /// Blocks until every chassis thread has exited. Used by tests and
    /// the shell's graceful-shutdown path; cancellation itself is already
    /// observable through `is_stopped()` alone.
    pub fn join(&mut self) {
        for running in self.running.drain(..) {
            let _ = running.handle.join();
        }
    }

    /// Aggregates the first non-success error across all running
    /// chassis, for the shell's status reporting.
    pub fn first_chassis_error(&self) -> FxtError {
        self.running
            .iter()
            .map(|r| r.status.error())
            .find(|e| !e.is_success())
            .unwrap_or(FxtError::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaSizes;
    use crate::guid;

    #[test]
    fn start_then_stop_reaches_stopped_state() {
        let chassis = Chassis::new(1, 1_000, vec![], vec![], vec![]).unwrap();
        let mut node = Node::new(guid::node::STANDARD, 1, Arenas::new(ArenaSizes::default()), PointDatabase::new(), vec![chassis]);
        assert!(node.start());
        assert!(node.is_started());

        node.stop();
        // An empty chassis has no cards, so it reports stopped immediately
        // once its thread observes the stop flag; poll briefly.
        for _ in 0..200 {
            if node.is_stopped() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(node.is_stopped());
        node.join();
    }

    #[test]
    fn restart_is_safe_to_call_again() {
        let chassis = Chassis::new(1, 1_000, vec![], vec![], vec![]).unwrap();
        let mut node = Node::new(guid::node::STANDARD, 1, Arenas::new(ArenaSizes::default()), PointDatabase::new(), vec![chassis]);
        assert!(node.start());
        assert!(node.start()); // second call is a no-op over the already-running thread
        node.stop();
        node.join();
    }

    #[test]
    fn stop_then_start_again_actually_restarts_the_chassis() {
        let chassis = Chassis::new(1, 1_000, vec![], vec![], vec![]).unwrap();
        let mut node = Node::new(guid::node::STANDARD, 1, Arenas::new(ArenaSizes::default()), PointDatabase::new(), vec![chassis]);
        assert!(node.start());

        node.stop();
        for _ in 0..200 {
            if node.is_stopped() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(node.is_stopped());

        // A second start() must reclaim the stopped chassis and run it
        // again, not leave the node with zero chassis.
        assert!(node.start());
        assert!(node.is_started());
        assert!(!node.is_stopped());

        node.stop();
        node.join();
    }
}
