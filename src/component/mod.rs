//! Component execution model: pure-ish functions over input points ->
//! output points, resolved from numeric ids to validated references
//! exactly once before `start`.

pub mod and_gate;
pub mod byte_demux;
pub mod byte_mux;
pub mod byte_splitter;
pub mod nbit_demux;
pub mod nbit_mux;
pub mod on_off;
pub mod wire;

use crate::error::FxtError;
use crate::point_db::PointDatabase;

/// Common contract every component kind implements.
pub trait Component {
    /// Validates every input/output id against `point_db`, checking the
    /// referenced point exists and has the type GUID this component
    /// expects. Must be called exactly once, before `start`.
    fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError>;

    /// One-time per run: initializes any stateful points from their
    /// setters.
    fn start(&mut self, point_db: &mut PointDatabase, current_time_us: u64) -> Result<(), FxtError>;

    /// Reads inputs, computes, writes outputs.
    fn execute(&mut self, point_db: &mut PointDatabase, current_tick_us: u64) -> Result<(), FxtError>;

    fn type_guid(&self) -> &'static str;
    fn type_name(&self) -> &'static str;
}

/// Validates that point `id` exists in `point_db` and has type GUID
/// `expected`. Shared by every component's `resolve_references`.
pub(crate) fn check_ref(point_db: &PointDatabase, id: u32, expected: &str, unresolved_err: FxtError, bad_type_err: FxtError) -> Result<(), FxtError> {
    match point_db.get(id) {
        None => Err(unresolved_err),
        Some(p) if p.type_guid() != expected => Err(bad_type_err),
        Some(_) => Ok(()),
    }
}

/// Sets every id in `outputs` invalid. Used to implement the common
/// invalid-propagation rule: if any input is invalid, all outputs are
/// set invalid and the function still returns success.
pub(crate) fn invalidate_all(outputs: &[u32], point_db: &mut PointDatabase) {
    for &id in outputs {
        if let Some(p) = point_db.get_mut(id) {
            p.set_invalid(crate::point::LockRequest::NoRequest);
        }
    }
}

/// Reads a single input point's `(valid, value)`. Missing ids (should be
/// impossible post-`resolve_references`) read as invalid rather than
/// panicking, since components never touch anything but their own
/// declared points.
pub(crate) fn read_input(point_db: &PointDatabase, id: u32) -> (bool, crate::point::PointValue) {
    match point_db.get(id) {
        Some(p) => p.read(),
        None => (false, crate::point::PointValue::Bool(false)),
    }
}
