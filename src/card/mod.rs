//! Card/driver adapter layer: groups of IO channels, each with an
//! Input/Output IO Register copied to/from an Input/Output Virtual Point
//! on every scan/flush.

pub mod composite;
pub mod gpio;
pub mod mock;
pub mod rht;

use crate::error::FxtError;
use crate::point_db::PointDatabase;

/// One channel's IO-register/virtual-point id pair. Distinct ids always
/// exist for both: the register is written directly by the driver, the
/// virtual point is what components see.
#[derive(Debug, Clone, Copy)]
pub struct ChannelPoints {
    pub channel: u32,
    pub io_register_id: u32,
    pub virtual_point_id: u32,
}

/// Common contract every card type implements.
pub trait Card {
    /// Resets state, applies setters to every IO register, and performs
    /// any hardware bring-up. Returns `false` if the card's error cell
    /// ends up set.
    fn start(&mut self, point_db: &mut PointDatabase, current_time_us: u64) -> bool;

    /// Best-effort halt. For async cards this only *initiates* a stop;
    /// `is_started()` will keep reporting `true` until the driver thread's
    /// response is observed.
    fn stop(&mut self, point_db: &mut PointDatabase);

    /// Reads the driver into Input IO Registers, then copies them to
    /// Input Virtual Points. Returns `false` on driver error.
    fn scan_inputs(&mut self, point_db: &mut PointDatabase, current_time_us: u64) -> bool;

    /// Copies Output Virtual Points to Output IO Registers, then writes
    /// them to the driver. Returns `false` on driver error.
    fn flush_outputs(&mut self, point_db: &mut PointDatabase, current_time_us: u64) -> bool;

    fn type_guid(&self) -> &'static str;
    fn type_name(&self) -> &'static str;
    fn slot_number(&self) -> u32;
    fn is_started(&self) -> bool;
    fn error_code(&self) -> FxtError;
}

/// Copies every channel's IO register into its virtual point —
/// shared by every synchronous card's `scan_inputs`, and by async
/// cards once their double-buffer has been drained into registers.
pub(crate) fn copy_registers_to_virtual(channels: &[ChannelPoints], point_db: &mut PointDatabase) {
    for ch in channels {
        let (valid, value) = match point_db.get(ch.io_register_id) {
            Some(p) => p.read(),
            None => continue,
        };
        if let Some(vp) = point_db.get_mut(ch.virtual_point_id) {
            if valid {
                vp.write(value, crate::point::LockRequest::NoRequest);
            } else {
                vp.set_invalid(crate::point::LockRequest::NoRequest);
            }
        }
    }
}

/// Symmetric copy for flush: virtual point -> IO register.
pub(crate) fn copy_virtual_to_registers(channels: &[ChannelPoints], point_db: &mut PointDatabase) {
    for ch in channels {
        let (valid, value) = match point_db.get(ch.virtual_point_id) {
            Some(p) => p.read(),
            None => continue,
        };
        if let Some(reg) = point_db.get_mut(ch.io_register_id) {
            if valid {
                reg.write(value, crate::point::LockRequest::NoRequest);
            } else {
                reg.set_invalid(crate::point::LockRequest::NoRequest);
            }
        }
    }
}

/// Applies every channel's setter (if any) to its IO register at
/// `start` time.
pub(crate) fn apply_setters(channels: &[ChannelPoints], point_db: &mut PointDatabase) {
    for ch in channels {
        point_db.apply_setter(ch.io_register_id);
    }
}

/// Rejects duplicate channel numbers within one direction's list;
/// duplicates inside a card are rejected at parse time.
pub(crate) fn check_duplicate_channels(channels: &[ChannelPoints]) -> Result<(), FxtError> {
    let mut seen = std::collections::HashSet::new();
    for ch in channels {
        if !seen.insert(ch.channel) {
            return Err(FxtError::card(1, 1)); // CARD:PARSE:DUPLICATE_CHANNEL
        }
    }
    Ok(())
}
