//! Mock cards for tests and the shell: a mutex-protected IO register
//! array an external test harness (or the `shell` binary) can
//! read/write directly, concurrently with the chassis thread's own
//! scan/flush.

use std::sync::{Arc, Mutex};

use crate::card::{apply_setters, check_duplicate_channels, copy_registers_to_virtual, copy_virtual_to_registers, Card, ChannelPoints};
use crate::error::FxtError;
use crate::guid;
use crate::point::PointValue;
use crate::point_db::PointDatabase;

/// One mock register's state: a value, or deliberately invalidated —
/// lets a test harness exercise a card's invalid-propagation behavior
/// without removing the channel entirely.
#[derive(Clone, Debug)]
enum MockRegisterState {
    Value(PointValue),
    Invalid,
}

/// Shared handle a test harness keeps to poke a mock card's registers
/// from outside the chassis thread.
#[derive(Clone, Default)]
pub struct MockRegisterFile {
    inner: Arc<Mutex<std::collections::HashMap<u32, MockRegisterState>>>,
}

impl MockRegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, channel: u32, value: PointValue) {
        self.inner.lock().expect("mock register mutex poisoned").insert(channel, MockRegisterState::Value(value));
    }

    pub fn get(&self, channel: u32) -> Option<PointValue> {
        match self.inner.lock().expect("mock register mutex poisoned").get(&channel) {
            Some(MockRegisterState::Value(v)) => Some(v.clone()),
            Some(MockRegisterState::Invalid) | None => None,
        }
    }

    /// Marks a channel invalid. A subsequent `scan_inputs` writes the IO
    /// register (and thus the virtual point) invalid rather than leaving
    /// its last value in place.
    pub fn invalidate(&self, channel: u32) {
        self.inner.lock().expect("mock register mutex poisoned").insert(channel, MockRegisterState::Invalid);
    }

    fn state(&self, channel: u32) -> Option<MockRegisterState> {
        self.inner.lock().expect("mock register mutex poisoned").get(&channel).cloned()
    }
}

/// 8-channel mock card: digital IO, analog-in, or analog-out, per the
/// type GUID it was constructed with.
pub struct MockCard {
    slot: u32,
    type_guid: &'static str,
    registers: MockRegisterFile,
    inputs: Vec<ChannelPoints>,
    outputs: Vec<ChannelPoints>,
    started: bool,
    error: FxtError,
}

impl MockCard {
    pub fn new(slot: u32, type_guid: &'static str, registers: MockRegisterFile, inputs: Vec<ChannelPoints>, outputs: Vec<ChannelPoints>) -> Result<Self, FxtError> {
        check_duplicate_channels(&inputs)?;
        check_duplicate_channels(&outputs)?;
        Ok(MockCard { slot, type_guid, registers, inputs, outputs, started: false, error: FxtError::SUCCESS })
    }

    pub fn digital8(slot: u32, registers: MockRegisterFile, inputs: Vec<ChannelPoints>, outputs: Vec<ChannelPoints>) -> Result<Self, FxtError> {
        Self::new(slot, guid::card::MOCK_DIGITAL8, registers, inputs, outputs)
    }

    pub fn analog_in8(slot: u32, registers: MockRegisterFile, inputs: Vec<ChannelPoints>) -> Result<Self, FxtError> {
        Self::new(slot, guid::card::MOCK_ANALOG_IN8, registers, inputs, vec![])
    }

    pub fn analog_out8(slot: u32, registers: MockRegisterFile, outputs: Vec<ChannelPoints>) -> Result<Self, FxtError> {
        Self::new(slot, guid::card::MOCK_ANALOG_OUT8, registers, vec![], outputs)
    }

    pub fn registers(&self) -> &MockRegisterFile {
        &self.registers
    }
}

impl Card for MockCard {
    fn start(&mut self, point_db: &mut PointDatabase, _current_time_us: u64) -> bool {
        self.error = FxtError::SUCCESS;
        apply_setters(&self.inputs, point_db);
        apply_setters(&self.outputs, point_db);
        copy_registers_to_virtual(&self.inputs, point_db);
        self.started = self.flush_outputs(point_db, 0);
        self.started
    }

    fn stop(&mut self, _point_db: &mut PointDatabase) {
        self.started = false;
    }

    fn scan_inputs(&mut self, point_db: &mut PointDatabase, _current_time_us: u64) -> bool {
        for ch in &self.inputs {
            match self.registers.state(ch.channel) {
                Some(MockRegisterState::Value(value)) => {
                    if let Some(reg) = point_db.get_mut(ch.io_register_id) {
                        reg.write(value, crate::point::LockRequest::NoRequest);
                    }
                }
                Some(MockRegisterState::Invalid) => {
                    if let Some(reg) = point_db.get_mut(ch.io_register_id) {
                        reg.set_invalid(crate::point::LockRequest::NoRequest);
                    }
                }
                None => {}
            }
        }
        copy_registers_to_virtual(&self.inputs, point_db);
        true
    }

    fn flush_outputs(&mut self, point_db: &mut PointDatabase, _current_time_us: u64) -> bool {
        copy_virtual_to_registers(&self.outputs, point_db);
        for ch in &self.outputs {
            let (valid, value) = match point_db.get(ch.io_register_id) {
                Some(p) => p.read(),
                None => continue,
            };
            if valid {
                self.registers.set(ch.channel, value);
            }
        }
        true
    }

    fn type_guid(&self) -> &'static str {
        self.type_guid
    }

    fn type_name(&self) -> &'static str {
        "mock"
    }

    fn slot_number(&self) -> u32 {
        self.slot
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn error_code(&self) -> FxtError {
        self.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    fn db_with(pairs: &[(u32, u32)]) -> PointDatabase {
        let mut db = PointDatabase::new();
        for &(io_id, vp_id) in pairs {
            db.add(Point::new(io_id, None, PointValue::Bool(false))).unwrap();
            db.add(Point::new(vp_id, None, PointValue::Bool(false))).unwrap();
        }
        db
    }

    #[test]
    fn external_write_to_register_surfaces_on_scan() {
        let mut db = db_with(&[(1, 2)]);
        let regs = MockRegisterFile::new();
        let inputs = vec![ChannelPoints { channel: 3, io_register_id: 1, virtual_point_id: 2 }];
        let mut card = MockCard::digital8(0, regs.clone(), inputs, vec![]).unwrap();
        regs.set(3, PointValue::Bool(true));
        assert!(card.scan_inputs(&mut db, 0));
        assert_eq!(db.get(2).unwrap().read(), (true, PointValue::Bool(true)));
    }

    #[test]
    fn flush_makes_output_visible_to_external_reader() {
        let mut db = db_with(&[(10, 11)]);
        db.get_mut(11).unwrap().write(PointValue::Bool(true), crate::point::LockRequest::NoRequest);
        let regs = MockRegisterFile::new();
        let outputs = vec![ChannelPoints { channel: 5, io_register_id: 10, virtual_point_id: 11 }];
        let mut card = MockCard::digital8(0, regs.clone(), vec![], outputs).unwrap();
        assert!(card.flush_outputs(&mut db, 0));
        assert_eq!(regs.get(5), Some(PointValue::Bool(true)));
    }
}
