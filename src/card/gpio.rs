//! Synchronous 30-channel digital GPIO card: driver calls happen directly
//! in the chassis thread, no background thread, no ITC.

use crate::card::{apply_setters, check_duplicate_channels, copy_registers_to_virtual, copy_virtual_to_registers, Card, ChannelPoints};
use crate::error::FxtError;
use crate::guid;
use crate::point_db::PointDatabase;

pub const CHANNEL_COUNT: u32 = 30;

/// Per-channel pull resistor configuration, parsed from the card's JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
    Down,
}

/// A trait abstracting the physical GPIO bank so the card can be tested
/// without real hardware; hardware-specific drivers are external
/// collaborators, described only by the interface consumed here.
pub trait GpioDriver {
    fn configure(&mut self, channel: u32, pull: Pull, is_output: bool) -> Result<(), FxtError>;
    fn read(&mut self, channel: u32) -> Result<bool, FxtError>;
    fn write(&mut self, channel: u32, value: bool) -> Result<(), FxtError>;
}

/// Lets a type-erased driver satisfy `GpioCard<D>`'s bound, so the node
/// factory can build `GpioCard<Box<dyn GpioDriver + Send>>` and box the
/// whole card as `Box<dyn Card + Send>` without knowing the concrete
/// hardware binding at the call site.
impl GpioDriver for Box<dyn GpioDriver + Send> {
    fn configure(&mut self, channel: u32, pull: Pull, is_output: bool) -> Result<(), FxtError> {
        (**self).configure(channel, pull, is_output)
    }
    fn read(&mut self, channel: u32) -> Result<bool, FxtError> {
        (**self).read(channel)
    }
    fn write(&mut self, channel: u32, value: bool) -> Result<(), FxtError> {
        (**self).write(channel, value)
    }
}

pub struct GpioCard<D: GpioDriver> {
    slot: u32,
    driver: D,
    inputs: Vec<ChannelPoints>,
    input_pulls: Vec<Pull>,
    outputs: Vec<ChannelPoints>,
    started: bool,
    error: FxtError,
}

impl<D: GpioDriver> GpioCard<D> {
    pub fn new(slot: u32, driver: D, inputs: Vec<ChannelPoints>, input_pulls: Vec<Pull>, outputs: Vec<ChannelPoints>) -> Result<Self, FxtError> {
        check_duplicate_channels(&inputs)?;
        check_duplicate_channels(&outputs)?;
        Ok(GpioCard { slot, driver, inputs, input_pulls, outputs, started: false, error: FxtError::SUCCESS })
    }
}

impl<D: GpioDriver> Card for GpioCard<D> {
    fn start(&mut self, point_db: &mut PointDatabase, _current_time_us: u64) -> bool {
        self.error = FxtError::SUCCESS;
        for (ch, pull) in self.inputs.iter().zip(self.input_pulls.iter()) {
            if let Err(e) = self.driver.configure(ch.channel, *pull, false) {
                self.error = e;
            }
        }
        for ch in &self.outputs {
            if let Err(e) = self.driver.configure(ch.channel, Pull::None, true) {
                self.error = e;
            }
        }
        apply_setters(&self.outputs, point_db);
        copy_virtual_to_registers(&self.outputs, point_db);
        for ch in &self.outputs {
            let (valid, value) = point_db.get(ch.io_register_id).map(|p| p.read()).unwrap_or((false, crate::point::PointValue::Bool(false)));
            if valid {
                if let crate::point::PointValue::Bool(b) = value {
                    if let Err(e) = self.driver.write(ch.channel, b) {
                        self.error = e;
                    }
                }
            }
        }
        self.started = self.error.is_success();
        self.started
    }

    fn stop(&mut self, _point_db: &mut PointDatabase) {
        self.started = false;
    }

    fn scan_inputs(&mut self, point_db: &mut PointDatabase, _current_time_us: u64) -> bool {
        for ch in &self.inputs {
            match self.driver.read(ch.channel) {
                Ok(value) => {
                    if let Some(reg) = point_db.get_mut(ch.io_register_id) {
                        reg.write(crate::point::PointValue::Bool(value), crate::point::LockRequest::NoRequest);
                    }
                }
                Err(e) => {
                    self.error = e;
                    return false;
                }
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
            if !valid {
                continue;
            }
            if let crate::point::PointValue::Bool(b) = value {
                if let Err(e) = self.driver.write(ch.channel, b) {
                    self.error = e;
                    return false;
                }
            }
        }
        true
    }

    fn type_guid(&self) -> &'static str {
        guid::card::GPIO_30
    }

    fn type_name(&self) -> &'static str {
        "gpio30"
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
    use crate::point::{Point, PointValue};
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeGpio {
        levels: HashMap<u32, bool>,
    }

    impl GpioDriver for FakeGpio {
        fn configure(&mut self, _channel: u32, _pull: Pull, _is_output: bool) -> Result<(), FxtError> {
            Ok(())
        }
        fn read(&mut self, channel: u32) -> Result<bool, FxtError> {
            Ok(*self.levels.get(&channel).unwrap_or(&false))
        }
        fn write(&mut self, channel: u32, value: bool) -> Result<(), FxtError> {
            self.levels.insert(channel, value);
            Ok(())
        }
    }

    fn db_with(pairs: &[(u32, u32)]) -> PointDatabase {
        let mut db = PointDatabase::new();
        for &(io_id, vp_id) in pairs {
            db.add(Point::new(io_id, None, PointValue::Bool(false))).unwrap();
            db.add(Point::new(vp_id, None, PointValue::Bool(false))).unwrap();
        }
        db
    }

    #[test]
    fn scan_copies_driver_level_into_virtual_point() {
        let mut db = db_with(&[(1, 2)]);
        let mut driver = FakeGpio::default();
        driver.levels.insert(1, true);
        let inputs = vec![ChannelPoints { channel: 1, io_register_id: 1, virtual_point_id: 2 }];
        let mut card = GpioCard::new(7, driver, inputs, vec![Pull::None], vec![]).unwrap();
        assert!(card.scan_inputs(&mut db, 0));
        assert_eq!(db.get(2).unwrap().read(), (true, PointValue::Bool(true)));
    }

    #[test]
    fn flush_writes_virtual_point_value_to_driver() {
        let mut db = db_with(&[(10, 11)]);
        db.get_mut(11).unwrap().write(PointValue::Bool(true), crate::point::LockRequest::NoRequest);
        let outputs = vec![ChannelPoints { channel: 1, io_register_id: 10, virtual_point_id: 11 }];
        let mut card = GpioCard::new(1, FakeGpio::default(), vec![], vec![], outputs).unwrap();
        assert!(card.flush_outputs(&mut db, 0));
        assert_eq!(card.driver.levels.get(&1), Some(&true));
    }

    #[test]
    fn duplicate_channels_rejected_at_construction() {
        let inputs = vec![
            ChannelPoints { channel: 1, io_register_id: 1, virtual_point_id: 2 },
            ChannelPoints { channel: 1, io_register_id: 3, virtual_point_id: 4 },
        ];
        let err = GpioCard::new(1, FakeGpio::default(), inputs, vec![Pull::None, Pull::None], vec![]).unwrap_err();
        assert_eq!(err.to_text(), "CARD:PARSE:DUPLICATE_CHANNEL");
    }
}
