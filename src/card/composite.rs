//! Composite development-board card: channel numbers are ranges with
//! distinct meanings — `1..4` digital input, `11..13` analog
//! input, `21..22` button, `31` on-board temperature, with a symmetric
//! range convention for outputs. A per-channel function table is built
//! once at parse time rather than branching on channel number on every
//! scan.

use crate::card::{apply_setters, check_duplicate_channels, copy_registers_to_virtual, copy_virtual_to_registers, Card, ChannelPoints};
use crate::error::FxtError;
use crate::guid;
use crate::point::{LockRequest, PointValue};
use crate::point_db::PointDatabase;

/// What kind of physical signal a channel maps to, determining how its
/// register is populated on scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    DigitalInput,
    AnalogInput,
    Button,
    Temperature,
    DigitalOutput,
    AnalogOutput,
    Led,
}

/// Classifies a channel number per this card's fixed ranges.
pub fn classify_input_channel(channel: u32) -> Option<ChannelKind> {
    match channel {
        1..=4 => Some(ChannelKind::DigitalInput),
        11..=13 => Some(ChannelKind::AnalogInput),
        21..=22 => Some(ChannelKind::Button),
        31 => Some(ChannelKind::Temperature),
        _ => None,
    }
}

pub fn classify_output_channel(channel: u32) -> Option<ChannelKind> {
    match channel {
        1..=4 => Some(ChannelKind::DigitalOutput),
        11..=13 => Some(ChannelKind::AnalogOutput),
        21..=22 => Some(ChannelKind::Led),
        _ => None,
    }
}

/// A mapped channel plus the classification its number implies.
#[derive(Debug, Clone, Copy)]
pub struct CompositeChannel {
    pub points: ChannelPoints,
    pub kind: ChannelKind,
}

/// The board-level abstraction the card drives — kept small and
/// kind-dispatching, since every channel on this card family shares one
/// physical bus.
pub trait CompositeBoardDriver {
    fn read_digital(&mut self, channel: u32) -> Result<bool, FxtError>;
    fn read_analog(&mut self, channel: u32) -> Result<i32, FxtError>;
    fn read_button(&mut self, channel: u32) -> Result<bool, FxtError>;
    fn read_temperature(&mut self, channel: u32) -> Result<f32, FxtError>;
    fn write_digital(&mut self, channel: u32, value: bool) -> Result<(), FxtError>;
    fn write_analog(&mut self, channel: u32, value: i32) -> Result<(), FxtError>;
}

/// Lets a type-erased board driver satisfy `CompositeCard<D>`'s bound; see
/// `gpio::GpioDriver`'s identical impl for why this exists.
impl CompositeBoardDriver for Box<dyn CompositeBoardDriver + Send> {
    fn read_digital(&mut self, channel: u32) -> Result<bool, FxtError> {
        (**self).read_digital(channel)
    }
    fn read_analog(&mut self, channel: u32) -> Result<i32, FxtError> {
        (**self).read_analog(channel)
    }
    fn read_button(&mut self, channel: u32) -> Result<bool, FxtError> {
        (**self).read_button(channel)
    }
    fn read_temperature(&mut self, channel: u32) -> Result<f32, FxtError> {
        (**self).read_temperature(channel)
    }
    fn write_digital(&mut self, channel: u32, value: bool) -> Result<(), FxtError> {
        (**self).write_digital(channel, value)
    }
    fn write_analog(&mut self, channel: u32, value: i32) -> Result<(), FxtError> {
        (**self).write_analog(channel, value)
    }
}

pub struct CompositeCard<D: CompositeBoardDriver> {
    slot: u32,
    driver: D,
    inputs: Vec<CompositeChannel>,
    outputs: Vec<CompositeChannel>,
    started: bool,
    error: FxtError,
}

impl<D: CompositeBoardDriver> CompositeCard<D> {
    pub fn new(slot: u32, driver: D, raw_inputs: Vec<ChannelPoints>, raw_outputs: Vec<ChannelPoints>) -> Result<Self, FxtError> {
        check_duplicate_channels(&raw_inputs)?;
        check_duplicate_channels(&raw_outputs)?;

        let inputs = raw_inputs
            .into_iter()
            .map(|points| {
                classify_input_channel(points.channel)
                    .map(|kind| CompositeChannel { points, kind })
                    .ok_or(FxtError::card(1, 3)) // MISSING_REQUIRED_FIELD (unmapped channel number)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let outputs = raw_outputs
            .into_iter()
            .map(|points| {
                classify_output_channel(points.channel)
                    .map(|kind| CompositeChannel { points, kind })
                    .ok_or(FxtError::card(1, 3))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompositeCard { slot, driver, inputs, outputs, started: false, error: FxtError::SUCCESS })
    }

    fn input_channel_points(&self) -> Vec<ChannelPoints> {
        self.inputs.iter().map(|c| c.points).collect()
    }

    fn output_channel_points(&self) -> Vec<ChannelPoints> {
        self.outputs.iter().map(|c| c.points).collect()
    }
}

impl<D: CompositeBoardDriver> Card for CompositeCard<D> {
    fn start(&mut self, point_db: &mut PointDatabase, _current_time_us: u64) -> bool {
        self.error = FxtError::SUCCESS;
        let outs = self.output_channel_points();
        apply_setters(&outs, point_db);
        copy_virtual_to_registers(&outs, point_db);
        self.started = self.flush_outputs(point_db, 0) && self.error.is_success();
        self.started
    }

    fn stop(&mut self, _point_db: &mut PointDatabase) {
        self.started = false;
    }

    fn scan_inputs(&mut self, point_db: &mut PointDatabase, _current_time_us: u64) -> bool {
        for ch in &self.inputs {
            let result: Result<PointValue, FxtError> = match ch.kind {
                ChannelKind::DigitalInput => self.driver.read_digital(ch.points.channel).map(PointValue::Bool),
                ChannelKind::AnalogInput => self.driver.read_analog(ch.points.channel).map(PointValue::I32),
                ChannelKind::Button => self.driver.read_button(ch.points.channel).map(PointValue::Bool),
                ChannelKind::Temperature => self.driver.read_temperature(ch.points.channel).map(PointValue::F32),
                _ => unreachable!("input channel classified as an output kind"),
            };
            match result {
                Ok(value) => {
                    if let Some(reg) = point_db.get_mut(ch.points.io_register_id) {
                        reg.write(value, LockRequest::NoRequest);
                    }
                }
                Err(e) => {
                    self.error = e;
                    return false;
                }
            }
        }
        copy_registers_to_virtual(&self.input_channel_points(), point_db);
        true
    }

    fn flush_outputs(&mut self, point_db: &mut PointDatabase, _current_time_us: u64) -> bool {
        copy_virtual_to_registers(&self.output_channel_points(), point_db);
        for ch in &self.outputs {
            let (valid, value) = match point_db.get(ch.points.io_register_id) {
                Some(p) => p.read(),
                None => continue,
            };
            if !valid {
                continue;
            }
            let result = match (ch.kind, value) {
                (ChannelKind::DigitalOutput, PointValue::Bool(b)) => self.driver.write_digital(ch.points.channel, b),
                (ChannelKind::Led, PointValue::Bool(b)) => self.driver.write_digital(ch.points.channel, b),
                (ChannelKind::AnalogOutput, PointValue::I32(v)) => self.driver.write_analog(ch.points.channel, v),
                _ => Ok(()),
            };
            if let Err(e) = result {
                self.error = e;
                return false;
            }
        }
        true
    }

    fn type_guid(&self) -> &'static str {
        guid::card::COMPOSITE_RP2040
    }

    fn type_name(&self) -> &'static str {
        "composite_rp2040"
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

    #[derive(Default)]
    struct FakeBoard {
        digital: std::collections::HashMap<u32, bool>,
        analog: std::collections::HashMap<u32, i32>,
        temp: f32,
    }

    impl CompositeBoardDriver for FakeBoard {
        fn read_digital(&mut self, channel: u32) -> Result<bool, FxtError> {
            Ok(*self.digital.get(&channel).unwrap_or(&false))
        }
        fn read_analog(&mut self, channel: u32) -> Result<i32, FxtError> {
            Ok(*self.analog.get(&channel).unwrap_or(&0))
        }
        fn read_button(&mut self, channel: u32) -> Result<bool, FxtError> {
            Ok(*self.digital.get(&channel).unwrap_or(&false))
        }
        fn read_temperature(&mut self, _channel: u32) -> Result<f32, FxtError> {
            Ok(self.temp)
        }
        fn write_digital(&mut self, channel: u32, value: bool) -> Result<(), FxtError> {
            self.digital.insert(channel, value);
            Ok(())
        }
        fn write_analog(&mut self, channel: u32, value: i32) -> Result<(), FxtError> {
            self.analog.insert(channel, value);
            Ok(())
        }
    }

    #[test]
    fn classifies_channel_ranges() {
        assert_eq!(classify_input_channel(2), Some(ChannelKind::DigitalInput));
        assert_eq!(classify_input_channel(12), Some(ChannelKind::AnalogInput));
        assert_eq!(classify_input_channel(21), Some(ChannelKind::Button));
        assert_eq!(classify_input_channel(31), Some(ChannelKind::Temperature));
        assert_eq!(classify_input_channel(99), None);
    }

    #[test]
    fn rejects_unmapped_channel_number() {
        let points = vec![ChannelPoints { channel: 99, io_register_id: 1, virtual_point_id: 2 }];
        let err = CompositeCard::new(1, FakeBoard::default(), points, vec![]).unwrap_err();
        assert_eq!(err.to_text(), "CARD:PARSE:MISSING_REQUIRED_FIELD");
    }

    #[test]
    fn temperature_channel_scans_as_float() {
        let mut db = PointDatabase::new();
        db.add(Point::new(1, None, PointValue::F32(0.0))).unwrap();
        db.add(Point::new(2, None, PointValue::F32(0.0))).unwrap();
        let mut driver = FakeBoard::default();
        driver.temp = 21.5;
        let inputs = vec![ChannelPoints { channel: 31, io_register_id: 1, virtual_point_id: 2 }];
        let mut card = CompositeCard::new(1, driver, inputs, vec![]).unwrap();
        assert!(card.scan_inputs(&mut db, 0));
        assert_eq!(db.get(2).unwrap().read(), (true, PointValue::F32(21.5)));
    }
}
