//! Byte multiplexer: 1-8 boolean inputs, each with a `bit` offset 0-7
//! and optional `negate`, combined into one byte output as
//! `OR of ((in XOR negate) << bit)`. All inputs must be valid.

use crate::component::{check_ref, Component};
use crate::error::FxtError;
use crate::guid;
use crate::point::{LockRequest, PointValue};
use crate::point_db::PointDatabase;

pub const MAX_INPUTS: usize = 8;

pub struct ByteMux {
    inputs: Vec<(u32, u8, bool)>, // (point id, bit, negate)
    output: u32,
}

impl ByteMux {
    pub fn new(inputs: Vec<(u32, u8, bool)>, output: u32) -> Result<Self, FxtError> {
        if inputs.is_empty() || inputs.len() > MAX_INPUTS {
            return Err(FxtError::component(1, 1)); // INCORRECT_NUM_INPUT_REFS
        }
        if inputs.iter().any(|(_, bit, _)| *bit > 7) {
            return Err(FxtError::component(1, 3)); // MISSING_REQUIRED_FIELD (bit out of range)
        }
        Ok(ByteMux { inputs, output })
    }
}

impl Component for ByteMux {
    fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError> {
        for &(id, _, _) in &self.inputs {
            check_ref(point_db, id, guid::point::BOOL, FxtError::component(2, 1), FxtError::component(2, 3))?;
        }
        check_ref(point_db, self.output, guid::point::U8, FxtError::component(2, 2), FxtError::component(2, 4))
    }

    fn start(&mut self, _point_db: &mut PointDatabase, _current_time_us: u64) -> Result<(), FxtError> {
        Ok(())
    }

    fn execute(&mut self, point_db: &mut PointDatabase, _current_tick_us: u64) -> Result<(), FxtError> {
        let mut byte: u8 = 0;
        for &(id, bit, negate) in &self.inputs {
            let (valid, value) = point_db.get(id).map(|p| p.read()).unwrap_or((false, PointValue::Bool(false)));
            if !valid {
                if let Some(out) = point_db.get_mut(self.output) {
                    out.set_invalid(LockRequest::NoRequest);
                }
                return Ok(());
            }
            if let PointValue::Bool(b) = value {
                if b ^ negate {
                    byte |= 1 << bit;
                }
            }
        }
        if let Some(out) = point_db.get_mut(self.output) {
            out.write(PointValue::U8(byte), LockRequest::NoRequest);
        }
        Ok(())
    }

    fn type_guid(&self) -> &'static str {
        guid::component::BYTE_MUX
    }

    fn type_name(&self) -> &'static str {
        "byte_mux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    #[test]
    fn packs_bits_at_declared_offsets() {
        let mut db = PointDatabase::new();
        db.add(Point::new(1, None, PointValue::Bool(false))).unwrap();
        db.add(Point::new(2, None, PointValue::Bool(false))).unwrap();
        db.add(Point::new(10, None, PointValue::U8(0))).unwrap();
        db.get_mut(1).unwrap().write(PointValue::Bool(true), LockRequest::NoRequest);
        db.get_mut(2).unwrap().write(PointValue::Bool(true), LockRequest::NoRequest);

        let mut mux = ByteMux::new(vec![(1, 0, false), (2, 3, false)], 10).unwrap();
        mux.resolve_references(&db).unwrap();
        mux.execute(&mut db, 0).unwrap();
        assert_eq!(db.get(10).unwrap().read(), (true, PointValue::U8(0b0000_1001)));
    }

    #[test]
    fn negate_inverts_before_packing() {
        let mut db = PointDatabase::new();
        db.add(Point::new(1, None, PointValue::Bool(false))).unwrap();
        db.add(Point::new(10, None, PointValue::U8(0))).unwrap();
        // input stays false; negate makes it contribute a 1 bit
        let mut mux = ByteMux::new(vec![(1, 0, true)], 10).unwrap();
        db.get_mut(1).unwrap().write(PointValue::Bool(false), LockRequest::NoRequest);
        mux.resolve_references(&db).unwrap();
        mux.execute(&mut db, 0).unwrap();
        assert_eq!(db.get(10).unwrap().read(), (true, PointValue::U8(1)));
    }

    #[test]
    fn any_invalid_input_invalidates_output() {
        let mut db = PointDatabase::new();
        db.add(Point::new(1, None, PointValue::Bool(false))).unwrap();
        db.add(Point::new(10, None, PointValue::U8(0))).unwrap();
        let mut mux = ByteMux::new(vec![(1, 0, false)], 10).unwrap();
        mux.resolve_references(&db).unwrap();
        mux.execute(&mut db, 0).unwrap();
        assert!(db.get(10).unwrap().is_not_valid());
    }
}
