//! N-bit multiplexer: generalization of the byte mux with an integer
//! output type chosen from `{i8,u8,i16,u16,i32,u32,i64,u64}`; the
//! number of inputs must not exceed the output type's bit width.

use crate::component::{check_ref, Component};
use crate::error::FxtError;
use crate::guid;
use crate::point::{LockRequest, PointValue};
use crate::point_db::PointDatabase;

pub struct NBitMux {
    inputs: Vec<(u32, u8, bool)>, // point id, bit, negate
    output: u32,
    output_type_guid: &'static str,
}

impl NBitMux {
    pub fn new(output_type_guid: &'static str, inputs: Vec<(u32, u8, bool)>, output: u32) -> Result<Self, FxtError> {
        let width = PointValue::integer_bit_width(output_type_guid).ok_or(FxtError::component(1, 5))?; // UNKNOWN_TYPE_GUID
        if inputs.is_empty() || inputs.len() > width as usize {
            return Err(FxtError::component(1, 1)); // INCORRECT_NUM_INPUT_REFS
        }
        if inputs.iter().any(|(_, bit, _)| *bit as u32 >= width) {
            return Err(FxtError::component(1, 3)); // MISSING_REQUIRED_FIELD (bit out of range)
        }
        Ok(NBitMux { inputs, output, output_type_guid })
    }
}

impl Component for NBitMux {
    fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError> {
        for &(id, _, _) in &self.inputs {
            check_ref(point_db, id, guid::point::BOOL, FxtError::component(2, 1), FxtError::component(2, 3))?;
        }
        check_ref(point_db, self.output, self.output_type_guid, FxtError::component(2, 2), FxtError::component(2, 4))
    }

    fn start(&mut self, _point_db: &mut PointDatabase, _current_time_us: u64) -> Result<(), FxtError> {
        Ok(())
    }

    fn execute(&mut self, point_db: &mut PointDatabase, _current_tick_us: u64) -> Result<(), FxtError> {
        let mut bits: u64 = 0;
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
                    bits |= 1u64 << bit;
                }
            }
        }
        if let Some(out) = point_db.get_mut(self.output) {
            let zero = PointValue::zero_of_type(self.output_type_guid, 0).expect("validated type guid at construction");
            out.write(zero.from_u64_bits(bits), LockRequest::NoRequest);
        }
        Ok(())
    }

    fn type_guid(&self) -> &'static str {
        guid::component::NBIT_MUX
    }

    fn type_name(&self) -> &'static str {
        "nbit_mux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    #[test]
    fn packs_bits_into_u16_output() {
        let mut db = PointDatabase::new();
        db.add(Point::new(1, None, PointValue::Bool(false))).unwrap();
        db.add(Point::new(2, None, PointValue::Bool(false))).unwrap();
        db.add(Point::new(10, None, PointValue::U16(0))).unwrap();
        db.get_mut(1).unwrap().write(PointValue::Bool(true), LockRequest::NoRequest);
        db.get_mut(2).unwrap().write(PointValue::Bool(true), LockRequest::NoRequest);

        let mut mux = NBitMux::new(guid::point::U16, vec![(1, 0, false), (2, 9, false)], 10).unwrap();
        mux.resolve_references(&db).unwrap();
        mux.execute(&mut db, 0).unwrap();
        assert_eq!(db.get(10).unwrap().read(), (true, PointValue::U16(0b0000_0010_0000_0001)));
    }

    #[test]
    fn too_many_inputs_for_width_rejected() {
        let err = NBitMux::new(guid::point::U8, vec![(0, 0, false); 9], 10).unwrap_err();
        assert_eq!(err.to_text(), "COMPONENT:PARSE:INCORRECT_NUM_INPUT_REFS");
    }

    #[test]
    fn unknown_output_type_rejected() {
        let err = NBitMux::new(guid::point::BOOL, vec![(1, 0, false)], 10).unwrap_err();
        assert_eq!(err.to_text(), "COMPONENT:PARSE:UNKNOWN_TYPE_GUID");
    }
}
