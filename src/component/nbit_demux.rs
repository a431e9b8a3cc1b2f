//! N-bit demultiplexer: symmetric to the N-bit multiplexer — one
//! integer input of a configurable width unpacked into boolean
//! outputs, each with a `bit` offset and optional `negate`.

use crate::component::{check_ref, invalidate_all, Component};
use crate::error::FxtError;
use crate::guid;
use crate::point::{LockRequest, PointValue};
use crate::point_db::PointDatabase;

pub struct NBitDemux {
    input: u32,
    input_type_guid: &'static str,
    outputs: Vec<(u32, u8, bool)>, // point id, bit, negate
}

impl NBitDemux {
    pub fn new(input_type_guid: &'static str, input: u32, outputs: Vec<(u32, u8, bool)>) -> Result<Self, FxtError> {
        let width = PointValue::integer_bit_width(input_type_guid).ok_or(FxtError::component(1, 5))?; // UNKNOWN_TYPE_GUID
        if outputs.is_empty() || outputs.len() > width as usize {
            return Err(FxtError::component(1, 2)); // INCORRECT_NUM_OUTPUT_REFS
        }
        if outputs.iter().any(|(_, bit, _)| *bit as u32 >= width) {
            return Err(FxtError::component(1, 3)); // MISSING_REQUIRED_FIELD
        }
        Ok(NBitDemux { input, input_type_guid, outputs })
    }
}

impl Component for NBitDemux {
    fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError> {
        check_ref(point_db, self.input, self.input_type_guid, FxtError::component(2, 1), FxtError::component(2, 3))?;
        for &(id, _, _) in &self.outputs {
            check_ref(point_db, id, guid::point::BOOL, FxtError::component(2, 2), FxtError::component(2, 4))?;
        }
        Ok(())
    }

    fn start(&mut self, _point_db: &mut PointDatabase, _current_time_us: u64) -> Result<(), FxtError> {
        Ok(())
    }

    fn execute(&mut self, point_db: &mut PointDatabase, _current_tick_us: u64) -> Result<(), FxtError> {
        let (valid, value) = point_db.get(self.input).map(|p| p.read()).unwrap_or((false, PointValue::Bool(false)));
        if !valid {
            let ids: Vec<u32> = self.outputs.iter().map(|(id, _, _)| *id).collect();
            invalidate_all(&ids, point_db);
            return Ok(());
        }
        let bits = value.as_u64_bits().unwrap_or(0);
        for &(id, bit, negate) in &self.outputs {
            let bit_set = (bits >> bit) & 1 != 0;
            if let Some(out) = point_db.get_mut(id) {
                out.write(PointValue::Bool(bit_set ^ negate), LockRequest::NoRequest);
            }
        }
        Ok(())
    }

    fn type_guid(&self) -> &'static str {
        guid::component::NBIT_DEMUX
    }

    fn type_name(&self) -> &'static str {
        "nbit_demux"
    }
}
