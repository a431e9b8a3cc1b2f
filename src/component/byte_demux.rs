//! Byte demultiplexer: one byte input -> 1-16 boolean outputs, each
//! with a `bit` offset and optional `negate`. Symmetric to
//! the byte multiplexer.

use crate::component::{check_ref, invalidate_all, Component};
use crate::error::FxtError;
use crate::guid;
use crate::point::{LockRequest, PointValue};
use crate::point_db::PointDatabase;

pub const MAX_OUTPUTS: usize = 16;

pub struct ByteDemux {
    input: u32,
    outputs: Vec<(u32, u8, bool)>, // (point id, bit, negate)
}

impl ByteDemux {
    pub fn new(input: u32, outputs: Vec<(u32, u8, bool)>) -> Result<Self, FxtError> {
        if outputs.is_empty() || outputs.len() > MAX_OUTPUTS {
            return Err(FxtError::component(1, 2)); // INCORRECT_NUM_OUTPUT_REFS
        }
        if outputs.iter().any(|(_, bit, _)| *bit > 7) {
            return Err(FxtError::component(1, 3)); // MISSING_REQUIRED_FIELD (bit out of range)
        }
        Ok(ByteDemux { input, outputs })
    }
}

impl Component for ByteDemux {
    fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError> {
        check_ref(point_db, self.input, guid::point::U8, FxtError::component(2, 1), FxtError::component(2, 3))?;
        for &(id, _, _) in &self.outputs {
            check_ref(point_db, id, guid::point::BOOL, FxtError::component(2, 2), FxtError::component(2, 4))?;
        }
        Ok(())
    }

    fn start(&mut self, _point_db: &mut PointDatabase, _current_time_us: u64) -> Result<(), FxtError> {
        Ok(())
    }

    fn execute(&mut self, point_db: &mut PointDatabase, _current_tick_us: u64) -> Result<(), FxtError> {
        let (valid, value) = point_db.get(self.input).map(|p| p.read()).unwrap_or((false, PointValue::U8(0)));
        if !valid {
            let ids: Vec<u32> = self.outputs.iter().map(|(id, _, _)| *id).collect();
            invalidate_all(&ids, point_db);
            return Ok(());
        }
        let byte = match value {
            PointValue::U8(b) => b,
            _ => 0,
        };
        for &(id, bit, negate) in &self.outputs {
            let bit_set = (byte >> bit) & 1 != 0;
            if let Some(out) = point_db.get_mut(id) {
                out.write(PointValue::Bool(bit_set ^ negate), LockRequest::NoRequest);
            }
        }
        Ok(())
    }

    fn type_guid(&self) -> &'static str {
        guid::component::BYTE_DEMUX
    }

    fn type_name(&self) -> &'static str {
        "byte_demux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    #[test]
    fn unpacks_bits_at_declared_offsets() {
        let mut db = PointDatabase::new();
        db.add(Point::new(1, None, PointValue::U8(0))).unwrap();
        db.add(Point::new(2, None, PointValue::Bool(false))).unwrap();
        db.add(Point::new(3, None, PointValue::Bool(false))).unwrap();
        db.get_mut(1).unwrap().write(PointValue::U8(0b0000_1001), LockRequest::NoRequest);

        let mut demux = ByteDemux::new(1, vec![(2, 0, false), (3, 3, false)]).unwrap();
        demux.resolve_references(&db).unwrap();
        demux.execute(&mut db, 0).unwrap();
        assert_eq!(db.get(2).unwrap().read(), (true, PointValue::Bool(true)));
        assert_eq!(db.get(3).unwrap().read(), (true, PointValue::Bool(true)));
    }

    #[test]
    fn invalid_input_invalidates_all_outputs() {
        let mut db = PointDatabase::new();
        db.add(Point::new(1, None, PointValue::U8(0))).unwrap();
        db.add(Point::new(2, None, PointValue::Bool(false))).unwrap();
        let mut demux = ByteDemux::new(1, vec![(2, 0, false)]).unwrap();
        demux.resolve_references(&db).unwrap();
        demux.execute(&mut db, 0).unwrap();
        assert!(db.get(2).unwrap().is_not_valid());
    }
}
