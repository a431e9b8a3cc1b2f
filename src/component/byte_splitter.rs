//! Byte splitter: a combined byte-demux + byte-mux in one component — one
//! byte input unpacked to 8 boolean outputs, and 8 boolean inputs packed
//! back into one byte output, both directions running every cycle. Bit
//! order is fixed (bit `i` <-> array index `i`), unlike the standalone
//! mux/demux which take per-bit offset/negate configuration.

use crate::component::{check_ref, Component};
use crate::error::FxtError;
use crate::guid;
use crate::point::{LockRequest, PointValue};
use crate::point_db::PointDatabase;

pub struct ByteSplitter {
    byte_in: u32,
    bool_outs: [u32; 8],
    bool_ins: [u32; 8],
    byte_out: u32,
}

impl ByteSplitter {
    pub fn new(byte_in: u32, bool_outs: [u32; 8], bool_ins: [u32; 8], byte_out: u32) -> Self {
        ByteSplitter { byte_in, bool_outs, bool_ins, byte_out }
    }
}

impl Component for ByteSplitter {
    fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError> {
        check_ref(point_db, self.byte_in, guid::point::U8, FxtError::component(2, 1), FxtError::component(2, 3))?;
        check_ref(point_db, self.byte_out, guid::point::U8, FxtError::component(2, 2), FxtError::component(2, 4))?;
        for &id in self.bool_outs.iter().chain(self.bool_ins.iter()) {
            check_ref(point_db, id, guid::point::BOOL, FxtError::component(2, 1), FxtError::component(2, 3))?;
        }
        Ok(())
    }

    fn start(&mut self, _point_db: &mut PointDatabase, _current_time_us: u64) -> Result<(), FxtError> {
        Ok(())
    }

    fn execute(&mut self, point_db: &mut PointDatabase, _current_tick_us: u64) -> Result<(), FxtError> {
        // Demux direction: byte_in -> bool_outs.
        let (byte_valid, byte_value) = point_db.get(self.byte_in).map(|p| p.read()).unwrap_or((false, PointValue::U8(0)));
        if byte_valid {
            let byte = if let PointValue::U8(b) = byte_value { b } else { 0 };
            for (i, &id) in self.bool_outs.iter().enumerate() {
                if let Some(out) = point_db.get_mut(id) {
                    out.write(PointValue::Bool((byte >> i) & 1 != 0), LockRequest::NoRequest);
                }
            }
        } else {
            for &id in &self.bool_outs {
                if let Some(out) = point_db.get_mut(id) {
                    out.set_invalid(LockRequest::NoRequest);
                }
            }
        }

        // Mux direction: bool_ins -> byte_out.
        let mut byte = 0u8;
        let mut all_valid = true;
        for (i, &id) in self.bool_ins.iter().enumerate() {
            let (valid, value) = point_db.get(id).map(|p| p.read()).unwrap_or((false, PointValue::Bool(false)));
            if !valid {
                all_valid = false;
                break;
            }
            if let PointValue::Bool(true) = value {
                byte |= 1 << i;
            }
        }
        if let Some(out) = point_db.get_mut(self.byte_out) {
            if all_valid {
                out.write(PointValue::U8(byte), LockRequest::NoRequest);
            } else {
                out.set_invalid(LockRequest::NoRequest);
            }
        }
        Ok(())
    }

    fn type_guid(&self) -> &'static str {
        guid::component::BYTE_SPLITTER
    }

    fn type_name(&self) -> &'static str {
        "byte_splitter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    fn setup() -> (PointDatabase, ByteSplitter) {
        let mut db = PointDatabase::new();
        db.add(Point::new(1, None, PointValue::U8(0))).unwrap(); // byte_in
        db.add(Point::new(2, None, PointValue::U8(0))).unwrap(); // byte_out
        let mut bool_outs = [0u32; 8];
        let mut bool_ins = [0u32; 8];
        for i in 0..8 {
            let out_id = 100 + i as u32;
            let in_id = 200 + i as u32;
            db.add(Point::new(out_id, None, PointValue::Bool(false))).unwrap();
            db.add(Point::new(in_id, None, PointValue::Bool(false))).unwrap();
            bool_outs[i] = out_id;
            bool_ins[i] = in_id;
        }
        let splitter = ByteSplitter::new(1, bool_outs, bool_ins, 2);
        (db, splitter)
    }

    #[test]
    fn splits_byte_into_bits() {
        let (mut db, mut splitter) = setup();
        db.get_mut(1).unwrap().write(PointValue::U8(0b0000_0101), LockRequest::NoRequest);
        splitter.resolve_references(&db).unwrap();
        splitter.execute(&mut db, 0).unwrap();
        assert_eq!(db.get(100).unwrap().read(), (true, PointValue::Bool(true)));
        assert_eq!(db.get(102).unwrap().read(), (true, PointValue::Bool(true)));
        assert_eq!(db.get(101).unwrap().read(), (true, PointValue::Bool(false)));
    }

    #[test]
    fn reassembles_bits_into_byte() {
        let (mut db, mut splitter) = setup();
        for i in [0usize, 2] {
            db.get_mut(200 + i as u32).unwrap().write(PointValue::Bool(true), LockRequest::NoRequest);
        }
        for i in [1usize, 3, 4, 5, 6, 7] {
            db.get_mut(200 + i as u32).unwrap().write(PointValue::Bool(false), LockRequest::NoRequest);
        }
        splitter.resolve_references(&db).unwrap();
        splitter.execute(&mut db, 0).unwrap();
        assert_eq!(db.get(2).unwrap().read(), (true, PointValue::U8(0b0000_0101)));
    }

    #[test]
    fn any_unresolved_bool_input_invalidates_byte_out() {
        let (mut db, mut splitter) = setup();
        // leave id 200 invalid
        for i in 1..8 {
            db.get_mut(200 + i as u32).unwrap().write(PointValue::Bool(false), LockRequest::NoRequest);
        }
        splitter.resolve_references(&db).unwrap();
        splitter.execute(&mut db, 0).unwrap();
        assert!(db.get(2).unwrap().is_not_valid());
    }
}
