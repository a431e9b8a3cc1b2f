//! N-way wire component: `input[i] -> output[i]` with per-index
//! invalidation — unlike most components in the catalog, an
//! invalid input at index `i` only invalidates output `i`, not the whole
//! component's outputs.

use crate::component::{check_ref, Component};
use crate::error::FxtError;
use crate::guid;
use crate::point::LockRequest;
use crate::point_db::PointDatabase;

pub struct Wire {
    type_guid: &'static str,
    point_type_guid: &'static str,
    inputs: Vec<u32>,
    outputs: Vec<u32>,
}

impl Wire {
    pub fn new_bool(inputs: Vec<u32>, outputs: Vec<u32>) -> Result<Self, FxtError> {
        Self::new(guid::component::WIRE64_BOOL, guid::point::BOOL, inputs, outputs)
    }

    pub fn new_float(inputs: Vec<u32>, outputs: Vec<u32>) -> Result<Self, FxtError> {
        Self::new(guid::component::WIRE64_FLOAT, guid::point::F64, inputs, outputs)
    }

    fn new(type_guid: &'static str, point_type_guid: &'static str, inputs: Vec<u32>, outputs: Vec<u32>) -> Result<Self, FxtError> {
        if inputs.len() != outputs.len() {
            return Err(FxtError::component(1, 2)); // COMPONENT:PARSE:INCORRECT_NUM_OUTPUT_REFS
        }
        Ok(Wire { type_guid, point_type_guid, inputs, outputs })
    }
}

impl Component for Wire {
    fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError> {
        for &id in self.inputs.iter().chain(self.outputs.iter()) {
            check_ref(point_db, id, self.point_type_guid, FxtError::component(2, 1), FxtError::component(2, 3))?;
        }
        Ok(())
    }

    fn start(&mut self, _point_db: &mut PointDatabase, _current_time_us: u64) -> Result<(), FxtError> {
        Ok(())
    }

    fn execute(&mut self, point_db: &mut PointDatabase, _current_tick_us: u64) -> Result<(), FxtError> {
        for (&in_id, &out_id) in self.inputs.iter().zip(self.outputs.iter()) {
            let (valid, value) = point_db.get(in_id).map(|p| p.read()).unwrap_or((false, crate::point::PointValue::Bool(false)));
            if let Some(out) = point_db.get_mut(out_id) {
                if valid {
                    out.write(value, LockRequest::NoRequest);
                } else {
                    out.set_invalid(LockRequest::NoRequest);
                }
            }
        }
        Ok(())
    }

    fn type_guid(&self) -> &'static str {
        self.type_guid
    }

    fn type_name(&self) -> &'static str {
        "wire"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::{Point, PointValue};

    fn db_bool(ids: &[u32]) -> PointDatabase {
        let mut db = PointDatabase::new();
        for &id in ids {
            db.add(Point::new(id, None, PointValue::Bool(false))).unwrap();
        }
        db
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let err = Wire::new_bool(vec![1, 2], vec![1]).unwrap_err();
        assert_eq!(err.to_text(), "COMPONENT:PARSE:INCORRECT_NUM_OUTPUT_REFS");
    }

    #[test]
    fn copies_each_index_independently() {
        let mut db = db_bool(&[1, 2, 3, 4]);
        db.get_mut(1).unwrap().write(PointValue::Bool(true), LockRequest::NoRequest);
        // index 2's input (id 2) stays invalid
        let mut wire = Wire::new_bool(vec![1, 2], vec![3, 4]).unwrap();
        wire.resolve_references(&db).unwrap();
        wire.execute(&mut db, 0).unwrap();
        assert_eq!(db.get(3).unwrap().read(), (true, PointValue::Bool(true)));
        assert!(db.get(4).unwrap().is_not_valid());
    }
}
