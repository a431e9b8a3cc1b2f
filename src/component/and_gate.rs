//! N-input AND-gate: up to 16 boolean inputs, 1-2 boolean outputs each
//! with its own `negate` flag. If any input is invalid, all
//! outputs are set invalid (the common invalid-propagation rule).

use crate::component::{check_ref, invalidate_all, Component};
use crate::error::FxtError;
use crate::guid;
use crate::point::{LockRequest, PointValue};
use crate::point_db::PointDatabase;

pub const MAX_INPUTS: usize = 16;
pub const MAX_OUTPUTS: usize = 2;

pub struct AndGate {
    inputs: Vec<u32>,
    outputs: Vec<(u32, bool)>, // (point id, negate)
}

impl AndGate {
    pub fn new(inputs: Vec<u32>, outputs: Vec<(u32, bool)>) -> Result<Self, FxtError> {
        if inputs.is_empty() || inputs.len() > MAX_INPUTS {
            return Err(FxtError::component(1, 1)); // INCORRECT_NUM_INPUT_REFS
        }
        if outputs.is_empty() || outputs.len() > MAX_OUTPUTS {
            return Err(FxtError::component(1, 2)); // INCORRECT_NUM_OUTPUT_REFS
        }
        Ok(AndGate { inputs, outputs })
    }
}

impl Component for AndGate {
    fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError> {
        for &id in &self.inputs {
            check_ref(point_db, id, guid::point::BOOL, FxtError::component(2, 1), FxtError::component(2, 3))?;
        }
        for &(id, _) in &self.outputs {
            check_ref(point_db, id, guid::point::BOOL, FxtError::component(2, 2), FxtError::component(2, 4))?;
        }
        Ok(())
    }

    fn start(&mut self, _point_db: &mut PointDatabase, _current_time_us: u64) -> Result<(), FxtError> {
        Ok(())
    }

    fn execute(&mut self, point_db: &mut PointDatabase, _current_tick_us: u64) -> Result<(), FxtError> {
        let mut result = true;
        for &id in &self.inputs {
            let (valid, value) = point_db.get(id).map(|p| p.read()).unwrap_or((false, PointValue::Bool(false)));
            if !valid {
                let ids: Vec<u32> = self.outputs.iter().map(|(id, _)| *id).collect();
                invalidate_all(&ids, point_db);
                return Ok(());
            }
            if let PointValue::Bool(b) = value {
                result &= b;
            }
        }
        for &(id, negate) in &self.outputs {
            if let Some(out) = point_db.get_mut(id) {
                out.write(PointValue::Bool(result ^ negate), LockRequest::NoRequest);
            }
        }
        Ok(())
    }

    fn type_guid(&self) -> &'static str {
        guid::component::AND_GATE
    }

    fn type_name(&self) -> &'static str {
        "and_gate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    fn db_bool(ids: &[u32]) -> PointDatabase {
        let mut db = PointDatabase::new();
        for &id in ids {
            db.add(Point::new(id, None, PointValue::Bool(false))).unwrap();
        }
        db
    }

    #[test]
    fn all_true_inputs_yield_true_output() {
        let mut db = db_bool(&[1, 2, 3]);
        for id in [1, 2] {
            db.get_mut(id).unwrap().write(PointValue::Bool(true), LockRequest::NoRequest);
        }
        let mut gate = AndGate::new(vec![1, 2], vec![(3, false)]).unwrap();
        gate.resolve_references(&db).unwrap();
        gate.execute(&mut db, 0).unwrap();
        assert_eq!(db.get(3).unwrap().read(), (true, PointValue::Bool(true)));
    }

    #[test]
    fn negate_flips_output() {
        let mut db = db_bool(&[1, 2, 3]);
        for id in [1, 2] {
            db.get_mut(id).unwrap().write(PointValue::Bool(true), LockRequest::NoRequest);
        }
        let mut gate = AndGate::new(vec![1, 2], vec![(3, true)]).unwrap();
        gate.resolve_references(&db).unwrap();
        gate.execute(&mut db, 0).unwrap();
        assert_eq!(db.get(3).unwrap().read(), (true, PointValue::Bool(false)));
    }

    #[test]
    fn invalid_input_propagates_to_all_outputs() {
        let mut db = db_bool(&[1, 2, 3, 4]);
        db.get_mut(1).unwrap().write(PointValue::Bool(true), LockRequest::NoRequest);
        // id 2 stays invalid
        let mut gate = AndGate::new(vec![1, 2], vec![(3, false), (4, true)]).unwrap();
        gate.resolve_references(&db).unwrap();
        gate.execute(&mut db, 0).unwrap();
        assert!(db.get(3).unwrap().is_not_valid());
        assert!(db.get(4).unwrap().is_not_valid());
    }

    #[test]
    fn too_many_inputs_rejected() {
        let err = AndGate::new(vec![0; 17], vec![(1, false)]).unwrap_err();
        assert_eq!(err.to_text(), "COMPONENT:PARSE:INCORRECT_NUM_INPUT_REFS");
    }
}
