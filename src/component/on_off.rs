//! On/Off controller with configurable hysteresis and minimum-duration
//! timers.
//!
//! `PV`/`SP` are point references (same numeric type, validated at
//! `resolve_references`); `HON`/`HOFF`/`MON`/`MOFF` are constants parsed
//! once from configuration, matching the component data model's "optional
//! numeric constants parsed from JSON". Internal state (on/off flag, last
//! transition time, previous `RST`) is component-private rather than
//! separate HA-arena points, since only the chassis thread ever touches
//! it and nothing outside this component needs to address it by id.

use crate::component::{check_ref, Component};
use crate::error::FxtError;
use crate::guid;
use crate::point::{LockRequest, PointValue};
use crate::point_db::PointDatabase;

pub struct OnOff {
    pv: u32,
    sp: u32,
    numeric_type_guid: &'static str,
    hon: f64,
    hoff: f64,
    mon_us: u64,
    moff_us: u64,
    rst: Option<u32>,
    output: Option<u32>,
    output_complement: Option<u32>,

    state_on: bool,
    time_marker_us: u64,
    prev_rst: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OnOffParams {
    pub hon: f64,
    pub hoff: f64,
    pub mon_us: u64,
    pub moff_us: u64,
}

impl OnOff {
    pub fn new(
        numeric_type_guid: &'static str,
        pv: u32,
        sp: u32,
        rst: Option<u32>,
        output: Option<u32>,
        output_complement: Option<u32>,
        params: OnOffParams,
    ) -> Result<Self, FxtError> {
        if output.is_none() && output_complement.is_none() {
            return Err(FxtError::component(1, 2)); // INCORRECT_NUM_OUTPUT_REFS: at least one required
        }
        Ok(OnOff {
            pv,
            sp,
            numeric_type_guid,
            hon: params.hon,
            hoff: params.hoff,
            mon_us: params.mon_us,
            moff_us: params.moff_us,
            rst,
            output,
            output_complement,
            state_on: false,
            time_marker_us: 0,
            prev_rst: false,
        })
    }

    fn write_outputs(&self, point_db: &mut PointDatabase, on: bool) {
        if let Some(id) = self.output {
            if let Some(p) = point_db.get_mut(id) {
                p.write(PointValue::Bool(on), LockRequest::NoRequest);
            }
        }
        if let Some(id) = self.output_complement {
            if let Some(p) = point_db.get_mut(id) {
                p.write(PointValue::Bool(!on), LockRequest::NoRequest);
            }
        }
    }

    fn invalidate_outputs(&self, point_db: &mut PointDatabase) {
        for id in [self.output, self.output_complement].into_iter().flatten() {
            if let Some(p) = point_db.get_mut(id) {
                p.set_invalid(LockRequest::NoRequest);
            }
        }
    }
}

impl Component for OnOff {
    fn resolve_references(&mut self, point_db: &PointDatabase) -> Result<(), FxtError> {
        check_ref(point_db, self.pv, self.numeric_type_guid, FxtError::component(2, 1), FxtError::component(2, 3))?;
        check_ref(point_db, self.sp, self.numeric_type_guid, FxtError::component(2, 1), FxtError::component(2, 3))?;
        if let Some(id) = self.rst {
            check_ref(point_db, id, guid::point::BOOL, FxtError::component(2, 1), FxtError::component(2, 3))?;
        }
        for id in [self.output, self.output_complement].into_iter().flatten() {
            check_ref(point_db, id, guid::point::BOOL, FxtError::component(2, 2), FxtError::component(2, 4))?;
        }
        Ok(())
    }

    fn start(&mut self, _point_db: &mut PointDatabase, current_time_us: u64) -> Result<(), FxtError> {
        self.state_on = false;
        self.time_marker_us = current_time_us;
        self.prev_rst = false;
        Ok(())
    }

    fn execute(&mut self, point_db: &mut PointDatabase, current_tick_us: u64) -> Result<(), FxtError> {
        let (pv_valid, pv_value) = point_db.get(self.pv).map(|p| p.read()).unwrap_or((false, PointValue::Bool(false)));
        let (sp_valid, sp_value) = point_db.get(self.sp).map(|p| p.read()).unwrap_or((false, PointValue::Bool(false)));

        if !pv_valid || !sp_valid {
            self.invalidate_outputs(point_db);
            return Ok(()); // internal state frozen on invalid inputs
        }

        let pv = pv_value.as_f64_numeric().unwrap_or(0.0);
        let sp = sp_value.as_f64_numeric().unwrap_or(0.0);

        if let Some(rst_id) = self.rst {
            let (rst_valid, rst_value) = point_db.get(rst_id).map(|p| p.read()).unwrap_or((false, PointValue::Bool(false)));
            if rst_valid {
                let rst = matches!(rst_value, PointValue::Bool(true));
                if rst && !self.prev_rst {
                    self.state_on = false;
                    self.time_marker_us = current_tick_us;
                }
                self.prev_rst = rst;
            }
        }

        let elapsed = current_tick_us.saturating_sub(self.time_marker_us);

        if !self.state_on && pv >= sp + self.hon && elapsed >= self.moff_us {
            self.state_on = true;
            self.time_marker_us = current_tick_us;
        } else if self.state_on && pv <= sp - self.hoff && elapsed >= self.mon_us {
            self.state_on = false;
            self.time_marker_us = current_tick_us;
        }

        self.write_outputs(point_db, self.state_on);
        Ok(())
    }

    fn type_guid(&self) -> &'static str {
        guid::component::ON_OFF
    }

    fn type_name(&self) -> &'static str {
        "on_off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    fn db_with(pv: f64, sp: f64) -> PointDatabase {
        let mut db = PointDatabase::new();
        db.add(Point::new(1, None, PointValue::F64(0.0))).unwrap();
        db.add(Point::new(2, None, PointValue::F64(0.0))).unwrap();
        db.add(Point::new(3, None, PointValue::Bool(false))).unwrap(); // O
        db.get_mut(1).unwrap().write(PointValue::F64(pv), LockRequest::NoRequest);
        db.get_mut(2).unwrap().write(PointValue::F64(sp), LockRequest::NoRequest);
        db
    }

    fn controller(params: OnOffParams) -> OnOff {
        OnOff::new(guid::point::F64, 1, 2, None, Some(3), None, params).unwrap()
    }

    #[test]
    fn requires_at_least_one_output() {
        let err = OnOff::new(guid::point::F64, 1, 2, None, None, None, OnOffParams::default()).unwrap_err();
        assert_eq!(err.to_text(), "COMPONENT:PARSE:INCORRECT_NUM_OUTPUT_REFS");
    }

    #[test]
    fn turns_on_when_pv_reaches_setpoint() {
        let mut db = db_with(10.0, 10.0);
        let mut c = controller(OnOffParams::default());
        c.resolve_references(&db).unwrap();
        c.start(&mut db, 0).unwrap();
        c.execute(&mut db, 1_000).unwrap();
        assert_eq!(db.get(3).unwrap().read(), (true, PointValue::Bool(true)));
    }

    #[test]
    fn stays_off_below_setpoint() {
        let mut db = db_with(5.0, 10.0);
        let mut c = controller(OnOffParams::default());
        c.resolve_references(&db).unwrap();
        c.start(&mut db, 0).unwrap();
        c.execute(&mut db, 1_000).unwrap();
        assert_eq!(db.get(3).unwrap().read(), (true, PointValue::Bool(false)));
    }

    #[test]
    fn minimum_on_duration_blocks_early_off_transition() {
        let mut db = db_with(10.0, 10.0);
        let params = OnOffParams { mon_us: 5_000, ..Default::default() };
        let mut c = controller(params);
        c.resolve_references(&db).unwrap();
        c.start(&mut db, 0).unwrap();
        c.execute(&mut db, 1_000).unwrap(); // turns on at t=1000
        assert_eq!(db.get(3).unwrap().read().1, PointValue::Bool(true));

        // PV drops below SP - HOFF immediately, but MON hasn't elapsed yet
        db.get_mut(1).unwrap().write(PointValue::F64(0.0), LockRequest::NoRequest);
        c.execute(&mut db, 2_000).unwrap();
        assert_eq!(db.get(3).unwrap().read().1, PointValue::Bool(true), "must stay on until MON elapses");

        c.execute(&mut db, 10_000).unwrap();
        assert_eq!(db.get(3).unwrap().read().1, PointValue::Bool(false));
    }

    #[test]
    fn rising_edge_reset_forces_off() {
        let mut db = db_with(10.0, 10.0);
        db.add(Point::new(4, None, PointValue::Bool(false))).unwrap(); // RST
        let mut c = OnOff::new(guid::point::F64, 1, 2, Some(4), Some(3), None, OnOffParams::default()).unwrap();
        c.resolve_references(&db).unwrap();
        c.start(&mut db, 0).unwrap();
        c.execute(&mut db, 1_000).unwrap();
        assert_eq!(db.get(3).unwrap().read().1, PointValue::Bool(true));

        db.get_mut(4).unwrap().write(PointValue::Bool(true), LockRequest::NoRequest);
        c.execute(&mut db, 2_000).unwrap();
        assert_eq!(db.get(3).unwrap().read().1, PointValue::Bool(false));
    }

    #[test]
    fn invalid_pv_invalidates_outputs_and_freezes_state() {
        let mut db = db_with(10.0, 10.0);
        let mut c = controller(OnOffParams::default());
        c.resolve_references(&db).unwrap();
        c.start(&mut db, 0).unwrap();
        c.execute(&mut db, 1_000).unwrap();
        assert!(c.state_on);

        db.get_mut(1).unwrap().set_invalid(LockRequest::NoRequest);
        c.execute(&mut db, 2_000).unwrap();
        assert!(db.get(3).unwrap().is_not_valid());
        assert!(c.state_on, "internal state must freeze, not reset, on invalid input");
    }

    #[test]
    fn complement_output_tracks_inverse() {
        let mut db = db_with(10.0, 10.0);
        db.add(Point::new(5, None, PointValue::Bool(false))).unwrap();
        let mut c = OnOff::new(guid::point::F64, 1, 2, None, Some(3), Some(5), OnOffParams::default()).unwrap();
        c.resolve_references(&db).unwrap();
        c.start(&mut db, 0).unwrap();
        c.execute(&mut db, 1_000).unwrap();
        assert_eq!(db.get(3).unwrap().read().1, PointValue::Bool(true));
        assert_eq!(db.get(5).unwrap().read().1, PointValue::Bool(false));
    }
}
