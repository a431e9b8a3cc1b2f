//! Point database: the id-indexed table of every point a node owns, plus
//! the JSON façade used by the external read/write interface.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::error::FxtError;
use crate::point::{LockRequest, Point};
use crate::setter::Setter;

/// Owns every point in a node, keyed by the stable numeric id assigned at
/// configuration build time, plus the setters attached to any of them. A
/// point's optional setter is built by the same factory call that builds
/// the point, but it is a separate object with its own lifetime — cards
/// and logic chains look it up by the target point's id when they need
/// to (re)apply it.
#[derive(Debug, Default)]
pub struct PointDatabase {
    points: HashMap<u32, Point>,
    setters: HashMap<u32, Setter>,
    next_id: u32,
}

impl PointDatabase {
    pub fn new() -> Self {
        PointDatabase { points: HashMap::new(), setters: HashMap::new(), next_id: 1 }
    }

    /// Registers `point` under its own id if one was already assigned
    /// (id != 0), otherwise allocates the next free id. Fails with
    /// `POINT:FACTORY:DUPLICATE_ID` if the id is already taken.
    pub fn add(&mut self, mut point: Point) -> Result<u32, FxtError> {
        let id = if point.id() == 0 { self.allocate_id() } else { point.id() };
        if self.points.contains_key(&id) {
            return Err(FxtError::point(2, 3)); // POINT:FACTORY:DUPLICATE_ID
        }
        if point.id() == 0 {
            point = Point::new(id, point.name().map(str::to_string), point.read().1);
        }
        self.points.insert(id, point);
        Ok(id)
    }

    fn allocate_id(&mut self) -> u32 {
        while self.points.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn get(&self, id: u32) -> Option<&Point> {
        self.points.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Point> {
        self.points.get_mut(&id)
    }

    /// Attaches a setter to an already-registered point.
    pub fn attach_setter(&mut self, point_id: u32, setter: Setter) {
        if let Some(point) = self.points.get_mut(&point_id) {
            point.set_has_setter(true);
        }
        self.setters.insert(point_id, setter);
    }

    pub fn has_setter(&self, point_id: u32) -> bool {
        self.setters.contains_key(&point_id)
    }

    /// Applies `point_id`'s setter to itself, if any. A no-op (not an
    /// error) when the point has no setter — callers apply this
    /// unconditionally to every IO register / auto-point at `start` and
    /// at the top of every logic-chain cycle.
    pub fn apply_setter(&mut self, point_id: u32) {
        if let Some(setter) = self.setters.get(&point_id) {
            if let Some(point) = self.points.get_mut(&point_id) {
                setter.set_value(point);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.points.keys().copied()
    }

    /// Drops every point. Called when a `NodeFactory::build` fails partway
    /// through and the partially-built database must not leak into a
    /// subsequent retry.
    pub fn cleanup_after_build_failure(&mut self) {
        self.points.clear();
        self.setters.clear();
        self.next_id = 1;
    }

    /// Serializes every point (or a specific subset of ids, if given) into
    /// a single `{ "points": [...] }` document.
    pub fn to_json(&self, ids: Option<&[u32]>, verbose: bool) -> Value {
        let selected: Vec<u32> = match ids {
            Some(s) => s.to_vec(),
            None => {
                let mut all: Vec<u32> = self.points.keys().copied().collect();
                all.sort_unstable();
                all
            }
        };
        let arr: Vec<Value> = selected
            .into_iter()
            .filter_map(|id| self.points.get(&id).map(|p| p.to_json(verbose)))
            .collect();
        json!({ "points": arr })
    }

    /// Applies a `{ "points": [ {id, val?, valid?, locked?}, ... ] }`
    /// command document. Per-point failures do not abort the whole batch;
    /// the first error encountered is returned after every point in the
    /// document has been attempted, since entity-local errors do not
    /// propagate past their own boundary.
    pub fn from_json(&mut self, v: &Value, lock_request: LockRequest) -> Result<(), FxtError> {
        let points = v
            .get("points")
            .and_then(|p| p.as_array())
            .ok_or(FxtError::point(1, 1))?; // POINT:PARSE:INVALID_JSON

        let mut first_err = FxtError::SUCCESS;
        for entry in points {
            let id = match entry.get("id").and_then(|i| i.as_u64()) {
                Some(id) => id as u32,
                None => {
                    if first_err.is_success() {
                        first_err = FxtError::point(1, 5); // POINT:PARSE:MISSING_FIELD
                    }
                    continue;
                }
            };
            let point = match self.points.get_mut(&id) {
                Some(p) => p,
                None => {
                    if first_err.is_success() {
                        first_err = FxtError::point(1, 4); // POINT:PARSE:UNKNOWN_TYPE (no such id)
                    }
                    continue;
                }
            };
            let mut err = FxtError::SUCCESS;
            point.from_json(entry, lock_request, &mut err);
            if first_err.is_success() && !err.is_success() {
                first_err = err;
            }
        }

        if first_err.is_success() {
            Ok(())
        } else {
            Err(first_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::PointValue;

    fn new_point(id: u32) -> Point {
        Point::new(id, None, PointValue::Bool(false))
    }

    #[test]
    fn add_assigns_sequential_ids_when_zero() {
        let mut db = PointDatabase::new();
        let a = db.add(new_point(0)).unwrap();
        let b = db.add(new_point(0)).unwrap();
        assert_ne!(a, b);
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn add_duplicate_explicit_id_fails() {
        let mut db = PointDatabase::new();
        db.add(new_point(5)).unwrap();
        let err = db.add(new_point(5)).unwrap_err();
        assert_eq!(err.to_text(), "POINT:FACTORY:DUPLICATE_ID");
    }

    #[test]
    fn cleanup_after_build_failure_clears_everything() {
        let mut db = PointDatabase::new();
        db.add(new_point(1)).unwrap();
        db.cleanup_after_build_failure();
        assert!(db.is_empty());
        // ids are reusable after cleanup
        let id = db.add(new_point(1)).unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn apply_setter_forces_target_value() {
        let mut db = PointDatabase::new();
        db.add(new_point(1)).unwrap();
        db.attach_setter(1, Setter::new(PointValue::Bool(true), true));
        assert!(db.has_setter(1));
        db.apply_setter(1);
        assert_eq!(db.get(1).unwrap().read(), (true, PointValue::Bool(true)));
    }

    #[test]
    fn apply_setter_on_point_without_one_is_noop() {
        let mut db = PointDatabase::new();
        db.add(new_point(1)).unwrap();
        db.apply_setter(1); // no setter attached; must not panic
        assert_eq!(db.get(1).unwrap().is_not_valid(), true);
    }

    #[test]
    fn json_write_then_read_round_trips() {
        let mut db = PointDatabase::new();
        db.add(new_point(7)).unwrap();
        let cmd = json!({ "points": [ { "id": 7, "val": true } ] });
        db.from_json(&cmd, LockRequest::NoRequest).unwrap();
        let out = db.to_json(Some(&[7]), false);
        assert_eq!(out["points"][0]["val"], json!(true));
    }

    #[test]
    fn json_write_unknown_id_reports_error_but_applies_known_ones() {
        let mut db = PointDatabase::new();
        db.add(new_point(1)).unwrap();
        let cmd = json!({ "points": [ { "id": 1, "val": true }, { "id": 999, "val": true } ] });
        let err = db.from_json(&cmd, LockRequest::NoRequest).unwrap_err();
        assert!(!err.is_success());
        // id 1 still got applied despite the batch reporting an error
        assert_eq!(db.get(1).unwrap().read(), (true, PointValue::Bool(true)));
    }
}
