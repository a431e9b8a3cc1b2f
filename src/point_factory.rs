//! Point Factory Database: maps a point type GUID to the logic that
//! parses `{ id, type, typeCfg?, initial? }`, allocates the point's
//! stateful memory from a caller-supplied arena, and — if `initial` is
//! present — builds the setter that seeds it.

use std::collections::HashMap;

use serde_json::Value;

use crate::arena::Arena;
use crate::error::FxtError;
use crate::guid;
use crate::point::{Point, PointValue};
use crate::setter::Setter;

/// Default string capacity when `typeCfg.numElems` is absent.
const DEFAULT_STRING_MAX_LEN: usize = 32;

type PointFactoryFn = fn(&Value, &mut Arena) -> Result<(Point, Option<Setter>), FxtError>;

/// Maps type GUID -> constructor. Factories never resolve references —
/// they only ever produce points, never transitively resolving
/// references themselves.
#[derive(Default)]
pub struct PointFactoryDatabase {
    factories: HashMap<&'static str, PointFactoryFn>,
}

impl PointFactoryDatabase {
    pub fn new() -> Self {
        PointFactoryDatabase { factories: HashMap::new() }
    }

    pub fn register(&mut self, type_guid: &'static str, f: PointFactoryFn) {
        self.factories.insert(type_guid, f);
    }

    /// Builds a point (plus optional setter) from a point JSON object.
    /// `type_guid` is looked up first from the object's own `type` field
    /// unless the caller already knows it (e.g. card channel points,
    /// which are typed by the card schema rather than by JSON).
    pub fn build(&self, v: &Value, arena: &mut Arena) -> Result<(Point, Option<Setter>), FxtError> {
        let type_guid = v
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(FxtError::point(1, 5))? // POINT:PARSE:MISSING_FIELD
            .to_string();
        self.build_typed(&type_guid, v, arena)
    }

    pub fn build_typed(&self, type_guid: &str, v: &Value, arena: &mut Arena) -> Result<(Point, Option<Setter>), FxtError> {
        let f = self
            .factories
            .get(type_guid)
            .ok_or(FxtError::point(2, 1))?; // POINT:FACTORY:UNKNOWN_TYPE_GUID
        f(v, arena)
    }
}

fn numeric_elems(v: &Value) -> usize {
    v.get("typeCfg")
        .and_then(|t| t.get("numElems"))
        .and_then(|n| n.as_u64())
        .unwrap_or(DEFAULT_STRING_MAX_LEN as u64) as usize
}

/// Generic scalar/string factory: shared by every builtin type, since the
/// only thing that differs between them is the zero value and the
/// GUID-to-variant mapping already captured in `PointValue::zero_of_type`.
fn make_factory(type_guid: &'static str) -> PointFactoryFn {
    // `PointFactoryFn` is a bare fn pointer (no closures), so dispatch
    // happens through a single generic body parameterized only by the
    // captured GUID constant via a tiny per-type shim.
    match type_guid {
        g if g == guid::point::BOOL => build_bool,
        g if g == guid::point::I8 => build_i8,
        g if g == guid::point::U8 => build_u8,
        g if g == guid::point::I16 => build_i16,
        g if g == guid::point::U16 => build_u16,
        g if g == guid::point::I32 => build_i32,
        g if g == guid::point::U32 => build_u32,
        g if g == guid::point::I64 => build_i64,
        g if g == guid::point::U64 => build_u64,
        g if g == guid::point::F32 => build_f32,
        g if g == guid::point::F64 => build_f64,
        g if g == guid::point::STRING => build_string,
        _ => unreachable!("make_factory called with unregistered type guid"),
    }
}

fn build_generic(type_guid: &str, v: &Value, arena: &mut Arena) -> Result<(Point, Option<Setter>), FxtError> {
    let id = v.get("id").and_then(|i| i.as_u64()).ok_or(FxtError::point(1, 5))? as u32; // MISSING_FIELD
    let max_len = numeric_elems(v);
    let zero = PointValue::zero_of_type(type_guid, max_len).ok_or(FxtError::point(2, 1))?; // UNKNOWN_TYPE_GUID

    arena.try_alloc(zero.stateful_size()).map_err(|_| FxtError::point(2, 2))?; // OUT_OF_MEMORY

    let point = Point::new(id, None, zero.clone());

    let setter = match v.get("initial") {
        None => None,
        Some(initial) => {
            arena.try_alloc(zero.stateful_size()).map_err(|_| FxtError::point(2, 2))?;
            let valid = initial.get("valid").and_then(|b| b.as_bool()).unwrap_or(true);
            let value = match initial.get("val") {
                Some(val) => zero.from_json_val(val).ok_or(FxtError::point(1, 2))?, // TYPE_MISMATCH
                None => zero.clone(),
            };
            Some(Setter::new(value, valid))
        }
    };

    Ok((point, setter))
}

macro_rules! typed_builder {
    ($name:ident, $guid_const:path) => {
        fn $name(v: &Value, arena: &mut Arena) -> Result<(Point, Option<Setter>), FxtError> {
            build_generic($guid_const, v, arena)
        }
    };
}

typed_builder!(build_bool, guid::point::BOOL);
typed_builder!(build_i8, guid::point::I8);
typed_builder!(build_u8, guid::point::U8);
typed_builder!(build_i16, guid::point::I16);
typed_builder!(build_u16, guid::point::U16);
typed_builder!(build_i32, guid::point::I32);
typed_builder!(build_u32, guid::point::U32);
typed_builder!(build_i64, guid::point::I64);
typed_builder!(build_u64, guid::point::U64);
typed_builder!(build_f32, guid::point::F32);
typed_builder!(build_f64, guid::point::F64);
typed_builder!(build_string, guid::point::STRING);

/// Registers every builtin point-type factory. Called once by
/// `NodeFactory::new` as a bootstrap step rather than per-type static
/// self-registration.
pub fn register_builtin_factories(db: &mut PointFactoryDatabase) {
    for type_guid in [
        guid::point::BOOL,
        guid::point::I8,
        guid::point::U8,
        guid::point::I16,
        guid::point::U16,
        guid::point::I32,
        guid::point::U32,
        guid::point::I64,
        guid::point::U64,
        guid::point::F32,
        guid::point::F64,
        guid::point::STRING,
    ] {
        db.register(type_guid, make_factory(type_guid));
    }
}
